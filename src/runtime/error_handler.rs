// Classification, recording, and querying of per-instance runtime errors

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error as log_error, warn};

use crate::atoms::Context;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

/// One recorded failure. `recoverable` is advisory only — the engine never
/// auto-retries; that's left to an overlay (§7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub id: String,
    pub instance_id: String,
    pub message: String,
    pub severity: ErrorSeverity,
    pub timestamp: DateTime<Utc>,
    pub context: Option<Context>,
    pub recoverable: bool,
    pub handled: bool,
}

const RECOVERABLE_SUBSTRINGS: &[&str] = &["timeout", "connection", "network", "resource", "memory", "disk"];
const NON_RECOVERABLE_SUBSTRINGS: &[&str] = &["validation", "invalid", "malformed", "permission", "unauthorized", "forbidden"];

/// Substring heuristic on the lowercased message. Defaults to recoverable
/// when neither word list matches.
fn classify_recoverable(message: &str) -> bool {
    let lower = message.to_lowercase();
    if RECOVERABLE_SUBSTRINGS.iter().any(|s| lower.contains(s)) {
        return true;
    }
    if NON_RECOVERABLE_SUBSTRINGS.iter().any(|s| lower.contains(s)) {
        return false;
    }
    true
}

fn new_error_id(instance_id: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_nanos();
    format!("{instance_id}-{nanos}")
}

/// Per-instance error ledger, one readers-writer lock over the whole thing.
#[derive(Default)]
pub struct ErrorHandler {
    errors: RwLock<HashMap<String, Vec<ErrorRecord>>>,
}

impl ErrorHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults severity to medium; logs at a level matching the severity
    /// before marking the record handled.
    pub fn handle_error(&self, instance_id: &str, message: impl Into<String>, context: Option<Context>) -> ErrorRecord {
        self.handle_error_with_severity(instance_id, message, ErrorSeverity::Medium, context)
    }

    pub fn handle_error_with_severity(
        &self,
        instance_id: &str,
        message: impl Into<String>,
        severity: ErrorSeverity,
        context: Option<Context>,
    ) -> ErrorRecord {
        let message = message.into();
        let recoverable = classify_recoverable(&message);
        match severity {
            ErrorSeverity::Critical | ErrorSeverity::High => log_error!(instance_id, %message, recoverable, "workflow error"),
            _ => warn!(instance_id, %message, recoverable, "workflow error"),
        }
        let record = ErrorRecord {
            id: new_error_id(instance_id),
            instance_id: instance_id.to_string(),
            message,
            severity,
            timestamp: Utc::now(),
            context,
            recoverable,
            handled: true,
        };
        self.errors
            .write()
            .expect("error handler lock poisoned")
            .entry(instance_id.to_string())
            .or_default()
            .push(record.clone());
        record
    }

    pub fn get_errors(&self, instance_id: &str) -> Vec<ErrorRecord> {
        self.errors
            .read()
            .expect("error handler lock poisoned")
            .get(instance_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn get_all_errors(&self) -> Vec<ErrorRecord> {
        self.errors
            .read()
            .expect("error handler lock poisoned")
            .values()
            .flatten()
            .cloned()
            .collect()
    }

    pub fn clear(&self, instance_id: &str) {
        self.errors.write().expect("error handler lock poisoned").remove(instance_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_message_classified_recoverable() {
        let handler = ErrorHandler::new();
        let record = handler.handle_error("i0", "connection timeout while calling executor", None);
        assert!(record.recoverable);
        assert_eq!(record.severity, ErrorSeverity::Medium);
    }

    #[test]
    fn validation_message_classified_non_recoverable() {
        let handler = ErrorHandler::new();
        let record = handler.handle_error("i0", "validation failed: empty name", None);
        assert!(!record.recoverable);
    }

    #[test]
    fn default_classification_is_recoverable() {
        let handler = ErrorHandler::new();
        let record = handler.handle_error("i0", "something unexpected happened", None);
        assert!(record.recoverable);
    }

    #[test]
    fn get_errors_is_scoped_per_instance() {
        let handler = ErrorHandler::new();
        handler.handle_error("i0", "oops", None);
        handler.handle_error("i1", "oops too", None);
        assert_eq!(handler.get_errors("i0").len(), 1);
        assert_eq!(handler.get_errors("i1").len(), 1);
        assert!(handler.get_errors("i2").is_empty());
    }

    #[test]
    fn clear_removes_instance_entries() {
        let handler = ErrorHandler::new();
        handler.handle_error("i0", "oops", None);
        handler.clear("i0");
        assert!(handler.get_errors("i0").is_empty());
    }
}
