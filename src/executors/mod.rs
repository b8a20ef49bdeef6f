//! Reference `WorkExecutor` implementations. Concrete provider invokers
//! (real AWS/GCP/Azure network calls) are out of scope — these are pure
//! parsing/projection demonstrations of the plug-in contract.

pub mod cloud_function;

pub use cloud_function::{CloudFunctionConfig, CloudFunctionExecutor, Credentials, Provider};
