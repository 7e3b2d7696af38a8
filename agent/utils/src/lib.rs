/*!

`agent-utils` is a collection of functions shared by the `meshfleet` binary and the providers.
`ssh` contains the remote command executor used to reach cluster instances.

!*/

use cluster_agent::{ErrorKind, ProviderError, ProviderResult};
use constants::DEFAULT_LEVEL_FILTER;
use env_logger::Builder;
pub use error::Error;
use log::LevelFilter;
use serde::Serialize;
use std::env;
use std::process::Output;

pub mod constants;
mod error;
pub mod ssh;

pub use ssh::SshExecutor;

/// Extract the value of `RUST_LOG` if it exists, otherwise log this application at
/// `DEFAULT_LEVEL_FILTER`.
pub fn init_logger(bin_crate: &str, log_level: Option<LevelFilter>) {
    match env::var(env_logger::DEFAULT_FILTER_ENV).ok() {
        Some(_) => {
            // RUST_LOG exists; env_logger will use it.
            Builder::from_default_env().init();
        }
        None => {
            let log_level = log_level.unwrap_or(DEFAULT_LEVEL_FILTER);
            Builder::new()
                // Set log level to Error for crates other than our own.
                .filter_level(LevelFilter::Error)
                // Set all of our crates to the desired level.
                .filter(Some(bin_crate), log_level)
                .filter(Some("agent_utils"), log_level)
                .filter(Some("cluster_agent"), log_level)
                .filter(Some("meshfleet_model"), log_level)
                .filter(Some("meshfleet_providers"), log_level)
                .init();
        }
    }
}

/// Print a value using `serde_json` `to_string_pretty` for types that implement Serialize.
pub fn json_display<T: Serialize>(object: T) -> String {
    serde_json::to_string_pretty(&object).unwrap_or_else(|e| format!("Serialization failed: {}", e))
}

/// If the command was successful (exit code zero), returns the command's `stdout`. Otherwise
/// returns a provider error of kind [`ErrorKind::Remote`].
/// - `output`: the `Output` of a finished process, local or remote
/// - `hint`: the command that was executed, e.g. `vagrant up`
pub fn provider_error_for_cmd_output(output: Output, hint: &str) -> ProviderResult<String> {
    let stdout = String::from_utf8_lossy(&output.stdout);
    if output.status.success() {
        Ok(stdout.to_string())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let code = output.status.code().unwrap_or(-1);
        Err(ProviderError::new_with_context(
            ErrorKind::Remote,
            format!(
                "Error running '{}', exit code {}\nstderr:\n{}\nstdout:\n{}",
                hint, code, stderr, stdout
            ),
        ))
    }
}
