use std::process::ExitStatus;

use serde::Deserialize;
use serde_json::Value;

use crate::helpers::truncate;

/// Cap on raw worker output quoted back in an error message.
pub const MAX_RAW_OUTPUT: usize = 1024;

/// The JSON object a worker prints on stdout before exiting.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct WorkerEnvelope {
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub success: bool,
    #[serde(default, alias = "result")]
    pub reason: String,
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub steps: Option<Value>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    Completed {
        success: bool,
        result: String,
        steps: Option<Value>,
    },
    Failed {
        error: String,
    },
}

/// Everything learned from one worker run.
#[derive(Clone, Debug, PartialEq)]
pub struct WorkerReport {
    pub outcome: Outcome,
    /// Captured stderr, plus any notes about termination.
    pub logs: String,
}

impl WorkerReport {
    pub fn failed(error: impl Into<String>, logs: String) -> Self {
        Self {
            outcome: Outcome::Failed {
                error: error.into(),
            },
            logs,
        }
    }
}

fn describe_exit(status: ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("worker exited with status {}", code),
        None => "worker terminated by signal".to_string(),
    }
}

/// Turns a finished worker's exit status and output into an outcome.
/// A non-zero exit prefers the worker's own stderr over the bare status.
pub fn interpret(status: ExitStatus, stdout: &[u8], stderr: &str) -> Outcome {
    if !status.success() {
        let error = if stderr.trim().is_empty() {
            describe_exit(status)
        } else {
            stderr.trim_end().to_string()
        };
        return Outcome::Failed { error };
    }

    match serde_json::from_slice::<WorkerEnvelope>(stdout) {
        Err(_) => {
            let raw = String::from_utf8_lossy(stdout);
            Outcome::Failed {
                error: format!(
                    "invalid worker output: {}",
                    truncate(raw.trim(), MAX_RAW_OUTPUT)
                ),
            }
        }
        Ok(envelope) if !envelope.ok => Outcome::Failed {
            error: if envelope.error.is_empty() {
                "worker reported failure without an error message".to_string()
            } else {
                envelope.error
            },
        },
        Ok(envelope) => Outcome::Completed {
            success: envelope.success,
            result: envelope.reason,
            steps: envelope.steps,
        },
    }
}
