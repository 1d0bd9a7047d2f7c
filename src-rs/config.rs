use std::fmt;
use std::time::Duration;

use crate::helpers::{env_opt, env_or, env_parse};
use crate::worker::WorkerConfig;

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_WORKER_PATH: &str = "./worker.py";
pub const DEFAULT_INTERPRETER: &str = "python3";
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;
pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 30;

#[derive(Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub worker_path: String,
    /// Program used to launch the worker script; `None` executes it directly.
    pub worker_interpreter: Option<String>,
    pub queue_capacity: usize,
    pub shutdown_grace: Duration,
    pub server_key: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            worker_path: DEFAULT_WORKER_PATH.to_string(),
            worker_interpreter: Some(DEFAULT_INTERPRETER.to_string()),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            shutdown_grace: Duration::from_secs(DEFAULT_SHUTDOWN_GRACE_SECS),
            server_key: None,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let interpreter = match std::env::var("WORKER_INTERPRETER") {
            Ok(value) if value.trim().is_empty() => None,
            Ok(value) => Some(value.trim().to_string()),
            Err(_) => Some(DEFAULT_INTERPRETER.to_string()),
        };
        Self {
            port: env_parse("PORT", DEFAULT_PORT),
            worker_path: env_or("WORKER_PATH", DEFAULT_WORKER_PATH),
            worker_interpreter: interpreter,
            queue_capacity: env_parse("QUEUE_CAPACITY", DEFAULT_QUEUE_CAPACITY).max(1),
            shutdown_grace: Duration::from_secs(env_parse(
                "SHUTDOWN_GRACE_SECS",
                DEFAULT_SHUTDOWN_GRACE_SECS,
            )),
            server_key: env_opt("DROIDRUN_SERVER_KEY"),
        }
    }

    /// Positional overrides: `[port] [worker_path]`.
    pub fn with_args(mut self, args: &[String]) -> Self {
        if let Some(port) = args.first().and_then(|raw| raw.parse::<u16>().ok()) {
            self.port = port;
        }
        if let Some(path) = args.get(1).filter(|raw| !raw.trim().is_empty()) {
            self.worker_path = path.clone();
        }
        self
    }

    pub fn worker(&self) -> WorkerConfig {
        WorkerConfig::script(self.worker_interpreter.as_deref(), &self.worker_path)
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("port", &self.port)
            .field("worker_path", &self.worker_path)
            .field("worker_interpreter", &self.worker_interpreter)
            .field("queue_capacity", &self.queue_capacity)
            .field("shutdown_grace", &self.shutdown_grace)
            .field("server_key", &self.server_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positional_args_override_port_and_worker() {
        let args = vec!["9001".to_string(), "/opt/worker.py".to_string()];
        let cfg = ServerConfig::default().with_args(&args);
        assert_eq!(cfg.port, 9001);
        assert_eq!(cfg.worker_path, "/opt/worker.py");
    }

    #[test]
    fn unparsable_port_keeps_default() {
        let cfg = ServerConfig::default().with_args(&["not-a-port".to_string()]);
        assert_eq!(cfg.port, DEFAULT_PORT);
        assert_eq!(cfg.worker_path, DEFAULT_WORKER_PATH);
    }

    #[test]
    fn worker_command_uses_interpreter() {
        let cfg = ServerConfig::default();
        let worker = cfg.worker();
        assert_eq!(worker.program, "python3");
        assert_eq!(worker.args, vec!["./worker.py".to_string()]);

        let direct = ServerConfig {
            worker_interpreter: None,
            ..ServerConfig::default()
        }
        .worker();
        assert_eq!(direct.program, "./worker.py");
        assert!(direct.args.is_empty());
    }

    #[test]
    fn debug_output_hides_server_key() {
        let cfg = ServerConfig {
            server_key: Some("hunter2".to_string()),
            ..ServerConfig::default()
        };
        let rendered = format!("{:?}", cfg);
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }
}
