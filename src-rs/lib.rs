pub mod config;
pub mod error;
pub mod helpers;

#[path = "task/lib.rs"]
pub mod task;
#[path = "worker/lib.rs"]
pub mod worker;
#[path = "api/lib.rs"]
pub mod api;

pub use config::ServerConfig;
pub use error::QueueError;
pub use task::{Credential, Sequencer, Task, TaskRequest, TaskSpec, TaskStatus, TaskStore};
pub use worker::{WorkerConfig, WorkerProcess};
