pub use crate::error::QueueError;
pub use crate::task::{Credential, Task, TaskRequest, TaskStatus, TaskStore};

pub mod handlers;
pub mod middleware;
pub mod server;

pub use handlers::AppState;
pub use server::{build_router, QueueServer};
