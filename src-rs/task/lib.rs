pub mod sequencer;
pub mod store;
pub mod types;
pub mod validate;

pub use sequencer::{drain, Sequencer};
pub use store::{Dispatch, TaskStore};
pub use types::{Credential, Task, TaskRequest, TaskSpec, TaskStatus};
