pub mod descriptor;
pub mod process;
pub mod result;

pub use descriptor::JobDescriptor;
pub use process::{WorkerConfig, WorkerProcess};
pub use result::{Outcome, WorkerEnvelope, WorkerReport};
