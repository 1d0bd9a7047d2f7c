use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::helpers::truncate;
use crate::worker::WorkerProcess;

use super::store::{Dispatch, TaskStore};

/// The single consumer of the store's queue. Tasks run strictly one after
/// another in submission order; nothing else ever starts a worker.
pub struct Sequencer {
    store: Arc<TaskStore>,
    worker: WorkerProcess,
}

impl Sequencer {
    pub fn new(store: Arc<TaskStore>, worker: WorkerProcess) -> Self {
        Self { store, worker }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Runs waiting tasks until the store is closed.
    pub async fn run(self) {
        info!(worker = %self.worker.config().describe(), "sequencer started");
        loop {
            match self.store.begin_next() {
                Some(dispatch) => self.process(dispatch).await,
                None if self.store.is_closed() => break,
                None => {
                    debug!("queue empty, waiting for work");
                    self.store.wait_for_work().await;
                }
            }
        }
        info!("sequencer stopped");
    }

    async fn process(&self, dispatch: Dispatch) {
        let Dispatch {
            id,
            spec,
            credential,
            kill,
        } = dispatch;

        let span = info_span!("task", id = %id);
        async {
            info!(goal = %truncate(&spec.goal, 50), "starting task");
            let report = self.worker.run(&spec, &credential, kill).await;
            self.store.finish(&id, report);
        }
        .instrument(span)
        .await;
    }
}

/// Orderly stop: refuse new work, cancel what is still waiting, give the
/// running task `grace` to finish and kill it after that. Returns once the
/// sequencer has exited.
pub async fn drain(store: &TaskStore, mut sequencer: JoinHandle<()>, grace: Duration) {
    let cancelled = store.close();
    if cancelled > 0 {
        info!(cancelled, "cancelled queued tasks for shutdown");
    }

    if let Some(current) = store.current() {
        info!(task = %current, grace_secs = grace.as_secs(), "waiting for running task");
    }
    if tokio::time::timeout(grace, &mut sequencer).await.is_ok() {
        return;
    }

    if let Some(id) = store.cancel_current() {
        warn!(task = %id, "grace period expired, terminating running task");
    }
    if let Err(err) = sequencer.await {
        warn!(%err, "sequencer ended abnormally");
    }
}
