use std::collections::{HashMap, VecDeque};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::{oneshot, Notify};
use tracing::{debug, info, warn};

use crate::error::QueueError;
use crate::helpers::{random_id, truncate};
use crate::worker::{Outcome, WorkerReport};

use super::types::{Credential, Task, TaskRequest, TaskSpec, TaskStatus};
use super::validate;

/// Bytes of randomness behind a task id (8 hex characters).
const ID_BYTES: usize = 4;

/// What the sequencer needs to execute one task.
#[derive(Debug)]
pub struct Dispatch {
    pub id: String,
    pub spec: TaskSpec,
    pub credential: Credential,
    /// Fires when the task is cancelled while its worker runs.
    pub kill: oneshot::Receiver<()>,
}

struct TaskEntry {
    task: Task,
    credential: Credential,
}

#[derive(Default)]
struct QueueState {
    tasks: HashMap<String, TaskEntry>,
    /// Ids still waiting to run, oldest first. This is the work queue.
    pending: VecDeque<String>,
    /// The task whose worker is executing; cleared as soon as it leaves
    /// `running`, even while the worker is still being reaped.
    current: Option<String>,
    kill_switch: Option<oneshot::Sender<()>>,
    closed: bool,
}

impl QueueState {
    /// Cancels `id` if it is still queued or running. Must be called with the
    /// write lock held.
    fn cancel(&mut self, id: &str) -> bool {
        let is_current = self.current.as_deref() == Some(id);
        let entry = match self.tasks.get_mut(id) {
            Some(entry) => entry,
            None => return false,
        };

        match entry.task.status {
            TaskStatus::Queued => {
                entry.task.transition(TaskStatus::Cancelled);
                self.pending.retain(|pending| pending != id);
                info!(task = %id, "cancelled queued task");
                true
            }
            TaskStatus::Running => {
                entry.task.transition(TaskStatus::Cancelled);
                if is_current {
                    self.current = None;
                    if let Some(kill) = self.kill_switch.take() {
                        if kill.send(()).is_err() {
                            debug!(task = %id, "worker already exited before termination");
                        }
                    }
                }
                info!(task = %id, "cancelled running task");
                true
            }
            _ => false,
        }
    }
}

/// In-memory registry of every task plus the order of those still waiting.
///
/// All bookkeeping (records, pending order, the running marker and its kill
/// switch) lives behind a single lock so readers always see one consistent
/// view of it. The sequencer is woken through `work`; it never holds queue
/// entries of its own.
pub struct TaskStore {
    capacity: usize,
    state: RwLock<QueueState>,
    work: Notify,
}

impl TaskStore {
    /// Creates a store that keeps at most `capacity` tasks waiting.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: RwLock::new(QueueState::default()),
            work: Notify::new(),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, QueueState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, QueueState> {
        self.state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Validates `request`, records a queued task and wakes the sequencer.
    /// Never waits: with `capacity` tasks already waiting the submission is
    /// reported as `QueueError::QueueFull` and nothing is recorded.
    pub fn submit(&self, request: TaskRequest, credential: Credential) -> Result<Task, QueueError> {
        let spec = validate::normalize(request, &credential)?;

        let mut guard = self.write();
        let state = &mut *guard;
        if state.closed {
            return Err(QueueError::ShuttingDown);
        }
        if state.pending.len() >= self.capacity {
            warn!(capacity = self.capacity, "rejecting task, queue is full");
            return Err(QueueError::QueueFull {
                capacity: self.capacity,
            });
        }

        let id = loop {
            let candidate = random_id(ID_BYTES);
            if !state.tasks.contains_key(&candidate) {
                break candidate;
            }
        };

        let task = Task::queued(id.clone(), spec);
        state.tasks.insert(
            id.clone(),
            TaskEntry {
                task: task.clone(),
                credential,
            },
        );
        state.pending.push_back(id.clone());
        let position = state.pending.len();
        drop(guard);
        self.work.notify_one();

        info!(
            task = %id,
            provider = %task.request.provider,
            model = %task.request.model,
            position,
            goal = %truncate(&task.request.goal, 50),
            "task queued"
        );
        Ok(task)
    }

    pub fn get(&self, id: &str) -> Result<Task, QueueError> {
        self.read()
            .tasks
            .get(id)
            .map(|entry| entry.task.clone())
            .ok_or_else(|| QueueError::NotFound(id.to_string()))
    }

    /// Snapshot of every tracked task, oldest first.
    pub fn all(&self) -> Vec<Task> {
        let state = self.read();
        let mut items: Vec<Task> = state.tasks.values().map(|entry| entry.task.clone()).collect();
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        items
    }

    /// Number of tasks that have not started yet.
    pub fn size(&self) -> usize {
        self.read().pending.len()
    }

    pub fn current(&self) -> Option<String> {
        self.read().current.clone()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_closed(&self) -> bool {
        self.read().closed
    }

    /// 0 while running, the 1-based rank among waiting tasks while queued,
    /// -1 otherwise.
    pub fn position(&self, id: &str) -> i64 {
        let state = self.read();
        if state.current.as_deref() == Some(id) {
            return 0;
        }
        state
            .pending
            .iter()
            .position(|pending| pending == id)
            .map(|idx| idx as i64 + 1)
            .unwrap_or(-1)
    }

    /// Moves a queued or running task to `cancelled`, terminating its worker
    /// if it is the one executing. Returns whether a transition happened.
    pub fn cancel(&self, id: &str) -> bool {
        self.write().cancel(id)
    }

    /// Cancels whatever task is running, returning its id.
    pub fn cancel_current(&self) -> Option<String> {
        let mut state = self.write();
        let id = state.current.clone()?;
        if state.cancel(&id) {
            Some(id)
        } else {
            None
        }
    }

    /// Hard reset: terminates the running worker and forgets every task,
    /// including those still waiting. Returns how many tasks existed.
    pub fn clear(&self) -> usize {
        let mut guard = self.write();
        let state = &mut *guard;
        if let Some(kill) = state.kill_switch.take() {
            if kill.send(()).is_err() {
                debug!("worker already exited before clear");
            }
        }
        let count = state.tasks.len();
        state.tasks.clear();
        state.pending.clear();
        state.current = None;
        info!(cleared = count, "queue cleared");
        count
    }

    /// Stops accepting submissions and cancels every queued task, so the
    /// sequencer exits after the running task. Returns the number of queued
    /// tasks cancelled.
    pub fn close(&self) -> usize {
        let mut guard = self.write();
        let state = &mut *guard;
        state.closed = true;
        let waiting: Vec<String> = state.pending.iter().cloned().collect();
        let mut cancelled = 0;
        for id in &waiting {
            if state.cancel(id) {
                cancelled += 1;
            }
        }
        drop(guard);
        self.work.notify_one();
        cancelled
    }

    /// Resolves once a submission or `close` happened since the last call.
    pub(crate) async fn wait_for_work(&self) {
        self.work.notified().await;
    }

    /// Takes the oldest waiting task and marks it running. Returns `None`
    /// when nothing is waiting or the store is closed.
    pub(crate) fn begin_next(&self) -> Option<Dispatch> {
        let mut guard = self.write();
        let state = &mut *guard;
        if state.closed {
            return None;
        }
        debug_assert!(state.current.is_none(), "a task is already running");

        while let Some(id) = state.pending.pop_front() {
            let task_entry = match state.tasks.get_mut(&id) {
                Some(entry) => entry,
                None => continue,
            };
            if !task_entry.task.transition(TaskStatus::Running) {
                continue;
            }
            let (kill_tx, kill_rx) = oneshot::channel();
            let dispatch = Dispatch {
                id: id.clone(),
                spec: task_entry.task.request.clone(),
                credential: task_entry.credential.clone(),
                kill: kill_rx,
            };
            state.current = Some(id);
            state.kill_switch = Some(kill_tx);
            return Some(dispatch);
        }
        None
    }

    /// Records the worker's report. A task cancelled while running keeps its
    /// `cancelled` status; only the captured logs are attached.
    pub(crate) fn finish(&self, id: &str, report: WorkerReport) {
        let mut guard = self.write();
        let state = &mut *guard;
        if state.current.as_deref() == Some(id) {
            state.current = None;
            state.kill_switch = None;
        }

        let entry = match state.tasks.get_mut(id) {
            Some(entry) => entry,
            None => {
                debug!(task = %id, "task discarded before its worker finished");
                return;
            }
        };
        let task = &mut entry.task;
        if !report.logs.is_empty() {
            task.logs = Some(report.logs);
        }

        match report.outcome {
            Outcome::Completed {
                success,
                result,
                steps,
            } => {
                if task.transition(TaskStatus::Completed) {
                    task.success = Some(success);
                    task.result = Some(result);
                    task.steps = steps;
                    info!(task = %id, success, "task completed");
                }
            }
            Outcome::Failed { error } => {
                if task.transition(TaskStatus::Failed) {
                    warn!(task = %id, error = %truncate(&error, 200), "task failed");
                    task.success = Some(false);
                    task.error = Some(error);
                }
            }
        }
        if task.status == TaskStatus::Cancelled {
            info!(task = %id, "task stayed cancelled, worker result discarded");
        }
    }
}
