use std::{
    sync::{
        mpsc,
        Arc,
    },
    thread,
};

use tokio::runtime::Runtime;

use super::TaskResult;

/// Owns the background runtime and the completion channel. Background work
/// runs on its own thread and drives the runtime with `block_on`; the
/// foreground drains `poll_results` and is the only context that applies
/// completions to shared state.
pub struct TaskManager {
    runtime: Arc<Runtime>,
    receiver: mpsc::Receiver<TaskResult>,
    sender: mpsc::Sender<TaskResult>,
}

impl TaskManager {
    pub fn new() -> Self {
        let runtime = Arc::new(Runtime::new().expect("Failed to create TaskManager runtime"));

        let (sender, receiver) = mpsc::channel();

        Self { runtime, receiver, sender }
    }

    pub fn poll_results(&mut self) -> Vec<TaskResult> {
        let mut results = Vec::new();

        while let Ok(result) = self.receiver.try_recv() {
            results.push(result);
        }

        results
    }

    /// Sender end of the completion channel, for adapters that report
    /// progress from a long-running job.
    pub fn sender(&self) -> mpsc::Sender<TaskResult> {
        self.sender.clone()
    }

    fn task_context(&self) -> (mpsc::Sender<TaskResult>, Arc<Runtime>) {
        (self.sender.clone(), self.runtime.clone())
    }

    /// Run a job on a background thread and deliver its result through the
    /// completion channel. The job gets the shared runtime for async work.
    pub fn run_detached<F>(&self, job: F)
    where
        F: FnOnce(&Runtime) -> TaskResult + Send + 'static,
    {
        let (sender, runtime) = self.task_context();

        thread::spawn(move || {
            let result = job(&runtime);
            let _ = sender.send(result);
        });
    }
}

impl Default for TaskManager {
    fn default() -> Self {
        Self::new()
    }
}
