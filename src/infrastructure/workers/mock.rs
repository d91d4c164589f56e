//! Scriptable test doubles for the worker and reviewer ports.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Task, TaskId, WorkerHandle, WorkerInvocation, WorkerRequest};
use crate::domain::ports::{Reviewer, WorkerInvoker, WorkerRegistry};

/// One scripted worker behavior.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Exit zero with this stdout
    Output(String),
    /// Exit non-zero with this stderr
    Exit(i32, String),
    /// Signal a backoff condition
    Backoff,
    /// Never finish until cancelled
    Hang,
}

/// A record of one invocation the mock served.
#[derive(Debug, Clone)]
pub struct SeenInvocation {
    pub task_id: TaskId,
    pub worker: String,
    pub prompt: String,
}

#[derive(Default)]
struct MockState {
    /// Global FIFO consumed before anything else
    queue: VecDeque<MockResponse>,
    /// Per-(task, worker) FIFOs for multi-task scenarios
    scripts: HashMap<(TaskId, String), VecDeque<MockResponse>>,
    fallback: Option<MockResponse>,
    seen: Vec<SeenInvocation>,
}

/// Worker invoker driven by scripted responses.
#[derive(Default)]
pub struct MockWorkerInvoker {
    state: Mutex<MockState>,
}

impl MockWorkerInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every invocation succeeds with this stdout.
    pub fn with_output(self, output: impl Into<String>) -> Self {
        self.state.lock().unwrap().fallback = Some(MockResponse::Output(output.into()));
        self
    }

    /// Every invocation exits with this code and stderr.
    pub fn with_exit(self, code: i32, stderr: impl Into<String>) -> Self {
        self.state.lock().unwrap().fallback = Some(MockResponse::Exit(code, stderr.into()));
        self
    }

    /// First invocation signals backoff, the next succeeds.
    pub fn with_backoff_then_output(self, output: impl Into<String>) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.queue.push_back(MockResponse::Backoff);
            state.queue.push_back(MockResponse::Output(output.into()));
        }
        self
    }

    /// Every invocation hangs until cancelled.
    pub fn with_hang(self) -> Self {
        self.state.lock().unwrap().fallback = Some(MockResponse::Hang);
        self
    }

    /// Queue responses consumed in order, ahead of any fallback.
    pub fn push(&self, response: MockResponse) {
        self.state.lock().unwrap().queue.push_back(response);
    }

    /// Script responses for one task on one worker.
    pub fn script_for(&self, task_id: TaskId, worker: &str, responses: Vec<MockResponse>) {
        self.state
            .lock()
            .unwrap()
            .scripts
            .insert((task_id, worker.to_string()), responses.into());
    }

    /// Invocations served so far, in order.
    pub fn invocations(&self) -> Vec<SeenInvocation> {
        self.state.lock().unwrap().seen.clone()
    }

    fn next_response(&self, task_id: TaskId, worker: &str, prompt: &str) -> MockResponse {
        let mut state = self.state.lock().unwrap();
        state.seen.push(SeenInvocation {
            task_id,
            worker: worker.to_string(),
            prompt: prompt.to_string(),
        });

        if let Some(response) = state.queue.pop_front() {
            return response;
        }
        if let Some(script) = state.scripts.get_mut(&(task_id, worker.to_string())) {
            if let Some(response) = script.pop_front() {
                return response;
            }
        }
        state
            .fallback
            .clone()
            .unwrap_or_else(|| MockResponse::Output(String::new()))
    }
}

#[async_trait]
impl WorkerInvoker for MockWorkerInvoker {
    async fn invoke(
        &self,
        handle: &WorkerHandle,
        request: WorkerRequest,
        cancel: CancellationToken,
    ) -> DomainResult<WorkerInvocation> {
        let response = self.next_response(request.task_id, &handle.name, &request.prompt);
        let invocation = |output: String, stderr: String, exit_code, backoff| WorkerInvocation {
            output,
            stderr,
            exit_code,
            duration_ms: 1,
            backoff,
        };

        match response {
            MockResponse::Output(output) => {
                Ok(invocation(output, String::new(), Some(0), false))
            }
            MockResponse::Exit(code, stderr) => {
                Ok(invocation(String::new(), stderr, Some(code), false))
            }
            MockResponse::Backoff => Ok(invocation(
                String::new(),
                "FOREMAN_BACKOFF".to_string(),
                Some(75),
                true,
            )),
            MockResponse::Hang => {
                cancel.cancelled().await;
                Ok(invocation(String::new(), String::new(), None, false))
            }
        }
    }
}

/// Registry over a fixed set of handles.
pub struct StaticRegistry {
    workers: Vec<WorkerHandle>,
}

impl StaticRegistry {
    pub fn new(workers: Vec<WorkerHandle>) -> Self {
        Self { workers }
    }

    /// Registry whose handles are just the given names.
    pub fn with_names(names: &[&str]) -> Self {
        Self::new(
            names
                .iter()
                .map(|name| WorkerHandle::new(*name, format!("/bin/{name}")))
                .collect(),
        )
    }
}

#[async_trait]
impl WorkerRegistry for StaticRegistry {
    async fn resolve(&self, name: &str) -> DomainResult<Option<WorkerHandle>> {
        Ok(self.workers.iter().find(|w| w.name == name).cloned())
    }

    async fn list(&self) -> DomainResult<Vec<WorkerHandle>> {
        Ok(self.workers.clone())
    }
}

/// Reviewer returning scripted raw responses.
pub struct MockReviewer {
    name: String,
    responses: Mutex<VecDeque<String>>,
    fallback: String,
}

impl MockReviewer {
    /// Reviewer that always returns `fallback`.
    pub fn always(name: &str, fallback: &str) -> Self {
        Self {
            name: name.to_string(),
            responses: Mutex::new(VecDeque::new()),
            fallback: fallback.to_string(),
        }
    }

    /// Reviewer that returns `responses` in order, then `fallback`.
    pub fn scripted(name: &str, responses: Vec<String>, fallback: &str) -> Self {
        Self {
            name: name.to_string(),
            responses: Mutex::new(responses.into()),
            fallback: fallback.to_string(),
        }
    }
}

#[async_trait]
impl Reviewer for MockReviewer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn review(&self, _task: &Task, _output: &str) -> DomainResult<String> {
        let next = self.responses.lock().unwrap().pop_front();
        Ok(next.unwrap_or_else(|| self.fallback.clone()))
    }
}
