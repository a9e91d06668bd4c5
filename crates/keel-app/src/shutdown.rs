//! Shutdown handlers and their priority queue.
//!
//! A handler runs at most once; the first recorded outcome is returned on
//! any later execution. The queue is a max-heap keyed by priority with
//! insertion order breaking ties, so handlers of equal priority run in
//! registration order.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use keel_core::{Code, Error, Result, Severity};

/// What to do when a shutdown handler fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Log at warn level, clear the error, continue with the next handler.
    Warn,
    /// Record the error, stop, and return it to the caller.
    Abort,
    /// Log at error level and terminate the process.
    Fatal,
    /// Re-raise the error as a panic.
    Panic,
}

type Action =
    Box<dyn FnOnce(CancellationToken) -> Pin<Box<dyn Future<Output = Result<()>> + Send>> + Send>;

/// A named, prioritized callable executed once during graceful shutdown.
pub struct ShutdownHandler {
    name: String,
    priority: u8,
    timeout: Option<Duration>,
    policy: ErrorPolicy,
    action: Mutex<Option<Action>>,
    recorded: Mutex<Option<Result<()>>>,
}

impl std::fmt::Debug for ShutdownHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownHandler")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("timeout", &self.timeout)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl ShutdownHandler {
    /// Creates a handler.
    ///
    /// # Errors
    ///
    /// Returns a fatal error for an empty name.
    pub fn new<F, Fut>(
        name: impl Into<String>,
        priority: u8,
        policy: ErrorPolicy,
        action: F,
    ) -> Result<Self>
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::internal("shutdown handler name cannot be empty"));
        }
        Ok(Self {
            name,
            priority,
            timeout: None,
            policy,
            action: Mutex::new(Some(Box::new(move |token| Box::pin(action(token))))),
            recorded: Mutex::new(None),
        })
    }

    /// Bounds the handler's own execution time.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Returns the handler name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the handler priority.
    #[must_use]
    pub fn priority(&self) -> u8 {
        self.priority
    }

    /// Returns the handler's error policy.
    #[must_use]
    pub fn policy(&self) -> ErrorPolicy {
        self.policy
    }

    fn record(&self, outcome: &Result<()>) {
        let mut recorded = self.recorded.lock().unwrap_or_else(|e| e.into_inner());
        if recorded.is_none() {
            *recorded = Some(outcome.clone());
        }
    }

    /// Runs the handler action at most once.
    ///
    /// When `shutdown` is already canceled and the action has not run, the
    /// handler fails immediately with a synthesized deadline-reached error.
    /// A configured timeout derives a child deadline for the action.
    ///
    /// # Errors
    ///
    /// Returns the action's error, the recorded first outcome on repeated
    /// calls, or the synthesized deadline/timeout error.
    pub async fn execute(&self, shutdown: &CancellationToken) -> Result<()> {
        if let Some(outcome) = self
            .recorded
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
        {
            return outcome;
        }

        if shutdown.is_cancelled() {
            let err = self.deadline_error();
            self.record(&Err(err.clone()));
            return Err(err);
        }

        let action = self
            .action
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        let Some(action) = action else {
            // Raced with another execution; report its outcome.
            return self
                .recorded
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .clone()
                .unwrap_or(Ok(()));
        };

        let child = shutdown.child_token();
        let outcome = match self.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, action(child)).await {
                Ok(result) => result,
                Err(_) => Err(Error::build()
                    .op("shutdown.handler")
                    .code(Code::REQUEST_TIMEOUT)
                    .severity(Severity::Runtime)
                    .kv("handler", &self.name)
                    .kv("timeoutMs", timeout.as_millis())
                    .msg("handler timed out")
                    .finish()
                    .unwrap_or_else(|| Error::new("handler timed out"))),
            },
            None => action(child).await,
        };

        self.record(&outcome);
        outcome
    }

    fn deadline_error(&self) -> Error {
        Error::build()
            .op("shutdown.handler")
            .code(Code::EXPIRED_CONTEXT)
            .severity(Severity::Runtime)
            .kv("handler", &self.name)
            .msg("shutdown deadline reached before handler ran")
            .finish()
            .unwrap_or_else(|| Error::new("shutdown deadline reached"))
    }
}

struct Entry {
    priority: u8,
    seq: u64,
    handler: ShutdownHandler,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap: highest priority first, earliest registration among
        // equals.
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Priority queue of shutdown handlers.
#[derive(Default)]
pub(crate) struct HandlerQueue {
    heap: BinaryHeap<Entry>,
    next_seq: u64,
}

impl HandlerQueue {
    pub(crate) fn push(&mut self, handler: ShutdownHandler) {
        let entry = Entry {
            priority: handler.priority(),
            seq: self.next_seq,
            handler,
        };
        self.next_seq += 1;
        self.heap.push(entry);
    }

    /// Drains the queue highest-priority-first, FIFO among equals.
    pub(crate) fn drain(&mut self) -> Vec<ShutdownHandler> {
        let mut ordered = Vec::with_capacity(self.heap.len());
        while let Some(entry) = self.heap.pop() {
            ordered.push(entry.handler);
        }
        ordered
    }
}
