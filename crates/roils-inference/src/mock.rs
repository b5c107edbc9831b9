//! Mock generation backend and lifecycle controller for deterministic testing.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use roils_core::GenerationOutcome;
//! use roils_inference::mock::{MockGenerationBackend, MockLifecycleController};
//!
//! let backend = MockGenerationBackend::new()
//!     .with_default_text("Dose error.")
//!     .script_for("event:2", [GenerationOutcome::Timeout { elapsed_ms: 45_000 }]);
//! let lifecycle = MockLifecycleController::new();
//! assert_eq!(backend.call_count(), 0);
//! assert_eq!(lifecycle.restart_count(), 0);
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use roils_core::{
    Error, GenerationBackend, GenerationOutcome, GenerationRequest, LifecycleController, Result,
};

/// Scripted reply to one generation call.
#[derive(Debug, Clone)]
pub enum MockReply {
    Outcome(GenerationOutcome),
    /// Transport failure that never reached the backend.
    Unreachable(String),
}

impl From<GenerationOutcome> for MockReply {
    fn from(outcome: GenerationOutcome) -> Self {
        Self::Outcome(outcome)
    }
}

#[derive(Debug)]
struct MockState {
    per_key: HashMap<String, VecDeque<MockReply>>,
    queue: VecDeque<MockReply>,
    default: MockReply,
    healthy: bool,
    calls: Vec<GenerationRequest>,
}

/// Mock generation backend.
///
/// Replies are chosen in order: the next scripted reply for the request's
/// record key, then the next reply from the global queue, then the default.
#[derive(Debug, Clone)]
pub struct MockGenerationBackend {
    state: Arc<Mutex<MockState>>,
}

impl Default for MockGenerationBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGenerationBackend {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                per_key: HashMap::new(),
                queue: VecDeque::new(),
                default: MockReply::Outcome(GenerationOutcome::Completed {
                    text: "Mock response".to_string(),
                }),
                healthy: true,
                calls: Vec::new(),
            })),
        }
    }

    /// Reply used once scripts are exhausted.
    pub fn with_default(self, reply: impl Into<MockReply>) -> Self {
        self.lock().default = reply.into();
        self
    }

    pub fn with_default_text(self, text: impl Into<String>) -> Self {
        self.with_default(GenerationOutcome::Completed { text: text.into() })
    }

    /// Queue replies for calls about one record key.
    pub fn script_for<I, R>(self, key: &str, replies: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<MockReply>,
    {
        self.lock()
            .per_key
            .entry(key.to_string())
            .or_default()
            .extend(replies.into_iter().map(Into::into));
        self
    }

    /// Queue replies for the next calls regardless of key.
    pub fn push(&self, reply: impl Into<MockReply>) {
        self.lock().queue.push_back(reply.into());
    }

    pub fn with_healthy(self, healthy: bool) -> Self {
        self.lock().healthy = healthy;
        self
    }

    /// Every request received, in order.
    pub fn calls(&self) -> Vec<GenerationRequest> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    pub fn calls_for(&self, key: &str) -> usize {
        self.lock().calls.iter().filter(|c| c.key == key).count()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl GenerationBackend for MockGenerationBackend {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutcome> {
        let mut guard = self.lock();
        let state = &mut *guard;
        state.calls.push(request.clone());
        let reply = state
            .per_key
            .get_mut(&request.key)
            .and_then(VecDeque::pop_front)
            .or_else(|| state.queue.pop_front())
            .unwrap_or_else(|| state.default.clone());
        match reply {
            MockReply::Outcome(outcome) => Ok(outcome),
            MockReply::Unreachable(msg) => Err(Error::Request(msg)),
        }
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.lock().healthy)
    }
}

/// Lifecycle controller that counts restarts.
#[derive(Debug, Clone, Default)]
pub struct MockLifecycleController {
    restarts: Arc<AtomicUsize>,
    fail: bool,
}

impl MockLifecycleController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every restart returns an error.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn restart_count(&self) -> usize {
        self.restarts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LifecycleController for MockLifecycleController {
    async fn restart(&self) -> Result<()> {
        self.restarts.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(Error::Lifecycle("mock restart failure".to_string()))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roils_core::{GenerationOptions, ModelId};

    fn request(key: &str) -> GenerationRequest {
        GenerationRequest {
            key: key.to_string(),
            model: ModelId::new("mistral").unwrap(),
            prompt: "p".to_string(),
            options: GenerationOptions::default(),
        }
    }

    #[tokio::test]
    async fn test_reply_order() {
        let backend = MockGenerationBackend::new()
            .with_default_text("default")
            .script_for("event:1", [GenerationOutcome::Timeout { elapsed_ms: 1 }]);
        backend.push(GenerationOutcome::Completed {
            text: "queued".into(),
        });

        let first = backend.generate(&request("event:1")).await.unwrap();
        assert!(first.is_timeout());
        let second = backend.generate(&request("event:1")).await.unwrap();
        assert_eq!(second.completion(), Some("queued"));
        let third = backend.generate(&request("event:2")).await.unwrap();
        assert_eq!(third.completion(), Some("default"));

        assert_eq!(backend.call_count(), 3);
        assert_eq!(backend.calls_for("event:1"), 2);
    }

    #[tokio::test]
    async fn test_unreachable_reply() {
        let backend = MockGenerationBackend::new()
            .with_default(MockReply::Unreachable("connection refused".into()));
        assert!(matches!(
            backend.generate(&request("event:1")).await,
            Err(Error::Request(_))
        ));
    }

    #[tokio::test]
    async fn test_lifecycle_counts() {
        let ok = MockLifecycleController::new();
        ok.restart().await.unwrap();
        assert_eq!(ok.restart_count(), 1);

        let failing = MockLifecycleController::failing();
        assert!(failing.restart().await.is_err());
        assert_eq!(failing.restart_count(), 1);
    }
}
