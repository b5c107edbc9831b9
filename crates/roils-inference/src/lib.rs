//! # roils-inference
//!
//! Generation backend client and backend lifecycle control for the ROILS
//! pipeline.
//!
//! This crate provides:
//! - [`OllamaClient`], the `/api/generate` client with a fixed per-request deadline
//! - [`SshLifecycleController`], which restarts the backend container over SSH
//! - [`NoopLifecycleController`] for deployments without a restart target
//! - Mock implementations of both seams (feature `mock`)
//!
//! # Example
//!
//! ```rust,no_run
//! use roils_core::{BackendConfig, GenerationBackend};
//! use roils_inference::OllamaClient;
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = OllamaClient::from_config(&BackendConfig::default()).unwrap();
//!     let healthy = client.health_check().await.unwrap();
//!     println!("backend healthy: {}", healthy);
//! }
//! ```

pub mod lifecycle;
pub mod ollama;

// Mock backend for tests in this and downstream crates
#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use lifecycle::{ContainerAction, NoopLifecycleController, SshLifecycleController};
pub use ollama::OllamaClient;

use std::sync::Arc;

use roils_core::{LifecycleConfig, LifecycleController, Result};

/// Build the lifecycle controller for an optional restart target.
pub fn lifecycle_from_config(config: Option<&LifecycleConfig>) -> Result<Arc<dyn LifecycleController>> {
    match config {
        Some(config) => Ok(Arc::new(SshLifecycleController::from_config(config)?)),
        None => Ok(Arc::new(NoopLifecycleController)),
    }
}
