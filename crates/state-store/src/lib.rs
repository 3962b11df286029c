//! Per-Device State Store
//!
//! Every handler keeps its derived per-device state (a "facet") behind
//! one store. Facets are JSON-encoded, so the in-memory backing and an
//! external key-value cache behave the same way. Facets that must
//! survive restarts additionally mirror themselves onto the device
//! entity.

mod backend;
mod facet;
mod store;

pub use backend::{MemoryBackend, StateBackend};
pub use facet::{DurableFacet, Facet};
pub use store::StateStore;

use thiserror::Error;

/// State store errors
#[derive(Debug, Error)]
pub enum StateError {
    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
