//! Error types for the simulation's outer surface.
//!
//! Tick logic never fails: absent puppets, exhausted searches and structural
//! invalidity are ordinary state. Errors only show up where documents and
//! configuration cross into the simulation.

use crate::blocks::BlockPos;
use thiserror::Error;
use uuid::Uuid;

/// Errors produced by the `SimWorld` API and persistence layer.
#[derive(Debug, Error)]
pub enum SimError {
    /// A persisted document or config could not be (de)serialized.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// No heart block entity is loaded at the given position.
    #[error("no heart at {0}")]
    NoHeartAt(BlockPos),

    /// A heart block entity is already loaded at the given position.
    #[error("heart already loaded at {0}")]
    HeartExists(BlockPos),

    /// No live entity carries the given identifier.
    #[error("unknown entity {0}")]
    UnknownEntity(Uuid),

    /// An entity with the given identifier is already loaded.
    #[error("entity {0} is already loaded")]
    DuplicateEntity(Uuid),
}

/// Convenience alias used across the API.
pub type SimResult<T> = std::result::Result<T, SimError>;
