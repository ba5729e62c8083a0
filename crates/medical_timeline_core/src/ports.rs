//! crates/medical_timeline_core/src/ports.rs
//!
//! Defines the service contracts (traits) the timeline core talks to.
//! These traits form the boundary of the hexagonal architecture: the remote record
//! store and the navigation service live on the other side of them.

use async_trait::async_trait;
use crate::domain::{NoteId, NoteRecord, PatientId, Reference, WindowAction};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// The error type for all store operations.
/// This abstracts away the specific errors from the backing store (database, RPC, ...).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait NoteStore: Send + Sync {
    /// Reads the full field set of every requested note, in store-defined order.
    /// Fails with `NotFound` if any id does not exist.
    async fn read_notes(&self, ids: &[NoteId]) -> PortResult<Vec<NoteRecord>>;
}

#[async_trait]
pub trait PatientStore: Send + Sync {
    /// Reads the owner reference of a single patient.
    async fn read_owner(&self, patient_id: PatientId) -> PortResult<Reference>;
}

/// Opens record views in the host application. Fire-and-forget: delivery failures
/// belong to the implementation.
pub trait ActionDispatcher: Send + Sync {
    fn do_action(&self, action: WindowAction);
}
