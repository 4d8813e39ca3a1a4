//! Error types for the simulation core.

use tessera_physics::ObjectId;
use thiserror::Error;

use crate::object::ContextId;
use crate::registry::Handle;
use crate::replication::CodecError;

/// Errors surfaced by registry and driver operations.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("handle {handle} is not registered (registry holds {len} rows)")]
    InvalidHandle { handle: Handle, len: usize },

    #[error("{object} is already registered at handle {handle}")]
    AlreadyRegistered { object: ObjectId, handle: Handle },

    #[error("{array} row landed at index {actual}, expected {expected}")]
    Misaligned {
        array: &'static str,
        expected: Handle,
        actual: usize,
    },

    #[error("simulation has no world to run against")]
    MissingContext,

    #[error("invalid simulation config: {reason}")]
    InvalidConfig { reason: &'static str },

    #[error("simulation was already started")]
    AlreadyStarted,

    #[error("simulation was stopped; it cannot be restarted")]
    Stopped,

    #[error("{object} belongs to context {actual:?}, simulation runs in {expected:?}")]
    ForeignContext {
        object: ObjectId,
        expected: ContextId,
        actual: ContextId,
    },

    #[error("failed to spawn simulation thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Why a command was not queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("command queue is full ({capacity} entries)")]
    Full { capacity: usize },

    #[error("command queue is busy")]
    Busy,

    #[error("simulation has shut down")]
    Closed,
}
