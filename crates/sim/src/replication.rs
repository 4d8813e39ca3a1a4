//! Registry snapshots for replication.
//!
//! A [`RegistrySnapshot`] copies every row's transform in handle order. Two
//! snapshots can be diffed to find rows a remote peer needs resent, and the
//! binary codec packs them for the wire.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use tessera_physics::ObjectId;
use thiserror::Error;

use crate::components::Rotator;
use crate::registry::Handle;

/// Errors that can occur during snapshot encoding/decoding.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("encode error: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("decode error: {0}")]
    Decode(#[from] bincode::error::DecodeError),
}

/// A pending request to push one row to remote peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicationRequest {
    pub handle: Handle,
    /// Don't send the row back to the peer it came from.
    pub skip_source: bool,
}

/// One row of a [`RegistrySnapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub object: ObjectId,
    pub position: Vec3,
    pub velocity: Vec3,
    pub rotation: Rotator,
}

/// Transform state of every registered row, indexed by handle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    pub entries: Vec<SnapshotEntry>,
}

impl RegistrySnapshot {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Handles where `client` disagrees with this snapshot.
    ///
    /// A row differs when the client lacks it, holds a different object at
    /// that handle, or its position or any rotation axis is off by more than
    /// `tolerance`. Rows the client has beyond our length are ignored.
    pub fn differences(&self, client: &RegistrySnapshot, tolerance: f32) -> Vec<Handle> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(handle, ours)| match client.entries.get(*handle) {
                None => true,
                Some(theirs) => {
                    theirs.object != ours.object
                        || theirs.position.distance(ours.position) > tolerance
                        || theirs.rotation.max_difference(&ours.rotation) > tolerance
                }
            })
            .map(|(handle, _)| handle)
            .collect()
    }

    /// Encode to the compact binary wire format.
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        Ok(bincode::serde::encode_to_vec(self, bincode::config::standard())?)
    }

    /// Decode from bytes produced by [`Self::encode`].
    pub fn decode(data: &[u8]) -> Result<Self, CodecError> {
        let (snapshot, _) = bincode::serde::decode_from_slice(data, bincode::config::standard())?;
        Ok(snapshot)
    }
}
