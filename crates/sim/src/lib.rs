//! Tessera Simulation
//!
//! Background-threaded, struct-of-arrays entity simulation. Objects are
//! integrated and collision-resolved on a dedicated thread; the results reach
//! the live objects only through command queues drained by the owning thread.
//!
//! # Architecture
//!
//! - **Registry**: Struct-of-arrays rows indexed by dense [`Handle`]s
//! - **Queue**: Bounded, lock-guarded [`CommandQueue`] with frame delays and a
//!   done-executing latch for backpressure
//! - **Simulation**: The driver owning the registry, the general queue and the
//!   background thread
//! - **Replication**: Registry snapshots and difference queries for remote peers
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tessera_physics::CollisionWorld;
//! use tessera_sim::Simulation;
//!
//! let mut sim = Simulation::builder()
//!     .world(Arc::new(CollisionWorld::new()))
//!     .build()?;
//! sim.start()?;
//!
//! loop {
//!     // Once per host frame, on the thread that built the simulation
//!     sim.tick_game_thread(1.0 / 60.0);
//! #   break;
//! }
//! # Ok::<(), tessera_sim::SimError>(())
//! ```

pub mod components;
pub mod config;
pub mod error;
pub mod object;
pub mod queue;
pub mod registry;
pub mod replication;
pub mod simulation;

pub use components::{CollisionProbe, Location, Movement, MovementInput, Rotation, Rotator};
pub use config::{ChangeDetection, LockPolicy, QueueConfig, RowDefaults, SimulationConfig};
pub use error::{QueueError, SimError};
pub use object::{ContextId, ObjectRef, WorldObject, SIM_TAG};
pub use queue::{Command, CommandQueue, Frame};
pub use registry::{Handle, ObjectUpdate, Registry};
pub use replication::{CodecError, RegistrySnapshot, ReplicationRequest, SnapshotEntry};
pub use simulation::{GeneralSender, Simulation, SimulationBuilder, StepReport};
