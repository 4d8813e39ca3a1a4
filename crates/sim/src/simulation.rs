//! Simulation driver.
//!
//! A [`Simulation`] owns the registry, the general command queue and one
//! background thread. The background thread integrates every registered
//! object at a fixed rate and packages the results as commands; the thread
//! that built the simulation (the owning thread) applies them by calling
//! [`Simulation::tick_game_thread`] once per host frame.
//!
//! ```text
//! background:  lock registry ─ update locations ─ update rotations ─ unlock ─ enqueue
//! owning:      tick_game_thread ─ general queue ─ per-object queues ─ frame += 1
//! ```
//!
//! The registry lock and a queue lock are never held together. The owning
//! thread never takes the registry lock during a tick: it reads a published
//! copy of the per-object queue list that register and unregister refresh.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tessera_physics::SpatialQuery;

use crate::config::SimulationConfig;
use crate::error::{QueueError, SimError};
use crate::object::{ContextId, ObjectRef};
use crate::queue::{Command, CommandQueue, Frame};
use crate::registry::{Handle, ObjectUpdate, Registry};
use crate::replication::{RegistrySnapshot, ReplicationRequest};

const THREAD_NAME: &str = "tessera-simulation";

/// Builder for [`Simulation`].
///
/// A world is required; everything else has defaults.
#[derive(Default)]
pub struct SimulationBuilder {
    world: Option<Arc<dyn SpatialQuery>>,
    context: Option<ContextId>,
    config: SimulationConfig,
}

impl SimulationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Static geometry the collision resolver sweeps against.
    pub fn world(mut self, world: Arc<dyn SpatialQuery>) -> Self {
        self.world = Some(world);
        self
    }

    /// Host world this simulation serves. Objects reporting another
    /// context are refused at registration.
    pub fn context(mut self, context: ContextId) -> Self {
        self.context = Some(context);
        self
    }

    pub fn config(mut self, config: SimulationConfig) -> Self {
        self.config = config;
        self
    }

    /// Create the simulation. The calling thread becomes the owning thread.
    ///
    /// The background thread is not started; see [`Simulation::start`].
    pub fn build(self) -> Result<Simulation, SimError> {
        let world = self.world.ok_or(SimError::MissingContext)?;
        self.config
            .validate()
            .map_err(|reason| SimError::InvalidConfig { reason })?;

        let rng = match self.config.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        };

        let shared = Shared {
            registry: Mutex::new(Registry::new(&self.config)),
            general_queue: CommandQueue::new(self.config.general_queue, self.config.commands_per_frame),
            object_queues: RwLock::new(PublishedQueues::empty()),
            published_generation: AtomicU64::new(0),
            step_lock: Mutex::new(()),
            world,
            context: self.context,
            running: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            frame: AtomicU64::new(0),
            rng: Mutex::new(rng),
            owner: thread::current().id(),
            config: self.config,
        };

        tracing::debug!(rate = shared.config.target_rate, "simulation created");

        Ok(Simulation {
            shared: Arc::new(shared),
            thread: None,
        })
    }
}

/// What one background iteration did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepReport {
    /// Handles whose position or orientation changed, ascending.
    pub changed: Vec<Handle>,
    /// Updates queued for the owning thread.
    pub enqueued: usize,
    /// Changed handles left for a later tick because their queue had not
    /// drained yet or refused the command.
    pub deferred: usize,
}

/// Per-object queues as of one registry generation.
struct PublishedQueues {
    generation: u64,
    queues: Arc<[Arc<CommandQueue>]>,
}

impl PublishedQueues {
    fn empty() -> Self {
        Self {
            generation: 0,
            queues: Arc::from(Vec::new()),
        }
    }
}

/// State shared between the owning thread and the background thread.
struct Shared {
    registry: Mutex<Registry>,
    general_queue: CommandQueue,
    object_queues: RwLock<PublishedQueues>,
    published_generation: AtomicU64,
    // Held for a whole step so the latch check and the enqueue can't interleave
    step_lock: Mutex<()>,
    world: Arc<dyn SpatialQuery>,
    context: Option<ContextId>,
    running: AtomicBool,
    stopped: AtomicBool,
    frame: AtomicU64,
    rng: Mutex<SmallRng>,
    owner: ThreadId,
    config: SimulationConfig,
}

impl Shared {
    fn current_frame(&self) -> Frame {
        self.frame.load(Ordering::Acquire)
    }

    fn frame_delay(&self) -> Frame {
        match self.config.max_frame_delay {
            0 => 0,
            max => self.rng.lock().gen_range(0..max),
        }
    }

    fn assert_owner(&self, operation: &str) {
        assert_owner(self.owner, operation);
    }

    /// Run `f` on the registry, then republish the queue list if the row
    /// layout changed. The publish happens after the registry lock drops.
    fn with_registry<R>(&self, f: impl FnOnce(&mut Registry) -> R) -> R {
        let (result, layout) = {
            let mut registry = self.registry.lock();
            let result = f(&mut registry);
            let generation = registry.generation();
            let layout = (generation != self.published_generation.load(Ordering::Acquire))
                .then(|| (generation, registry.queues()));
            (result, layout)
        };

        if let Some((generation, queues)) = layout {
            self.publish_queues(generation, queues);
        }
        result
    }

    fn publish_queues(&self, generation: u64, queues: Vec<Arc<CommandQueue>>) {
        let mut published = self.object_queues.write();
        // A concurrent mutation may already have published a newer layout
        if generation > published.generation {
            *published = PublishedQueues {
                generation,
                queues: queues.into(),
            };
            self.published_generation.store(generation, Ordering::Release);
        }
    }

    fn step(&self, delta: f32) -> StepReport {
        let _step = self.step_lock.lock();

        let (changed, pending) = {
            let mut registry = self.registry.lock();

            let mut changed = registry.update_locations(delta, self.world.as_ref());
            changed.extend(registry.update_rotations());
            changed.sort_unstable();
            changed.dedup();

            let pending: Vec<(Arc<CommandQueue>, ObjectUpdate)> = changed
                .iter()
                .filter_map(|&handle| {
                    let queue = registry.queue(handle).ok()?;
                    if !queue.done_executing() {
                        return None;
                    }
                    let update = registry.object_update(handle, delta).ok()?;
                    Some((Arc::clone(queue), update))
                })
                .collect();

            (changed, pending)
        };

        let frame = self.current_frame();
        let mut enqueued = 0;
        for (queue, update) in pending {
            queue.clear();

            let owner = self.owner;
            let command = Command::new(
                move || {
                    assert_owner(owner, "object update");
                    update.apply();
                },
                self.frame_delay(),
                frame,
            );
            if queue.enqueue(command).is_ok() {
                enqueued += 1;
            }
        }

        let report = StepReport {
            deferred: changed.len() - enqueued,
            changed,
            enqueued,
        };
        tracing::trace!(
            delta,
            changed = report.changed.len(),
            enqueued = report.enqueued,
            deferred = report.deferred,
            "simulation step"
        );
        report
    }

    fn enqueue_general(&self, job: impl FnOnce() + Send + 'static) -> Result<(), QueueError> {
        self.general_queue
            .enqueue(Command::new(job, 0, self.current_frame()))
    }
}

fn assert_owner(owner: ThreadId, operation: &str) {
    assert_eq!(
        thread::current().id(),
        owner,
        "{operation} must run on the owning thread"
    );
}

/// Background loop. Runs until [`Simulation::stop`].
fn run(shared: Arc<Shared>) {
    let span = tracing::info_span!("simulation");
    let _enter = span.enter();

    let frame_time = Duration::from_secs_f64(shared.config.frame_time());
    tracing::debug!(rate = shared.config.target_rate, "simulation thread started");

    let mut last = Instant::now();
    while shared.running.load(Ordering::Acquire) {
        let started = Instant::now();
        let delta = started.duration_since(last).as_secs_f32();
        last = started;

        shared.step(delta);

        // Overruns skip the sleep rather than skipping work
        if let Some(remaining) = frame_time.checked_sub(started.elapsed()) {
            thread::sleep(remaining);
        }
    }

    tracing::debug!("simulation thread stopped");
}

/// Background-threaded simulation bound to one world.
///
/// Lifecycle is `build` → [`start`](Self::start) → [`stop`](Self::stop) →
/// drop. Stopping is terminal. Dropping stops and joins the background
/// thread before any shared state is released.
pub struct Simulation {
    shared: Arc<Shared>,
    thread: Option<JoinHandle<()>>,
}

impl Simulation {
    pub fn builder() -> SimulationBuilder {
        SimulationBuilder::new()
    }

    /// Launch the background thread.
    pub fn start(&mut self) -> Result<(), SimError> {
        if self.thread.is_some() {
            return Err(SimError::AlreadyStarted);
        }
        if self.shared.stopped.load(Ordering::Acquire) {
            return Err(SimError::Stopped);
        }

        self.shared.running.store(true, Ordering::Release);
        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || run(shared));

        match spawned {
            Ok(handle) => {
                self.thread = Some(handle);
                Ok(())
            }
            Err(err) => {
                self.shared.running.store(false, Ordering::Release);
                Err(err.into())
            }
        }
    }

    /// Ask the background thread to exit after its current iteration.
    ///
    /// Terminal: a stopped simulation can't be started again.
    pub fn stop(&self) {
        self.shared.stopped.store(true, Ordering::Release);
        if self.shared.running.swap(false, Ordering::AcqRel) {
            tracing::debug!("simulation stop requested");
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.shared.config
    }

    pub fn world(&self) -> &Arc<dyn SpatialQuery> {
        &self.shared.world
    }

    /// Owning-thread frame counter. Advances once per [`Self::tick_game_thread`].
    pub fn frame(&self) -> Frame {
        self.shared.current_frame()
    }

    /// Run one background iteration synchronously.
    ///
    /// Useful for hosts that drive the simulation themselves and for tests.
    /// Safe to call while the background thread runs: whole iterations,
    /// enqueueing included, are serialized.
    pub fn step(&self, delta: f32) -> StepReport {
        self.shared.step(delta)
    }

    /// Apply queued work. Owning thread only; panics elsewhere.
    ///
    /// Drains the general queue, then every per-object queue, at the
    /// current frame, then advances the frame counter. Returns the number of
    /// commands executed.
    pub fn tick_game_thread(&self, delta: f32) -> usize {
        self.shared.assert_owner("tick_game_thread");

        let frame = self.shared.current_frame();
        let mut executed = self.shared.general_queue.execute_commands(frame);

        let queues = Arc::clone(&self.shared.object_queues.read().queues);
        executed += queues
            .iter()
            .map(|queue| queue.execute_commands(frame))
            .sum::<usize>();

        self.shared.frame.fetch_add(1, Ordering::AcqRel);
        tracing::trace!(frame, delta, executed, "owning thread tick");
        executed
    }

    /// Apply a captured update immediately. Owning thread only; panics elsewhere.
    pub fn apply_object_update(&self, update: &ObjectUpdate) {
        self.shared.assert_owner("apply_object_update");
        update.apply();
    }

    /// Add `object` to the simulation.
    pub fn register_actor(&self, object: ObjectRef) -> Result<Handle, SimError> {
        let result = match (self.shared.context, object.owning_context()) {
            (Some(expected), Some(actual)) if expected != actual => Err(SimError::ForeignContext {
                object: object.id(),
                expected,
                actual,
            }),
            _ => self.shared.with_registry(|registry| registry.register(object)),
        };
        if let Err(err) = &result {
            tracing::warn!(%err, "registration failed");
        }
        result
    }

    /// Remove a row. Later handles shift down by one.
    pub fn unregister_actor(&self, handle: Handle) -> Result<ObjectRef, SimError> {
        self.shared.with_registry(|registry| registry.unregister(handle))
    }

    /// Schedule `job` to run on the owning thread at the next tick.
    pub fn enqueue_general_command(&self, job: impl FnOnce() + Send + 'static) -> Result<(), QueueError> {
        self.shared.enqueue_general(job)
    }

    /// Cloneable handle for scheduling owning-thread work from other threads.
    pub fn general_sender(&self) -> GeneralSender {
        GeneralSender {
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Run `f` with exclusive access to the registry.
    pub fn with_registry<R>(&self, f: impl FnOnce(&mut Registry) -> R) -> R {
        self.shared.with_registry(f)
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        self.shared.registry.lock().snapshot()
    }

    /// Mark `handle` for replication to remote peers.
    pub fn replicate_index(&self, handle: Handle, skip_source: bool) -> Result<(), SimError> {
        self.shared.registry.lock().replicate_index(handle, skip_source)
    }

    pub fn take_replication_requests(&self) -> Vec<ReplicationRequest> {
        self.shared.registry.lock().take_replication_requests()
    }

    /// Handles where `client` diverges from the local state by more than `tolerance`.
    pub fn get_differences(&self, client: &RegistrySnapshot, tolerance: f32) -> Vec<Handle> {
        self.shared.registry.lock().get_differences(client, tolerance)
    }
}

impl Drop for Simulation {
    fn drop(&mut self) {
        self.stop();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("simulation thread panicked");
            }
        }
    }
}

impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("running", &self.is_running())
            .field("frame", &self.frame())
            .field("started", &self.thread.is_some())
            .finish_non_exhaustive()
    }
}

/// Schedules general owning-thread work without borrowing the [`Simulation`].
///
/// Holds a weak reference, so commands may carry a sender without keeping
/// the simulation alive.
#[derive(Clone)]
pub struct GeneralSender {
    shared: Weak<Shared>,
}

impl GeneralSender {
    pub fn send(&self, job: impl FnOnce() + Send + 'static) -> Result<(), QueueError> {
        let shared = self.shared.upgrade().ok_or(QueueError::Closed)?;
        shared.enqueue_general(job)
    }
}

impl std::fmt::Debug for GeneralSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneralSender")
            .field("open", &(self.shared.strong_count() > 0))
            .finish()
    }
}
