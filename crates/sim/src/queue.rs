//! Deferred commands for the owning thread.
//!
//! The simulation thread never touches live objects. It packages the work as
//! closures and pushes them into a [`CommandQueue`]; the owning thread drains
//! the queue once per frame.
//!
//! ## Frame delay
//!
//! Every command records the owning-thread frame it was queued on and a
//! delay in frames. It becomes due once `frame - enqueued_frame >= delay`.
//! Due commands run in FIFO order; the first command that is not yet due
//! holds back everything behind it.
//!
//! ## Done-executing latch
//!
//! The latch is set once the owning thread has drained everything in the
//! queue and cleared by every enqueue. Producers use it as backpressure: a
//! per-object queue is only refilled after its previous batch was applied.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, MutexGuard};

use crate::config::{LockPolicy, QueueConfig};
use crate::error::QueueError;

/// Owning-thread frame counter value.
pub type Frame = u64;

/// A unit of deferred owning-thread work.
pub struct Command {
    job: Box<dyn FnOnce() + Send + 'static>,
    frame_delay: Frame,
    enqueued_frame: Frame,
}

impl Command {
    /// Wrap `job` so it runs `frame_delay` frames after `enqueued_frame`.
    pub fn new(job: impl FnOnce() + Send + 'static, frame_delay: Frame, enqueued_frame: Frame) -> Self {
        Self {
            job: Box::new(job),
            frame_delay,
            enqueued_frame,
        }
    }

    /// Whether the command may run on `frame`.
    #[inline]
    pub fn is_due(&self, frame: Frame) -> bool {
        frame.saturating_sub(self.enqueued_frame) >= self.frame_delay
    }

    fn run(self) {
        (self.job)()
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Command")
            .field("frame_delay", &self.frame_delay)
            .field("enqueued_frame", &self.enqueued_frame)
            .finish_non_exhaustive()
    }
}

/// Bounded FIFO of [`Command`]s with its own lock and done-executing latch.
#[derive(Debug)]
pub struct CommandQueue {
    commands: Mutex<VecDeque<Command>>,
    finished: AtomicBool,
    config: QueueConfig,
    commands_per_frame: usize,
}

impl CommandQueue {
    /// Create an empty queue. A fresh queue counts as drained.
    pub fn new(config: QueueConfig, commands_per_frame: usize) -> Self {
        Self {
            commands: Mutex::new(VecDeque::new()),
            finished: AtomicBool::new(true),
            config,
            commands_per_frame: commands_per_frame.max(1),
        }
    }

    pub fn config(&self) -> QueueConfig {
        self.config
    }

    fn acquire(&self) -> Option<MutexGuard<'_, VecDeque<Command>>> {
        match self.config.lock_policy {
            LockPolicy::Block => Some(self.commands.lock()),
            LockPolicy::Drop => self.commands.try_lock(),
        }
    }

    /// Append a command and clear the latch.
    ///
    /// Dropped with a warning when the queue is full, or when it is locked
    /// and the queue uses [`LockPolicy::Drop`].
    pub fn enqueue(&self, command: Command) -> Result<(), QueueError> {
        let Some(mut commands) = self.acquire() else {
            tracing::warn!("command queue busy, dropping command");
            return Err(QueueError::Busy);
        };

        if commands.len() >= self.config.capacity {
            tracing::warn!(capacity = self.config.capacity, "command queue full, dropping command");
            return Err(QueueError::Full {
                capacity: self.config.capacity,
            });
        }

        commands.push_back(command);
        self.wait_for_execution();
        Ok(())
    }

    /// Run due commands for `frame`. Owning thread only.
    ///
    /// No-op while the latch is set. Runs at most `commands_per_frame`
    /// commands; the lock is released while they execute. Sets the latch
    /// once nothing is left pending.
    pub fn execute_commands(&self, frame: Frame) -> usize {
        if self.done_executing() {
            return 0;
        }

        let due: Vec<Command> = {
            let mut commands = self.commands.lock();
            let ready = commands
                .iter()
                .take(self.commands_per_frame)
                .take_while(|command| command.is_due(frame))
                .count();
            commands.drain(..ready).collect()
        };

        let executed = due.len();
        for command in due {
            command.run();
        }

        let commands = self.commands.lock();
        if commands.is_empty() {
            self.finish_execution();
        }

        executed
    }

    /// Drop every pending command.
    pub fn clear(&self) {
        self.commands.lock().clear();
    }

    /// Number of pending commands.
    pub fn len(&self) -> usize {
        self.commands.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the last batch has been fully applied.
    #[inline]
    pub fn done_executing(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// Set the latch.
    #[inline]
    pub fn finish_execution(&self) {
        self.finished.store(true, Ordering::Release);
    }

    /// Clear the latch: new work is pending.
    #[inline]
    pub fn wait_for_execution(&self) {
        self.finished.store(false, Ordering::Release);
    }
}
