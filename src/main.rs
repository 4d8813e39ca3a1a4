//! Tessera - headless host
//!
//! Builds a small walled arena, registers a handful of actors and drives the
//! owning-thread side of the simulation at 60 Hz while the background thread
//! runs at its own rate.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use glam::Vec3;
use parking_lot::Mutex;
use tessera_physics::{CollisionWorld, ObjectId};
use tessera_sim::{
    CollisionProbe, Movement, MovementInput, Rotator, Simulation, SimulationConfig, WorldObject,
};

const HOST_RATE: f64 = 60.0;
const RUN_FOR: Duration = Duration::from_secs(3);
const ARENA_HALF: f32 = 400.0;

/// Scene object owned by the host.
#[derive(Debug)]
struct DemoActor {
    id: ObjectId,
    name: String,
    position: Mutex<Vec3>,
    rotation: Mutex<Rotator>,
    tags: Mutex<Vec<String>>,
}

impl DemoActor {
    fn spawn(id: u64, position: Vec3) -> Arc<Self> {
        Arc::new(Self {
            id: ObjectId(id),
            name: format!("actor-{id}"),
            position: Mutex::new(position),
            rotation: Mutex::new(Rotator::ZERO),
            tags: Mutex::new(Vec::new()),
        })
    }
}

impl WorldObject for DemoActor {
    fn id(&self) -> ObjectId {
        self.id
    }

    fn world_position(&self) -> Vec3 {
        *self.position.lock()
    }

    fn set_world_position(&self, position: Vec3) {
        *self.position.lock() = position;
    }

    fn world_rotation(&self) -> Rotator {
        *self.rotation.lock()
    }

    fn set_world_rotation(&self, rotation: Rotator) {
        *self.rotation.lock() = rotation;
    }

    fn has_tag(&self, tag: &str) -> bool {
        self.tags.lock().iter().any(|t| t == tag)
    }

    fn add_tag(&self, tag: &str) {
        self.tags.lock().push(tag.to_owned());
    }
}

/// Four walls around the origin plus a low step in the middle.
fn build_arena() -> CollisionWorld {
    let mut world = CollisionWorld::new();
    let thickness = 10.0;
    let height = 200.0;

    for (center, half) in [
        (Vec3::new(ARENA_HALF, 0.0, 0.0), Vec3::new(thickness, ARENA_HALF, height)),
        (Vec3::new(-ARENA_HALF, 0.0, 0.0), Vec3::new(thickness, ARENA_HALF, height)),
        (Vec3::new(0.0, ARENA_HALF, 0.0), Vec3::new(ARENA_HALF, thickness, height)),
        (Vec3::new(0.0, -ARENA_HALF, 0.0), Vec3::new(ARENA_HALF, thickness, height)),
    ] {
        world.add_box(center, half);
    }
    world.add_box(Vec3::new(150.0, 150.0, -15.0), Vec3::new(60.0, 60.0, 10.0));

    world
}

fn main() -> anyhow::Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("tessera=debug".parse()?))
        .init();

    tracing::info!("Starting Tessera (headless)");

    let mut sim = Simulation::builder()
        .world(Arc::new(build_arena()))
        .config(SimulationConfig::default())
        .build()?;

    let directions = [Vec3::X, Vec3::Y, Vec3::NEG_X, Vec3::new(1.0, 1.0, 0.0).normalize()];
    let mut actors = Vec::new();
    for (i, direction) in directions.into_iter().enumerate() {
        let actor = DemoActor::spawn(i as u64, Vec3::new(i as f32 * 40.0 - 60.0, 0.0, 0.0));
        let handle = sim.register_actor(actor.clone())?;

        sim.with_registry(|registry| -> anyhow::Result<()> {
            registry.set_movement(
                handle,
                Movement {
                    collision_enabled: true,
                    deceleration: 20.0,
                    ..Movement::free(300.0, 250.0)
                },
            )?;
            registry.set_collision(
                handle,
                CollisionProbe {
                    radius: 20.0,
                    step_height: 15.0,
                    ..CollisionProbe::default()
                },
            )?;
            registry.set_movement_input(
                handle,
                MovementInput {
                    direction,
                    rotation: Vec3::new(0.0, 2.0, 0.0),
                },
            )?;
            Ok(())
        })?;

        actors.push(actor);
    }

    sim.start()?;

    let debug_sender = sim.general_sender();
    let frame_time = Duration::from_secs_f64(1.0 / HOST_RATE);
    let started = Instant::now();
    let mut last = started;

    while started.elapsed() < RUN_FOR {
        let now = Instant::now();
        let delta = now.duration_since(last).as_secs_f32();
        last = now;

        sim.tick_game_thread(delta);

        if sim.frame() % 60 == 0 {
            let frame = sim.frame();
            let positions: Vec<(String, Vec3)> = actors
                .iter()
                .map(|actor| (actor.name.clone(), actor.world_position()))
                .collect();
            if let Err(err) = debug_sender.send(move || {
                for (name, position) in &positions {
                    tracing::debug!(frame, actor = %name, ?position, "actor position");
                }
            }) {
                tracing::warn!(%err, "debug command dropped");
            }
        }

        if let Some(remaining) = frame_time.checked_sub(now.elapsed()) {
            thread::sleep(remaining);
        }
    }

    sim.stop();
    for actor in &actors {
        tracing::info!(
            actor = %actor.name,
            position = ?actor.world_position(),
            yaw = actor.world_rotation().yaw,
            "final state"
        );
    }

    Ok(())
}
