//! Struct-of-arrays entity registry.
//!
//! Every simulated object owns one row, identified by a dense [`Handle`].
//! Each attribute lives in its own `Vec`, all of identical length, so the
//! per-tick update walks contiguous memory.
//!
//! ## Handles
//!
//! Handles are `0..len()`. Unregistering removes the row from every column
//! and shifts later rows down by one, so handles are only meaningful within
//! one tick; holding one across an unregister is a caller bug.
//!
//! ## Threading
//!
//! The registry itself is not synchronized. The driver keeps it behind a
//! single mutex so register, unregister and the per-tick update exclude each
//! other. The only method that writes to live host objects is
//! [`Registry::update_object_location`] (and its rotation/batch siblings),
//! which must run on the owning thread.

use std::sync::Arc;

use glam::Vec3;
use tessera_physics::{check_collision, integrate, ObjectId, SpatialQuery};

use crate::components::{CollisionProbe, Location, Movement, MovementInput, Rotation, Rotator};
use crate::config::{ChangeDetection, QueueConfig, SimulationConfig};
use crate::error::SimError;
use crate::object::{ensure_tagged, ObjectRef};
use crate::queue::CommandQueue;
use crate::replication::{RegistrySnapshot, ReplicationRequest, SnapshotEntry};

/// Dense row index into the registry.
pub type Handle = usize;

/// Transform computed on the simulation thread, ready to push into a host object.
///
/// Owns everything it needs so it can cross to the owning thread after the
/// registry lock is gone.
#[derive(Clone)]
pub struct ObjectUpdate {
    pub handle: Handle,
    pub object: ObjectRef,
    pub position: Vec3,
    pub rotation: Rotator,
    /// Simulation delta the values were computed with.
    pub delta: f32,
}

impl ObjectUpdate {
    /// Write the transform into the host object. Owning thread only.
    pub fn apply(&self) {
        self.object.set_world_position(self.position);
        self.object.set_world_rotation(self.rotation);
    }
}

impl std::fmt::Debug for ObjectUpdate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectUpdate")
            .field("handle", &self.handle)
            .field("object", &self.object.id())
            .field("position", &self.position)
            .field("rotation", &self.rotation)
            .field("delta", &self.delta)
            .finish()
    }
}

/// Struct-of-arrays storage for every simulated object.
pub struct Registry {
    ids: Vec<ObjectId>,
    locations: Vec<Location>,
    rotations: Vec<Rotation>,
    movements: Vec<Movement>,
    collisions: Vec<CollisionProbe>,
    inputs: Vec<MovementInput>,
    queues: Vec<Arc<CommandQueue>>,
    // Host objects last: they are only touched on the owning thread
    objects: Vec<ObjectRef>,

    replication: Vec<ReplicationRequest>,
    generation: u64,

    defaults: crate::config::RowDefaults,
    queue_config: QueueConfig,
    commands_per_frame: usize,
    change_detection: ChangeDetection,
}

impl Registry {
    /// Create an empty registry using the row defaults and queue sizing from `config`.
    pub fn new(config: &SimulationConfig) -> Self {
        Self {
            ids: Vec::new(),
            locations: Vec::new(),
            rotations: Vec::new(),
            movements: Vec::new(),
            collisions: Vec::new(),
            inputs: Vec::new(),
            queues: Vec::new(),
            objects: Vec::new(),
            replication: Vec::new(),
            generation: 0,
            defaults: config.defaults,
            queue_config: config.object_queue,
            commands_per_frame: config.commands_per_frame,
            change_detection: config.change_detection,
        }
    }

    /// Number of registered rows.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    #[inline]
    pub fn is_valid(&self, handle: Handle) -> bool {
        handle < self.len()
    }

    fn check(&self, handle: Handle) -> Result<(), SimError> {
        if self.is_valid(handle) {
            Ok(())
        } else {
            Err(SimError::InvalidHandle {
                handle,
                len: self.len(),
            })
        }
    }

    /// Bumped by every register and unregister; row layout is stable while it holds.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Handle currently assigned to `id`, if registered.
    pub fn handle_of(&self, id: ObjectId) -> Option<Handle> {
        self.ids.iter().position(|&existing| existing == id)
    }

    /// Add a row for `object`, seeded with its current transform.
    ///
    /// Tags the object with [`crate::SIM_TAG`]. Registering the same object
    /// twice fails with [`SimError::AlreadyRegistered`].
    pub fn register(&mut self, object: ObjectRef) -> Result<Handle, SimError> {
        let id = object.id();
        if let Some(handle) = self.handle_of(id) {
            return Err(SimError::AlreadyRegistered { object: id, handle });
        }

        ensure_tagged(object.as_ref());

        let handle = self.len();

        self.ids.push(id);
        self.check_row("ids", self.ids.len(), handle)?;

        self.locations.push(Location {
            position: object.world_position(),
            velocity: Vec3::ZERO,
        });
        self.check_row("locations", self.locations.len(), handle)?;

        self.rotations.push(Rotation {
            value: object.world_rotation(),
            rotation_speed: self.defaults.rotation_speed,
        });
        self.check_row("rotations", self.rotations.len(), handle)?;

        self.movements.push(self.defaults.movement);
        self.check_row("movements", self.movements.len(), handle)?;

        self.collisions.push(self.defaults.collision);
        self.check_row("collisions", self.collisions.len(), handle)?;

        self.inputs.push(MovementInput::default());
        self.check_row("inputs", self.inputs.len(), handle)?;

        self.queues.push(Arc::new(CommandQueue::new(
            self.queue_config,
            self.commands_per_frame,
        )));
        self.check_row("queues", self.queues.len(), handle)?;

        self.objects.push(object);
        self.check_row("objects", self.objects.len(), handle)?;

        self.generation += 1;
        tracing::debug!(%id, handle, "registered object");

        Ok(handle)
    }

    /// Verify a freshly pushed column row landed at `handle`.
    ///
    /// Loud in debug builds; in release the partial row is rolled back and
    /// registration fails.
    fn check_row(&mut self, array: &'static str, len: usize, handle: Handle) -> Result<(), SimError> {
        let actual = len.saturating_sub(1);
        if actual == handle {
            return Ok(());
        }

        tracing::error!(array, expected = handle, actual, "registry columns out of step");
        debug_assert_eq!(actual, handle, "{array} column misaligned");
        self.truncate(handle);
        Err(SimError::Misaligned {
            array,
            expected: handle,
            actual,
        })
    }

    fn truncate(&mut self, len: usize) {
        self.ids.truncate(len);
        self.locations.truncate(len);
        self.rotations.truncate(len);
        self.movements.truncate(len);
        self.collisions.truncate(len);
        self.inputs.truncate(len);
        self.queues.truncate(len);
        self.objects.truncate(len);
    }

    /// Remove a row. Later handles shift down by one.
    ///
    /// Returns the host object that owned the row.
    pub fn unregister(&mut self, handle: Handle) -> Result<ObjectRef, SimError> {
        self.check(handle)?;

        let id = self.ids.remove(handle);
        self.locations.remove(handle);
        self.rotations.remove(handle);
        self.movements.remove(handle);
        self.collisions.remove(handle);
        self.inputs.remove(handle);
        self.queues.remove(handle);
        let object = self.objects.remove(handle);

        self.replication.retain(|request| request.handle != handle);
        for request in &mut self.replication {
            if request.handle > handle {
                request.handle -= 1;
            }
        }

        self.generation += 1;
        tracing::debug!(%id, handle, "unregistered object");
        Ok(object)
    }

    /// Integrate every row for `delta` seconds.
    ///
    /// Moves with collision enabled are resolved against `world`, ignoring
    /// the moving object's own geometry. A blocked move keeps the old
    /// position and loses its velocity. Returns the handles whose position
    /// changed, in ascending order.
    pub fn update_locations(&mut self, delta: f32, world: &dyn SpatialQuery) -> Vec<Handle> {
        let mut changed = Vec::new();

        for handle in 0..self.len() {
            let movement = &self.movements[handle];
            let location = &mut self.locations[handle];
            let before = location.position;

            let step = integrate(
                location.position,
                location.velocity,
                self.inputs[handle].direction,
                movement,
                delta,
            );
            location.velocity = step.velocity;

            location.position = if movement.collision_enabled {
                let resolution = check_collision(
                    world,
                    before,
                    step.position,
                    &self.collisions[handle],
                    Some(self.ids[handle]),
                );
                if !resolution.accepted {
                    location.velocity = Vec3::ZERO;
                }
                resolution.position
            } else {
                step.position
            };

            if self.change_detection.position_changed(before, location.position) {
                changed.push(handle);
            }
        }

        changed
    }

    /// Apply yaw input to every row.
    ///
    /// Yaw advances by `rotation.y * rotation_speed` per call, independent of
    /// the tick delta. Returns the handles whose orientation changed, in
    /// ascending order.
    pub fn update_rotations(&mut self) -> Vec<Handle> {
        let mut changed = Vec::new();

        for (handle, rotation) in self.rotations.iter_mut().enumerate() {
            let before = rotation.value;
            rotation.value.yaw += self.inputs[handle].rotation.y * rotation.rotation_speed;

            if self.change_detection.rotation_changed(before, rotation.value) {
                changed.push(handle);
            }
        }

        changed
    }

    /// Push the computed position into the host object. Owning thread only.
    pub fn update_object_location(&self, handle: Handle) -> Result<(), SimError> {
        self.check(handle)?;
        self.objects[handle].set_world_position(self.locations[handle].position);
        Ok(())
    }

    /// Push the computed orientation into the host object. Owning thread only.
    pub fn update_object_rotation(&self, handle: Handle) -> Result<(), SimError> {
        self.check(handle)?;
        self.objects[handle].set_world_rotation(self.rotations[handle].value);
        Ok(())
    }

    /// [`Self::update_object_location`] for several handles.
    pub fn update_objects_locations(&self, handles: &[Handle]) -> Result<(), SimError> {
        handles
            .iter()
            .try_for_each(|&handle| self.update_object_location(handle))
    }

    /// [`Self::update_object_rotation`] for several handles.
    pub fn update_objects_rotations(&self, handles: &[Handle]) -> Result<(), SimError> {
        handles
            .iter()
            .try_for_each(|&handle| self.update_object_rotation(handle))
    }

    /// Capture the current transform of `handle` for deferred application.
    pub fn object_update(&self, handle: Handle, delta: f32) -> Result<ObjectUpdate, SimError> {
        self.check(handle)?;
        Ok(ObjectUpdate {
            handle,
            object: Arc::clone(&self.objects[handle]),
            position: self.locations[handle].position,
            rotation: self.rotations[handle].value,
            delta,
        })
    }

    /// Command queue carrying transform updates for `handle`.
    pub fn queue(&self, handle: Handle) -> Result<&Arc<CommandQueue>, SimError> {
        self.check(handle)?;
        Ok(&self.queues[handle])
    }

    /// Shared references to every per-object queue.
    pub fn queues(&self) -> Vec<Arc<CommandQueue>> {
        self.queues.clone()
    }

    pub fn object(&self, handle: Handle) -> Result<&ObjectRef, SimError> {
        self.check(handle)?;
        Ok(&self.objects[handle])
    }

    pub fn location(&self, handle: Handle) -> Result<&Location, SimError> {
        self.check(handle)?;
        Ok(&self.locations[handle])
    }

    pub fn rotation(&self, handle: Handle) -> Result<&Rotation, SimError> {
        self.check(handle)?;
        Ok(&self.rotations[handle])
    }

    pub fn movement(&self, handle: Handle) -> Result<&Movement, SimError> {
        self.check(handle)?;
        Ok(&self.movements[handle])
    }

    pub fn collision(&self, handle: Handle) -> Result<&CollisionProbe, SimError> {
        self.check(handle)?;
        Ok(&self.collisions[handle])
    }

    pub fn movement_input(&self, handle: Handle) -> Result<&MovementInput, SimError> {
        self.check(handle)?;
        Ok(&self.inputs[handle])
    }

    pub fn set_movement(&mut self, handle: Handle, movement: Movement) -> Result<(), SimError> {
        self.check(handle)?;
        self.movements[handle] = movement;
        Ok(())
    }

    pub fn set_collision(&mut self, handle: Handle, collision: CollisionProbe) -> Result<(), SimError> {
        self.check(handle)?;
        self.collisions[handle] = collision;
        Ok(())
    }

    pub fn set_movement_input(&mut self, handle: Handle, input: MovementInput) -> Result<(), SimError> {
        self.check(handle)?;
        self.inputs[handle] = input;
        Ok(())
    }

    pub fn set_velocity(&mut self, handle: Handle, velocity: Vec3) -> Result<(), SimError> {
        self.check(handle)?;
        self.locations[handle].velocity = velocity;
        Ok(())
    }

    pub fn set_rotation_speed(&mut self, handle: Handle, rotation_speed: f32) -> Result<(), SimError> {
        self.check(handle)?;
        self.rotations[handle].rotation_speed = rotation_speed;
        Ok(())
    }

    /// Copy of every row's transform, in handle order.
    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            entries: (0..self.len())
                .map(|handle| SnapshotEntry {
                    object: self.ids[handle],
                    position: self.locations[handle].position,
                    velocity: self.locations[handle].velocity,
                    rotation: self.rotations[handle].value,
                })
                .collect(),
        }
    }

    /// Mark `handle` for replication. Repeated requests collapse into one.
    pub fn replicate_index(&mut self, handle: Handle, skip_source: bool) -> Result<(), SimError> {
        self.check(handle)?;
        match self.replication.iter_mut().find(|r| r.handle == handle) {
            Some(existing) => existing.skip_source &= skip_source,
            None => self.replication.push(ReplicationRequest { handle, skip_source }),
        }
        Ok(())
    }

    /// Drain pending replication requests.
    pub fn take_replication_requests(&mut self) -> Vec<ReplicationRequest> {
        std::mem::take(&mut self.replication)
    }

    /// Handles whose state diverges from `client` by more than `tolerance`.
    pub fn get_differences(&self, client: &RegistrySnapshot, tolerance: f32) -> Vec<Handle> {
        self.snapshot().differences(client, tolerance)
    }

    #[cfg(test)]
    fn column_lengths(&self) -> [usize; 8] {
        [
            self.ids.len(),
            self.locations.len(),
            self.rotations.len(),
            self.movements.len(),
            self.collisions.len(),
            self.inputs.len(),
            self.queues.len(),
            self.objects.len(),
        ]
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("len", &self.len())
            .field("ids", &self.ids)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::testing::TestObject;
    use crate::object::SIM_TAG;
    use crate::WorldObject;
    use tessera_physics::CollisionWorld;

    fn registry() -> Registry {
        Registry::new(&SimulationConfig::default())
    }

    fn still(registry: &mut Registry, handle: Handle) {
        registry
            .set_movement(
                handle,
                Movement {
                    gravity: 0.0,
                    collision_enabled: false,
                    ..Movement::default()
                },
            )
            .unwrap();
    }

    #[test]
    fn test_register_seeds_row_from_object() {
        let mut registry = registry();
        let object = TestObject::shared(1, Vec3::new(1.0, 2.0, 3.0));
        *object.rotation.lock() = Rotator::new(0.0, 45.0, 0.0);

        let handle = registry.register(object.clone()).unwrap();

        assert_eq!(handle, 0);
        assert_eq!(registry.location(handle).unwrap().position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(registry.rotation(handle).unwrap().value.yaw, 45.0);
        assert_eq!(*registry.movement(handle).unwrap(), Movement::default());
        assert!(object.has_tag(SIM_TAG));
    }

    #[test]
    fn test_tagging_is_idempotent() {
        let mut registry = registry();
        let object = TestObject::shared(1, Vec3::ZERO);
        object.add_tag(SIM_TAG);

        registry.register(object.clone()).unwrap();
        assert_eq!(object.tags.lock().len(), 1);
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let mut registry = registry();
        let object = TestObject::shared(9, Vec3::ZERO);

        assert_eq!(registry.register(object.clone()).unwrap(), 0);
        let err = registry.register(object).unwrap_err();
        assert!(matches!(err, SimError::AlreadyRegistered { handle: 0, .. }));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.column_lengths(), [1; 8]);
    }

    #[test]
    fn test_register_then_unregister_restores_lengths() {
        let mut registry = registry();
        registry.register(TestObject::shared(1, Vec3::ZERO)).unwrap();
        let before = registry.column_lengths();

        let handle = registry.register(TestObject::shared(2, Vec3::ZERO)).unwrap();
        registry.unregister(handle).unwrap();

        assert_eq!(registry.column_lengths(), before);
    }

    #[test]
    fn test_unregister_shifts_later_handles() {
        let mut registry = registry();
        for id in 0..3 {
            registry.register(TestObject::shared(id, Vec3::splat(id as f32))).unwrap();
        }

        registry.unregister(0).unwrap();

        assert_eq!(registry.handle_of(ObjectId(1)), Some(0));
        assert_eq!(registry.handle_of(ObjectId(2)), Some(1));
        assert_eq!(registry.location(1).unwrap().position, Vec3::splat(2.0));
        assert!(matches!(
            registry.unregister(2),
            Err(SimError::InvalidHandle { handle: 2, len: 2 })
        ));
    }

    #[test]
    fn test_idle_rows_do_not_change() {
        let mut registry = registry();
        let world = CollisionWorld::new();
        let handle = registry.register(TestObject::shared(1, Vec3::new(5.0, 5.0, 5.0))).unwrap();
        still(&mut registry, handle);

        assert!(registry.update_locations(0.1, &world).is_empty());
        assert!(registry.update_rotations().is_empty());
        assert_eq!(registry.location(handle).unwrap().position, Vec3::new(5.0, 5.0, 5.0));
    }

    #[test]
    fn test_gravity_pulls_down_until_clamped() {
        let mut registry = registry();
        let world = CollisionWorld::new();
        let handle = registry.register(TestObject::shared(1, Vec3::ZERO)).unwrap();
        registry
            .set_movement(
                handle,
                Movement {
                    deceleration: 0.0,
                    max_speed: 15.0,
                    gravity: 9.8,
                    collision_enabled: false,
                    acceleration: 0.0,
                },
            )
            .unwrap();

        let mut last_vz = 0.0;
        for _ in 0..5 {
            assert_eq!(registry.update_locations(1.0, &world), vec![handle]);
            let vz = registry.location(handle).unwrap().velocity.z;
            assert!(vz <= last_vz);
            last_vz = vz;
        }
        assert!((last_vz + 15.0).abs() < 1e-3);
    }

    #[test]
    fn test_accelerate_clamp_then_brake() {
        let mut registry = registry();
        let world = CollisionWorld::new();
        let handle = registry.register(TestObject::shared(1, Vec3::ZERO)).unwrap();
        registry.set_movement(handle, Movement::free(1000.0, 500.0)).unwrap();
        registry.set_movement_input(handle, MovementInput::moving(Vec3::X)).unwrap();

        assert_eq!(registry.update_locations(1.0, &world), vec![handle]);
        let location = *registry.location(handle).unwrap();
        assert_eq!(location.velocity.x, 500.0);
        assert_eq!(location.position.x, 500.0);

        registry.set_movement_input(handle, MovementInput::default()).unwrap();
        registry
            .set_movement(
                handle,
                Movement {
                    deceleration: 100.0,
                    ..Movement::free(1000.0, 500.0)
                },
            )
            .unwrap();
        registry.update_locations(1.0, &world);

        let location = *registry.location(handle).unwrap();
        assert!(location.velocity.x > 0.0 && location.velocity.x < 500.0);
        assert_eq!(location.velocity.x, 400.0);
        assert_eq!(location.position.x, 900.0);
    }

    #[test]
    fn test_blocked_move_keeps_position_and_stops() {
        let mut registry = registry();
        let mut world = CollisionWorld::new();
        world.add_box(Vec3::new(105.0, 0.0, 0.0), Vec3::new(5.0, 1000.0, 1000.0));

        let handle = registry.register(TestObject::shared(1, Vec3::new(30.0, 0.0, 0.0))).unwrap();
        registry
            .set_movement(
                handle,
                Movement {
                    collision_enabled: true,
                    ..Movement::free(1000.0, 1000.0)
                },
            )
            .unwrap();
        registry
            .set_collision(
                handle,
                CollisionProbe {
                    radius: 10.0,
                    acceptable_distance: 10.0,
                    ..CollisionProbe::default()
                },
            )
            .unwrap();
        registry.set_movement_input(handle, MovementInput::moving(Vec3::X)).unwrap();

        assert!(registry.update_locations(1.0, &world).is_empty());
        let location = registry.location(handle).unwrap();
        assert_eq!(location.position, Vec3::new(30.0, 0.0, 0.0));
        assert_eq!(location.velocity, Vec3::ZERO);
    }

    #[test]
    fn test_own_geometry_does_not_block() {
        let mut registry = registry();
        let mut world = CollisionWorld::new();
        world.add_owned_box(Vec3::new(20.0, 0.0, 0.0), Vec3::splat(5.0), ObjectId(1));

        let handle = registry.register(TestObject::shared(1, Vec3::ZERO)).unwrap();
        registry
            .set_movement(
                handle,
                Movement {
                    collision_enabled: true,
                    ..Movement::free(40.0, 40.0)
                },
            )
            .unwrap();
        registry.set_movement_input(handle, MovementInput::moving(Vec3::X)).unwrap();

        assert_eq!(registry.update_locations(1.0, &world), vec![handle]);
        assert_eq!(registry.location(handle).unwrap().position.x, 40.0);
    }

    #[test]
    fn test_yaw_follows_rotation_input() {
        let mut registry = registry();
        let a = registry.register(TestObject::shared(1, Vec3::ZERO)).unwrap();
        let b = registry.register(TestObject::shared(2, Vec3::ZERO)).unwrap();
        registry.set_rotation_speed(b, 2.0).unwrap();
        registry.set_movement_input(b, MovementInput::turning(1.5)).unwrap();

        assert_eq!(registry.update_rotations(), vec![b]);
        assert_eq!(registry.rotation(b).unwrap().value.yaw, 3.0);
        assert_eq!(registry.rotation(a).unwrap().value.yaw, 0.0);
    }

    #[test]
    fn test_tolerance_filters_small_moves() {
        let config = SimulationConfig {
            change_detection: ChangeDetection::Tolerance(1.0),
            ..SimulationConfig::default()
        };
        let mut registry = Registry::new(&config);
        let world = CollisionWorld::new();
        let handle = registry.register(TestObject::shared(1, Vec3::ZERO)).unwrap();
        registry.set_movement(handle, Movement::free(0.0, 100.0)).unwrap();
        registry.set_velocity(handle, Vec3::new(0.5, 0.0, 0.0)).unwrap();

        assert!(registry.update_locations(1.0, &world).is_empty());
        assert_eq!(registry.location(handle).unwrap().position.x, 0.5);
    }

    #[test]
    fn test_object_writes_only_through_update_calls() {
        let mut registry = registry();
        let world = CollisionWorld::new();
        let object = TestObject::shared(1, Vec3::ZERO);
        let handle = registry.register(object.clone()).unwrap();
        registry.set_movement(handle, Movement::free(10.0, 100.0)).unwrap();
        registry.set_movement_input(handle, MovementInput::moving(Vec3::Y)).unwrap();

        let changed = registry.update_locations(1.0, &world);
        assert_eq!(object.world_position(), Vec3::ZERO);
        assert_eq!(*object.writes.lock(), 0);

        registry.update_objects_locations(&changed).unwrap();
        assert_eq!(object.world_position(), Vec3::new(0.0, 10.0, 0.0));

        let update = registry.object_update(handle, 1.0).unwrap();
        registry.set_velocity(handle, Vec3::ZERO).unwrap();
        update.apply();
        assert_eq!(object.world_position(), Vec3::new(0.0, 10.0, 0.0));
    }

    #[test]
    fn test_replication_requests_follow_shifts() {
        let mut registry = registry();
        for id in 0..3 {
            registry.register(TestObject::shared(id, Vec3::ZERO)).unwrap();
        }

        registry.replicate_index(0, true).unwrap();
        registry.replicate_index(2, true).unwrap();
        registry.replicate_index(2, false).unwrap();
        registry.unregister(0).unwrap();

        let requests = registry.take_replication_requests();
        assert_eq!(
            requests,
            vec![ReplicationRequest {
                handle: 1,
                skip_source: false
            }]
        );
        assert!(registry.take_replication_requests().is_empty());
    }

    #[test]
    fn test_generation_tracks_layout_changes() {
        let mut registry = registry();
        assert_eq!(registry.generation(), 0);

        let object = TestObject::shared(1, Vec3::ZERO);
        let handle = registry.register(object.clone()).unwrap();
        assert_eq!(registry.generation(), 1);

        assert!(registry.register(object).is_err());
        registry.set_velocity(handle, Vec3::X).unwrap();
        assert_eq!(registry.generation(), 1);

        registry.unregister(handle).unwrap();
        assert_eq!(registry.generation(), 2);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "ids column misaligned")]
    fn test_stray_id_is_caught() {
        let mut registry = registry();
        registry.ids.push(ObjectId(99));
        let _ = registry.register(TestObject::shared(1, Vec3::ZERO));
    }

    #[test]
    #[cfg(not(debug_assertions))]
    fn test_stray_object_rolls_back() {
        let mut registry = registry();
        registry.ids.push(ObjectId(99));

        let err = registry.register(TestObject::shared(1, Vec3::ZERO)).unwrap_err();
        assert!(matches!(err, SimError::Misaligned { array: "ids", .. }));
        assert_eq!(registry.column_lengths(), [0; 8]);
    }
}
