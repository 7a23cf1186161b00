//! rapier2d-backed [`PhysicsWorld`].
//!
//! rapier keeps user forces on a body until they are reset; the game expects
//! forces to act for one step only, so every step ends by clearing them.
//! Collision and contact-force events are collected by a step-local handler and
//! translated to tagged [`ContactEvent`]s once the pipeline returns. Contacts
//! that involve a fixture destroyed in the meantime are dropped.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use glam::Vec2;
use rapier2d::prelude::*;

use crate::tags::BodyRole;
use crate::world::{
    BodyDef, BodyHandle, BodyKind, BodyState, ContactEvent, FixtureDef, FixtureRef, JointHandle,
    PhysicsError, PhysicsWorld, RevoluteJointDef, Shape as FixtureShape,
};

/// Damping factor handed to rapier's velocity motor.
const MOTOR_FACTOR: Real = 1.0;

fn to_na(v: Vec2) -> Vector<Real> {
    vector![v.x, v.y]
}

fn from_na(v: &Vector<Real>) -> Vec2 {
    Vec2::new(v.x, v.y)
}

#[derive(Debug, Clone, Copy)]
enum RawContact {
    Started(ColliderHandle, ColliderHandle),
    Stopped(ColliderHandle, ColliderHandle),
    Solved(ColliderHandle, ColliderHandle),
}

struct StepEventCollector {
    events: Mutex<Vec<RawContact>>,
}

impl StepEventCollector {
    fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    fn push(&self, raw: RawContact) {
        match self.events.lock() {
            Ok(mut events) => events.push(raw),
            Err(poisoned) => poisoned.into_inner().push(raw),
        }
    }

    fn drain(&self) -> Vec<RawContact> {
        match self.events.lock() {
            Ok(mut events) => std::mem::take(&mut *events),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

impl EventHandler for StepEventCollector {
    fn handle_collision_event(
        &self,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        event: CollisionEvent,
        _contact_pair: Option<&ContactPair>,
    ) {
        let raw = match event {
            CollisionEvent::Started(h1, h2, _) => RawContact::Started(h1, h2),
            CollisionEvent::Stopped(h1, h2, _) => RawContact::Stopped(h1, h2),
        };
        self.push(raw);
    }

    fn handle_contact_force_event(
        &self,
        _dt: Real,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        contact_pair: &ContactPair,
        _total_force_magnitude: Real,
    ) {
        self.push(RawContact::Solved(
            contact_pair.collider1,
            contact_pair.collider2,
        ));
    }
}

struct BodyEntry {
    handle: RigidBodyHandle,
    colliders: Vec<ColliderHandle>,
    role: Option<BodyRole>,
}

#[derive(Clone, Copy)]
struct JointEntry {
    handle: ImpulseJointHandle,
    body_a: BodyHandle,
    body_b: BodyHandle,
    max_motor_torque: f32,
}

pub struct RapierWorld {
    gravity: Vector<Real>,
    integration_parameters: IntegrationParameters,
    physics_pipeline: PhysicsPipeline,
    island_manager: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    rigid_bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    query_pipeline: QueryPipeline,
    events: StepEventCollector,

    bodies: BTreeMap<BodyHandle, BodyEntry>,
    fixtures: HashMap<ColliderHandle, FixtureRef>,
    joints: HashMap<JointHandle, JointEntry>,
    next_body: u32,
    next_joint: u32,
}

impl RapierWorld {
    /// Create an empty world. Gravity is in m/s², +Y up.
    pub fn new(gravity: Vec2) -> Self {
        Self {
            gravity: to_na(gravity),
            integration_parameters: IntegrationParameters::default(),
            physics_pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            rigid_bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            events: StepEventCollector::new(),
            bodies: BTreeMap::new(),
            fixtures: HashMap::new(),
            joints: HashMap::new(),
            next_body: 0,
            next_joint: 0,
        }
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    fn rigid_body_mut(&mut self, body: BodyHandle) -> Result<&mut RigidBody, PhysicsError> {
        let entry = self
            .bodies
            .get(&body)
            .ok_or(PhysicsError::InvalidBody(body))?;
        self.rigid_bodies
            .get_mut(entry.handle)
            .ok_or(PhysicsError::InvalidBody(body))
    }

    fn resolve(&self, raw: RawContact) -> Option<ContactEvent> {
        let lookup = |a: ColliderHandle, b: ColliderHandle| {
            Some((*self.fixtures.get(&a)?, *self.fixtures.get(&b)?))
        };
        match raw {
            RawContact::Started(a, b) => lookup(a, b).map(|(a, b)| ContactEvent::Begin(a, b)),
            RawContact::Stopped(a, b) => lookup(a, b).map(|(a, b)| ContactEvent::End(a, b)),
            RawContact::Solved(a, b) => lookup(a, b).map(|(a, b)| ContactEvent::PostSolve(a, b)),
        }
    }
}

impl PhysicsWorld for RapierWorld {
    fn create_body(&mut self, def: &BodyDef) -> BodyHandle {
        let builder = match def.kind {
            BodyKind::Static => RigidBodyBuilder::fixed(),
            BodyKind::Dynamic => RigidBodyBuilder::dynamic(),
        };
        let mut builder = builder
            .translation(to_na(def.position))
            .rotation(def.angle)
            .linvel(to_na(def.linear_velocity))
            .angular_damping(def.angular_damping)
            .ccd_enabled(def.bullet)
            .can_sleep(false);
        if def.fixed_rotation {
            builder = builder.lock_rotations();
        }

        let handle = self.rigid_bodies.insert(builder.build());
        let body = BodyHandle::from_raw(self.next_body);
        self.next_body += 1;
        self.bodies.insert(
            body,
            BodyEntry {
                handle,
                colliders: Vec::new(),
                role: None,
            },
        );
        body
    }

    fn create_fixture(&mut self, body: BodyHandle, def: &FixtureDef) -> Result<(), PhysicsError> {
        let entry = self
            .bodies
            .get_mut(&body)
            .ok_or(PhysicsError::InvalidBody(body))?;

        let builder = match def.shape {
            FixtureShape::Circle { radius, offset } => {
                ColliderBuilder::ball(radius).translation(to_na(offset))
            }
            FixtureShape::Box {
                half_width,
                half_height,
                offset,
            } => ColliderBuilder::cuboid(half_width, half_height).translation(to_na(offset)),
        };
        let collider = builder
            .density(def.density)
            .friction(def.friction)
            .restitution(def.restitution)
            .collision_groups(InteractionGroups::new(
                Group::from_bits_truncate(def.filter.category),
                Group::from_bits_truncate(def.filter.mask),
            ))
            .active_events(ActiveEvents::COLLISION_EVENTS | ActiveEvents::CONTACT_FORCE_EVENTS)
            .contact_force_event_threshold(0.0)
            .build();

        let collider_handle =
            self.colliders
                .insert_with_parent(collider, entry.handle, &mut self.rigid_bodies);
        entry.colliders.push(collider_handle);
        if entry.role.is_none() {
            entry.role = def.tag.map(|tag| tag.role());
        }
        self.fixtures
            .insert(collider_handle, FixtureRef { body, tag: def.tag });
        Ok(())
    }

    fn create_revolute_joint(
        &mut self,
        def: &RevoluteJointDef,
    ) -> Result<JointHandle, PhysicsError> {
        let body_a = self
            .bodies
            .get(&def.body_a)
            .ok_or(PhysicsError::InvalidBody(def.body_a))?
            .handle;
        let body_b = self
            .bodies
            .get(&def.body_b)
            .ok_or(PhysicsError::InvalidBody(def.body_b))?
            .handle;

        let (speed, max_force) = if def.enable_motor {
            (def.motor_speed, def.max_motor_torque)
        } else {
            (0.0, 0.0)
        };
        let mut builder = RevoluteJointBuilder::new()
            .local_anchor1(point![def.local_anchor_a.x, def.local_anchor_a.y])
            .local_anchor2(point![def.local_anchor_b.x, def.local_anchor_b.y])
            .contacts_enabled(false)
            .motor_velocity(speed, MOTOR_FACTOR)
            .motor_max_force(max_force);
        if let Some((lower, upper)) = def.limits {
            builder = builder.limits([lower, upper]);
        }

        let handle = self
            .impulse_joints
            .insert(body_a, body_b, builder.build(), true);
        let joint = JointHandle::from_raw(self.next_joint);
        self.next_joint += 1;
        self.joints.insert(
            joint,
            JointEntry {
                handle,
                body_a: def.body_a,
                body_b: def.body_b,
                max_motor_torque: def.max_motor_torque,
            },
        );
        Ok(joint)
    }

    fn destroy_body(&mut self, body: BodyHandle) -> Result<(), PhysicsError> {
        let entry = self
            .bodies
            .remove(&body)
            .ok_or(PhysicsError::InvalidBody(body))?;
        for collider in &entry.colliders {
            self.fixtures.remove(collider);
        }
        self.joints
            .retain(|_, joint| joint.body_a != body && joint.body_b != body);
        self.rigid_bodies.remove(
            entry.handle,
            &mut self.island_manager,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            true,
        );
        Ok(())
    }

    fn step(&mut self, dt: f32) -> Vec<ContactEvent> {
        self.integration_parameters.dt = dt;
        self.physics_pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            Some(&mut self.query_pipeline),
            &(),
            &self.events,
        );

        for (_, rigid_body) in self.rigid_bodies.iter_mut() {
            rigid_body.reset_forces(false);
            rigid_body.reset_torques(false);
        }

        self.events
            .drain()
            .into_iter()
            .filter_map(|raw| self.resolve(raw))
            .collect()
    }

    fn bodies(&self) -> Vec<BodyHandle> {
        self.bodies.keys().copied().collect()
    }

    fn body_state(&self, body: BodyHandle) -> Option<BodyState> {
        let entry = self.bodies.get(&body)?;
        let rigid_body = self.rigid_bodies.get(entry.handle)?;
        Some(BodyState {
            position: from_na(rigid_body.translation()),
            angle: rigid_body.rotation().angle(),
            linear_velocity: from_na(rigid_body.linvel()),
            angular_velocity: rigid_body.angvel(),
        })
    }

    fn body_role(&self, body: BodyHandle) -> Option<BodyRole> {
        self.bodies.get(&body)?.role
    }

    fn apply_linear_impulse(
        &mut self,
        body: BodyHandle,
        impulse: Vec2,
    ) -> Result<(), PhysicsError> {
        self.rigid_body_mut(body)?.apply_impulse(to_na(impulse), true);
        Ok(())
    }

    fn apply_force(&mut self, body: BodyHandle, force: Vec2) -> Result<(), PhysicsError> {
        self.rigid_body_mut(body)?.add_force(to_na(force), true);
        Ok(())
    }

    fn apply_torque(&mut self, body: BodyHandle, torque: f32) -> Result<(), PhysicsError> {
        self.rigid_body_mut(body)?.add_torque(torque, true);
        Ok(())
    }

    fn set_transform(
        &mut self,
        body: BodyHandle,
        position: Vec2,
        angle: f32,
    ) -> Result<(), PhysicsError> {
        self.rigid_body_mut(body)?
            .set_position(Isometry::new(to_na(position), angle), true);
        Ok(())
    }

    fn set_velocity(
        &mut self,
        body: BodyHandle,
        linear: Vec2,
        angular: f32,
    ) -> Result<(), PhysicsError> {
        let rigid_body = self.rigid_body_mut(body)?;
        rigid_body.set_linvel(to_na(linear), true);
        rigid_body.set_angvel(angular, true);
        Ok(())
    }

    fn set_joint_motor(
        &mut self,
        joint: JointHandle,
        enabled: bool,
        speed: f32,
    ) -> Result<(), PhysicsError> {
        let entry = *self
            .joints
            .get(&joint)
            .ok_or(PhysicsError::InvalidJoint(joint))?;
        let (speed, max_force) = if enabled {
            (speed, entry.max_motor_torque)
        } else {
            (0.0, 0.0)
        };
        let impulse_joint = self
            .impulse_joints
            .get_mut(entry.handle)
            .ok_or(PhysicsError::InvalidJoint(joint))?;
        impulse_joint
            .data
            .set_motor_velocity(JointAxis::AngX, speed, MOTOR_FACTOR)
            .set_motor_max_force(JointAxis::AngX, max_force);
        // A sleeping island ignores motor changes until something wakes it.
        for body in [entry.body_a, entry.body_b] {
            self.rigid_body_mut(body)?.wake_up(true);
        }
        Ok(())
    }
}
