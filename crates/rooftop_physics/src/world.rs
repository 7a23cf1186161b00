//! Capability boundary over the rigid-body engine.
//!
//! Gameplay code never touches the solver directly. It creates bodies,
//! fixtures and hinge joints, pushes forces and impulses, advances the world by
//! a fixed `dt`, and reacts to the contact events a step reports. Anything that
//! implements [`PhysicsWorld`] can drive the game: the rapier2d backend in
//! production and the scripted world in tests.
//!
//! Coordinates are simulation meters with +Y up. Conversion to render pixels
//! (and the Y flip) happens once, at the render boundary.

use glam::Vec2;
use thiserror::Error;

use crate::tags::{BodyRole, FixtureTag};

/// Opaque handle to a live body. Handles are never reused within one world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyHandle(u32);

impl BodyHandle {
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JointHandle(u32);

impl JointHandle {
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PhysicsError {
    #[error("invalid body handle {0:?}")]
    InvalidBody(BodyHandle),
    #[error("invalid joint handle {0:?}")]
    InvalidJoint(JointHandle),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Static,
    Dynamic,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyDef {
    pub kind: BodyKind,
    pub position: Vec2,
    pub angle: f32,
    pub linear_velocity: Vec2,
    pub angular_damping: f32,
    pub fixed_rotation: bool,
    /// Continuous collision detection for fast movers.
    pub bullet: bool,
}

impl BodyDef {
    pub fn dynamic(position: Vec2) -> Self {
        Self {
            kind: BodyKind::Dynamic,
            position,
            angle: 0.0,
            linear_velocity: Vec2::ZERO,
            angular_damping: 0.0,
            fixed_rotation: false,
            bullet: false,
        }
    }

    pub fn fixed(position: Vec2) -> Self {
        Self {
            kind: BodyKind::Static,
            ..Self::dynamic(position)
        }
    }

    pub fn with_angle(mut self, angle: f32) -> Self {
        self.angle = angle;
        self
    }

    pub fn with_velocity(mut self, velocity: Vec2) -> Self {
        self.linear_velocity = velocity;
        self
    }

    pub fn with_angular_damping(mut self, damping: f32) -> Self {
        self.angular_damping = damping;
        self
    }

    pub fn with_fixed_rotation(mut self, fixed: bool) -> Self {
        self.fixed_rotation = fixed;
        self
    }

    pub fn with_bullet(mut self, bullet: bool) -> Self {
        self.bullet = bullet;
        self
    }
}

/// Collision shape relative to the body origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    Circle {
        radius: f32,
        offset: Vec2,
    },
    Box {
        half_width: f32,
        half_height: f32,
        offset: Vec2,
    },
}

/// Category/mask pair deciding which fixtures may touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollisionFilter {
    pub category: u32,
    pub mask: u32,
}

impl CollisionFilter {
    pub const SOLID_CATEGORY: u32 = 0x0001;
    pub const PROJECTILE_CATEGORY: u32 = 0x0004;

    /// Ground, characters and arms: touch each other and projectiles.
    pub const SOLID: Self = Self {
        category: Self::SOLID_CATEGORY,
        mask: Self::SOLID_CATEGORY | Self::PROJECTILE_CATEGORY,
    };

    /// Projectiles touch solids only, never each other.
    pub const PROJECTILE: Self = Self {
        category: Self::PROJECTILE_CATEGORY,
        mask: Self::SOLID_CATEGORY,
    };

    pub fn accepts(self, other: CollisionFilter) -> bool {
        self.mask & other.category != 0 && other.mask & self.category != 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixtureDef {
    pub shape: Shape,
    pub density: f32,
    pub friction: f32,
    pub restitution: f32,
    pub filter: CollisionFilter,
    pub tag: Option<FixtureTag>,
}

impl FixtureDef {
    pub fn new(shape: Shape) -> Self {
        Self {
            shape,
            density: 1.0,
            friction: 0.2,
            restitution: 0.0,
            filter: CollisionFilter::SOLID,
            tag: None,
        }
    }

    pub fn with_density(mut self, density: f32) -> Self {
        self.density = density;
        self
    }

    pub fn with_friction(mut self, friction: f32) -> Self {
        self.friction = friction;
        self
    }

    pub fn with_restitution(mut self, restitution: f32) -> Self {
        self.restitution = restitution;
        self
    }

    pub fn with_filter(mut self, filter: CollisionFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_tag(mut self, tag: FixtureTag) -> Self {
        self.tag = Some(tag);
        self
    }
}

/// Hinge between two bodies with a velocity motor. The two bodies never
/// collide with each other.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RevoluteJointDef {
    pub body_a: BodyHandle,
    pub body_b: BodyHandle,
    pub local_anchor_a: Vec2,
    pub local_anchor_b: Vec2,
    pub enable_motor: bool,
    pub motor_speed: f32,
    pub max_motor_torque: f32,
    /// Lower/upper angle limit in radians, if any.
    pub limits: Option<(f32, f32)>,
}

/// Kinematic snapshot of one body.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BodyState {
    pub position: Vec2,
    pub angle: f32,
    pub linear_velocity: Vec2,
    pub angular_velocity: f32,
}

/// One side of a contact: the owning body plus the fixture's tag, if it has one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixtureRef {
    pub body: BodyHandle,
    pub tag: Option<FixtureTag>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactEvent {
    Begin(FixtureRef, FixtureRef),
    End(FixtureRef, FixtureRef),
    /// Reported after the solver resolved a touching pair during a step.
    PostSolve(FixtureRef, FixtureRef),
}

pub trait PhysicsWorld {
    fn create_body(&mut self, def: &BodyDef) -> BodyHandle;

    fn create_fixture(&mut self, body: BodyHandle, def: &FixtureDef) -> Result<(), PhysicsError>;

    fn create_revolute_joint(
        &mut self,
        def: &RevoluteJointDef,
    ) -> Result<JointHandle, PhysicsError>;

    /// Remove a body with its fixtures and joints. A second destroy of the
    /// same handle reports `InvalidBody`.
    fn destroy_body(&mut self, body: BodyHandle) -> Result<(), PhysicsError>;

    /// Advance every body by exactly `dt` seconds and report contacts that
    /// began, ended, or were solved during the step. Forces applied before the
    /// step are consumed by it.
    fn step(&mut self, dt: f32) -> Vec<ContactEvent>;

    /// Live bodies, in ascending handle order. The returned list is a snapshot.
    fn bodies(&self) -> Vec<BodyHandle>;

    fn body_state(&self, body: BodyHandle) -> Option<BodyState>;

    fn body_role(&self, body: BodyHandle) -> Option<BodyRole>;

    fn contains(&self, body: BodyHandle) -> bool {
        self.body_state(body).is_some()
    }

    /// Impulse applied at the center of mass.
    fn apply_linear_impulse(&mut self, body: BodyHandle, impulse: Vec2)
        -> Result<(), PhysicsError>;

    /// Force applied at the center of mass for the next step only.
    fn apply_force(&mut self, body: BodyHandle, force: Vec2) -> Result<(), PhysicsError>;

    fn apply_torque(&mut self, body: BodyHandle, torque: f32) -> Result<(), PhysicsError>;

    fn set_transform(
        &mut self,
        body: BodyHandle,
        position: Vec2,
        angle: f32,
    ) -> Result<(), PhysicsError>;

    fn set_velocity(
        &mut self,
        body: BodyHandle,
        linear: Vec2,
        angular: f32,
    ) -> Result<(), PhysicsError>;

    /// Enable or disable the hinge motor. A disabled motor applies no torque.
    fn set_joint_motor(
        &mut self,
        joint: JointHandle,
        enabled: bool,
        speed: f32,
    ) -> Result<(), PhysicsError>;
}
