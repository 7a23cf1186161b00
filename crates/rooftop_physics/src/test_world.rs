//! Deterministic in-memory [`PhysicsWorld`] for tests.
//!
//! Bodies have unit mass and unit inertia and integrate with explicit Euler.
//! Nothing collides on its own: tests script contact events with
//! [`ScriptedWorld::push_events`] and they are reported by the next step.
//! Every impulse, force, torque and motor command is recorded so gameplay
//! rules can be asserted exactly.

use std::collections::BTreeMap;

use glam::Vec2;

use crate::tags::BodyRole;
use crate::world::{
    BodyDef, BodyHandle, BodyKind, BodyState, ContactEvent, FixtureDef, JointHandle, PhysicsError,
    PhysicsWorld, RevoluteJointDef,
};

#[derive(Debug, Clone)]
struct ScriptedBody {
    kind: BodyKind,
    fixed_rotation: bool,
    state: BodyState,
    role: Option<BodyRole>,
    fixtures: Vec<FixtureDef>,
    force: Vec2,
    torque: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotorCommand {
    pub joint: JointHandle,
    pub enabled: bool,
    pub speed: f32,
}

#[derive(Debug, Clone)]
struct ScriptedJoint {
    def: RevoluteJointDef,
    enabled: bool,
    speed: f32,
}

#[derive(Debug, Default)]
pub struct ScriptedWorld {
    gravity: Vec2,
    bodies: BTreeMap<BodyHandle, ScriptedBody>,
    joints: BTreeMap<JointHandle, ScriptedJoint>,
    pending_events: Vec<ContactEvent>,
    next_body: u32,
    next_joint: u32,
    pub steps: u32,
    pub impulses: Vec<(BodyHandle, Vec2)>,
    pub forces: Vec<(BodyHandle, Vec2)>,
    pub torques: Vec<(BodyHandle, f32)>,
    pub motor_commands: Vec<MotorCommand>,
    pub destroyed: Vec<BodyHandle>,
}

impl ScriptedWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_gravity(gravity: Vec2) -> Self {
        Self {
            gravity,
            ..Self::default()
        }
    }

    /// Queue contact events to be reported by the next `step`.
    pub fn push_events(&mut self, events: impl IntoIterator<Item = ContactEvent>) {
        self.pending_events.extend(events);
    }

    /// Forget every recorded command, keeping bodies and joints.
    pub fn clear_log(&mut self) {
        self.impulses.clear();
        self.forces.clear();
        self.torques.clear();
        self.motor_commands.clear();
        self.destroyed.clear();
    }

    pub fn impulses_on(&self, body: BodyHandle) -> Vec<Vec2> {
        self.impulses
            .iter()
            .filter(|(b, _)| *b == body)
            .map(|(_, impulse)| *impulse)
            .collect()
    }

    pub fn forces_on(&self, body: BodyHandle) -> Vec<Vec2> {
        self.forces
            .iter()
            .filter(|(b, _)| *b == body)
            .map(|(_, force)| *force)
            .collect()
    }

    pub fn torques_on(&self, body: BodyHandle) -> Vec<f32> {
        self.torques
            .iter()
            .filter(|(b, _)| *b == body)
            .map(|(_, torque)| *torque)
            .collect()
    }

    /// Current `(enabled, speed)` of a joint's motor.
    pub fn joint_motor(&self, joint: JointHandle) -> Option<(bool, f32)> {
        self.joints
            .get(&joint)
            .map(|joint| (joint.enabled, joint.speed))
    }

    pub fn joint_def(&self, joint: JointHandle) -> Option<RevoluteJointDef> {
        self.joints.get(&joint).map(|joint| joint.def)
    }

    pub fn fixtures(&self, body: BodyHandle) -> &[FixtureDef] {
        self.bodies
            .get(&body)
            .map(|body| body.fixtures.as_slice())
            .unwrap_or(&[])
    }

    fn body_mut(&mut self, body: BodyHandle) -> Result<&mut ScriptedBody, PhysicsError> {
        self.bodies
            .get_mut(&body)
            .ok_or(PhysicsError::InvalidBody(body))
    }

    fn involves_live_bodies(&self, event: &ContactEvent) -> bool {
        let (a, b) = match event {
            ContactEvent::Begin(a, b) | ContactEvent::End(a, b) | ContactEvent::PostSolve(a, b) => {
                (a, b)
            }
        };
        self.bodies.contains_key(&a.body) && self.bodies.contains_key(&b.body)
    }
}

impl PhysicsWorld for ScriptedWorld {
    fn create_body(&mut self, def: &BodyDef) -> BodyHandle {
        let handle = BodyHandle::from_raw(self.next_body);
        self.next_body += 1;
        self.bodies.insert(
            handle,
            ScriptedBody {
                kind: def.kind,
                fixed_rotation: def.fixed_rotation,
                state: BodyState {
                    position: def.position,
                    angle: def.angle,
                    linear_velocity: def.linear_velocity,
                    angular_velocity: 0.0,
                },
                role: None,
                fixtures: Vec::new(),
                force: Vec2::ZERO,
                torque: 0.0,
            },
        );
        handle
    }

    fn create_fixture(&mut self, body: BodyHandle, def: &FixtureDef) -> Result<(), PhysicsError> {
        let entry = self.body_mut(body)?;
        if entry.role.is_none() {
            entry.role = def.tag.map(|tag| tag.role());
        }
        entry.fixtures.push(*def);
        Ok(())
    }

    fn create_revolute_joint(
        &mut self,
        def: &RevoluteJointDef,
    ) -> Result<JointHandle, PhysicsError> {
        for body in [def.body_a, def.body_b] {
            if !self.bodies.contains_key(&body) {
                return Err(PhysicsError::InvalidBody(body));
            }
        }
        let handle = JointHandle::from_raw(self.next_joint);
        self.next_joint += 1;
        self.joints.insert(
            handle,
            ScriptedJoint {
                def: *def,
                enabled: def.enable_motor,
                speed: def.motor_speed,
            },
        );
        Ok(handle)
    }

    fn destroy_body(&mut self, body: BodyHandle) -> Result<(), PhysicsError> {
        self.bodies
            .remove(&body)
            .ok_or(PhysicsError::InvalidBody(body))?;
        self.joints
            .retain(|_, joint| joint.def.body_a != body && joint.def.body_b != body);
        self.destroyed.push(body);
        Ok(())
    }

    fn step(&mut self, dt: f32) -> Vec<ContactEvent> {
        let gravity = self.gravity;
        for body in self.bodies.values_mut() {
            if body.kind == BodyKind::Dynamic {
                let state = &mut body.state;
                state.linear_velocity += (gravity + body.force) * dt;
                if body.fixed_rotation {
                    state.angular_velocity = 0.0;
                } else {
                    state.angular_velocity += body.torque * dt;
                }
                state.position += state.linear_velocity * dt;
                state.angle += state.angular_velocity * dt;
            }
            body.force = Vec2::ZERO;
            body.torque = 0.0;
        }
        self.steps += 1;

        let events = std::mem::take(&mut self.pending_events);
        events
            .into_iter()
            .filter(|event| self.involves_live_bodies(event))
            .collect()
    }

    fn bodies(&self) -> Vec<BodyHandle> {
        self.bodies.keys().copied().collect()
    }

    fn body_state(&self, body: BodyHandle) -> Option<BodyState> {
        self.bodies.get(&body).map(|body| body.state)
    }

    fn body_role(&self, body: BodyHandle) -> Option<BodyRole> {
        self.bodies.get(&body)?.role
    }

    fn apply_linear_impulse(
        &mut self,
        body: BodyHandle,
        impulse: Vec2,
    ) -> Result<(), PhysicsError> {
        let entry = self.body_mut(body)?;
        if entry.kind == BodyKind::Dynamic {
            entry.state.linear_velocity += impulse;
        }
        self.impulses.push((body, impulse));
        Ok(())
    }

    fn apply_force(&mut self, body: BodyHandle, force: Vec2) -> Result<(), PhysicsError> {
        self.body_mut(body)?.force += force;
        self.forces.push((body, force));
        Ok(())
    }

    fn apply_torque(&mut self, body: BodyHandle, torque: f32) -> Result<(), PhysicsError> {
        self.body_mut(body)?.torque += torque;
        self.torques.push((body, torque));
        Ok(())
    }

    fn set_transform(
        &mut self,
        body: BodyHandle,
        position: Vec2,
        angle: f32,
    ) -> Result<(), PhysicsError> {
        let state = &mut self.body_mut(body)?.state;
        state.position = position;
        state.angle = angle;
        Ok(())
    }

    fn set_velocity(
        &mut self,
        body: BodyHandle,
        linear: Vec2,
        angular: f32,
    ) -> Result<(), PhysicsError> {
        let state = &mut self.body_mut(body)?.state;
        state.linear_velocity = linear;
        state.angular_velocity = angular;
        Ok(())
    }

    fn set_joint_motor(
        &mut self,
        joint: JointHandle,
        enabled: bool,
        speed: f32,
    ) -> Result<(), PhysicsError> {
        let entry = self
            .joints
            .get_mut(&joint)
            .ok_or(PhysicsError::InvalidJoint(joint))?;
        entry.enabled = enabled;
        entry.speed = speed;
        self.motor_commands.push(MotorCommand {
            joint,
            enabled,
            speed,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::{FixtureTag, Team};
    use crate::world::{FixtureRef, Shape};

    #[test]
    fn gravity_integrates_with_explicit_euler() {
        let mut world = ScriptedWorld::with_gravity(Vec2::new(0.0, -10.0));
        let body = world.create_body(&BodyDef::dynamic(Vec2::ZERO));
        world.step(0.5);
        let state = world.body_state(body).unwrap();
        assert_eq!(state.linear_velocity, Vec2::new(0.0, -5.0));
        assert_eq!(state.position, Vec2::new(0.0, -2.5));
    }

    #[test]
    fn static_bodies_do_not_move() {
        let mut world = ScriptedWorld::with_gravity(Vec2::new(0.0, -10.0));
        let body = world.create_body(&BodyDef::fixed(Vec2::new(1.0, 1.0)));
        world.apply_linear_impulse(body, Vec2::X).unwrap();
        world.step(1.0);
        assert_eq!(world.body_state(body).unwrap().position, Vec2::new(1.0, 1.0));
    }

    #[test]
    fn forces_are_cleared_after_step() {
        let mut world = ScriptedWorld::new();
        let body = world.create_body(&BodyDef::dynamic(Vec2::ZERO));
        world.apply_force(body, Vec2::new(2.0, 0.0)).unwrap();
        world.step(1.0);
        world.step(1.0);
        assert_eq!(
            world.body_state(body).unwrap().linear_velocity,
            Vec2::new(2.0, 0.0)
        );
        assert_eq!(world.forces_on(body), vec![Vec2::new(2.0, 0.0)]);
    }

    #[test]
    fn scripted_events_are_reported_once_and_only_for_live_bodies() {
        let mut world = ScriptedWorld::new();
        let a = world.create_body(&BodyDef::dynamic(Vec2::ZERO));
        let b = world.create_body(&BodyDef::dynamic(Vec2::ZERO));
        world
            .create_fixture(
                a,
                &FixtureDef::new(Shape::Circle {
                    radius: 0.1,
                    offset: Vec2::ZERO,
                })
                .with_tag(FixtureTag::Projectile { team: Team::Red }),
            )
            .unwrap();
        let begin = ContactEvent::Begin(
            FixtureRef { body: a, tag: None },
            FixtureRef { body: b, tag: None },
        );
        world.push_events([begin]);
        assert_eq!(world.step(0.1), vec![begin]);
        assert!(world.step(0.1).is_empty());

        world.push_events([begin]);
        world.destroy_body(b).unwrap();
        assert!(world.step(0.1).is_empty());
        assert_eq!(world.body_role(a), Some(BodyRole::Projectile(Team::Red)));
    }

    #[test]
    fn destroying_a_body_drops_its_joints() {
        let mut world = ScriptedWorld::new();
        let a = world.create_body(&BodyDef::dynamic(Vec2::ZERO));
        let b = world.create_body(&BodyDef::dynamic(Vec2::ZERO));
        let joint = world
            .create_revolute_joint(&RevoluteJointDef {
                body_a: a,
                body_b: b,
                local_anchor_a: Vec2::ZERO,
                local_anchor_b: Vec2::ZERO,
                enable_motor: false,
                motor_speed: 0.0,
                max_motor_torque: 1.0,
                limits: None,
            })
            .unwrap();
        assert_eq!(world.joint_motor(joint), Some((false, 0.0)));
        world.destroy_body(a).unwrap();
        assert_eq!(
            world.set_joint_motor(joint, true, 1.0),
            Err(PhysicsError::InvalidJoint(joint))
        );
        assert_eq!(world.destroy_body(a), Err(PhysicsError::InvalidBody(a)));
    }
}
