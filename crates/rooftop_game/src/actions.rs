//! Key state to forces: jumping, aiming and the upright stabilizer.
//!
//! Each character has three independent controls:
//!
//! - **Jump** (level-triggered with a one-shot start): pressing while grounded
//!   and off cooldown applies an impulse; keeping the key held keeps pushing
//!   with a smaller force until `max_duration` has passed since the start.
//! - **Arm motor** (level-triggered): the hinge motor runs while the trigger
//!   key is held and is switched off otherwise.
//! - **Fire** (edge-triggered): a shot is requested on the frame the trigger
//!   key is released, never on press or while held.
//!
//! Held controls run once per fixed step so their forces do not depend on the
//! render rate; fire edges are read once per rendered frame. The two
//! characters act on disjoint state, so their order does not matter.

use glam::Vec2;
use rooftop_core::input::{InputState, Key};
use rooftop_physics::contact::ContactListener;
use rooftop_physics::interpolator::normalize_angle;
use rooftop_physics::tags::Team;
use rooftop_physics::world::PhysicsWorld;

use crate::arena::{arm_motor_speed, Arena, Fighter};
use crate::config::GameConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Controls {
    pub jump: Key,
    pub trigger: Key,
}

pub fn controls(team: Team) -> Controls {
    match team {
        Team::Blue => Controls {
            jump: Key::W,
            trigger: Key::E,
        },
        Team::Red => Controls {
            jump: Key::I,
            trigger: Key::O,
        },
    }
}

/// Wrap `angle` into (−π, π] and clamp it to ±`max_angle`.
pub fn clamp_jump_angle(angle: f32, max_angle: f32) -> f32 {
    normalize_angle(angle).clamp(-max_angle, max_angle)
}

/// Push direction for a character tilted by `angle`.
pub fn jump_direction(angle: f32, max_angle: f32, horizontal_factor: f32) -> Vec2 {
    let angle = clamp_jump_angle(angle, max_angle);
    Vec2::new(angle.sin() * horizontal_factor, angle.cos())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JumpPhase {
    #[default]
    Idle,
    /// The frame the jump impulse was applied.
    Rising,
    /// Held after the start; sustain force is applied.
    Sustaining,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct JumpState {
    pub phase: JumpPhase,
    /// Simulation time of the most recent jump start.
    pub last_jump_time: Option<f64>,
}

impl JumpState {
    pub fn is_jumping(&self) -> bool {
        self.phase != JumpPhase::Idle
    }
}

#[derive(Debug, Clone)]
pub struct ActionController {
    config: GameConfig,
    jumps: [JumpState; 2],
}

impl ActionController {
    pub fn new(config: &GameConfig) -> Self {
        Self {
            config: config.clone(),
            jumps: [JumpState::default(); 2],
        }
    }

    pub fn jump_state(&self, team: Team) -> JumpState {
        self.jumps[team.index()]
    }

    pub fn reset(&mut self) {
        self.jumps = [JumpState::default(); 2];
    }

    /// Run the held controls (jump, arm motor, stabilizer) for both
    /// characters. Called once per fixed step, ahead of the step, with the
    /// simulation time the step starts at.
    pub fn apply_held<W: PhysicsWorld + ?Sized>(
        &mut self,
        world: &mut W,
        arena: &Arena,
        input: &InputState,
        contacts: &ContactListener,
        now: f64,
    ) {
        for fighter in arena.fighters() {
            let keys = controls(fighter.team);
            self.update_jump(
                world,
                fighter,
                input.is_held(keys.jump),
                contacts.can_jump(fighter.team),
                now,
            );
            self.update_arm_motor(world, fighter, input.is_held(keys.trigger));
            if self.config.stabilizer.enabled {
                self.stabilize(world, fighter);
            }
        }
    }

    /// Teams whose trigger was released this frame, in team order. Edges are
    /// read once per rendered frame, never per step.
    pub fn released_triggers(input: &InputState) -> Vec<Team> {
        Team::ALL
            .into_iter()
            .filter(|team| input.is_just_released(controls(*team).trigger))
            .collect()
    }

    pub fn update_jump<W: PhysicsWorld + ?Sized>(
        &mut self,
        world: &mut W,
        fighter: &Fighter,
        held: bool,
        can_jump: bool,
        now: f64,
    ) -> JumpPhase {
        let jump = &self.config.jump;
        let state = &mut self.jumps[fighter.team.index()];
        if !held {
            state.phase = JumpPhase::Idle;
            return state.phase;
        }

        match state.phase {
            JumpPhase::Idle => {
                let off_cooldown = state
                    .last_jump_time
                    .map_or(true, |last| now - last > jump.cooldown);
                if !(can_jump && off_cooldown) {
                    return state.phase;
                }
                let Some(body) = world.body_state(fighter.body) else {
                    log::debug!("Jump skipped: {} character is gone", fighter.team);
                    return state.phase;
                };
                let direction = jump_direction(body.angle, jump.max_angle, jump.horizontal_factor);
                if let Err(err) = world.apply_linear_impulse(fighter.body, direction * jump.impulse) {
                    log::debug!("Jump impulse skipped: {err}");
                    return state.phase;
                }
                log::debug!("{} jumps at t={now:.3}", fighter.team);
                state.last_jump_time = Some(now);
                state.phase = JumpPhase::Rising;
            }
            JumpPhase::Rising | JumpPhase::Sustaining => {
                let within = state
                    .last_jump_time
                    .is_some_and(|start| now - start < jump.max_duration);
                if !within {
                    state.phase = JumpPhase::Idle;
                    return state.phase;
                }
                let Some(body) = world.body_state(fighter.body) else {
                    state.phase = JumpPhase::Idle;
                    return state.phase;
                };
                let direction = jump_direction(body.angle, jump.max_angle, jump.horizontal_factor);
                if let Err(err) = world.apply_force(fighter.body, direction * jump.sustain_force) {
                    log::debug!("Jump sustain skipped: {err}");
                }
                state.phase = JumpPhase::Sustaining;
            }
        }
        state.phase
    }

    pub fn update_arm_motor<W: PhysicsWorld + ?Sized>(
        &self,
        world: &mut W,
        fighter: &Fighter,
        held: bool,
    ) {
        let result = if held {
            world.set_joint_motor(
                fighter.joint,
                true,
                arm_motor_speed(&self.config, fighter.team),
            )
        } else {
            world.set_joint_motor(fighter.joint, false, 0.0)
        };
        if let Err(err) = result {
            log::debug!("Arm motor update skipped: {err}");
        }
    }

    /// Spring the character back toward upright once it tips or spins past
    /// the thresholds.
    pub fn stabilize<W: PhysicsWorld + ?Sized>(&self, world: &mut W, fighter: &Fighter) {
        let stabilizer = &self.config.stabilizer;
        let Some(state) = world.body_state(fighter.body) else {
            return;
        };
        let angle = normalize_angle(state.angle);
        let spin = state.angular_velocity;
        if angle.abs() > stabilizer.angle_threshold
            || spin.abs() > stabilizer.angular_velocity_threshold
        {
            let torque = -angle * stabilizer.stiffness - spin * stabilizer.damping;
            if let Err(err) = world.apply_torque(fighter.body, torque) {
                log::debug!("Stabilizer skipped: {err}");
            }
        }
    }
}
