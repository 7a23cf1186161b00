//! Fixed-timestep driver with render interpolation.
//!
//! Render frames arrive at an irregular cadence; the world must only ever be
//! advanced by the fixed step. Frame time is accumulated and drained in whole
//! steps, and the leftover fraction becomes `alpha`, the blend factor between
//! the last two simulated states.
//!
//! `previous` is captured right before each fixed step and `current` right
//! after the catch-up loop, so `previous` is exactly one step behind `current`
//! whenever a step ran.

use std::collections::HashMap;
use std::f32::consts::{PI, TAU};

use glam::Vec2;

use crate::world::{BodyHandle, BodyState, ContactEvent, PhysicsWorld};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PhysicsState {
    pub position: Vec2,
    pub angle: f32,
    pub linear_velocity: Vec2,
    pub angular_velocity: f32,
    /// Simulation time (seconds) the state was captured at.
    pub timestamp: f64,
}

impl PhysicsState {
    pub fn from_body(state: BodyState, timestamp: f64) -> Self {
        Self {
            position: state.position,
            angle: state.angle,
            linear_velocity: state.linear_velocity,
            angular_velocity: state.angular_velocity,
            timestamp,
        }
    }
}

/// Wrap an angle into (−π, π].
pub fn normalize_angle(angle: f32) -> f32 {
    let wrapped = angle.rem_euclid(TAU);
    if wrapped > PI {
        wrapped - TAU
    } else {
        wrapped
    }
}

/// Callbacks around each fixed step of
/// [`PhysicsInterpolator::update_physics_with`].
pub trait StepHooks<W: ?Sized> {
    /// Runs ahead of the step with the simulation time it starts at. Per-step
    /// forces belong here: both backends drop user forces once a step
    /// consumes them.
    fn before_step(&mut self, _world: &mut W, _now: f64) {}

    /// Sees the step's contact events before the next step runs.
    fn after_step(&mut self, world: &mut W, events: Vec<ContactEvent>);
}

struct AfterStep<F>(F);

impl<W: ?Sized, F: FnMut(&mut W, Vec<ContactEvent>)> StepHooks<W> for AfterStep<F> {
    fn after_step(&mut self, world: &mut W, events: Vec<ContactEvent>) {
        (self.0)(world, events)
    }
}

#[derive(Debug, Clone)]
pub struct PhysicsInterpolator {
    fixed_time_step: f64,
    max_frame_time: f64,
    accumulator: f64,
    sim_time: f64,
    alpha: f32,
    previous: HashMap<BodyHandle, PhysicsState>,
    current: HashMap<BodyHandle, PhysicsState>,
}

impl PhysicsInterpolator {
    pub fn new(fixed_time_step: f64, max_frame_time: f64) -> Self {
        Self {
            fixed_time_step,
            max_frame_time,
            accumulator: 0.0,
            sim_time: 0.0,
            alpha: 0.0,
            previous: HashMap::new(),
            current: HashMap::new(),
        }
    }

    pub fn fixed_time_step(&self) -> f64 {
        self.fixed_time_step
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    /// Total simulated time in seconds.
    pub fn sim_time(&self) -> f64 {
        self.sim_time
    }

    /// Accumulate `delta` seconds of frame time and run as many fixed steps as
    /// it covers. `on_step` sees every step's contact events before the next
    /// step runs. Returns the number of steps taken.
    pub fn update_physics<W, F>(&mut self, world: &mut W, delta: f64, on_step: F) -> u32
    where
        W: PhysicsWorld + ?Sized,
        F: FnMut(&mut W, Vec<ContactEvent>),
    {
        self.update_physics_with(world, delta, &mut AfterStep(on_step))
    }

    /// Like [`update_physics`](Self::update_physics), with `hooks` called on
    /// both sides of every fixed step.
    pub fn update_physics_with<W, H>(&mut self, world: &mut W, delta: f64, hooks: &mut H) -> u32
    where
        W: PhysicsWorld + ?Sized,
        H: StepHooks<W> + ?Sized,
    {
        let delta = if delta.is_finite() && delta > 0.0 {
            delta.min(self.max_frame_time)
        } else {
            0.0
        };
        self.accumulator += delta;

        let mut steps = 0;
        while self.accumulator >= self.fixed_time_step {
            hooks.before_step(world, self.sim_time);
            self.previous = snapshot(world, self.sim_time);
            let events = world.step(self.fixed_time_step as f32);
            self.sim_time += self.fixed_time_step;
            self.accumulator -= self.fixed_time_step;
            hooks.after_step(world, events);
            steps += 1;
        }

        self.current = snapshot(world, self.sim_time);
        self.previous
            .retain(|body, _| self.current.contains_key(body));
        self.alpha = (self.accumulator / self.fixed_time_step) as f32;
        steps
    }

    /// Re-read `body` from the world after it was moved outside a step, e.g.
    /// teleported. Both snapshots take the new pose so nothing is blended
    /// across the jump.
    pub fn resnapshot<W: PhysicsWorld + ?Sized>(&mut self, world: &W, body: BodyHandle) {
        match world.body_state(body) {
            Some(state) => {
                let state = PhysicsState::from_body(state, self.sim_time);
                self.current.insert(body, state);
                self.previous.insert(body, state);
            }
            None => self.forget(body),
        }
    }

    /// Blend of the last two states at the current `alpha`.
    ///
    /// `None` until the body has a current snapshot; the raw current state
    /// while it has no previous one.
    pub fn get_interpolated_state(&self, body: BodyHandle) -> Option<PhysicsState> {
        let current = self.current.get(&body)?;
        let Some(previous) = self.previous.get(&body) else {
            return Some(*current);
        };
        let t = self.alpha;
        Some(PhysicsState {
            position: previous.position.lerp(current.position, t),
            angle: previous.angle + normalize_angle(current.angle - previous.angle) * t,
            linear_velocity: previous.linear_velocity.lerp(current.linear_velocity, t),
            angular_velocity: previous.angular_velocity
                + (current.angular_velocity - previous.angular_velocity) * t,
            timestamp: previous.timestamp + (current.timestamp - previous.timestamp) * t as f64,
        })
    }

    pub fn current_state(&self, body: BodyHandle) -> Option<PhysicsState> {
        self.current.get(&body).copied()
    }

    pub fn previous_state(&self, body: BodyHandle) -> Option<PhysicsState> {
        self.previous.get(&body).copied()
    }

    /// Drop both snapshots of a destroyed body.
    pub fn forget(&mut self, body: BodyHandle) {
        self.previous.remove(&body);
        self.current.remove(&body);
    }

    /// Drop all snapshots and leftover frame time. Simulation time keeps running.
    pub fn clear(&mut self) {
        self.previous.clear();
        self.current.clear();
        self.accumulator = 0.0;
        self.alpha = 0.0;
    }
}

fn snapshot<W: PhysicsWorld + ?Sized>(world: &W, timestamp: f64) -> HashMap<BodyHandle, PhysicsState> {
    world
        .bodies()
        .into_iter()
        .filter_map(|body| {
            let state = world.body_state(body)?;
            Some((body, PhysicsState::from_body(state, timestamp)))
        })
        .collect()
}
