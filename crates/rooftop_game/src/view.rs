//! What a renderer needs for one frame, already in canvas pixels.
//!
//! This is the only place simulation coordinates are converted: x scales by
//! `pixels_per_meter`, y is flipped against the canvas height (canvas origin is
//! top-left, y down), and angles change sign to match.

use glam::Vec2;
use rooftop_physics::interpolator::PhysicsInterpolator;
use rooftop_physics::tags::BodyRole;
use rooftop_physics::world::{BodyHandle, PhysicsWorld};

use crate::config::UnitsSection;
use crate::round::{MatchState, Phase, Score};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderBody {
    pub body: BodyHandle,
    pub role: Option<BodyRole>,
    /// Canvas pixels, origin top-left.
    pub position: Vec2,
    /// Radians, clockwise-positive as on the canvas.
    pub angle: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderFrame {
    pub bodies: Vec<RenderBody>,
    pub phase: Phase,
    pub score: Score,
    pub fps: f64,
}

pub fn to_canvas(units: &UnitsSection, position: Vec2) -> Vec2 {
    Vec2::new(
        position.x * units.pixels_per_meter,
        units.canvas_height - position.y * units.pixels_per_meter,
    )
}

impl RenderFrame {
    /// Interpolated pose of every drawable body. Bodies that have not been
    /// stepped yet are left out.
    pub fn capture<W: PhysicsWorld + ?Sized>(
        world: &W,
        interpolator: &PhysicsInterpolator,
        units: &UnitsSection,
        state: &MatchState,
        fps: f64,
    ) -> Self {
        let bodies = world
            .bodies()
            .into_iter()
            .filter_map(|body| {
                let pose = interpolator.get_interpolated_state(body)?;
                Some(RenderBody {
                    body,
                    role: world.body_role(body),
                    position: to_canvas(units, pose.position),
                    angle: -pose.angle,
                })
            })
            .collect();
        Self {
            bodies,
            phase: state.phase,
            score: state.score,
            fps,
        }
    }

    pub fn body(&self, body: BodyHandle) -> Option<&RenderBody> {
        self.bodies.iter().find(|render| render.body == body)
    }
}
