//! Stage, fighters and their arms.
//!
//! The stage is a static box half the canvas wide and half the canvas high,
//! centered horizontally with its bottom on y = 0. Each fighter is a dynamic
//! body with a circular foot and a box torso, plus an arm body hinged at the
//! character origin with a motorized, angle-limited revolute joint.

use glam::Vec2;
use rooftop_physics::tags::{CharacterPart, FixtureTag, Team};
use rooftop_physics::world::{
    BodyDef, BodyHandle, FixtureDef, JointHandle, PhysicsError, PhysicsWorld, RevoluteJointDef,
    Shape,
};

use crate::config::GameConfig;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageGeometry {
    pub center: Vec2,
    pub half_extents: Vec2,
}

impl StageGeometry {
    pub fn from_config(config: &GameConfig) -> Self {
        let (width, height) = config.units.canvas_size_meters();
        let half_extents = Vec2::new(width / 4.0, height / 4.0);
        Self {
            center: Vec2::new(width / 2.0, half_extents.y),
            half_extents,
        }
    }

    pub fn top(&self) -> f32 {
        self.center.y + self.half_extents.y
    }

    pub fn left(&self) -> f32 {
        self.center.x - self.half_extents.x
    }

    pub fn right(&self) -> f32 {
        self.center.x + self.half_extents.x
    }
}

/// Where `team`'s character stands at the start of every round.
pub fn spawn_point(config: &GameConfig, team: Team) -> Vec2 {
    let stage = StageGeometry::from_config(config);
    let arena = &config.arena;
    let y = stage.top() + arena.character_radius + arena.spawn_clearance;
    let x = match team {
        Team::Blue => stage.left() + arena.spawn_inset,
        Team::Red => stage.right() - arena.spawn_inset,
    };
    Vec2::new(x, y)
}

/// Arm center that puts the arm's hinge anchor on the character origin at
/// zero rotation.
pub fn arm_rest_position(config: &GameConfig, character_position: Vec2) -> Vec2 {
    character_position - Vec2::new(0.0, config.arm.half_height)
}

/// Target speed of `team`'s arm motor while the trigger is held. The two arms
/// sweep in opposite directions, toward the middle of the stage.
pub fn arm_motor_speed(config: &GameConfig, team: Team) -> f32 {
    match team {
        Team::Blue => -config.arm.motor_speed,
        Team::Red => config.arm.motor_speed,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fighter {
    pub team: Team,
    pub body: BodyHandle,
    pub arm: BodyHandle,
    pub joint: JointHandle,
    pub spawn: Vec2,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Arena {
    pub ground: BodyHandle,
    pub stage: StageGeometry,
    fighters: [Fighter; 2],
}

impl Arena {
    pub fn build<W: PhysicsWorld + ?Sized>(
        world: &mut W,
        config: &GameConfig,
    ) -> Result<Self, PhysicsError> {
        let stage = StageGeometry::from_config(config);
        let ground = world.create_body(&BodyDef::fixed(stage.center));
        world.create_fixture(
            ground,
            &FixtureDef::new(Shape::Box {
                half_width: stage.half_extents.x,
                half_height: stage.half_extents.y,
                offset: Vec2::ZERO,
            })
            .with_density(0.0)
            .with_friction(config.arena.stage_friction)
            .with_tag(FixtureTag::Ground),
        )?;

        let blue = build_fighter(world, config, Team::Blue)?;
        let red = build_fighter(world, config, Team::Red)?;
        log::debug!(
            "Arena built: stage top {:.2}, spawns {:?} / {:?}",
            stage.top(),
            blue.spawn,
            red.spawn
        );
        Ok(Self {
            ground,
            stage,
            fighters: [blue, red],
        })
    }

    pub fn fighter(&self, team: Team) -> &Fighter {
        &self.fighters[team.index()]
    }

    pub fn fighters(&self) -> &[Fighter; 2] {
        &self.fighters
    }
}

fn build_fighter<W: PhysicsWorld + ?Sized>(
    world: &mut W,
    config: &GameConfig,
    team: Team,
) -> Result<Fighter, PhysicsError> {
    let arena = &config.arena;
    let spawn = spawn_point(config, team);

    let body = world.create_body(
        &BodyDef::dynamic(spawn).with_angular_damping(arena.character_angular_damping),
    );
    world.create_fixture(
        body,
        &FixtureDef::new(Shape::Circle {
            radius: arena.character_radius,
            offset: Vec2::ZERO,
        })
        .with_density(arena.bottom_density)
        .with_friction(arena.bottom_friction)
        .with_restitution(arena.bottom_restitution)
        .with_tag(FixtureTag::Character {
            team,
            part: CharacterPart::Bottom,
        }),
    )?;
    let torso_height = arena.character_height - arena.character_radius;
    world.create_fixture(
        body,
        &FixtureDef::new(Shape::Box {
            half_width: arena.character_width / 2.0,
            half_height: torso_height / 2.0,
            offset: Vec2::new(0.0, arena.character_radius + torso_height / 2.0),
        })
        .with_density(arena.top_density)
        .with_friction(arena.top_friction)
        .with_tag(FixtureTag::Character {
            team,
            part: CharacterPart::Top,
        }),
    )?;

    let arm_config = &config.arm;
    let arm = world.create_body(
        &BodyDef::dynamic(arm_rest_position(config, spawn))
            .with_angular_damping(arm_config.angular_damping),
    );
    world.create_fixture(
        arm,
        &FixtureDef::new(Shape::Box {
            half_width: arm_config.half_width,
            half_height: arm_config.half_height,
            offset: Vec2::ZERO,
        })
        .with_density(arm_config.density)
        .with_tag(FixtureTag::Arm { team }),
    )?;

    let joint = world.create_revolute_joint(&RevoluteJointDef {
        body_a: body,
        body_b: arm,
        local_anchor_a: Vec2::ZERO,
        local_anchor_b: Vec2::new(0.0, arm_config.half_height),
        enable_motor: true,
        motor_speed: 0.0,
        max_motor_torque: arm_config.max_motor_torque,
        limits: Some((-arm_config.angle_limit, arm_config.angle_limit)),
    })?;

    Ok(Fighter {
        team,
        body,
        arm,
        joint,
        spawn,
    })
}
