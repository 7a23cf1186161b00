//! Match phase, score, and the fall/respawn rule.

use std::fmt;

use glam::Vec2;
use rooftop_physics::contact::ProjectileHit;
use rooftop_physics::tags::Team;
use rooftop_physics::world::{PhysicsError, PhysicsWorld};

use crate::arena::{arm_rest_position, Arena};
use crate::config::GameConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Paused,
    Playing,
    GameOver,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Paused => "paused",
            Phase::Playing => "playing",
            Phase::GameOver => "game over",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Score {
    pub blue: u32,
    pub red: u32,
}

impl Score {
    pub fn get(&self, team: Team) -> u32 {
        match team {
            Team::Blue => self.blue,
            Team::Red => self.red,
        }
    }

    /// Add one point for `team` and return its new total.
    pub fn award(&mut self, team: Team) -> u32 {
        let slot = match team {
            Team::Blue => &mut self.blue,
            Team::Red => &mut self.red,
        };
        *slot += 1;
        *slot
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchState {
    pub phase: Phase,
    pub score: Score,
    /// Projectile hits landed per team, indexed by `Team::index`. Never scores.
    pub hits: [u32; 2],
}

impl Default for MatchState {
    fn default() -> Self {
        Self {
            phase: Phase::Playing,
            score: Score::default(),
            hits: [0; 2],
        }
    }
}

impl MatchState {
    pub fn record_hit(&mut self, hit: &ProjectileHit) {
        self.hits[hit.owner.index()] += 1;
    }

    pub fn hits_by(&self, team: Team) -> u32 {
        self.hits[team.index()]
    }

    pub fn winner(&self, win_score: u32) -> Option<Team> {
        Team::ALL
            .into_iter()
            .find(|team| self.score.get(*team) >= win_score)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundOutcome {
    /// Teams whose character fell this tick.
    pub fallen: Vec<Team>,
    pub game_over: bool,
}

#[derive(Debug, Clone)]
pub struct RoundController {
    config: GameConfig,
}

impl RoundController {
    pub fn new(config: &GameConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    pub fn win_score(&self) -> u32 {
        self.config.round.win_score
    }

    /// Score falls and restart the round if anyone fell. Does nothing unless
    /// the match is being played.
    pub fn update<W: PhysicsWorld + ?Sized>(
        &self,
        world: &mut W,
        arena: &Arena,
        state: &mut MatchState,
    ) -> Option<RoundOutcome> {
        if state.phase != Phase::Playing {
            return None;
        }

        let fallen: Vec<Team> = arena
            .fighters()
            .iter()
            .filter(|fighter| {
                world
                    .body_state(fighter.body)
                    .is_some_and(|body| body.position.y < self.config.round.kill_plane_y)
            })
            .map(|fighter| fighter.team)
            .collect();
        if fallen.is_empty() {
            return None;
        }

        for team in &fallen {
            let scorer = team.opponent();
            let total = state.score.award(scorer);
            log::info!("{team} fell; {scorer} scores ({total})");
            if total >= self.win_score() {
                state.phase = Phase::GameOver;
            }
        }
        if state.phase == Phase::GameOver {
            log::info!(
                "Match over: blue {} - red {}",
                state.score.blue,
                state.score.red
            );
        }

        if let Err(err) = self.respawn_all(world, arena) {
            log::debug!("Respawn incomplete: {err}");
        }
        Some(RoundOutcome {
            fallen,
            game_over: state.phase == Phase::GameOver,
        })
    }

    /// Put both characters and their arms back on their spawns, upright and
    /// at rest.
    pub fn respawn_all<W: PhysicsWorld + ?Sized>(
        &self,
        world: &mut W,
        arena: &Arena,
    ) -> Result<(), PhysicsError> {
        for fighter in arena.fighters() {
            world.set_velocity(fighter.body, Vec2::ZERO, 0.0)?;
            world.set_transform(fighter.body, fighter.spawn, 0.0)?;
            world.set_velocity(fighter.arm, Vec2::ZERO, 0.0)?;
            world.set_transform(fighter.arm, arm_rest_position(&self.config, fighter.spawn), 0.0)?;
        }
        Ok(())
    }
}
