//! The per-frame driver.
//!
//! The host calls [`GameEngine::tick`] once per rendered frame with its own
//! monotonic timestamp. Everything a frame does happens inside that call, in a
//! fixed order:
//!
//!   1. `FrameClock::begin_frame` turns the timestamp into a clamped delta
//!   2. an Escape edge toggles pause
//!   3. while playing: released triggers fire, then the interpolator runs the
//!      fixed steps; ahead of each step the held keys become impulses, forces
//!      and motor commands, and after it the contact rules see its events
//!   4. the grid is rebuilt from the world's live bodies, projectiles are
//!      checked and culled, and falls are scored
//!   5. the input snapshot rolls over
//!
//! Drawing reads [`GameEngine::render_frame`] afterwards.

use glam::Vec2;
use rooftop_core::input::{InputState, Key};
use rooftop_core::time::FrameClock;
use rooftop_physics::contact::{ContactListener, ProjectileHit};
use rooftop_physics::grid::SpatialGrid;
use rooftop_physics::interpolator::{PhysicsInterpolator, StepHooks};
use rooftop_physics::rapier_world::RapierWorld;
use rooftop_physics::tags::Team;
use rooftop_physics::world::{ContactEvent, PhysicsError, PhysicsWorld};

use crate::actions::ActionController;
use crate::arena::Arena;
use crate::config::GameConfig;
use crate::projectiles::ProjectileManager;
use crate::round::{MatchState, Phase, RoundController, RoundOutcome};
use crate::view::RenderFrame;

/// What happened during one [`GameEngine::tick`].
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    /// Fixed physics steps taken.
    pub steps: u32,
    /// Teams that fired this frame.
    pub fired: Vec<Team>,
    pub hits: Vec<ProjectileHit>,
    pub round: Option<RoundOutcome>,
    /// Phase after the tick.
    pub phase: Phase,
}

/// Held controls before each fixed step, contact rules after it.
struct FixedStep<'a> {
    actions: &'a mut ActionController,
    arena: &'a Arena,
    input: &'a InputState,
    contacts: &'a mut ContactListener,
}

impl<W: PhysicsWorld> StepHooks<W> for FixedStep<'_> {
    fn before_step(&mut self, world: &mut W, now: f64) {
        self.actions
            .apply_held(world, self.arena, self.input, self.contacts, now);
    }

    fn after_step(&mut self, world: &mut W, events: Vec<ContactEvent>) {
        self.contacts.handle_events(world, &events);
    }
}

pub struct GameEngine<W: PhysicsWorld> {
    config: GameConfig,
    world: W,
    arena: Arena,
    clock: FrameClock,
    input: InputState,
    interpolator: PhysicsInterpolator,
    grid: SpatialGrid,
    contacts: ContactListener,
    actions: ActionController,
    projectiles: ProjectileManager,
    rounds: RoundController,
    state: MatchState,
}

impl GameEngine<RapierWorld> {
    pub fn new(config: GameConfig) -> Result<Self, PhysicsError> {
        let world = RapierWorld::new(Vec2::new(0.0, config.physics.gravity));
        Self::with_world(world, config)
    }
}

impl<W: PhysicsWorld> GameEngine<W> {
    /// Build the arena inside `world` and take the initial snapshot so the
    /// first frame can be drawn before any step has run.
    pub fn with_world(mut world: W, config: GameConfig) -> Result<Self, PhysicsError> {
        let arena = Arena::build(&mut world, &config)?;
        let mut interpolator =
            PhysicsInterpolator::new(config.physics.fixed_time_step, config.physics.max_frame_time);
        interpolator.update_physics(&mut world, 0.0, |_, _| {});
        let mut grid = SpatialGrid::new(config.grid_config());
        grid.reindex(&world);

        log::info!(
            "Match ready: first to {} points, step {:.4}s",
            config.round.win_score,
            config.physics.fixed_time_step
        );
        Ok(Self {
            clock: FrameClock::new(config.physics.max_frame_time),
            input: InputState::new(),
            contacts: ContactListener::new(config.contact_config()),
            actions: ActionController::new(&config),
            projectiles: ProjectileManager::new(&config),
            rounds: RoundController::new(&config),
            state: MatchState::default(),
            interpolator,
            grid,
            arena,
            world,
            config,
        })
    }

    pub fn tick(&mut self, timestamp: f64) -> TickReport {
        let delta = self.clock.begin_frame(timestamp);
        if self.input.is_just_pressed(Key::Escape) {
            self.toggle_pause();
        }

        let mut report = TickReport {
            steps: 0,
            fired: Vec::new(),
            hits: Vec::new(),
            round: None,
            phase: self.state.phase,
        };
        if self.state.phase == Phase::Playing {
            for team in ActionController::released_triggers(&self.input) {
                let fighter = self.arena.fighter(team);
                match self.projectiles.fire_projectile(&mut self.world, fighter) {
                    Ok(_) => report.fired.push(team),
                    Err(err) => log::debug!("{team} could not fire: {err}"),
                }
            }

            let mut hooks = FixedStep {
                actions: &mut self.actions,
                arena: &self.arena,
                input: &self.input,
                contacts: &mut self.contacts,
            };
            report.steps = self
                .interpolator
                .update_physics_with(&mut self.world, delta, &mut hooks);

            self.grid.reindex(&self.world);
            let contact_hits = self.contacts.take_projectile_hits();
            report.hits = self.projectiles.update(
                &mut self.world,
                &mut self.grid,
                &mut self.interpolator,
                &contact_hits,
            );
            for hit in &report.hits {
                log::debug!("{} hit {}", hit.owner, hit.victim);
                self.state.record_hit(hit);
            }
            report.round = self
                .rounds
                .update(&mut self.world, &self.arena, &mut self.state);
            if report.round.is_some() {
                self.resnapshot_fighters();
            }
        }

        self.input.end_frame();
        report.phase = self.state.phase;
        report
    }

    /// Flip between playing and paused. Has no effect once the match is over.
    pub fn toggle_pause(&mut self) -> Phase {
        self.state.phase = match self.state.phase {
            Phase::Playing => Phase::Paused,
            Phase::Paused => {
                self.clock.resync();
                Phase::Playing
            }
            Phase::GameOver => return Phase::GameOver,
        };
        log::info!("Match {}", self.state.phase);
        self.state.phase
    }

    /// Start a fresh match in the same arena.
    pub fn reset_match(&mut self) {
        self.projectiles
            .clear(&mut self.world, &mut self.grid, &mut self.interpolator);
        self.actions.reset();
        if let Err(err) = self.rounds.respawn_all(&mut self.world, &self.arena) {
            log::debug!("Respawn incomplete: {err}");
        }
        self.resnapshot_fighters();
        self.state = MatchState::default();
        self.clock.resync();
        log::info!("Match reset");
    }

    /// Respawns teleport outside a step; drop the pre-teleport poses so the
    /// next drawn frame shows the spawn.
    fn resnapshot_fighters(&mut self) {
        for fighter in self.arena.fighters() {
            self.interpolator.resnapshot(&self.world, fighter.body);
            self.interpolator.resnapshot(&self.world, fighter.arm);
        }
    }

    /// Drop everything that refers to bodies outside the arena and every bit
    /// of derived state, leaving the world with only the stage and fighters.
    pub fn teardown(&mut self) {
        self.projectiles
            .clear(&mut self.world, &mut self.grid, &mut self.interpolator);
        self.interpolator.clear();
        self.grid.clear();
        self.contacts.reset();
        self.input.clear();
        log::debug!("Engine torn down");
    }

    pub fn render_frame(&self) -> RenderFrame {
        RenderFrame::capture(
            &self.world,
            &self.interpolator,
            &self.config.units,
            &self.state,
            self.clock.smoothed_fps,
        )
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn input_mut(&mut self) -> &mut InputState {
        &mut self.input
    }

    pub fn world(&self) -> &W {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut W {
        &mut self.world
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    pub fn state(&self) -> &MatchState {
        &self.state
    }

    pub fn projectiles(&self) -> &ProjectileManager {
        &self.projectiles
    }

    pub fn contacts(&self) -> &ContactListener {
        &self.contacts
    }

    pub fn actions(&self) -> &ActionController {
        &self.actions
    }

    pub fn grid(&self) -> &SpatialGrid {
        &self.grid
    }

    pub fn interpolator(&self) -> &PhysicsInterpolator {
        &self.interpolator
    }

    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rooftop_physics::tags::{CharacterPart, FixtureTag};
    use rooftop_physics::test_world::ScriptedWorld;
    use rooftop_physics::world::{ContactEvent, FixtureRef};

    const DT: f64 = 1.0 / 60.0;

    fn engine() -> GameEngine<ScriptedWorld> {
        GameEngine::with_world(ScriptedWorld::new(), GameConfig::default()).expect("engine builds")
    }

    fn press(engine: &mut GameEngine<ScriptedWorld>, key: Key, timestamp: f64) -> TickReport {
        engine.input_mut().key_down(key);
        engine.tick(timestamp)
    }

    fn release(engine: &mut GameEngine<ScriptedWorld>, key: Key, timestamp: f64) -> TickReport {
        engine.input_mut().key_up(key);
        engine.tick(timestamp)
    }

    #[test]
    fn starts_playing_with_arena_drawable() {
        let engine = engine();
        assert_eq!(engine.state().phase, Phase::Playing);
        let frame = engine.render_frame();
        assert_eq!(frame.bodies.len(), 5);
        assert_eq!(engine.grid().len(), 5);
    }

    #[test]
    fn first_tick_does_not_step_and_second_steps_once() {
        let mut engine = engine();
        assert_eq!(engine.tick(10.0).steps, 0);
        assert_eq!(engine.tick(10.11).steps, 6);
        assert_eq!(engine.world().steps, 6);
    }

    #[test]
    fn escape_toggles_pause_and_paused_frames_do_not_step() {
        let mut engine = engine();
        engine.tick(0.0);
        let report = press(&mut engine, Key::Escape, DT);
        assert_eq!(report.phase, Phase::Paused);
        assert_eq!(report.steps, 0);

        // Still held: no second toggle.
        let report = engine.tick(0.5);
        assert_eq!(report.phase, Phase::Paused);
        assert_eq!(engine.world().steps, 0);

        release(&mut engine, Key::Escape, 0.6);
        let report = press(&mut engine, Key::Escape, 0.7);
        assert_eq!(report.phase, Phase::Playing);
        assert!(report.steps > 0);
    }

    #[test]
    fn escape_is_ignored_after_game_over() {
        let mut engine = engine();
        engine.state.phase = Phase::GameOver;
        assert_eq!(press(&mut engine, Key::Escape, 0.0).phase, Phase::GameOver);
    }

    #[test]
    fn releasing_trigger_fires_once() {
        let mut engine = engine();
        assert!(press(&mut engine, Key::E, 0.0).fired.is_empty());
        assert!(engine.tick(DT).fired.is_empty());
        assert_eq!(release(&mut engine, Key::E, 2.0 * DT).fired, vec![Team::Blue]);
        assert_eq!(engine.projectiles().len(), 1);
        assert!(engine.tick(3.0 * DT).fired.is_empty());
        assert_eq!(engine.projectiles().len(), 1);
    }

    #[test]
    fn contact_hit_is_tallied_for_shooter() {
        let mut engine = engine();
        press(&mut engine, Key::O, 0.0);
        release(&mut engine, Key::O, 0.0);
        let shot = engine.projectiles().live()[0].body;
        let blue = engine.arena().fighter(Team::Blue).body;
        engine.world_mut().push_events([ContactEvent::Begin(
            FixtureRef {
                body: shot,
                tag: Some(FixtureTag::Projectile { team: Team::Red }),
            },
            FixtureRef {
                body: blue,
                tag: Some(FixtureTag::Character {
                    team: Team::Blue,
                    part: CharacterPart::Top,
                }),
            },
        )]);

        let report = engine.tick(DT);
        assert_eq!(report.steps, 1);
        assert_eq!(
            report.hits,
            vec![ProjectileHit {
                projectile: shot,
                owner: Team::Red,
                victim: Team::Blue,
            }]
        );
        assert_eq!(engine.state().hits_by(Team::Red), 1);
        assert!(engine.projectiles().is_empty());
        assert!(!engine.world().contains(shot));
        assert!(engine.interpolator().current_state(shot).is_none());
        assert_eq!(engine.state().score.red, 0);
    }

    #[test]
    fn fall_scores_and_respawns() {
        let mut engine = engine();
        let blue = *engine.arena().fighter(Team::Blue);
        engine
            .world_mut()
            .set_transform(blue.body, Vec2::new(12.0, -3.0), 0.0)
            .unwrap();
        let report = engine.tick(0.0);
        let outcome = report.round.expect("blue fell");
        assert_eq!(outcome.fallen, vec![Team::Blue]);
        assert_eq!(engine.state().score.red, 1);
        assert_eq!(
            engine.world().body_state(blue.body).unwrap().position,
            blue.spawn
        );
    }

    #[test]
    fn drawn_pose_follows_the_respawn_in_the_same_frame() {
        let mut engine = engine();
        engine.tick(0.0);
        let blue = *engine.arena().fighter(Team::Blue);
        engine
            .world_mut()
            .set_transform(blue.body, Vec2::new(12.0, -3.0), 0.0)
            .unwrap();
        engine.tick(DT);

        for fighter in engine.arena().fighters() {
            for body in [fighter.body, fighter.arm] {
                let drawn = engine.interpolator().get_interpolated_state(body).unwrap();
                let live = engine.world().body_state(body).unwrap();
                assert_eq!(drawn.position, live.position);
            }
        }
        let drawn = engine.interpolator().get_interpolated_state(blue.body).unwrap();
        assert_eq!(drawn.position, blue.spawn);
    }

    /// Hold W on a grounded blue for half a second of frames `frame_dt`
    /// apart; returns blue's velocity and the sustain forces it received.
    fn held_jump(frame_dt: f64) -> (Vec2, usize, usize) {
        let mut config = GameConfig::default();
        config.physics.fixed_time_step = 1.0 / 64.0;
        config.jump.max_duration = 0.25;
        let mut engine =
            GameEngine::with_world(ScriptedWorld::new(), config).expect("engine builds");
        let blue = engine.arena().fighter(Team::Blue).body;
        let ground = engine.arena().ground;
        engine.world_mut().push_events([ContactEvent::Begin(
            FixtureRef {
                body: blue,
                tag: Some(FixtureTag::Character {
                    team: Team::Blue,
                    part: CharacterPart::Bottom,
                }),
            },
            FixtureRef {
                body: ground,
                tag: Some(FixtureTag::Ground),
            },
        )]);
        engine.tick(0.0);
        engine.tick(1.0 / 32.0);
        assert!(engine.contacts().can_jump(Team::Blue));

        engine.input_mut().key_down(Key::W);
        let frames = (0.5 / frame_dt) as usize;
        for frame in 1..=frames {
            engine.tick(1.0 / 32.0 + frame as f64 * frame_dt);
        }
        assert_eq!(engine.world().steps, 34);
        let velocity = engine.world().body_state(blue).unwrap().linear_velocity;
        (
            velocity,
            engine.world().impulses_on(blue).len(),
            engine.world().forces_on(blue).len(),
        )
    }

    #[test]
    fn held_jump_gain_does_not_depend_on_frame_rate() {
        let fast = held_jump(1.0 / 256.0);
        let slow = held_jump(1.0 / 32.0);
        assert_eq!(fast, slow);

        let (velocity, impulses, forces) = fast;
        assert_eq!(impulses, 1);
        // Sustain runs on every step inside the quarter second after the start.
        assert_eq!(forces, 15);
        assert!((velocity.y - (10.0 + 15.0 * 10.0 / 64.0)).abs() < 1e-4);
        assert_eq!(velocity.x, 0.0);
    }

    #[test]
    fn game_over_freezes_simulation() {
        let mut engine = engine();
        let red = engine.arena().fighter(Team::Red).body;
        for frame in 0..3 {
            engine
                .world_mut()
                .set_transform(red, Vec2::new(20.0, -1.0), 0.0)
                .unwrap();
            engine.tick(frame as f64 * DT);
        }
        assert_eq!(engine.state().phase, Phase::GameOver);
        assert_eq!(engine.state().winner(3), Some(Team::Blue));

        let steps_before = engine.world().steps;
        let report = engine.tick(1.0);
        assert_eq!(report.steps, 0);
        assert_eq!(engine.world().steps, steps_before);
    }

    #[test]
    fn reset_match_clears_scores_and_projectiles() {
        let mut engine = engine();
        press(&mut engine, Key::E, 0.0);
        release(&mut engine, Key::E, DT);
        engine.state.score.red = 2;
        engine.state.phase = Phase::GameOver;

        engine.reset_match();
        assert_eq!(engine.state(), &MatchState::default());
        assert!(engine.projectiles().is_empty());
        for fighter in engine.arena().fighters() {
            let body = engine.world().body_state(fighter.body).unwrap();
            assert_eq!(body.position, fighter.spawn);
        }
    }

    #[test]
    fn teardown_purges_derived_state() {
        let mut engine = engine();
        press(&mut engine, Key::E, 0.0);
        release(&mut engine, Key::E, DT);
        let shot = engine.projectiles().live()[0].body;

        engine.teardown();
        assert!(engine.projectiles().is_empty());
        assert!(!engine.world().contains(shot));
        assert!(engine.grid().is_empty());
        assert!(engine.render_frame().bodies.is_empty());
        assert!(engine.input_mut().current().is_empty());
        assert_eq!(engine.world().bodies().len(), 5);
    }
}
