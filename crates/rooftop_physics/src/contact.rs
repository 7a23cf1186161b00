//! Gameplay facts derived from solver contact events.
//!
//! Rules match on the pair of fixture tags, in either order:
//!
//! | event      | pair                              | effect                                   |
//! |------------|-----------------------------------|------------------------------------------|
//! | begin      | character, ground                 | grounded counter of that team += 1       |
//! | end        | character, ground                 | grounded counter -= 1, floored at 0      |
//! | begin      | character, character (two teams) | horizontal push apart, once per step     |
//! | begin      | projectile, enemy character       | hit recorded, projectile flagged to die  |
//! | post-solve | any character bottom fixture      | roll torque on a hard vertical impact    |
//!
//! Anything else, including untagged fixtures, matches nothing.

use std::collections::BTreeSet;

use glam::Vec2;

use crate::tags::{FixtureTag, Team};
use crate::world::{BodyHandle, ContactEvent, FixtureRef, PhysicsWorld};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactConfig {
    /// Impulse magnitude each character receives when two characters touch.
    pub bounce_impulse: f32,
    /// Vertical speed above which a bottom contact counts as a hard landing.
    pub landing_threshold: f32,
    pub roll_multiplier: f32,
}

impl Default for ContactConfig {
    fn default() -> Self {
        Self {
            bounce_impulse: 5.0,
            landing_threshold: 1.0,
            roll_multiplier: 50.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectileHit {
    pub projectile: BodyHandle,
    pub owner: Team,
    pub victim: Team,
}

#[derive(Debug, Clone, Default)]
pub struct ContactListener {
    config: ContactConfig,
    grounded: [u32; 2],
    hits: Vec<ProjectileHit>,
    flagged: BTreeSet<BodyHandle>,
    /// Character pairs already pushed apart by the current batch. Each body
    /// has two fixtures, so one touch can begin up to four fixture pairs.
    bounced: BTreeSet<(BodyHandle, BodyHandle)>,
}

impl ContactListener {
    pub fn new(config: ContactConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &ContactConfig {
        &self.config
    }

    pub fn grounded_count(&self, team: Team) -> u32 {
        self.grounded[team.index()]
    }

    /// The only authority on whether `team` may start a jump.
    pub fn can_jump(&self, team: Team) -> bool {
        self.grounded_count(team) > 0
    }

    /// Projectiles flagged by a character hit since the last take.
    pub fn take_projectile_hits(&mut self) -> Vec<ProjectileHit> {
        self.flagged.clear();
        std::mem::take(&mut self.hits)
    }

    pub fn reset(&mut self) {
        self.grounded = [0; 2];
        self.hits.clear();
        self.flagged.clear();
        self.bounced.clear();
    }

    /// Apply every rule to one step's events.
    pub fn handle_events<W: PhysicsWorld + ?Sized>(&mut self, world: &mut W, events: &[ContactEvent]) {
        self.bounced.clear();
        for event in events {
            match *event {
                ContactEvent::Begin(a, b) => self.begin_contact(world, a, b),
                ContactEvent::End(a, b) => self.end_contact(a, b),
                ContactEvent::PostSolve(a, b) => {
                    self.post_solve(world, a);
                    self.post_solve(world, b);
                }
            }
        }
    }

    fn begin_contact<W: PhysicsWorld + ?Sized>(&mut self, world: &mut W, a: FixtureRef, b: FixtureRef) {
        let (Some(tag_a), Some(tag_b)) = (a.tag, b.tag) else {
            log::trace!("Ignoring begin contact with untagged fixture");
            return;
        };

        match (tag_a, tag_b) {
            (FixtureTag::Character { team, .. }, FixtureTag::Ground)
            | (FixtureTag::Ground, FixtureTag::Character { team, .. }) => {
                self.grounded[team.index()] += 1;
            }
            (FixtureTag::Character { team: team_a, .. }, FixtureTag::Character { team: team_b, .. })
                if team_a != team_b && a.body != b.body =>
            {
                self.bounce_apart(world, a.body, b.body);
            }
            (FixtureTag::Projectile { team: owner }, FixtureTag::Character { team: victim, .. })
                if owner != victim =>
            {
                self.record_hit(a.body, owner, victim);
            }
            (FixtureTag::Character { team: victim, .. }, FixtureTag::Projectile { team: owner })
                if owner != victim =>
            {
                self.record_hit(b.body, owner, victim);
            }
            _ => {}
        }
    }

    fn end_contact(&mut self, a: FixtureRef, b: FixtureRef) {
        match (a.tag, b.tag) {
            (Some(FixtureTag::Character { team, .. }), Some(FixtureTag::Ground))
            | (Some(FixtureTag::Ground), Some(FixtureTag::Character { team, .. })) => {
                let counter = &mut self.grounded[team.index()];
                *counter = counter.saturating_sub(1);
            }
            _ => {}
        }
    }

    fn post_solve<W: PhysicsWorld + ?Sized>(&mut self, world: &mut W, side: FixtureRef) {
        if !side.tag.is_some_and(FixtureTag::is_bottom) {
            return;
        }
        let Some(state) = world.body_state(side.body) else {
            return;
        };
        let velocity = state.linear_velocity;
        if velocity.y.abs() > self.config.landing_threshold {
            let torque = velocity.x * self.config.roll_multiplier;
            if let Err(err) = world.apply_torque(side.body, torque) {
                log::debug!("Landing roll skipped: {err}");
            }
        }
    }

    fn bounce_apart<W: PhysicsWorld + ?Sized>(&mut self, world: &mut W, a: BodyHandle, b: BodyHandle) {
        if !self.bounced.insert((a.min(b), a.max(b))) {
            return;
        }
        let (Some(state_a), Some(state_b)) = (world.body_state(a), world.body_state(b)) else {
            return;
        };
        let sign = if state_a.position.x >= state_b.position.x {
            1.0
        } else {
            -1.0
        };
        let impulse = Vec2::new(sign * self.config.bounce_impulse, 0.0);
        for (body, impulse) in [(a, impulse), (b, -impulse)] {
            if let Err(err) = world.apply_linear_impulse(body, impulse) {
                log::debug!("Bounce impulse skipped: {err}");
            }
        }
    }

    fn record_hit(&mut self, projectile: BodyHandle, owner: Team, victim: Team) {
        if self.flagged.insert(projectile) {
            log::debug!("Projectile {projectile:?} from {owner} hit {victim}");
            self.hits.push(ProjectileHit {
                projectile,
                owner,
                victim,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::CharacterPart;
    use crate::test_world::ScriptedWorld;
    use crate::world::BodyDef;

    fn fixture(body: BodyHandle, tag: FixtureTag) -> FixtureRef {
        FixtureRef {
            body,
            tag: Some(tag),
        }
    }

    fn bottom(team: Team) -> FixtureTag {
        FixtureTag::Character {
            team,
            part: CharacterPart::Bottom,
        }
    }

    fn top(team: Team) -> FixtureTag {
        FixtureTag::Character {
            team,
            part: CharacterPart::Top,
        }
    }

    struct Scene {
        world: ScriptedWorld,
        listener: ContactListener,
        ground: BodyHandle,
        blue: BodyHandle,
        red: BodyHandle,
    }

    fn scene() -> Scene {
        let mut world = ScriptedWorld::new();
        let ground = world.create_body(&BodyDef::fixed(Vec2::ZERO));
        let blue = world.create_body(&BodyDef::dynamic(Vec2::new(-2.0, 1.0)));
        let red = world.create_body(&BodyDef::dynamic(Vec2::new(2.0, 1.0)));
        Scene {
            world,
            listener: ContactListener::new(ContactConfig::default()),
            ground,
            blue,
            red,
        }
    }

    #[test]
    fn grounded_counter_follows_begins_and_ends() {
        let mut s = scene();
        let foot = fixture(s.blue, bottom(Team::Blue));
        let ground = fixture(s.ground, FixtureTag::Ground);
        s.listener.handle_events(
            &mut s.world,
            &[ContactEvent::Begin(foot, ground), ContactEvent::Begin(ground, fixture(s.blue, top(Team::Blue)))],
        );
        assert_eq!(s.listener.grounded_count(Team::Blue), 2);
        assert!(s.listener.can_jump(Team::Blue));
        assert!(!s.listener.can_jump(Team::Red));

        s.listener
            .handle_events(&mut s.world, &[ContactEvent::End(ground, foot)]);
        assert_eq!(s.listener.grounded_count(Team::Blue), 1);
    }

    #[test]
    fn grounded_counter_never_goes_negative() {
        let mut s = scene();
        let foot = fixture(s.red, bottom(Team::Red));
        let ground = fixture(s.ground, FixtureTag::Ground);
        let events = [
            ContactEvent::End(foot, ground),
            ContactEvent::End(foot, ground),
            ContactEvent::Begin(foot, ground),
        ];
        s.listener.handle_events(&mut s.world, &events);
        assert_eq!(s.listener.grounded_count(Team::Red), 1);
    }

    #[test]
    fn characters_touching_bounce_apart_with_equal_impulses() {
        let mut s = scene();
        s.listener.handle_events(
            &mut s.world,
            &[ContactEvent::Begin(
                fixture(s.blue, bottom(Team::Blue)),
                fixture(s.red, bottom(Team::Red)),
            )],
        );
        // Blue stands left of red, so it is pushed further left.
        assert_eq!(s.world.impulses_on(s.blue), vec![Vec2::new(-5.0, 0.0)]);
        assert_eq!(s.world.impulses_on(s.red), vec![Vec2::new(5.0, 0.0)]);
    }

    #[test]
    fn foot_and_torso_touching_together_bounce_once_per_step() {
        let mut s = scene();
        let step = [
            ContactEvent::Begin(fixture(s.blue, bottom(Team::Blue)), fixture(s.red, bottom(Team::Red))),
            ContactEvent::Begin(fixture(s.red, top(Team::Red)), fixture(s.blue, top(Team::Blue))),
            ContactEvent::Begin(fixture(s.blue, top(Team::Blue)), fixture(s.red, bottom(Team::Red))),
        ];
        s.listener.handle_events(&mut s.world, &step);
        assert_eq!(s.world.impulses_on(s.blue), vec![Vec2::new(-5.0, 0.0)]);
        assert_eq!(s.world.impulses_on(s.red), vec![Vec2::new(5.0, 0.0)]);

        // A fresh touch in a later step pushes again.
        s.listener.handle_events(&mut s.world, &step[1..2]);
        assert_eq!(s.world.impulses_on(s.blue).len(), 2);
    }

    #[test]
    fn projectile_hit_is_recorded_once_and_ignores_owner() {
        let mut s = scene();
        let projectile = s.world.create_body(&BodyDef::dynamic(Vec2::ZERO));
        let shot = fixture(projectile, FixtureTag::Projectile { team: Team::Blue });
        let events = [
            ContactEvent::Begin(shot, fixture(s.blue, top(Team::Blue))),
            ContactEvent::Begin(fixture(s.red, top(Team::Red)), shot),
            ContactEvent::Begin(shot, fixture(s.red, bottom(Team::Red))),
        ];
        s.listener.handle_events(&mut s.world, &events);
        assert_eq!(
            s.listener.take_projectile_hits(),
            vec![ProjectileHit {
                projectile,
                owner: Team::Blue,
                victim: Team::Red,
            }]
        );
        assert!(s.listener.take_projectile_hits().is_empty());
    }

    #[test]
    fn hard_landing_applies_roll_torque_from_horizontal_speed() {
        let mut s = scene();
        s.world
            .set_velocity(s.blue, Vec2::new(0.4, -3.0), 0.0)
            .unwrap();
        s.world
            .set_velocity(s.red, Vec2::new(1.0, -0.5), 0.0)
            .unwrap();
        let ground = fixture(s.ground, FixtureTag::Ground);
        let events = [
            ContactEvent::PostSolve(fixture(s.blue, bottom(Team::Blue)), ground),
            ContactEvent::PostSolve(ground, fixture(s.red, bottom(Team::Red))),
            ContactEvent::PostSolve(fixture(s.blue, top(Team::Blue)), ground),
        ];
        s.listener.handle_events(&mut s.world, &events);
        assert_eq!(s.world.torques_on(s.blue), vec![0.4 * 50.0]);
        assert!(s.world.torques_on(s.red).is_empty());
    }

    #[test]
    fn untagged_and_stale_contacts_are_ignored() {
        let mut s = scene();
        let gone = s.world.create_body(&BodyDef::dynamic(Vec2::ZERO));
        s.world.destroy_body(gone).unwrap();
        let events = [
            ContactEvent::Begin(
                FixtureRef {
                    body: s.blue,
                    tag: None,
                },
                fixture(s.ground, FixtureTag::Ground),
            ),
            ContactEvent::PostSolve(fixture(gone, bottom(Team::Red)), fixture(s.ground, FixtureTag::Ground)),
            ContactEvent::Begin(fixture(gone, bottom(Team::Red)), fixture(s.blue, bottom(Team::Blue))),
        ];
        s.listener.handle_events(&mut s.world, &events);
        assert_eq!(s.listener.grounded_count(Team::Blue), 0);
        assert!(s.world.impulses.is_empty());
        assert!(s.world.torques.is_empty());
    }

    #[test]
    fn reset_clears_counters_and_hits() {
        let mut s = scene();
        let foot = fixture(s.blue, bottom(Team::Blue));
        s.listener.handle_events(
            &mut s.world,
            &[ContactEvent::Begin(foot, fixture(s.ground, FixtureTag::Ground))],
        );
        s.listener.reset();
        assert_eq!(s.listener.grounded_count(Team::Blue), 0);
    }
}
