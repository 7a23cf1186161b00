//! Projectile spawning and despawning.
//!
//! A shot leaves the arm's muzzle along the arm's facing and kicks the shooter
//! (character and arm) back with a recoil impulse. Each frame every live
//! projectile is checked against the grid for enemy characters, against the
//! hits the contact rules reported, and against the live region. Dead
//! projectiles are removed in one mark-then-filter pass after the checks, so
//! none are skipped, and their handles are purged from the grid and the
//! interpolator in the same frame.

use std::collections::BTreeMap;
use std::f32::consts::PI;

use glam::Vec2;
use rooftop_physics::contact::ProjectileHit;
use rooftop_physics::grid::SpatialGrid;
use rooftop_physics::interpolator::PhysicsInterpolator;
use rooftop_physics::tags::{FixtureTag, Team};
use rooftop_physics::world::{
    BodyDef, BodyHandle, CollisionFilter, FixtureDef, PhysicsError, PhysicsWorld, Shape,
};

use crate::arena::Fighter;
use crate::config::{GameConfig, ProjectileSection};

/// Unit vector for a muzzle at angle `theta`.
pub fn facing(theta: f32) -> Vec2 {
    Vec2::new(theta.sin(), theta.cos())
}

/// Muzzle angle of an arm body at `arm_angle`. Arms hang from their hinge, so
/// the muzzle is the end opposite the body's local up axis.
pub fn muzzle_angle(arm_angle: f32) -> f32 {
    arm_angle + PI
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projectile {
    pub body: BodyHandle,
    pub owner: Team,
    pub should_remove: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectileBounds {
    pub min: Vec2,
    pub max: Vec2,
}

impl ProjectileBounds {
    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.min.x && point.x <= self.max.x && point.y >= self.min.y && point.y <= self.max.y
    }
}

#[derive(Debug, Clone)]
pub struct ProjectileManager {
    config: ProjectileSection,
    bounds: ProjectileBounds,
    arm_length: f32,
    live: Vec<Projectile>,
}

impl ProjectileManager {
    pub fn new(config: &GameConfig) -> Self {
        Self {
            config: config.projectile.clone(),
            bounds: config.projectile_bounds(),
            arm_length: config.arm.length,
            live: Vec::new(),
        }
    }

    pub fn bounds(&self) -> ProjectileBounds {
        self.bounds
    }

    pub fn live(&self) -> &[Projectile] {
        &self.live
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Spawn a projectile at `fighter`'s muzzle and apply recoil to the
    /// character and the arm.
    pub fn fire_projectile<W: PhysicsWorld + ?Sized>(
        &mut self,
        world: &mut W,
        fighter: &Fighter,
    ) -> Result<BodyHandle, PhysicsError> {
        let arm = world
            .body_state(fighter.arm)
            .ok_or(PhysicsError::InvalidBody(fighter.arm))?;
        let direction = facing(muzzle_angle(arm.angle));
        let spawn = arm.position + direction * self.arm_length;

        let body = world.create_body(
            &BodyDef::dynamic(spawn)
                .with_velocity(direction * self.config.speed)
                .with_bullet(true)
                .with_fixed_rotation(true),
        );
        world.create_fixture(
            body,
            &FixtureDef::new(Shape::Circle {
                radius: self.config.radius,
                offset: Vec2::ZERO,
            })
            .with_density(self.config.density)
            .with_restitution(self.config.restitution)
            .with_filter(CollisionFilter::PROJECTILE)
            .with_tag(FixtureTag::Projectile { team: fighter.team }),
        )?;

        let recoil = -direction * self.config.speed * self.config.recoil_factor;
        world.apply_linear_impulse(fighter.body, recoil)?;
        world.apply_linear_impulse(fighter.arm, recoil)?;

        log::debug!("{} fired {body:?} from {spawn:?}", fighter.team);
        self.live.push(Projectile {
            body,
            owner: fighter.team,
            should_remove: false,
        });
        Ok(body)
    }

    /// Run the per-frame checks and remove every projectile that died.
    /// Returns the confirmed character hits, at most one per projectile.
    pub fn update<W: PhysicsWorld + ?Sized>(
        &mut self,
        world: &mut W,
        grid: &mut SpatialGrid,
        interpolator: &mut PhysicsInterpolator,
        contact_hits: &[ProjectileHit],
    ) -> Vec<ProjectileHit> {
        let bounds = self.bounds();
        let mut hits: BTreeMap<BodyHandle, ProjectileHit> = BTreeMap::new();
        for hit in contact_hits {
            hits.entry(hit.projectile).or_insert(*hit);
        }

        for projectile in &mut self.live {
            if hits.contains_key(&projectile.body) {
                projectile.should_remove = true;
                continue;
            }

            let victim = grid
                .check_projectile_collisions(projectile.body, self.config.search_radius)
                .into_iter()
                .find_map(|other| world.body_role(other).and_then(|role| role.team()));
            if let Some(victim) = victim {
                projectile.should_remove = true;
                hits.insert(
                    projectile.body,
                    ProjectileHit {
                        projectile: projectile.body,
                        owner: projectile.owner,
                        victim,
                    },
                );
                continue;
            }

            match world.body_state(projectile.body) {
                Some(state) if bounds.contains(state.position) => {}
                _ => projectile.should_remove = true,
            }
        }

        let (dead, live): (Vec<Projectile>, Vec<Projectile>) =
            self.live.drain(..).partition(|p| p.should_remove);
        self.live = live;
        for projectile in &dead {
            despawn(world, grid, interpolator, projectile.body);
        }

        // Hits reported for projectiles this manager never owned are dropped.
        hits.into_values()
            .filter(|hit| dead.iter().any(|p| p.body == hit.projectile))
            .collect()
    }

    /// Destroy every live projectile.
    pub fn clear<W: PhysicsWorld + ?Sized>(
        &mut self,
        world: &mut W,
        grid: &mut SpatialGrid,
        interpolator: &mut PhysicsInterpolator,
    ) {
        for projectile in self.live.drain(..) {
            despawn(world, grid, interpolator, projectile.body);
        }
    }
}

fn despawn<W: PhysicsWorld + ?Sized>(
    world: &mut W,
    grid: &mut SpatialGrid,
    interpolator: &mut PhysicsInterpolator,
    body: BodyHandle,
) {
    if let Err(err) = world.destroy_body(body) {
        log::debug!("Projectile despawn: {err}");
    }
    grid.remove_object(body);
    interpolator.forget(body);
    log::debug!("Despawned projectile {body:?}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Arena;
    use crate::config::GameConfig;
    use rooftop_physics::grid::GridConfig;
    use rooftop_physics::tags::BodyRole;
    use rooftop_physics::test_world::ScriptedWorld;

    struct Rig {
        world: ScriptedWorld,
        arena: Arena,
        grid: SpatialGrid,
        interp: PhysicsInterpolator,
        manager: ProjectileManager,
    }

    fn rig() -> Rig {
        let config = GameConfig::default();
        let mut world = ScriptedWorld::new();
        let arena = Arena::build(&mut world, &config).expect("arena builds");
        Rig {
            world,
            arena,
            grid: SpatialGrid::new(GridConfig::default()),
            interp: PhysicsInterpolator::new(1.0 / 60.0, 0.25),
            manager: ProjectileManager::new(&config),
        }
    }

    impl Rig {
        fn fire(&mut self, team: Team) -> BodyHandle {
            let fighter = *self.arena.fighter(team);
            self.manager
                .fire_projectile(&mut self.world, &fighter)
                .expect("arm is live")
        }

        fn update(&mut self, contact_hits: &[ProjectileHit]) -> Vec<ProjectileHit> {
            self.grid.reindex(&self.world);
            self.manager
                .update(&mut self.world, &mut self.grid, &mut self.interp, contact_hits)
        }
    }

    #[test]
    fn spawns_at_muzzle_with_matching_velocity_and_recoil() {
        let mut rig = rig();
        let blue = *rig.arena.fighter(Team::Blue);
        let theta = 0.6_f32;
        let arm_pos = Vec2::new(9.0, 14.0);
        rig.world.set_transform(blue.arm, arm_pos, theta).unwrap();

        let shot = rig.fire(Team::Blue);
        let state = rig.world.body_state(shot).unwrap();
        let dir = -Vec2::new(theta.sin(), theta.cos());
        assert!((state.position - (arm_pos + dir)).length() < 1e-5);
        assert!((state.linear_velocity - dir * 10.0).length() < 1e-5);
        assert_eq!(rig.world.body_role(shot), Some(BodyRole::Projectile(Team::Blue)));

        let on_character = rig.world.impulses_on(blue.body);
        let on_arm = rig.world.impulses_on(blue.arm);
        assert_eq!(on_character.len(), 1);
        assert_eq!(on_character, on_arm);
        assert!((on_character[0] + dir * 5.0).length() < 1e-5);
    }

    #[test]
    fn cull_region_follows_configured_canvas() {
        let mut config = GameConfig::default();
        config.units.pixels_per_meter = 100.0;
        let small = ProjectileManager::new(&config);
        assert_eq!(small.bounds().max, Vec2::new(10.0, 8.0));
        assert!(!small.bounds().contains(Vec2::new(20.0, 5.0)));
        assert!(ProjectileManager::new(&GameConfig::default())
            .bounds()
            .contains(Vec2::new(20.0, 5.0)));
    }

    #[test]
    fn out_of_bounds_projectile_is_gone_within_one_update() {
        let mut rig = rig();
        let shot = rig.fire(Team::Red);
        rig.update(&[]);
        assert_eq!(rig.manager.len(), 1);

        rig.world.set_transform(shot, Vec2::new(-1.0, 5.0), 0.0).unwrap();
        let hits = rig.update(&[]);
        assert!(hits.is_empty());
        assert!(rig.manager.is_empty());
        assert!(!rig.world.contains(shot));
        assert!(!rig.grid.contains(shot));
        let blue = rig.arena.fighter(Team::Blue).body;
        assert!(!rig.grid.get_nearby_objects(blue, 1_000.0).contains(&shot));
    }

    #[test]
    fn contact_hit_removes_projectile_and_is_reported() {
        let mut rig = rig();
        let shot = rig.fire(Team::Blue);
        let hit = ProjectileHit {
            projectile: shot,
            owner: Team::Blue,
            victim: Team::Red,
        };
        assert_eq!(rig.update(&[hit]), vec![hit]);
        assert!(rig.manager.is_empty());
        assert_eq!(rig.world.destroyed, vec![shot]);
    }

    #[test]
    fn grid_proximity_to_enemy_counts_as_hit() {
        let mut rig = rig();
        let shot = rig.fire(Team::Blue);
        let red = *rig.arena.fighter(Team::Red);
        let red_pos = rig.world.body_state(red.body).unwrap().position;
        rig.world
            .set_transform(shot, red_pos + Vec2::new(0.5, 0.0), 0.0)
            .unwrap();
        let hits = rig.update(&[]);
        assert_eq!(
            hits,
            vec![ProjectileHit {
                projectile: shot,
                owner: Team::Blue,
                victim: Team::Red,
            }]
        );
        assert!(rig.manager.is_empty());
    }

    #[test]
    fn several_dead_projectiles_in_a_row_are_all_removed() {
        let mut rig = rig();
        let shots: Vec<BodyHandle> = (0..4).map(|_| rig.fire(Team::Red)).collect();
        for shot in &shots[..3] {
            rig.world.set_transform(*shot, Vec2::new(100.0, 0.0), 0.0).unwrap();
        }
        rig.update(&[]);
        assert_eq!(rig.manager.live().len(), 1);
        assert_eq!(rig.manager.live()[0].body, shots[3]);
    }

    #[test]
    fn clear_destroys_everything() {
        let mut rig = rig();
        let a = rig.fire(Team::Blue);
        let b = rig.fire(Team::Red);
        rig.manager
            .clear(&mut rig.world, &mut rig.grid, &mut rig.interp);
        assert!(rig.manager.is_empty());
        assert!(!rig.world.contains(a) && !rig.world.contains(b));
    }

    #[test]
    fn fire_with_missing_arm_reports_invalid_body() {
        let mut rig = rig();
        let blue = *rig.arena.fighter(Team::Blue);
        rig.world.destroy_body(blue.arm).unwrap();
        assert_eq!(
            rig.manager.fire_projectile(&mut rig.world, &blue),
            Err(PhysicsError::InvalidBody(blue.arm))
        );
        assert!(rig.manager.is_empty());
    }
}
