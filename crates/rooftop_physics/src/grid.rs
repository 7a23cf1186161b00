//! Uniform-grid broad phase over the live bodies.
//!
//! The grid is a derived cache: it holds handles, never bodies, and is
//! re-indexed from the world every tick. Bounds are square AABBs around each
//! body's center with a per-role radius, measured in render pixels (body
//! positions are scaled by `pixels_per_meter`, without any axis flip).
//!
//! Each body remembers the cells it was inserted into, so moving or removing it
//! only touches those cells instead of scanning the whole map.

use std::collections::{BTreeSet, HashMap, HashSet};

use glam::Vec2;

use crate::tags::BodyRole;
use crate::world::{BodyHandle, PhysicsWorld};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridConfig {
    /// Cell edge length in pixels.
    pub cell_size: f32,
    pub pixels_per_meter: f32,
    pub character_radius: f32,
    pub projectile_radius: f32,
    pub arm_radius: f32,
    /// Radius for ground and untagged bodies.
    pub default_radius: f32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            cell_size: 100.0,
            pixels_per_meter: 30.0,
            character_radius: 40.0,
            projectile_radius: 10.0,
            arm_radius: 30.0,
            default_radius: 20.0,
        }
    }
}

impl GridConfig {
    pub fn radius_for(&self, role: Option<BodyRole>) -> f32 {
        match role {
            Some(BodyRole::Character(_)) => self.character_radius,
            Some(BodyRole::Projectile(_)) => self.projectile_radius,
            Some(BodyRole::Arm(_)) => self.arm_radius,
            Some(BodyRole::Ground) | None => self.default_radius,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec2,
    pub max: Vec2,
}

impl Aabb {
    pub fn around(center: Vec2, radius: f32) -> Self {
        Self {
            min: center - Vec2::splat(radius),
            max: center + Vec2::splat(radius),
        }
    }

    pub fn expanded(self, margin: f32) -> Self {
        Self {
            min: self.min - Vec2::splat(margin),
            max: self.max + Vec2::splat(margin),
        }
    }

    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GridCell {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone)]
struct GridEntry {
    role: Option<BodyRole>,
    center: Vec2,
    radius: f32,
    bounds: Aabb,
    cells: Vec<GridCell>,
}

#[derive(Debug, Clone, Default)]
pub struct SpatialGrid {
    config: GridConfig,
    cells: HashMap<GridCell, HashSet<BodyHandle>>,
    entries: HashMap<BodyHandle, GridEntry>,
}

impl SpatialGrid {
    pub fn new(config: GridConfig) -> Self {
        Self {
            config,
            cells: HashMap::new(),
            entries: HashMap::new(),
        }
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    /// Re-insert `body` from its current position (meters). The body ends up in
    /// exactly the cells its new bounds overlap.
    pub fn update_object(&mut self, body: BodyHandle, role: Option<BodyRole>, position: Vec2) {
        self.remove_object(body);

        let center = position * self.config.pixels_per_meter;
        let radius = self.config.radius_for(role);
        let bounds = Aabb::around(center, radius);
        let cells = self.cells_overlapping(&bounds);
        for cell in &cells {
            self.cells.entry(*cell).or_default().insert(body);
        }
        self.entries.insert(
            body,
            GridEntry {
                role,
                center,
                radius,
                bounds,
                cells,
            },
        );
    }

    /// Drop `body` from every cell. Unknown bodies are ignored.
    pub fn remove_object(&mut self, body: BodyHandle) {
        let Some(entry) = self.entries.remove(&body) else {
            return;
        };
        for cell in entry.cells {
            if let Some(members) = self.cells.get_mut(&cell) {
                members.remove(&body);
                if members.is_empty() {
                    self.cells.remove(&cell);
                }
            }
        }
    }

    /// Bodies sharing a cell with `body`'s bounds grown by `radius` pixels,
    /// excluding `body` itself. Each body appears once; order is ascending
    /// handle but callers should not rely on it.
    pub fn get_nearby_objects(&self, body: BodyHandle, radius: f32) -> Vec<BodyHandle> {
        let Some(entry) = self.entries.get(&body) else {
            return Vec::new();
        };
        let query = entry.bounds.expanded(radius);
        let mut nearby = BTreeSet::new();
        for cell in self.cells_overlapping(&query) {
            if let Some(members) = self.cells.get(&cell) {
                nearby.extend(members.iter().copied().filter(|other| *other != body));
            }
        }
        nearby.into_iter().collect()
    }

    /// Characters a projectile probe is touching: nearby candidates whose
    /// bounds overlap the probe's, whose centers are closer than the sum of
    /// both radii, and who are not on the probe's own team. Probes that are
    /// not projectiles collide with nothing.
    pub fn check_projectile_collisions(&self, body: BodyHandle, search_radius: f32) -> Vec<BodyHandle> {
        let Some(probe) = self.entries.get(&body) else {
            return Vec::new();
        };
        let Some(BodyRole::Projectile(shooter)) = probe.role else {
            return Vec::new();
        };

        self.get_nearby_objects(body, search_radius)
            .into_iter()
            .filter(|other| {
                let Some(candidate) = self.entries.get(other) else {
                    return false;
                };
                if !probe.bounds.overlaps(&candidate.bounds) {
                    return false;
                }
                match candidate.role {
                    Some(BodyRole::Character(team)) if team != shooter => {
                        probe.center.distance(candidate.center) < probe.radius + candidate.radius
                    }
                    _ => false,
                }
            })
            .collect()
    }

    /// Rebuild the index from the world's live bodies. Entries for bodies the
    /// world no longer has are dropped.
    pub fn reindex<W: PhysicsWorld + ?Sized>(&mut self, world: &W) {
        let live = world.bodies();
        let stale: Vec<BodyHandle> = self
            .entries
            .keys()
            .copied()
            .filter(|body| live.binary_search(body).is_err())
            .collect();
        for body in stale {
            self.remove_object(body);
        }

        for body in live {
            if let Some(state) = world.body_state(body) {
                self.update_object(body, world.body_role(body), state.position);
            }
        }
    }

    pub fn clear(&mut self) {
        self.cells.clear();
        self.entries.clear();
    }

    pub fn contains(&self, body: BodyHandle) -> bool {
        self.entries.contains_key(&body)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cells `body` is currently registered in, sorted.
    pub fn cells_of(&self, body: BodyHandle) -> Vec<GridCell> {
        let mut cells: Vec<GridCell> = self
            .cells
            .iter()
            .filter(|(_, members)| members.contains(&body))
            .map(|(cell, _)| *cell)
            .collect();
        cells.sort();
        cells
    }

    pub fn bounds_of(&self, body: BodyHandle) -> Option<Aabb> {
        self.entries.get(&body).map(|entry| entry.bounds)
    }

    fn cells_overlapping(&self, bounds: &Aabb) -> Vec<GridCell> {
        let x0 = self.world_to_cell(bounds.min.x);
        let x1 = self.world_to_cell(bounds.max.x);
        let y0 = self.world_to_cell(bounds.min.y);
        let y1 = self.world_to_cell(bounds.max.y);
        let mut cells = Vec::with_capacity(((x1 - x0 + 1) * (y1 - y0 + 1)).max(0) as usize);
        for x in x0..=x1 {
            for y in y0..=y1 {
                cells.push(GridCell { x, y });
            }
        }
        cells
    }

    fn world_to_cell(&self, pixels: f32) -> i32 {
        (pixels / self.config.cell_size).floor() as i32
    }
}
