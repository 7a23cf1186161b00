//! Game tuning loaded from JSON.
//!
//! Every section and every field is optional; anything left out keeps the
//! stock value, so `{}` is a valid config. Values are validated after parsing
//! and a bad file is rejected as a whole.

use std::f32::consts::{FRAC_PI_2, FRAC_PI_4, PI};
use std::fs;
use std::path::{Path, PathBuf};

use glam::Vec2;
use rooftop_physics::contact::ContactConfig;
use rooftop_physics::grid::GridConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::projectiles::ProjectileBounds;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config JSON {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("config validation failed: {0}")]
    Invalid(String),
}

#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct GameConfig {
    pub physics: PhysicsSection,
    pub units: UnitsSection,
    pub arena: ArenaSection,
    pub arm: ArmSection,
    pub jump: JumpSection,
    pub projectile: ProjectileSection,
    pub contact: ContactSection,
    pub grid: GridSection,
    pub round: RoundSection,
    pub stabilizer: StabilizerSection,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct PhysicsSection {
    /// Vertical gravity in m/s², +Y up.
    pub gravity: f32,
    pub fixed_time_step: f64,
    /// Longest frame delta fed to the fixed-step loop.
    pub max_frame_time: f64,
}

impl Default for PhysicsSection {
    fn default() -> Self {
        Self {
            gravity: -5.0,
            fixed_time_step: 1.0 / 60.0,
            max_frame_time: 0.25,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct UnitsSection {
    pub pixels_per_meter: f32,
    pub canvas_width: f32,
    pub canvas_height: f32,
}

impl Default for UnitsSection {
    fn default() -> Self {
        Self {
            pixels_per_meter: 30.0,
            canvas_width: 1000.0,
            canvas_height: 800.0,
        }
    }
}

impl UnitsSection {
    pub fn canvas_size_meters(&self) -> (f32, f32) {
        (
            self.canvas_width / self.pixels_per_meter,
            self.canvas_height / self.pixels_per_meter,
        )
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ArenaSection {
    pub stage_friction: f32,
    pub character_radius: f32,
    pub character_width: f32,
    pub character_height: f32,
    pub character_angular_damping: f32,
    pub bottom_density: f32,
    pub bottom_friction: f32,
    pub bottom_restitution: f32,
    pub top_density: f32,
    pub top_friction: f32,
    /// Horizontal distance of each spawn from its stage edge, in meters.
    pub spawn_inset: f32,
    /// Gap left between a spawned character and the stage surface.
    pub spawn_clearance: f32,
}

impl Default for ArenaSection {
    fn default() -> Self {
        Self {
            stage_friction: 0.3,
            character_radius: 0.5,
            character_width: 0.8,
            character_height: 2.0,
            character_angular_damping: 0.8,
            bottom_density: 3.0,
            bottom_friction: 0.3,
            bottom_restitution: 0.2,
            top_density: 0.5,
            top_friction: 0.2,
            spawn_inset: 3.0,
            spawn_clearance: 0.01,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ArmSection {
    pub half_width: f32,
    pub half_height: f32,
    pub density: f32,
    pub angular_damping: f32,
    /// Pivot-to-muzzle distance used when firing.
    pub length: f32,
    pub motor_speed: f32,
    pub max_motor_torque: f32,
    /// Symmetric hinge limit in radians.
    pub angle_limit: f32,
}

impl Default for ArmSection {
    fn default() -> Self {
        Self {
            half_width: 0.1,
            half_height: 0.5,
            density: 1.0,
            angular_damping: 0.2,
            length: 1.0,
            motor_speed: 1.0,
            max_motor_torque: 20.0,
            angle_limit: FRAC_PI_4,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct JumpSection {
    pub impulse: f32,
    pub sustain_force: f32,
    /// Seconds after a jump starts during which holding the key keeps pushing.
    pub max_duration: f64,
    /// Seconds that must pass before another jump may start.
    pub cooldown: f64,
    pub horizontal_factor: f32,
    pub max_angle: f32,
}

impl Default for JumpSection {
    fn default() -> Self {
        Self {
            impulse: 10.0,
            sustain_force: 10.0,
            max_duration: 0.3,
            cooldown: 0.5,
            horizontal_factor: 0.5,
            max_angle: FRAC_PI_2,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ProjectileSection {
    pub radius: f32,
    pub speed: f32,
    pub density: f32,
    pub restitution: f32,
    /// Recoil impulse as a fraction of `speed`.
    pub recoil_factor: f32,
    /// Grid search margin in pixels.
    pub search_radius: f32,
    /// Live region in meters; projectiles outside it are despawned. Unset
    /// edges follow the canvas: `[0, width] x [-height, height]`.
    pub min_x: Option<f32>,
    pub max_x: Option<f32>,
    pub min_y: Option<f32>,
    pub max_y: Option<f32>,
}

impl Default for ProjectileSection {
    fn default() -> Self {
        Self {
            radius: 0.1,
            speed: 10.0,
            density: 50.0,
            restitution: 0.8,
            recoil_factor: 0.5,
            search_radius: 20.0,
            min_x: None,
            max_x: None,
            min_y: None,
            max_y: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ContactSection {
    pub bounce_impulse: f32,
    pub landing_threshold: f32,
    pub roll_multiplier: f32,
}

impl Default for ContactSection {
    fn default() -> Self {
        let stock = ContactConfig::default();
        Self {
            bounce_impulse: stock.bounce_impulse,
            landing_threshold: stock.landing_threshold,
            roll_multiplier: stock.roll_multiplier,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct GridSection {
    pub cell_size: f32,
    pub character_radius: f32,
    pub projectile_radius: f32,
    pub arm_radius: f32,
    pub default_radius: f32,
}

impl Default for GridSection {
    fn default() -> Self {
        let stock = GridConfig::default();
        Self {
            cell_size: stock.cell_size,
            character_radius: stock.character_radius,
            projectile_radius: stock.projectile_radius,
            arm_radius: stock.arm_radius,
            default_radius: stock.default_radius,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct RoundSection {
    pub win_score: u32,
    /// Characters whose center drops below this height have fallen.
    pub kill_plane_y: f32,
}

impl Default for RoundSection {
    fn default() -> Self {
        Self {
            win_score: 3,
            kill_plane_y: 0.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct StabilizerSection {
    pub enabled: bool,
    pub angle_threshold: f32,
    pub angular_velocity_threshold: f32,
    pub stiffness: f32,
    pub damping: f32,
}

impl Default for StabilizerSection {
    fn default() -> Self {
        Self {
            enabled: true,
            angle_threshold: 0.5,
            angular_velocity_threshold: 0.5,
            stiffness: 10.0,
            damping: 10.0,
        }
    }
}

impl GameConfig {
    pub fn contact_config(&self) -> ContactConfig {
        ContactConfig {
            bounce_impulse: self.contact.bounce_impulse,
            landing_threshold: self.contact.landing_threshold,
            roll_multiplier: self.contact.roll_multiplier,
        }
    }

    pub fn grid_config(&self) -> GridConfig {
        GridConfig {
            cell_size: self.grid.cell_size,
            pixels_per_meter: self.units.pixels_per_meter,
            character_radius: self.grid.character_radius,
            projectile_radius: self.grid.projectile_radius,
            arm_radius: self.grid.arm_radius,
            default_radius: self.grid.default_radius,
        }
    }

    /// Projectile live region for the loaded canvas size.
    pub fn projectile_bounds(&self) -> ProjectileBounds {
        let (width, height) = self.units.canvas_size_meters();
        let section = &self.projectile;
        ProjectileBounds {
            min: Vec2::new(section.min_x.unwrap_or(0.0), section.min_y.unwrap_or(-height)),
            max: Vec2::new(section.max_x.unwrap_or(width), section.max_y.unwrap_or(height)),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if !(self.physics.fixed_time_step > 0.0) {
            return invalid("physics.fixed_time_step must be > 0");
        }
        if !(self.physics.max_frame_time >= self.physics.fixed_time_step) {
            return invalid("physics.max_frame_time must be >= physics.fixed_time_step");
        }
        if !(self.units.pixels_per_meter > 0.0) {
            return invalid("units.pixels_per_meter must be > 0");
        }
        if !(self.units.canvas_width > 0.0 && self.units.canvas_height > 0.0) {
            return invalid("units canvas size must be > 0");
        }
        if !(self.grid.cell_size > 0.0) {
            return invalid("grid.cell_size must be > 0");
        }
        let radii = [
            self.grid.character_radius,
            self.grid.projectile_radius,
            self.grid.arm_radius,
            self.grid.default_radius,
            self.arena.character_radius,
            self.projectile.radius,
        ];
        if radii.iter().any(|r| !(*r > 0.0)) {
            return invalid("radii must be > 0");
        }
        if self.arena.character_height <= self.arena.character_radius {
            return invalid("arena.character_height must exceed arena.character_radius");
        }
        if self.round.win_score < 1 {
            return invalid("round.win_score must be >= 1");
        }
        let bounds = self.projectile_bounds();
        if !(bounds.min.x < bounds.max.x && bounds.min.y < bounds.max.y) {
            return invalid("projectile bounds need min < max on both axes");
        }
        if !(0.0..=PI).contains(&self.jump.max_angle) {
            return invalid("jump.max_angle must be within [0, pi]");
        }
        if self.jump.max_duration < 0.0 || self.jump.cooldown < 0.0 {
            return invalid("jump durations must be >= 0");
        }
        if !(self.arm.angle_limit >= 0.0) {
            return invalid("arm.angle_limit must be >= 0");
        }
        Ok(())
    }
}

pub fn load_config_from_path(path: &Path) -> Result<GameConfig, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config: GameConfig = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    if let Err(err) = config.validate() {
        log::warn!("Rejected config {}: {err}", path.display());
        return Err(err);
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_file_path(name_hint: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before unix epoch")
            .as_nanos();
        std::env::temp_dir().join(format!(
            "rooftop_config_test_{}_{}_{}.json",
            name_hint,
            std::process::id(),
            nanos
        ))
    }

    #[test]
    fn defaults_are_valid() {
        assert!(GameConfig::default().validate().is_ok());
    }

    #[test]
    fn empty_object_yields_defaults() {
        let path = temp_file_path("empty");
        fs::write(&path, "{}").expect("write temp file");
        let config = load_config_from_path(&path).expect("empty config should load");
        assert_eq!(config, GameConfig::default());
        let _ = fs::remove_file(path);
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let path = temp_file_path("partial");
        fs::write(
            &path,
            r#"{ "jump": { "cooldown": 1.25 }, "round": { "win_score": 5 } }"#,
        )
        .expect("write temp file");
        let config = load_config_from_path(&path).expect("partial config should load");
        assert_eq!(config.jump.cooldown, 1.25);
        assert_eq!(config.jump.impulse, 10.0);
        assert_eq!(config.round.win_score, 5);
        assert_eq!(config.physics, PhysicsSection::default());
        let _ = fs::remove_file(path);
    }

    #[test]
    fn rejects_non_positive_step() {
        let path = temp_file_path("step");
        fs::write(&path, r#"{ "physics": { "fixed_time_step": 0.0 } }"#).expect("write temp file");
        let err = load_config_from_path(&path).expect_err("zero step should fail");
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(err.to_string().contains("fixed_time_step"));
        let _ = fs::remove_file(path);
    }

    #[test]
    fn rejects_zero_win_score_and_inverted_bounds() {
        let mut config = GameConfig::default();
        config.round.win_score = 0;
        assert!(config.validate().is_err());

        let mut config = GameConfig::default();
        config.projectile.min_x = Some(40.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn projectile_bounds_follow_loaded_units() {
        let path = temp_file_path("bounds");
        fs::write(
            &path,
            r#"{ "units": { "pixels_per_meter": 50.0 }, "projectile": { "min_y": -2.0 } }"#,
        )
        .expect("write temp file");
        let config = load_config_from_path(&path).expect("config should load");
        let (width, height) = config.units.canvas_size_meters();
        let bounds = config.projectile_bounds();
        assert_eq!(bounds.min, Vec2::new(0.0, -2.0));
        assert_eq!(bounds.max, Vec2::new(width, height));
        assert_ne!(bounds.max, GameConfig::default().projectile_bounds().max);
        let _ = fs::remove_file(path);
    }

    #[test]
    fn reports_parse_and_io_errors_with_path() {
        let path = temp_file_path("broken");
        fs::write(&path, "{ not json").expect("write temp file");
        let err = load_config_from_path(&path).expect_err("broken JSON should fail");
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("rooftop_config_test_broken"));
        let _ = fs::remove_file(&path);

        let err = load_config_from_path(&path).expect_err("missing file should fail");
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn grid_config_takes_scale_from_units() {
        let mut config = GameConfig::default();
        config.units.pixels_per_meter = 50.0;
        assert_eq!(config.grid_config().pixels_per_meter, 50.0);
        assert_eq!(config.grid_config().cell_size, 100.0);
    }
}
