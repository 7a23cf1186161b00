//! Two-player rooftop brawl: arena setup, controls, projectiles, scoring and
//! the per-frame engine that ties them to the physics core.

pub mod actions;
pub mod arena;
pub mod config;
pub mod engine;
pub mod projectiles;
pub mod round;
pub mod view;

pub use config::GameConfig;
pub use engine::{GameEngine, TickReport};
