//! Simulation core: the rigid-body capability boundary and everything that
//! derives gameplay facts from it.
//!
//! - [`world`] -- the `PhysicsWorld` trait the rest of the game talks to
//! - [`rapier_world`] -- the rapier2d-backed implementation
//! - [`grid`] -- uniform-grid broad phase for proximity queries
//! - [`interpolator`] -- fixed-step driver with render interpolation
//! - [`contact`] -- contact rules (grounded counters, bounce, hits, landing roll)

pub mod contact;
pub mod grid;
pub mod interpolator;
pub mod rapier_world;
pub mod tags;
#[cfg(any(test, feature = "test-support"))]
pub mod test_world;
pub mod world;

pub use glam::Vec2;
