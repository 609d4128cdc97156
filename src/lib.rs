//! Tick-driven simulation core for a grid maze game: a player collects
//! drifting items, dodges drifting enemies, and races a countdown to the
//! goal tile. Rendering, input polling, and UI live outside this crate and
//! only consume [`types::Snapshot`]s.

pub mod config;
pub mod engine;
pub mod error;
pub mod grid;
pub mod rng;
pub mod types;

pub use config::GameConfig;
pub use engine::GameEngine;
pub use error::GameError;
