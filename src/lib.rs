//! Narrative RPG: the engine core of a choice-driven story game.
//!
//! A graph of locations the player travels between, random encounters rolled
//! on arrival, and branching scenes whose choices shift flags, stats and path
//! affinities. Both engines operate on one shared game state that can be
//! observed, snapshotted and restored.

pub mod core;
pub mod schema;

pub use crate::core::error::ErrorKind;
pub use crate::core::session::{GameSession, GameSessionBuilder, SessionConfig, SessionError};
