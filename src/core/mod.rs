//! Engines, shared state and persistence.

pub mod content;
pub mod encounter;
pub mod error;
pub mod navigation;
pub mod save;
pub mod session;
pub mod state;
pub mod story;
pub mod world;
