//! Content and data types shared by the engines.

pub mod condition;
pub mod encounter;
pub mod flag;
pub mod location;
pub mod story;
