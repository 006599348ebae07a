//! Shared test support for flowwatch crates: an in-memory [`ScriptedEngine`]
//! and builders for the engine's response shapes.

pub mod engine;
pub mod fixtures;

pub use engine::{Scripted, ScriptedEngine};
