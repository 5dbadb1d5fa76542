//! Caption editing synchronised to media playback: a clip timeline, the
//! tracker that follows playback through it, and the edit session that ties
//! both to the operator's keystrokes.

pub mod config;
pub mod error;
pub mod ops;
pub mod renderer;
pub mod types;
pub mod ui;
