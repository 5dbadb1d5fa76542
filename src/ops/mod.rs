pub mod clip_ops;
pub mod commands;
pub mod store;
pub mod transcript;
pub mod vtt;
