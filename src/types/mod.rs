pub mod clip;
pub mod playback_state;
pub mod session;
pub mod timeline;
pub mod track;
