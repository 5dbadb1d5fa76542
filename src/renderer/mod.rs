pub mod media_player;
pub mod time_player_bridge;
