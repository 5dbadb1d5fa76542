pub mod app;
pub mod caption_list;
pub mod speaker_dialog;
