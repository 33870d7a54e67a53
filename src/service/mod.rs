pub mod backend_service;
pub mod calendar_view;
pub mod conversation;
pub mod inspector;
pub mod sequencer;
