pub mod event;
pub mod payload;
pub mod turn;
