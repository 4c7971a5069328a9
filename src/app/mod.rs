pub mod api;
pub mod slot;
