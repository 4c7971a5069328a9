pub mod dna_store;
pub mod model;
pub mod progress;
mod runner;

pub use runner::Studio;
