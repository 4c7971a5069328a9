#![forbid(unsafe_code)]

pub mod app;
pub mod bria;
pub mod cli;
pub mod config;
pub mod dna;
pub mod error;
pub mod fetch;
pub mod formats;
pub mod gemini;
pub mod generate;
pub mod inspect;
pub mod json;
pub mod logging;
pub mod samples;
pub mod studio;
pub mod style;

#[cfg(test)]
mod test_support;
