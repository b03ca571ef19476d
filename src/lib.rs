//! Setlist tagging library - shared modules for all binaries.

pub mod album;
pub mod arbitration;
pub mod assign;
pub mod config;
pub mod corrections;
pub mod discrepancies;
pub mod duplicates;
pub mod error;
pub mod matcher;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod progress;
pub mod reference;
pub mod review;
pub mod safety;
pub mod scoring;
pub mod setlist_txt;
pub mod tags;

#[cfg(test)]
mod testing;

pub use error::{Result, TaggerError};
