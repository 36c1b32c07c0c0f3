//! Command handlers

pub mod dump;
pub mod sync;
