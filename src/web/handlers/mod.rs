//! # Web API Handlers

pub mod batches;
pub mod health;
