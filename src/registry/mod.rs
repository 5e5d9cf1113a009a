//! # Handler Registry
//!
//! The [`TaskHandler`] contract and the startup-checked [`HandlerRegistry`] the
//! dispatcher resolves task types against.

pub mod handler;
pub mod task_handler_registry;

pub use handler::{parse_parameters, HandlerOutcome, TaskHandler};
pub use task_handler_registry::{HandlerRegistry, HandlerRegistryBuilder};
