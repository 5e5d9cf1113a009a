//! # Data Models
//!
//! Task records and the value types that move between the store and the engine.

pub mod task;

pub use task::{NewTask, Task, TaskResolution, TaskType};
