// src/session/mod.rs

pub mod countdown;
pub mod registry;
pub mod step;

pub use registry::SessionRegistry;
pub use step::{Mode, Step, StepEvent};
