//! Simulated agents.

mod guard;
mod intruder;

pub use guard::{Guard, GuardState};
pub use intruder::{Intruder, IntruderContext, IntruderMetrics, IntruderState};
