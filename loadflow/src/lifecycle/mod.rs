//! Lifecycle state machine for loading records.
//!
//! Records move forward one stage per successful advance. There is no skip
//! and no revert.

mod inflight;
mod input;
mod machine;


pub use inflight::{AdvancePermit, InFlightRegistry};
pub use input::AdvanceInput;
pub use machine::LifecycleMachine;
