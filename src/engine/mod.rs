pub mod state_machine;

pub use state_machine::{CycleState, CycleStateMachine, StateError};
