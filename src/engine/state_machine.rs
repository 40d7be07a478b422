use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CycleState {
    Idle,             // Waiting for the next tick
    Aggregating,      // Reading account and market state
    AwaitingDecision, // Context sent to the decision service
    Validating,       // Parsing the proposed command
    Executing,        // Exchange call in flight
    Recording,        // Appending the history entry
}

impl fmt::Display for CycleState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum StateError {
    #[error("Invalid transition from {0} to {1}")]
    InvalidTransition(CycleState, CycleState),
}

pub struct CycleStateMachine;

impl CycleStateMachine {
    pub fn transition(current: CycleState, next: CycleState) -> Result<CycleState, StateError> {
        match (current, next) {
            (CycleState::Idle, CycleState::Aggregating) => Ok(next),

            (CycleState::Aggregating, CycleState::AwaitingDecision) => Ok(next),
            (CycleState::Aggregating, CycleState::Idle) => Ok(next), // account unavailable, nothing recorded

            (CycleState::AwaitingDecision, CycleState::Validating) => Ok(next),
            (CycleState::AwaitingDecision, CycleState::Recording) => Ok(next), // no response, parse error

            (CycleState::Validating, CycleState::Executing) => Ok(next),
            (CycleState::Validating, CycleState::Recording) => Ok(next), // parse or grammar error

            (CycleState::Executing, CycleState::Recording) => Ok(next),

            (CycleState::Recording, CycleState::Idle) => Ok(next),

            _ => Err(StateError::InvalidTransition(current, next)),
        }
    }
}
