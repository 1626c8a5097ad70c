// Copyright (c) 2025 - Cowboy AI, Inc.
//! Lifecycle State Machines
//!
//! A deployed stack moves through a small set of statuses reported by the
//! orchestration backend. The allowed moves are encoded as a pure
//! `(status, command) → (status, output)` function; the stack manager calls
//! the backend first and records the move only once the backend agrees.
//!
//! ```rust
//! use stack_topology::state_machine::{StackCommand, StackStatus, StateMachine};
//!
//! let (next, _) = StackStatus::NotCreated
//!     .transition(&StackCommand::Submit)
//!     .unwrap();
//! assert_eq!(next, StackStatus::Creating);
//! ```

pub mod stack_lifecycle;

use chrono::{DateTime, Utc};

pub use stack_lifecycle::{StackCommand, StackStatus, TransitionOutput};

/// Result of a state transition
pub type TransitionResult<S> = Result<S, TransitionError>;

/// A lifecycle move that was refused
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    /// No move from this status for this command
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// Status string or observation that fits no lifecycle rule
    #[error("Business rule violated: {0}")]
    BusinessRuleViolation(String),
}

/// States that change only through typed commands
pub trait StateMachine: Sized + Clone {
    type Input;
    type Output;

    /// Next state and output for `input`, or why the move is refused
    fn transition(&self, input: &Self::Input) -> TransitionResult<(Self, Self::Output)>;

    fn can_transition(&self, input: &Self::Input) -> bool {
        self.transition(input).is_ok()
    }
}

/// One recorded move
#[derive(Debug, Clone)]
pub struct Transition<S, I> {
    pub from: S,
    pub to: S,
    pub input: I,
    pub at: DateTime<Utc>,
}

/// A state machine plus the log of every move it accepted
#[derive(Debug, Clone)]
pub struct RecordedMachine<M: StateMachine> {
    state: M,
    log: Vec<Transition<M, M::Input>>,
}

impl<M: StateMachine> RecordedMachine<M> {
    pub fn new(initial: M) -> Self {
        Self {
            state: initial,
            log: Vec::new(),
        }
    }

    /// Apply `input`; a refused move leaves state and log untouched
    pub fn apply(&mut self, input: M::Input, at: DateTime<Utc>) -> TransitionResult<M::Output>
    where
        M::Input: Clone,
    {
        let (next, output) = self.state.transition(&input)?;
        let from = std::mem::replace(&mut self.state, next.clone());
        self.log.push(Transition {
            from,
            to: next,
            input,
            at,
        });
        Ok(output)
    }

    pub fn state(&self) -> &M {
        &self.state
    }

    /// Accepted moves, oldest first
    pub fn history(&self) -> &[Transition<M, M::Input>] {
        &self.log
    }
}
