// Copyright (c) 2025 - Cowboy AI, Inc.
//! Deployed Stack Lifecycle State Machine
//!
//! # States
//!
//! - NotCreated: registered locally, nothing submitted yet
//! - Creating: submitted, backend still working
//! - CreateComplete / CreateFailed: terminal outcomes of creation
//! - Deleting: delete submitted
//! - DeleteComplete: gone (terminal)
//! - DeleteFailed: delete refused or failed, may be resubmitted
//!
//! # Inputs
//!
//! - Submit: NotCreated → Creating
//! - CreateSucceeded: Creating → CreateComplete
//! - CreateFailed: Creating → CreateFailed
//! - BeginDelete: Creating | CreateComplete | CreateFailed | DeleteFailed → Deleting
//! - DeleteSucceeded: Deleting → DeleteComplete
//! - DeleteFailed: Deleting → DeleteFailed

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{StateMachine, TransitionError, TransitionResult};

/// Lifecycle state of a deployed stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StackStatus {
    NotCreated,
    Creating,
    CreateComplete,
    CreateFailed,
    Deleting,
    DeleteComplete,
    DeleteFailed,
}

impl StackStatus {
    /// Canonical status string
    pub fn as_str(&self) -> &'static str {
        match self {
            StackStatus::NotCreated => "NOT_CREATED",
            StackStatus::Creating => "CREATING",
            StackStatus::CreateComplete => "CREATE_COMPLETE",
            StackStatus::CreateFailed => "CREATE_FAILED",
            StackStatus::Deleting => "DELETING",
            StackStatus::DeleteComplete => "DELETE_COMPLETE",
            StackStatus::DeleteFailed => "DELETE_FAILED",
        }
    }

    /// Input that moves a stack in `self` to the status the backend reported.
    ///
    /// Returns `None` when the observed status needs no transition.
    pub fn command_towards(&self, observed: StackStatus) -> Option<StackCommand> {
        if *self == observed {
            return None;
        }
        match observed {
            StackStatus::NotCreated => None,
            StackStatus::Creating => Some(StackCommand::Submit),
            StackStatus::CreateComplete => Some(StackCommand::CreateSucceeded),
            StackStatus::CreateFailed => Some(StackCommand::CreateFailed),
            StackStatus::Deleting => Some(StackCommand::BeginDelete),
            StackStatus::DeleteComplete => Some(StackCommand::DeleteSucceeded),
            StackStatus::DeleteFailed => Some(StackCommand::DeleteFailed),
        }
    }
}

impl fmt::Display for StackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StackStatus {
    type Err = TransitionError;

    /// Parses both canonical names and the `*_IN_PROGRESS` / `ROLLBACK_*`
    /// strings the orchestration service reports.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NOT_CREATED" => Ok(StackStatus::NotCreated),
            "CREATING" | "CREATE_IN_PROGRESS" | "INIT_IN_PROGRESS" => Ok(StackStatus::Creating),
            "CREATE_COMPLETE" => Ok(StackStatus::CreateComplete),
            "CREATE_FAILED" | "ROLLBACK_COMPLETE" | "ROLLBACK_FAILED" => {
                Ok(StackStatus::CreateFailed)
            }
            "ROLLBACK_IN_PROGRESS" => Ok(StackStatus::Creating),
            "DELETING" | "DELETE_IN_PROGRESS" => Ok(StackStatus::Deleting),
            "DELETE_COMPLETE" => Ok(StackStatus::DeleteComplete),
            "DELETE_FAILED" => Ok(StackStatus::DeleteFailed),
            other => Err(TransitionError::BusinessRuleViolation(format!(
                "unknown stack status '{}'",
                other
            ))),
        }
    }
}

/// Lifecycle command (FSM input)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackCommand {
    /// Creation request accepted by the backend
    Submit,

    /// Backend reports creation finished
    CreateSucceeded,

    /// Backend reports creation failed
    CreateFailed,

    /// Delete request accepted by the backend
    BeginDelete,

    /// Backend reports deletion finished
    DeleteSucceeded,

    /// Backend reports deletion failed
    DeleteFailed,
}

/// Transition output with metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionOutput {
    /// Warnings generated during transition
    pub warnings: Vec<String>,

    /// Whether this is a critical transition
    pub is_critical: bool,
}

impl TransitionOutput {
    /// Create output with no warnings
    pub fn ok() -> Self {
        Self {
            warnings: Vec::new(),
            is_critical: false,
        }
    }

    /// Create output with warnings
    pub fn with_warnings(warnings: Vec<String>) -> Self {
        Self {
            warnings,
            is_critical: false,
        }
    }

    /// Create output for critical transition
    pub fn critical(warnings: Vec<String>) -> Self {
        Self {
            warnings,
            is_critical: true,
        }
    }
}

impl StateMachine for StackStatus {
    type Input = StackCommand;
    type Output = TransitionOutput;

    fn transition(&self, input: &Self::Input) -> TransitionResult<(Self, Self::Output)> {
        use StackCommand::*;
        use StackStatus::*;

        match (self, input) {
            (NotCreated, Submit) => Ok((Creating, TransitionOutput::ok())),

            (Creating, CreateSucceeded) => Ok((CreateComplete, TransitionOutput::ok())),
            (Creating, StackCommand::CreateFailed) => Ok((
                StackStatus::CreateFailed,
                TransitionOutput::critical(vec!["Stack creation failed".to_string()]),
            )),
            (Creating, BeginDelete) => Ok((
                Deleting,
                TransitionOutput::with_warnings(vec![
                    "Deleting a stack that is still being created".to_string(),
                ]),
            )),

            (CreateComplete, BeginDelete) => Ok((Deleting, TransitionOutput::ok())),
            (StackStatus::CreateFailed, BeginDelete) => Ok((
                Deleting,
                TransitionOutput::with_warnings(vec![
                    "Cleaning up a stack that failed to create".to_string(),
                ]),
            )),

            (Deleting, DeleteSucceeded) => Ok((DeleteComplete, TransitionOutput::ok())),
            (Deleting, StackCommand::DeleteFailed) => Ok((
                StackStatus::DeleteFailed,
                TransitionOutput::critical(vec!["Stack deletion failed".to_string()]),
            )),

            (StackStatus::DeleteFailed, BeginDelete) => Ok((
                Deleting,
                TransitionOutput::with_warnings(vec!["Resubmitting stack deletion".to_string()]),
            )),

            (DeleteComplete, _) => Err(TransitionError::InvalidTransition {
                from: DeleteComplete.to_string(),
                to: "any state".to_string(),
            }),

            (state, Submit) => Err(TransitionError::BusinessRuleViolation(format!(
                "stack already submitted ({})",
                state
            ))),

            (state, command) => Err(TransitionError::InvalidTransition {
                from: state.to_string(),
                to: format!("{:?}", command),
            }),
        }
    }
}
