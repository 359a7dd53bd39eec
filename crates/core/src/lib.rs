// Copyright (c) fedradb.org 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

//! Shared data model of the Fedra command planner: resolved commands and
//! procedural blocks on the way in, processor plans and instruction programs
//! on the way out, plus the collaborator interfaces the planner consumes.

pub mod command;
pub mod error;
pub mod explain;
pub mod expression;
pub mod interface;
pub mod plan;
pub mod program;
pub mod value;
pub mod variables;

pub use command::{Block, BranchKind, Command, CommandKind, Statement};
pub use error::{ExecError, MetadataError};
pub use expression::Expression;
pub use plan::{OutputColumn, Poll, ProcessorPlan, Rows};
pub use program::{Instruction, Program};
pub use value::{Type, Value};
pub use variables::VariableContext;
