// Copyright (c) fedradb.org 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

//! The command-planning core: routes a resolved command to its specialized
//! planner and produces an executable [`fedra_core::ProcessorPlan`].
//!
//! Planning is synchronous and single-threaded per command; the prepared
//! virtual-procedure plan cache is the only shared mutable state.

pub mod batch;
pub mod cache;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod procedure;
pub mod trigger;

#[cfg(test)]
pub(crate) mod test_utils;

pub use cache::{CacheKey, MemoryPlanCache, PlanCache, PreparedPlan};
pub use context::{Determinism, PlanningContext, RelationalPlanner, Rewriter, XmlPlanner};
pub use dispatch::compile;
pub use error::{Error, Result};
