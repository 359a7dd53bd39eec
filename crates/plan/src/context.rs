// Copyright (c) fedradb.org 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

use std::collections::BTreeSet;

use fedra_core::{
	Command, ProcessorPlan,
	interface::{CapabilityOracle, Metadata},
};

use crate::{cache::PlanCache, error::Result};

/// Constant-folding / normalization pass applied to procedure bodies before
/// compilation. Lives with the resolver; consumed here.
pub trait Rewriter {
	fn rewrite(&self, command: Command) -> Result<Command>;
}

/// The relational join/access planner for plain query and DML commands.
/// Receives the context so it can record touched metadata and determinism
/// observations.
pub trait RelationalPlanner {
	fn plan(&self, ctx: &mut PlanningContext<'_>, command: &Command) -> Result<ProcessorPlan>;
}

/// Planner for commands whose target is an XML-mapped view.
pub trait XmlPlanner {
	fn plan(&self, ctx: &mut PlanningContext<'_>, command: &Command) -> Result<ProcessorPlan>;
}

/// Determinism classification of a plan, ordered loosest to strictest.
/// Merging observations can only lower the context's level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Determinism {
	Nondeterministic,
	SessionDeterministic,
	Deterministic,
}

/// Everything a single command compilation needs: collaborator handles plus
/// the mutable bookkeeping (determinism level, metadata objects touched)
/// that dependency tracking and cache entries are built from.
pub struct PlanningContext<'a> {
	pub metadata: &'a dyn Metadata,
	pub capabilities: &'a dyn CapabilityOracle,
	pub relational: &'a dyn RelationalPlanner,
	pub xml: &'a dyn XmlPlanner,
	pub rewriter: &'a dyn Rewriter,
	pub cache: &'a dyn PlanCache,

	determinism: Determinism,
	accessed: BTreeSet<String>,
}

impl<'a> PlanningContext<'a> {
	pub fn new(
		metadata: &'a dyn Metadata,
		capabilities: &'a dyn CapabilityOracle,
		relational: &'a dyn RelationalPlanner,
		xml: &'a dyn XmlPlanner,
		rewriter: &'a dyn Rewriter,
		cache: &'a dyn PlanCache,
	) -> Self {
		Self {
			metadata,
			capabilities,
			relational,
			xml,
			rewriter,
			cache,
			determinism: Determinism::Deterministic,
			accessed: BTreeSet::new(),
		}
	}

	pub fn determinism(&self) -> Determinism {
		self.determinism
	}

	/// Merge an observed determinism level; the context can only get
	/// looser.
	pub fn note_determinism(&mut self, level: Determinism) {
		self.determinism = self.determinism.min(level);
	}

	pub(crate) fn restore_determinism(&mut self, level: Determinism) {
		self.determinism = level;
	}

	/// Record a metadata object touched during planning, for cache
	/// invalidation and dependency tracking.
	pub fn record_access(&mut self, object: impl Into<String>) {
		self.accessed.insert(object.into());
	}

	pub fn accessed(&self) -> &BTreeSet<String> {
		&self.accessed
	}

	pub fn merge_accessed<I>(&mut self, objects: I)
	where
		I: IntoIterator<Item = String>,
	{
		self.accessed.extend(objects);
	}

	/// Swap out the accessed set, leaving it empty. Used to scope a
	/// cache-miss compile to its own touched-set.
	pub(crate) fn take_accessed(&mut self) -> BTreeSet<String> {
		std::mem::take(&mut self.accessed)
	}

	pub(crate) fn set_accessed(&mut self, accessed: BTreeSet<String>) {
		self.accessed = accessed;
	}
}
