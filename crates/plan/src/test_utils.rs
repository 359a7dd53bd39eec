// Copyright (c) fedradb.org 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

//! Collaborator doubles shared by the planner tests.

use std::{cell::Cell, collections::HashMap};

use once_cell::sync::Lazy;

use fedra_core::{
	Command, MetadataError, ProcessorPlan,
	command::CommandBase,
	interface::{Capability, CapabilityOracle, GroupDef, Metadata, TriggerDef},
	plan::{AccessPlan, ProjectPlan},
};

use crate::{
	cache::MemoryPlanCache,
	context::{Determinism, PlanningContext, RelationalPlanner, Rewriter, XmlPlanner},
	error::Result,
};

static TRACING: Lazy<()> = Lazy::new(|| {
	let _ = tracing_subscriber::fmt()
		.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
		.with_test_writer()
		.try_init();
});

/// Metadata fixture: groups keyed by name, triggers keyed by group.
#[derive(Default)]
pub(crate) struct FixtureMetadata {
	pub groups: HashMap<String, GroupDef>,
	pub triggers: HashMap<String, Vec<TriggerDef>>,
}

impl FixtureMetadata {
	pub fn with_physical_group(mut self, name: &str, model: &str) -> Self {
		self.groups.insert(name.to_string(), GroupDef {
			name: name.to_string(),
			model: model.to_string(),
			physical: true,
			xml_mapped: false,
			columns: vec![],
		});
		self
	}

	pub fn with_group(mut self, group: GroupDef) -> Self {
		self.groups.insert(group.name.clone(), group);
		self
	}

	pub fn with_triggers(mut self, group: &str, triggers: Vec<TriggerDef>) -> Self {
		self.triggers.insert(group.to_string(), triggers);
		self
	}
}

impl Metadata for FixtureMetadata {
	fn group(&self, name: &str) -> std::result::Result<GroupDef, MetadataError> {
		self.groups.get(name).cloned().ok_or_else(|| MetadataError::UnknownGroup {
			name: name.to_string(),
		})
	}

	fn triggers(&self, group: &str) -> std::result::Result<Vec<TriggerDef>, MetadataError> {
		Ok(self.triggers.get(group).cloned().unwrap_or_default())
	}
}

/// Capability fixture: connector id and batch support per model.
#[derive(Default)]
pub(crate) struct FixtureOracle {
	pub connectors: HashMap<String, String>,
	pub batching: HashMap<String, bool>,
}

impl FixtureOracle {
	pub fn with_model(mut self, model: &str, connector: &str, batching: bool) -> Self {
		self.connectors.insert(model.to_string(), connector.to_string());
		self.batching.insert(model.to_string(), batching);
		self
	}
}

impl CapabilityOracle for FixtureOracle {
	fn supports(&self, model: &str, capability: Capability) -> std::result::Result<bool, MetadataError> {
		match capability {
			Capability::BatchedUpdates => Ok(*self.batching.get(model).unwrap_or(&false)),
		}
	}

	fn same_connector(&self, model_a: &str, model_b: &str) -> std::result::Result<bool, MetadataError> {
		match (self.connectors.get(model_a), self.connectors.get(model_b)) {
			(Some(a), Some(b)) => Ok(a == b),
			_ => Err(MetadataError::UnknownModel {
				name: model_a.to_string(),
			}),
		}
	}
}

/// Relational planner double: direct access for physical groups, a
/// decomposed (projected) plan for virtual ones. Counts invocations so
/// cache tests can assert compiles are skipped on a hit.
#[derive(Default)]
pub(crate) struct FixtureRelational {
	pub metadata: FixtureMetadata,
	pub plans: Cell<usize>,
	pub determinism: Option<Determinism>,
}

impl RelationalPlanner for FixtureRelational {
	fn plan(&self, ctx: &mut PlanningContext<'_>, command: &Command) -> Result<ProcessorPlan> {
		self.plans.set(self.plans.get() + 1);
		if let Some(level) = self.determinism {
			ctx.note_determinism(level);
		}
		let group = command.group().unwrap_or_default();
		let def = self.metadata.group(group)?;
		ctx.record_access(def.name.clone());
		let access = ProcessorPlan::Access(AccessPlan {
			model: def.model,
			group: group.to_string(),
			kind: command.kind(),
			output: command.output().to_vec(),
		});
		if def.physical {
			Ok(access)
		} else {
			Ok(ProcessorPlan::Project(ProjectPlan {
				output: command.output().to_vec(),
				child: Box::new(access),
			}))
		}
	}
}

/// XML planner double: returns a marker access plan against the pseudo
/// model "xml" so routing tests can tell which planner ran.
pub(crate) struct FixtureXml;

impl XmlPlanner for FixtureXml {
	fn plan(&self, _ctx: &mut PlanningContext<'_>, command: &Command) -> Result<ProcessorPlan> {
		Ok(ProcessorPlan::Access(AccessPlan {
			model: "xml".to_string(),
			group: command.group().unwrap_or_default().to_string(),
			kind: command.kind(),
			output: command.output().to_vec(),
		}))
	}
}

pub(crate) struct IdentityRewriter;

impl Rewriter for IdentityRewriter {
	fn rewrite(&self, command: Command) -> Result<Command> {
		Ok(command)
	}
}

/// Bundles fixtures so tests can borrow a [`PlanningContext`] from one
/// owner.
pub(crate) struct Fixture {
	pub metadata: FixtureMetadata,
	pub oracle: FixtureOracle,
	pub relational: FixtureRelational,
	pub xml: FixtureXml,
	pub rewriter: IdentityRewriter,
	pub cache: MemoryPlanCache,
}

impl Fixture {
	pub fn new(metadata: FixtureMetadata, oracle: FixtureOracle) -> Self {
		Lazy::force(&TRACING);
		let planner_metadata = FixtureMetadata {
			groups: metadata.groups.clone(),
			triggers: metadata.triggers.clone(),
		};
		Self {
			metadata,
			oracle,
			relational: FixtureRelational {
				metadata: planner_metadata,
				..Default::default()
			},
			xml: FixtureXml,
			rewriter: IdentityRewriter,
			cache: MemoryPlanCache::new(),
		}
	}

	pub fn context(&self) -> PlanningContext<'_> {
		PlanningContext::new(&self.metadata, &self.oracle, &self.relational, &self.xml, &self.rewriter, &self.cache)
	}
}

pub(crate) fn insert(group: &str, value: i32) -> Command {
	use fedra_core::{Expression, command::InsertCommand};
	Command::Insert(InsertCommand {
		group: group.to_string(),
		columns: vec!["c1".to_string()],
		values: Some(vec![Expression::constant(value)]),
		query: None,
		base: CommandBase::default(),
	})
}

pub(crate) fn update(group: &str) -> Command {
	use fedra_core::{Expression, command::UpdateCommand};
	Command::Update(UpdateCommand {
		group: group.to_string(),
		assignments: vec![("c1".to_string(), Expression::constant(0))],
		predicate: None,
		base: CommandBase::default(),
	})
}
