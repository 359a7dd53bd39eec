// Copyright (c) fedradb.org 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

//! Top-level command dispatcher: routes each command kind to its planner
//! and fronts virtual-procedure compilation with the prepared-plan cache.

use std::sync::Arc;

use fedra_core::{
	Command,
	command::{CommandKind, ProcedureBodyCommand},
	plan::{DdlPlan, ProcessorPlan},
};
use tracing::{debug, instrument};

use crate::{
	batch,
	cache::{CacheKey, PreparedPlan},
	context::{Determinism, PlanningContext},
	error::{Error, Result},
	procedure, trigger,
};

/// Produce an executable plan for a command. The single entry point of the
/// planning layer.
#[instrument(level = "trace", skip_all, fields(kind = %command.kind()))]
pub fn compile(ctx: &mut PlanningContext<'_>, command: Command) -> Result<ProcessorPlan> {
	let mut command = command;
	plan_command(ctx, &mut command)
}

fn plan_command(ctx: &mut PlanningContext<'_>, command: &mut Command) -> Result<ProcessorPlan> {
	match command {
		Command::Query(_)
		| Command::Insert(_)
		| Command::Update(_)
		| Command::Delete(_) => plan_leaf(ctx, command),
		Command::BatchedUpdate(batched) => batch::plan_batch(ctx, batched),
		Command::Ddl(ddl) => Ok(ProcessorPlan::Ddl(DdlPlan {
			command: ddl.clone(),
		})),
		Command::ProcedureBody(body) => plan_procedure_body(ctx, body),
		Command::StoredProcedure(_) => {
			let relational = ctx.relational;
			relational.plan(ctx, command)
		}
		Command::SourceEvent(event) => trigger::plan_source_event(ctx, event),
		Command::Dynamic(_) => Err(Error::internal(
			"dynamic command reached the dispatcher before evaluation",
		)),
	}
}

/// Plain query and DML commands. A DML statement against a triggered view
/// compiles to the trigger's per-row plan instead; otherwise routing
/// follows the target group (XML-mapped views go to the XML planner).
fn plan_leaf(ctx: &mut PlanningContext<'_>, command: &Command) -> Result<ProcessorPlan> {
	if command.kind() != CommandKind::Query {
		if let Some(plan) = trigger::plan_statement_triggers(ctx, command)? {
			return Ok(plan);
		}
	}
	let group = command
		.group()
		.ok_or_else(|| Error::internal(format!("{} command without a target group", command.kind())))?;
	let def = ctx.metadata.group(group)?;
	ctx.record_access(def.name.clone());
	if def.xml_mapped {
		let xml = ctx.xml;
		xml.plan(ctx, command)
	} else {
		let relational = ctx.relational;
		relational.plan(ctx, command)
	}
}

/// Procedure bodies resolving a durable virtual view are compiled through
/// the cache; anonymous and temporary-view bodies are compiled fresh every
/// time.
fn plan_procedure_body(
	ctx: &mut PlanningContext<'_>,
	body: &ProcedureBodyCommand,
) -> Result<ProcessorPlan> {
	let view = match &body.virtual_view {
		Some(view) if !view.temporary => view.name.clone(),
		_ => return compile_procedure(ctx, body.clone()),
	};

	let key = CacheKey::procedure(view);
	let cache = ctx.cache;
	let entry = cache.get_or_plan(key, &mut || {
		// Scope the touched-set and determinism level to this compile:
		// the entry records exactly what this procedure depends on, a
		// caller whose level is already lowered must not poison the
		// entry, and a nested compile must not leak its classification
		// back into the caller.
		let outer_accessed = ctx.take_accessed();
		let outer_determinism = ctx.determinism();
		ctx.restore_determinism(Determinism::Deterministic);

		let compiled = compile_procedure(ctx, body.clone());

		let determinism = ctx.determinism();
		let accessed = ctx.take_accessed();
		ctx.set_accessed(outer_accessed);
		ctx.restore_determinism(outer_determinism);

		let plan = compiled?;
		debug!(?determinism, touched = accessed.len(), "virtual procedure compiled");
		Ok(Arc::new(PreparedPlan {
			plan,
			determinism,
			accessed,
		}))
	})?;

	// Hit or miss, the caller inherits the entry's dependencies so its own
	// cache entry (if any) invalidates with them.
	ctx.merge_accessed(entry.accessed.iter().cloned());
	Ok(entry.plan.clone())
}

fn compile_procedure(ctx: &mut PlanningContext<'_>, body: ProcedureBodyCommand) -> Result<ProcessorPlan> {
	let rewriter = ctx.rewriter;
	let mut command = rewriter.rewrite(Command::ProcedureBody(body))?;
	attach_subplans(ctx, &mut command)?;
	match &command {
		Command::ProcedureBody(body) => procedure::plan_procedure(body),
		other => Err(Error::internal(format!(
			"rewriter changed procedure body into {}",
			other.kind()
		))),
	}
}

/// Recursively attach plans to every embedded command that does not carry
/// one yet. Idempotent; dynamic commands stay unplanned until their SQL is
/// evaluated at runtime.
pub fn attach_subplans(ctx: &mut PlanningContext<'_>, command: &mut Command) -> Result<()> {
	for sub in command.sub_commands_mut() {
		attach_subplans(ctx, sub)?;
		if matches!(sub, Command::Dynamic(_)) || sub.plan().is_some() {
			continue;
		}
		let plan = plan_command(ctx, sub)?;
		sub.attach_plan(plan);
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use fedra_core::{
		Block, Expression, Statement, Type,
		command::{AssignValue, CommandBase, QueryCommand, ViewRef},
		interface::GroupDef,
		plan::ProcedurePlan,
	};

	use super::*;
	use crate::{
		cache::PlanCache,
		test_utils::{Fixture, FixtureMetadata, FixtureOracle, insert},
	};

	fn procedure_body(view: Option<ViewRef>) -> Command {
		let block = Block::new(vec![
			Statement::Declare {
				variable: "x".to_string(),
				ty: Type::Int4,
				value: Some(AssignValue::Expression(Expression::constant(1))),
			},
			Statement::Command {
				command: insert("t", 1),
				updating: true,
			},
		]);
		Command::ProcedureBody(ProcedureBodyCommand {
			block,
			update_procedure: true,
			virtual_view: view,
			base: CommandBase::default(),
		})
	}

	fn fixture() -> Fixture {
		Fixture::new(
			FixtureMetadata::default().with_physical_group("t", "m1"),
			FixtureOracle::default().with_model("m1", "c1", false),
		)
	}

	fn procedure_plan(plan: ProcessorPlan) -> ProcedurePlan {
		match plan {
			ProcessorPlan::Procedure(procedure) => procedure,
			other => panic!("expected procedure plan, got {}", other.name()),
		}
	}

	#[test]
	fn query_routes_to_the_relational_planner() {
		let fixture = fixture();
		let mut ctx = fixture.context();
		let query = Command::Query(QueryCommand {
			group: "t".to_string(),
			predicate: None,
			base: CommandBase::default(),
		});

		let plan = compile(&mut ctx, query).unwrap();

		assert!(matches!(plan, ProcessorPlan::Access(_)));
		assert_eq!(fixture.relational.plans.get(), 1);
		assert!(ctx.accessed().contains("t"));
	}

	#[test]
	fn xml_mapped_group_routes_to_the_xml_planner() {
		let fixture = Fixture::new(
			FixtureMetadata::default().with_group(GroupDef {
				name: "doc".to_string(),
				model: "m1".to_string(),
				physical: false,
				xml_mapped: true,
				columns: vec![],
			}),
			FixtureOracle::default().with_model("m1", "c1", false),
		);
		let mut ctx = fixture.context();
		let query = Command::Query(QueryCommand {
			group: "doc".to_string(),
			predicate: None,
			base: CommandBase::default(),
		});

		let plan = compile(&mut ctx, query).unwrap();

		match plan {
			ProcessorPlan::Access(access) => assert_eq!(access.model, "xml"),
			other => panic!("expected xml marker plan, got {}", other.name()),
		}
		assert_eq!(fixture.relational.plans.get(), 0);
	}

	#[test]
	fn anonymous_procedure_is_compiled_fresh_every_time() {
		let fixture = fixture();

		for _ in 0..2 {
			let mut ctx = fixture.context();
			let plan = compile(&mut ctx, procedure_body(None)).unwrap();
			procedure_plan(plan);
		}

		assert_eq!(fixture.cache.stats().entries, 0);
		assert_eq!(fixture.relational.plans.get(), 2);
	}

	#[test]
	fn virtual_procedure_hits_the_cache_on_reuse() {
		let fixture = fixture();
		let view = Some(ViewRef {
			name: "v".to_string(),
			temporary: false,
		});

		let first = {
			let mut ctx = fixture.context();
			compile(&mut ctx, procedure_body(view.clone())).unwrap()
		};
		let second = {
			let mut ctx = fixture.context();
			compile(&mut ctx, procedure_body(view)).unwrap()
		};

		// One compile, served twice.
		assert_eq!(fixture.relational.plans.get(), 1);
		let stats = fixture.cache.stats();
		assert_eq!((stats.hits, stats.misses, stats.entries), (1, 1, 1));

		// Each retrieval is an independent clone sharing the program.
		let first = procedure_plan(first);
		let second = procedure_plan(second);
		assert!(Arc::ptr_eq(&first.program, &second.program));
	}

	#[test]
	fn temporary_view_bypasses_the_cache() {
		let fixture = fixture();
		let view = Some(ViewRef {
			name: "session_v".to_string(),
			temporary: true,
		});

		for _ in 0..2 {
			let mut ctx = fixture.context();
			compile(&mut ctx, procedure_body(view.clone())).unwrap();
		}

		assert_eq!(fixture.cache.stats().entries, 0);
		assert_eq!(fixture.relational.plans.get(), 2);
	}

	#[test]
	fn cache_hit_still_propagates_touched_objects() {
		let fixture = fixture();
		let view = Some(ViewRef {
			name: "v".to_string(),
			temporary: false,
		});

		{
			let mut ctx = fixture.context();
			compile(&mut ctx, procedure_body(view.clone())).unwrap();
		}
		let mut ctx = fixture.context();
		compile(&mut ctx, procedure_body(view)).unwrap();

		assert!(ctx.accessed().contains("t"));
	}

	#[test]
	fn nested_determinism_does_not_leak_into_the_caller() {
		let mut fixture = fixture();
		fixture.relational.determinism = Some(Determinism::Nondeterministic);
		let mut ctx = fixture.context();

		compile(&mut ctx, procedure_body(Some(ViewRef {
			name: "v".to_string(),
			temporary: false,
		})))
		.unwrap();

		// The entry carries the classification; the caller's level is
		// restored.
		assert_eq!(ctx.determinism(), Determinism::Deterministic);
		let entry = fixture.cache.get(&CacheKey::procedure("v")).unwrap();
		assert_eq!(entry.determinism, Determinism::Nondeterministic);
	}

	#[test]
	fn lowered_caller_level_does_not_poison_the_entry() {
		let fixture = fixture();
		let mut ctx = fixture.context();
		ctx.note_determinism(Determinism::Nondeterministic);

		compile(&mut ctx, procedure_body(Some(ViewRef {
			name: "v".to_string(),
			temporary: false,
		})))
		.unwrap();

		// The entry is classified by its own compile alone; the caller
		// keeps the level it already had.
		let entry = fixture.cache.get(&CacheKey::procedure("v")).unwrap();
		assert_eq!(entry.determinism, Determinism::Deterministic);
		assert_eq!(ctx.determinism(), Determinism::Nondeterministic);
	}

	#[test]
	fn attach_subplans_is_idempotent() {
		let fixture = fixture();
		let mut ctx = fixture.context();
		let mut command = procedure_body(None);

		attach_subplans(&mut ctx, &mut command).unwrap();
		let after_first = fixture.relational.plans.get();
		attach_subplans(&mut ctx, &mut command).unwrap();

		assert_eq!(fixture.relational.plans.get(), after_first);
	}

	#[test]
	fn ddl_passes_through() {
		use fedra_core::command::{DdlCommand, DdlKind};
		let fixture = fixture();
		let mut ctx = fixture.context();

		let plan = compile(&mut ctx, Command::Ddl(DdlCommand {
			kind: DdlKind::AlterView,
			target: "v".to_string(),
			base: CommandBase::default(),
		}))
		.unwrap();

		match plan {
			ProcessorPlan::Ddl(ddl) => assert_eq!(ddl.command.target, "v"),
			other => panic!("expected ddl plan, got {}", other.name()),
		}
	}
}
