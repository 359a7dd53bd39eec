// Copyright (c) fedradb.org 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

//! Groups maximal contiguous runs of same-source DML commands into
//! connector-level batches. Single left-to-right greedy pass; commands that
//! cannot batch keep their individual plans.

use fedra_core::{
	Command, VariableContext,
	command::BatchedUpdateCommand,
	interface::Capability,
	plan::{BatchedUpdatePlan, CompositeUpdatePlan, ProcessorPlan, ProjectPlan, update_count_output},
};
use tracing::{debug, instrument};

use crate::{
	context::PlanningContext,
	error::{Error, Result},
};

#[instrument(level = "trace", skip_all, fields(commands = command.commands.len()))]
pub fn plan_batch(ctx: &mut PlanningContext<'_>, command: &mut BatchedUpdateCommand) -> Result<ProcessorPlan> {
	// Pre-plan every command individually so eligibility can inspect each
	// command's own access strategy.
	let relational = ctx.relational;
	for sub in &mut command.commands {
		if sub.plan().is_none() {
			let plan = relational.plan(ctx, sub)?;
			sub.attach_plan(plan);
		}
	}

	let commands = &command.commands;
	let contexts = &command.contexts;
	let total = commands.len();

	let mut children: Vec<ProcessorPlan> = Vec::new();
	let mut child_contexts: Vec<VariableContext> = Vec::new();

	let mut index = 0;
	while index < total {
		if let Some(model) = batch_model(ctx, &commands[index])? {
			if ctx.capabilities.supports(&model, Capability::BatchedUpdates)? {
				let mut run_end = index + 1;
				while run_end < total {
					match batch_model(ctx, &commands[run_end])? {
						Some(next) if ctx.capabilities.same_connector(&model, &next)? => {
							run_end += 1
						}
						_ => break,
					}
				}
				if run_end - index >= 2 {
					let batch = batch_group(
						model,
						&commands[index..run_end],
						contexts_slice(contexts, index, run_end),
					);
					debug!(model = %batch.model, commands = batch.commands.len(),
						"batched update run");
					children.push(ProcessorPlan::Project(ProjectPlan {
						output: update_count_output(),
						child: Box::new(ProcessorPlan::BatchedUpdate(batch)),
					}));
					// The batch rebinds internally; the wrapper
					// level gets one placeholder context.
					child_contexts.push(VariableContext::new());
					index = run_end;
					continue;
				}
			}
		}

		let sub = &commands[index];
		let plan = sub.plan().cloned().ok_or(Error::MissingSubPlan {
			kind: sub.kind(),
		})?;
		children.push(plan);
		child_contexts.push(contexts.get(index).cloned().unwrap_or_default());
		index += 1;
	}

	Ok(ProcessorPlan::CompositeUpdate(CompositeUpdatePlan::new(
		children,
		child_contexts,
		total,
		command.single_result,
		update_count_output(),
	)))
}

/// The target model of a batch-eligible command: its individual plan must be
/// a direct source access and its target group physical.
fn batch_model(ctx: &mut PlanningContext<'_>, command: &Command) -> Result<Option<String>> {
	let access = match command.plan() {
		Some(ProcessorPlan::Access(access)) => access,
		_ => return Ok(None),
	};
	let group = match command.group() {
		Some(group) => group,
		None => return Ok(None),
	};
	let def = ctx.metadata.group(group)?;
	ctx.record_access(def.name.clone());
	if !def.physical {
		return Ok(None);
	}
	Ok(Some(access.model.clone()))
}

fn contexts_slice(contexts: &[VariableContext], start: usize, end: usize) -> &[VariableContext] {
	let start = start.min(contexts.len());
	let end = end.min(contexts.len());
	&contexts[start..end]
}

fn batch_group(model: String, commands: &[Command], contexts: &[VariableContext]) -> BatchedUpdatePlan {
	let needs_evaluation = (0..commands.len())
		.map(|i| contexts.get(i).map(|c| !c.is_empty()).unwrap_or(false))
		.collect();
	BatchedUpdatePlan {
		model,
		commands: commands.to_vec(),
		needs_evaluation,
		output: update_count_output(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_utils::{Fixture, FixtureMetadata, FixtureOracle, insert, update};

	fn batched(commands: Vec<Command>) -> BatchedUpdateCommand {
		BatchedUpdateCommand {
			commands,
			contexts: vec![],
			single_result: false,
			base: Default::default(),
		}
	}

	fn segment_sizes(plan: &ProcessorPlan) -> Vec<Option<usize>> {
		// Some(n): a batch of n commands; None: an individual plan.
		match plan {
			ProcessorPlan::CompositeUpdate(composite) => composite
				.children
				.iter()
				.map(|child| match child {
					ProcessorPlan::Project(project) => match project.child.as_ref() {
						ProcessorPlan::BatchedUpdate(batch) => {
							Some(batch.commands.len())
						}
						_ => None,
					},
					_ => None,
				})
				.collect(),
			other => panic!("expected composite update, got {}", other.name()),
		}
	}

	#[test]
	fn five_inserts_become_one_batch() {
		let fixture = Fixture::new(
			FixtureMetadata::default().with_physical_group("t", "m1"),
			FixtureOracle::default().with_model("m1", "c1", true),
		);
		let mut ctx = fixture.context();
		let mut command = batched((0..5).map(|i| insert("t", i)).collect());

		let plan = plan_batch(&mut ctx, &mut command).unwrap();

		assert_eq!(segment_sizes(&plan), vec![Some(5)]);
		match &plan {
			ProcessorPlan::CompositeUpdate(composite) => {
				assert_eq!(composite.command_count, 5);
				assert_eq!(composite.contexts.len(), 1);
				assert!(composite.contexts[0].is_empty());
			}
			_ => unreachable!(),
		}
	}

	#[test]
	fn ineligible_middle_splits_the_run() {
		// Three inserts into A (batchable), two updates on B (not
		// batchable), two more inserts into A: [batch(3), single,
		// single, batch(2)].
		let fixture = Fixture::new(
			FixtureMetadata::default()
				.with_physical_group("a", "m1")
				.with_physical_group("b", "m2"),
			FixtureOracle::default()
				.with_model("m1", "c1", true)
				.with_model("m2", "c2", false),
		);
		let mut ctx = fixture.context();
		let mut command = batched(vec![
			insert("a", 1),
			insert("a", 2),
			insert("a", 3),
			update("b"),
			update("b"),
			insert("a", 4),
			insert("a", 5),
		]);

		let plan = plan_batch(&mut ctx, &mut command).unwrap();

		assert_eq!(segment_sizes(&plan), vec![Some(3), None, None, Some(2)]);
		match &plan {
			ProcessorPlan::CompositeUpdate(composite) => {
				assert_eq!(composite.command_count, 7)
			}
			_ => unreachable!(),
		}
	}

	#[test]
	fn no_batch_without_connector_support() {
		let fixture = Fixture::new(
			FixtureMetadata::default().with_physical_group("t", "m1"),
			FixtureOracle::default().with_model("m1", "c1", false),
		);
		let mut ctx = fixture.context();
		let mut command = batched(vec![insert("t", 1), insert("t", 2)]);

		let plan = plan_batch(&mut ctx, &mut command).unwrap();

		assert_eq!(segment_sizes(&plan), vec![None, None]);
	}

	#[test]
	fn virtual_target_is_not_batch_eligible() {
		use fedra_core::interface::GroupDef;
		let fixture = Fixture::new(
			FixtureMetadata::default()
				.with_physical_group("t", "m1")
				.with_group(GroupDef {
					name: "v".to_string(),
					model: "m1".to_string(),
					physical: false,
					xml_mapped: false,
					columns: vec![],
				}),
			FixtureOracle::default().with_model("m1", "c1", true),
		);
		let mut ctx = fixture.context();
		let mut command = batched(vec![insert("t", 1), insert("v", 2), insert("t", 3)]);

		let plan = plan_batch(&mut ctx, &mut command).unwrap();

		// The view insert breaks the run; no segment reaches length 2.
		assert_eq!(segment_sizes(&plan), vec![None, None, None]);
	}

	#[test]
	fn contexts_stay_in_lockstep() {
		let fixture = Fixture::new(
			FixtureMetadata::default()
				.with_physical_group("a", "m1")
				.with_physical_group("b", "m2"),
			FixtureOracle::default()
				.with_model("m1", "c1", true)
				.with_model("m2", "c2", false),
		);
		let mut ctx = fixture.context();

		let mut bound = VariableContext::new();
		bound.set("x", fedra_core::Value::Int4(1));
		let mut command = BatchedUpdateCommand {
			commands: vec![insert("a", 1), insert("a", 2), update("b")],
			contexts: vec![VariableContext::new(), VariableContext::new(), bound.clone()],
			single_result: false,
			base: Default::default(),
		};

		let plan = plan_batch(&mut ctx, &mut command).unwrap();

		match &plan {
			ProcessorPlan::CompositeUpdate(composite) => {
				assert_eq!(composite.children.len(), 2);
				assert!(composite.contexts[0].is_empty());
				assert_eq!(composite.contexts[1], bound);
			}
			_ => unreachable!(),
		}
	}
}
