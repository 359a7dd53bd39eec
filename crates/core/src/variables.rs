// Copyright (c) fedradb.org 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

use std::collections::BTreeMap;

use crate::value::Value;

/// Runtime variable bindings carried alongside a plan: procedural contexts
/// pre-bind values for the commands they issue, and trigger row plans bind
/// OLD/NEW/CHANGING symbols per row.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VariableContext {
	values: BTreeMap<String, Value>,
}

impl VariableContext {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn set(&mut self, name: impl Into<String>, value: Value) {
		self.values.insert(name.into(), value);
	}

	pub fn get(&self, name: &str) -> Option<&Value> {
		self.values.get(name)
	}

	pub fn is_empty(&self) -> bool {
		self.values.is_empty()
	}

	pub fn len(&self) -> usize {
		self.values.len()
	}

	pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
		self.values.iter()
	}
}
