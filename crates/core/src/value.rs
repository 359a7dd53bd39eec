// Copyright (c) fedradb.org 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

/// Resolved column/value type. The resolver has already settled every
/// expression's type before a command reaches the planner, so this stays
/// deliberately small.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
	Undefined,
	Bool,
	Int4,
	Int8,
	Float8,
	Utf8,
}

impl Display for Type {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			Type::Undefined => f.write_str("UNDEFINED"),
			Type::Bool => f.write_str("BOOL"),
			Type::Int4 => f.write_str("INT4"),
			Type::Int8 => f.write_str("INT8"),
			Type::Float8 => f.write_str("FLOAT8"),
			Type::Utf8 => f.write_str("UTF8"),
		}
	}
}

/// A resolved constant value.
///
/// `Undefined` doubles as SQL NULL and as the placeholder for trigger columns
/// outside an explicit changed-column list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
	Undefined,
	Bool(bool),
	Int4(i32),
	Int8(i64),
	Float8(f64),
	Utf8(String),
}

impl Value {
	pub fn ty(&self) -> Type {
		match self {
			Value::Undefined => Type::Undefined,
			Value::Bool(_) => Type::Bool,
			Value::Int4(_) => Type::Int4,
			Value::Int8(_) => Type::Int8,
			Value::Float8(_) => Type::Float8,
			Value::Utf8(_) => Type::Utf8,
		}
	}

	pub fn is_undefined(&self) -> bool {
		matches!(self, Value::Undefined)
	}
}

impl Display for Value {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			Value::Undefined => f.write_str("undefined"),
			Value::Bool(v) => write!(f, "{v}"),
			Value::Int4(v) => write!(f, "{v}"),
			Value::Int8(v) => write!(f, "{v}"),
			Value::Float8(v) => write!(f, "{v}"),
			Value::Utf8(v) => write!(f, "{v}"),
		}
	}
}

impl From<bool> for Value {
	fn from(v: bool) -> Self {
		Value::Bool(v)
	}
}

impl From<i32> for Value {
	fn from(v: i32) -> Self {
		Value::Int4(v)
	}
}

impl From<i64> for Value {
	fn from(v: i64) -> Self {
		Value::Int8(v)
	}
}

impl From<&str> for Value {
	fn from(v: &str) -> Self {
		Value::Utf8(v.to_string())
	}
}
