// Copyright (c) fedradb.org 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

use std::fmt::{self, Display, Formatter};

use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
	Eq,
	Ne,
	Lt,
	Le,
	Gt,
	Ge,
}

impl Display for CompareOp {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			CompareOp::Eq => f.write_str("="),
			CompareOp::Ne => f.write_str("<>"),
			CompareOp::Lt => f.write_str("<"),
			CompareOp::Le => f.write_str("<="),
			CompareOp::Gt => f.write_str(">"),
			CompareOp::Ge => f.write_str(">="),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
	Add,
	Sub,
	Mul,
	Div,
}

impl Display for ArithOp {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			ArithOp::Add => f.write_str("+"),
			ArithOp::Sub => f.write_str("-"),
			ArithOp::Mul => f.write_str("*"),
			ArithOp::Div => f.write_str("/"),
		}
	}
}

/// Reference to a column of a group, or to a trigger pseudo-group
/// (`OLD.col` / `NEW.col`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementRef {
	pub group: Option<String>,
	pub name: String,
}

impl Display for ElementRef {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match &self.group {
			Some(group) => write!(f, "{group}.{}", self.name),
			None => f.write_str(&self.name),
		}
	}
}

/// A resolved scalar expression. Evaluation is the runtime engine's concern;
/// the planner only carries these through into instructions and bindings.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
	Constant(Value),
	Variable(String),
	Element(ElementRef),
	Compare {
		op: CompareOp,
		left: Box<Expression>,
		right: Box<Expression>,
	},
	Arith {
		op: ArithOp,
		left: Box<Expression>,
		right: Box<Expression>,
	},
	IsNull(Box<Expression>),
}

impl Expression {
	pub fn constant(value: impl Into<Value>) -> Self {
		Expression::Constant(value.into())
	}

	pub fn variable(name: impl Into<String>) -> Self {
		Expression::Variable(name.into())
	}

	pub fn element(group: Option<&str>, name: impl Into<String>) -> Self {
		Expression::Element(ElementRef {
			group: group.map(str::to_string),
			name: name.into(),
		})
	}

	/// The variable name if this expression is a bare variable reference.
	/// Callable output-parameter binding only supports such expressions.
	pub fn as_variable(&self) -> Option<&str> {
		match self {
			Expression::Variable(name) => Some(name),
			_ => None,
		}
	}
}

impl Display for Expression {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			Expression::Constant(value) => write!(f, "{value}"),
			Expression::Variable(name) => write!(f, "${name}"),
			Expression::Element(element) => write!(f, "{element}"),
			Expression::Compare {
				op,
				left,
				right,
			} => write!(f, "({left} {op} {right})"),
			Expression::Arith {
				op,
				left,
				right,
			} => write!(f, "({left} {op} {right})"),
			Expression::IsNull(inner) => write!(f, "({inner} IS NULL)"),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn as_variable_only_for_bare_references() {
		assert_eq!(Expression::variable("x").as_variable(), Some("x"));
		assert_eq!(Expression::constant(1).as_variable(), None);
		assert_eq!(Expression::element(Some("NEW"), "col").as_variable(), None);
	}

	#[test]
	fn display_nested() {
		let expr = Expression::Compare {
			op: CompareOp::Lt,
			left: Box::new(Expression::variable("x")),
			right: Box::new(Expression::constant(3)),
		};
		assert_eq!(expr.to_string(), "($x < 3)");
	}
}
