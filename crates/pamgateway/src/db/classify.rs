use std::collections::HashMap;
use std::ops::ControlFlow;

use itertools::Itertools;
use sqlparser::ast::{
	Expr, ObjectName, Query, SetExpr, Statement, Visit, Visitor, visit_expressions_mut,
	visit_relations_mut,
};
use sqlparser::dialect::MySqlDialect;
use sqlparser::parser::Parser;

use crate::db::DbError;

#[cfg(test)]
#[path = "classify_tests.rs"]
mod tests;

/// How a query touches the backend. Queries that both read and write are
/// rejected before classification completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum QueryKind {
	Read,
	Write,
}

/// A parsed query together with its classification and the tables it
/// references, in order of first appearance (duplicates preserved).
#[derive(Debug)]
pub(crate) struct ClassifiedQuery {
	pub statements: Vec<Statement>,
	pub kind: QueryKind,
	pub tables: Vec<String>,
}

#[derive(Default)]
struct QueryScan {
	reads: bool,
	writes: bool,
	tables: Vec<String>,
}

impl Visitor for QueryScan {
	type Break = ();

	fn pre_visit_relation(&mut self, relation: &ObjectName) -> ControlFlow<()> {
		if let Some(name) = relation.0.last() {
			if !name.value.is_empty() {
				self.tables.push(name.value.clone());
			}
		}
		ControlFlow::Continue(())
	}

	fn pre_visit_statement(&mut self, statement: &Statement) -> ControlFlow<()> {
		match statement {
			Statement::Query(_) => self.reads = true,
			Statement::Insert { source, .. } => {
				self.writes = true;
				// INSERT ... SELECT reads as well as writes
				if selects(source) {
					self.reads = true;
				}
			},
			Statement::Update { .. } | Statement::Delete { .. } => self.writes = true,
			_ => {},
		}
		ControlFlow::Continue(())
	}

	fn pre_visit_expr(&mut self, expr: &Expr) -> ControlFlow<()> {
		// A subquery inside a write makes the whole query a read as well
		if matches!(
			expr,
			Expr::Subquery(_) | Expr::InSubquery { .. } | Expr::Exists { .. }
		) {
			self.reads = true;
		}
		ControlFlow::Continue(())
	}
}

fn selects(query: &Query) -> bool {
	!matches!(query.body.as_ref(), SetExpr::Values(_))
}

/// Parse and classify `query`, collecting the tables it references.
pub(crate) fn classify(query: &str) -> Result<ClassifiedQuery, DbError> {
	let statements = Parser::parse_sql(&MySqlDialect {}, query)?;

	let mut scan = QueryScan::default();
	let _ = statements.visit(&mut scan);

	let kind = match (scan.reads, scan.writes) {
		(true, true) => return Err(DbError::UnsupportedMixedQuery),
		(true, false) => QueryKind::Read,
		(false, true) => QueryKind::Write,
		(false, false) => return Err(DbError::UnsupportedQuery),
	};

	Ok(ClassifiedQuery {
		statements,
		kind,
		tables: scan.tables,
	})
}

/// Replace referenced table names in place, at the AST level. Identifier
/// quoting is preserved and substrings of other names are never touched.
/// Column references qualified by a renamed table follow it; alias
/// qualifiers are left alone since aliases keep their names.
pub(crate) fn rewrite_tables(statements: &mut Vec<Statement>, mapping: &HashMap<String, String>) {
	let _ = visit_relations_mut(statements, |relation: &mut ObjectName| {
		if let Some(name) = relation.0.last_mut() {
			if let Some(replacement) = mapping.get(&name.value) {
				name.value = replacement.clone();
			}
		}
		ControlFlow::<()>::Continue(())
	});

	let _ = visit_expressions_mut(statements, |expr: &mut Expr| {
		if let Expr::CompoundIdentifier(parts) = expr {
			if parts.len() >= 2 {
				if let Some(qualifier) = parts.first_mut() {
					if let Some(replacement) = mapping.get(&qualifier.value) {
						qualifier.value = replacement.clone();
					}
				}
			}
		}
		ControlFlow::<()>::Continue(())
	});
}

/// Render statements back to SQL text. `?` placeholders survive the round
/// trip in their original order.
pub(crate) fn render(statements: &[Statement]) -> String {
	statements.iter().join("; ")
}
