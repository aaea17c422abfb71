use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::db::value::TransformFn;
use crate::policy::group::PrivacyGroup;

#[cfg(test)]
#[path = "data_tests.rs"]
mod tests;

/// Per-column value transforms for one table, keyed by column name.
pub type TableTransform = HashMap<String, TransformFn>;

#[derive(thiserror::Error, Debug)]
pub enum PolicyError {
	#[error("the entity {0:?} is not part of any privacy group")]
	NotInAnyGroup(String),
	#[error(
		"unresolvable policy conflict: multiple transforms for column {column:?} of table {table:?}"
	)]
	Conflict { table: String, column: String },
}

/// The effective policy for one requester: per-table value transforms and
/// excluded columns.
#[derive(Clone, Default)]
pub struct TableOperations {
	/// Table name to per-column transforms.
	pub transforms: HashMap<String, TableTransform>,
	/// Table name to excluded column names. Comparison is case-insensitive;
	/// the first spelling seen is the one kept.
	pub excluded_cols: HashMap<String, Vec<String>>,
}

impl std::fmt::Debug for TableOperations {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let transform_cols: HashMap<&String, Vec<&String>> = self
			.transforms
			.iter()
			.map(|(table, cols)| (table, cols.keys().collect()))
			.collect();
		f.debug_struct("TableOperations")
			.field("transforms", &transform_cols)
			.field("excluded_cols", &self.excluded_cols)
			.finish()
	}
}

impl TableOperations {
	pub fn new() -> Self {
		Self::default()
	}

	/// Union `other` into `self`. Excluded columns merge set-wise per
	/// table; a transform for a `(table, column)` pair that is already
	/// mapped is a conflict, whatever the function.
	fn merge(&mut self, other: &TableOperations) -> Result<(), PolicyError> {
		for (table, transforms) in &other.transforms {
			let merged = self.transforms.entry(table.clone()).or_default();
			for (column, transform) in transforms {
				if merged.contains_key(column) {
					return Err(PolicyError::Conflict {
						table: table.clone(),
						column: column.clone(),
					});
				}
				merged.insert(column.clone(), transform.clone());
			}
		}

		for (table, excluded) in &other.excluded_cols {
			let merged = self.excluded_cols.entry(table.clone()).or_default();
			for column in excluded {
				if !contains_ignore_case(merged, column) {
					merged.push(column.clone());
				}
			}
		}

		Ok(())
	}

	pub(crate) fn excluded_for(&self, table: &str) -> &[String] {
		self
			.excluded_cols
			.get(table)
			.map(Vec::as_slice)
			.unwrap_or(&[])
	}

	pub(crate) fn transforms_for(&self, table: &str) -> Option<&TableTransform> {
		self.transforms.get(table)
	}
}

pub(crate) fn contains_ignore_case(columns: &[String], column: &str) -> bool {
	columns.iter().any(|c| c.eq_ignore_ascii_case(column))
}

/// Maps requester identities to the table operations that must be applied
/// before their reads are answered.
pub trait DataPolicy: Send + Sync {
	/// Effective operations for `requester_id`, merged over every privacy
	/// group the requester belongs to, in group declaration order.
	fn resolve(&self, requester_id: &str) -> Result<TableOperations, PolicyError>;

	/// When the policy last changed; consulted by the table cache to
	/// invalidate transformed tables built under an older policy.
	fn last_updated(&self) -> DateTime<Utc>;
}

/// A fixed, ordered assignment of table operations to privacy groups.
/// Group membership may still change after construction; the assignment
/// itself may not.
pub struct StaticDataPolicy {
	groups: Vec<Arc<PrivacyGroup>>,
	operations: HashMap<String, TableOperations>,
	created_at: DateTime<Utc>,
}

impl StaticDataPolicy {
	pub fn new(entries: Vec<(Arc<PrivacyGroup>, TableOperations)>) -> Self {
		let mut groups = Vec::with_capacity(entries.len());
		let mut operations = HashMap::with_capacity(entries.len());
		for (group, ops) in entries {
			operations.insert(group.name().to_string(), ops);
			groups.push(group);
		}
		StaticDataPolicy {
			groups,
			operations,
			created_at: Utc::now(),
		}
	}
}

impl DataPolicy for StaticDataPolicy {
	fn resolve(&self, requester_id: &str) -> Result<TableOperations, PolicyError> {
		let applicable: Vec<&Arc<PrivacyGroup>> = self
			.groups
			.iter()
			.filter(|group| group.contains(requester_id))
			.collect();
		if applicable.is_empty() {
			return Err(PolicyError::NotInAnyGroup(requester_id.to_string()));
		}

		let mut merged = TableOperations::new();
		for group in applicable {
			if let Some(operations) = self.operations.get(group.name()) {
				merged.merge(operations)?;
			}
		}
		Ok(merged)
	}

	fn last_updated(&self) -> DateTime<Utc> {
		self.created_at
	}
}
