use assert_matches::assert_matches;

use super::*;
use crate::db::value::{Transformed, Value};

fn identity_transform() -> TransformFn {
	Arc::new(|value| Ok(Transformed::Replace(value)))
}

fn group(name: &str, members: &[&str]) -> Arc<PrivacyGroup> {
	let group = PrivacyGroup::new(name);
	group.add_many(members.iter().copied());
	Arc::new(group)
}

fn ops_excluding(table: &str, columns: &[&str]) -> TableOperations {
	let mut ops = TableOperations::new();
	ops.excluded_cols.insert(
		table.to_string(),
		columns.iter().map(|column| column.to_string()).collect(),
	);
	ops
}

fn with_transform(mut ops: TableOperations, table: &str, column: &str) -> TableOperations {
	ops
		.transforms
		.entry(table.to_string())
		.or_default()
		.insert(column.to_string(), identity_transform());
	ops
}

#[test]
fn resolve_merges_excluded_columns_in_group_order() {
	let policy = StaticDataPolicy::new(vec![
		(
			group("Group1", &["alice"]),
			ops_excluding("table1", &["col1", "col2", "col3"]),
		),
		(
			group("Group2", &["alice"]),
			ops_excluding("table1", &["col1", "col3", "col4", "col5"]),
		),
	]);

	let operations = policy.resolve("alice").unwrap();
	assert_eq!(
		operations.excluded_cols["table1"],
		vec!["col1", "col2", "col3", "col4", "col5"]
	);
}

#[test]
fn excluded_column_union_is_case_insensitive() {
	let policy = StaticDataPolicy::new(vec![
		(group("Group1", &["alice"]), ops_excluding("table1", &["DoB"])),
		(
			group("Group2", &["alice"]),
			ops_excluding("table1", &["dob", "name"]),
		),
	]);

	let operations = policy.resolve("alice").unwrap();
	assert_eq!(operations.excluded_cols["table1"], vec!["DoB", "name"]);
}

#[test]
fn transforms_survive_the_merge() {
	let policy = StaticDataPolicy::new(vec![
		(
			group("Group1", &["alice"]),
			with_transform(ops_excluding("table1", &["col2"]), "table1", "col1"),
		),
		(
			group("Group2", &["alice"]),
			ops_excluding("table1", &["col3"]),
		),
	]);

	let operations = policy.resolve("alice").unwrap();
	let transform = &operations.transforms["table1"]["col1"];
	assert_matches!(
		transform(Value::Int32(1)).unwrap(),
		Transformed::Replace(Value::Int32(1))
	);
}

#[test]
fn transforms_for_different_columns_merge() {
	let policy = StaticDataPolicy::new(vec![
		(
			group("Group1", &["alice"]),
			with_transform(TableOperations::new(), "table1", "col1"),
		),
		(
			group("Group2", &["alice"]),
			with_transform(TableOperations::new(), "table1", "col2"),
		),
	]);

	let operations = policy.resolve("alice").unwrap();
	assert!(operations.transforms["table1"].contains_key("col1"));
	assert!(operations.transforms["table1"].contains_key("col2"));
}

#[test]
fn duplicate_transform_for_the_same_column_is_a_conflict() {
	let policy = StaticDataPolicy::new(vec![
		(
			group("Group1", &["alice"]),
			with_transform(TableOperations::new(), "table1", "col1"),
		),
		(
			group("Group2", &["alice"]),
			with_transform(TableOperations::new(), "table1", "col1"),
		),
	]);

	let err = policy.resolve("alice").unwrap_err();
	assert_matches!(err, PolicyError::Conflict { .. });
	assert!(err.to_string().starts_with("unresolvable policy conflict"));
}

#[test]
fn requester_in_no_group_is_rejected() {
	let policy = StaticDataPolicy::new(vec![(
		group("Group1", &["alice"]),
		ops_excluding("table1", &["col1"]),
	)]);

	assert_matches!(
		policy.resolve("mallory"),
		Err(PolicyError::NotInAnyGroup(id)) if id == "mallory"
	);
}

#[test]
fn membership_without_operations_resolves_to_an_empty_policy() {
	let policy = StaticDataPolicy::new(vec![(group("Group1", &["alice"]), TableOperations::new())]);

	let operations = policy.resolve("alice").unwrap();
	assert!(operations.transforms.is_empty());
	assert!(operations.excluded_cols.is_empty());
}
