use assert_matches::assert_matches;

use super::*;

fn rewritten(query: &str, from: &str, to: &str) -> String {
	let mut parsed = classify(query).unwrap();
	let mapping = HashMap::from([(from.to_string(), to.to_string())]);
	rewrite_tables(&mut parsed.statements, &mapping);
	render(&parsed.statements)
}

#[test]
fn selects_are_reads() {
	let parsed = classify("SELECT name FROM people WHERE id = 1").unwrap();
	assert_eq!(parsed.kind, QueryKind::Read);
	assert_eq!(parsed.tables, vec!["people"]);
}

#[test]
fn dml_statements_are_writes() {
	for query in [
		"INSERT INTO people VALUES (1, 'alice')",
		"UPDATE people SET name = 'bob' WHERE id = 1",
		"DELETE FROM people WHERE id = 1",
	] {
		let parsed = classify(query).unwrap();
		assert_eq!(parsed.kind, QueryKind::Write, "query: {query}");
		assert_eq!(parsed.tables, vec!["people"], "query: {query}");
	}
}

#[test]
fn mixing_statements_is_rejected() {
	assert_matches!(
		classify("SELECT * FROM people; DELETE FROM people"),
		Err(DbError::UnsupportedMixedQuery)
	);
}

#[test]
fn insert_select_is_rejected() {
	assert_matches!(
		classify("INSERT INTO people SELECT * FROM staging"),
		Err(DbError::UnsupportedMixedQuery)
	);
}

#[test]
fn writes_with_subqueries_are_rejected() {
	assert_matches!(
		classify("UPDATE people SET vip = 1 WHERE id IN (SELECT id FROM orders)"),
		Err(DbError::UnsupportedMixedQuery)
	);
	assert_matches!(
		classify("DELETE FROM people WHERE EXISTS (SELECT 1 FROM orders WHERE orders.pid = people.id)"),
		Err(DbError::UnsupportedMixedQuery)
	);
}

#[test]
fn ddl_is_unsupported() {
	assert_matches!(
		classify("CREATE TABLE people (id int)"),
		Err(DbError::UnsupportedQuery)
	);
}

#[test]
fn parse_failures_propagate() {
	assert_matches!(classify("definitely not sql"), Err(DbError::ParseFailure(_)));
}

#[test]
fn tables_are_collected_in_order_of_first_appearance() {
	let parsed = classify(
		"SELECT * FROM a JOIN b ON a.id = b.id WHERE a.x IN (SELECT y FROM c)",
	)
	.unwrap();
	assert_eq!(parsed.tables, vec!["a", "b", "c"]);
}

#[test]
fn duplicate_references_are_preserved() {
	let parsed = classify("SELECT * FROM a WHERE id IN (SELECT id FROM a)").unwrap();
	assert_eq!(parsed.tables, vec!["a", "a"]);
}

#[test]
fn rewrite_renames_relations_and_their_qualifiers() {
	let sql = rewritten(
		"SELECT people.name FROM people WHERE people.id = 1",
		"people",
		"transformed_alice_people",
	);
	assert!(sql.contains("FROM transformed_alice_people"), "got: {sql}");
	assert!(sql.contains("transformed_alice_people.name"), "got: {sql}");
	assert!(sql.contains("transformed_alice_people.id"), "got: {sql}");
}

#[test]
fn rewrite_does_not_bleed_into_similar_names() {
	let sql = rewritten(
		"SELECT * FROM people, people_archive",
		"people",
		"transformed_alice_people",
	);
	assert!(sql.contains("transformed_alice_people"), "got: {sql}");
	assert!(sql.contains("people_archive"), "got: {sql}");
	assert!(!sql.contains("transformed_alice_people_archive"), "got: {sql}");
}

#[test]
fn rewrite_preserves_quoted_identifiers() {
	let sql = rewritten(
		"SELECT * FROM `people`",
		"people",
		"transformed_alice_people",
	);
	assert!(sql.contains("`transformed_alice_people`"), "got: {sql}");
}

#[test]
fn rewrite_leaves_alias_qualifiers_alone() {
	let sql = rewritten(
		"SELECT p.name FROM people p",
		"people",
		"transformed_alice_people",
	);
	assert!(sql.contains("transformed_alice_people"), "got: {sql}");
	assert!(sql.contains("p.name"), "got: {sql}");
}

#[test]
fn placeholders_survive_the_rewrite() {
	let sql = rewritten(
		"SELECT name FROM people WHERE id = ?",
		"people",
		"transformed_alice_people",
	);
	assert!(sql.contains("= ?"), "got: {sql}");
}
