use futures_util::TryStreamExt;
use itertools::Itertools;
use sqlx::mysql::{MySqlPool, MySqlRow};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::db::DbError;
use crate::db::value::{ColumnKind, Transformed, Value};
use crate::policy::data::{TableTransform, contains_ignore_case};

pub(crate) const INSERT_BATCH_SIZE: usize = 1000;

/// One column of a backend table, as declared in `information_schema`.
pub(crate) struct ColumnSpec {
	pub name: String,
	pub kind: ColumnKind,
}

/// Columns of `table` in declaration order. An unknown table yields an
/// empty list.
pub(crate) async fn table_columns(
	pool: &MySqlPool,
	database: &str,
	table: &str,
) -> Result<Vec<ColumnSpec>, DbError> {
	let columns = sqlx::query_as::<_, (String, String)>(
		"SELECT column_name, data_type FROM information_schema.columns \
		 WHERE table_schema = ? AND table_name = ? ORDER BY ordinal_position",
	)
	.bind(database)
	.bind(table)
	.fetch_all(pool)
	.await?;

	Ok(
		columns
			.into_iter()
			.map(|(name, data_type)| {
				let kind = ColumnKind::from_data_type(&data_type);
				if kind == ColumnKind::Unknown {
					warn!(
						%table,
						column = %name,
						%data_type,
						"no typed binding for declared column type, scanning as text"
					);
				}
				ColumnSpec { name, kind }
			})
			.collect(),
	)
}

/// Materialize `transformed_table` as the policy-applied projection of
/// `table`: excluded columns are left out entirely, per-column transforms
/// run over every remaining value, and rows a transform drops are skipped.
/// Indices and column types are inherited from the source.
pub(crate) async fn build_transformed_table(
	pool: &MySqlPool,
	database: &str,
	table: &str,
	transformed_table: &str,
	transforms: Option<&TableTransform>,
	excluded_columns: &[String],
	cancel: &CancellationToken,
) -> Result<(), DbError> {
	let result = do_build(
		pool,
		database,
		table,
		transformed_table,
		transforms,
		excluded_columns,
		cancel,
	)
	.await;

	if result.is_err() {
		// A partial destination must not survive: its fresh creation time
		// would satisfy the cache validator. If this drop fails as well,
		// the next build's DROP TABLE IF EXISTS picks it up.
		if let Err(err) = drop_table_if_exists(pool, transformed_table).await {
			warn!(table = %transformed_table, %err, "could not drop partial transformed table");
		}
	}
	result
}

async fn do_build(
	pool: &MySqlPool,
	database: &str,
	table: &str,
	transformed_table: &str,
	transforms: Option<&TableTransform>,
	excluded_columns: &[String],
	cancel: &CancellationToken,
) -> Result<(), DbError> {
	let columns = table_columns(pool, database, table).await?;
	let create_table = format!("CREATE TABLE {transformed_table} LIKE {table}");

	if columns.is_empty() {
		// Missing source table: issue the copy anyway so the backend
		// reports the absence in its own words.
		match sqlx::query(&create_table).execute(pool).await {
			Ok(_) => {
				// The table appeared between the two probes; start over.
				drop_table_if_exists(pool, transformed_table).await?;
				return Err(DbError::UnknownTable(table.to_string()));
			},
			Err(err) => return Err(err.into()),
		}
	}

	let (cols_to_copy, excluded_present): (Vec<ColumnSpec>, Vec<ColumnSpec>) = columns
		.into_iter()
		.partition(|column| !contains_ignore_case(excluded_columns, &column.name));
	if cols_to_copy.is_empty() {
		return Err(DbError::AllColumnsExcluded(table.to_string()));
	}

	drop_table_if_exists(pool, transformed_table).await?;
	sqlx::query(&create_table).execute(pool).await?;

	// LIKE copies the full schema; excluded columns must not exist on the
	// transformed table at all, so a projection naming one fails in the
	// backend's own words
	for column in &excluded_present {
		sqlx::query(&format!(
			"ALTER TABLE {transformed_table} DROP COLUMN {}",
			column.name
		))
		.execute(pool)
		.await?;
	}

	let column_list = cols_to_copy.iter().map(|column| column.name.as_str()).join(", ");
	let select = format!("SELECT {column_list} FROM {table}");
	let mut rows = sqlx::query(&select).fetch(pool);

	let mut batch: Vec<Vec<Value>> = Vec::with_capacity(INSERT_BATCH_SIZE);
	while let Some(row) = rows.try_next().await? {
		let Some(values) = transform_row(&row, &cols_to_copy, transforms)? else {
			continue;
		};
		batch.push(values);

		if batch.len() == INSERT_BATCH_SIZE {
			flush_batch(pool, transformed_table, cols_to_copy.len(), std::mem::take(&mut batch)).await?;
			if cancel.is_cancelled() {
				return Err(DbError::Cancelled);
			}
		}
	}
	flush_batch(pool, transformed_table, cols_to_copy.len(), batch).await?;

	Ok(())
}

fn transform_row(
	row: &MySqlRow,
	columns: &[ColumnSpec],
	transforms: Option<&TableTransform>,
) -> Result<Option<Vec<Value>>, DbError> {
	let mut values = Vec::with_capacity(columns.len());
	for (index, column) in columns.iter().enumerate() {
		let value = Value::decode(row, index, column.kind)?;
		let value = match transforms.and_then(|transforms| transforms.get(&column.name)) {
			Some(transform) => match transform(value).map_err(DbError::Transform)? {
				Transformed::Replace(value) => value,
				Transformed::Drop => return Ok(None),
			},
			None => value,
		};
		values.push(value);
	}
	Ok(Some(values))
}

async fn flush_batch(
	pool: &MySqlPool,
	table: &str,
	column_count: usize,
	batch: Vec<Vec<Value>>,
) -> Result<(), DbError> {
	if batch.is_empty() {
		return Ok(());
	}

	let row_placeholders = format!("({})", std::iter::repeat_n("?", column_count).join(", "));
	let insert = format!(
		"INSERT INTO {} VALUES {}",
		table,
		std::iter::repeat_n(row_placeholders.as_str(), batch.len()).join(", "),
	);

	let mut query = sqlx::query(&insert);
	for row in batch {
		for value in row {
			query = value.bind_to(query);
		}
	}
	query.execute(pool).await?;

	Ok(())
}

pub(crate) async fn drop_table_if_exists(pool: &MySqlPool, table: &str) -> Result<(), DbError> {
	sqlx::query(&format!("DROP TABLE IF EXISTS {table}"))
		.execute(pool)
		.await?;
	Ok(())
}
