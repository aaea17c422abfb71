use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, Utc};
use parking_lot::Mutex;
use sqlx::mysql::MySqlPool;
use tracing::warn;

use crate::db::DbError;

/// Per-source-table rebuild locks, created lazily and kept for the process
/// lifetime. The outer lock is held only long enough to insert or clone an
/// entry; rebuilds for the same source table serialize on the inner mutex
/// while independent tables rebuild in parallel.
#[derive(Default)]
pub(crate) struct TableLocks {
	inner: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl TableLocks {
	pub(crate) fn get(&self, table: &str) -> Arc<tokio::sync::Mutex<()>> {
		let mut locks = self.inner.lock();
		locks.entry(table.to_string()).or_default().clone()
	}
}

/// Whether the transformed table for `table` is fresh enough to reuse: its
/// creation time must beat both the source table's last modification and
/// the data policy's last update.
pub(crate) async fn transformed_table_valid(
	pool: &MySqlPool,
	database: &str,
	table: &str,
	transformed_table: &str,
	policy_updated: DateTime<Utc>,
) -> Result<bool, DbError> {
	let source = sqlx::query_as::<_, (Option<NaiveDateTime>, Option<NaiveDateTime>)>(
		"SELECT update_time, create_time FROM information_schema.tables \
		 WHERE table_schema = ? AND table_name = ?",
	)
	.bind(database)
	.bind(table)
	.fetch_optional(pool)
	.await?;

	let (update_time, create_time) =
		source.ok_or_else(|| DbError::UnknownTable(table.to_string()))?;
	let source_modified = update_time
		.or(create_time)
		.ok_or_else(|| DbError::NoTableTimestamps(table.to_string()))?;

	let transform_created = sqlx::query_as::<_, (Option<NaiveDateTime>,)>(
		"SELECT create_time FROM information_schema.tables \
		 WHERE table_schema = ? AND table_name = ?",
	)
	.bind(database)
	.bind(transformed_table)
	.fetch_optional(pool)
	.await?;

	let transform_created = match transform_created {
		Some((Some(created),)) => created,
		Some((None,)) => {
			warn!(table = %transformed_table, "transformed table has no creation time, rebuilding");
			return Ok(false);
		},
		None => return Ok(false),
	};

	Ok(transform_created > source_modified && transform_created > policy_updated.naive_utc())
}
