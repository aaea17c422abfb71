use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use itertools::Itertools;
use rand::RngExt;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlQueryResult, MySqlRow};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::db::cache::{TableLocks, transformed_table_valid};
use crate::db::classify::{QueryKind, classify, render, rewrite_tables};
use crate::db::transform::{build_transformed_table, drop_table_if_exists, table_columns};
use crate::policy::RequestPolicy;
use crate::policy::data::{DataPolicy, PolicyError, TableOperations, contains_ignore_case};

mod cache;
mod classify;
mod transform;
pub mod value;

pub use value::{TransformFn, Transformed, Value};

#[cfg(test)]
#[path = "db_tests.rs"]
mod tests;

#[derive(thiserror::Error, Debug)]
pub enum DbError {
	#[error(transparent)]
	ParseFailure(#[from] sqlparser::parser::ParserError),
	#[error("cannot support SQL which both reads and writes to the database")]
	UnsupportedMixedQuery,
	#[error("unsupported query")]
	UnsupportedQuery,
	#[error("all columns of table {0:?} are excluded, cannot create transformed table")]
	AllColumnsExcluded(String),
	/// Deliberately not saying which column was rejected, so the error
	/// cannot leak what the policy hides.
	#[error("query failed")]
	QueryFailed,
	#[error("table {0:?} does not exist")]
	UnknownTable(String),
	#[error("no creation or modification time could be found for table {0:?}")]
	NoTableTimestamps(String),
	#[error(transparent)]
	Policy(#[from] PolicyError),
	#[error("transform failed: {0}")]
	Transform(anyhow::Error),
	#[error("operation cancelled")]
	Cancelled,
	#[error(transparent)]
	Backend(#[from] sqlx::Error),
}

/// Connection and caching configuration for a [`MySqlPrivateDatabase`].
///
/// Timestamps read back from `information_schema` are compared against the
/// data policy's UTC clock, so the backend's session time zone is expected
/// to be UTC.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
	pub host: String,
	pub port: u16,
	pub user: String,
	pub password: String,
	pub database: String,
	/// Reuse transformed tables across requests, guarded by the freshness
	/// validator. When disabled every read rebuilds an ephemeral table
	/// which is dropped once the rows have been handed back.
	pub cache_tables: bool,
	pub max_connections: u32,
	pub idle_timeout: Duration,
	pub max_lifetime: Duration,
}

impl DatabaseConfig {
	pub fn new(
		host: impl Into<String>,
		port: u16,
		user: impl Into<String>,
		password: impl Into<String>,
		database: impl Into<String>,
	) -> Self {
		DatabaseConfig {
			host: host.into(),
			port,
			user: user.into(),
			password: password.into(),
			database: database.into(),
			cache_tables: false,
			max_connections: 100,
			idle_timeout: Duration::from_secs(600),
			max_lifetime: Duration::from_secs(20),
		}
	}
}

/// Interception layer over a MySQL backend. Reads are answered from
/// per-requester transformed tables with the resolved data policy applied;
/// writes are refused outright when they touch an excluded column.
pub struct MySqlPrivateDatabase {
	pool: MySqlPool,
	database: String,
	cache_tables: bool,
	data_policy: Arc<dyn DataPolicy>,
	table_locks: TableLocks,
}

impl MySqlPrivateDatabase {
	/// Open a bounded connection pool against the configured backend.
	pub async fn connect(
		config: DatabaseConfig,
		data_policy: Arc<dyn DataPolicy>,
	) -> Result<Self, DbError> {
		let options = MySqlConnectOptions::new()
			.host(&config.host)
			.port(config.port)
			.username(&config.user)
			.password(&config.password)
			.database(&config.database);
		let pool = MySqlPoolOptions::new()
			.max_connections(config.max_connections)
			.idle_timeout(config.idle_timeout)
			.max_lifetime(config.max_lifetime)
			.connect_with(options)
			.await?;
		info!(host = %config.host, database = %config.database, "connected to backend");

		Ok(MySqlPrivateDatabase {
			pool,
			database: config.database,
			cache_tables: config.cache_tables,
			data_policy,
			table_locks: TableLocks::default(),
		})
	}

	/// Run a query for `request_policy`'s requester and collect every row.
	pub async fn query(
		&self,
		query: &str,
		request_policy: &RequestPolicy,
		args: Vec<Value>,
	) -> Result<Vec<MySqlRow>, DbError> {
		self
			.query_scoped(&CancellationToken::new(), query, request_policy, args)
			.await
	}

	/// [`query`](Self::query) with a cancellation scope; an in-flight table
	/// rebuild aborts after its current batch.
	pub async fn query_scoped(
		&self,
		cancel: &CancellationToken,
		query: &str,
		request_policy: &RequestPolicy,
		args: Vec<Value>,
	) -> Result<Vec<MySqlRow>, DbError> {
		let (sql, ephemeral) = self.prepare(cancel, query, request_policy).await?;
		let result = {
			let mut prepared = sqlx::query(&sql);
			for arg in args {
				prepared = arg.bind_to(prepared);
			}
			prepared.fetch_all(&self.pool).await.map_err(DbError::from)
		};
		self.cleanup(&ephemeral).await;
		result
	}

	/// Run a query and hand back the first row, if any.
	pub async fn query_row(
		&self,
		query: &str,
		request_policy: &RequestPolicy,
		args: Vec<Value>,
	) -> Result<Option<MySqlRow>, DbError> {
		self
			.query_row_scoped(&CancellationToken::new(), query, request_policy, args)
			.await
	}

	pub async fn query_row_scoped(
		&self,
		cancel: &CancellationToken,
		query: &str,
		request_policy: &RequestPolicy,
		args: Vec<Value>,
	) -> Result<Option<MySqlRow>, DbError> {
		let (sql, ephemeral) = self.prepare(cancel, query, request_policy).await?;
		let result = {
			let mut prepared = sqlx::query(&sql);
			for arg in args {
				prepared = arg.bind_to(prepared);
			}
			prepared
				.fetch_optional(&self.pool)
				.await
				.map_err(DbError::from)
		};
		self.cleanup(&ephemeral).await;
		result
	}

	/// Execute a statement for `request_policy`'s requester.
	pub async fn exec(
		&self,
		query: &str,
		request_policy: &RequestPolicy,
		args: Vec<Value>,
	) -> Result<MySqlQueryResult, DbError> {
		self
			.exec_scoped(&CancellationToken::new(), query, request_policy, args)
			.await
	}

	pub async fn exec_scoped(
		&self,
		cancel: &CancellationToken,
		query: &str,
		request_policy: &RequestPolicy,
		args: Vec<Value>,
	) -> Result<MySqlQueryResult, DbError> {
		let (sql, ephemeral) = self.prepare(cancel, query, request_policy).await?;
		let result = {
			let mut prepared = sqlx::query(&sql);
			for arg in args {
				prepared = arg.bind_to(prepared);
			}
			prepared.execute(&self.pool).await.map_err(DbError::from)
		};
		self.cleanup(&ephemeral).await;
		result
	}

	/// Verify the backend connection is alive.
	pub async fn ping(&self) -> Result<(), DbError> {
		sqlx::query("SELECT 1").execute(&self.pool).await?;
		Ok(())
	}

	pub async fn close(&self) {
		self.pool.close().await;
	}

	/// Classify the query, enforce the data policy, and return the SQL to
	/// execute plus any ephemeral tables to drop once the rows have been
	/// consumed.
	async fn prepare(
		&self,
		cancel: &CancellationToken,
		query: &str,
		request_policy: &RequestPolicy,
	) -> Result<(String, Vec<String>), DbError> {
		let mut parsed = classify(query)?;
		let tables: Vec<String> = parsed.tables.iter().cloned().unique().collect();
		if tables.is_empty() {
			// Nothing references the store, so there is nothing to enforce
			return Ok((query.to_string(), Vec::new()));
		}
		let operations = self.data_policy.resolve(&request_policy.requester_id)?;

		match parsed.kind {
			QueryKind::Read => {
				let mut mapping = HashMap::new();
				let mut ephemeral = Vec::new();

				for table in tables {
					let mut transformed = format!("transformed_{}_{}", request_policy.requester_id, table);
					let built = if self.cache_tables {
						self
							.ensure_cached(cancel, &table, &transformed, &operations)
							.await
					} else {
						// A random suffix isolates concurrent requests from
						// each other's ephemeral tables
						transformed = format!("{}{}", transformed, rand::rng().random_range(0..100_000));
						ephemeral.push(transformed.clone());
						build_transformed_table(
							&self.pool,
							&self.database,
							&table,
							&transformed,
							operations.transforms_for(&table),
							operations.excluded_for(&table),
							cancel,
						)
						.await
					};
					if let Err(err) = built {
						self.cleanup(&ephemeral).await;
						return Err(err);
					}
					mapping.insert(table, transformed);
				}

				rewrite_tables(&mut parsed.statements, &mapping);
				let rewritten = render(&parsed.statements);
				debug!(requester = %request_policy.requester_id, query = %rewritten, "rewrote read");
				Ok((rewritten, ephemeral))
			},
			QueryKind::Write => {
				for table in &tables {
					let excluded = operations.excluded_for(table);
					if excluded.is_empty() {
						continue;
					}
					let columns = table_columns(&self.pool, &self.database, table).await?;
					if columns
						.iter()
						.any(|column| contains_ignore_case(excluded, &column.name))
					{
						return Err(DbError::QueryFailed);
					}
				}
				Ok((query.to_string(), Vec::new()))
			},
		}
	}

	/// Reuse or rebuild the cached transformed table for `table`, holding
	/// the per-source-table mutex for the whole check-then-build window.
	async fn ensure_cached(
		&self,
		cancel: &CancellationToken,
		table: &str,
		transformed: &str,
		operations: &TableOperations,
	) -> Result<(), DbError> {
		let lock = self.table_locks.get(table);
		let _guard = tokio::select! {
			guard = lock.lock() => guard,
			_ = cancel.cancelled() => return Err(DbError::Cancelled),
		};

		if transformed_table_valid(
			&self.pool,
			&self.database,
			table,
			transformed,
			self.data_policy.last_updated(),
		)
		.await?
		{
			debug!(%table, "transformed table is fresh, skipping rebuild");
			return Ok(());
		}

		build_transformed_table(
			&self.pool,
			&self.database,
			table,
			transformed,
			operations.transforms_for(table),
			operations.excluded_for(table),
			cancel,
		)
		.await
	}

	async fn cleanup(&self, ephemeral: &[String]) {
		for table in ephemeral {
			if let Err(err) = drop_table_if_exists(&self.pool, table).await {
				warn!(%table, %err, "could not drop ephemeral transformed table");
			}
		}
	}
}
