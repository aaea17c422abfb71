use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use sqlx::Row;
use sqlx::mysql::{MySql, MySqlArguments, MySqlRow};

#[cfg(test)]
#[path = "value_tests.rs"]
mod tests;

type MySqlQuery<'q> = sqlx::query::Query<'q, MySql, MySqlArguments>;

/// Category a backend column is scanned and bound as, derived from its
/// declared type in `information_schema`. Temporal declarations keep their
/// exact flavour so each decodes with the right driver type, but they all
/// surface to transforms as [`Value::Time`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ColumnKind {
	Int8,
	Int16,
	Int32,
	Int64,
	F32,
	F64,
	Text,
	Bytes,
	Date,
	DateTime,
	Time,
	Unknown,
}

impl ColumnKind {
	/// Map a declared MySQL type name onto a scan/bind category.
	pub(crate) fn from_data_type(data_type: &str) -> ColumnKind {
		match data_type.to_ascii_lowercase().as_str() {
			"tinyint" => ColumnKind::Int8,
			"smallint" | "year" => ColumnKind::Int16,
			"mediumint" | "int" | "integer" => ColumnKind::Int32,
			"bigint" => ColumnKind::Int64,
			"float" => ColumnKind::F32,
			"double" => ColumnKind::F64,
			"varchar" | "char" | "text" | "tinytext" | "mediumtext" | "longtext" | "enum" | "set" => {
				ColumnKind::Text
			},
			"blob" | "tinyblob" | "mediumblob" | "longblob" | "binary" | "varbinary" => {
				ColumnKind::Bytes
			},
			"date" => ColumnKind::Date,
			"datetime" | "timestamp" => ColumnKind::DateTime,
			"time" => ColumnKind::Time,
			_ => ColumnKind::Unknown,
		}
	}
}

/// A scanned backend value, tagged by declared-type category. Transforms
/// see and produce these; the schema is only known at runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
	Null,
	Int8(i8),
	Int16(i16),
	Int32(i32),
	Int64(i64),
	F32(f32),
	F64(f64),
	Text(String),
	Bytes(Vec<u8>),
	Time(NaiveDateTime),
}

/// Outcome of applying a column transform to one value.
#[derive(Debug)]
pub enum Transformed {
	/// Store this value in place of the original.
	Replace(Value),
	/// Leave the whole row out of the transformed table.
	Drop,
}

/// Per-column value transform. An error aborts the table build.
pub type TransformFn = Arc<dyn Fn(Value) -> anyhow::Result<Transformed> + Send + Sync>;

impl Value {
	pub(crate) fn decode(row: &MySqlRow, index: usize, kind: ColumnKind) -> Result<Value, sqlx::Error> {
		Ok(match kind {
			ColumnKind::Int8 => row
				.try_get::<Option<i8>, _>(index)?
				.map(Value::Int8)
				.unwrap_or(Value::Null),
			ColumnKind::Int16 => row
				.try_get::<Option<i16>, _>(index)?
				.map(Value::Int16)
				.unwrap_or(Value::Null),
			ColumnKind::Int32 => row
				.try_get::<Option<i32>, _>(index)?
				.map(Value::Int32)
				.unwrap_or(Value::Null),
			ColumnKind::Int64 => row
				.try_get::<Option<i64>, _>(index)?
				.map(Value::Int64)
				.unwrap_or(Value::Null),
			ColumnKind::F32 => row
				.try_get::<Option<f32>, _>(index)?
				.map(Value::F32)
				.unwrap_or(Value::Null),
			ColumnKind::F64 => row
				.try_get::<Option<f64>, _>(index)?
				.map(Value::F64)
				.unwrap_or(Value::Null),
			ColumnKind::Text | ColumnKind::Unknown => row
				.try_get::<Option<String>, _>(index)?
				.map(Value::Text)
				.unwrap_or(Value::Null),
			ColumnKind::Bytes => row
				.try_get::<Option<Vec<u8>>, _>(index)?
				.map(Value::Bytes)
				.unwrap_or(Value::Null),
			ColumnKind::Date => row
				.try_get::<Option<NaiveDate>, _>(index)?
				.map(|date| Value::Time(date.and_time(NaiveTime::MIN)))
				.unwrap_or(Value::Null),
			ColumnKind::DateTime => row
				.try_get::<Option<NaiveDateTime>, _>(index)?
				.map(Value::Time)
				.unwrap_or(Value::Null),
			ColumnKind::Time => row
				.try_get::<Option<NaiveTime>, _>(index)?
				.map(|time| Value::Time(NaiveDateTime::new(NaiveDate::default(), time)))
				.unwrap_or(Value::Null),
		})
	}

	/// Bind this value as the next `?` argument. The destination column
	/// keeps its own declared type; MySQL narrows temporal values on
	/// insert.
	pub(crate) fn bind_to(self, query: MySqlQuery<'_>) -> MySqlQuery<'_> {
		match self {
			Value::Null => query.bind(Option::<String>::None),
			Value::Int8(v) => query.bind(v),
			Value::Int16(v) => query.bind(v),
			Value::Int32(v) => query.bind(v),
			Value::Int64(v) => query.bind(v),
			Value::F32(v) => query.bind(v),
			Value::F64(v) => query.bind(v),
			Value::Text(v) => query.bind(v),
			Value::Bytes(v) => query.bind(v),
			Value::Time(v) => query.bind(v),
		}
	}
}
