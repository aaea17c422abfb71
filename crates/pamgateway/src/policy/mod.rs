use std::fmt;
use std::str::FromStr;

pub mod computation;
pub mod data;
pub mod dynamic;
pub mod group;
pub mod request;

pub use computation::{ComputationPolicy, Resolution, StaticComputationPolicy};
pub use data::{DataPolicy, PolicyError, StaticDataPolicy, TableOperations, TableTransform};
pub use dynamic::{CapabilityError, DynamicComputationPolicy};
pub use group::PrivacyGroup;
pub use request::{PolicyParseError, RequestPolicy};

/// Granularity at which a node can serve a request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComputationLevel {
	/// The node refuses to compute anything for the path.
	NoComputation,
	/// The node can hand back unprocessed data for the path.
	RawData,
	/// The node can compute the full answer for the path.
	CanCompute,
}

#[derive(thiserror::Error, Debug)]
#[error("cannot parse {0:?} as a computation level")]
pub struct ParseLevelError(pub String);

impl ComputationLevel {
	/// Fixed string form used in the `computation_level` response header.
	pub fn as_str(&self) -> &'static str {
		match self {
			ComputationLevel::NoComputation => "NoComputation",
			ComputationLevel::RawData => "RawData",
			ComputationLevel::CanCompute => "CanCompute",
		}
	}
}

impl fmt::Display for ComputationLevel {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for ComputationLevel {
	type Err = ParseLevelError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		if s.eq_ignore_ascii_case("NoComputation") {
			Ok(ComputationLevel::NoComputation)
		} else if s.eq_ignore_ascii_case("RawData") {
			Ok(ComputationLevel::RawData)
		} else if s.eq_ignore_ascii_case("CanCompute") {
			Ok(ComputationLevel::CanCompute)
		} else {
			Err(ParseLevelError(s.to_string()))
		}
	}
}

/// Caller hint for where processing should ideally happen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessingLocation {
	/// The request should ideally be executed locally and never leave the
	/// node.
	Local,
	/// The request should ideally be answered in full by the remote end.
	Remote,
}

#[derive(thiserror::Error, Debug)]
#[error("cannot parse {0:?} as a processing location")]
pub struct ParseLocationError(pub String);

impl ProcessingLocation {
	/// Lowercase wire form used in the `preferred_processing_location`
	/// query parameter.
	pub fn as_str(&self) -> &'static str {
		match self {
			ProcessingLocation::Local => "local",
			ProcessingLocation::Remote => "remote",
		}
	}
}

impl fmt::Display for ProcessingLocation {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for ProcessingLocation {
	type Err = ParseLocationError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		if s.eq_ignore_ascii_case("local") {
			Ok(ProcessingLocation::Local)
		} else if s.eq_ignore_ascii_case("remote") {
			Ok(ProcessingLocation::Remote)
		} else {
			Err(ParseLocationError(s.to_string()))
		}
	}
}
