use std::str::FromStr;

use serde::Deserialize;

use crate::http::{HttpError, Request, set_param};
use crate::policy::ProcessingLocation;

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;

pub const REQUESTER_ID_PARAM: &str = "requester_id";
pub const PREFERRED_LOCATION_PARAM: &str = "preferred_processing_location";
pub const HAS_ALL_REQUIRED_DATA_PARAM: &str = "has_all_required_data";

#[derive(thiserror::Error, Debug)]
pub enum PolicyParseError {
	#[error("no requester id was provided")]
	MissingRequesterId,
	#[error("no preferred processing location was provided")]
	MissingPreferredLocation,
	#[error("no \"has all required data\" field was provided")]
	MissingHasAllRequiredData,
	#[error("cannot parse {0:?} as a processing location")]
	InvalidLocation(String),
	#[error("cannot parse {0:?} as a bool")]
	InvalidBool(String),
	#[error("malformed request policy parameters: {0}")]
	Malformed(String),
}

/// Requester-supplied processing preferences carried on every PAM request
/// as URL query parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestPolicy {
	/// Identity of the principal the request is served for. Taken as
	/// asserted; the middleware performs no authentication.
	pub requester_id: String,
	pub preferred_processing_location: ProcessingLocation,
	/// Whether the requester holds all data the request needs, making a
	/// local short-circuit possible.
	pub has_all_required_data: bool,
}

#[derive(Deserialize, Default)]
struct RawParams {
	requester_id: Option<String>,
	preferred_processing_location: Option<String>,
	has_all_required_data: Option<String>,
}

impl RequestPolicy {
	pub fn new(
		requester_id: impl Into<String>,
		preferred_processing_location: ProcessingLocation,
		has_all_required_data: bool,
	) -> Self {
		RequestPolicy {
			requester_id: requester_id.into(),
			preferred_processing_location,
			has_all_required_data,
		}
	}

	/// The three wire parameters in their canonical encoding.
	pub fn params(&self) -> [(&'static str, String); 3] {
		[
			(REQUESTER_ID_PARAM, self.requester_id.clone()),
			(
				PREFERRED_LOCATION_PARAM,
				self.preferred_processing_location.as_str().to_string(),
			),
			(
				HAS_ALL_REQUIRED_DATA_PARAM,
				self.has_all_required_data.to_string(),
			),
		]
	}

	/// Write the policy into the request's query string, replacing any
	/// previous values of the three parameters.
	pub fn apply_to_request(&self, request: &mut Request) -> Result<(), HttpError> {
		for (key, value) in self.params() {
			set_param(request, key, &value)?;
		}
		Ok(())
	}

	/// Decode a policy from a request's query string.
	pub fn from_request(request: &Request) -> Result<Self, PolicyParseError> {
		Self::from_query(request.uri().query().unwrap_or(""))
	}

	pub fn from_query(query: &str) -> Result<Self, PolicyParseError> {
		let raw: RawParams = serde_urlencoded::from_str(query)
			.map_err(|err| PolicyParseError::Malformed(err.to_string()))?;

		let requester_id = match raw.requester_id {
			Some(id) if !id.is_empty() => id,
			_ => return Err(PolicyParseError::MissingRequesterId),
		};

		let location = raw
			.preferred_processing_location
			.ok_or(PolicyParseError::MissingPreferredLocation)?;
		let preferred_processing_location = ProcessingLocation::from_str(&location)
			.map_err(|_| PolicyParseError::InvalidLocation(location))?;

		let has_all = raw
			.has_all_required_data
			.ok_or(PolicyParseError::MissingHasAllRequiredData)?;
		let has_all_required_data = match parse_bool(&has_all) {
			Some(value) => value,
			None => return Err(PolicyParseError::InvalidBool(has_all)),
		};

		Ok(RequestPolicy {
			requester_id,
			preferred_processing_location,
			has_all_required_data,
		})
	}
}

fn parse_bool(value: &str) -> Option<bool> {
	if value.eq_ignore_ascii_case("true") {
		Some(true)
	} else if value.eq_ignore_ascii_case("false") {
		Some(false)
	} else {
		None
	}
}
