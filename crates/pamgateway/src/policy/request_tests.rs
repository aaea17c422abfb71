use assert_matches::assert_matches;

use super::*;
use crate::http::{Body, get_param};

fn request(uri: &str) -> Request {
	::http::Request::builder()
		.uri(uri)
		.body(Body::empty())
		.unwrap()
}

#[test]
fn round_trips_through_query_parameters() {
	let policy = RequestPolicy::new("alice", ProcessingLocation::Local, true);
	let mut request = request("http://example.com/data?limit=10");
	policy.apply_to_request(&mut request).unwrap();

	let decoded = RequestPolicy::from_request(&request).unwrap();
	assert_eq!(decoded, policy);
	// Caller-supplied parameters survive the policy encoding
	assert_eq!(get_param(&request, "limit").as_deref(), Some("10"));
}

#[test]
fn emits_lowercase_location() {
	let policy = RequestPolicy::new("alice", ProcessingLocation::Remote, false);
	let mut request = request("http://example.com/");
	policy.apply_to_request(&mut request).unwrap();

	assert_eq!(
		get_param(&request, PREFERRED_LOCATION_PARAM).as_deref(),
		Some("remote")
	);
	assert_eq!(
		get_param(&request, HAS_ALL_REQUIRED_DATA_PARAM).as_deref(),
		Some("false")
	);
}

#[test]
fn applying_twice_does_not_duplicate_parameters() {
	let policy = RequestPolicy::new("alice", ProcessingLocation::Local, true);
	let mut request = request("http://example.com/");
	policy.apply_to_request(&mut request).unwrap();
	RequestPolicy::new("alice", ProcessingLocation::Remote, true)
		.apply_to_request(&mut request)
		.unwrap();

	let decoded = RequestPolicy::from_request(&request).unwrap();
	assert_eq!(
		decoded.preferred_processing_location,
		ProcessingLocation::Remote
	);
}

#[test]
fn parse_is_case_insensitive() {
	let decoded = RequestPolicy::from_query(
		"requester_id=alice&preferred_processing_location=LOCAL&has_all_required_data=True",
	)
	.unwrap();

	assert_eq!(
		decoded.preferred_processing_location,
		ProcessingLocation::Local
	);
	assert!(decoded.has_all_required_data);
}

#[test]
fn missing_requester_id_is_rejected() {
	assert_matches!(
		RequestPolicy::from_query("preferred_processing_location=local&has_all_required_data=true"),
		Err(PolicyParseError::MissingRequesterId)
	);
}

#[test]
fn empty_requester_id_is_rejected() {
	assert_matches!(
		RequestPolicy::from_query(
			"requester_id=&preferred_processing_location=local&has_all_required_data=true"
		),
		Err(PolicyParseError::MissingRequesterId)
	);
}

#[test]
fn missing_location_is_rejected() {
	assert_matches!(
		RequestPolicy::from_query("requester_id=alice&has_all_required_data=true"),
		Err(PolicyParseError::MissingPreferredLocation)
	);
}

#[test]
fn missing_data_flag_is_rejected() {
	assert_matches!(
		RequestPolicy::from_query("requester_id=alice&preferred_processing_location=local"),
		Err(PolicyParseError::MissingHasAllRequiredData)
	);
}

#[test]
fn unparseable_location_is_rejected() {
	assert_matches!(
		RequestPolicy::from_query(
			"requester_id=alice&preferred_processing_location=nearby&has_all_required_data=true"
		),
		Err(PolicyParseError::InvalidLocation(loc)) if loc == "nearby"
	);
}

#[test]
fn unparseable_bool_is_rejected() {
	assert_matches!(
		RequestPolicy::from_query(
			"requester_id=alice&preferred_processing_location=local&has_all_required_data=maybe"
		),
		Err(PolicyParseError::InvalidBool(flag)) if flag == "maybe"
	);
}
