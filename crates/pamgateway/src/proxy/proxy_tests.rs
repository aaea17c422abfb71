use http_body_util::BodyExt;

use super::*;
use crate::http::handler_fn;
use crate::policy::{ComputationLevel, StaticComputationPolicy};

fn request(uri: &str) -> Request {
	::http::Request::builder()
		.uri(uri)
		.body(Body::empty())
		.unwrap()
}

async fn body_string(response: Response) -> String {
	let bytes = response.into_body().collect().await.unwrap().to_bytes();
	String::from_utf8(bytes.to_vec()).unwrap()
}

fn registry_with_both_levels() -> Arc<StaticComputationPolicy> {
	let policy = Arc::new(StaticComputationPolicy::new());
	policy.register(
		"/",
		ComputationLevel::RawData,
		handler_fn(|_request| async { Response::new(Body::from("raw")) }),
	);
	policy.register(
		"/",
		ComputationLevel::CanCompute,
		handler_fn(|_request| async { Response::new(Body::from("full")) }),
	);
	policy
}

#[tokio::test]
async fn unparseable_policy_is_a_500_with_the_error_text() {
	let server = PolicyAwareServer::new(Arc::new(StaticComputationPolicy::new()));

	let response = server.handle(request("/")).await;
	assert_eq!(response.status(), ::http::StatusCode::INTERNAL_SERVER_ERROR);
	assert!(body_string(response).await.contains("requester id"));
}

#[tokio::test]
async fn unknown_paths_report_no_computation_with_an_empty_body() {
	let server = PolicyAwareServer::new(Arc::new(StaticComputationPolicy::new()));

	let response = server
		.handle(request(
			"/?requester_id=alice&preferred_processing_location=remote&has_all_required_data=true",
		))
		.await;

	assert_eq!(response.status(), ::http::StatusCode::OK);
	assert_eq!(
		response.headers().get(COMPUTATION_LEVEL_HEADER).unwrap(),
		"NoComputation"
	);
	assert!(body_string(response).await.is_empty());
}

#[tokio::test]
async fn remote_preference_is_served_the_full_result() {
	let server = PolicyAwareServer::new(registry_with_both_levels());

	let response = server
		.handle(request(
			"/?requester_id=alice&preferred_processing_location=remote&has_all_required_data=true",
		))
		.await;

	assert_eq!(
		response.headers().get(COMPUTATION_LEVEL_HEADER).unwrap(),
		"CanCompute"
	);
	assert_eq!(body_string(response).await, "full");
}

#[tokio::test]
async fn local_preference_is_served_raw_data() {
	let server = PolicyAwareServer::new(registry_with_both_levels());

	let response = server
		.handle(request(
			"/?requester_id=alice&preferred_processing_location=local&has_all_required_data=false",
		))
		.await;

	assert_eq!(
		response.headers().get(COMPUTATION_LEVEL_HEADER).unwrap(),
		"RawData"
	);
	assert_eq!(body_string(response).await, "raw");
}

#[tokio::test]
async fn the_stamp_overrides_a_handler_set_level() {
	let policy = Arc::new(StaticComputationPolicy::new());
	policy.register(
		"/",
		ComputationLevel::CanCompute,
		handler_fn(|_request| async {
			::http::Response::builder()
				.header(COMPUTATION_LEVEL_HEADER, "RawData")
				.body(Body::from("full"))
				.unwrap()
		}),
	);
	let server = PolicyAwareServer::new(policy);

	let response = server
		.handle(request(
			"/?requester_id=alice&preferred_processing_location=remote&has_all_required_data=true",
		))
		.await;

	assert_eq!(
		response.headers().get(COMPUTATION_LEVEL_HEADER).unwrap(),
		"CanCompute"
	);
}
