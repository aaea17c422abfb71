use std::sync::Arc;

use axum::Router;
use tracing::debug;

use crate::http::{Body, COMPUTATION_LEVEL_HEADER, Request, Response, level_header_value};
use crate::policy::{ComputationPolicy, RequestPolicy};

#[cfg(test)]
#[path = "proxy_tests.rs"]
mod tests;

/// Server-side middleware: parses the request policy off every inbound
/// request, resolves the node's computation policy for the path, stamps the
/// outcome on the response, and delegates to the selected handler.
///
/// The middleware itself is stateless; all serving state lives in the
/// computation policy it was built with.
#[derive(Clone)]
pub struct PolicyAwareServer {
	policy: Arc<dyn ComputationPolicy>,
}

impl PolicyAwareServer {
	pub fn new(policy: Arc<dyn ComputationPolicy>) -> Self {
		PolicyAwareServer { policy }
	}

	pub async fn handle(&self, request: Request) -> Response {
		let path = request.uri().path().to_string();
		debug!(%path, "handling request");

		let policy = match RequestPolicy::from_request(&request) {
			Ok(policy) => policy,
			Err(err) => return error_response(err.to_string()),
		};

		let resolution = self
			.policy
			.resolve(&path, policy.preferred_processing_location);
		debug!(%path, level = %resolution.level, "resolved computation level");

		let mut response = match resolution.handler {
			Some(handler) => handler.serve(request).await,
			None => Response::new(Body::empty()),
		};
		response
			.headers_mut()
			.insert(COMPUTATION_LEVEL_HEADER, level_header_value(resolution.level));
		response
	}

	/// Mount the middleware as the fallback of an axum router so it serves
	/// every path.
	pub fn into_router(self) -> Router {
		Router::new().fallback(move |request: Request| {
			let server = self.clone();
			async move { server.handle(request).await }
		})
	}
}

fn error_response(message: String) -> Response {
	let mut response = Response::new(Body::from(message));
	*response.status_mut() = ::http::StatusCode::INTERNAL_SERVER_ERROR;
	response
}
