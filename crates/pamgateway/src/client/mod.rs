use std::sync::Arc;

use bytes::Bytes;
use http_body_util::BodyExt;
use tracing::debug;

use crate::http::{
	Body, COMPUTATION_LEVEL_HEADER, HttpError, PamRequest, PamResponse, Request, Response,
	level_header_value,
};
use crate::policy::{ComputationPolicy, ProcessingLocation};

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;

#[derive(thiserror::Error, Debug)]
pub enum ClientError {
	#[error(transparent)]
	Envelope(#[from] HttpError),
	#[error("request body could not be buffered: {0}")]
	Body(axum_core::Error),
	#[error("invalid request URL: {0}")]
	Url(#[from] url::ParseError),
	#[error(transparent)]
	Transport(#[from] reqwest::Error),
}

/// Client-side middleware: serves a request with a local handler when the
/// request policy allows it, otherwise forwards it over the wire and lets
/// the receiver decide.
pub struct PrivacyAwareClient {
	client: reqwest::Client,
	computation_policy: Arc<dyn ComputationPolicy>,
}

impl PrivacyAwareClient {
	pub fn new(computation_policy: Arc<dyn ComputationPolicy>) -> Self {
		PrivacyAwareClient {
			client: reqwest::Client::new(),
			computation_policy,
		}
	}

	/// Send a PAM request.
	///
	/// The request short-circuits to a local handler when the policy
	/// prefers local processing, declares that all required data is
	/// present, and the local registry offers any computation for the path.
	/// The registry is consulted with a `Remote` preference so a
	/// full-result handler wins the tie. On the short-circuit path no
	/// network I/O happens and the handler's response is returned as
	/// recorded, whatever its status.
	pub async fn send(&self, pam_request: PamRequest) -> Result<PamResponse, ClientError> {
		let PamRequest { policy, mut request } = pam_request;
		policy.apply_to_request(&mut request)?;

		let path = request.uri().path().to_string();
		let resolution = self
			.computation_policy
			.resolve(&path, ProcessingLocation::Remote);

		let prefer_local = policy.preferred_processing_location == ProcessingLocation::Local;
		if prefer_local && policy.has_all_required_data {
			if let Some(handler) = resolution.handler {
				debug!(%path, level = %resolution.level, "serving request with local handler");
				let mut response = handler.serve(request).await;
				response
					.headers_mut()
					.insert(COMPUTATION_LEVEL_HEADER, level_header_value(resolution.level));
				return Ok(PamResponse::from_response(response)?);
			}
		}

		debug!(%path, "forwarding request");
		let response = self.round_trip(request).await?;
		Ok(PamResponse::from_response(response)?)
	}

	async fn round_trip(&self, request: Request) -> Result<Response, ClientError> {
		let (parts, body) = request.into_parts();
		let bytes: Bytes = body.collect().await.map_err(ClientError::Body)?.to_bytes();
		let url = reqwest::Url::parse(&parts.uri.to_string())?;

		let reply = self
			.client
			.request(parts.method, url)
			.headers(parts.headers)
			.body(bytes)
			.send()
			.await?;

		let status = reply.status();
		let headers = reply.headers().clone();
		let body = reply.bytes().await?;

		let mut response = Response::new(Body::from(body));
		*response.status_mut() = status;
		*response.headers_mut() = headers;
		Ok(response)
	}
}
