use std::future::Future;
use std::sync::Arc;

use ::http::uri::{PathAndQuery, Uri};
use ::http::{HeaderName, HeaderValue};
use async_trait::async_trait;
use url::form_urlencoded;

use crate::policy::request::PolicyParseError;
use crate::policy::{ComputationLevel, ParseLevelError, RequestPolicy};

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;

pub type Body = axum_core::body::Body;
pub type Request = ::http::Request<Body>;
pub type Response = ::http::Response<Body>;

/// Response header carrying the computation level a request was served at.
/// Its absence on a PAM response is a protocol error.
pub const COMPUTATION_LEVEL_HEADER: HeaderName = HeaderName::from_static("computation_level");

#[derive(thiserror::Error, Debug)]
pub enum HttpError {
	#[error("the response did not specify a computation level")]
	MissingComputationLevel,
	#[error("the response computation level is not valid UTF-8")]
	InvalidHeaderEncoding,
	#[error(transparent)]
	InvalidComputationLevel(#[from] ParseLevelError),
	#[error("rebuilding the request URI failed: {0}")]
	InvalidUri(String),
}

/// A request handler registered in a computation-policy registry, invoked
/// by the server middleware or directly by the client's short-circuit path.
#[async_trait]
pub trait Handler: Send + Sync {
	async fn serve(&self, request: Request) -> Response;
}

struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> Handler for FnHandler<F>
where
	F: Fn(Request) -> Fut + Send + Sync,
	Fut: Future<Output = Response> + Send,
{
	async fn serve(&self, request: Request) -> Response {
		(self.0)(request).await
	}
}

/// Adapt an async closure into a shareable [`Handler`].
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn Handler>
where
	F: Fn(Request) -> Fut + Send + Sync + 'static,
	Fut: Future<Output = Response> + Send + 'static,
{
	Arc::new(FnHandler(f))
}

/// First value of query parameter `key`, if present.
pub fn get_param(request: &Request, key: &str) -> Option<String> {
	form_urlencoded::parse(request.uri().query().unwrap_or("").as_bytes())
		.find(|(k, _)| k == key)
		.map(|(_, v)| v.into_owned())
}

/// Set query parameter `key` to `value`, replacing any existing values.
pub fn set_param(request: &mut Request, key: &str, value: &str) -> Result<(), HttpError> {
	let mut pairs: Vec<(String, String)> = query_pairs(request)
		.into_iter()
		.filter(|(k, _)| k.as_str() != key)
		.collect();
	pairs.push((key.to_string(), value.to_string()));
	replace_query(request, pairs)
}

/// Append a value for query parameter `key`, keeping existing values.
pub fn add_param(request: &mut Request, key: &str, value: &str) -> Result<(), HttpError> {
	let mut pairs = query_pairs(request);
	pairs.push((key.to_string(), value.to_string()));
	replace_query(request, pairs)
}

/// Remove every value of query parameter `key`.
pub fn del_param(request: &mut Request, key: &str) -> Result<(), HttpError> {
	let pairs: Vec<(String, String)> = query_pairs(request)
		.into_iter()
		.filter(|(k, _)| k.as_str() != key)
		.collect();
	replace_query(request, pairs)
}

fn query_pairs(request: &Request) -> Vec<(String, String)> {
	form_urlencoded::parse(request.uri().query().unwrap_or("").as_bytes())
		.into_owned()
		.collect()
}

fn replace_query(request: &mut Request, pairs: Vec<(String, String)>) -> Result<(), HttpError> {
	let query = form_urlencoded::Serializer::new(String::new())
		.extend_pairs(pairs)
		.finish();
	let path_and_query = if query.is_empty() {
		request.uri().path().to_string()
	} else {
		format!("{}?{}", request.uri().path(), query)
	};

	let mut parts = request.uri().clone().into_parts();
	parts.path_and_query = Some(
		path_and_query
			.parse::<PathAndQuery>()
			.map_err(|err| HttpError::InvalidUri(err.to_string()))?,
	);
	*request.uri_mut() =
		Uri::from_parts(parts).map_err(|err| HttpError::InvalidUri(err.to_string()))?;
	Ok(())
}

/// A transport request paired with the requester's processing preferences.
pub struct PamRequest {
	pub policy: RequestPolicy,
	pub request: Request,
}

impl PamRequest {
	pub fn new(policy: RequestPolicy, request: Request) -> Self {
		PamRequest { policy, request }
	}

	/// Parse the policy out of the request's own query parameters.
	pub fn from_request(request: Request) -> Result<Self, PolicyParseError> {
		let policy = RequestPolicy::from_request(&request)?;
		Ok(PamRequest { policy, request })
	}

	pub fn get_param(&self, key: &str) -> Option<String> {
		get_param(&self.request, key)
	}

	pub fn set_param(&mut self, key: &str, value: &str) -> Result<(), HttpError> {
		set_param(&mut self.request, key, value)
	}

	pub fn add_param(&mut self, key: &str, value: &str) -> Result<(), HttpError> {
		add_param(&mut self.request, key, value)
	}

	pub fn del_param(&mut self, key: &str) -> Result<(), HttpError> {
		del_param(&mut self.request, key)
	}
}

/// A transport response tagged with the computation level it was served at.
#[derive(Debug)]
pub struct PamResponse {
	pub computation_level: ComputationLevel,
	pub response: Response,
}

impl PamResponse {
	/// Read the `computation_level` header off a response.
	pub fn from_response(response: Response) -> Result<Self, HttpError> {
		let value = response
			.headers()
			.get(COMPUTATION_LEVEL_HEADER)
			.ok_or(HttpError::MissingComputationLevel)?;
		let value = value
			.to_str()
			.map_err(|_| HttpError::InvalidHeaderEncoding)?;
		let computation_level = value.parse::<ComputationLevel>()?;
		Ok(PamResponse {
			computation_level,
			response,
		})
	}
}

pub(crate) fn level_header_value(level: ComputationLevel) -> HeaderValue {
	HeaderValue::from_static(level.as_str())
}
