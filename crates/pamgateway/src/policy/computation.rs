use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::http::Handler;
use crate::policy::{ComputationLevel, ProcessingLocation};

#[cfg(test)]
#[path = "computation_tests.rs"]
mod tests;

/// Outcome of resolving a path against a node's computation capabilities.
/// The handler is present exactly when the level is not `NoComputation`.
#[derive(Clone)]
pub struct Resolution {
	pub level: ComputationLevel,
	pub handler: Option<Arc<dyn Handler>>,
}

impl Resolution {
	pub(crate) fn none() -> Self {
		Resolution {
			level: ComputationLevel::NoComputation,
			handler: None,
		}
	}

	fn some(level: ComputationLevel, handler: Arc<dyn Handler>) -> Self {
		Resolution {
			level,
			handler: Some(handler),
		}
	}
}

/// Registry of the computation capabilities a node offers per request path.
pub trait ComputationPolicy: Send + Sync {
	/// Select the handler for `path`. `preferred_location` breaks the tie
	/// when both a full-result and a raw-data handler are offered: `Remote`
	/// favours the full result, `Local` favours raw data. Unknown paths
	/// resolve to `NoComputation`.
	fn resolve(&self, path: &str, preferred_location: ProcessingLocation) -> Resolution;
}

/// Computation capabilities registered up front and fixed until
/// unregistered. Registration and resolution are safe to interleave from
/// concurrent requests.
#[derive(Default)]
pub struct StaticComputationPolicy {
	capabilities: RwLock<HashMap<String, HashMap<ComputationLevel, Arc<dyn Handler>>>>,
}

impl StaticComputationPolicy {
	pub fn new() -> Self {
		Self::default()
	}

	/// Insert or replace the handler for `(path, level)`.
	pub fn register(&self, path: impl Into<String>, level: ComputationLevel, handler: Arc<dyn Handler>) {
		self
			.capabilities
			.write()
			.entry(path.into())
			.or_default()
			.insert(level, handler);
	}

	/// Remove every capability for `path`.
	pub fn unregister_all(&self, path: &str) {
		self.capabilities.write().remove(path);
	}

	/// Remove the capability for `path` at `level`, leaving others in
	/// place.
	pub fn unregister_one(&self, path: &str, level: ComputationLevel) {
		if let Some(capability) = self.capabilities.write().get_mut(path) {
			capability.remove(&level);
		}
	}
}

impl ComputationPolicy for StaticComputationPolicy {
	fn resolve(&self, path: &str, preferred_location: ProcessingLocation) -> Resolution {
		let capabilities = self.capabilities.read();
		let Some(capability) = capabilities.get(path) else {
			return Resolution::none();
		};
		resolve_tie(
			preferred_location,
			capability.get(&ComputationLevel::RawData).cloned(),
			capability.get(&ComputationLevel::CanCompute).cloned(),
		)
	}
}

/// Tie-break shared by the static and dynamic registries.
pub(crate) fn resolve_tie(
	preferred_location: ProcessingLocation,
	raw_data: Option<Arc<dyn Handler>>,
	can_compute: Option<Arc<dyn Handler>>,
) -> Resolution {
	match (can_compute, raw_data) {
		(Some(full), Some(raw)) => match preferred_location {
			ProcessingLocation::Remote => Resolution::some(ComputationLevel::CanCompute, full),
			ProcessingLocation::Local => Resolution::some(ComputationLevel::RawData, raw),
		},
		(Some(full), None) => Resolution::some(ComputationLevel::CanCompute, full),
		(None, Some(raw)) => Resolution::some(ComputationLevel::RawData, raw),
		(None, None) => Resolution::none(),
	}
}
