use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;

use crate::http::Handler;
use crate::policy::computation::{ComputationPolicy, Resolution, resolve_tie};
use crate::policy::{ComputationLevel, ProcessingLocation};

#[cfg(test)]
#[path = "dynamic_tests.rs"]
mod tests;

#[derive(thiserror::Error, Debug)]
pub enum CapabilityError {
	#[error("no capability was registered for path {0:?}")]
	UnregisteredPath(String),
	#[error("no handler was registered for path {path:?} at level {level}")]
	UnregisteredLevel { path: String, level: ComputationLevel },
}

struct DynamicHandler {
	handler: Arc<dyn Handler>,
	active: AtomicBool,
}

impl DynamicHandler {
	fn new(handler: Arc<dyn Handler>) -> Self {
		DynamicHandler {
			handler,
			active: AtomicBool::new(true),
		}
	}

	fn get(&self) -> Option<Arc<dyn Handler>> {
		self
			.active
			.load(Ordering::Acquire)
			.then(|| self.handler.clone())
	}
}

/// Computation capabilities whose availability can be toggled at runtime
/// without re-registering the handler. An inactive capability resolves as
/// if it were absent.
#[derive(Default)]
pub struct DynamicComputationPolicy {
	capabilities: RwLock<HashMap<String, HashMap<ComputationLevel, Arc<DynamicHandler>>>>,
}

impl DynamicComputationPolicy {
	pub fn new() -> Self {
		Self::default()
	}

	/// Insert or replace the handler for `(path, level)`. New registrations
	/// start active.
	pub fn register(&self, path: impl Into<String>, level: ComputationLevel, handler: Arc<dyn Handler>) {
		self
			.capabilities
			.write()
			.entry(path.into())
			.or_default()
			.insert(level, Arc::new(DynamicHandler::new(handler)));
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

	/// Mark `(path, level)` inactive: it resolves as absent until activated
	/// again. Idempotent.
	pub fn deactivate(&self, path: &str, level: ComputationLevel) -> Result<(), CapabilityError> {
		self.set_active(path, level, false)
	}

	/// Make a deactivated `(path, level)` resolvable again. Idempotent.
	pub fn activate(&self, path: &str, level: ComputationLevel) -> Result<(), CapabilityError> {
		self.set_active(path, level, true)
	}

	fn set_active(&self, path: &str, level: ComputationLevel, active: bool) -> Result<(), CapabilityError> {
		let capabilities = self.capabilities.read();
		let capability = capabilities
			.get(path)
			.ok_or_else(|| CapabilityError::UnregisteredPath(path.to_string()))?;
		let entry = capability
			.get(&level)
			.ok_or_else(|| CapabilityError::UnregisteredLevel {
				path: path.to_string(),
				level,
			})?;
		entry.active.store(active, Ordering::Release);
		Ok(())
	}
}

impl ComputationPolicy for DynamicComputationPolicy {
	fn resolve(&self, path: &str, preferred_location: ProcessingLocation) -> Resolution {
		let capabilities = self.capabilities.read();
		let Some(capability) = capabilities.get(path) else {
			return Resolution::none();
		};
		resolve_tie(
			preferred_location,
			capability
				.get(&ComputationLevel::RawData)
				.and_then(|entry| entry.get()),
			capability
				.get(&ComputationLevel::CanCompute)
				.and_then(|entry| entry.get()),
		)
	}
}
