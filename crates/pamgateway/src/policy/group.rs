use std::collections::HashSet;

use parking_lot::RwLock;

#[cfg(test)]
#[path = "group_tests.rs"]
mod tests;

/// Named set of requester identities targeted by a set of table operations.
///
/// Groups are shared (`Arc`) between the policies that reference them, so
/// membership is interior-mutable while the name stays fixed.
#[derive(Debug)]
pub struct PrivacyGroup {
	name: String,
	members: RwLock<HashSet<String>>,
}

impl PrivacyGroup {
	pub fn new(name: impl Into<String>) -> Self {
		PrivacyGroup {
			name: name.into(),
			members: RwLock::new(HashSet::new()),
		}
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn add(&self, id: impl Into<String>) {
		self.members.write().insert(id.into());
	}

	pub fn add_many<I>(&self, ids: I)
	where
		I: IntoIterator,
		I::Item: Into<String>,
	{
		let mut members = self.members.write();
		for id in ids {
			members.insert(id.into());
		}
	}

	/// Removing an id that is not a member is a no-op.
	pub fn remove(&self, id: &str) {
		self.members.write().remove(id);
	}

	pub fn contains(&self, id: &str) -> bool {
		self.members.read().contains(id)
	}
}
