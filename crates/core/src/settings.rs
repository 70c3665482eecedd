//! Engine settings adjustable during a session.

use serde_json::{Map, Value, json};

pub const TIME_DILATION: &str = "TimeDilation";
pub const SOURCE_TREE_FILTER: &str = "SourceTreeFilter";

/// Filter applied at session start unless `fullSourceTree` is set.
pub const DISPLAYED_ONLY_FILTER: &str = "[@isDisplayed='true']";

/// Current settings, starting from `TimeDilation = 1` and `SourceTreeFilter = ""`.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceSettings {
	values: Map<String, Value>,
}

impl Default for DeviceSettings {
	fn default() -> Self {
		let mut values = Map::new();
		values.insert(TIME_DILATION.to_string(), json!(1));
		values.insert(SOURCE_TREE_FILTER.to_string(), json!(""));
		Self { values }
	}
}

impl DeviceSettings {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn get(&self, key: &str) -> Option<&Value> {
		self.values.get(key)
	}

	pub fn as_map(&self) -> &Map<String, Value> {
		&self.values
	}

	/// Entries of `update` whose value differs from the current one.
	pub fn changes(&self, update: &Map<String, Value>) -> Vec<(String, Value)> {
		update
			.iter()
			.filter(|(key, value)| self.values.get(key.as_str()) != Some(*value))
			.map(|(key, value)| (key.clone(), value.clone()))
			.collect()
	}

	pub fn set(&mut self, key: impl Into<String>, value: Value) {
		self.values.insert(key.into(), value);
	}
}
