// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The report envelope: the event under construction before it is sent.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::breadcrumb::{BreadcrumbLevel, Breadcrumbs};
use crate::context::UserContext;

/// Unique identifier for a captured event.
///
/// Rendered as 32 lowercase hex digits without hyphens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventId(pub Uuid);

impl EventId {
	pub fn new() -> Self {
		Self(Uuid::now_v7())
	}
}

impl Default for EventId {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Display for EventId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0.simple())
	}
}

impl FromStr for EventId {
	type Err = uuid::Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Ok(Self(Uuid::parse_str(s)?))
	}
}

impl Serialize for EventId {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.collect_str(self)
	}
}

impl<'de> Deserialize<'de> for EventId {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let raw = String::deserialize(deserializer)?;
		raw.parse().map_err(serde::de::Error::custom)
	}
}

/// A single exception in the `exception` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExceptionValue {
	#[serde(rename = "type")]
	pub exception_type: String,
	pub value: String,
}

/// The `exception` section of an envelope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Exception {
	pub values: Vec<ExceptionValue>,
}

/// Identifies the SDK that produced the envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SdkInfo {
	pub name: String,
	pub version: String,
}

/// An error report under construction.
///
/// Enrichment stages mutate `extra`, `user`, `tags` and `breadcrumbs` before
/// the envelope is handed to a transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
	pub event_id: EventId,
	pub project: String,
	#[serde(with = "crate::timestamp")]
	pub timestamp: DateTime<Utc>,
	pub level: BreadcrumbLevel,
	pub platform: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub message: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub exception: Option<Exception>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub release: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub environment: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub server_name: Option<String>,
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub tags: BTreeMap<String, String>,
	#[serde(default)]
	pub extra: Map<String, Value>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub user: Option<UserContext>,
	#[serde(default)]
	pub breadcrumbs: Breadcrumbs,
	pub sdk: SdkInfo,
}

impl Envelope {
	/// Creates an empty envelope for `project` with a fresh event id.
	pub fn new(project: impl Into<String>, sdk: SdkInfo) -> Self {
		Self {
			event_id: EventId::new(),
			project: project.into(),
			timestamp: Utc::now(),
			level: BreadcrumbLevel::Error,
			platform: "rust".to_string(),
			message: None,
			exception: None,
			release: None,
			environment: None,
			server_name: None,
			tags: BTreeMap::new(),
			extra: Map::new(),
			user: None,
			breadcrumbs: Breadcrumbs::default(),
			sdk,
		}
	}

	/// Merges `base` under `extra`. Keys already present in `extra` win.
	pub fn merge_extra(&mut self, mut base: Map<String, Value>) {
		for (key, value) in std::mem::take(&mut self.extra) {
			base.insert(key, value);
		}
		self.extra = base;
	}

	/// The first exception, if the envelope reports one.
	pub fn primary_exception(&self) -> Option<&ExceptionValue> {
		self.exception.as_ref().and_then(|e| e.values.first())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;
	use serde_json::json;

	fn sdk() -> SdkInfo {
		SdkInfo {
			name: "test".to_string(),
			version: "0.0.0".to_string(),
		}
	}

	proptest! {
		#[test]
		fn event_id_roundtrip(uuid_bytes in any::<[u8; 16]>()) {
			let id = EventId(Uuid::from_bytes(uuid_bytes));
			let s = id.to_string();
			prop_assert_eq!(s.len(), 32);
			let parsed: EventId = s.parse().unwrap();
			prop_assert_eq!(id, parsed);
		}
	}

	#[test]
	fn merge_extra_keeps_existing_keys() {
		let mut envelope = Envelope::new("proj", sdk());
		envelope.extra.insert("custom".to_string(), json!(1));
		envelope.extra.insert("state".to_string(), json!("mine"));

		let mut base = Map::new();
		base.insert("state".to_string(), json!({ "count": 1 }));
		base.insert("lastAction".to_string(), json!({ "type": "INCREMENT" }));
		envelope.merge_extra(base);

		assert_eq!(envelope.extra["custom"], json!(1));
		assert_eq!(envelope.extra["state"], json!("mine"));
		assert_eq!(envelope.extra["lastAction"]["type"], "INCREMENT");
	}

	#[test]
	fn serializes_sections_by_wire_name() {
		let mut envelope = Envelope::new("proj", sdk());
		envelope.exception = Some(Exception {
			values: vec![ExceptionValue {
				exception_type: "Error".to_string(),
				value: "boom".to_string(),
			}],
		});

		let json = serde_json::to_value(&envelope).unwrap();
		assert_eq!(json["exception"]["values"][0]["type"], "Error");
		assert_eq!(json["breadcrumbs"]["values"], json!([]));
		assert_eq!(json["platform"], "rust");
		assert!(json.get("user").is_none());
		assert!(json.get("tags").is_none());
	}

	#[test]
	fn envelope_roundtrips_through_json() {
		let mut envelope = Envelope::new("proj", sdk());
		envelope.message = Some("hello".to_string());
		envelope.tags.insert("region".to_string(), "eu".to_string());
		envelope.user = Some(UserContext::with_id("u1"));

		let bytes = serde_json::to_vec(&envelope).unwrap();
		let parsed: Envelope = serde_json::from_slice(&bytes).unwrap();

		assert_eq!(parsed.event_id, envelope.event_id);
		assert_eq!(parsed.message.as_deref(), Some("hello"));
		assert_eq!(parsed.tags["region"], "eu");
		assert_eq!(parsed.user, envelope.user);
	}
}
