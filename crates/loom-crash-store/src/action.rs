// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde_json::Value;

/// A dispatched store action.
pub trait Action {
	/// The action's type tag, used as the breadcrumb message.
	fn action_type(&self) -> &str;
}

/// Untyped actions carry their tag in a `type` field.
impl Action for Value {
	fn action_type(&self) -> &str {
		self.get("type").and_then(Value::as_str).unwrap_or("")
	}
}
