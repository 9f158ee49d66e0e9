// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Removal of undo history from store state.
//!
//! Undo-enabled slices keep `past` and `future` lists of whole earlier states,
//! which easily dominate a report. Those lists are replaced with a note
//! carrying their length.

use serde_json::{Map, Value};

const HISTORY_REMOVED: &str = "redux-undo history was automatically removed.";

/// Replaces undo history in `state`, at the root or in any top-level slice.
///
/// Elements of an array root count as top-level slices.
///
/// State without undo history is returned unchanged.
pub fn strip_undo_history(state: Value) -> Value {
	if is_undo_state(&state) {
		return remove_history(state);
	}

	match state {
		Value::Object(mut slices) => {
			slices.values_mut().for_each(strip_slice);
			Value::Object(slices)
		}
		// Array roots are walked by index, like object slices.
		Value::Array(mut slices) => {
			slices.iter_mut().for_each(strip_slice);
			Value::Array(slices)
		}
		other => other,
	}
}

fn strip_slice(slice: &mut Value) {
	if is_undo_state(slice) {
		*slice = remove_history(std::mem::take(slice));
	}
}

fn is_undo_state(value: &Value) -> bool {
	let Some(object) = value.as_object() else {
		return false;
	};
	["past", "present", "future"]
		.iter()
		.all(|key| object.get(*key).is_some_and(is_truthy))
		&& ["index", "limit"]
			.iter()
			.all(|key| object.get(*key).is_some_and(Value::is_number))
}

fn is_truthy(value: &Value) -> bool {
	match value {
		Value::Null => false,
		Value::Bool(b) => *b,
		Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
		Value::String(s) => !s.is_empty(),
		Value::Array(_) | Value::Object(_) => true,
	}
}

fn remove_history(value: Value) -> Value {
	let Value::Object(mut object) = value else {
		return value;
	};
	for key in ["past", "future"] {
		let note = removal_note(&object, key);
		object.insert(key.to_string(), Value::String(note));
	}
	Value::Object(object)
}

fn removal_note(object: &Map<String, Value>, key: &str) -> String {
	match object.get(key) {
		Some(Value::Array(entries)) => format!("{HISTORY_REMOVED} (Entries: {})", entries.len()),
		Some(Value::String(s)) => format!("{HISTORY_REMOVED} (Entries: {})", s.chars().count()),
		_ => format!("{HISTORY_REMOVED} (Entries: unknown)"),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;
	use serde_json::json;

	fn undo_slice(past: usize, future: usize) -> Value {
		json!({
			"past": vec![json!({"count": 0}); past],
			"present": {"count": past},
			"future": vec![json!({"count": 9}); future],
			"index": past,
			"limit": 50,
		})
	}

	#[test]
	fn test_strips_root_history() {
		let stripped = strip_undo_history(undo_slice(3, 1));

		assert_eq!(
			stripped["past"],
			json!("redux-undo history was automatically removed. (Entries: 3)")
		);
		assert_eq!(
			stripped["future"],
			json!("redux-undo history was automatically removed. (Entries: 1)")
		);
		assert_eq!(stripped["present"], json!({"count": 3}));
		assert_eq!(stripped["index"], json!(3));
	}

	#[test]
	fn test_strips_top_level_slices_only() {
		let state = json!({
			"todos": undo_slice(2, 0),
			"nested": {"deeper": undo_slice(5, 5)},
			"user": {"name": "ada"},
		});

		let stripped = strip_undo_history(state.clone());

		assert_eq!(
			stripped["todos"]["past"],
			json!("redux-undo history was automatically removed. (Entries: 2)")
		);
		assert_eq!(stripped["nested"], state["nested"]);
		assert_eq!(stripped["user"], state["user"]);
	}

	#[test]
	fn test_empty_arrays_are_truthy() {
		let stripped = strip_undo_history(undo_slice(0, 0));
		assert_eq!(
			stripped["past"],
			json!("redux-undo history was automatically removed. (Entries: 0)")
		);
	}

	#[test]
	fn test_falsy_present_is_not_undo_state() {
		let state = json!({"past": [1], "present": 0, "future": [], "index": 1, "limit": 5});
		assert_eq!(strip_undo_history(state.clone()), state);
	}

	#[test]
	fn test_non_numeric_index_is_not_undo_state() {
		let state = json!({"past": [1], "present": 1, "future": [], "index": "1", "limit": 5});
		assert_eq!(strip_undo_history(state.clone()), state);
	}

	#[test]
	fn test_non_object_state_is_returned_as_is() {
		assert_eq!(strip_undo_history(json!(null)), json!(null));
		assert_eq!(strip_undo_history(json!([1, 2])), json!([1, 2]));
		assert_eq!(strip_undo_history(json!("state")), json!("state"));
	}

	#[test]
	fn test_strips_undo_elements_of_array_root() {
		let stripped = strip_undo_history(json!([undo_slice(2, 0), {"count": 1}]));

		assert_eq!(
			stripped[0]["past"],
			json!("redux-undo history was automatically removed. (Entries: 2)")
		);
		assert_eq!(stripped[0]["present"], json!({"count": 2}));
		assert_eq!(stripped[1], json!({"count": 1}));
	}

	#[test]
	fn test_string_history_counts_characters() {
		let state = json!({"past": "abc", "present": 1, "future": true, "index": 0, "limit": 1});
		let stripped = strip_undo_history(state);
		assert_eq!(
			stripped["past"],
			json!("redux-undo history was automatically removed. (Entries: 3)")
		);
		assert_eq!(
			stripped["future"],
			json!("redux-undo history was automatically removed. (Entries: unknown)")
		);
	}

	proptest! {
		#[test]
		fn state_without_history_keys_is_unchanged(
			slices in proptest::collection::btree_map("[a-z]{1,8}", any::<i64>(), 0..8)
		) {
			let state = json!(slices);
			prop_assert_eq!(strip_undo_history(state.clone()), state);
		}
	}
}
