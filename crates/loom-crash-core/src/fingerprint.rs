// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Fingerprinting used to detect repeated reports.

use sha2::{Digest, Sha256};

use crate::envelope::Envelope;

/// Compute a fingerprint identifying "the same report" for duplicate
/// suppression.
///
/// The fingerprint is a SHA256 hash based on:
/// 1. Whether the envelope carries an exception or a message
/// 2. Exception type and value, if any
/// 3. The message, if any
///
/// Extra data, tags, user and breadcrumbs are deliberately left out: a report
/// replayed with different extra data is still a duplicate.
pub fn compute_fingerprint(envelope: &Envelope) -> String {
	let mut hasher = Sha256::new();

	match envelope.primary_exception() {
		Some(exception) => {
			hasher.update(b"exception|");
			hasher.update(exception.exception_type.as_bytes());
			hasher.update(b"|");
			hasher.update(exception.value.as_bytes());
			hasher.update(b"|");
		}
		None => hasher.update(b"message|"),
	}

	if let Some(message) = &envelope.message {
		hasher.update(message.as_bytes());
	}

	hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::envelope::{Exception, ExceptionValue, SdkInfo};
	use serde_json::json;

	fn envelope() -> Envelope {
		Envelope::new(
			"proj",
			SdkInfo {
				name: "test".to_string(),
				version: "0.0.0".to_string(),
			},
		)
	}

	fn exception(ty: &str, value: &str) -> Envelope {
		let mut e = envelope();
		e.exception = Some(Exception {
			values: vec![ExceptionValue {
				exception_type: ty.to_string(),
				value: value.to_string(),
			}],
		});
		e
	}

	#[test]
	fn fingerprint_is_hex_sha256() {
		let fingerprint = compute_fingerprint(&exception("Error", "boom"));
		assert_eq!(fingerprint.len(), 64);
		assert!(fingerprint.chars().all(|c| c.is_ascii_hexdigit()));
	}

	#[test]
	fn extra_data_does_not_change_fingerprint() {
		let first = exception("Error", "boom");
		let mut second = exception("Error", "boom");
		second.extra.insert("state".to_string(), json!("replaced"));
		second.breadcrumbs.values.clear();

		assert_eq!(compute_fingerprint(&first), compute_fingerprint(&second));
	}

	#[test]
	fn different_exceptions_differ() {
		assert_ne!(
			compute_fingerprint(&exception("Error", "boom")),
			compute_fingerprint(&exception("Error", "bang"))
		);
		assert_ne!(
			compute_fingerprint(&exception("IoError", "boom")),
			compute_fingerprint(&exception("Error", "boom"))
		);
	}

	#[test]
	fn message_and_exception_do_not_collide() {
		let mut message = envelope();
		message.message = Some("boom".to_string());

		assert_ne!(
			compute_fingerprint(&message),
			compute_fingerprint(&exception("", "boom"))
		);
	}
}
