// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Upper bound on the encoded size of a report.

/// Largest encoded report the backend is expected to accept.
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 200_000;

/// Whether a payload of exactly `max_bytes` is still accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LimitBoundary {
	/// `size <= max_bytes` is accepted.
	#[default]
	Inclusive,
	/// `size < max_bytes` is accepted.
	Exclusive,
}

/// Size limit applied to encoded reports before they are sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadLimit {
	pub max_bytes: usize,
	pub boundary: LimitBoundary,
}

impl Default for PayloadLimit {
	fn default() -> Self {
		Self {
			max_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
			boundary: LimitBoundary::Inclusive,
		}
	}
}

impl PayloadLimit {
	pub fn new(max_bytes: usize) -> Self {
		Self {
			max_bytes,
			..Default::default()
		}
	}

	pub fn with_boundary(mut self, boundary: LimitBoundary) -> Self {
		self.boundary = boundary;
		self
	}

	pub fn is_exceeded(&self, size: usize) -> bool {
		match self.boundary {
			LimitBoundary::Inclusive => size > self.max_bytes,
			LimitBoundary::Exclusive => size >= self.max_bytes,
		}
	}

	/// The limit in kilobytes, as shown in diagnostics ("200KB").
	pub fn kilobytes(&self) -> usize {
		self.max_bytes / 1000
	}
}
