// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the crash SDK.

use thiserror::Error;

/// Result type alias for crash operations.
pub type Result<T> = std::result::Result<T, CrashSdkError>;

/// HTTP status a backend answers with when a report body is too large.
pub const PAYLOAD_TOO_LARGE: u16 = 413;

/// Errors that can occur in the crash SDK.
#[derive(Debug, Error)]
pub enum CrashSdkError {
	/// The client has been shut down.
	#[error("crash client has been shut down")]
	ClientShutdown,

	/// Invalid API key format.
	#[error("invalid API key format")]
	InvalidApiKey,

	/// Invalid base URL.
	#[error("invalid base URL")]
	InvalidBaseUrl,

	/// Missing required project ID.
	#[error("project ID is required")]
	MissingProjectId,

	/// HTTP request failed.
	#[error("HTTP request failed: {0}")]
	RequestFailed(#[from] reqwest::Error),

	/// Server returned an error.
	#[error("server error (status {status}): {message}")]
	ServerError {
		/// HTTP status code.
		status: u16,
		/// Error message from server.
		message: String,
	},

	/// Rate limited by server.
	#[error("rate limited, retry after {retry_after_secs:?} seconds")]
	RateLimited {
		/// Optional retry-after header value.
		retry_after_secs: Option<u64>,
	},

	/// Failed to serialize the envelope.
	#[error("serialization error: {0}")]
	SerializationError(#[from] serde_json::Error),

	/// Failed to compress the request body.
	#[error("compression error: {0}")]
	CompressionError(#[source] std::io::Error),

	/// A blocking send could not be completed on the blocking pool.
	#[error("blocking send failed: {0}")]
	BlockingTask(String),

	/// Lock acquisition failed.
	#[error("failed to acquire lock")]
	LockError,
}

impl CrashSdkError {
	/// HTTP status carried by the error, if the server answered.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::ServerError { status, .. } => Some(*status),
			Self::RateLimited { .. } => Some(429),
			Self::RequestFailed(e) => e.status().map(|s| s.as_u16()),
			_ => None,
		}
	}

	/// True when the backend rejected the request as too large (HTTP 413).
	pub fn is_payload_too_large(&self) -> bool {
		self.status() == Some(PAYLOAD_TOO_LARGE)
	}
}
