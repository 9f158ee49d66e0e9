// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Capture requests and the rebindable handler that serves them.

use async_trait::async_trait;
use loom_crash_core::{BreadcrumbLevel, EventId};
use serde_json::{Map, Value};

use crate::client::CrashClient;
use crate::error::Result;

/// What is being reported.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureKind {
	Exception {
		exception_type: String,
		value: String,
	},
	Message {
		message: String,
		level: BreadcrumbLevel,
	},
}

/// The arguments of one capture call. Cloned when a capture is replayed.
#[derive(Debug, Clone, PartialEq)]
pub struct Capture {
	pub kind: CaptureKind,
	/// Extra data for this report only; wins over global and enrichment extra.
	pub extra: Map<String, Value>,
}

impl Capture {
	/// Captures an error, using the short name of its type as the exception type.
	pub fn exception<E: std::error::Error>(error: &E) -> Self {
		Self::exception_with_type(short_type_name::<E>(), error.to_string())
	}

	pub fn exception_with_type(exception_type: impl Into<String>, value: impl Into<String>) -> Self {
		Self {
			kind: CaptureKind::Exception {
				exception_type: exception_type.into(),
				value: value.into(),
			},
			extra: Map::new(),
		}
	}

	pub fn message(message: impl Into<String>, level: BreadcrumbLevel) -> Self {
		Self {
			kind: CaptureKind::Message {
				message: message.into(),
				level,
			},
			extra: Map::new(),
		}
	}

	pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
		self.extra.insert(key.into(), value);
		self
	}
}

/// Result of a capture that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
	/// The envelope was handed to the transport and accepted.
	Sent { event_id: EventId },
	/// The envelope repeated the previous one and duplicates are not allowed.
	Duplicate,
}

/// The capture entry point of a client.
///
/// `capture_exception` and `capture_message` both go through the client's
/// current handler, so wrapping the handler wraps both.
#[async_trait]
pub trait CaptureHandler: Send + Sync {
	async fn capture(&self, client: &CrashClient, capture: Capture) -> Result<CaptureOutcome>;
}

/// The unwrapped handler: builds, enriches and sends the envelope.
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectCapture;

#[async_trait]
impl CaptureHandler for DirectCapture {
	async fn capture(&self, client: &CrashClient, capture: Capture) -> Result<CaptureOutcome> {
		client.capture_direct(capture).await
	}
}

fn short_type_name<T>() -> String {
	let full = std::any::type_name::<T>();
	let base = full.split('<').next().unwrap_or(full);
	base.rsplit("::").next().unwrap_or(base).to_string()
}
