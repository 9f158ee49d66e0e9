// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Crash reporting client for Rust applications.
//!
//! # Quick Start
//!
//! ```ignore
//! use loom_crash::{Breadcrumb, BreadcrumbLevel, CrashClient, UserContext};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let crash = CrashClient::builder()
//!         .auth_token("public_key")
//!         .base_url("https://crash.example.com")
//!         .project_id("42")
//!         .release(env!("CARGO_PKG_VERSION"))
//!         .environment("production")
//!         .build()?;
//!
//!     crash.set_user(UserContext::with_id("user_123"))?;
//!     crash.set_tag("server", "web-01")?;
//!     crash.capture_breadcrumb(Breadcrumb::new("startup").with_message("Application started"))?;
//!
//!     if let Err(e) = risky_operation() {
//!         crash.capture_exception(&e).await?;
//!     }
//!
//!     crash.shutdown();
//!     Ok(())
//! }
//! ```
//!
//! # Integration points
//!
//! The client is a single shared resource with four swappable slots, which is
//! what integrations such as `loom-crash-store` build on:
//!
//! - **Enrichment chain** ([`CrashClient::set_data_callback`],
//!   [`CrashClient::replace_enrichment`]): stages that rewrite every envelope
//!   before it is sent, in registration order
//! - **Active transport** ([`CrashClient::set_transport`]): the function that
//!   sends an envelope; `None` falls back to the built-in [`HttpTransport`]
//! - **Capture handler** ([`CrashClient::set_capture_handler`]): serves both
//!   `capture_exception` and `capture_message`
//! - **Duplicate switch** ([`CrashClient::set_allow_duplicates`]): whether an
//!   envelope identical to the previous one is sent again
//!
//! # Wire format
//!
//! Envelopes are `POST`ed as `application/json; charset=utf-8`, optionally
//! deflated ([`PayloadEncoding::Deflate`]). Authentication travels in the
//! query string so browser-facing backends never see a preflight.

mod capture;
mod client;
mod enrich;
mod error;
mod transport;

pub use capture::{Capture, CaptureHandler, CaptureKind, CaptureOutcome, DirectCapture};
pub use client::{ClientConfig, CrashClient, CrashClientBuilder};
pub use enrich::{EnrichmentChain, EnrichmentStage};
pub use error::{CrashSdkError, Result, PAYLOAD_TOO_LARGE};
pub use transport::{
	HttpTransport, PayloadEncoding, Transport, TransportRequest, JSON_CONTENT_TYPE,
};

// Re-export core types for convenience
pub use loom_crash_core::{
	Breadcrumb, BreadcrumbLevel, Breadcrumbs, Envelope, EventId, LimitBoundary, PayloadLimit,
	UserContext,
};

/// SDK version for identification.
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");
/// SDK name for identification.
pub const SDK_NAME: &str = "loom-crash-rust";
