// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for Loom crash reporting.
//!
//! This crate provides the wire types shared by the reporting client
//! (`loom-crash`) and the store middleware (`loom-crash-store`).
//!
//! # Overview
//!
//! - [`Envelope`]: the report under construction, with `extra`, `user`, `tags`
//!   and `breadcrumbs` sections that enrichment stages may rewrite
//! - [`Breadcrumb`]: a lightweight, timestamped log entry giving narrative
//!   context to a report
//! - [`compute_fingerprint`]: identity of a report for duplicate suppression
//! - [`PayloadLimit`]: the largest encoded report the backend accepts

pub mod breadcrumb;
pub mod context;
pub mod envelope;
pub mod error;
pub mod fingerprint;
pub mod limit;
pub mod timestamp;

pub use breadcrumb::{Breadcrumb, BreadcrumbLevel, Breadcrumbs};
pub use context::UserContext;
pub use envelope::{Envelope, EventId, Exception, ExceptionValue, SdkInfo};
pub use error::{CrashError, Result};
pub use fingerprint::compute_fingerprint;
pub use limit::{LimitBoundary, PayloadLimit, DEFAULT_MAX_PAYLOAD_BYTES};
