// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for crash report types.

use thiserror::Error;

/// Errors raised while parsing or encoding report types.
#[derive(Debug, Error)]
pub enum CrashError {
	#[error("invalid breadcrumb level: {0}")]
	InvalidBreadcrumbLevel(String),

	#[error("serialization error: {0}")]
	Serialization(#[from] serde_json::Error),
}

/// Result type for crash report operations.
pub type Result<T> = std::result::Result<T, CrashError>;
