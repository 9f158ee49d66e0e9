// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Breadcrumb types (events leading up to a report).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CrashError;

/// A breadcrumb representing an event leading up to the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Breadcrumb {
	#[serde(with = "crate::timestamp")]
	pub timestamp: DateTime<Utc>,
	/// "redux-action", "http", "navigation", "console"
	pub category: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub message: Option<String>,
	pub level: BreadcrumbLevel,
	#[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
	pub data: serde_json::Value,
}

impl Breadcrumb {
	/// Creates an info-level breadcrumb in `category` stamped with the current time.
	pub fn new(category: impl Into<String>) -> Self {
		Self {
			category: category.into(),
			..Default::default()
		}
	}

	pub fn with_message(mut self, message: impl Into<String>) -> Self {
		self.message = Some(message.into());
		self
	}

	pub fn with_data(mut self, data: serde_json::Value) -> Self {
		self.data = data;
		self
	}
}

impl Default for Breadcrumb {
	fn default() -> Self {
		Self {
			timestamp: Utc::now(),
			category: String::new(),
			message: None,
			level: BreadcrumbLevel::Info,
			data: serde_json::Value::Null,
		}
	}
}

/// The `breadcrumbs` section of an envelope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Breadcrumbs {
	pub values: Vec<Breadcrumb>,
}

impl From<Vec<Breadcrumb>> for Breadcrumbs {
	fn from(values: Vec<Breadcrumb>) -> Self {
		Self { values }
	}
}

/// Severity level of a breadcrumb or a captured message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreadcrumbLevel {
	Debug,
	Info,
	Warning,
	Error,
	Fatal,
}

impl fmt::Display for BreadcrumbLevel {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Debug => write!(f, "debug"),
			Self::Info => write!(f, "info"),
			Self::Warning => write!(f, "warning"),
			Self::Error => write!(f, "error"),
			Self::Fatal => write!(f, "fatal"),
		}
	}
}

impl FromStr for BreadcrumbLevel {
	type Err = CrashError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"debug" => Ok(Self::Debug),
			"info" => Ok(Self::Info),
			"warning" => Ok(Self::Warning),
			"error" => Ok(Self::Error),
			"fatal" => Ok(Self::Fatal),
			_ => Err(CrashError::InvalidBreadcrumbLevel(s.to_string())),
		}
	}
}
