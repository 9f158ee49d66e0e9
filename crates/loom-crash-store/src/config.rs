// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Middleware configuration.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use loom_crash::{PayloadLimit, UserContext};
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::history::strip_undo_history;

/// Breadcrumb category used for dispatched actions.
pub const DEFAULT_BREADCRUMB_CATEGORY: &str = "redux-action";

type ActionFn<A, T> = Arc<dyn Fn(&A) -> T + Send + Sync>;
type StateFn<S, T> = Arc<dyn Fn(&S) -> T + Send + Sync>;

/// How actions and state end up in crash reports.
///
/// Immutable once handed to [`create_middleware`](crate::create_middleware).
pub struct MiddlewareConfig<S, A> {
	pub(crate) breadcrumb_data_from_action: ActionFn<A, Option<Value>>,
	pub(crate) action_transformer: ActionFn<A, Value>,
	pub(crate) state_transformer: StateFn<S, Value>,
	pub(crate) breadcrumb_category: String,
	pub(crate) filter_breadcrumb_actions: ActionFn<A, bool>,
	pub(crate) get_user_context: Option<StateFn<S, UserContext>>,
	pub(crate) get_tags: Option<StateFn<S, BTreeMap<String, String>>>,
	pub(crate) payload_limit: PayloadLimit,
}

impl<S, A> MiddlewareConfig<S, A>
where
	S: Serialize + 'static,
	A: Serialize + 'static,
{
	/// Serializes actions as they are and state with undo history removed.
	pub fn new() -> Self {
		Self {
			breadcrumb_data_from_action: Arc::new(|_: &A| -> Option<Value> { None }),
			action_transformer: Arc::new(|action: &A| to_json(action)),
			state_transformer: Arc::new(|state: &S| strip_undo_history(to_json(state))),
			breadcrumb_category: DEFAULT_BREADCRUMB_CATEGORY.to_string(),
			filter_breadcrumb_actions: Arc::new(|_: &A| true),
			get_user_context: None,
			get_tags: None,
			payload_limit: PayloadLimit::default(),
		}
	}
}

impl<S, A> Default for MiddlewareConfig<S, A>
where
	S: Serialize + 'static,
	A: Serialize + 'static,
{
	fn default() -> Self {
		Self::new()
	}
}

impl<S, A> MiddlewareConfig<S, A> {
	/// Data attached to each action breadcrumb.
	pub fn breadcrumb_data_from_action(
		mut self,
		f: impl Fn(&A) -> Option<Value> + Send + Sync + 'static,
	) -> Self {
		self.breadcrumb_data_from_action = Arc::new(f);
		self
	}

	/// Renders the last action into `extra.lastAction`.
	pub fn action_transformer(mut self, f: impl Fn(&A) -> Value + Send + Sync + 'static) -> Self {
		self.action_transformer = Arc::new(f);
		self
	}

	/// Renders the store state into `extra.state`.
	///
	/// Replaces the default entirely, undo history stripping included.
	pub fn state_transformer(mut self, f: impl Fn(&S) -> Value + Send + Sync + 'static) -> Self {
		self.state_transformer = Arc::new(f);
		self
	}

	pub fn breadcrumb_category(mut self, category: impl Into<String>) -> Self {
		self.breadcrumb_category = category.into();
		self
	}

	/// Actions for which this returns false get no breadcrumb. They still
	/// become the last action.
	pub fn filter_breadcrumb_actions(
		mut self,
		f: impl Fn(&A) -> bool + Send + Sync + 'static,
	) -> Self {
		self.filter_breadcrumb_actions = Arc::new(f);
		self
	}

	/// Derives the report's user from the state.
	pub fn user_context(mut self, f: impl Fn(&S) -> UserContext + Send + Sync + 'static) -> Self {
		self.get_user_context = Some(Arc::new(f));
		self
	}

	/// Derives the report's tags from the state. Replaces global tags.
	pub fn tags(
		mut self,
		f: impl Fn(&S) -> BTreeMap<String, String> + Send + Sync + 'static,
	) -> Self {
		self.get_tags = Some(Arc::new(f));
		self
	}

	/// Largest encoded report sent with state attached.
	pub fn payload_limit(mut self, limit: PayloadLimit) -> Self {
		self.payload_limit = limit;
		self
	}
}

impl<S, A> fmt::Debug for MiddlewareConfig<S, A> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("MiddlewareConfig")
			.field("breadcrumb_category", &self.breadcrumb_category)
			.field("payload_limit", &self.payload_limit)
			.field("get_user_context", &self.get_user_context.is_some())
			.field("get_tags", &self.get_tags.is_some())
			.finish_non_exhaustive()
	}
}

/// Serializes a value for a report, falling back to a description of the
/// failure.
pub(crate) fn to_json<T: Serialize + ?Sized>(value: &T) -> Value {
	serde_json::to_value(value).unwrap_or_else(|e| {
		warn!(error = %e, "Failed to serialize value for crash report");
		Value::String(format!("Could not serialize value: {e}"))
	})
}
