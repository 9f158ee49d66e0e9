// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The middleware factory and the dispatch path.

use std::fmt;
use std::sync::{Arc, Mutex};

use loom_crash::{Breadcrumb, CrashClient, EnrichmentStage, Envelope, Result};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::action::Action;
use crate::config::MiddlewareConfig;
use crate::retry::OversizeRetry;
use crate::store::{Middleware, StateSource};

/// `extra` key holding the rendered last action.
pub const LAST_ACTION_KEY: &str = "lastAction";
/// `extra` key holding the rendered store state.
pub const STATE_KEY: &str = "state";

/// State shared by an attached middleware, its enrichment stage and its
/// retry controller.
pub(crate) struct Shared<S, A> {
	pub(crate) config: Arc<MiddlewareConfig<S, A>>,
	store: Arc<dyn StateSource<S>>,
	last_action: Mutex<Option<A>>,
}

impl<S, A: Clone> Shared<S, A> {
	fn remember(&self, action: A) {
		match self.last_action.lock() {
			Ok(mut last) => *last = Some(action),
			Err(_) => warn!("Last action lock poisoned, action not remembered"),
		}
	}

	fn last_action(&self) -> Option<A> {
		self.last_action.lock().ok().and_then(|last| last.clone())
	}

	/// The last action as rendered into reports; `null` before any dispatch.
	pub(crate) fn rendered_last_action(&self) -> Value {
		self.last_action()
			.map(|action| (self.config.action_transformer)(&action))
			.unwrap_or(Value::Null)
	}
}

/// Creates a middleware factory bound to `client`.
///
/// Nothing happens to the client until [`CrashMiddlewareFactory::attach`].
pub fn create_middleware<S, A>(
	client: CrashClient,
	config: MiddlewareConfig<S, A>,
) -> CrashMiddlewareFactory<S, A> {
	CrashMiddlewareFactory {
		client,
		config: Arc::new(config),
	}
}

/// Binds the middleware to stores.
pub struct CrashMiddlewareFactory<S, A> {
	client: CrashClient,
	config: Arc<MiddlewareConfig<S, A>>,
}

impl<S, A> CrashMiddlewareFactory<S, A>
where
	S: 'static,
	A: Action + Clone + Send + 'static,
{
	/// Attaches the middleware to `store`.
	///
	/// Registers an enrichment stage that adds the last action and the
	/// store state to every report, and wraps the client's capture handler
	/// with the oversized-payload retry.
	pub fn attach(&self, store: impl StateSource<S> + 'static) -> Result<CrashMiddleware<S, A>> {
		let shared = Arc::new(Shared {
			config: Arc::clone(&self.config),
			store: Arc::new(store),
			last_action: Mutex::new(None),
		});

		self.client.set_data_callback(Arc::new(StoreEnrichment {
			shared: Arc::clone(&shared),
		}))?;

		let wrapped = self.client.capture_handler()?;
		self.client.set_capture_handler(Arc::new(OversizeRetry::new(
			wrapped,
			Arc::clone(&shared),
		)))?;

		info!(
			category = %self.config.breadcrumb_category,
			max_payload_bytes = self.config.payload_limit.max_bytes,
			"Store middleware attached to crash client"
		);

		Ok(CrashMiddleware {
			client: self.client.clone(),
			shared,
		})
	}
}

impl<S, A> fmt::Debug for CrashMiddlewareFactory<S, A> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("CrashMiddlewareFactory")
			.field("client", &self.client)
			.field("config", &self.config)
			.finish()
	}
}

/// A middleware attached to one store.
pub struct CrashMiddleware<S, A> {
	client: CrashClient,
	shared: Arc<Shared<S, A>>,
}

impl<S, A: Clone> CrashMiddleware<S, A> {
	/// The most recently dispatched action.
	pub fn last_action(&self) -> Option<A> {
		self.shared.last_action()
	}

	pub fn client(&self) -> &CrashClient {
		&self.client
	}
}

impl<S, A: Action + Clone> Middleware<A> for CrashMiddleware<S, A> {
	fn dispatch<R, N>(&self, action: A, next: N) -> R
	where
		N: FnOnce(A) -> R,
	{
		let config = &self.shared.config;
		if (config.filter_breadcrumb_actions)(&action) {
			let mut breadcrumb = Breadcrumb::new(config.breadcrumb_category.clone())
				.with_message(action.action_type());
			if let Some(data) = (config.breadcrumb_data_from_action)(&action) {
				breadcrumb = breadcrumb.with_data(data);
			}
			if let Err(e) = self.client.capture_breadcrumb(breadcrumb) {
				warn!(error = %e, "Failed to record action breadcrumb");
			}
		}

		self.shared.remember(action.clone());
		next(action)
	}
}

impl<S, A> fmt::Debug for CrashMiddleware<S, A> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("CrashMiddleware")
			.field("client", &self.client)
			.finish_non_exhaustive()
	}
}

/// Adds `lastAction`, `state` and the configured user and tags to a report.
struct StoreEnrichment<S, A> {
	shared: Arc<Shared<S, A>>,
}

impl<S, A> EnrichmentStage for StoreEnrichment<S, A>
where
	S: 'static,
	A: Clone + Send + 'static,
{
	fn enrich(&self, envelope: &mut Envelope) {
		let config = &self.shared.config;
		let state = self.shared.store.get_state();

		let mut store_extra = Map::new();
		store_extra.insert(
			LAST_ACTION_KEY.to_string(),
			self.shared.rendered_last_action(),
		);
		store_extra.insert(STATE_KEY.to_string(), (config.state_transformer)(&state));
		envelope.merge_extra(store_extra);

		if let Some(get_user_context) = &config.get_user_context {
			envelope.user = Some(get_user_context(&state));
		}
		if let Some(get_tags) = &config.get_tags {
			envelope.tags = get_tags(&state);
		}
	}
}
