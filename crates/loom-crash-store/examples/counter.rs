// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Example: a counter store reporting to a crash backend.
//!
//! Run with:
//!   LOOM_AUTH_TOKEN=... LOOM_PROJECT_ID=... cargo run --example counter -p loom-crash-store
//!
//! Set `LOOM_HISTORY=5000` to grow the undo history past the payload limit
//! and watch the report go out without state.

use std::sync::{Arc, Mutex};

use loom_crash::{BreadcrumbLevel, CrashClient, UserContext};
use loom_crash_store::{create_middleware, Action, Middleware, MiddlewareConfig};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
enum CounterAction {
	Increment { by: i64 },
	Reset,
}

impl Action for CounterAction {
	fn action_type(&self) -> &str {
		match self {
			CounterAction::Increment { .. } => "INCREMENT",
			CounterAction::Reset => "RESET",
		}
	}
}

/// Undo-enabled counter slice.
#[derive(Debug, Clone, Default, Serialize)]
struct History {
	past: Vec<i64>,
	present: i64,
	future: Vec<i64>,
	index: usize,
	limit: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
struct AppState {
	user: String,
	counter: History,
}

fn reduce(state: &Mutex<AppState>, action: CounterAction) {
	let Ok(mut state) = state.lock() else {
		return;
	};
	let counter = &mut state.counter;
	counter.past.push(counter.present);
	counter.index = counter.past.len();
	match action {
		CounterAction::Increment { by } => counter.present += by,
		CounterAction::Reset => counter.present = 0,
	}
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
		.init();

	let client = CrashClient::builder()
		.auth_token(std::env::var("LOOM_AUTH_TOKEN")?)
		.base_url(
			std::env::var("LOOM_BASE_URL").unwrap_or_else(|_| "https://crash.example.com".to_string()),
		)
		.project_id(std::env::var("LOOM_PROJECT_ID")?)
		.environment("development")
		.build()?;

	let history: usize = std::env::var("LOOM_HISTORY")
		.ok()
		.and_then(|n| n.parse().ok())
		.unwrap_or(3);

	let state = Arc::new(Mutex::new(AppState {
		user: "user_example_123".to_string(),
		counter: History {
			limit: history,
			..Default::default()
		},
	}));

	let config = MiddlewareConfig::<AppState, CounterAction>::new()
		.filter_breadcrumb_actions(|action| !matches!(action, CounterAction::Reset))
		.user_context(|state| UserContext::with_id(state.user.clone()))
		// Keep the history so a long session can exceed the payload limit.
		.state_transformer(|state| serde_json::to_value(state).unwrap_or_default());

	let middleware = create_middleware(client.clone(), config).attach({
		let state = state.clone();
		move || state.lock().map(|s| s.clone()).unwrap_or_default()
	})?;

	for i in 0..history {
		middleware.dispatch(CounterAction::Increment { by: i as i64 }, |action| {
			reduce(&state, action)
		});
	}
	middleware.dispatch(CounterAction::Reset, |action| reduce(&state, action));

	info!(last_action = ?middleware.last_action(), "Dispatched actions");

	let outcome = client
		.capture_message("Counter example report", BreadcrumbLevel::Error)
		.await?;
	info!(?outcome, "Report captured");

	client.shutdown();
	Ok(())
}
