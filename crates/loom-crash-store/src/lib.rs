// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Store middleware for the Loom crash client.
//!
//! Every dispatched action is recorded as a breadcrumb and remembered as the
//! last action. Every crash report then carries `extra.lastAction` and
//! `extra.state`, taken from the store at capture time.
//!
//! Store state can be large. When a report would exceed the configured
//! [`PayloadLimit`](loom_crash::PayloadLimit), or the backend answers `413`,
//! the report is sent once more with the state replaced by a short
//! explanation and the breadcrumb trail emptied.
//!
//! # Example
//!
//! ```ignore
//! use loom_crash::CrashClient;
//! use loom_crash_store::{create_middleware, Middleware, MiddlewareConfig};
//!
//! let client = CrashClient::builder()
//!     .auth_token("public_key")
//!     .base_url("https://crash.example.com")
//!     .project_id("42")
//!     .build()?;
//!
//! let state = Arc::new(Mutex::new(AppState::default()));
//! let store = {
//!     let state = state.clone();
//!     move || state.lock().unwrap().clone()
//! };
//!
//! let middleware = create_middleware(client, MiddlewareConfig::new()).attach(store)?;
//! middleware.dispatch(AppAction::Increment, |action| reduce(&state, action));
//! ```

mod action;
mod config;
mod history;
mod middleware;
mod retry;
mod store;

pub use action::Action;
pub use config::{MiddlewareConfig, DEFAULT_BREADCRUMB_CATEGORY};
pub use history::strip_undo_history;
pub use middleware::{
	create_middleware, CrashMiddleware, CrashMiddlewareFactory, LAST_ACTION_KEY, STATE_KEY,
};
pub use retry::RetryReason;
pub use store::{Middleware, StateSource};
