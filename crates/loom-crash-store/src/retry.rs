// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Resending reports without store state when they are too large.
//!
//! Every capture through the wrapped handler installs a one-shot
//! [`InterceptingTransport`]. It measures the encoded report and either
//! forwards it or replays the capture once, with `extra.state` replaced by a
//! [`RetryReason`] and the breadcrumb trail emptied.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use loom_crash::{
	Capture, CaptureHandler, CaptureOutcome, CrashClient, EnrichmentChain, EnrichmentStage,
	Envelope, PayloadLimit, Result, Transport, TransportRequest,
};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::middleware::{Shared, LAST_ACTION_KEY, STATE_KEY};

/// Why a report was resent without store state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryReason {
	/// The encoded report exceeded the configured limit and was not sent.
	TooLarge { size: usize, limit: PayloadLimit },
	/// The backend answered 413.
	Rejected,
}

impl fmt::Display for RetryReason {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			RetryReason::TooLarge { size, limit } => write!(
				f,
				"Could not send state because request would be larger than {}KB. (Was: {}B)",
				limit.kilobytes(),
				size
			),
			RetryReason::Rejected => {
				write!(f, "Failed to submit state to Sentry: 413 request too large.")
			}
		}
	}
}

/// Capture handler that wraps another one with the oversized-payload retry.
pub(crate) struct OversizeRetry<S, A> {
	retry: Arc<Retry<S, A>>,
	in_flight: tokio::sync::Mutex<()>,
}

impl<S, A> OversizeRetry<S, A> {
	pub(crate) fn new(wrapped: Arc<dyn CaptureHandler>, shared: Arc<Shared<S, A>>) -> Self {
		Self {
			retry: Arc::new(Retry { wrapped, shared }),
			in_flight: tokio::sync::Mutex::new(()),
		}
	}
}

#[async_trait]
impl<S, A> CaptureHandler for OversizeRetry<S, A>
where
	S: 'static,
	A: Clone + Send + 'static,
{
	async fn capture(&self, client: &CrashClient, capture: Capture) -> Result<CaptureOutcome> {
		let _in_flight = self.in_flight.lock().await;

		let interceptor = Arc::new(InterceptingTransport {
			client: client.clone(),
			retry: Arc::clone(&self.retry),
			capture: capture.clone(),
			previous: client.transport()?,
			armed: AtomicBool::new(true),
			replayed: Mutex::new(None),
		});
		let active: Arc<dyn Transport> = interceptor.clone();
		client.set_transport(Some(active))?;
		let _restore = TransportGuard {
			interceptor: Arc::clone(&interceptor),
		};

		let outcome = self.retry.wrapped.capture(client, capture).await?;
		// A replayed capture reports the envelope that was actually sent.
		Ok(interceptor.take_replayed().unwrap_or(outcome))
	}
}

/// The handler being wrapped and the state needed to replay through it.
struct Retry<S, A> {
	wrapped: Arc<dyn CaptureHandler>,
	shared: Arc<Shared<S, A>>,
}

impl<S, A> Retry<S, A>
where
	S: 'static,
	A: Clone + Send + 'static,
{
	fn limit(&self) -> PayloadLimit {
		self.shared.config.payload_limit
	}

	/// Replays `capture` once without store state and without breadcrumbs.
	async fn without_state(
		&self,
		client: &CrashClient,
		reason: RetryReason,
		capture: Capture,
	) -> Result<CaptureOutcome> {
		warn!(reason = %reason, "Resending crash report without store state");

		let stage = Arc::new(StatelessStage {
			client: client.clone(),
			shared: Arc::clone(&self.shared),
			message: reason.to_string(),
			saved: Mutex::new(None),
		});
		let saved = client.replace_enrichment(EnrichmentChain::single(stage.clone()))?;
		stage.hold(saved);
		let _chain = ChainGuard {
			stage: Arc::clone(&stage),
		};
		let _duplicates = AllowDuplicatesGuard::enter(client)?;

		self.wrapped.capture(client, capture).await
	}
}

/// One-shot transport installed for a single wrapped capture.
struct InterceptingTransport<S, A> {
	client: CrashClient,
	retry: Arc<Retry<S, A>>,
	capture: Capture,
	previous: Option<Arc<dyn Transport>>,
	armed: AtomicBool,
	/// Outcome of the replay, when one happened.
	replayed: Mutex<Option<CaptureOutcome>>,
}

impl<S, A> InterceptingTransport<S, A> {
	/// Puts the previous transport back. Returns false if that already happened.
	fn restore(&self) -> Result<bool> {
		if !self.armed.swap(false, Ordering::SeqCst) {
			return Ok(false);
		}
		self.client.set_transport(self.previous.clone())?;
		Ok(true)
	}

	fn take_replayed(&self) -> Option<CaptureOutcome> {
		self.replayed.lock().ok().and_then(|mut replayed| replayed.take())
	}

	fn record_replay(&self, outcome: CaptureOutcome) {
		match self.replayed.lock() {
			Ok(mut replayed) => *replayed = Some(outcome),
			Err(_) => warn!("Replay outcome slot poisoned"),
		}
	}

	async fn forward(&self, request: TransportRequest) -> Result<()> {
		match &self.previous {
			Some(transport) => transport.send(request).await,
			None => self.client.make_request(request).await,
		}
	}
}

#[async_trait]
impl<S, A> Transport for InterceptingTransport<S, A>
where
	S: 'static,
	A: Clone + Send + 'static,
{
	async fn send(&self, request: TransportRequest) -> Result<()> {
		if !self.restore()? {
			return self.forward(request).await;
		}

		let size = request.encode()?.len();
		let limit = self.retry.limit();
		if limit.is_exceeded(size) {
			return self.replay(RetryReason::TooLarge { size, limit }).await;
		}

		debug!(size, max_bytes = limit.max_bytes, "Crash report within size limit");
		match self.forward(request).await {
			Err(e) if e.is_payload_too_large() => self.replay(RetryReason::Rejected).await,
			result => result,
		}
	}
}

impl<S, A> InterceptingTransport<S, A>
where
	S: 'static,
	A: Clone + Send + 'static,
{
	async fn replay(&self, reason: RetryReason) -> Result<()> {
		let outcome = self
			.retry
			.without_state(&self.client, reason, self.capture.clone())
			.await?;
		self.record_replay(outcome);
		Ok(())
	}
}

/// Restores the previous transport when a wrapped capture ends without
/// reaching a transport.
struct TransportGuard<S, A> {
	interceptor: Arc<InterceptingTransport<S, A>>,
}

impl<S, A> Drop for TransportGuard<S, A> {
	fn drop(&mut self) {
		if let Err(e) = self.interceptor.restore() {
			warn!(error = %e, "Failed to restore crash transport");
		}
	}
}

/// Enrichment for the replay: the reason in place of the state, no
/// breadcrumbs.
struct StatelessStage<S, A> {
	client: CrashClient,
	shared: Arc<Shared<S, A>>,
	message: String,
	saved: Mutex<Option<EnrichmentChain>>,
}

impl<S, A> StatelessStage<S, A> {
	fn hold(&self, chain: EnrichmentChain) {
		match self.saved.lock() {
			Ok(mut saved) => *saved = Some(chain),
			Err(_) => warn!("Enrichment restore slot poisoned"),
		}
	}

	/// Puts the saved chain back, once.
	fn restore(&self) {
		let chain = self.saved.lock().ok().and_then(|mut saved| saved.take());
		if let Some(chain) = chain {
			if let Err(e) = self.client.replace_enrichment(chain) {
				warn!(error = %e, "Failed to restore crash enrichment");
			}
		}
	}
}

impl<S, A> EnrichmentStage for StatelessStage<S, A>
where
	S: 'static,
	A: Clone + Send + 'static,
{
	fn enrich(&self, envelope: &mut Envelope) {
		self.restore();

		let mut store_extra = Map::new();
		store_extra.insert(
			LAST_ACTION_KEY.to_string(),
			self.shared.rendered_last_action(),
		);
		store_extra.insert(STATE_KEY.to_string(), Value::String(self.message.clone()));
		envelope.merge_extra(store_extra);
		envelope.breadcrumbs.values.clear();
	}
}

/// Restores the normal enrichment chain if the replay never enriched.
struct ChainGuard<S, A> {
	stage: Arc<StatelessStage<S, A>>,
}

impl<S, A> Drop for ChainGuard<S, A> {
	fn drop(&mut self) {
		self.stage.restore();
	}
}

/// Allows duplicates for the lifetime of the guard.
struct AllowDuplicatesGuard<'a> {
	client: &'a CrashClient,
	previous: bool,
}

impl<'a> AllowDuplicatesGuard<'a> {
	fn enter(client: &'a CrashClient) -> Result<Self> {
		let previous = client.set_allow_duplicates(true)?;
		Ok(Self { client, previous })
	}
}

impl Drop for AllowDuplicatesGuard<'_> {
	fn drop(&mut self) {
		if let Err(e) = self.client.set_allow_duplicates(self.previous) {
			warn!(error = %e, "Failed to restore duplicate suppression");
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use loom_crash::LimitBoundary;

	#[test]
	fn test_too_large_message() {
		let reason = RetryReason::TooLarge {
			size: 250_123,
			limit: PayloadLimit::default(),
		};
		assert_eq!(
			reason.to_string(),
			"Could not send state because request would be larger than 200KB. (Was: 250123B)"
		);
	}

	#[test]
	fn test_too_large_message_uses_configured_limit() {
		let reason = RetryReason::TooLarge {
			size: 51_000,
			limit: PayloadLimit::new(50_000).with_boundary(LimitBoundary::Exclusive),
		};
		assert_eq!(
			reason.to_string(),
			"Could not send state because request would be larger than 50KB. (Was: 51000B)"
		);
	}

	#[test]
	fn test_rejected_message() {
		assert_eq!(
			RetryReason::Rejected.to_string(),
			"Failed to submit state to Sentry: 413 request too large."
		);
	}
}
