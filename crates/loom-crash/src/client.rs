// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Crash reporting client for capturing and reporting errors.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use loom_crash_core::{
	compute_fingerprint, Breadcrumb, BreadcrumbLevel, Breadcrumbs, Envelope, EventId, Exception,
	ExceptionValue, SdkInfo, UserContext,
};
use serde_json::{Map, Value};
use tracing::{debug, error, info};

use crate::capture::{Capture, CaptureHandler, CaptureKind, CaptureOutcome, DirectCapture};
use crate::enrich::{EnrichmentChain, EnrichmentStage};
use crate::error::{CrashSdkError, Result};
use crate::transport::{HttpTransport, PayloadEncoding, Transport, TransportRequest};
use crate::{SDK_NAME, SDK_VERSION};

/// Maximum number of breadcrumbs to keep.
const MAX_BREADCRUMBS: usize = 100;

/// Store protocol version sent with every request.
const PROTOCOL_VERSION: &str = "7";

/// Configuration for the crash client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
	/// Timeout for HTTP requests.
	pub request_timeout: Duration,
	/// Maximum breadcrumbs to keep.
	pub max_breadcrumbs: usize,
	/// Initial value of the duplicate-suppression switch.
	pub allow_duplicates: bool,
	/// How envelopes are encoded on the wire.
	pub payload_encoding: PayloadEncoding,
}

impl Default for ClientConfig {
	fn default() -> Self {
		Self {
			request_timeout: Duration::from_secs(30),
			max_breadcrumbs: MAX_BREADCRUMBS,
			allow_duplicates: false,
			payload_encoding: PayloadEncoding::Json,
		}
	}
}

/// Mutable, client-wide options.
#[derive(Clone, Default)]
struct ClientOptions {
	/// When false, an envelope identical to the previous one is dropped.
	allow_duplicates: bool,
	/// Active transport; `None` means the built-in HTTP transport.
	transport: Option<Arc<dyn Transport>>,
}

impl fmt::Debug for ClientOptions {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ClientOptions")
			.field("allow_duplicates", &self.allow_duplicates)
			.field("transport", &self.transport.as_ref().map(|_| "custom"))
			.finish()
	}
}

/// Builder for constructing a CrashClient.
pub struct CrashClientBuilder {
	auth_token: Option<String>,
	base_url: Option<String>,
	project_id: Option<String>,
	release: Option<String>,
	environment: Option<String>,
	server_name: Option<String>,
	config: ClientConfig,
	transport: Option<Arc<dyn Transport>>,
}

impl CrashClientBuilder {
	/// Creates a new builder with default settings.
	pub fn new() -> Self {
		Self {
			auth_token: None,
			base_url: None,
			project_id: None,
			release: None,
			environment: None,
			server_name: None,
			config: ClientConfig::default(),
			transport: None,
		}
	}

	/// Sets the public key used to authenticate reports.
	pub fn auth_token(mut self, token: impl Into<String>) -> Self {
		self.auth_token = Some(token.into());
		self
	}

	/// Sets the base URL of the reporting backend.
	///
	/// Example: `https://crash.example.com`
	pub fn base_url(mut self, url: impl Into<String>) -> Self {
		self.base_url = Some(url.into());
		self
	}

	/// Sets the project ID reports are filed under.
	pub fn project_id(mut self, id: impl Into<String>) -> Self {
		self.project_id = Some(id.into());
		self
	}

	/// Sets the release version.
	///
	/// Example: `1.2.3` or `git commit SHA`
	pub fn release(mut self, release: impl Into<String>) -> Self {
		self.release = Some(release.into());
		self
	}

	/// Sets the environment name.
	///
	/// Example: `production`, `staging`, `development`
	pub fn environment(mut self, env: impl Into<String>) -> Self {
		self.environment = Some(env.into());
		self
	}

	/// Sets the server name for identification.
	pub fn server_name(mut self, name: impl Into<String>) -> Self {
		self.server_name = Some(name.into());
		self
	}

	/// Sets the HTTP request timeout.
	pub fn request_timeout(mut self, timeout: Duration) -> Self {
		self.config.request_timeout = timeout;
		self
	}

	/// Sets the maximum number of breadcrumbs to keep.
	pub fn max_breadcrumbs(mut self, max: usize) -> Self {
		self.config.max_breadcrumbs = max;
		self
	}

	/// Sends envelopes even when they repeat the previous one.
	pub fn allow_duplicates(mut self, allow: bool) -> Self {
		self.config.allow_duplicates = allow;
		self
	}

	/// Sets the wire encoding of envelopes.
	pub fn payload_encoding(mut self, encoding: PayloadEncoding) -> Self {
		self.config.payload_encoding = encoding;
		self
	}

	/// Installs a custom transport instead of the built-in HTTP one.
	pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
		self.transport = Some(transport);
		self
	}

	/// Builds the CrashClient.
	pub fn build(self) -> Result<CrashClient> {
		let auth_token = self.auth_token.ok_or(CrashSdkError::InvalidApiKey)?;
		let base_url = self.base_url.ok_or(CrashSdkError::InvalidBaseUrl)?;
		let project_id = self.project_id.ok_or(CrashSdkError::MissingProjectId)?;

		if auth_token.is_empty() {
			return Err(CrashSdkError::InvalidApiKey);
		}
		if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
			return Err(CrashSdkError::InvalidBaseUrl);
		}

		// Normalize base URL
		let base_url = base_url.trim_end_matches('/').to_string();
		let store_url = format!("{}/api/{}/store/", base_url, project_id);

		let fallback = HttpTransport::probe(self.config.request_timeout)?;
		let environment = self.environment.unwrap_or_else(|| "production".to_string());

		let inner = Arc::new(CrashClientInner {
			auth_token,
			base_url: base_url.clone(),
			store_url,
			project_id,
			release: self.release,
			environment,
			server_name: self.server_name,
			fallback,
			options: Mutex::new(ClientOptions {
				allow_duplicates: self.config.allow_duplicates,
				transport: self.transport,
			}),
			config: self.config,
			enrichment: Mutex::new(EnrichmentChain::new()),
			handler: Mutex::new(Arc::new(DirectCapture)),
			tags: Mutex::new(BTreeMap::new()),
			extra: Mutex::new(Map::new()),
			user_context: Mutex::new(None),
			breadcrumbs: Mutex::new(VecDeque::new()),
			last_fingerprint: Mutex::new(None),
			last_event_id: Mutex::new(None),
			closed: AtomicBool::new(false),
		});

		info!(base_url = %base_url, "Crash client initialized");

		Ok(CrashClient { inner })
	}
}

impl Default for CrashClientBuilder {
	fn default() -> Self {
		Self::new()
	}
}

/// Internal client state.
struct CrashClientInner {
	auth_token: String,
	base_url: String,
	store_url: String,
	project_id: String,
	release: Option<String>,
	environment: String,
	server_name: Option<String>,
	fallback: HttpTransport,
	config: ClientConfig,
	options: Mutex<ClientOptions>,
	enrichment: Mutex<EnrichmentChain>,
	handler: Mutex<Arc<dyn CaptureHandler>>,
	tags: Mutex<BTreeMap<String, String>>,
	extra: Mutex<Map<String, Value>>,
	user_context: Mutex<Option<UserContext>>,
	breadcrumbs: Mutex<VecDeque<Breadcrumb>>,
	last_fingerprint: Mutex<Option<String>>,
	last_event_id: Mutex<Option<EventId>>,
	closed: AtomicBool,
}

/// Client for capturing errors and reporting them to the backend.
///
/// The client is one shared resource: its enrichment chain, active transport,
/// capture handler and duplicate switch are slots that integrations may swap
/// and restore.
///
/// # Example
///
/// ```ignore
/// use loom_crash::{BreadcrumbLevel, CrashClient};
///
/// let client = CrashClient::builder()
///     .auth_token("public_key")
///     .base_url("https://crash.example.com")
///     .project_id("42")
///     .release(env!("CARGO_PKG_VERSION"))
///     .build()?;
///
/// client.set_tag("server", "web-01")?;
///
/// if let Err(e) = do_something() {
///     client.capture_exception(&e).await?;
/// }
///
/// client.capture_message("cache warmed", BreadcrumbLevel::Info).await?;
/// ```
#[derive(Clone)]
pub struct CrashClient {
	inner: Arc<CrashClientInner>,
}

impl fmt::Debug for CrashClient {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("CrashClient")
			.field("base_url", &self.inner.base_url)
			.field("project_id", &self.inner.project_id)
			.field("closed", &self.is_closed())
			.finish()
	}
}

impl CrashClient {
	/// Creates a new builder for constructing a CrashClient.
	pub fn builder() -> CrashClientBuilder {
		CrashClientBuilder::new()
	}

	/// Captures through the current capture handler.
	pub async fn capture(&self, capture: Capture) -> Result<CaptureOutcome> {
		self.check_closed()?;
		let handler = self.capture_handler()?;
		handler.capture(self, capture).await
	}

	/// Captures an error.
	pub fn capture_exception<E: std::error::Error>(
		&self,
		error: &E,
	) -> impl Future<Output = Result<CaptureOutcome>> + Send + '_ {
		self.capture(Capture::exception(error))
	}

	/// Captures a message (not an error).
	pub async fn capture_message(
		&self,
		message: &str,
		level: BreadcrumbLevel,
	) -> Result<CaptureOutcome> {
		self.capture(Capture::message(message, level)).await
	}

	/// The unwrapped capture path: builds the envelope, runs the enrichment
	/// chain, applies duplicate suppression and sends through the active
	/// transport.
	pub async fn capture_direct(&self, capture: Capture) -> Result<CaptureOutcome> {
		self.check_closed()?;

		let mut envelope = self.build_envelope(capture)?;
		// Snapshot the chain: stages may swap it while they run.
		let chain = lock(&self.inner.enrichment)?.clone();
		chain.apply(&mut envelope);

		let fingerprint = compute_fingerprint(&envelope);
		let allow_duplicates = self.allow_duplicates()?;
		{
			let mut last = lock(&self.inner.last_fingerprint)?;
			if !allow_duplicates && last.as_deref() == Some(fingerprint.as_str()) {
				debug!(fingerprint = %fingerprint, "Dropping duplicate crash event");
				return Ok(CaptureOutcome::Duplicate);
			}
			*last = Some(fingerprint);
		}

		let event_id = envelope.event_id;
		*lock(&self.inner.last_event_id)? = Some(event_id);

		let request = TransportRequest {
			url: self.inner.store_url.clone(),
			auth: self.auth_query(),
			encoding: self.inner.config.payload_encoding,
			data: envelope,
		};

		let transport = self.transport()?;
		let result = match transport {
			Some(transport) => transport.send(request).await,
			None => self.make_request(request).await,
		};

		match result {
			Ok(()) => {
				info!(event_id = %event_id, "Crash event captured");
				Ok(CaptureOutcome::Sent { event_id })
			}
			Err(e) => {
				error!(error = %e, event_id = %event_id, "Failed to send crash event");
				Err(e)
			}
		}
	}

	/// Sends through the built-in HTTP transport, bypassing the active one.
	pub async fn make_request(&self, request: TransportRequest) -> Result<()> {
		self.inner.fallback.send(request).await
	}

	/// Adds a breadcrumb to the trail.
	pub fn capture_breadcrumb(&self, breadcrumb: Breadcrumb) -> Result<()> {
		let mut breadcrumbs = lock(&self.inner.breadcrumbs)?;
		breadcrumbs.push_back(breadcrumb);

		// Trim to max size
		while breadcrumbs.len() > self.inner.config.max_breadcrumbs {
			breadcrumbs.pop_front();
		}
		Ok(())
	}

	/// Clears all breadcrumbs.
	pub fn clear_breadcrumbs(&self) -> Result<()> {
		lock(&self.inner.breadcrumbs)?.clear();
		Ok(())
	}

	/// Returns a copy of the current breadcrumb trail, oldest first.
	pub fn breadcrumbs(&self) -> Result<Vec<Breadcrumb>> {
		Ok(lock(&self.inner.breadcrumbs)?.iter().cloned().collect())
	}

	/// Sets a global tag that will be attached to all crash events.
	pub fn set_tag(&self, key: impl Into<String>, value: impl Into<String>) -> Result<()> {
		lock(&self.inner.tags)?.insert(key.into(), value.into());
		Ok(())
	}

	/// Removes a global tag.
	pub fn remove_tag(&self, key: &str) -> Result<()> {
		lock(&self.inner.tags)?.remove(key);
		Ok(())
	}

	/// Sets global extra data that will be attached to all crash events.
	pub fn set_extra(&self, key: impl Into<String>, value: Value) -> Result<()> {
		lock(&self.inner.extra)?.insert(key.into(), value);
		Ok(())
	}

	/// Sets the user context.
	pub fn set_user(&self, user: UserContext) -> Result<()> {
		*lock(&self.inner.user_context)? = Some(user);
		Ok(())
	}

	/// Clears the user context.
	pub fn clear_user(&self) -> Result<()> {
		*lock(&self.inner.user_context)? = None;
		Ok(())
	}

	/// Registers an enrichment stage after the ones already registered.
	pub fn set_data_callback(&self, stage: Arc<dyn EnrichmentStage>) -> Result<()> {
		lock(&self.inner.enrichment)?.push(stage);
		Ok(())
	}

	/// Replaces the whole enrichment chain, returning the previous one.
	pub fn replace_enrichment(&self, chain: EnrichmentChain) -> Result<EnrichmentChain> {
		Ok(std::mem::replace(&mut *lock(&self.inner.enrichment)?, chain))
	}

	/// The active transport; `None` means the built-in HTTP transport.
	pub fn transport(&self) -> Result<Option<Arc<dyn Transport>>> {
		Ok(lock(&self.inner.options)?.transport.clone())
	}

	/// Sets the active transport, returning the previous one.
	pub fn set_transport(
		&self,
		transport: Option<Arc<dyn Transport>>,
	) -> Result<Option<Arc<dyn Transport>>> {
		Ok(std::mem::replace(
			&mut lock(&self.inner.options)?.transport,
			transport,
		))
	}

	pub fn allow_duplicates(&self) -> Result<bool> {
		Ok(lock(&self.inner.options)?.allow_duplicates)
	}

	/// Sets the duplicate-suppression switch, returning the previous value.
	pub fn set_allow_duplicates(&self, allow: bool) -> Result<bool> {
		Ok(std::mem::replace(
			&mut lock(&self.inner.options)?.allow_duplicates,
			allow,
		))
	}

	/// The handler serving `capture`, `capture_exception` and `capture_message`.
	pub fn capture_handler(&self) -> Result<Arc<dyn CaptureHandler>> {
		Ok(Arc::clone(&*lock(&self.inner.handler)?))
	}

	/// Rebinds the capture entry points, returning the previous handler.
	pub fn set_capture_handler(
		&self,
		handler: Arc<dyn CaptureHandler>,
	) -> Result<Arc<dyn CaptureHandler>> {
		Ok(std::mem::replace(&mut *lock(&self.inner.handler)?, handler))
	}

	/// How envelopes are encoded on the wire.
	pub fn payload_encoding(&self) -> PayloadEncoding {
		self.inner.config.payload_encoding
	}

	/// Id of the last envelope handed to a transport.
	pub fn last_event_id(&self) -> Option<EventId> {
		self.inner
			.last_event_id
			.lock()
			.ok()
			.and_then(|id| *id)
	}

	/// Shuts down the client. Later captures fail with `ClientShutdown`.
	pub fn shutdown(&self) {
		if self.inner.closed.swap(true, Ordering::SeqCst) {
			return;
		}
		info!("Crash client shutdown");
	}

	/// Returns true if the client has been shut down.
	pub fn is_closed(&self) -> bool {
		self.inner.closed.load(Ordering::SeqCst)
	}

	fn check_closed(&self) -> Result<()> {
		if self.inner.closed.load(Ordering::SeqCst) {
			return Err(CrashSdkError::ClientShutdown);
		}
		Ok(())
	}

	fn auth_query(&self) -> Vec<(String, String)> {
		vec![
			("sentry_version".to_string(), PROTOCOL_VERSION.to_string()),
			(
				"sentry_client".to_string(),
				format!("{SDK_NAME}/{SDK_VERSION}"),
			),
			("sentry_key".to_string(), self.inner.auth_token.clone()),
		]
	}

	fn build_envelope(&self, capture: Capture) -> Result<Envelope> {
		let mut envelope = Envelope::new(
			self.inner.project_id.clone(),
			SdkInfo {
				name: SDK_NAME.to_string(),
				version: SDK_VERSION.to_string(),
			},
		);
		envelope.release = self.inner.release.clone();
		envelope.environment = Some(self.inner.environment.clone());
		envelope.server_name = self.inner.server_name.clone();

		match capture.kind {
			CaptureKind::Exception {
				exception_type,
				value,
			} => {
				envelope.level = BreadcrumbLevel::Error;
				envelope.exception = Some(Exception {
					values: vec![ExceptionValue {
						exception_type,
						value,
					}],
				});
			}
			CaptureKind::Message { message, level } => {
				envelope.level = level;
				envelope.message = Some(message);
			}
		}

		envelope.tags = lock(&self.inner.tags)?.clone();
		envelope.extra = lock(&self.inner.extra)?.clone();
		envelope.extra.extend(capture.extra);
		envelope.user = lock(&self.inner.user_context)?.clone();
		envelope.breadcrumbs = Breadcrumbs::from(self.breadcrumbs()?);

		Ok(envelope)
	}
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
	mutex.lock().map_err(|_| CrashSdkError::LockError)
}
