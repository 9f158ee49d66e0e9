// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Transports: the pluggable functions that put an envelope on the wire.

use std::io::Write;
use std::time::Duration;

use async_trait::async_trait;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use loom_crash_core::Envelope;
use reqwest::header::{CONTENT_ENCODING, CONTENT_TYPE, RETRY_AFTER};
use reqwest::StatusCode;
use tracing::debug;

use crate::error::{CrashSdkError, Result};
use crate::{SDK_NAME, SDK_VERSION};

/// Content type of every report body, compressed or not.
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// How an envelope is encoded into a request body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PayloadEncoding {
	/// Plain JSON.
	#[default]
	Json,
	/// zlib-wrapped deflate of the JSON, sent with `Content-Encoding: deflate`.
	Deflate,
}

impl PayloadEncoding {
	/// Encodes `envelope` into the exact bytes that would be sent.
	pub fn encode(&self, envelope: &Envelope) -> Result<Vec<u8>> {
		let json = serde_json::to_vec(envelope)?;
		match self {
			Self::Json => Ok(json),
			Self::Deflate => {
				let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
				encoder
					.write_all(&json)
					.map_err(CrashSdkError::CompressionError)?;
				encoder.finish().map_err(CrashSdkError::CompressionError)
			}
		}
	}

	/// Value of the `Content-Encoding` header, if any.
	pub fn content_encoding(&self) -> Option<&'static str> {
		match self {
			Self::Json => None,
			Self::Deflate => Some("deflate"),
		}
	}
}

/// A report ready to be sent: the envelope plus where and how to send it.
#[derive(Debug, Clone)]
pub struct TransportRequest {
	/// Store endpoint, without query string.
	pub url: String,
	/// Authentication pairs, sent in the query string. Custom headers would
	/// force a CORS preflight on browser backends.
	pub auth: Vec<(String, String)>,
	pub encoding: PayloadEncoding,
	pub data: Envelope,
}

impl TransportRequest {
	/// Encodes the envelope with the request's encoding.
	pub fn encode(&self) -> Result<Vec<u8>> {
		self.encoding.encode(&self.data)
	}
}

/// Sends one request. An `Err` plays the role of the error callback: the
/// caller decides what a failed send means.
#[async_trait]
pub trait Transport: Send + Sync {
	async fn send(&self, request: TransportRequest) -> Result<()>;
}

/// The built-in HTTP transport.
///
/// The variant is chosen once, when the client is built: `Async` when a tokio
/// runtime is available, `Blocking` otherwise.
#[derive(Debug, Clone)]
pub enum HttpTransport {
	Async(reqwest::Client),
	Blocking(reqwest::blocking::Client),
}

impl HttpTransport {
	/// Picks the mechanism supported by the calling context.
	pub fn probe(timeout: Duration) -> Result<Self> {
		if tokio::runtime::Handle::try_current().is_ok() {
			Self::asynchronous(timeout)
		} else {
			Self::blocking(timeout)
		}
	}

	pub fn asynchronous(timeout: Duration) -> Result<Self> {
		let client = reqwest::Client::builder()
			.user_agent(user_agent())
			.timeout(timeout)
			.build()?;
		Ok(Self::Async(client))
	}

	pub fn blocking(timeout: Duration) -> Result<Self> {
		let client = reqwest::blocking::Client::builder()
			.user_agent(user_agent())
			.timeout(timeout)
			.build()?;
		Ok(Self::Blocking(client))
	}

	pub fn is_async(&self) -> bool {
		matches!(self, Self::Async(_))
	}
}

#[async_trait]
impl Transport for HttpTransport {
	async fn send(&self, request: TransportRequest) -> Result<()> {
		let body = request.encode()?;
		debug!(
			url = %request.url,
			event_id = %request.data.event_id,
			bytes = body.len(),
			"Sending crash report"
		);

		match self {
			Self::Async(client) => send_async(client, &request, body).await,
			Self::Blocking(client) => {
				let client = client.clone();
				let send = move || send_blocking(&client, &request, body);
				match tokio::runtime::Handle::try_current() {
					Ok(handle) => handle
						.spawn_blocking(send)
						.await
						.map_err(|e| CrashSdkError::BlockingTask(e.to_string()))?,
					Err(_) => send(),
				}
			}
		}
	}
}

async fn send_async(
	client: &reqwest::Client,
	request: &TransportRequest,
	body: Vec<u8>,
) -> Result<()> {
	let mut builder = client
		.post(&request.url)
		.query(&request.auth)
		.header(CONTENT_TYPE, JSON_CONTENT_TYPE)
		.body(body);
	if let Some(encoding) = request.encoding.content_encoding() {
		builder = builder.header(CONTENT_ENCODING, encoding);
	}

	let response = builder.send().await?;
	let status = response.status();
	let retry_after = retry_after_secs(response.headers());
	if status.is_success() {
		return Ok(());
	}
	let message = response.text().await.unwrap_or_default();
	Err(status_error(status, retry_after, message))
}

fn send_blocking(
	client: &reqwest::blocking::Client,
	request: &TransportRequest,
	body: Vec<u8>,
) -> Result<()> {
	let mut builder = client
		.post(&request.url)
		.query(&request.auth)
		.header(CONTENT_TYPE, JSON_CONTENT_TYPE)
		.body(body);
	if let Some(encoding) = request.encoding.content_encoding() {
		builder = builder.header(CONTENT_ENCODING, encoding);
	}

	let response = builder.send()?;
	let status = response.status();
	let retry_after = retry_after_secs(response.headers());
	if status.is_success() {
		return Ok(());
	}
	let message = response.text().unwrap_or_default();
	Err(status_error(status, retry_after, message))
}

fn retry_after_secs(headers: &reqwest::header::HeaderMap) -> Option<u64> {
	headers
		.get(RETRY_AFTER)
		.and_then(|v| v.to_str().ok())
		.and_then(|s| s.parse().ok())
}

fn status_error(status: StatusCode, retry_after_secs: Option<u64>, message: String) -> CrashSdkError {
	if status == StatusCode::TOO_MANY_REQUESTS {
		return CrashSdkError::RateLimited { retry_after_secs };
	}
	CrashSdkError::ServerError {
		status: status.as_u16(),
		message,
	}
}

fn user_agent() -> String {
	format!("{SDK_NAME}/{SDK_VERSION}")
}

#[cfg(test)]
mod tests {
	use super::*;
	use flate2::read::ZlibDecoder;
	use loom_crash_core::SdkInfo;
	use std::io::Read;
	use wiremock::matchers::{header, method, path, query_param};
	use wiremock::{Mock, MockServer, ResponseTemplate};

	fn request(url: String, encoding: PayloadEncoding) -> TransportRequest {
		let mut data = Envelope::new(
			"42",
			SdkInfo {
				name: SDK_NAME.to_string(),
				version: SDK_VERSION.to_string(),
			},
		);
		data.message = Some("hello".to_string());
		TransportRequest {
			url,
			auth: vec![
				("sentry_version".to_string(), "7".to_string()),
				("sentry_key".to_string(), "public".to_string()),
			],
			encoding,
			data,
		}
	}

	#[test]
	fn test_deflate_roundtrips_to_json() {
		let req = request("http://localhost".to_string(), PayloadEncoding::Deflate);
		let compressed = req.encode().unwrap();

		let mut json = String::new();
		ZlibDecoder::new(compressed.as_slice())
			.read_to_string(&mut json)
			.unwrap();
		let plain = PayloadEncoding::Json.encode(&req.data).unwrap();
		assert_eq!(json.as_bytes(), plain.as_slice());
	}

	#[test]
	fn test_deflate_shrinks_repetitive_payloads() {
		let mut req = request("http://localhost".to_string(), PayloadEncoding::Deflate);
		req.data
			.extra
			.insert("state".to_string(), serde_json::json!("x".repeat(50_000)));

		let compressed = req.encode().unwrap();
		let plain = PayloadEncoding::Json.encode(&req.data).unwrap();
		assert!(compressed.len() < plain.len() / 10);
	}

	#[test]
	fn test_probe_without_runtime_selects_blocking() {
		let transport = HttpTransport::probe(Duration::from_secs(1)).unwrap();
		assert!(!transport.is_async());
	}

	#[tokio::test]
	async fn test_probe_inside_runtime_selects_async() {
		let transport = HttpTransport::probe(Duration::from_secs(1)).unwrap();
		assert!(transport.is_async());
	}

	#[tokio::test]
	async fn test_posts_json_with_query_auth() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/api/42/store/"))
			.and(query_param("sentry_key", "public"))
			.and(query_param("sentry_version", "7"))
			.and(header("content-type", JSON_CONTENT_TYPE))
			.respond_with(ResponseTemplate::new(200))
			.expect(1)
			.mount(&server)
			.await;

		let transport = HttpTransport::asynchronous(Duration::from_secs(5)).unwrap();
		let url = format!("{}/api/42/store/", server.uri());
		transport
			.send(request(url, PayloadEncoding::Json))
			.await
			.unwrap();

		let received = server.received_requests().await.unwrap();
		assert!(received[0].headers.get("authorization").is_none());
		let body: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
		assert_eq!(body["message"], "hello");
	}

	#[tokio::test]
	async fn test_deflate_sets_content_encoding() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(header("content-encoding", "deflate"))
			.respond_with(ResponseTemplate::new(200))
			.expect(1)
			.mount(&server)
			.await;

		let transport = HttpTransport::asynchronous(Duration::from_secs(5)).unwrap();
		transport
			.send(request(server.uri(), PayloadEncoding::Deflate))
			.await
			.unwrap();
	}

	#[tokio::test]
	async fn test_413_maps_to_payload_too_large() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.respond_with(ResponseTemplate::new(413).set_body_string("too large"))
			.mount(&server)
			.await;

		let transport = HttpTransport::asynchronous(Duration::from_secs(5)).unwrap();
		let err = transport
			.send(request(server.uri(), PayloadEncoding::Json))
			.await
			.unwrap_err();

		assert!(err.is_payload_too_large());
		assert!(matches!(err, CrashSdkError::ServerError { ref message, .. } if message == "too large"));
	}

	#[tokio::test]
	async fn test_429_maps_to_rate_limited() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "30"))
			.mount(&server)
			.await;

		let transport = HttpTransport::asynchronous(Duration::from_secs(5)).unwrap();
		let err = transport
			.send(request(server.uri(), PayloadEncoding::Json))
			.await
			.unwrap_err();

		assert!(matches!(
			err,
			CrashSdkError::RateLimited {
				retry_after_secs: Some(30)
			}
		));
	}

	#[tokio::test(flavor = "multi_thread")]
	async fn test_blocking_variant_runs_on_blocking_pool() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.respond_with(ResponseTemplate::new(200))
			.expect(1)
			.mount(&server)
			.await;

		let transport = tokio::task::spawn_blocking(|| HttpTransport::blocking(Duration::from_secs(5)))
			.await
			.unwrap()
			.unwrap();
		transport
			.send(request(server.uri(), PayloadEncoding::Json))
			.await
			.unwrap();

		tokio::task::spawn_blocking(move || drop(transport))
			.await
			.unwrap();
	}
}
