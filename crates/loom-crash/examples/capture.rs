// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Example: Capture a crash event using the loom-crash SDK.
//!
//! Run with:
//!   cargo run --example capture -p loom-crash

use loom_crash::{Breadcrumb, BreadcrumbLevel, CaptureOutcome, CrashClient, UserContext};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	// Configure from environment or use defaults for testing
	let auth_token = std::env::var("LOOM_AUTH_TOKEN")?;
	let base_url =
		std::env::var("LOOM_BASE_URL").unwrap_or_else(|_| "https://crash.example.com".to_string());
	let project_id = std::env::var("LOOM_PROJECT_ID")?;

	println!("Initializing crash client...");
	println!("  Base URL: {}", base_url);
	println!("  Project ID: {}", project_id);

	let client = CrashClient::builder()
		.auth_token(&auth_token)
		.base_url(&base_url)
		.project_id(&project_id)
		.release("0.1.0-example")
		.environment("development")
		.server_name("example-server")
		.build()?;

	client.set_user(UserContext {
		id: Some("user_example_123".to_string()),
		email: Some("example@example.com".to_string()),
		username: Some("example_user".to_string()),
		ip_address: None,
	})?;
	client.set_tag("example", "true")?;

	client.capture_breadcrumb(Breadcrumb::new("startup").with_message("Application started"))?;
	client.capture_breadcrumb(Breadcrumb {
		category: "http".into(),
		message: Some("GET /api/data failed".into()),
		level: BreadcrumbLevel::Warning,
		..Default::default()
	})?;

	println!("\nCapturing test error...");
	match client
		.capture_message("Example test error from loom-crash SDK", BreadcrumbLevel::Error)
		.await?
	{
		CaptureOutcome::Sent { event_id } => println!("  Event ID: {}", event_id),
		CaptureOutcome::Duplicate => println!("  Dropped as duplicate"),
	}

	client.shutdown();
	println!("\nClient shutdown complete.");

	Ok(())
}
