// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Enrichment stages run on every envelope before it is sent.

use std::fmt;
use std::sync::Arc;

use loom_crash_core::Envelope;

/// A stage that may rewrite an envelope before it is sent.
pub trait EnrichmentStage: Send + Sync {
	fn enrich(&self, envelope: &mut Envelope);
}

impl<F> EnrichmentStage for F
where
	F: Fn(&mut Envelope) + Send + Sync,
{
	fn enrich(&self, envelope: &mut Envelope) {
		self(envelope)
	}
}

/// Ordered sequence of enrichment stages, applied in registration order.
#[derive(Clone, Default)]
pub struct EnrichmentChain {
	stages: Vec<Arc<dyn EnrichmentStage>>,
}

impl EnrichmentChain {
	pub fn new() -> Self {
		Self::default()
	}

	/// A chain made of a single stage.
	pub fn single(stage: Arc<dyn EnrichmentStage>) -> Self {
		Self {
			stages: vec![stage],
		}
	}

	/// Appends a stage; it runs after every stage registered before it.
	pub fn push(&mut self, stage: Arc<dyn EnrichmentStage>) {
		self.stages.push(stage);
	}

	pub fn len(&self) -> usize {
		self.stages.len()
	}

	pub fn is_empty(&self) -> bool {
		self.stages.is_empty()
	}

	pub fn apply(&self, envelope: &mut Envelope) {
		for stage in &self.stages {
			stage.enrich(envelope);
		}
	}
}

impl fmt::Debug for EnrichmentChain {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("EnrichmentChain")
			.field("stages", &self.stages.len())
			.finish()
	}
}
