// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The store-facing seams of the middleware.

/// Read access to a store's current state.
pub trait StateSource<S>: Send + Sync {
	fn get_state(&self) -> S;
}

impl<S, F> StateSource<S> for F
where
	F: Fn() -> S + Send + Sync,
{
	fn get_state(&self) -> S {
		self()
	}
}

/// A dispatch interceptor.
///
/// `next` is the rest of the dispatch pipeline; whatever it returns is
/// returned unchanged.
pub trait Middleware<A> {
	fn dispatch<R, N>(&self, action: A, next: N) -> R
	where
		N: FnOnce(A) -> R;
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::{Arc, Mutex};

	#[test]
	fn test_closure_reads_live_state() {
		let state = Arc::new(Mutex::new(1));
		let source = {
			let state = state.clone();
			move || *state.lock().unwrap()
		};

		assert_eq!(source.get_state(), 1);
		*state.lock().unwrap() = 2;
		assert_eq!(source.get_state(), 2);
	}
}
