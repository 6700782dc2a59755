//! Platform shims for running detached work and waiting on timers.
//!
//! Everything here is single threaded. On native targets tasks must be spawned
//! from inside a [`tokio::task::LocalSet`].

use std::future::Future;
use std::time::Duration;

#[cfg(target_arch = "wasm32")]
pub fn spawn<F>(future: F)
where
	F: Future<Output = ()> + 'static,
{
	wasm_bindgen_futures::spawn_local(future);
}

#[cfg(not(target_arch = "wasm32"))]
pub fn spawn<F>(future: F)
where
	F: Future<Output = ()> + 'static,
{
	tokio::task::spawn_local(future);
}

#[cfg(target_arch = "wasm32")]
pub async fn sleep(duration: Duration) {
	gloo_timers::future::sleep(duration).await;
}

#[cfg(not(target_arch = "wasm32"))]
pub async fn sleep(duration: Duration) {
	tokio::time::sleep(duration).await;
}
