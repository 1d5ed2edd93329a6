// Copyright (c) 2025 - Cowboy AI, Inc.
//! Task timing

use std::future::Future;
use tokio::time::Instant;
use tracing::info;

/// Await `future` and log how long it took
pub async fn timed<F>(label: &str, future: F) -> F::Output
where
    F: Future,
{
    let started = Instant::now();
    let output = future.await;
    info!("{} took {:?}", label, started.elapsed());
    output
}
