//! Fan-out of the per-package pipeline.
//!
//! One task per package, bounded by a semaphore. The first failure cancels a
//! shared token: tasks still waiting for a permit return without starting and
//! running tasks are dropped at their next await point.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use np_core::Error;

use super::PackageSpec;

pub(super) async fn run<T, F, Fut>(
    specs: &[PackageSpec],
    concurrency: usize,
    job: F,
) -> Result<Vec<T>, Error>
where
    T: Send + 'static,
    F: Fn(PackageSpec) -> Fut,
    Fut: Future<Output = Result<T, Error>> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let token = CancellationToken::new();
    let mut tasks = JoinSet::new();

    for (index, spec) in specs.iter().enumerate() {
        let semaphore = Arc::clone(&semaphore);
        let token = token.clone();
        let name = spec.name.clone();
        let pipeline = job(spec.clone());

        tasks.spawn(async move {
            let cancelled = || Error::Cancelled { name: name.clone() };

            let outcome = async {
                let _permit = tokio::select! {
                    biased;
                    _ = token.cancelled() => return Err(cancelled()),
                    permit = semaphore.acquire_owned() => permit.map_err(|_| cancelled())?,
                };

                debug!(package = %name, "starting");
                tokio::select! {
                    biased;
                    _ = token.cancelled() => Err(cancelled()),
                    result = pipeline => result,
                }
            }
            .await;

            if let Err(e) = &outcome
                && !e.is_cancellation()
            {
                token.cancel();
            }
            (index, outcome)
        });
    }

    let mut results: Vec<Option<T>> = specs.iter().map(|_| None).collect();
    let mut failures = Vec::new();
    let mut cancelled = Vec::new();

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, Ok(value))) => results[index] = Some(value),
            Ok((index, Err(e))) if e.is_cancellation() => cancelled.push(index),
            Ok((index, Err(e))) => failures.push((index, e)),
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(_) => {}
        }
    }

    if failures.is_empty() && cancelled.is_empty() {
        return Ok(results.into_iter().flatten().collect());
    }

    failures.sort_by_key(|(index, _)| *index);
    cancelled.sort_unstable();

    Err(Error::BatchFailed {
        failures: failures.into_iter().map(|(_, e)| e).collect(),
        cancelled: cancelled
            .into_iter()
            .map(|index| specs[index].name.clone())
            .collect(),
    })
}
