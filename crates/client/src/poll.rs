//! Polling a resource until it reports a given status.

use crate::retry::{self, OperationClass, RetryDefaults, RetryStrategy};
use ovirt_common::{Error, Result};
use std::fmt::Display;
use std::future::Future;
use std::sync::{Mutex, PoisonError};

/// Fetch the resource until its status equals `target`.
///
/// `fetch` returns the latest snapshot along with its status. Fetch errors the
/// strategies do not retry end the wait immediately. When the budget runs out
/// the error is a [`Error::StatusTimeout`] naming the last status seen.
pub(crate) async fn wait_for_status<T, S, F, Fut>(
    resource: String,
    target: S,
    strategies: &[RetryStrategy],
    defaults: &RetryDefaults,
    mut fetch: F,
) -> Result<T>
where
    S: Copy + PartialEq + Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(T, S)>>,
{
    let last_observed: Mutex<Option<String>> = Mutex::new(None);
    let action = format!("waiting for {resource} to reach status {target}");

    let observed = &last_observed;
    let name = resource.as_str();
    let result = retry::execute(
        &action,
        OperationClass::Wait,
        strategies,
        defaults,
        move |attempt| {
            let snapshot = fetch();
            async move {
                let (value, status) = snapshot.await?;
                tracing::debug!(resource = name, %status, %target, attempt, "Polled status");
                *observed.lock().unwrap_or_else(PoisonError::into_inner) =
                    Some(status.to_string());
                if status == target {
                    Ok(value)
                } else {
                    Err(Error::Pending(format!("{name} is {status}")))
                }
            }
        },
    )
    .await;

    match result {
        Err(Error::RetriesExhausted { attempts, last, .. })
            if matches!(last.as_ref(), Error::Pending(_)) =>
        {
            let last_observed = last_observed
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            tracing::warn!(%resource, %target, attempts, ?last_observed, "Status wait timed out");
            Err(Error::StatusTimeout {
                resource,
                target: target.to_string(),
                last_observed,
                attempts,
            })
        }
        other => other,
    }
}
