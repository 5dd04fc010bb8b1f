//! User-initiated mutations: outcome to the notification sink, refresh on success

use std::future::Future;

use crate::error::RequestOutcome;
use crate::notify::{NoticeKind, NotificationSink};
use crate::polling::Refreshable;

/// Run a mutation on behalf of the user.
///
/// Success is reported as `"{label} succeeded"` and refreshes every target in
/// `refresh`; failure is reported as `"{label} failed: {message}"`. The
/// outcome is returned unchanged.
pub async fn run_mutation<T, Fut>(
    label: &str,
    action: Fut,
    sink: &dyn NotificationSink,
    refresh: &[&dyn Refreshable],
) -> RequestOutcome<T>
where
    Fut: Future<Output = RequestOutcome<T>>,
{
    tracing::debug!("Running mutation '{}'", label);
    let outcome = action.await;

    match &outcome {
        Ok(_) => {
            sink.notify(NoticeKind::Success, &format!("{} succeeded", label));
            for target in refresh {
                target.refresh().await;
            }
        }
        Err(e) => {
            tracing::warn!("Mutation '{}' failed: {}", label, e);
            sink.notify(NoticeKind::Error, &format!("{} failed: {}", label, e));
        }
    }

    outcome
}
