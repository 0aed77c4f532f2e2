use std::sync::Arc;

use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tracing::{error, info};

use super::{engine::distribute, selection::SelectionPolicy};
use crate::calendar::{today_utc, until_next_hour};
use crate::store::DiaryStore;

/// Run the distribution every day at `hour_utc`:00 UTC for as long as the
/// process lives. A failed run is logged and the next slot is still scheduled.
pub fn spawn_daily(
    store: Arc<dyn DiaryStore>,
    policy: SelectionPolicy,
    hour_utc: u8,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let wait = match until_next_hour(OffsetDateTime::now_utc(), hour_utc) {
                Ok(w) => w,
                Err(e) => {
                    error!(error = %e, hour_utc, "scheduler disabled");
                    return;
                }
            };
            info!(hour_utc, wait_secs = wait.as_secs(), "next distribution scheduled");
            tokio::time::sleep(wait).await;

            match distribute(store.as_ref(), &policy, today_utc()).await {
                Ok(report) => info!(
                    delivered = report.delivered,
                    failed = report.failures.len(),
                    "scheduled distribution finished"
                ),
                Err(e) => error!(error = %e, "scheduled distribution failed"),
            }
        }
    })
}
