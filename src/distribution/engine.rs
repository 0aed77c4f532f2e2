use serde::Serialize;
use time::Date;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::selection::SelectionPolicy;
use crate::calendar::serialize_date;
use crate::store::DiaryStore;

#[derive(Debug, Clone, Serialize)]
pub struct DeliveryFailure {
    pub user_id: Uuid,
    pub error: String,
}

/// Summary of one distribution run.
#[derive(Debug, Clone, Serialize)]
pub struct DistributionReport {
    #[serde(serialize_with = "serialize_date")]
    pub delivery_date: Date,
    pub users: usize,
    pub delivered: u64,
    pub users_without_candidates: usize,
    pub failures: Vec<DeliveryFailure>,
}

impl DistributionReport {
    fn empty(delivery_date: Date) -> Self {
        Self {
            delivery_date,
            users: 0,
            delivered: 0,
            users_without_candidates: 0,
            failures: Vec::new(),
        }
    }
}

/// Deliver a fresh batch of other users' diaries to every user for `for_date`.
///
/// Each user's batch replaces whatever that user already had for the date, so
/// re-running a date never duplicates deliveries. A failure for one user is
/// logged and reported and the run moves on to the next user. Only failing to
/// enumerate users aborts the run.
#[instrument(skip(store, policy), fields(strategy = ?policy.strategy))]
pub async fn distribute(
    store: &dyn DiaryStore,
    policy: &SelectionPolicy,
    for_date: Date,
) -> anyhow::Result<DistributionReport> {
    let mut report = DistributionReport::empty(for_date);

    let users = store.list_user_ids().await?;
    if users.is_empty() {
        info!("no users found");
        return Ok(report);
    }
    info!(users = users.len(), "starting diary distribution");
    report.users = users.len();

    for user_id in users {
        match deliver_to(store, policy, user_id, for_date).await {
            Ok(0) => {
                report.users_without_candidates += 1;
                warn!(%user_id, "no diaries available");
            }
            Ok(n) => {
                report.delivered += n;
                info!(%user_id, delivered = n, "diaries delivered");
            }
            Err(e) => {
                error!(%user_id, error = %e, "delivery failed");
                report.failures.push(DeliveryFailure {
                    user_id,
                    error: format!("{e:#}"),
                });
            }
        }
    }

    info!(
        delivered = report.delivered,
        failed = report.failures.len(),
        "diary distribution completed"
    );
    Ok(report)
}

async fn deliver_to(
    store: &dyn DiaryStore,
    policy: &SelectionPolicy,
    user_id: Uuid,
    for_date: Date,
) -> anyhow::Result<u64> {
    let pool = store.candidate_diaries(user_id, policy.pool_size).await?;
    let picked = policy.select(user_id, pool, &mut rand::thread_rng());
    if picked.is_empty() {
        return Ok(0);
    }
    let ids: Vec<Uuid> = picked.iter().map(|d| d.id).collect();
    store.replace_deliveries(user_id, for_date, &ids).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribution::selection::SelectionStrategy;
    use crate::store::MemoryStore;
    use std::collections::HashSet;
    use time::macros::date;

    fn newest() -> SelectionPolicy {
        SelectionPolicy::new(SelectionStrategy::Newest, 5, 100)
    }

    #[tokio::test]
    async fn zero_users_writes_nothing() {
        let store = MemoryStore::new();
        let day = date!(2024 - 04 - 01);
        let report = distribute(&store, &newest(), day).await.unwrap();
        assert_eq!(report.users, 0);
        assert_eq!(report.delivered, 0);
        assert!(report.failures.is_empty());
        assert_eq!(store.delivery_writes().await, 0);
    }

    #[tokio::test]
    async fn two_user_scenario_never_delivers_own_diaries() {
        let store = MemoryStore::new();
        let a = store.create_user().await.unwrap();
        let b = store.create_user().await.unwrap();
        let d1 = store.create_diary(a.id, "d1").await.unwrap();
        let d2 = store.create_diary(b.id, "d2").await.unwrap();
        let d3 = store.create_diary(b.id, "d3").await.unwrap();
        let day = date!(2024 - 04 - 01);

        let report = distribute(&store, &newest(), day).await.unwrap();
        assert_eq!(report.users, 2);
        assert_eq!(report.delivered, 3);

        let for_a: HashSet<_> = store
            .delivered_diaries(a.id, day)
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(for_a, HashSet::from([d2.id, d3.id]));

        let for_b = store.delivered_diaries(b.id, day).await.unwrap();
        assert_eq!(for_b.len(), 1);
        assert_eq!(for_b[0].id, d1.id);
    }

    #[tokio::test]
    async fn sole_author_gets_nothing_and_others_still_served() {
        let store = MemoryStore::new();
        let author = store.create_user().await.unwrap();
        let reader = store.create_user().await.unwrap();
        store.create_diary(author.id, "only one").await.unwrap();
        let day = date!(2024 - 04 - 02);

        let report = distribute(&store, &newest(), day).await.unwrap();
        assert_eq!(report.users_without_candidates, 1);
        assert!(store.delivered_diaries(author.id, day).await.unwrap().is_empty());
        assert_eq!(store.delivered_diaries(reader.id, day).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn caps_batch_at_per_user_limit() {
        let store = MemoryStore::new();
        let reader = store.create_user().await.unwrap();
        let writer = store.create_user().await.unwrap();
        for i in 0..9 {
            store.create_diary(writer.id, &format!("entry {i}")).await.unwrap();
        }
        let day = date!(2024 - 04 - 03);

        let policy = SelectionPolicy::new(SelectionStrategy::Shuffled, 5, 100);
        distribute(&store, &policy, day).await.unwrap();
        assert_eq!(store.delivered_diaries(reader.id, day).await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn rerun_for_same_date_replaces_instead_of_duplicating() {
        let store = MemoryStore::new();
        let a = store.create_user().await.unwrap();
        let b = store.create_user().await.unwrap();
        store.create_diary(a.id, "a1").await.unwrap();
        store.create_diary(b.id, "b1").await.unwrap();
        let day = date!(2024 - 04 - 04);

        distribute(&store, &newest(), day).await.unwrap();
        assert_eq!(store.delivery_count(day).await, 2);

        let late = store.create_diary(b.id, "b2").await.unwrap();
        distribute(&store, &newest(), day).await.unwrap();
        assert_eq!(store.delivery_count(day).await, 3);

        let for_a = store.delivered_diaries(a.id, day).await.unwrap();
        assert_eq!(for_a.len(), 2);
        assert_eq!(for_a[0].id, late.id);

        // Other dates are untouched by a re-run.
        let next = date!(2024 - 04 - 05);
        distribute(&store, &newest(), next).await.unwrap();
        assert_eq!(store.delivery_count(day).await, 3);
        assert_eq!(store.delivery_count(next).await, 3);
    }

    #[tokio::test]
    async fn failing_user_is_reported_and_run_continues() {
        let store = MemoryStore::new();
        let broken = store.create_user().await.unwrap();
        let fine = store.create_user().await.unwrap();
        let writer = store.create_user().await.unwrap();
        store.create_diary(writer.id, "hello").await.unwrap();
        store.create_diary(broken.id, "from broken").await.unwrap();
        store.fail_deliveries_for(broken.id).await;
        let day = date!(2024 - 04 - 06);

        let report = distribute(&store, &newest(), day).await.unwrap();
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].user_id, broken.id);
        assert!(store.delivered_diaries(broken.id, day).await.unwrap().is_empty());
        assert_eq!(store.delivered_diaries(fine.id, day).await.unwrap().len(), 2);
        assert_eq!(store.delivered_diaries(writer.id, day).await.unwrap().len(), 1);
    }

    #[test]
    fn report_serializes_date_as_iso() {
        let report = DistributionReport::empty(date!(2024 - 12 - 31));
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["delivery_date"], "2024-12-31");
        assert_eq!(json["users"], 0);
    }
}
