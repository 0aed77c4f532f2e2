use std::collections::HashSet;

use rand::{seq::SliceRandom, Rng};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::Diary;

/// How a recipient's daily batch is picked from the candidate pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionStrategy {
    /// First N of the pool, which the store orders newest first.
    Newest,
    /// Uniform random N out of the pool.
    Shuffled,
}

impl std::str::FromStr for SelectionStrategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "newest" | "first" => Ok(Self::Newest),
            "shuffled" | "random" => Ok(Self::Shuffled),
            other => anyhow::bail!("unknown SELECTION_STRATEGY {other:?}"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SelectionPolicy {
    pub strategy: SelectionStrategy,
    pub per_user: usize,
    pub pool_size: usize,
}

impl SelectionPolicy {
    pub fn new(strategy: SelectionStrategy, per_user: usize, pool_size: usize) -> Self {
        Self {
            strategy,
            per_user,
            // A pool smaller than the batch would starve `Shuffled`.
            pool_size: pool_size.max(per_user),
        }
    }

    /// Pick at most `per_user` diaries for `recipient_id` out of `pool`.
    ///
    /// Self-authored entries and repeated ids are dropped first, so the result
    /// never pads or repeats. An empty pool yields an empty batch.
    pub fn select<R: Rng + ?Sized>(
        &self,
        recipient_id: Uuid,
        pool: Vec<Diary>,
        rng: &mut R,
    ) -> Vec<Diary> {
        let mut seen = HashSet::new();
        let mut eligible: Vec<Diary> = pool
            .into_iter()
            .filter(|d| d.author_id != recipient_id)
            .filter(|d| seen.insert(d.id))
            .take(self.pool_size)
            .collect();

        match self.strategy {
            SelectionStrategy::Newest => {
                eligible.truncate(self.per_user);
                eligible
            }
            SelectionStrategy::Shuffled => {
                let n = self.per_user.min(eligible.len());
                let (picked, _) = eligible.partial_shuffle(rng, n);
                picked.to_vec()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};
    use time::OffsetDateTime;

    fn diary(author_id: Uuid) -> Diary {
        Diary {
            id: Uuid::new_v4(),
            author_id,
            content: "entry".into(),
            created_at: OffsetDateTime::now_utc(),
            saved_count: 0,
        }
    }

    #[test]
    fn empty_pool_yields_empty_batch() {
        let policy = SelectionPolicy::new(SelectionStrategy::Newest, 5, 100);
        let mut rng = StdRng::seed_from_u64(1);
        assert!(policy.select(Uuid::new_v4(), vec![], &mut rng).is_empty());
    }

    #[test]
    fn newest_takes_first_n_in_pool_order() {
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();
        let pool: Vec<_> = (0..8).map(|_| diary(other)).collect();
        let expected: Vec<_> = pool.iter().take(5).map(|d| d.id).collect();

        let policy = SelectionPolicy::new(SelectionStrategy::Newest, 5, 100);
        let mut rng = StdRng::seed_from_u64(1);
        let got: Vec<_> = policy.select(me, pool, &mut rng).iter().map(|d| d.id).collect();
        assert_eq!(got, expected);
    }

    #[test]
    fn own_and_duplicate_entries_never_selected() {
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();
        let mine = diary(me);
        let theirs = diary(other);
        let pool = vec![mine.clone(), theirs.clone(), theirs.clone(), mine];

        for strategy in [SelectionStrategy::Newest, SelectionStrategy::Shuffled] {
            let policy = SelectionPolicy::new(strategy, 5, 100);
            let mut rng = StdRng::seed_from_u64(7);
            let got = policy.select(me, pool.clone(), &mut rng);
            assert_eq!(got.len(), 1, "{strategy:?}");
            assert_eq!(got[0].id, theirs.id);
        }
    }

    #[test]
    fn shuffled_returns_distinct_subset_of_bounded_pool() {
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();
        let pool: Vec<_> = (0..20).map(|_| diary(other)).collect();
        let bounded: HashSet<_> = pool.iter().take(10).map(|d| d.id).collect();

        let policy = SelectionPolicy::new(SelectionStrategy::Shuffled, 5, 10);
        let mut rng = StdRng::seed_from_u64(42);
        let got = policy.select(me, pool, &mut rng);
        assert_eq!(got.len(), 5);
        let ids: HashSet<_> = got.iter().map(|d| d.id).collect();
        assert_eq!(ids.len(), 5);
        assert!(ids.is_subset(&bounded));
    }

    #[test]
    fn short_pool_is_returned_whole() {
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();
        let pool: Vec<_> = (0..3).map(|_| diary(other)).collect();
        let policy = SelectionPolicy::new(SelectionStrategy::Shuffled, 5, 100);
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(policy.select(me, pool, &mut rng).len(), 3);
    }

    #[test]
    fn strategy_names_parse() {
        assert_eq!("newest".parse::<SelectionStrategy>().unwrap(), SelectionStrategy::Newest);
        assert_eq!("RANDOM".parse::<SelectionStrategy>().unwrap(), SelectionStrategy::Shuffled);
        assert!("fifo".parse::<SelectionStrategy>().is_err());
    }
}
