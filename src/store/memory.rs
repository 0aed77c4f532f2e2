use std::collections::HashSet;

use async_trait::async_trait;
use time::{Date, OffsetDateTime};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{Diary, DiaryStore, SaveOutcome, SavedDiary, SavedRecord, User};
use crate::calendar::{day_bounds, day_of};

struct DeliveryRow {
    recipient_id: Uuid,
    diary_id: Uuid,
    date: Date,
}

#[derive(Default)]
struct Inner {
    users: Vec<User>,
    // Insertion order; iterate in reverse for newest first.
    diaries: Vec<Diary>,
    deliveries: Vec<DeliveryRow>,
    saved: Vec<SavedRecord>,
    delivery_writes: u64,
    failing_recipients: HashSet<Uuid>,
}

/// Process-local store for development and tests. All state lives behind one
/// lock, so each trait call is atomic.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `replace_deliveries` call for `recipient_id` fail.
    pub async fn fail_deliveries_for(&self, recipient_id: Uuid) {
        self.inner.lock().await.failing_recipients.insert(recipient_id);
    }

    /// Number of successful `replace_deliveries` calls.
    pub async fn delivery_writes(&self) -> u64 {
        self.inner.lock().await.delivery_writes
    }

    /// Total delivery rows currently held for `date`.
    pub async fn delivery_count(&self, date: Date) -> usize {
        let inner = self.inner.lock().await;
        inner.deliveries.iter().filter(|d| d.date == date).count()
    }

    pub async fn diary(&self, diary_id: Uuid) -> Option<Diary> {
        let inner = self.inner.lock().await;
        inner.diaries.iter().find(|d| d.id == diary_id).cloned()
    }
}

#[async_trait]
impl DiaryStore for MemoryStore {
    async fn create_user(&self) -> anyhow::Result<User> {
        let user = User {
            id: Uuid::new_v4(),
            created_at: OffsetDateTime::now_utc(),
        };
        self.inner.lock().await.users.push(user.clone());
        Ok(user)
    }

    async fn user_exists(&self, user_id: Uuid) -> anyhow::Result<bool> {
        let inner = self.inner.lock().await;
        Ok(inner.users.iter().any(|u| u.id == user_id))
    }

    async fn list_user_ids(&self) -> anyhow::Result<Vec<Uuid>> {
        let inner = self.inner.lock().await;
        Ok(inner.users.iter().map(|u| u.id).collect())
    }

    async fn create_diary(&self, author_id: Uuid, content: &str) -> anyhow::Result<Diary> {
        let mut inner = self.inner.lock().await;
        anyhow::ensure!(
            inner.users.iter().any(|u| u.id == author_id),
            "unknown author {author_id}"
        );
        let diary = Diary {
            id: Uuid::new_v4(),
            author_id,
            content: content.to_string(),
            created_at: OffsetDateTime::now_utc(),
            saved_count: 0,
        };
        inner.diaries.push(diary.clone());
        Ok(diary)
    }

    async fn diaries_by_author(&self, author_id: Uuid) -> anyhow::Result<Vec<Diary>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .diaries
            .iter()
            .rev()
            .filter(|d| d.author_id == author_id)
            .cloned()
            .collect())
    }

    async fn saved_diaries_by_author(&self, author_id: Uuid) -> anyhow::Result<Vec<Diary>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .diaries
            .iter()
            .rev()
            .filter(|d| d.author_id == author_id && d.saved_count > 0)
            .cloned()
            .collect())
    }

    async fn candidate_diaries(
        &self,
        recipient_id: Uuid,
        limit: usize,
    ) -> anyhow::Result<Vec<Diary>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .diaries
            .iter()
            .rev()
            .filter(|d| d.author_id != recipient_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn replace_deliveries(
        &self,
        recipient_id: Uuid,
        date: Date,
        diary_ids: &[Uuid],
    ) -> anyhow::Result<u64> {
        let mut inner = self.inner.lock().await;
        if inner.failing_recipients.contains(&recipient_id) {
            anyhow::bail!("delivery write rejected for {recipient_id}");
        }

        inner
            .deliveries
            .retain(|d| !(d.recipient_id == recipient_id && d.date == date));

        let mut seen = HashSet::new();
        let mut batch = Vec::with_capacity(diary_ids.len());
        for id in diary_ids {
            let eligible = inner
                .diaries
                .iter()
                .any(|d| d.id == *id && d.author_id != recipient_id);
            if eligible && seen.insert(*id) {
                batch.push(DeliveryRow {
                    recipient_id,
                    diary_id: *id,
                    date,
                });
            }
        }
        let written = batch.len() as u64;
        inner.deliveries.extend(batch);
        inner.delivery_writes += 1;
        Ok(written)
    }

    async fn delivered_diaries(&self, recipient_id: Uuid, date: Date) -> anyhow::Result<Vec<Diary>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .deliveries
            .iter()
            .filter(|d| d.recipient_id == recipient_id && d.date == date)
            .filter_map(|d| inner.diaries.iter().find(|x| x.id == d.diary_id).cloned())
            .collect())
    }

    async fn save_diary(
        &self,
        user_id: Uuid,
        diary_id: Uuid,
        now: OffsetDateTime,
    ) -> anyhow::Result<SaveOutcome> {
        let mut inner = self.inner.lock().await;
        if !inner.diaries.iter().any(|d| d.id == diary_id) {
            return Ok(SaveOutcome::DiaryNotFound);
        }

        let (start, end) = day_bounds(day_of(now));
        let already = inner
            .saved
            .iter()
            .any(|s| s.user_id == user_id && s.created_at >= start && s.created_at < end);
        if already {
            return Ok(SaveOutcome::AlreadySavedToday);
        }

        let record = SavedRecord {
            id: Uuid::new_v4(),
            user_id,
            diary_id,
            created_at: now,
        };
        inner.saved.push(record.clone());
        if let Some(diary) = inner.diaries.iter_mut().find(|d| d.id == diary_id) {
            diary.saved_count += 1;
        }
        Ok(SaveOutcome::Saved(record))
    }

    async fn saved_by_user(&self, user_id: Uuid) -> anyhow::Result<Vec<SavedDiary>> {
        let inner = self.inner.lock().await;
        let mut rows: Vec<SavedDiary> = inner
            .saved
            .iter()
            .filter(|s| s.user_id == user_id)
            .filter_map(|s| {
                inner
                    .diaries
                    .iter()
                    .find(|d| d.id == s.diary_id)
                    .map(|d| SavedDiary {
                        id: d.id,
                        content: d.content.clone(),
                        created_at: d.created_at,
                        saved_at: s.created_at,
                    })
            })
            .collect();
        rows.sort_by(|a, b| b.saved_at.cmp(&a.saved_at));
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime};

    #[tokio::test]
    async fn candidates_exclude_own_and_are_newest_first() {
        let store = MemoryStore::new();
        let a = store.create_user().await.unwrap();
        let b = store.create_user().await.unwrap();
        store.create_diary(a.id, "mine").await.unwrap();
        let older = store.create_diary(b.id, "older").await.unwrap();
        let newer = store.create_diary(b.id, "newer").await.unwrap();

        let pool = store.candidate_diaries(a.id, 10).await.unwrap();
        let ids: Vec<_> = pool.iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![newer.id, older.id]);

        let capped = store.candidate_diaries(a.id, 1).await.unwrap();
        assert_eq!(capped.len(), 1);
    }

    #[tokio::test]
    async fn replace_deliveries_drops_self_authored_and_duplicates() {
        let store = MemoryStore::new();
        let a = store.create_user().await.unwrap();
        let b = store.create_user().await.unwrap();
        let own = store.create_diary(a.id, "own").await.unwrap();
        let other = store.create_diary(b.id, "other").await.unwrap();
        let day = date!(2024 - 06 - 01);

        let written = store
            .replace_deliveries(a.id, day, &[own.id, other.id, other.id])
            .await
            .unwrap();
        assert_eq!(written, 1);
        let got = store.delivered_diaries(a.id, day).await.unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].id, other.id);
    }

    #[tokio::test]
    async fn create_diary_requires_known_author() {
        let store = MemoryStore::new();
        assert!(store.create_diary(Uuid::new_v4(), "x").await.is_err());
    }

    #[tokio::test]
    async fn save_window_is_the_utc_day() {
        let store = MemoryStore::new();
        let a = store.create_user().await.unwrap();
        let b = store.create_user().await.unwrap();
        let d = store.create_diary(b.id, "d").await.unwrap();

        let late = datetime!(2024-06-01 23:59:59 UTC);
        let next = datetime!(2024-06-02 00:00:00 UTC);
        assert!(matches!(
            store.save_diary(a.id, d.id, late).await.unwrap(),
            SaveOutcome::Saved(_)
        ));
        assert!(matches!(
            store.save_diary(a.id, d.id, next).await.unwrap(),
            SaveOutcome::Saved(_)
        ));
        assert_eq!(store.diary(d.id).await.unwrap().saved_count, 2);

        let saved = store.saved_by_user(a.id).await.unwrap();
        assert_eq!(saved.len(), 2);
        assert_eq!(saved[0].saved_at, next);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_saves_keep_one_per_day_and_count_every_user() {
        let store = std::sync::Arc::new(MemoryStore::new());
        let author = store.create_user().await.unwrap();
        let reader = store.create_user().await.unwrap();
        let diary_id = store.create_diary(author.id, "d").await.unwrap().id;
        let reader_id = reader.id;
        let now = datetime!(2024-06-01 12:00:00 UTC);

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.save_diary(reader_id, diary_id, now).await.unwrap() })
            })
            .collect();
        let mut saved = 0;
        for task in tasks {
            match task.await.unwrap() {
                SaveOutcome::Saved(_) => saved += 1,
                SaveOutcome::AlreadySavedToday => {}
                SaveOutcome::DiaryNotFound => panic!("diary vanished"),
            }
        }
        assert_eq!(saved, 1);
        assert_eq!(store.diary(diary_id).await.unwrap().saved_count, 1);

        let fresh_id = store.create_diary(author.id, "fresh").await.unwrap().id;
        let mut readers = Vec::new();
        for _ in 0..12 {
            readers.push(store.create_user().await.unwrap().id);
        }
        let tasks: Vec<_> = readers
            .iter()
            .map(|&user_id| {
                let store = store.clone();
                tokio::spawn(async move { store.save_diary(user_id, fresh_id, now).await.unwrap() })
            })
            .collect();
        for task in tasks {
            assert!(matches!(task.await.unwrap(), SaveOutcome::Saved(_)));
        }
        assert_eq!(store.diary(fresh_id).await.unwrap().saved_count, 12);
    }
}
