use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// User record. Users are anonymous and carry nothing but an id.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Diary {
    pub id: Uuid,
    #[sqlx(rename = "user_id")]
    pub author_id: Uuid,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub saved_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SavedRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub diary_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// A saved diary joined with the moment it was saved.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SavedDiary {
    pub id: Uuid,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub saved_at: OffsetDateTime,
}

/// Result of a save attempt. Store failures travel separately as `Err`.
#[derive(Debug, Clone)]
pub enum SaveOutcome {
    Saved(SavedRecord),
    AlreadySavedToday,
    DiaryNotFound,
}

/// Record store the engine runs against.
///
/// Every method is a single logical store operation; implementations must make
/// `replace_deliveries` and `save_diary` atomic.
#[async_trait]
pub trait DiaryStore: Send + Sync {
    async fn create_user(&self) -> anyhow::Result<User>;
    async fn user_exists(&self, user_id: Uuid) -> anyhow::Result<bool>;
    async fn list_user_ids(&self) -> anyhow::Result<Vec<Uuid>>;

    async fn create_diary(&self, author_id: Uuid, content: &str) -> anyhow::Result<Diary>;
    /// The author's diaries, newest first.
    async fn diaries_by_author(&self, author_id: Uuid) -> anyhow::Result<Vec<Diary>>;
    /// The author's diaries with `saved_count > 0`, newest first.
    async fn saved_diaries_by_author(&self, author_id: Uuid) -> anyhow::Result<Vec<Diary>>;
    /// Up to `limit` diaries not written by `recipient_id`, newest first.
    async fn candidate_diaries(&self, recipient_id: Uuid, limit: usize)
        -> anyhow::Result<Vec<Diary>>;

    /// Replace the recipient's deliveries for `date` with `diary_ids`, in order.
    /// Returns the number of records written.
    async fn replace_deliveries(
        &self,
        recipient_id: Uuid,
        date: Date,
        diary_ids: &[Uuid],
    ) -> anyhow::Result<u64>;
    /// Diaries delivered to the recipient on `date`, in delivery order.
    async fn delivered_diaries(&self, recipient_id: Uuid, date: Date) -> anyhow::Result<Vec<Diary>>;

    /// Record a save at `now` unless the user already saved something on the
    /// same UTC day, bumping the diary's counter by one on success.
    async fn save_diary(
        &self,
        user_id: Uuid,
        diary_id: Uuid,
        now: OffsetDateTime,
    ) -> anyhow::Result<SaveOutcome>;
    /// The user's saved diaries, most recent save first.
    async fn saved_by_user(&self, user_id: Uuid) -> anyhow::Result<Vec<SavedDiary>>;
}
