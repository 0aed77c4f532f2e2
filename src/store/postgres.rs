use anyhow::Context;
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};
use time::{Date, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use super::{Diary, DiaryStore, SaveOutcome, SavedDiary, SavedRecord, User};
use crate::calendar::{day_bounds, day_of};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("connect to database")?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("run migrations")?;
        Ok(())
    }
}

#[async_trait]
impl DiaryStore for PgStore {
    async fn create_user(&self) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id)
            VALUES ($1)
            RETURNING id, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .fetch_one(&self.pool)
        .await
        .context("insert user")?;
        Ok(user)
    }

    async fn user_exists(&self, user_id: Uuid) -> anyhow::Result<bool> {
        let row = sqlx::query_as::<_, (Uuid,)>(r#"SELECT id FROM users WHERE id = $1"#)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .context("find user")?;
        Ok(row.is_some())
    }

    async fn list_user_ids(&self) -> anyhow::Result<Vec<Uuid>> {
        let rows = sqlx::query_as::<_, (Uuid,)>(
            r#"
            SELECT id
              FROM users
             ORDER BY created_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("list users")?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn create_diary(&self, author_id: Uuid, content: &str) -> anyhow::Result<Diary> {
        let diary = sqlx::query_as::<_, Diary>(
            r#"
            INSERT INTO diaries (id, user_id, content)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, content, created_at, saved_count
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(author_id)
        .bind(content)
        .fetch_one(&self.pool)
        .await
        .context("insert diary")?;
        Ok(diary)
    }

    async fn diaries_by_author(&self, author_id: Uuid) -> anyhow::Result<Vec<Diary>> {
        let rows = sqlx::query_as::<_, Diary>(
            r#"
            SELECT id, user_id, content, created_at, saved_count
              FROM diaries
             WHERE user_id = $1
             ORDER BY created_at DESC
            "#,
        )
        .bind(author_id)
        .fetch_all(&self.pool)
        .await
        .context("list diaries by author")?;
        Ok(rows)
    }

    async fn saved_diaries_by_author(&self, author_id: Uuid) -> anyhow::Result<Vec<Diary>> {
        let rows = sqlx::query_as::<_, Diary>(
            r#"
            SELECT id, user_id, content, created_at, saved_count
              FROM diaries
             WHERE user_id = $1
               AND saved_count > 0
             ORDER BY created_at DESC
            "#,
        )
        .bind(author_id)
        .fetch_all(&self.pool)
        .await
        .context("list saved diaries by author")?;
        Ok(rows)
    }

    async fn candidate_diaries(
        &self,
        recipient_id: Uuid,
        limit: usize,
    ) -> anyhow::Result<Vec<Diary>> {
        let limit = i64::try_from(limit).context("candidate limit overflow")?;
        let rows = sqlx::query_as::<_, Diary>(
            r#"
            SELECT id, user_id, content, created_at, saved_count
              FROM diaries
             WHERE user_id <> $1
             ORDER BY created_at DESC
             LIMIT $2
            "#,
        )
        .bind(recipient_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("list candidate diaries")?;
        Ok(rows)
    }

    async fn replace_deliveries(
        &self,
        recipient_id: Uuid,
        date: Date,
        diary_ids: &[Uuid],
    ) -> anyhow::Result<u64> {
        let positions = (0..diary_ids.len())
            .map(i32::try_from)
            .collect::<Result<Vec<_>, _>>()
            .context("delivery batch too large")?;

        let mut tx = self.pool.begin().await.context("begin tx")?;

        let removed = sqlx::query(
            r#"
            DELETE FROM daily_deliveries
             WHERE recipient_user_id = $1
               AND delivery_date = $2
            "#,
        )
        .bind(recipient_id)
        .bind(date)
        .execute(&mut *tx)
        .await
        .context("clear deliveries")?
        .rows_affected();

        // The join drops ids that are unknown or written by the recipient.
        let inserted = sqlx::query(
            r#"
            INSERT INTO daily_deliveries (recipient_user_id, diary_id, delivery_date, position)
            SELECT $1, batch.diary_id, $2, batch.position
              FROM UNNEST($3::uuid[], $4::int4[]) AS batch (diary_id, position)
              JOIN diaries d ON d.id = batch.diary_id
             WHERE d.user_id <> $1
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(recipient_id)
        .bind(date)
        .bind(diary_ids)
        .bind(positions.as_slice())
        .execute(&mut *tx)
        .await
        .context("insert deliveries")?
        .rows_affected();

        tx.commit().await.context("commit tx")?;

        debug!(%recipient_id, %date, removed, inserted, "deliveries replaced");
        Ok(inserted)
    }

    async fn delivered_diaries(&self, recipient_id: Uuid, date: Date) -> anyhow::Result<Vec<Diary>> {
        let rows = sqlx::query_as::<_, Diary>(
            r#"
            SELECT d.id, d.user_id, d.content, d.created_at, d.saved_count
              FROM daily_deliveries dd
              JOIN diaries d ON d.id = dd.diary_id
             WHERE dd.recipient_user_id = $1
               AND dd.delivery_date = $2
             ORDER BY dd.position ASC
            "#,
        )
        .bind(recipient_id)
        .bind(date)
        .fetch_all(&self.pool)
        .await
        .context("list delivered diaries")?;
        Ok(rows)
    }

    async fn save_diary(
        &self,
        user_id: Uuid,
        diary_id: Uuid,
        now: OffsetDateTime,
    ) -> anyhow::Result<SaveOutcome> {
        let day = day_of(now);
        let (start, end) = day_bounds(day);

        // Dropping `tx` on an early return rolls it back.
        let mut tx = self.pool.begin().await.context("begin tx")?;

        let diary = sqlx::query_as::<_, (Uuid,)>(r#"SELECT id FROM diaries WHERE id = $1"#)
            .bind(diary_id)
            .fetch_optional(&mut *tx)
            .await
            .context("find diary")?;
        if diary.is_none() {
            return Ok(SaveOutcome::DiaryNotFound);
        }

        let prior = sqlx::query_as::<_, (Uuid,)>(
            r#"
            SELECT id
              FROM saved_diaries
             WHERE user_id = $1
               AND created_at >= $2
               AND created_at < $3
             LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(start)
        .bind(end)
        .fetch_optional(&mut *tx)
        .await
        .context("check daily save")?;
        if prior.is_some() {
            return Ok(SaveOutcome::AlreadySavedToday);
        }

        // A concurrent save by the same user loses on the unique constraint.
        let record = sqlx::query_as::<_, SavedRecord>(
            r#"
            INSERT INTO saved_diaries (id, user_id, diary_id, saved_on, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT ON CONSTRAINT saved_diaries_one_per_day DO NOTHING
            RETURNING id, user_id, diary_id, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(diary_id)
        .bind(day)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await
        .context("insert saved diary")?;
        let Some(record) = record else {
            return Ok(SaveOutcome::AlreadySavedToday);
        };

        sqlx::query(r#"UPDATE diaries SET saved_count = saved_count + 1 WHERE id = $1"#)
            .bind(diary_id)
            .execute(&mut *tx)
            .await
            .context("increment saved_count")?;

        tx.commit().await.context("commit tx")?;
        Ok(SaveOutcome::Saved(record))
    }

    async fn saved_by_user(&self, user_id: Uuid) -> anyhow::Result<Vec<SavedDiary>> {
        let rows = sqlx::query_as::<_, SavedDiary>(
            r#"
            SELECT d.id, d.content, d.created_at, s.created_at AS saved_at
              FROM saved_diaries s
              JOIN diaries d ON d.id = s.diary_id
             WHERE s.user_id = $1
             ORDER BY s.created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .context("list saved diaries")?;
        Ok(rows)
    }
}
