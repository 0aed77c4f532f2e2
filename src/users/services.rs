use tracing::info;
use uuid::Uuid;

use crate::store::{Diary, DiaryStore, User};

pub async fn init_user(store: &dyn DiaryStore) -> anyhow::Result<User> {
    let user = store.create_user().await?;
    info!(user_id = %user.id, "user created");
    Ok(user)
}

/// The author's diaries that somebody has saved at least once, newest first.
pub async fn notifications(store: &dyn DiaryStore, user_id: Uuid) -> anyhow::Result<Vec<Diary>> {
    store.saved_diaries_by_author(user_id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use time::OffsetDateTime;

    #[tokio::test]
    async fn only_saved_diaries_notify_their_author() {
        let store = MemoryStore::new();
        let author = init_user(&store).await.unwrap();
        let reader = init_user(&store).await.unwrap();
        let ignored = store.create_diary(author.id, "ignored").await.unwrap();
        let liked = store.create_diary(author.id, "liked").await.unwrap();

        assert!(notifications(&store, author.id).await.unwrap().is_empty());

        store
            .save_diary(reader.id, liked.id, OffsetDateTime::now_utc())
            .await
            .unwrap();

        let got = notifications(&store, author.id).await.unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].id, liked.id);
        assert_eq!(got[0].saved_count, 1);
        assert_ne!(got[0].id, ignored.id);
        assert!(notifications(&store, reader.id).await.unwrap().is_empty());
    }
}
