use chrono::Utc;

use crate::database::models::{User, next_id};
use crate::database::store::RecordStore;
use crate::error::AppError;

/// 新用户，密码已在调用方哈希
#[derive(Debug)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub is_admin: bool,
}

/// 用户存储库实现
pub struct UserRepository;

impl UserRepository {
    /// 创建用户，用户名和邮箱唯一（不区分大小写），检查与写入在同一把锁内完成
    pub async fn create(store: &RecordStore, new_user: NewUser) -> Result<User, AppError> {
        let user = store
            .update(move |doc| {
                if doc
                    .users
                    .iter()
                    .any(|u| u.username.eq_ignore_ascii_case(&new_user.username))
                {
                    return Err(AppError::Conflict("username already exists".into()));
                }
                if doc
                    .users
                    .iter()
                    .any(|u| u.email.eq_ignore_ascii_case(&new_user.email))
                {
                    return Err(AppError::Conflict("email already registered".into()));
                }

                let user = User {
                    id: next_id(&doc.users),
                    username: new_user.username,
                    email: new_user.email,
                    password_hash: new_user.password_hash,
                    is_admin: new_user.is_admin,
                    created_at: Utc::now(),
                };
                doc.users.push(user.clone());
                Ok(user)
            })
            .await?;

        tracing::info!(user_id = user.id, username = %user.username, "user created");
        Ok(user)
    }

    pub async fn find_by_username(
        store: &RecordStore,
        username: &str,
    ) -> Result<Option<User>, AppError> {
        let doc = store.load().await?;
        Ok(doc.users.into_iter().find(|u| u.username == username))
    }

    pub async fn find_by_id(store: &RecordStore, user_id: u64) -> Result<Option<User>, AppError> {
        let doc = store.load().await?;
        Ok(doc.users.into_iter().find(|u| u.id == user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser {
            username: username.into(),
            email: email.into(),
            password_hash: "$2b$04$not-a-real-hash".into(),
            is_admin: false,
        }
    }

    #[tokio::test]
    async fn assigns_sequential_ids_and_rejects_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path().join("db.json"));

        let alice = UserRepository::create(&store, new_user("alice", "alice@x.com"))
            .await
            .unwrap();
        let carol = UserRepository::create(&store, new_user("carol", "carol@x.com"))
            .await
            .unwrap();
        assert_eq!((alice.id, carol.id), (1, 2));

        let dup_name = UserRepository::create(&store, new_user("Alice", "other@x.com")).await;
        assert!(matches!(dup_name, Err(AppError::Conflict(_))));
        let dup_email = UserRepository::create(&store, new_user("dave", "ALICE@x.com")).await;
        assert!(matches!(dup_email, Err(AppError::Conflict(_))));

        assert_eq!(store.load().await.unwrap().users.len(), 2);
    }

    #[tokio::test]
    async fn lookups() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path().join("db.json"));
        let alice = UserRepository::create(&store, new_user("alice", "alice@x.com"))
            .await
            .unwrap();

        let by_name = UserRepository::find_by_username(&store, "alice").await.unwrap();
        assert_eq!(by_name.map(|u| u.id), Some(alice.id));
        let by_id = UserRepository::find_by_id(&store, alice.id).await.unwrap();
        assert_eq!(by_id.map(|u| u.username), Some("alice".to_string()));
        assert!(UserRepository::find_by_username(&store, "bob").await.unwrap().is_none());
    }
}
