use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::HasId;

/// 用户实体，原样持久化（含密码哈希）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: u64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    #[serde(default)]
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

impl HasId for User {
    fn id(&self) -> u64 {
        self.id
    }
}

/// 对外返回的用户信息，不含密码哈希
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: u64,
    pub username: String,
    pub email: String,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            is_admin: user.is_admin,
            created_at: user.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_user_never_carries_hash() {
        let user = User {
            id: 1,
            username: "alice".into(),
            email: "alice@x.com".into(),
            password_hash: "$2b$10$abcdefghijklmnopqrstuv".into(),
            is_admin: false,
            created_at: Utc::now(),
        };
        let json = serde_json::to_string(&PublicUser::from(&user)).unwrap();
        assert!(json.contains("\"username\":\"alice\""));
        assert!(json.contains("\"isAdmin\":false"));
        assert!(!json.contains("password"));
        assert!(!json.contains("$2b$"));
    }
}
