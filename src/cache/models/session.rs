use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 会话缓存数据模型。is_admin 在登录时从用户记录复制。
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct CachedSession {
    pub user_id: u64,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CachedSession {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}
