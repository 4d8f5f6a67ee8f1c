use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::HasId;

/// 学生记录，创建者即 owner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRecord {
    pub id: u64,
    pub owner_user_id: u64,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl HasId for StudentRecord {
    fn id(&self) -> u64 {
        self.id
    }
}

impl StudentRecord {
    /// owner 或管理员可以看到 / 修改完整记录
    pub fn is_accessible_by(&self, user_id: u64, is_admin: bool) -> bool {
        is_admin || self.owner_user_id == user_id
    }

    pub fn view_for(&self, user_id: u64, is_admin: bool) -> StudentView {
        if self.is_accessible_by(user_id, is_admin) {
            StudentView::Full(self.clone())
        } else {
            StudentView::Redacted(RedactedStudent::from(self))
        }
    }
}

/// 非 owner 看到的脱敏视图：只保留 id、姓名和创建时间
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedactedStudent {
    pub id: u64,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub redacted: bool,
}

impl From<&StudentRecord> for RedactedStudent {
    fn from(record: &StudentRecord) -> Self {
        Self {
            id: record.id,
            name: record.name.clone(),
            created_at: record.created_at,
            redacted: true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum StudentView {
    Full(StudentRecord),
    Redacted(RedactedStudent),
}
