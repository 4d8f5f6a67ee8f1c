use serde::{Deserialize, Serialize};

pub mod student;
pub mod user;

pub use student::{RedactedStudent, StudentRecord, StudentView};
pub use user::{PublicUser, User};

/// 当前文档格式版本
pub const DOCUMENT_VERSION: u32 = 1;

fn default_version() -> u32 {
    DOCUMENT_VERSION
}

/// 磁盘上的完整文档：`{ version, users, students }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub students: Vec<StudentRecord>,
}

impl Default for Document {
    fn default() -> Self {
        Self {
            version: DOCUMENT_VERSION,
            users: Vec::new(),
            students: Vec::new(),
        }
    }
}

/// 所有带自增 id 的实体
pub trait HasId {
    fn id(&self) -> u64;
}

/// 取集合中最大 id + 1。调用方须持有 RecordStore 的写锁。
pub fn next_id<T: HasId>(collection: &[T]) -> u64 {
    collection.iter().map(HasId::id).max().unwrap_or(0) + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Row(u64);

    impl HasId for Row {
        fn id(&self) -> u64 {
            self.0
        }
    }

    #[test]
    fn next_id_starts_at_one() {
        assert_eq!(next_id::<Row>(&[]), 1);
    }

    #[test]
    fn next_id_skips_past_gaps() {
        // 1 被删除后，len + 1 = 3 会撞上现存的 3
        let rows = vec![Row(2), Row(3)];
        assert_eq!(next_id(&rows), 4);
    }

    #[test]
    fn unversioned_document_loads_as_current_version() {
        let doc: Document = serde_json::from_str(r#"{"users":[],"students":[]}"#).unwrap();
        assert_eq!(doc.version, DOCUMENT_VERSION);
        let empty: Document = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, Document::default());
    }
}
