use chrono::{NaiveDate, Utc};

use crate::database::models::{StudentRecord, next_id};
use crate::database::store::RecordStore;
use crate::error::AppError;
use crate::utils::validation::unescape_html;

/// 已校验的新学生记录
#[derive(Debug, Clone)]
pub struct NewStudent {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub birth_date: Option<NaiveDate>,
}

/// 部分更新：外层 None 表示不修改，`Some(None)` 表示清空可选字段
#[derive(Debug, Clone, Default)]
pub struct StudentPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<Option<String>>,
    pub address: Option<Option<String>>,
    pub birth_date: Option<Option<NaiveDate>>,
}

impl StudentPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.email.is_none()
            && self.phone.is_none()
            && self.address.is_none()
            && self.birth_date.is_none()
    }

    fn apply(self, record: &mut StudentRecord) {
        if let Some(name) = self.name {
            record.name = name;
        }
        if let Some(email) = self.email {
            record.email = email;
        }
        if let Some(phone) = self.phone {
            record.phone = phone;
        }
        if let Some(address) = self.address {
            record.address = address;
        }
        if let Some(birth_date) = self.birth_date {
            record.birth_date = birth_date;
        }
    }
}

/// 学生记录存储库实现
pub struct StudentRepository;

impl StudentRepository {
    pub async fn list(store: &RecordStore) -> Result<Vec<StudentRecord>, AppError> {
        Ok(store.load().await?.students)
    }

    pub async fn find_by_id(
        store: &RecordStore,
        student_id: u64,
    ) -> Result<Option<StudentRecord>, AppError> {
        let doc = store.load().await?;
        Ok(doc.students.into_iter().find(|s| s.id == student_id))
    }

    pub async fn create(
        store: &RecordStore,
        owner_user_id: u64,
        new_student: NewStudent,
    ) -> Result<StudentRecord, AppError> {
        store
            .update(move |doc| {
                let record = StudentRecord {
                    id: next_id(&doc.students),
                    owner_user_id,
                    name: new_student.name,
                    email: new_student.email,
                    phone: new_student.phone,
                    address: new_student.address,
                    birth_date: new_student.birth_date,
                    created_at: Utc::now(),
                    updated_at: None,
                };
                doc.students.push(record.clone());
                Ok(record)
            })
            .await
    }

    /// 先判断存在（404），再判断权限（403），两者都在写锁内完成
    pub async fn update(
        store: &RecordStore,
        student_id: u64,
        actor_id: u64,
        actor_is_admin: bool,
        patch: StudentPatch,
    ) -> Result<StudentRecord, AppError> {
        store
            .update(move |doc| {
                let record = doc
                    .students
                    .iter_mut()
                    .find(|s| s.id == student_id)
                    .ok_or(AppError::NotFound)?;
                if !record.is_accessible_by(actor_id, actor_is_admin) {
                    return Err(AppError::Forbidden);
                }
                patch.apply(record);
                record.updated_at = Some(Utc::now());
                Ok(record.clone())
            })
            .await
    }

    pub async fn delete(store: &RecordStore, student_id: u64) -> Result<StudentRecord, AppError> {
        store
            .update(move |doc| {
                let index = doc
                    .students
                    .iter()
                    .position(|s| s.id == student_id)
                    .ok_or(AppError::NotFound)?;
                Ok(doc.students.remove(index))
            })
            .await
    }

    /// 不区分大小写的子串搜索，按转义前的原文匹配。姓名对所有人可搜；
    /// 邮箱、电话、地址只在调用方能看到完整记录时参与匹配。
    pub async fn search(
        store: &RecordStore,
        query: &str,
        user_id: u64,
        is_admin: bool,
    ) -> Result<Vec<StudentRecord>, AppError> {
        let needle = query.to_lowercase();
        let doc = store.load().await?;
        Ok(doc
            .students
            .into_iter()
            .filter(|s| {
                let hit = |stored: &str| unescape_html(stored).to_lowercase().contains(&needle);
                if hit(s.name.as_str()) {
                    return true;
                }
                if !s.is_accessible_by(user_id, is_admin) {
                    return false;
                }
                [Some(&s.email), s.phone.as_ref(), s.address.as_ref()]
                    .into_iter()
                    .flatten()
                    .any(|v| hit(v.as_str()))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::validation::escape_html;

    fn bob() -> NewStudent {
        NewStudent {
            name: "Bob".into(),
            email: "bob@x.com".into(),
            phone: None,
            address: Some("12 Hidden Lane".into()),
            birth_date: None,
        }
    }

    #[tokio::test]
    async fn update_checks_existence_then_ownership() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path().join("db.json"));
        let rec = StudentRepository::create(&store, 1, bob()).await.unwrap();

        let missing = StudentRepository::update(&store, 99, 1, false, StudentPatch::default()).await;
        assert!(matches!(missing, Err(AppError::NotFound)));

        let patch = StudentPatch {
            name: Some("Robert".into()),
            ..Default::default()
        };
        let denied = StudentRepository::update(&store, rec.id, 2, false, patch.clone()).await;
        assert!(matches!(denied, Err(AppError::Forbidden)));

        let by_admin = StudentRepository::update(&store, rec.id, 2, true, patch).await.unwrap();
        assert_eq!(by_admin.name, "Robert");
        assert_eq!(by_admin.owner_user_id, 1);
        assert!(by_admin.updated_at.is_some());
    }

    #[tokio::test]
    async fn patch_can_clear_optional_fields() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path().join("db.json"));
        let rec = StudentRepository::create(&store, 1, bob()).await.unwrap();

        let patch = StudentPatch {
            address: Some(None),
            ..Default::default()
        };
        let updated = StudentRepository::update(&store, rec.id, 1, false, patch).await.unwrap();
        assert_eq!(updated.address, None);
        assert_eq!(updated.name, "Bob");
    }

    #[tokio::test]
    async fn ids_stay_unique_after_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path().join("db.json"));
        let a = StudentRepository::create(&store, 1, bob()).await.unwrap();
        let b = StudentRepository::create(&store, 1, bob()).await.unwrap();
        StudentRepository::delete(&store, a.id).await.unwrap();
        let c = StudentRepository::create(&store, 1, bob()).await.unwrap();
        assert_ne!(c.id, b.id);

        let again = StudentRepository::delete(&store, a.id).await;
        assert!(matches!(again, Err(AppError::NotFound)));
    }

    #[tokio::test]
    async fn search_hides_private_fields_of_other_owners() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path().join("db.json"));
        StudentRepository::create(&store, 1, bob()).await.unwrap();

        assert_eq!(StudentRepository::search(&store, "bo", 2, false).await.unwrap().len(), 1);
        assert!(StudentRepository::search(&store, "hidden", 2, false).await.unwrap().is_empty());
        assert_eq!(StudentRepository::search(&store, "HIDDEN", 1, false).await.unwrap().len(), 1);
        assert_eq!(StudentRepository::search(&store, "hidden", 2, true).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn search_ignores_escape_entities() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path().join("db.json"));
        let student = NewStudent {
            name: escape_html("Bob & Co"),
            address: Some(escape_html("1/2 <Main> St")),
            ..bob()
        };
        StudentRepository::create(&store, 1, student).await.unwrap();

        for q in ["amp", "lt", "gt", "x2f"] {
            assert!(
                StudentRepository::search(&store, q, 1, false).await.unwrap().is_empty(),
                "{} should not match",
                q
            );
        }
        assert_eq!(StudentRepository::search(&store, "& co", 2, false).await.unwrap().len(), 1);
        assert_eq!(StudentRepository::search(&store, "1/2 <main>", 1, false).await.unwrap().len(), 1);
    }
}
