use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::database::models::StudentRecord;
use crate::database::repositories::{NewStudent, StudentPatch};
use crate::error::AppError;
use crate::utils::validation::Validator;

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CreateStudentRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub birth_date: Option<String>,
}

impl CreateStudentRequest {
    pub fn validate(self) -> Result<NewStudent, AppError> {
        let mut v = Validator::new();
        let name = v.required_text("name", self.name.as_deref());
        let email = v.required_email("email", self.email.as_deref());
        let phone = v.optional_text(self.phone.as_deref());
        let address = v.optional_text(self.address.as_deref());
        let birth_date = v.optional_date("birthDate", self.birth_date.as_deref());
        v.finish()?;

        let (name, email) = name
            .zip(email)
            .ok_or_else(|| AppError::Internal("validator accepted incomplete student".into()))?;
        Ok(NewStudent {
            name,
            email,
            phone,
            address,
            birth_date,
        })
    }
}

/// 字段缺失表示不修改；可选字段传 null 或空串表示清空
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UpdateStudentRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    #[serde(deserialize_with = "present")]
    pub phone: Option<Option<String>>,
    #[serde(deserialize_with = "present")]
    pub address: Option<Option<String>>,
    #[serde(deserialize_with = "present")]
    pub birth_date: Option<Option<String>>,
}

/// 区分“字段缺失”和“显式 null”
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

impl UpdateStudentRequest {
    pub fn validate(self) -> Result<StudentPatch, AppError> {
        let mut v = Validator::new();

        let name = match self.name.as_deref() {
            Some(n) => v.required_text("name", Some(n)),
            None => None,
        };
        let email = match self.email.as_deref() {
            Some(e) => v.required_email("email", Some(e)),
            None => None,
        };
        let phone = self.phone.map(|p| v.optional_text(p.as_deref()));
        let address = self.address.map(|a| v.optional_text(a.as_deref()));
        let birth_date = self
            .birth_date
            .map(|d| v.optional_date("birthDate", d.as_deref()));

        let patch = StudentPatch {
            name,
            email,
            phone,
            address,
            birth_date,
        };
        if patch.is_empty() {
            v.add("body", "no updatable fields provided");
        }
        v.finish()?;
        Ok(patch)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

/// 管理员导出：只含学生记录，不含用户
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportResponse {
    pub exported_at: DateTime<Utc>,
    pub students: Vec<StudentRecord>,
}
