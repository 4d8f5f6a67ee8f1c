use serde::Deserialize;

use crate::error::AppError;
use crate::utils::validation::Validator;

/// 字段全部可选，缺失字段走统一的字段级校验而不是 JSON 解析错误
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegisterRequest {
    pub username: Option<String>,
    pub password: Option<String>,
    pub email: Option<String>,
}

/// 已校验的注册信息
#[derive(Debug)]
pub struct ValidRegistration {
    pub username: String,
    pub password: String,
    pub email: String,
}

impl RegisterRequest {
    pub fn validate(self) -> Result<ValidRegistration, AppError> {
        let mut v = Validator::new();
        let username = v.username("username", self.username.as_deref());
        let password = v.password("password", self.password.as_deref());
        let email = v.required_email("email", self.email.as_deref());
        v.finish()?;

        match (username, password, email) {
            (Some(username), Some(password), Some(email)) => Ok(ValidRegistration {
                username,
                password,
                email,
            }),
            _ => Err(AppError::Internal("validator accepted incomplete registration".into())),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

impl LoginRequest {
    pub fn validate(self) -> Result<(String, String), AppError> {
        let mut v = Validator::new();
        let username = self
            .username
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty());
        if username.is_none() {
            v.add("username", "is required");
        }
        let password = self.password.filter(|p| !p.is_empty());
        if password.is_none() {
            v.add("password", "is required");
        }
        v.finish()?;

        username
            .zip(password)
            .ok_or_else(|| AppError::Internal("validator accepted incomplete login".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_normalizes_input() {
        let req = RegisterRequest {
            username: Some(" alice ".into()),
            password: Some("secret1".into()),
            email: Some(" Alice@X.com ".into()),
        };
        let valid = req.validate().unwrap();
        assert_eq!(valid.username, "alice");
        assert_eq!(valid.email, "alice@x.com");
        assert_eq!(valid.password, "secret1");
    }

    #[test]
    fn registration_reports_all_fields() {
        let err = RegisterRequest::default().validate().unwrap_err();
        match err {
            AppError::Validation(errors) => assert_eq!(errors.len(), 3),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn short_password_rejected() {
        let req = RegisterRequest {
            username: Some("alice".into()),
            password: Some("12345".into()),
            email: Some("alice@x.com".into()),
        };
        assert!(matches!(req.validate(), Err(AppError::Validation(_))));
    }
}
