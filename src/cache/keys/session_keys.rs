use sha2::{Digest, Sha256};

/// 会话缓存键前缀
const SESSION_PREFIX: &str = "session:";

/// 生成会话缓存键。
/// 键里只放令牌的 SHA-256，不存原始令牌。
pub fn session_key(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    format!("{}{}", SESSION_PREFIX, hex::encode(digest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_hides_raw_token() {
        let token = "a".repeat(64);
        let key = session_key(&token);
        assert!(key.starts_with("session:"));
        assert!(!key.contains(&token));
        assert_eq!(key, session_key(&token));
        assert_eq!(key.len(), "session:".len() + 64);
    }
}
