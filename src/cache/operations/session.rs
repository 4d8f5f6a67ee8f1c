use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::RngCore;
use rand::rngs::OsRng;
use redis::{AsyncCommands, Client as RedisClient};
use tokio::sync::Mutex;

use crate::cache::keys::session_key;
use crate::cache::models::session::CachedSession;
use crate::config::{Config, SessionBackendKind};
use crate::error::AppError;

/// 令牌随机字节数，hex 编码后 64 个字符
const TOKEN_BYTES: usize = 32;

enum SessionBackend {
    Memory(Mutex<HashMap<String, CachedSession>>),
    Redis {
        client: Arc<RedisClient>,
        op_timeout: Duration,
    },
}

/// 会话管理：签发不透明令牌，按空闲超时过期（滑动过期）。
///
/// redis 后端的每次调用都有超时；解析会话时超时或出错一律按未登录处理。
pub struct SessionManager {
    backend: SessionBackend,
    idle_timeout: Duration,
}

impl SessionManager {
    pub fn in_memory(idle_timeout: Duration) -> Self {
        Self {
            backend: SessionBackend::Memory(Mutex::new(HashMap::new())),
            idle_timeout,
        }
    }

    pub fn redis(client: RedisClient, idle_timeout: Duration, op_timeout: Duration) -> Self {
        Self {
            backend: SessionBackend::Redis {
                client: Arc::new(client),
                op_timeout,
            },
            idle_timeout,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, redis::RedisError> {
        match config.session_backend {
            SessionBackendKind::Memory => Ok(Self::in_memory(config.session_idle_timeout())),
            SessionBackendKind::Redis => {
                let url = config.redis_url.clone().unwrap_or_default();
                let client = RedisClient::open(url)?;
                Ok(Self::redis(
                    client,
                    config.session_idle_timeout(),
                    config.session_store_timeout(),
                ))
            }
        }
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    pub fn backend_name(&self) -> &'static str {
        match self.backend {
            SessionBackend::Memory(_) => "memory",
            SessionBackend::Redis { .. } => "redis",
        }
    }

    /// now + 空闲超时；超出时间范围返回 None
    fn expiry_from(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let secs = i64::try_from(self.idle_timeout.as_secs()).ok()?;
        now.checked_add_signed(chrono::Duration::try_seconds(secs)?)
    }

    /// 登录成功后创建会话，返回交给客户端的令牌
    pub async fn create(&self, user_id: u64, is_admin: bool) -> Result<String, AppError> {
        self.create_at(user_id, is_admin, Utc::now()).await
    }

    pub(crate) async fn create_at(
        &self,
        user_id: u64,
        is_admin: bool,
        now: DateTime<Utc>,
    ) -> Result<String, AppError> {
        let expires_at = self
            .expiry_from(now)
            .ok_or_else(|| AppError::Internal("session idle timeout out of range".into()))?;
        let token = generate_token();
        let key = session_key(&token);
        let session = CachedSession {
            user_id,
            is_admin,
            created_at: now,
            expires_at,
        };

        match &self.backend {
            SessionBackend::Memory(sessions) => {
                let mut sessions = sessions.lock().await;
                // 顺带清理已过期的会话
                sessions.retain(|_, s| s.is_live(now));
                sessions.insert(key, session);
            }
            SessionBackend::Redis { client, op_timeout } => {
                let json = serde_json::to_string(&session)
                    .map_err(|e| AppError::Internal(format!("serialize session: {}", e)))?;
                let ttl = self.idle_timeout.as_secs().max(1);
                let stored = redis_call(*op_timeout, "cache_session", async {
                    let mut conn = client.get_multiplexed_async_connection().await?;
                    let _: () = conn.set_ex(&key, json, ttl).await?;
                    Ok::<_, redis::RedisError>(())
                })
                .await;
                if stored.is_none() {
                    return Err(AppError::Internal("session store unavailable".into()));
                }
            }
        }

        tracing::debug!(user_id, backend = self.backend_name(), "session created");
        Ok(token)
    }

    /// 查找有效会话并刷新过期时间
    pub async fn resolve(&self, token: &str) -> Option<CachedSession> {
        self.resolve_at(token, Utc::now()).await
    }

    pub(crate) async fn resolve_at(&self, token: &str, now: DateTime<Utc>) -> Option<CachedSession> {
        if !is_well_formed(token) {
            return None;
        }
        let expires_at = self.expiry_from(now)?;
        let key = session_key(token);

        match &self.backend {
            SessionBackend::Memory(sessions) => {
                let mut sessions = sessions.lock().await;
                let live = sessions.get(&key).map(|s| s.is_live(now))?;
                if !live {
                    sessions.remove(&key);
                    return None;
                }
                let session = sessions.get_mut(&key)?;
                session.expires_at = expires_at;
                Some(session.clone())
            }
            SessionBackend::Redis { client, op_timeout } => {
                let raw: Option<String> = redis_call(*op_timeout, "get_session", async {
                    let mut conn = client.get_multiplexed_async_connection().await?;
                    let raw: Option<String> = conn.get(&key).await?;
                    Ok::<_, redis::RedisError>(raw)
                })
                .await
                .flatten();

                let mut session: CachedSession = match serde_json::from_str(&raw?) {
                    Ok(s) => s,
                    Err(e) => {
                        tracing::warn!(error = %e, "unreadable session entry, treating as missing");
                        return None;
                    }
                };
                if !session.is_live(now) {
                    return None;
                }

                session.expires_at = expires_at;
                if let Ok(json) = serde_json::to_string(&session) {
                    let ttl = self.idle_timeout.as_secs().max(1);
                    // 刷新失败不影响本次请求，会话按旧的过期时间失效
                    let _ = redis_call(*op_timeout, "refresh_session", async {
                        let mut conn = client.get_multiplexed_async_connection().await?;
                        let _: () = conn.set_ex(&key, json, ttl).await?;
                        Ok::<_, redis::RedisError>(())
                    })
                    .await;
                }
                Some(session)
            }
        }
    }

    /// 删除会话；会话不存在时什么也不做
    pub async fn destroy(&self, token: &str) {
        if !is_well_formed(token) {
            return;
        }
        let key = session_key(token);

        match &self.backend {
            SessionBackend::Memory(sessions) => {
                sessions.lock().await.remove(&key);
            }
            SessionBackend::Redis { client, op_timeout } => {
                let _ = redis_call(*op_timeout, "remove_session", async {
                    let mut conn = client.get_multiplexed_async_connection().await?;
                    let _: () = conn.del(&key).await?;
                    Ok::<_, redis::RedisError>(())
                })
                .await;
            }
        }
    }
}

fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn is_well_formed(token: &str) -> bool {
    token.len() == TOKEN_BYTES * 2 && token.bytes().all(|b| b.is_ascii_hexdigit())
}

/// 带超时的 redis 调用；超时或出错返回 None 并记录日志
async fn redis_call<T, F>(op_timeout: Duration, op: &'static str, fut: F) -> Option<T>
where
    F: Future<Output = Result<T, redis::RedisError>>,
{
    match tokio::time::timeout(op_timeout, fut).await {
        Ok(Ok(v)) => Some(v),
        Ok(Err(e)) => {
            tracing::warn!(op, error = %e, "session store call failed");
            None
        }
        Err(_) => {
            tracing::warn!(op, timeout_ms = op_timeout.as_millis() as u64, "session store call timed out");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> SessionManager {
        SessionManager::in_memory(Duration::from_secs(3600))
    }

    #[tokio::test]
    async fn tokens_are_random_and_opaque() {
        let sessions = manager();
        let a = sessions.create(1, false).await.unwrap();
        let b = sessions.create(1, false).await.unwrap();
        assert_ne!(a, b);
        assert!(is_well_formed(&a));
    }

    #[tokio::test]
    async fn resolves_until_idle_timeout() {
        let sessions = manager();
        let t0 = Utc::now();
        let token = sessions.create_at(7, true, t0).await.unwrap();

        let s = sessions
            .resolve_at(&token, t0 + chrono::Duration::minutes(59))
            .await
            .expect("session should be live");
        assert_eq!((s.user_id, s.is_admin), (7, true));

        // 59 分钟时刷新过，再过 61 分钟才算空闲超时
        let later = t0 + chrono::Duration::minutes(59 + 61);
        assert!(sessions.resolve_at(&token, later).await.is_none());
        // 过期后被移除，时间倒回也查不到
        assert!(sessions.resolve_at(&token, t0).await.is_none());
    }

    #[tokio::test]
    async fn sliding_expiration_extends_active_sessions() {
        let sessions = manager();
        let t0 = Utc::now();
        let token = sessions.create_at(1, false, t0).await.unwrap();

        let mut now = t0;
        for _ in 0..5 {
            now += chrono::Duration::minutes(50);
            assert!(sessions.resolve_at(&token, now).await.is_some());
        }
        assert!(now - t0 > chrono::Duration::hours(4));
    }

    #[tokio::test]
    async fn destroy_is_idempotent() {
        let sessions = manager();
        let token = sessions.create(1, false).await.unwrap();
        sessions.destroy(&token).await;
        assert!(sessions.resolve(&token).await.is_none());
        sessions.destroy(&token).await;
        sessions.destroy("garbage").await;
    }

    #[tokio::test]
    async fn rejects_malformed_tokens() {
        let sessions = manager();
        sessions.create(1, false).await.unwrap();
        assert!(sessions.resolve("").await.is_none());
        assert!(sessions.resolve("zz").await.is_none());
        assert!(sessions.resolve(&"g".repeat(64)).await.is_none());
    }

    #[tokio::test]
    async fn unreachable_redis_fails_closed() {
        let client = RedisClient::open("redis://127.0.0.1:1/").unwrap();
        let sessions = SessionManager::redis(
            client,
            Duration::from_secs(3600),
            Duration::from_millis(200),
        );
        assert_eq!(sessions.backend_name(), "redis");
        assert!(sessions.resolve(&"a".repeat(64)).await.is_none());
        assert!(matches!(
            sessions.create(1, false).await,
            Err(AppError::Internal(_))
        ));
        sessions.destroy(&"a".repeat(64)).await;
    }

    #[tokio::test]
    async fn oversized_idle_timeout_errors_instead_of_panicking() {
        for secs in [9_000_000_000_000, 10_000_000_000_000_000] {
            let sessions = SessionManager::in_memory(Duration::from_secs(secs));
            assert!(matches!(
                sessions.create(1, false).await,
                Err(AppError::Internal(_))
            ));
            assert!(sessions.resolve(&"a".repeat(64)).await.is_none());
        }
    }
}
