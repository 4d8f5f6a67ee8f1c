// 缓存模块
// 会话数据：进程内存或 redis

pub mod keys;
pub mod models;
pub mod operations;

// 重新导出常用类型，方便其他模块使用
pub use models::session::CachedSession;
pub use operations::session::SessionManager;
