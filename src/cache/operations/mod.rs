/// 缓存操作
/// 提供缓存操作的功能实现

pub mod session;

pub use session::SessionManager;
