// 数据存储模块
// 整个数据集是一个 JSON 文档，每次写入都整体覆盖

pub mod models; // 文档与实体定义
pub mod repositories; // 用户 / 学生记录的读写操作
pub mod store; // 文件存储：load / save / update

// 重新导出常用类型，方便其他模块使用
pub use models::{Document, StudentRecord, User};
pub use repositories::{StudentRepository, UserRepository};
pub use store::RecordStore;
