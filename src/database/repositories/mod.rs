pub mod student;
pub mod user;

pub use student::{NewStudent, StudentPatch, StudentRepository};
pub use user::{NewUser, UserRepository};
