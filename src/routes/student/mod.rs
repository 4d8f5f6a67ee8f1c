mod handler;
mod model;

pub use handler::{
    create_student, delete_student, export_students, get_student, list_students,
    search_students, update_student,
};
pub use model::{CreateStudentRequest, ExportResponse, SearchQuery, UpdateStudentRequest};
