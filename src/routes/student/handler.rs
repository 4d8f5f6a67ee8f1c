use axum::{
    Json,
    extract::{Extension, Path, Query, State},
};
use axum_extra::extract::WithRejection;
use chrono::Utc;

use crate::{
    AppState,
    database::{
        models::{StudentRecord, StudentView},
        repositories::StudentRepository,
    },
    error::AppError,
    middleware::CurrentUser,
    utils::{
        ApiResponse, success_to_api_response, success_with_message,
        validation::Validator,
    },
};

use super::model::{CreateStudentRequest, ExportResponse, SearchQuery, UpdateStudentRequest};

fn project(records: Vec<StudentRecord>, current: CurrentUser) -> Vec<StudentView> {
    records
        .iter()
        .map(|r| r.view_for(current.user_id, current.is_admin))
        .collect()
}

#[axum::debug_handler]
pub async fn list_students(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<Vec<StudentView>>>, AppError> {
    let records = StudentRepository::list(&state.store).await?;
    Ok(success_to_api_response(project(records, current)))
}

#[axum::debug_handler]
pub async fn get_student(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    WithRejection(Path(id), _): WithRejection<Path<u64>, AppError>,
) -> Result<Json<ApiResponse<StudentView>>, AppError> {
    let record = StudentRepository::find_by_id(&state.store, id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(success_to_api_response(
        record.view_for(current.user_id, current.is_admin),
    ))
}

#[axum::debug_handler]
pub async fn create_student(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    WithRejection(Json(req), _): WithRejection<Json<CreateStudentRequest>, AppError>,
) -> Result<Json<ApiResponse<StudentRecord>>, AppError> {
    let new_student = req.validate()?;
    let record = StudentRepository::create(&state.store, current.user_id, new_student).await?;
    tracing::info!(student_id = record.id, owner = current.user_id, "student created");
    Ok(success_with_message("student created", record))
}

#[axum::debug_handler]
pub async fn update_student(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    WithRejection(Path(id), _): WithRejection<Path<u64>, AppError>,
    WithRejection(Json(req), _): WithRejection<Json<UpdateStudentRequest>, AppError>,
) -> Result<Json<ApiResponse<StudentRecord>>, AppError> {
    let patch = req.validate()?;
    let record =
        StudentRepository::update(&state.store, id, current.user_id, current.is_admin, patch)
            .await
            .inspect_err(|e| {
                if matches!(e, AppError::Forbidden) {
                    tracing::warn!(student_id = id, user_id = current.user_id, "update denied");
                }
            })?;
    tracing::info!(student_id = id, user_id = current.user_id, "student updated");
    Ok(success_with_message("student updated", record))
}

/// 仅管理员，由路由上的 require_admin 保证
#[axum::debug_handler]
pub async fn delete_student(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    WithRejection(Path(id), _): WithRejection<Path<u64>, AppError>,
) -> Result<Json<ApiResponse<StudentRecord>>, AppError> {
    let record = StudentRepository::delete(&state.store, id).await?;
    tracing::info!(student_id = id, admin = current.user_id, "student deleted");
    Ok(success_with_message("student deleted", record))
}

#[axum::debug_handler]
pub async fn search_students(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    WithRejection(Query(query), _): WithRejection<Query<SearchQuery>, AppError>,
) -> Result<Json<ApiResponse<Vec<StudentView>>>, AppError> {
    let mut v = Validator::new();
    let q = query.q.trim();
    if q.is_empty() {
        v.add("q", "is required");
    }
    v.finish()?;

    let records =
        StudentRepository::search(&state.store, q, current.user_id, current.is_admin).await?;
    Ok(success_to_api_response(project(records, current)))
}

#[axum::debug_handler]
pub async fn export_students(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<ExportResponse>>, AppError> {
    let students = StudentRepository::list(&state.store).await?;
    tracing::info!(admin = current.user_id, count = students.len(), "students exported");
    Ok(success_to_api_response(ExportResponse {
        exported_at: Utc::now(),
        students,
    }))
}
