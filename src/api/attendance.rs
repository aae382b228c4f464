use actix_web::{HttpResponse, web};
use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::auth::auth::AuthUser;
use crate::error::HrError;
use crate::model::attendance::{AttendanceRecord, AttendanceSource, AttendanceStatus, MonthSummary};
use crate::service::attendance;
use crate::settings::SettingsDoc;
use crate::store::mysql::MySqlStore;

#[derive(Deserialize, ToSchema)]
pub struct MarkAttendance {
    /// Defaults to the caller's own employee record.
    #[schema(example = 1001, nullable = true)]
    pub employee_id: Option<u64>,

    #[schema(example = "2026-07-01", format = "date", value_type = String)]
    pub date: NaiveDate,

    #[schema(example = "09:00:00", value_type = String, nullable = true)]
    pub check_in: Option<NaiveTime>,

    #[schema(example = "18:00:00", value_type = String, nullable = true)]
    pub check_out: Option<NaiveTime>,

    /// An explicit status always wins over derivation.
    #[schema(nullable = true)]
    pub status: Option<AttendanceStatus>,

    #[schema(nullable = true)]
    pub notes: Option<String>,
}

/// Mark (or re-mark) one employee-day.
#[utoipa::path(
    post,
    path = "/api/v1/attendance",
    request_body = MarkAttendance,
    responses(
        (status = 200, description = "The written record", body = AttendanceRecord),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Employee not found"),
        (status = 409, description = "Record locked by a closed payroll")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn mark_attendance(
    auth: AuthUser,
    store: web::Data<MySqlStore>,
    settings: web::Data<SettingsDoc>,
    payload: web::Json<MarkAttendance>,
) -> Result<HttpResponse, HrError> {
    let body = payload.into_inner();
    let employee_id = body
        .employee_id
        .or(auth.employee_id)
        .ok_or_else(|| HrError::forbidden("No employee profile"))?;

    let record = attendance::mark_attendance(
        store.get_ref(),
        &auth.actor(),
        attendance::MarkAttendance {
            employee_id,
            date: body.date,
            check_in: body.check_in,
            check_out: body.check_out,
            status: body.status,
            notes: body.notes,
            source: AttendanceSource::Manual,
        },
        settings.get_ref(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(record))
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateAttendance {
    #[schema(example = "09:00:00", value_type = String, nullable = true)]
    pub check_in: Option<NaiveTime>,

    #[schema(example = "18:00:00", value_type = String, nullable = true)]
    pub check_out: Option<NaiveTime>,

    #[schema(nullable = true)]
    pub status: Option<AttendanceStatus>,

    #[schema(example = "device clock was wrong")]
    pub reason: String,
}

/// Patch an existing record; the editor and reason are stamped on the row.
#[utoipa::path(
    put,
    path = "/api/v1/attendance/{id}",
    params(("id" = u64, Path, description = "Attendance record id")),
    request_body = UpdateAttendance,
    responses(
        (status = 200, description = "The updated record", body = AttendanceRecord),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Record not found"),
        (status = 409, description = "Record locked by a closed payroll")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn update_attendance(
    auth: AuthUser,
    store: web::Data<MySqlStore>,
    settings: web::Data<SettingsDoc>,
    path: web::Path<u64>,
    payload: web::Json<UpdateAttendance>,
) -> Result<HttpResponse, HrError> {
    let body = payload.into_inner();
    let record = attendance::update_attendance(
        store.get_ref(),
        &auth.actor(),
        path.into_inner(),
        attendance::UpdateAttendance {
            check_in: body.check_in,
            check_out: body.check_out,
            status: body.status,
        },
        body.reason,
        settings.get_ref(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(record))
}

#[derive(Deserialize, ToSchema)]
pub struct LockMonth {
    #[schema(example = 7)]
    pub month: u32,

    #[schema(example = 2026)]
    pub year: i32,
}

/// Lock every attendance record in a month.
#[utoipa::path(
    post,
    path = "/api/v1/attendance/lock",
    request_body = LockMonth,
    responses(
        (status = 200, description = "Rows newly locked", body = Object,
         example = json!({"locked": 310})),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn lock_attendance(
    auth: AuthUser,
    store: web::Data<MySqlStore>,
    settings: web::Data<SettingsDoc>,
    payload: web::Json<LockMonth>,
) -> Result<HttpResponse, HrError> {
    let locked = attendance::lock_attendance(
        store.get_ref(),
        &auth.actor(),
        payload.month,
        payload.year,
        settings.get_ref(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "locked": locked })))
}

#[derive(Deserialize, IntoParams)]
pub struct SummaryQuery {
    /// Defaults to the caller's own employee record.
    pub employee_id: Option<u64>,
    pub month: u32,
    pub year: i32,
}

/// Month day-count aggregation for one employee.
#[utoipa::path(
    get,
    path = "/api/v1/attendance/summary",
    params(SummaryQuery),
    responses(
        (status = 200, description = "Day counts for the month", body = MonthSummary),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn attendance_summary(
    auth: AuthUser,
    store: web::Data<MySqlStore>,
    settings: web::Data<SettingsDoc>,
    query: web::Query<SummaryQuery>,
) -> Result<HttpResponse, HrError> {
    let employee_id = query
        .employee_id
        .or(auth.employee_id)
        .ok_or_else(|| HrError::forbidden("No employee profile"))?;

    let summary = attendance::attendance_summary(
        store.get_ref(),
        &auth.actor(),
        employee_id,
        query.month,
        query.year,
        settings.get_ref(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(summary))
}
