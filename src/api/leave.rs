use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::auth::auth::AuthUser;
use crate::error::HrError;
use crate::model::leave::{LeaveRequest, LeaveStatus};
use crate::model::role::Role;
use crate::service::leave;
use crate::settings::SettingsDoc;
use crate::store::mysql::MySqlStore;
use crate::store::{HrStore, LeaveListFilter};

#[derive(Deserialize, ToSchema)]
pub struct CreateLeave {
    /// Defaults to the caller's own employee record.
    #[schema(example = 1001, nullable = true)]
    pub employee_id: Option<u64>,

    #[schema(example = "annual")]
    pub leave_type: String,

    #[schema(example = "2026-07-06", format = "date", value_type = String)]
    pub start_date: NaiveDate,

    #[schema(example = "2026-07-08", format = "date", value_type = String)]
    pub end_date: NaiveDate,

    #[schema(example = "family travel")]
    pub reason: String,
}

/// Submit a leave request; the day count is recomputed server-side.
#[utoipa::path(
    post,
    path = "/api/v1/leave",
    request_body = CreateLeave,
    responses(
        (status = 200, description = "The stored request", body = LeaveRequest),
        (status = 400, description = "Validation failure (dates, balance)"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn create_leave(
    auth: AuthUser,
    store: web::Data<MySqlStore>,
    settings: web::Data<SettingsDoc>,
    payload: web::Json<CreateLeave>,
) -> Result<HttpResponse, HrError> {
    let body = payload.into_inner();
    let employee_id = body
        .employee_id
        .or(auth.employee_id)
        .ok_or_else(|| HrError::forbidden("No employee profile"))?;

    let request = leave::submit_leave(
        store.get_ref(),
        &auth.actor(),
        leave::SubmitLeave {
            employee_id,
            leave_type: body.leave_type,
            start_date: body.start_date,
            end_date: body.end_date,
            reason: body.reason,
        },
        settings.get_ref(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(request))
}

#[derive(Deserialize, IntoParams)]
pub struct LeaveFilter {
    /// Filter by employee ID (forced to the caller's own for plain employees)
    pub employee_id: Option<u64>,
    /// Filter by leave status
    pub status: Option<LeaveStatus>,
    /// Pagination page number (start with 1)
    pub page: Option<u64>,
    /// Pagination per page number
    pub per_page: Option<u64>,
}

#[derive(Serialize, ToSchema)]
pub struct LeaveListResponse {
    pub data: Vec<LeaveRequest>,

    #[schema(example = 1)]
    pub page: u64,

    #[schema(example = 10)]
    pub per_page: u64,

    #[schema(example = 1)]
    pub total: i64,
}

/// Paginated leave listing. Plain employees see only their own requests.
#[utoipa::path(
    get,
    path = "/api/v1/leave",
    params(LeaveFilter),
    responses(
        (status = 200, description = "Paginated leave list", body = LeaveListResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn leave_list(
    auth: AuthUser,
    store: web::Data<MySqlStore>,
    query: web::Query<LeaveFilter>,
) -> Result<HttpResponse, HrError> {
    let per_page = query.per_page.unwrap_or(10).min(100);
    let page = query.page.unwrap_or(1).max(1);

    let employee_id = match auth.role {
        Role::Admin | Role::Hr => query.employee_id,
        _ => Some(
            auth.employee_id
                .ok_or_else(|| HrError::forbidden("No employee profile"))?,
        ),
    };

    let (data, total) = store
        .list_leaves(&LeaveListFilter {
            employee_id,
            status: query.status,
            page,
            per_page,
        })
        .await?;

    Ok(HttpResponse::Ok().json(LeaveListResponse {
        data,
        page,
        per_page,
        total,
    }))
}

/// Fetch one leave request.
#[utoipa::path(
    get,
    path = "/api/v1/leave/{id}",
    params(("id" = u64, Path, description = "Leave request id")),
    responses(
        (status = 200, description = "Leave request found", body = LeaveRequest),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Leave request not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn get_leave(
    auth: AuthUser,
    store: web::Data<MySqlStore>,
    path: web::Path<u64>,
) -> Result<HttpResponse, HrError> {
    let request = store
        .leave_by_id(path.into_inner())
        .await?
        .ok_or_else(|| HrError::not_found("Leave request not found"))?;

    let own = auth.employee_id == Some(request.employee_id);
    if !own && !matches!(auth.role, Role::Admin | Role::Hr) {
        return Err(HrError::forbidden("Not your leave request"));
    }
    Ok(HttpResponse::Ok().json(request))
}

/// At which step of the approval chain the decision is being made.
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DecisionLevel {
    Manager,
    Hr,
}

#[derive(Deserialize, ToSchema)]
pub struct DecideLeave {
    pub level: DecisionLevel,

    #[schema(nullable = true)]
    pub remarks: Option<String>,
}

/// Approve a leave request at the manager or HR level.
#[utoipa::path(
    put,
    path = "/api/v1/leave/{id}/approve",
    params(("id" = u64, Path, description = "Leave request id")),
    request_body = DecideLeave,
    responses(
        (status = 200, description = "The advanced request", body = LeaveRequest),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden (wrong manager, self-approval)"),
        (status = 404, description = "Leave request not found"),
        (status = 409, description = "Request already resolved")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn approve_leave(
    auth: AuthUser,
    store: web::Data<MySqlStore>,
    settings: web::Data<SettingsDoc>,
    path: web::Path<u64>,
    payload: web::Json<DecideLeave>,
) -> Result<HttpResponse, HrError> {
    let request = decide(&auth, &store, &settings, path.into_inner(), payload.into_inner(), true).await?;
    Ok(HttpResponse::Ok().json(request))
}

/// Reject a leave request at the manager or HR level.
#[utoipa::path(
    put,
    path = "/api/v1/leave/{id}/reject",
    params(("id" = u64, Path, description = "Leave request id")),
    request_body = DecideLeave,
    responses(
        (status = 200, description = "The rejected request", body = LeaveRequest),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Leave request not found"),
        (status = 409, description = "Request already resolved")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn reject_leave(
    auth: AuthUser,
    store: web::Data<MySqlStore>,
    settings: web::Data<SettingsDoc>,
    path: web::Path<u64>,
    payload: web::Json<DecideLeave>,
) -> Result<HttpResponse, HrError> {
    let request = decide(&auth, &store, &settings, path.into_inner(), payload.into_inner(), false).await?;
    Ok(HttpResponse::Ok().json(request))
}

async fn decide(
    auth: &AuthUser,
    store: &web::Data<MySqlStore>,
    settings: &web::Data<SettingsDoc>,
    request_id: u64,
    body: DecideLeave,
    approve: bool,
) -> Result<LeaveRequest, HrError> {
    match body.level {
        DecisionLevel::Manager => {
            leave::manager_decide(
                store.get_ref(),
                &auth.actor(),
                request_id,
                approve,
                body.remarks,
                settings.get_ref(),
            )
            .await
        }
        DecisionLevel::Hr => {
            leave::hr_decide(
                store.get_ref(),
                &auth.actor(),
                request_id,
                approve,
                body.remarks,
                settings.get_ref(),
            )
            .await
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct CancelLeave {
    #[schema(nullable = true)]
    pub remarks: Option<String>,
}

/// Withdraw or cancel a request; cancelling an approved one restores the
/// balance.
#[utoipa::path(
    put,
    path = "/api/v1/leave/{id}/cancel",
    params(("id" = u64, Path, description = "Leave request id")),
    request_body = CancelLeave,
    responses(
        (status = 200, description = "The cancelled request", body = LeaveRequest),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Leave request not found"),
        (status = 409, description = "Request already resolved")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn cancel_leave(
    auth: AuthUser,
    store: web::Data<MySqlStore>,
    settings: web::Data<SettingsDoc>,
    path: web::Path<u64>,
    payload: web::Json<CancelLeave>,
) -> Result<HttpResponse, HrError> {
    let request = leave::cancel_leave(
        store.get_ref(),
        &auth.actor(),
        path.into_inner(),
        payload.into_inner().remarks,
        settings.get_ref(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(request))
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateLeave {
    #[schema(example = "annual", nullable = true)]
    pub leave_type: Option<String>,

    #[schema(example = "2026-07-06", format = "date", value_type = String, nullable = true)]
    pub start_date: Option<NaiveDate>,

    #[schema(example = "2026-07-08", format = "date", value_type = String, nullable = true)]
    pub end_date: Option<NaiveDate>,

    #[schema(nullable = true)]
    pub reason: Option<String>,
}

/// Owner-only edit while the request is still pending.
#[utoipa::path(
    put,
    path = "/api/v1/leave/{id}",
    params(("id" = u64, Path, description = "Leave request id")),
    request_body = UpdateLeave,
    responses(
        (status = 200, description = "The edited request", body = LeaveRequest),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Leave request not found"),
        (status = 409, description = "Request no longer pending")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn update_leave(
    auth: AuthUser,
    store: web::Data<MySqlStore>,
    settings: web::Data<SettingsDoc>,
    path: web::Path<u64>,
    payload: web::Json<UpdateLeave>,
) -> Result<HttpResponse, HrError> {
    let body = payload.into_inner();
    let request = leave::edit_leave(
        store.get_ref(),
        &auth.actor(),
        path.into_inner(),
        leave::EditLeave {
            leave_type: body.leave_type,
            start_date: body.start_date,
            end_date: body.end_date,
            reason: body.reason,
        },
        settings.get_ref(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(request))
}

/// Delete a request (owner while pending; admin in any state).
#[utoipa::path(
    delete,
    path = "/api/v1/leave/{id}",
    params(("id" = u64, Path, description = "Leave request id")),
    responses(
        (status = 200, description = "Deleted", body = Object,
         example = json!({"message": "Leave request deleted"})),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Leave request not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn delete_leave(
    auth: AuthUser,
    store: web::Data<MySqlStore>,
    settings: web::Data<SettingsDoc>,
    path: web::Path<u64>,
) -> Result<HttpResponse, HrError> {
    leave::delete_leave(
        store.get_ref(),
        &auth.actor(),
        path.into_inner(),
        settings.get_ref(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "message": "Leave request deleted" })))
}

#[derive(Deserialize, ToSchema)]
pub struct ReconfigureLimit {
    #[schema(example = "annual")]
    pub leave_type: String,

    #[schema(example = 2026)]
    pub year: i32,

    #[schema(example = "18", value_type = String)]
    pub total: Decimal,
}

/// Apply a changed annual limit to every materialized balance of a type.
#[utoipa::path(
    put,
    path = "/api/v1/leave/limits",
    request_body = ReconfigureLimit,
    responses(
        (status = 200, description = "Balances updated", body = Object,
         example = json!({"updated": 42})),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn reconfigure_limit(
    auth: AuthUser,
    store: web::Data<MySqlStore>,
    settings: web::Data<SettingsDoc>,
    payload: web::Json<ReconfigureLimit>,
) -> Result<HttpResponse, HrError> {
    let body = payload.into_inner();
    let updated = leave::reconfigure_leave_limit(
        store.get_ref(),
        &auth.actor(),
        &body.leave_type,
        body.year,
        body.total,
        settings.get_ref(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "updated": updated })))
}
