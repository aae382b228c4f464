use actix_web::{HttpResponse, web};
use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::auth::auth::AuthUser;
use crate::error::HrError;
use crate::model::attendance::AttendanceStatus;
use crate::model::regularization::{NewRegularization, RegularizationKind, RegularizationRequest};
use crate::service::regularization;
use crate::settings::SettingsDoc;
use crate::store::mysql::MySqlStore;

#[derive(Deserialize, ToSchema)]
pub struct CreateRegularization {
    #[schema(example = "2026-07-01", format = "date", value_type = String)]
    pub date: NaiveDate,

    pub kind: RegularizationKind,

    #[schema(example = "09:00:00", value_type = String, nullable = true)]
    pub requested_check_in: Option<NaiveTime>,

    #[schema(example = "18:30:00", value_type = String, nullable = true)]
    pub requested_check_out: Option<NaiveTime>,

    #[schema(nullable = true)]
    pub requested_status: Option<AttendanceStatus>,

    #[schema(example = "forgot to clock out, left at 18:30")]
    pub reason: String,
}

/// Dispute one's own derived attendance record.
#[utoipa::path(
    post,
    path = "/api/v1/regularization",
    request_body = CreateRegularization,
    responses(
        (status = 200, description = "The filed request", body = RegularizationRequest),
        (status = 400, description = "Requested fields do not match the kind"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Regularization"
)]
pub async fn create_regularization(
    auth: AuthUser,
    store: web::Data<MySqlStore>,
    settings: web::Data<SettingsDoc>,
    payload: web::Json<CreateRegularization>,
) -> Result<HttpResponse, HrError> {
    let employee_id = auth
        .employee_id
        .ok_or_else(|| HrError::forbidden("No employee profile"))?;

    let body = payload.into_inner();
    let request = regularization::request_regularization(
        store.get_ref(),
        &auth.actor(),
        NewRegularization {
            employee_id,
            date: body.date,
            kind: body.kind,
            requested_check_in: body.requested_check_in,
            requested_check_out: body.requested_check_out,
            requested_status: body.requested_status,
            reason: body.reason,
        },
        settings.get_ref(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(request))
}

#[derive(Deserialize, ToSchema)]
pub struct ReviewRemarks {
    #[schema(nullable = true)]
    pub remarks: Option<String>,
}

/// Approve a correction; the attendance record is patched accordingly.
#[utoipa::path(
    put,
    path = "/api/v1/regularization/{id}/approve",
    params(("id" = u64, Path, description = "Regularization request id")),
    request_body = ReviewRemarks,
    responses(
        (status = 200, description = "The approved request", body = RegularizationRequest),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden (self-review)"),
        (status = 404, description = "Request not found"),
        (status = 409, description = "Already resolved, or record locked")
    ),
    security(("bearer_auth" = [])),
    tag = "Regularization"
)]
pub async fn approve_regularization(
    auth: AuthUser,
    store: web::Data<MySqlStore>,
    settings: web::Data<SettingsDoc>,
    path: web::Path<u64>,
    payload: web::Json<ReviewRemarks>,
) -> Result<HttpResponse, HrError> {
    let request = regularization::process_regularization(
        store.get_ref(),
        &auth.actor(),
        path.into_inner(),
        true,
        payload.into_inner().remarks,
        settings.get_ref(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(request))
}

/// Reject a correction; the attendance record is left untouched.
#[utoipa::path(
    put,
    path = "/api/v1/regularization/{id}/reject",
    params(("id" = u64, Path, description = "Regularization request id")),
    request_body = ReviewRemarks,
    responses(
        (status = 200, description = "The rejected request", body = RegularizationRequest),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Request not found"),
        (status = 409, description = "Already resolved")
    ),
    security(("bearer_auth" = [])),
    tag = "Regularization"
)]
pub async fn reject_regularization(
    auth: AuthUser,
    store: web::Data<MySqlStore>,
    settings: web::Data<SettingsDoc>,
    path: web::Path<u64>,
    payload: web::Json<ReviewRemarks>,
) -> Result<HttpResponse, HrError> {
    let request = regularization::process_regularization(
        store.get_ref(),
        &auth.actor(),
        path.into_inner(),
        false,
        payload.into_inner().remarks,
        settings.get_ref(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(request))
}
