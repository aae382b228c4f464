use actix_web::{HttpResponse, web};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::auth::AuthUser;
use crate::error::HrError;
use crate::model::payroll::{PayrollBatch, SalarySlip};
use crate::policy::{Action, Relation, authorize};
use crate::service::payroll;
use crate::settings::SettingsDoc;
use crate::store::HrStore;
use crate::store::mysql::MySqlStore;

#[derive(Deserialize, ToSchema)]
pub struct CreatePayroll {
    #[schema(example = 7)]
    pub month: u32,

    #[schema(example = 2026)]
    pub year: i32,

    /// Absent: the full-population flow (conflicts with an existing batch).
    /// Present: the selective flow, replacing these employees' slips.
    #[schema(nullable = true)]
    pub employee_ids: Option<Vec<u64>>,
}

/// Generate a payroll batch for a month.
#[utoipa::path(
    post,
    path = "/api/v1/payroll",
    request_body = CreatePayroll,
    responses(
        (status = 200, description = "The generated batch and its slips", body = payroll::PayrollRun),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 409, description = "A batch already exists for this month")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn create_payroll(
    auth: AuthUser,
    store: web::Data<MySqlStore>,
    settings: web::Data<SettingsDoc>,
    payload: web::Json<CreatePayroll>,
) -> Result<HttpResponse, HrError> {
    let body = payload.into_inner();
    let run = payroll::generate_payroll(
        store.get_ref(),
        &auth.actor(),
        body.month,
        body.year,
        body.employee_ids,
        settings.get_ref(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(run))
}

#[derive(Deserialize, ToSchema)]
pub struct PreviewPayroll {
    #[schema(example = 7)]
    pub month: u32,

    #[schema(example = 2026)]
    pub year: i32,

    pub employee_ids: Vec<u64>,
}

/// Same math as generation, nothing persisted.
#[utoipa::path(
    post,
    path = "/api/v1/payroll/preview",
    request_body = PreviewPayroll,
    responses(
        (status = 200, description = "Per-employee pay figures", body = [payroll::SlipFigures]),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "An employee was not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn preview_payroll(
    auth: AuthUser,
    store: web::Data<MySqlStore>,
    settings: web::Data<SettingsDoc>,
    payload: web::Json<PreviewPayroll>,
) -> Result<HttpResponse, HrError> {
    let body = payload.into_inner();
    let previews = payroll::preview_payroll(
        store.get_ref(),
        &auth.actor(),
        body.month,
        body.year,
        body.employee_ids,
        settings.get_ref(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(previews))
}

#[derive(Serialize, ToSchema)]
pub struct BatchDetail {
    pub batch: PayrollBatch,
    pub slips: Vec<SalarySlip>,
}

/// Fetch a batch with its slips.
#[utoipa::path(
    get,
    path = "/api/v1/payroll/{id}",
    params(("id" = u64, Path, description = "Payroll batch id")),
    responses(
        (status = 200, description = "Batch and slips", body = BatchDetail),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Batch not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn get_payroll(
    auth: AuthUser,
    store: web::Data<MySqlStore>,
    settings: web::Data<SettingsDoc>,
    path: web::Path<u64>,
) -> Result<HttpResponse, HrError> {
    authorize(
        &settings.work.policy_ctx(),
        Action::PreviewPayroll,
        &auth.actor(),
        Relation::Other,
    )?;

    let batch = store
        .batch_by_id(path.into_inner())
        .await?
        .ok_or_else(|| HrError::not_found("Payroll batch not found"))?;
    let slips = store.slips_for_batch(batch.id).await?;

    Ok(HttpResponse::Ok().json(BatchDetail { batch, slips }))
}

/// Close a batch: slips become paid, the month's attendance locks.
#[utoipa::path(
    put,
    path = "/api/v1/payroll/{id}/pay",
    params(("id" = u64, Path, description = "Payroll batch id")),
    responses(
        (status = 200, description = "Paid report", body = payroll::PaidReport),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Batch not found"),
        (status = 409, description = "Batch not in a payable state")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn pay_payroll(
    auth: AuthUser,
    store: web::Data<MySqlStore>,
    settings: web::Data<SettingsDoc>,
    path: web::Path<u64>,
) -> Result<HttpResponse, HrError> {
    let report = payroll::mark_payroll_paid(
        store.get_ref(),
        &auth.actor(),
        path.into_inner(),
        settings.get_ref(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(report))
}

/// Cancel a never-paid batch, freeing the month.
#[utoipa::path(
    put,
    path = "/api/v1/payroll/{id}/cancel",
    params(("id" = u64, Path, description = "Payroll batch id")),
    responses(
        (status = 200, description = "The cancelled batch", body = PayrollBatch),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Batch not found"),
        (status = 409, description = "Batch already paid")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn cancel_payroll(
    auth: AuthUser,
    store: web::Data<MySqlStore>,
    settings: web::Data<SettingsDoc>,
    path: web::Path<u64>,
) -> Result<HttpResponse, HrError> {
    let batch = payroll::cancel_batch(
        store.get_ref(),
        &auth.actor(),
        path.into_inner(),
        settings.get_ref(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(batch))
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateSlip {
    #[schema(example = "15000.00", value_type = String, nullable = true)]
    pub basic: Option<Decimal>,

    #[schema(example = "15000.00", value_type = String, nullable = true)]
    pub allowances: Option<Decimal>,

    #[schema(example = "0.00", value_type = String, nullable = true)]
    pub reimbursements: Option<Decimal>,

    #[schema(example = "2500.00", value_type = String, nullable = true)]
    pub loss_of_pay: Option<Decimal>,

    #[schema(example = "1800.00", value_type = String, nullable = true)]
    pub pf: Option<Decimal>,

    #[schema(example = "0.00", value_type = String, nullable = true)]
    pub tax: Option<Decimal>,

    #[schema(example = "0.00", value_type = String, nullable = true)]
    pub other_deductions: Option<Decimal>,
}

/// Correct an unpaid slip's components; gross and net are recomputed.
#[utoipa::path(
    put,
    path = "/api/v1/payroll/slips/{id}",
    params(("id" = u64, Path, description = "Salary slip id")),
    request_body = UpdateSlip,
    responses(
        (status = 200, description = "The recomputed slip", body = SalarySlip),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Slip not found"),
        (status = 409, description = "Slip or batch already paid")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn update_slip(
    auth: AuthUser,
    store: web::Data<MySqlStore>,
    settings: web::Data<SettingsDoc>,
    path: web::Path<u64>,
    payload: web::Json<UpdateSlip>,
) -> Result<HttpResponse, HrError> {
    let body = payload.into_inner();
    let slip = payroll::update_slip(
        store.get_ref(),
        &auth.actor(),
        path.into_inner(),
        payroll::SlipComponents {
            basic: body.basic,
            allowances: body.allowances,
            reimbursements: body.reimbursements,
            loss_of_pay: body.loss_of_pay,
            pf: body.pf,
            tax: body.tax,
            other_deductions: body.other_deductions,
        },
        settings.get_ref(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(slip))
}
