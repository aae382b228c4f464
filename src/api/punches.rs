use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::Deserialize;
use utoipa::ToSchema;

use crate::auth::auth::AuthUser;
use crate::error::HrError;
use crate::model::punch::IncomingPunch;
use crate::service::ingest;
use crate::settings::SettingsDoc;
use crate::store::mysql::MySqlStore;

#[derive(Deserialize, ToSchema)]
pub struct IngestPunches {
    pub punches: Vec<IncomingPunch>,

    /// Run the dedup checks without persisting anything.
    #[serde(default)]
    #[schema(example = false)]
    pub dry_run: bool,
}

/// Accept a batch of raw clock events from a device or gateway.
#[utoipa::path(
    post,
    path = "/api/v1/punches",
    request_body = IngestPunches,
    responses(
        (status = 200, description = "Ingestion report", body = ingest::IngestReport),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Punches"
)]
pub async fn ingest_punches(
    auth: AuthUser,
    store: web::Data<MySqlStore>,
    settings: web::Data<SettingsDoc>,
    payload: web::Json<IngestPunches>,
) -> Result<HttpResponse, HrError> {
    let body = payload.into_inner();
    let report = ingest::ingest_punches(
        store.get_ref(),
        &auth.actor(),
        body.punches,
        body.dry_run,
        settings.get_ref(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(report))
}

#[derive(Deserialize, ToSchema)]
pub struct ProcessPunches {
    #[schema(example = "2026-07-01", format = "date", value_type = String)]
    pub date: NaiveDate,
}

/// Fold a day's pending punches into attendance records.
#[utoipa::path(
    post,
    path = "/api/v1/punches/process",
    request_body = ProcessPunches,
    responses(
        (status = 200, description = "Processing report", body = ingest::ProcessReport),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Punches"
)]
pub async fn process_punches(
    auth: AuthUser,
    store: web::Data<MySqlStore>,
    settings: web::Data<SettingsDoc>,
    payload: web::Json<ProcessPunches>,
) -> Result<HttpResponse, HrError> {
    let report = ingest::process_pending(
        store.get_ref(),
        &auth.actor(),
        payload.date,
        settings.get_ref(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(report))
}
