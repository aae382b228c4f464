use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::model::attendance::AttendanceStatus;

/// Which fields of the attendance record the correction proposes to change.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema,
    strum_macros::Display,
)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RegularizationKind {
    CheckIn,
    CheckOut,
    Both,
    StatusChange,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema,
    strum_macros::Display,
)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RegularizationStatus {
    Pending,
    Approved,
    Rejected,
}

/// Employee-initiated dispute of a derived attendance record.
/// A resolved request cannot be resolved again.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct RegularizationRequest {
    #[schema(example = 1)]
    pub id: u64,

    #[schema(example = 1001)]
    pub employee_id: u64,

    #[schema(example = "2026-07-01", value_type = String, format = "date")]
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

    pub status: RegularizationStatus,

    #[schema(example = 7, nullable = true)]
    pub reviewed_by: Option<u64>,

    #[schema(nullable = true)]
    pub review_remarks: Option<String>,

    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewRegularization {
    pub employee_id: u64,
    pub date: NaiveDate,
    pub kind: RegularizationKind,
    pub requested_check_in: Option<NaiveTime>,
    pub requested_check_out: Option<NaiveTime>,
    pub requested_status: Option<AttendanceStatus>,
    pub reason: String,
}
