use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Batch lifecycle: `Draft → Processed → Paid`, or `Cancelled` from any
/// pre-paid state. `Paid` is terminal and locks the month's attendance.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema,
    strum_macros::Display,
)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BatchStatus {
    Draft,
    Processed,
    Paid,
    Cancelled,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema,
    strum_macros::Display,
)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SlipStatus {
    Draft,
    Processed,
    Paid,
}

/// One payroll run for a month. At most one non-cancelled batch per
/// (month, year); `total_amount` is always the exact sum of slip nets.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct PayrollBatch {
    #[schema(example = 1)]
    pub id: u64,

    #[schema(example = 7)]
    pub month: u32,

    #[schema(example = 2026)]
    pub year: i32,

    pub status: BatchStatus,

    #[schema(example = 120)]
    pub employee_count: u32,

    #[schema(example = "3084000.00", value_type = String)]
    pub total_amount: Decimal,

    #[schema(example = 7, nullable = true)]
    pub processed_by: Option<u64>,

    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,

    #[schema(value_type = String, format = "date-time", nullable = true)]
    pub paid_at: Option<DateTime<Utc>>,
}

/// One employee's computed pay breakdown within a batch.
/// Unique per (employee, month, year); immutable once `Paid`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct SalarySlip {
    #[schema(example = 1)]
    pub id: u64,

    #[schema(example = 1)]
    pub batch_id: u64,

    #[schema(example = 1001)]
    pub employee_id: u64,

    #[schema(example = 7)]
    pub month: u32,

    #[schema(example = 2026)]
    pub year: i32,

    #[schema(example = "15000.00", value_type = String)]
    pub basic: Decimal,

    #[schema(example = "15000.00", value_type = String)]
    pub allowances: Decimal,

    #[schema(example = "0.00", value_type = String)]
    pub reimbursements: Decimal,

    #[schema(example = "2500.00", value_type = String)]
    pub loss_of_pay: Decimal,

    #[schema(example = "1800.00", value_type = String)]
    pub pf: Decimal,

    #[schema(example = "0.00", value_type = String)]
    pub tax: Decimal,

    #[schema(example = "0.00", value_type = String)]
    pub other_deductions: Decimal,

    #[schema(example = "30000.00", value_type = String)]
    pub gross: Decimal,

    #[schema(example = "25700.00", value_type = String)]
    pub net: Decimal,

    pub status: SlipStatus,

    #[schema(example = 25)]
    pub present_days: u32,

    #[schema(example = 1)]
    pub half_days: u32,

    #[schema(example = 2)]
    pub absent_days: u32,
}

/// Slip fields before the store assigns an id.
#[derive(Debug, Clone)]
pub struct NewSalarySlip {
    pub batch_id: u64,
    pub employee_id: u64,
    pub month: u32,
    pub year: i32,
    pub basic: Decimal,
    pub allowances: Decimal,
    pub reimbursements: Decimal,
    pub loss_of_pay: Decimal,
    pub pf: Decimal,
    pub tax: Decimal,
    pub other_deductions: Decimal,
    pub gross: Decimal,
    pub net: Decimal,
    pub status: SlipStatus,
    pub present_days: u32,
    pub half_days: u32,
    pub absent_days: u32,
}
