use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Approval state machine:
/// `PendingManager → PendingHr → Approved | Rejected`, with a shortcut
/// straight into `PendingHr` when the employee has no plain-employee manager.
/// `Cancelled`/`Withdrawn` are exits taken by the owner or an admin.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema,
    strum_macros::Display,
)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LeaveStatus {
    PendingManager,
    PendingHr,
    Approved,
    Rejected,
    Cancelled,
    Withdrawn,
}

impl LeaveStatus {
    /// States from which the owner may still pull the request back.
    pub fn is_pre_terminal(&self) -> bool {
        matches!(self, LeaveStatus::PendingManager | LeaveStatus::PendingHr)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct LeaveRequest {
    #[schema(example = 1)]
    pub id: u64,

    #[schema(example = 1001)]
    pub employee_id: u64,

    /// Free-form type identifier resolved against configured limits.
    #[schema(example = "annual")]
    pub leave_type: String,

    #[schema(example = "2026-07-06", value_type = String, format = "date")]
    pub start_date: NaiveDate,

    #[schema(example = "2026-07-08", value_type = String, format = "date")]
    pub end_date: NaiveDate,

    /// Working-day count, always recomputed server-side.
    #[schema(example = "3", value_type = String)]
    pub days: Decimal,

    #[schema(example = "family travel")]
    pub reason: String,

    pub status: LeaveStatus,

    #[schema(example = 42, nullable = true)]
    pub manager_id: Option<u64>,

    #[schema(example = 7, nullable = true)]
    pub approver_id: Option<u64>,

    #[schema(nullable = true)]
    pub remarks: Option<String>,

    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}

/// Insert shape; `days`, routing and status are decided by the service.
#[derive(Debug, Clone)]
pub struct NewLeaveRequest {
    pub employee_id: u64,
    pub leave_type: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub days: Decimal,
    pub reason: String,
    pub status: LeaveStatus,
    pub manager_id: Option<u64>,
}

/// Per (employee, leave type, year) entitlement ledger.
/// Invariant: `remaining == total - used` after every mutation.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct LeaveBalance {
    #[schema(example = 1001)]
    pub employee_id: u64,

    #[schema(example = "annual")]
    pub leave_type: String,

    #[schema(example = 2026)]
    pub year: i32,

    #[schema(example = "18", value_type = String)]
    pub total: Decimal,

    #[schema(example = "5", value_type = String)]
    pub used: Decimal,

    #[schema(example = "13", value_type = String)]
    pub remaining: Decimal,
}

impl LeaveBalance {
    pub fn fresh(employee_id: u64, leave_type: &str, year: i32, total: Decimal) -> Self {
        Self {
            employee_id,
            leave_type: leave_type.to_string(),
            year,
            total,
            used: Decimal::ZERO,
            remaining: total,
        }
    }

    pub fn consume(&mut self, days: Decimal) {
        self.used += days;
        self.remaining = self.total - self.used;
    }

    pub fn restore(&mut self, days: Decimal) {
        self.used -= days;
        if self.used < Decimal::ZERO {
            self.used = Decimal::ZERO;
        }
        self.remaining = self.total - self.used;
    }

    /// Re-point `total` at a new configured limit without losing `used`.
    /// `remaining` is clamped at zero when already over-consumed.
    pub fn reconfigure(&mut self, total: Decimal) {
        self.total = total;
        self.remaining = (self.total - self.used).max(Decimal::ZERO);
    }
}
