use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Derived outcome for one employee-day.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema,
    strum_macros::Display,
)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AttendanceStatus {
    Present,
    Absent,
    HalfDay,
    OnLeave,
    Holiday,
    Weekend,
}

/// Where the record's timestamps came from.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema,
    strum_macros::Display,
)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AttendanceSource {
    Biometric,
    Manual,
    Adjusted,
}

/// One employee-day. At most one row per (employee, date); once `is_locked`
/// is set by payroll close, every ordinary write path must reject the row.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct AttendanceRecord {
    #[schema(example = 1)]
    pub id: u64,

    #[schema(example = 1001)]
    pub employee_id: u64,

    #[schema(example = "2026-07-01", value_type = String, format = "date")]
    pub date: NaiveDate,

    #[schema(example = "09:00:00", value_type = String, nullable = true)]
    pub check_in: Option<NaiveTime>,

    #[schema(example = "18:00:00", value_type = String, nullable = true)]
    pub check_out: Option<NaiveTime>,

    pub status: AttendanceStatus,

    #[schema(example = "8.50", value_type = String, nullable = true)]
    pub work_hours: Option<Decimal>,

    #[schema(example = 30)]
    pub overtime_minutes: i64,

    #[schema(example = 0)]
    pub late_minutes: i64,

    pub is_locked: bool,

    pub source: AttendanceSource,

    #[schema(example = 7, nullable = true)]
    pub edited_by: Option<u64>,

    #[schema(example = "regularization #42 approved", nullable = true)]
    pub edit_reason: Option<String>,
}

/// Insert shape for a new employee-day row.
#[derive(Debug, Clone)]
pub struct NewAttendance {
    pub employee_id: u64,
    pub date: NaiveDate,
    pub check_in: Option<NaiveTime>,
    pub check_out: Option<NaiveTime>,
    pub status: AttendanceStatus,
    pub work_hours: Option<Decimal>,
    pub overtime_minutes: i64,
    pub late_minutes: i64,
    pub source: AttendanceSource,
    pub edited_by: Option<u64>,
    pub edit_reason: Option<String>,
}

impl NewAttendance {
    /// Bare row carrying only a status, used by the sweep and leave approval.
    pub fn status_only(
        employee_id: u64,
        date: NaiveDate,
        status: AttendanceStatus,
        source: AttendanceSource,
    ) -> Self {
        Self {
            employee_id,
            date,
            check_in: None,
            check_out: None,
            status,
            work_hours: None,
            overtime_minutes: 0,
            late_minutes: 0,
            source,
            edited_by: None,
            edit_reason: None,
        }
    }
}

/// Day-count aggregation for one employee-month, reused by payroll.
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct MonthSummary {
    pub present_days: u32,
    pub half_days: u32,
    pub absent_days: u32,
    pub on_leave_days: u32,
    pub holiday_days: u32,
    pub weekend_days: u32,
}

impl MonthSummary {
    pub fn tally(records: &[AttendanceRecord]) -> Self {
        let mut s = Self::default();
        for rec in records {
            match rec.status {
                AttendanceStatus::Present => s.present_days += 1,
                AttendanceStatus::HalfDay => s.half_days += 1,
                AttendanceStatus::Absent => s.absent_days += 1,
                AttendanceStatus::OnLeave => s.on_leave_days += 1,
                AttendanceStatus::Holiday => s.holiday_days += 1,
                AttendanceStatus::Weekend => s.weekend_days += 1,
            }
        }
        s
    }
}
