use std::future::Future;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;

use crate::error::Result;
use crate::model::attendance::{AttendanceRecord, NewAttendance};
use crate::model::employee::EmployeeLite;
use crate::model::leave::{LeaveBalance, LeaveRequest, LeaveStatus, NewLeaveRequest};
use crate::model::payroll::{NewSalarySlip, PayrollBatch, SalarySlip};
use crate::model::punch::{IncomingPunch, PunchStatus, RawPunch};
use crate::model::regularization::{NewRegularization, RegularizationRequest};

pub mod memory;
pub mod mysql;

/// Read-only view of the employee directory. The directory is owned by the
/// out-of-scope employee module; this core only consumes it.
pub trait EmployeeDirectory: Send + Sync {
    fn employee_by_id(&self, id: u64) -> impl Future<Output = Result<Option<EmployeeLite>>> + Send;

    /// Resolve the identifier a clock device reports to an employee.
    fn employee_by_code(&self, code: &str)
    -> impl Future<Output = Result<Option<EmployeeLite>>> + Send;

    fn active_employees(&self) -> impl Future<Output = Result<Vec<EmployeeLite>>> + Send;
}

/// Company holiday calendar, owned elsewhere.
pub trait HolidayCalendar: Send + Sync {
    fn is_holiday(&self, date: NaiveDate) -> impl Future<Output = Result<bool>> + Send;
}

/// Approved reimbursement totals folded into gross pay, owned elsewhere.
pub trait ReimbursementSource: Send + Sync {
    fn approved_unpaid_total(
        &self,
        employee_id: u64,
        month: u32,
        year: i32,
    ) -> impl Future<Output = Result<Decimal>> + Send;

    fn mark_reimbursed(
        &self,
        employee_id: u64,
        month: u32,
        year: i32,
    ) -> impl Future<Output = Result<u64>> + Send;
}

/// Filter for paginated leave listings.
#[derive(Debug, Clone, Default)]
pub struct LeaveListFilter {
    pub employee_id: Option<u64>,
    pub status: Option<LeaveStatus>,
    pub page: u64,
    pub per_page: u64,
}

/// Persistence boundary for the data this core owns: punches, attendance,
/// leave, regularization, payroll and the settings document.
///
/// Natural-key uniqueness is the concurrency guard: implementations must
/// reject duplicate (employee, date) attendance rows, duplicate
/// (employee, month, year) slips and a second non-cancelled batch per month
/// rather than silently overwrite.
pub trait HrStore:
    EmployeeDirectory + HolidayCalendar + ReimbursementSource + Send + Sync
{
    // --- raw punches (append-only) ---

    fn punch_exists(
        &self,
        device_person_id: &str,
        punched_at: NaiveDateTime,
        origin: &str,
    ) -> impl Future<Output = Result<bool>> + Send;

    fn insert_punch(&self, punch: IncomingPunch) -> impl Future<Output = Result<RawPunch>> + Send;

    fn pending_punches_on(
        &self,
        date: NaiveDate,
    ) -> impl Future<Output = Result<Vec<RawPunch>>> + Send;

    fn set_punch_status(
        &self,
        id: u64,
        status: PunchStatus,
    ) -> impl Future<Output = Result<()>> + Send;

    // --- attendance ---

    fn attendance_by_id(
        &self,
        id: u64,
    ) -> impl Future<Output = Result<Option<AttendanceRecord>>> + Send;

    fn attendance_on(
        &self,
        employee_id: u64,
        date: NaiveDate,
    ) -> impl Future<Output = Result<Option<AttendanceRecord>>> + Send;

    fn insert_attendance(
        &self,
        rec: NewAttendance,
    ) -> impl Future<Output = Result<AttendanceRecord>> + Send;

    /// Full-row update keyed by `rec.id`.
    fn update_attendance(
        &self,
        rec: &AttendanceRecord,
    ) -> impl Future<Output = Result<()>> + Send;

    fn attendance_for_month(
        &self,
        employee_id: u64,
        month: u32,
        year: i32,
    ) -> impl Future<Output = Result<Vec<AttendanceRecord>>> + Send;

    /// Records still `present` with a check-in but no check-out, dated at or
    /// before the given day. Input to the half-day correction pass.
    fn open_present_before(
        &self,
        date: NaiveDate,
    ) -> impl Future<Output = Result<Vec<AttendanceRecord>>> + Send;

    /// Set `is_locked` on every record in the month; returns rows newly locked.
    fn lock_month(&self, month: u32, year: i32) -> impl Future<Output = Result<u64>> + Send;

    // --- leave ---

    fn insert_leave(
        &self,
        req: NewLeaveRequest,
    ) -> impl Future<Output = Result<LeaveRequest>> + Send;

    fn leave_by_id(&self, id: u64) -> impl Future<Output = Result<Option<LeaveRequest>>> + Send;

    fn update_leave(&self, req: &LeaveRequest) -> impl Future<Output = Result<()>> + Send;

    fn delete_leave(&self, id: u64) -> impl Future<Output = Result<()>> + Send;

    fn list_leaves(
        &self,
        filter: &LeaveListFilter,
    ) -> impl Future<Output = Result<(Vec<LeaveRequest>, i64)>> + Send;

    /// An approved request whose date range covers the given day, if any.
    fn approved_leave_covering(
        &self,
        employee_id: u64,
        date: NaiveDate,
    ) -> impl Future<Output = Result<Option<LeaveRequest>>> + Send;

    fn leave_balance(
        &self,
        employee_id: u64,
        leave_type: &str,
        year: i32,
    ) -> impl Future<Output = Result<Option<LeaveBalance>>> + Send;

    /// Insert-or-replace keyed by (employee, type, year).
    fn save_leave_balance(
        &self,
        balance: &LeaveBalance,
    ) -> impl Future<Output = Result<()>> + Send;

    fn balances_for_type(
        &self,
        leave_type: &str,
        year: i32,
    ) -> impl Future<Output = Result<Vec<LeaveBalance>>> + Send;

    // --- regularization ---

    fn insert_regularization(
        &self,
        req: NewRegularization,
    ) -> impl Future<Output = Result<RegularizationRequest>> + Send;

    fn regularization_by_id(
        &self,
        id: u64,
    ) -> impl Future<Output = Result<Option<RegularizationRequest>>> + Send;

    fn update_regularization(
        &self,
        req: &RegularizationRequest,
    ) -> impl Future<Output = Result<()>> + Send;

    // --- payroll ---

    /// The month's non-cancelled batch, if one exists.
    fn active_batch(
        &self,
        month: u32,
        year: i32,
    ) -> impl Future<Output = Result<Option<PayrollBatch>>> + Send;

    fn batch_by_id(&self, id: u64) -> impl Future<Output = Result<Option<PayrollBatch>>> + Send;

    fn insert_batch(
        &self,
        month: u32,
        year: i32,
        processed_by: Option<u64>,
    ) -> impl Future<Output = Result<PayrollBatch>> + Send;

    fn update_batch(&self, batch: &PayrollBatch) -> impl Future<Output = Result<()>> + Send;

    fn insert_slip(&self, slip: NewSalarySlip) -> impl Future<Output = Result<SalarySlip>> + Send;

    fn slip_by_id(&self, id: u64) -> impl Future<Output = Result<Option<SalarySlip>>> + Send;

    fn slips_for_batch(
        &self,
        batch_id: u64,
    ) -> impl Future<Output = Result<Vec<SalarySlip>>> + Send;

    fn slip_for(
        &self,
        employee_id: u64,
        month: u32,
        year: i32,
    ) -> impl Future<Output = Result<Option<SalarySlip>>> + Send;

    fn delete_slips_for(
        &self,
        batch_id: u64,
        employee_ids: &[u64],
    ) -> impl Future<Output = Result<u64>> + Send;

    /// Remove every slip of a batch; used when a batch is cancelled so the
    /// (employee, month, year) slots reopen.
    fn delete_all_slips(&self, batch_id: u64) -> impl Future<Output = Result<u64>> + Send;

    fn update_slip(&self, slip: &SalarySlip) -> impl Future<Output = Result<()>> + Send;

    fn mark_slips_paid(&self, batch_id: u64) -> impl Future<Output = Result<u64>> + Send;

    // --- settings document ---

    fn load_settings(&self) -> impl Future<Output = Result<Option<serde_json::Value>>> + Send;

    fn save_settings(&self, doc: &serde_json::Value) -> impl Future<Output = Result<()>> + Send;
}
