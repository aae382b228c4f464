//! MySQL implementation of the store traits on the shared connection pool.
//!
//! Uniqueness is enforced by the schema: `raw_punches` carries a unique index
//! on (device_person_id, punched_at, origin), `attendance` on
//! (employee_id, date) and `salary_slips` on (employee_id, month, year).
//! Duplicate-key rejections surface as `HrError::Conflict`.

use chrono::{NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use sqlx::MySqlPool;

use crate::calendar;
use crate::error::{HrError, Result};
use crate::model::attendance::{AttendanceRecord, AttendanceStatus, NewAttendance};
use crate::model::employee::EmployeeLite;
use crate::model::leave::{LeaveBalance, LeaveRequest, LeaveStatus, NewLeaveRequest};
use crate::model::payroll::{BatchStatus, NewSalarySlip, PayrollBatch, SalarySlip, SlipStatus};
use crate::model::punch::{IncomingPunch, PunchStatus, RawPunch};
use crate::model::regularization::{
    NewRegularization, RegularizationRequest, RegularizationStatus,
};
use crate::utils::employee_cache;

use super::{
    EmployeeDirectory, HolidayCalendar, HrStore, LeaveListFilter, ReimbursementSource,
};

#[derive(Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }
}

const ATTENDANCE_COLS: &str = "id, employee_id, date, check_in, check_out, status, work_hours, \
     overtime_minutes, late_minutes, is_locked, source, edited_by, edit_reason";

const LEAVE_COLS: &str = "id, employee_id, leave_type, start_date, end_date, days, reason, \
     status, manager_id, approver_id, remarks, created_at";

const SLIP_COLS: &str = "id, batch_id, employee_id, month, year, basic, allowances, \
     reimbursements, loss_of_pay, pf, tax, other_deductions, gross, net, status, \
     present_days, half_days, absent_days";

impl EmployeeDirectory for MySqlStore {
    async fn employee_by_id(&self, id: u64) -> Result<Option<EmployeeLite>> {
        if let Some(hit) = employee_cache::get(id).await {
            return Ok(Some(hit));
        }

        let employee = sqlx::query_as::<_, EmployeeLite>(
            "SELECT id, name, monthly_salary, manager_id, role_id, active \
             FROM employees WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(emp) = &employee {
            employee_cache::put(emp.clone()).await;
        }
        Ok(employee)
    }

    async fn employee_by_code(&self, code: &str) -> Result<Option<EmployeeLite>> {
        let employee = sqlx::query_as::<_, EmployeeLite>(
            "SELECT id, name, monthly_salary, manager_id, role_id, active \
             FROM employees WHERE employee_code = ?",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;
        Ok(employee)
    }

    async fn active_employees(&self) -> Result<Vec<EmployeeLite>> {
        let employees = sqlx::query_as::<_, EmployeeLite>(
            "SELECT id, name, monthly_salary, manager_id, role_id, active \
             FROM employees WHERE active = 1 ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(employees)
    }
}

impl HolidayCalendar for MySqlStore {
    async fn is_holiday(&self, date: NaiveDate) -> Result<bool> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM holidays WHERE holiday_date = ?")
                .bind(date)
                .fetch_one(&self.pool)
                .await?;
        Ok(count > 0)
    }
}

impl ReimbursementSource for MySqlStore {
    async fn approved_unpaid_total(
        &self,
        employee_id: u64,
        month: u32,
        year: i32,
    ) -> Result<Decimal> {
        let total: Option<Decimal> = sqlx::query_scalar(
            "SELECT SUM(amount) FROM reimbursements \
             WHERE employee_id = ? AND month = ? AND year = ? \
             AND status = 'approved' AND reimbursed = 0",
        )
        .bind(employee_id)
        .bind(month)
        .bind(year)
        .fetch_one(&self.pool)
        .await?;
        Ok(total.unwrap_or(Decimal::ZERO))
    }

    async fn mark_reimbursed(&self, employee_id: u64, month: u32, year: i32) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE reimbursements SET reimbursed = 1 \
             WHERE employee_id = ? AND month = ? AND year = ? \
             AND status = 'approved' AND reimbursed = 0",
        )
        .bind(employee_id)
        .bind(month)
        .bind(year)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

impl HrStore for MySqlStore {
    async fn punch_exists(
        &self,
        device_person_id: &str,
        punched_at: NaiveDateTime,
        origin: &str,
    ) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM raw_punches \
             WHERE device_person_id = ? AND punched_at = ? AND origin = ?",
        )
        .bind(device_person_id)
        .bind(punched_at)
        .bind(origin)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    async fn insert_punch(&self, punch: IncomingPunch) -> Result<RawPunch> {
        let received_at = Utc::now();
        let result = sqlx::query(
            "INSERT INTO raw_punches \
             (device_person_id, punched_at, direction, source, origin, status, received_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&punch.device_person_id)
        .bind(punch.punched_at)
        .bind(punch.direction)
        .bind(punch.source)
        .bind(&punch.origin)
        .bind(PunchStatus::Pending)
        .bind(received_at)
        .execute(&self.pool)
        .await?;

        Ok(RawPunch {
            id: result.last_insert_id(),
            device_person_id: punch.device_person_id,
            punched_at: punch.punched_at,
            direction: punch.direction,
            source: punch.source,
            origin: punch.origin,
            status: PunchStatus::Pending,
            received_at,
        })
    }

    async fn pending_punches_on(&self, date: NaiveDate) -> Result<Vec<RawPunch>> {
        let punches = sqlx::query_as::<_, RawPunch>(
            "SELECT id, device_person_id, punched_at, direction, source, origin, status, received_at \
             FROM raw_punches \
             WHERE status = ? AND DATE(punched_at) = ? \
             ORDER BY punched_at",
        )
        .bind(PunchStatus::Pending)
        .bind(date)
        .fetch_all(&self.pool)
        .await?;
        Ok(punches)
    }

    async fn set_punch_status(&self, id: u64, status: PunchStatus) -> Result<()> {
        let result = sqlx::query("UPDATE raw_punches SET status = ? WHERE id = ?")
            .bind(status)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(HrError::not_found("Punch not found"));
        }
        Ok(())
    }

    async fn attendance_by_id(&self, id: u64) -> Result<Option<AttendanceRecord>> {
        let rec = sqlx::query_as::<_, AttendanceRecord>(&format!(
            "SELECT {} FROM attendance WHERE id = ?",
            ATTENDANCE_COLS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(rec)
    }

    async fn attendance_on(
        &self,
        employee_id: u64,
        date: NaiveDate,
    ) -> Result<Option<AttendanceRecord>> {
        let rec = sqlx::query_as::<_, AttendanceRecord>(&format!(
            "SELECT {} FROM attendance WHERE employee_id = ? AND date = ?",
            ATTENDANCE_COLS
        ))
        .bind(employee_id)
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;
        Ok(rec)
    }

    async fn insert_attendance(&self, rec: NewAttendance) -> Result<AttendanceRecord> {
        let result = sqlx::query(
            "INSERT INTO attendance \
             (employee_id, date, check_in, check_out, status, work_hours, overtime_minutes, \
              late_minutes, is_locked, source, edited_by, edit_reason) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?, ?)",
        )
        .bind(rec.employee_id)
        .bind(rec.date)
        .bind(rec.check_in)
        .bind(rec.check_out)
        .bind(rec.status)
        .bind(rec.work_hours)
        .bind(rec.overtime_minutes)
        .bind(rec.late_minutes)
        .bind(rec.source)
        .bind(rec.edited_by)
        .bind(&rec.edit_reason)
        .execute(&self.pool)
        .await?;

        Ok(AttendanceRecord {
            id: result.last_insert_id(),
            employee_id: rec.employee_id,
            date: rec.date,
            check_in: rec.check_in,
            check_out: rec.check_out,
            status: rec.status,
            work_hours: rec.work_hours,
            overtime_minutes: rec.overtime_minutes,
            late_minutes: rec.late_minutes,
            is_locked: false,
            source: rec.source,
            edited_by: rec.edited_by,
            edit_reason: rec.edit_reason,
        })
    }

    async fn update_attendance(&self, rec: &AttendanceRecord) -> Result<()> {
        let result = sqlx::query(
            "UPDATE attendance SET check_in = ?, check_out = ?, status = ?, work_hours = ?, \
             overtime_minutes = ?, late_minutes = ?, is_locked = ?, source = ?, \
             edited_by = ?, edit_reason = ? WHERE id = ?",
        )
        .bind(rec.check_in)
        .bind(rec.check_out)
        .bind(rec.status)
        .bind(rec.work_hours)
        .bind(rec.overtime_minutes)
        .bind(rec.late_minutes)
        .bind(rec.is_locked)
        .bind(rec.source)
        .bind(rec.edited_by)
        .bind(&rec.edit_reason)
        .bind(rec.id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(HrError::not_found("Attendance record not found"));
        }
        Ok(())
    }

    async fn attendance_for_month(
        &self,
        employee_id: u64,
        month: u32,
        year: i32,
    ) -> Result<Vec<AttendanceRecord>> {
        // Range scan so the (employee_id, date) index is usable.
        let (first, last) = calendar::month_bounds(month, year);
        let records = sqlx::query_as::<_, AttendanceRecord>(&format!(
            "SELECT {} FROM attendance \
             WHERE employee_id = ? AND date BETWEEN ? AND ? \
             ORDER BY date",
            ATTENDANCE_COLS
        ))
        .bind(employee_id)
        .bind(first)
        .bind(last)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    async fn open_present_before(&self, date: NaiveDate) -> Result<Vec<AttendanceRecord>> {
        let records = sqlx::query_as::<_, AttendanceRecord>(&format!(
            "SELECT {} FROM attendance \
             WHERE status = ? AND check_in IS NOT NULL AND check_out IS NULL AND date <= ? \
             ORDER BY date, id",
            ATTENDANCE_COLS
        ))
        .bind(AttendanceStatus::Present)
        .bind(date)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    async fn lock_month(&self, month: u32, year: i32) -> Result<u64> {
        let (first, last) = calendar::month_bounds(month, year);
        let result = sqlx::query(
            "UPDATE attendance SET is_locked = 1 \
             WHERE date BETWEEN ? AND ? AND is_locked = 0",
        )
        .bind(first)
        .bind(last)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn insert_leave(&self, req: NewLeaveRequest) -> Result<LeaveRequest> {
        let created_at = Utc::now();
        let result = sqlx::query(
            "INSERT INTO leave_requests \
             (employee_id, leave_type, start_date, end_date, days, reason, status, \
              manager_id, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(req.employee_id)
        .bind(&req.leave_type)
        .bind(req.start_date)
        .bind(req.end_date)
        .bind(req.days)
        .bind(&req.reason)
        .bind(req.status)
        .bind(req.manager_id)
        .bind(created_at)
        .execute(&self.pool)
        .await?;

        Ok(LeaveRequest {
            id: result.last_insert_id(),
            employee_id: req.employee_id,
            leave_type: req.leave_type,
            start_date: req.start_date,
            end_date: req.end_date,
            days: req.days,
            reason: req.reason,
            status: req.status,
            manager_id: req.manager_id,
            approver_id: None,
            remarks: None,
            created_at,
        })
    }

    async fn leave_by_id(&self, id: u64) -> Result<Option<LeaveRequest>> {
        let req = sqlx::query_as::<_, LeaveRequest>(&format!(
            "SELECT {} FROM leave_requests WHERE id = ?",
            LEAVE_COLS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(req)
    }

    async fn update_leave(&self, req: &LeaveRequest) -> Result<()> {
        let result = sqlx::query(
            "UPDATE leave_requests SET leave_type = ?, start_date = ?, end_date = ?, \
             days = ?, reason = ?, status = ?, manager_id = ?, approver_id = ?, remarks = ? \
             WHERE id = ?",
        )
        .bind(&req.leave_type)
        .bind(req.start_date)
        .bind(req.end_date)
        .bind(req.days)
        .bind(&req.reason)
        .bind(req.status)
        .bind(req.manager_id)
        .bind(req.approver_id)
        .bind(&req.remarks)
        .bind(req.id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(HrError::not_found("Leave request not found"));
        }
        Ok(())
    }

    async fn delete_leave(&self, id: u64) -> Result<()> {
        let result = sqlx::query("DELETE FROM leave_requests WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(HrError::not_found("Leave request not found"));
        }
        Ok(())
    }

    async fn list_leaves(&self, filter: &LeaveListFilter) -> Result<(Vec<LeaveRequest>, i64)> {
        // Typed values for dynamic WHERE binding
        enum FilterValue {
            U64(u64),
            Status(LeaveStatus),
        }

        let per_page = filter.per_page.clamp(1, 100);
        let page = filter.page.max(1);
        let offset = (page - 1) * per_page;

        let mut where_sql = String::from(" WHERE 1=1");
        let mut args: Vec<FilterValue> = Vec::new();

        if let Some(emp_id) = filter.employee_id {
            where_sql.push_str(" AND employee_id = ?");
            args.push(FilterValue::U64(emp_id));
        }

        if let Some(status) = filter.status {
            where_sql.push_str(" AND status = ?");
            args.push(FilterValue::Status(status));
        }

        let count_sql = format!("SELECT COUNT(*) FROM leave_requests{}", where_sql);

        let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
        for arg in &args {
            count_q = match arg {
                FilterValue::U64(v) => count_q.bind(*v),
                FilterValue::Status(s) => count_q.bind(*s),
            };
        }

        let total = count_q.fetch_one(&self.pool).await?;

        let data_sql = format!(
            "SELECT {} FROM leave_requests{} ORDER BY created_at DESC LIMIT ? OFFSET ?",
            LEAVE_COLS, where_sql
        );

        let mut data_q = sqlx::query_as::<_, LeaveRequest>(&data_sql);
        for arg in args {
            data_q = match arg {
                FilterValue::U64(v) => data_q.bind(v),
                FilterValue::Status(s) => data_q.bind(s),
            };
        }

        let rows = data_q
            .bind(per_page)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        Ok((rows, total))
    }

    async fn approved_leave_covering(
        &self,
        employee_id: u64,
        date: NaiveDate,
    ) -> Result<Option<LeaveRequest>> {
        let req = sqlx::query_as::<_, LeaveRequest>(&format!(
            "SELECT {} FROM leave_requests \
             WHERE employee_id = ? AND status = ? AND start_date <= ? AND end_date >= ? \
             LIMIT 1",
            LEAVE_COLS
        ))
        .bind(employee_id)
        .bind(LeaveStatus::Approved)
        .bind(date)
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;
        Ok(req)
    }

    async fn leave_balance(
        &self,
        employee_id: u64,
        leave_type: &str,
        year: i32,
    ) -> Result<Option<LeaveBalance>> {
        let balance = sqlx::query_as::<_, LeaveBalance>(
            "SELECT employee_id, leave_type, year, total, used, remaining \
             FROM leave_balances \
             WHERE employee_id = ? AND leave_type = ? AND year = ?",
        )
        .bind(employee_id)
        .bind(leave_type)
        .bind(year)
        .fetch_optional(&self.pool)
        .await?;
        Ok(balance)
    }

    async fn save_leave_balance(&self, balance: &LeaveBalance) -> Result<()> {
        sqlx::query(
            "INSERT INTO leave_balances (employee_id, leave_type, year, total, used, remaining) \
             VALUES (?, ?, ?, ?, ?, ?) \
             ON DUPLICATE KEY UPDATE total = VALUES(total), used = VALUES(used), \
             remaining = VALUES(remaining)",
        )
        .bind(balance.employee_id)
        .bind(&balance.leave_type)
        .bind(balance.year)
        .bind(balance.total)
        .bind(balance.used)
        .bind(balance.remaining)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn balances_for_type(&self, leave_type: &str, year: i32) -> Result<Vec<LeaveBalance>> {
        let balances = sqlx::query_as::<_, LeaveBalance>(
            "SELECT employee_id, leave_type, year, total, used, remaining \
             FROM leave_balances WHERE leave_type = ? AND year = ? ORDER BY employee_id",
        )
        .bind(leave_type)
        .bind(year)
        .fetch_all(&self.pool)
        .await?;
        Ok(balances)
    }

    async fn insert_regularization(
        &self,
        req: NewRegularization,
    ) -> Result<RegularizationRequest> {
        let created_at = Utc::now();
        let result = sqlx::query(
            "INSERT INTO regularization_requests \
             (employee_id, date, kind, requested_check_in, requested_check_out, \
              requested_status, reason, status, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(req.employee_id)
        .bind(req.date)
        .bind(req.kind)
        .bind(req.requested_check_in)
        .bind(req.requested_check_out)
        .bind(req.requested_status)
        .bind(&req.reason)
        .bind(RegularizationStatus::Pending)
        .bind(created_at)
        .execute(&self.pool)
        .await?;

        Ok(RegularizationRequest {
            id: result.last_insert_id(),
            employee_id: req.employee_id,
            date: req.date,
            kind: req.kind,
            requested_check_in: req.requested_check_in,
            requested_check_out: req.requested_check_out,
            requested_status: req.requested_status,
            reason: req.reason,
            status: RegularizationStatus::Pending,
            reviewed_by: None,
            review_remarks: None,
            created_at,
        })
    }

    async fn regularization_by_id(&self, id: u64) -> Result<Option<RegularizationRequest>> {
        let req = sqlx::query_as::<_, RegularizationRequest>(
            "SELECT id, employee_id, date, kind, requested_check_in, requested_check_out, \
             requested_status, reason, status, reviewed_by, review_remarks, created_at \
             FROM regularization_requests WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(req)
    }

    async fn update_regularization(&self, req: &RegularizationRequest) -> Result<()> {
        let result = sqlx::query(
            "UPDATE regularization_requests SET status = ?, reviewed_by = ?, review_remarks = ? \
             WHERE id = ?",
        )
        .bind(req.status)
        .bind(req.reviewed_by)
        .bind(&req.review_remarks)
        .bind(req.id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(HrError::not_found("Regularization request not found"));
        }
        Ok(())
    }

    async fn active_batch(&self, month: u32, year: i32) -> Result<Option<PayrollBatch>> {
        let batch = sqlx::query_as::<_, PayrollBatch>(
            "SELECT id, month, year, status, employee_count, total_amount, processed_by, \
             created_at, paid_at \
             FROM payroll_batches \
             WHERE month = ? AND year = ? AND status != ? \
             LIMIT 1",
        )
        .bind(month)
        .bind(year)
        .bind(BatchStatus::Cancelled)
        .fetch_optional(&self.pool)
        .await?;
        Ok(batch)
    }

    async fn batch_by_id(&self, id: u64) -> Result<Option<PayrollBatch>> {
        let batch = sqlx::query_as::<_, PayrollBatch>(
            "SELECT id, month, year, status, employee_count, total_amount, processed_by, \
             created_at, paid_at \
             FROM payroll_batches WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(batch)
    }

    async fn insert_batch(
        &self,
        month: u32,
        year: i32,
        processed_by: Option<u64>,
    ) -> Result<PayrollBatch> {
        let created_at = Utc::now();
        let result = sqlx::query(
            "INSERT INTO payroll_batches \
             (month, year, status, employee_count, total_amount, processed_by, created_at) \
             VALUES (?, ?, ?, 0, 0, ?, ?)",
        )
        .bind(month)
        .bind(year)
        .bind(BatchStatus::Draft)
        .bind(processed_by)
        .bind(created_at)
        .execute(&self.pool)
        .await?;

        Ok(PayrollBatch {
            id: result.last_insert_id(),
            month,
            year,
            status: BatchStatus::Draft,
            employee_count: 0,
            total_amount: Decimal::ZERO,
            processed_by,
            created_at,
            paid_at: None,
        })
    }

    async fn update_batch(&self, batch: &PayrollBatch) -> Result<()> {
        let result = sqlx::query(
            "UPDATE payroll_batches SET status = ?, employee_count = ?, total_amount = ?, \
             processed_by = ?, paid_at = ? WHERE id = ?",
        )
        .bind(batch.status)
        .bind(batch.employee_count)
        .bind(batch.total_amount)
        .bind(batch.processed_by)
        .bind(batch.paid_at)
        .bind(batch.id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(HrError::not_found("Payroll batch not found"));
        }
        Ok(())
    }

    async fn insert_slip(&self, slip: NewSalarySlip) -> Result<SalarySlip> {
        let result = sqlx::query(
            "INSERT INTO salary_slips \
             (batch_id, employee_id, month, year, basic, allowances, reimbursements, \
              loss_of_pay, pf, tax, other_deductions, gross, net, status, \
              present_days, half_days, absent_days) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(slip.batch_id)
        .bind(slip.employee_id)
        .bind(slip.month)
        .bind(slip.year)
        .bind(slip.basic)
        .bind(slip.allowances)
        .bind(slip.reimbursements)
        .bind(slip.loss_of_pay)
        .bind(slip.pf)
        .bind(slip.tax)
        .bind(slip.other_deductions)
        .bind(slip.gross)
        .bind(slip.net)
        .bind(slip.status)
        .bind(slip.present_days)
        .bind(slip.half_days)
        .bind(slip.absent_days)
        .execute(&self.pool)
        .await?;

        Ok(SalarySlip {
            id: result.last_insert_id(),
            batch_id: slip.batch_id,
            employee_id: slip.employee_id,
            month: slip.month,
            year: slip.year,
            basic: slip.basic,
            allowances: slip.allowances,
            reimbursements: slip.reimbursements,
            loss_of_pay: slip.loss_of_pay,
            pf: slip.pf,
            tax: slip.tax,
            other_deductions: slip.other_deductions,
            gross: slip.gross,
            net: slip.net,
            status: slip.status,
            present_days: slip.present_days,
            half_days: slip.half_days,
            absent_days: slip.absent_days,
        })
    }

    async fn slip_by_id(&self, id: u64) -> Result<Option<SalarySlip>> {
        let slip = sqlx::query_as::<_, SalarySlip>(&format!(
            "SELECT {} FROM salary_slips WHERE id = ?",
            SLIP_COLS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(slip)
    }

    async fn slips_for_batch(&self, batch_id: u64) -> Result<Vec<SalarySlip>> {
        let slips = sqlx::query_as::<_, SalarySlip>(&format!(
            "SELECT {} FROM salary_slips WHERE batch_id = ? ORDER BY employee_id",
            SLIP_COLS
        ))
        .bind(batch_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(slips)
    }

    async fn slip_for(
        &self,
        employee_id: u64,
        month: u32,
        year: i32,
    ) -> Result<Option<SalarySlip>> {
        let slip = sqlx::query_as::<_, SalarySlip>(&format!(
            "SELECT {} FROM salary_slips WHERE employee_id = ? AND month = ? AND year = ?",
            SLIP_COLS
        ))
        .bind(employee_id)
        .bind(month)
        .bind(year)
        .fetch_optional(&self.pool)
        .await?;
        Ok(slip)
    }

    async fn delete_slips_for(&self, batch_id: u64, employee_ids: &[u64]) -> Result<u64> {
        if employee_ids.is_empty() {
            return Ok(0);
        }
        let placeholders = vec!["?"; employee_ids.len()].join(", ");
        let sql = format!(
            "DELETE FROM salary_slips WHERE batch_id = ? AND employee_id IN ({})",
            placeholders
        );
        let mut q = sqlx::query(&sql).bind(batch_id);
        for id in employee_ids {
            q = q.bind(*id);
        }
        let result = q.execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn delete_all_slips(&self, batch_id: u64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM salary_slips WHERE batch_id = ?")
            .bind(batch_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn update_slip(&self, slip: &SalarySlip) -> Result<()> {
        let result = sqlx::query(
            "UPDATE salary_slips SET basic = ?, allowances = ?, reimbursements = ?, \
             loss_of_pay = ?, pf = ?, tax = ?, other_deductions = ?, gross = ?, net = ?, \
             status = ? WHERE id = ?",
        )
        .bind(slip.basic)
        .bind(slip.allowances)
        .bind(slip.reimbursements)
        .bind(slip.loss_of_pay)
        .bind(slip.pf)
        .bind(slip.tax)
        .bind(slip.other_deductions)
        .bind(slip.gross)
        .bind(slip.net)
        .bind(slip.status)
        .bind(slip.id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(HrError::not_found("Salary slip not found"));
        }
        Ok(())
    }

    async fn mark_slips_paid(&self, batch_id: u64) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE salary_slips SET status = ? WHERE batch_id = ? AND status != ?",
        )
        .bind(SlipStatus::Paid)
        .bind(batch_id)
        .bind(SlipStatus::Paid)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn load_settings(&self) -> Result<Option<serde_json::Value>> {
        let raw: Option<(String,)> =
            sqlx::query_as("SELECT doc FROM app_settings WHERE id = 1")
                .fetch_optional(&self.pool)
                .await?;
        match raw {
            Some((doc,)) => {
                let value = serde_json::from_str(&doc)
                    .map_err(|e| HrError::Internal(format!("settings blob unreadable: {}", e)))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    async fn save_settings(&self, doc: &serde_json::Value) -> Result<()> {
        let raw = doc.to_string();
        sqlx::query(
            "INSERT INTO app_settings (id, doc) VALUES (1, ?) \
             ON DUPLICATE KEY UPDATE doc = VALUES(doc)",
        )
        .bind(raw)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
