//! In-memory implementation of the store traits.
//!
//! Keeps everything in plain maps behind one lock. Suitable for tests and
//! single-process use; data is lost on restart. Enforces the same
//! natural-key rejections as the MySQL store so callers see identical
//! conflict behavior.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use chrono::{Datelike, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;

use crate::error::{HrError, Result};
use crate::model::attendance::{AttendanceRecord, NewAttendance};
use crate::model::employee::EmployeeLite;
use crate::model::leave::{LeaveBalance, LeaveRequest, LeaveStatus, NewLeaveRequest};
use crate::model::payroll::{BatchStatus, NewSalarySlip, PayrollBatch, SalarySlip, SlipStatus};
use crate::model::punch::{IncomingPunch, PunchStatus, RawPunch};
use crate::model::regularization::{
    NewRegularization, RegularizationRequest, RegularizationStatus,
};

use super::{
    EmployeeDirectory, HolidayCalendar, HrStore, LeaveListFilter, ReimbursementSource,
};

#[derive(Default)]
struct Inner {
    next_id: u64,
    punches: HashMap<u64, RawPunch>,
    attendance: HashMap<u64, AttendanceRecord>,
    leaves: HashMap<u64, LeaveRequest>,
    balances: HashMap<(u64, String, i32), LeaveBalance>,
    regularizations: HashMap<u64, RegularizationRequest>,
    batches: HashMap<u64, PayrollBatch>,
    slips: HashMap<u64, SalarySlip>,
    employees: HashMap<u64, EmployeeLite>,
    employee_codes: HashMap<String, u64>,
    holidays: HashSet<NaiveDate>,
    reimbursements: HashMap<(u64, u32, i32), (Decimal, bool)>,
    settings: Option<serde_json::Value>,
}

impl Inner {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Clone, Default)]
pub struct MemStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    // Seeding for collaborator-owned data (directory, holidays,
    // reimbursements). In production these live behind other services.

    pub fn seed_employee(&self, employee: EmployeeLite, code: &str) {
        let mut inner = self.inner.write().expect("mem store poisoned");
        inner.employee_codes.insert(code.to_string(), employee.id);
        inner.employees.insert(employee.id, employee);
    }

    pub fn seed_holiday(&self, date: NaiveDate) {
        let mut inner = self.inner.write().expect("mem store poisoned");
        inner.holidays.insert(date);
    }

    pub fn seed_reimbursement(&self, employee_id: u64, month: u32, year: i32, amount: Decimal) {
        let mut inner = self.inner.write().expect("mem store poisoned");
        inner
            .reimbursements
            .insert((employee_id, month, year), (amount, false));
    }
}

impl EmployeeDirectory for MemStore {
    async fn employee_by_id(&self, id: u64) -> Result<Option<EmployeeLite>> {
        let inner = self.inner.read().expect("mem store poisoned");
        Ok(inner.employees.get(&id).cloned())
    }

    async fn employee_by_code(&self, code: &str) -> Result<Option<EmployeeLite>> {
        let inner = self.inner.read().expect("mem store poisoned");
        Ok(inner
            .employee_codes
            .get(code)
            .and_then(|id| inner.employees.get(id))
            .cloned())
    }

    async fn active_employees(&self) -> Result<Vec<EmployeeLite>> {
        let inner = self.inner.read().expect("mem store poisoned");
        let mut employees: Vec<_> = inner
            .employees
            .values()
            .filter(|e| e.active)
            .cloned()
            .collect();
        employees.sort_by_key(|e| e.id);
        Ok(employees)
    }
}

impl HolidayCalendar for MemStore {
    async fn is_holiday(&self, date: NaiveDate) -> Result<bool> {
        let inner = self.inner.read().expect("mem store poisoned");
        Ok(inner.holidays.contains(&date))
    }
}

impl ReimbursementSource for MemStore {
    async fn approved_unpaid_total(
        &self,
        employee_id: u64,
        month: u32,
        year: i32,
    ) -> Result<Decimal> {
        let inner = self.inner.read().expect("mem store poisoned");
        Ok(inner
            .reimbursements
            .get(&(employee_id, month, year))
            .filter(|(_, paid)| !paid)
            .map(|(amount, _)| *amount)
            .unwrap_or(Decimal::ZERO))
    }

    async fn mark_reimbursed(&self, employee_id: u64, month: u32, year: i32) -> Result<u64> {
        let mut inner = self.inner.write().expect("mem store poisoned");
        match inner.reimbursements.get_mut(&(employee_id, month, year)) {
            Some(entry) if !entry.1 => {
                entry.1 = true;
                Ok(1)
            }
            _ => Ok(0),
        }
    }
}

impl HrStore for MemStore {
    async fn punch_exists(
        &self,
        device_person_id: &str,
        punched_at: NaiveDateTime,
        origin: &str,
    ) -> Result<bool> {
        let inner = self.inner.read().expect("mem store poisoned");
        Ok(inner.punches.values().any(|p| {
            p.device_person_id == device_person_id
                && p.punched_at == punched_at
                && p.origin == origin
        }))
    }

    async fn insert_punch(&self, punch: IncomingPunch) -> Result<RawPunch> {
        let mut inner = self.inner.write().expect("mem store poisoned");
        let duplicate = inner.punches.values().any(|p| {
            p.device_person_id == punch.device_person_id
                && p.punched_at == punch.punched_at
                && p.origin == punch.origin
        });
        if duplicate {
            return Err(HrError::conflict("Duplicate punch"));
        }
        let id = inner.next_id();
        let row = RawPunch {
            id,
            device_person_id: punch.device_person_id,
            punched_at: punch.punched_at,
            direction: punch.direction,
            source: punch.source,
            origin: punch.origin,
            status: PunchStatus::Pending,
            received_at: Utc::now(),
        };
        inner.punches.insert(id, row.clone());
        Ok(row)
    }

    async fn pending_punches_on(&self, date: NaiveDate) -> Result<Vec<RawPunch>> {
        let inner = self.inner.read().expect("mem store poisoned");
        let mut punches: Vec<_> = inner
            .punches
            .values()
            .filter(|p| p.status == PunchStatus::Pending && p.punched_at.date() == date)
            .cloned()
            .collect();
        punches.sort_by_key(|p| p.punched_at);
        Ok(punches)
    }

    async fn set_punch_status(&self, id: u64, status: PunchStatus) -> Result<()> {
        let mut inner = self.inner.write().expect("mem store poisoned");
        let punch = inner
            .punches
            .get_mut(&id)
            .ok_or_else(|| HrError::not_found("Punch not found"))?;
        punch.status = status;
        Ok(())
    }

    async fn attendance_by_id(&self, id: u64) -> Result<Option<AttendanceRecord>> {
        let inner = self.inner.read().expect("mem store poisoned");
        Ok(inner.attendance.get(&id).cloned())
    }

    async fn attendance_on(
        &self,
        employee_id: u64,
        date: NaiveDate,
    ) -> Result<Option<AttendanceRecord>> {
        let inner = self.inner.read().expect("mem store poisoned");
        Ok(inner
            .attendance
            .values()
            .find(|r| r.employee_id == employee_id && r.date == date)
            .cloned())
    }

    async fn insert_attendance(&self, rec: NewAttendance) -> Result<AttendanceRecord> {
        let mut inner = self.inner.write().expect("mem store poisoned");
        let duplicate = inner
            .attendance
            .values()
            .any(|r| r.employee_id == rec.employee_id && r.date == rec.date);
        if duplicate {
            return Err(HrError::conflict("Attendance already recorded for this day"));
        }
        let id = inner.next_id();
        let row = AttendanceRecord {
            id,
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
        };
        inner.attendance.insert(id, row.clone());
        Ok(row)
    }

    async fn update_attendance(&self, rec: &AttendanceRecord) -> Result<()> {
        let mut inner = self.inner.write().expect("mem store poisoned");
        if !inner.attendance.contains_key(&rec.id) {
            return Err(HrError::not_found("Attendance record not found"));
        }
        inner.attendance.insert(rec.id, rec.clone());
        Ok(())
    }

    async fn attendance_for_month(
        &self,
        employee_id: u64,
        month: u32,
        year: i32,
    ) -> Result<Vec<AttendanceRecord>> {
        let inner = self.inner.read().expect("mem store poisoned");
        let mut records: Vec<_> = inner
            .attendance
            .values()
            .filter(|r| {
                r.employee_id == employee_id
                    && r.date.month() == month
                    && r.date.year() == year
            })
            .cloned()
            .collect();
        records.sort_by_key(|r| r.date);
        Ok(records)
    }

    async fn open_present_before(&self, date: NaiveDate) -> Result<Vec<AttendanceRecord>> {
        let inner = self.inner.read().expect("mem store poisoned");
        let mut records: Vec<_> = inner
            .attendance
            .values()
            .filter(|r| {
                r.status == crate::model::attendance::AttendanceStatus::Present
                    && r.check_in.is_some()
                    && r.check_out.is_none()
                    && r.date <= date
            })
            .cloned()
            .collect();
        records.sort_by_key(|r| (r.date, r.id));
        Ok(records)
    }

    async fn lock_month(&self, month: u32, year: i32) -> Result<u64> {
        let mut inner = self.inner.write().expect("mem store poisoned");
        let mut locked = 0;
        for rec in inner.attendance.values_mut() {
            if rec.date.month() == month && rec.date.year() == year && !rec.is_locked {
                rec.is_locked = true;
                locked += 1;
            }
        }
        Ok(locked)
    }

    async fn insert_leave(&self, req: NewLeaveRequest) -> Result<LeaveRequest> {
        let mut inner = self.inner.write().expect("mem store poisoned");
        let id = inner.next_id();
        let row = LeaveRequest {
            id,
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
            created_at: Utc::now(),
        };
        inner.leaves.insert(id, row.clone());
        Ok(row)
    }

    async fn leave_by_id(&self, id: u64) -> Result<Option<LeaveRequest>> {
        let inner = self.inner.read().expect("mem store poisoned");
        Ok(inner.leaves.get(&id).cloned())
    }

    async fn update_leave(&self, req: &LeaveRequest) -> Result<()> {
        let mut inner = self.inner.write().expect("mem store poisoned");
        if !inner.leaves.contains_key(&req.id) {
            return Err(HrError::not_found("Leave request not found"));
        }
        inner.leaves.insert(req.id, req.clone());
        Ok(())
    }

    async fn delete_leave(&self, id: u64) -> Result<()> {
        let mut inner = self.inner.write().expect("mem store poisoned");
        inner
            .leaves
            .remove(&id)
            .ok_or_else(|| HrError::not_found("Leave request not found"))?;
        Ok(())
    }

    async fn list_leaves(&self, filter: &LeaveListFilter) -> Result<(Vec<LeaveRequest>, i64)> {
        let inner = self.inner.read().expect("mem store poisoned");
        let mut rows: Vec<_> = inner
            .leaves
            .values()
            .filter(|l| filter.employee_id.map_or(true, |e| l.employee_id == e))
            .filter(|l| filter.status.map_or(true, |s| l.status == s))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = rows.len() as i64;
        let per_page = filter.per_page.max(1) as usize;
        let page = filter.page.max(1) as usize;
        let rows = rows
            .into_iter()
            .skip((page - 1) * per_page)
            .take(per_page)
            .collect();
        Ok((rows, total))
    }

    async fn approved_leave_covering(
        &self,
        employee_id: u64,
        date: NaiveDate,
    ) -> Result<Option<LeaveRequest>> {
        let inner = self.inner.read().expect("mem store poisoned");
        Ok(inner
            .leaves
            .values()
            .find(|l| {
                l.employee_id == employee_id
                    && l.status == LeaveStatus::Approved
                    && l.start_date <= date
                    && date <= l.end_date
            })
            .cloned())
    }

    async fn leave_balance(
        &self,
        employee_id: u64,
        leave_type: &str,
        year: i32,
    ) -> Result<Option<LeaveBalance>> {
        let inner = self.inner.read().expect("mem store poisoned");
        Ok(inner
            .balances
            .get(&(employee_id, leave_type.to_string(), year))
            .cloned())
    }

    async fn save_leave_balance(&self, balance: &LeaveBalance) -> Result<()> {
        let mut inner = self.inner.write().expect("mem store poisoned");
        inner.balances.insert(
            (balance.employee_id, balance.leave_type.clone(), balance.year),
            balance.clone(),
        );
        Ok(())
    }

    async fn balances_for_type(&self, leave_type: &str, year: i32) -> Result<Vec<LeaveBalance>> {
        let inner = self.inner.read().expect("mem store poisoned");
        let mut rows: Vec<_> = inner
            .balances
            .values()
            .filter(|b| b.leave_type == leave_type && b.year == year)
            .cloned()
            .collect();
        rows.sort_by_key(|b| b.employee_id);
        Ok(rows)
    }

    async fn insert_regularization(
        &self,
        req: NewRegularization,
    ) -> Result<RegularizationRequest> {
        let mut inner = self.inner.write().expect("mem store poisoned");
        let id = inner.next_id();
        let row = RegularizationRequest {
            id,
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
            created_at: Utc::now(),
        };
        inner.regularizations.insert(id, row.clone());
        Ok(row)
    }

    async fn regularization_by_id(&self, id: u64) -> Result<Option<RegularizationRequest>> {
        let inner = self.inner.read().expect("mem store poisoned");
        Ok(inner.regularizations.get(&id).cloned())
    }

    async fn update_regularization(&self, req: &RegularizationRequest) -> Result<()> {
        let mut inner = self.inner.write().expect("mem store poisoned");
        if !inner.regularizations.contains_key(&req.id) {
            return Err(HrError::not_found("Regularization request not found"));
        }
        inner.regularizations.insert(req.id, req.clone());
        Ok(())
    }

    async fn active_batch(&self, month: u32, year: i32) -> Result<Option<PayrollBatch>> {
        let inner = self.inner.read().expect("mem store poisoned");
        Ok(inner
            .batches
            .values()
            .find(|b| b.month == month && b.year == year && b.status != BatchStatus::Cancelled)
            .cloned())
    }

    async fn batch_by_id(&self, id: u64) -> Result<Option<PayrollBatch>> {
        let inner = self.inner.read().expect("mem store poisoned");
        Ok(inner.batches.get(&id).cloned())
    }

    async fn insert_batch(
        &self,
        month: u32,
        year: i32,
        processed_by: Option<u64>,
    ) -> Result<PayrollBatch> {
        let mut inner = self.inner.write().expect("mem store poisoned");
        let duplicate = inner
            .batches
            .values()
            .any(|b| b.month == month && b.year == year && b.status != BatchStatus::Cancelled);
        if duplicate {
            return Err(HrError::conflict("A payroll batch already exists for this month"));
        }
        let id = inner.next_id();
        let batch = PayrollBatch {
            id,
            month,
            year,
            status: BatchStatus::Draft,
            employee_count: 0,
            total_amount: Decimal::ZERO,
            processed_by,
            created_at: Utc::now(),
            paid_at: None,
        };
        inner.batches.insert(id, batch.clone());
        Ok(batch)
    }

    async fn update_batch(&self, batch: &PayrollBatch) -> Result<()> {
        let mut inner = self.inner.write().expect("mem store poisoned");
        if !inner.batches.contains_key(&batch.id) {
            return Err(HrError::not_found("Payroll batch not found"));
        }
        inner.batches.insert(batch.id, batch.clone());
        Ok(())
    }

    async fn insert_slip(&self, slip: NewSalarySlip) -> Result<SalarySlip> {
        let mut inner = self.inner.write().expect("mem store poisoned");
        let duplicate = inner.slips.values().any(|s| {
            s.employee_id == slip.employee_id && s.month == slip.month && s.year == slip.year
        });
        if duplicate {
            return Err(HrError::conflict(
                "Salary slip already exists for this employee and month",
            ));
        }
        let id = inner.next_id();
        let row = SalarySlip {
            id,
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
        };
        inner.slips.insert(id, row.clone());
        Ok(row)
    }

    async fn slip_by_id(&self, id: u64) -> Result<Option<SalarySlip>> {
        let inner = self.inner.read().expect("mem store poisoned");
        Ok(inner.slips.get(&id).cloned())
    }

    async fn slips_for_batch(&self, batch_id: u64) -> Result<Vec<SalarySlip>> {
        let inner = self.inner.read().expect("mem store poisoned");
        let mut rows: Vec<_> = inner
            .slips
            .values()
            .filter(|s| s.batch_id == batch_id)
            .cloned()
            .collect();
        rows.sort_by_key(|s| s.employee_id);
        Ok(rows)
    }

    async fn slip_for(
        &self,
        employee_id: u64,
        month: u32,
        year: i32,
    ) -> Result<Option<SalarySlip>> {
        let inner = self.inner.read().expect("mem store poisoned");
        Ok(inner
            .slips
            .values()
            .find(|s| s.employee_id == employee_id && s.month == month && s.year == year)
            .cloned())
    }

    async fn delete_slips_for(&self, batch_id: u64, employee_ids: &[u64]) -> Result<u64> {
        let mut inner = self.inner.write().expect("mem store poisoned");
        let doomed: Vec<u64> = inner
            .slips
            .values()
            .filter(|s| s.batch_id == batch_id && employee_ids.contains(&s.employee_id))
            .map(|s| s.id)
            .collect();
        for id in &doomed {
            inner.slips.remove(id);
        }
        Ok(doomed.len() as u64)
    }

    async fn delete_all_slips(&self, batch_id: u64) -> Result<u64> {
        let mut inner = self.inner.write().expect("mem store poisoned");
        let doomed: Vec<u64> = inner
            .slips
            .values()
            .filter(|s| s.batch_id == batch_id)
            .map(|s| s.id)
            .collect();
        for id in &doomed {
            inner.slips.remove(id);
        }
        Ok(doomed.len() as u64)
    }

    async fn update_slip(&self, slip: &SalarySlip) -> Result<()> {
        let mut inner = self.inner.write().expect("mem store poisoned");
        if !inner.slips.contains_key(&slip.id) {
            return Err(HrError::not_found("Salary slip not found"));
        }
        inner.slips.insert(slip.id, slip.clone());
        Ok(())
    }

    async fn mark_slips_paid(&self, batch_id: u64) -> Result<u64> {
        let mut inner = self.inner.write().expect("mem store poisoned");
        let mut updated = 0;
        for slip in inner.slips.values_mut() {
            if slip.batch_id == batch_id && slip.status != SlipStatus::Paid {
                slip.status = SlipStatus::Paid;
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn load_settings(&self) -> Result<Option<serde_json::Value>> {
        let inner = self.inner.read().expect("mem store poisoned");
        Ok(inner.settings.clone())
    }

    async fn save_settings(&self, doc: &serde_json::Value) -> Result<()> {
        let mut inner = self.inner.write().expect("mem store poisoned");
        inner.settings = Some(doc.clone());
        Ok(())
    }
}
