//! Payroll batch processor: one slip per employee per month, deterministic
//! salary math fixed at two decimal places.
//!
//! Canonical formula (the salary-split flow): basic is a configured share of
//! monthly salary, PF applies to basic, tax comes from the configured slabs,
//! and loss of pay charges absent days plus half of each half day at the
//! daily rate. The batch total is always the exact sum of slip nets.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::audit::{self, AuditEvent};
use crate::calendar;
use crate::error::{HrError, Result};
use crate::model::attendance::MonthSummary;
use crate::model::employee::EmployeeLite;
use crate::model::payroll::{BatchStatus, NewSalarySlip, PayrollBatch, SalarySlip, SlipStatus};
use crate::policy::{Action, Actor, Relation, authorize};
use crate::service::attendance::validate_month;
use crate::settings::{DeductionRates, SettingsDoc};
use crate::store::HrStore;
use crate::utils::money::round2;

/// Pay figures for one employee-month, before they become a slip row.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SlipFigures {
    #[schema(example = 1001)]
    pub employee_id: u64,

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

    pub present_days: u32,
    pub half_days: u32,
    pub absent_days: u32,
}

pub fn compute_figures(
    employee: &EmployeeLite,
    summary: &MonthSummary,
    days_in_month: u32,
    reimbursements: Decimal,
    rates: &DeductionRates,
) -> SlipFigures {
    let salary = round2(employee.monthly_salary);
    let basic = round2(salary * rates.basic_ratio);
    let allowances = round2(salary - basic);

    // Holidays, weekends and approved leave are non-absence days; only
    // absent and half days cost pay.
    let chargeable =
        Decimal::from(summary.absent_days) + Decimal::new(5, 1) * Decimal::from(summary.half_days);
    let loss_of_pay = round2(salary * chargeable / Decimal::from(days_in_month));

    let pf = round2(basic * rates.pf_rate);
    let tax = rates.tax_for(salary);
    let other_deductions = round2(rates.other);

    let gross = round2(salary + reimbursements);
    let net = round2(gross - loss_of_pay - pf - tax - other_deductions);

    SlipFigures {
        employee_id: employee.id,
        basic,
        allowances,
        reimbursements,
        loss_of_pay,
        pf,
        tax,
        other_deductions,
        gross,
        net,
        present_days: summary.present_days,
        half_days: summary.half_days,
        absent_days: summary.absent_days,
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PayrollRun {
    pub batch: PayrollBatch,
    pub slips: Vec<SalarySlip>,
    /// Employees the run set out to pay vs slips actually written; failures
    /// are listed so partial success is visible, never silent.
    pub intended: u64,
    pub processed: u64,
    pub failures: Vec<SlipFailure>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SlipFailure {
    pub employee_id: u64,
    pub reason: String,
}

/// Generate a payroll batch.
///
/// Full-population flow (`employee_ids` absent): conflicts with any existing
/// non-cancelled batch for the month. Selective flow: reuses the month's
/// batch, replaces the listed employees' slips, and is idempotent by design.
pub async fn generate_payroll<S: HrStore>(
    store: &S,
    actor: &Actor,
    month: u32,
    year: i32,
    employee_ids: Option<Vec<u64>>,
    doc: &SettingsDoc,
) -> Result<PayrollRun> {
    authorize(&doc.work.policy_ctx(), Action::GeneratePayroll, actor, Relation::Other)?;
    validate_month(month)?;

    let mut failures = Vec::new();

    let (batch, targets) = match employee_ids {
        None => {
            if store.active_batch(month, year).await?.is_some() {
                return Err(HrError::conflict(
                    "A payroll batch already exists for this month",
                ));
            }
            let batch = store.insert_batch(month, year, Some(actor.user_id)).await?;
            (batch, store.active_employees().await?)
        }
        Some(ids) => {
            if ids.is_empty() {
                return Err(HrError::validation("employee_ids cannot be empty"));
            }
            let batch = match store.active_batch(month, year).await? {
                Some(existing) if existing.status == BatchStatus::Paid => {
                    return Err(HrError::conflict("The month's batch is already paid"));
                }
                Some(existing) => existing,
                None => store.insert_batch(month, year, Some(actor.user_id)).await?,
            };
            store.delete_slips_for(batch.id, &ids).await?;

            let mut targets = Vec::with_capacity(ids.len());
            for id in ids {
                match store.employee_by_id(id).await? {
                    Some(e) => targets.push(e),
                    None => failures.push(SlipFailure {
                        employee_id: id,
                        reason: "employee not found".to_string(),
                    }),
                }
            }
            (batch, targets)
        }
    };

    let intended = targets.len() as u64 + failures.len() as u64;
    let mut slips = Vec::with_capacity(targets.len());

    for employee in targets {
        match build_slip(store, &batch, &employee, doc).await {
            Ok(slip) => slips.push(slip),
            Err(e) => {
                warn!(employee_id = employee.id, error = %e, "slip generation failed");
                failures.push(SlipFailure {
                    employee_id: employee.id,
                    reason: e.to_string(),
                });
            }
        }
    }

    // The batch row flips to processed only after its slips are written, and
    // totals are re-read from storage so they can never drift from the slips.
    let all_slips = store.slips_for_batch(batch.id).await?;
    let mut batch = batch;
    batch.employee_count = all_slips.len() as u32;
    batch.total_amount = round2(all_slips.iter().map(|s| s.net).sum());
    batch.status = BatchStatus::Processed;
    batch.processed_by = Some(actor.user_id);
    store.update_batch(&batch).await?;

    info!(
        month,
        year,
        processed = slips.len(),
        failed = failures.len(),
        total = %batch.total_amount,
        "payroll batch generated"
    );
    audit::emit(AuditEvent {
        actor_id: actor.user_id,
        action: "payroll.generate",
        entity: "payroll_batch",
        entity_id: batch.id,
        detail: format!("{}-{:02}: {} slips, total {}", year, month, batch.employee_count, batch.total_amount),
    });

    Ok(PayrollRun {
        batch,
        processed: slips.len() as u64,
        slips,
        intended,
        failures,
    })
}

async fn build_slip<S: HrStore>(
    store: &S,
    batch: &PayrollBatch,
    employee: &EmployeeLite,
    doc: &SettingsDoc,
) -> Result<SalarySlip> {
    let records = store
        .attendance_for_month(employee.id, batch.month, batch.year)
        .await?;
    let summary = MonthSummary::tally(&records);
    let reimbursements = store
        .approved_unpaid_total(employee.id, batch.month, batch.year)
        .await?;

    let figures = compute_figures(
        employee,
        &summary,
        calendar::days_in_month(batch.month, batch.year),
        reimbursements,
        &doc.deductions,
    );

    store
        .insert_slip(NewSalarySlip {
            batch_id: batch.id,
            employee_id: employee.id,
            month: batch.month,
            year: batch.year,
            basic: figures.basic,
            allowances: figures.allowances,
            reimbursements: figures.reimbursements,
            loss_of_pay: figures.loss_of_pay,
            pf: figures.pf,
            tax: figures.tax,
            other_deductions: figures.other_deductions,
            gross: figures.gross,
            net: figures.net,
            status: SlipStatus::Processed,
            present_days: figures.present_days,
            half_days: figures.half_days,
            absent_days: figures.absent_days,
        })
        .await
}

/// Same math as generation, no persistence.
pub async fn preview_payroll<S: HrStore>(
    store: &S,
    actor: &Actor,
    month: u32,
    year: i32,
    employee_ids: Vec<u64>,
    doc: &SettingsDoc,
) -> Result<Vec<SlipFigures>> {
    authorize(&doc.work.policy_ctx(), Action::PreviewPayroll, actor, Relation::Other)?;
    validate_month(month)?;

    let mut previews = Vec::with_capacity(employee_ids.len());
    for id in employee_ids {
        let employee = store
            .employee_by_id(id)
            .await?
            .ok_or_else(|| HrError::not_found(format!("Employee {} not found", id)))?;
        let records = store.attendance_for_month(id, month, year).await?;
        let summary = MonthSummary::tally(&records);
        let reimbursements = store.approved_unpaid_total(id, month, year).await?;
        previews.push(compute_figures(
            &employee,
            &summary,
            calendar::days_in_month(month, year),
            reimbursements,
            &doc.deductions,
        ));
    }
    Ok(previews)
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaidReport {
    pub batch_id: u64,
    pub slips_paid: u64,
    pub attendance_locked: u64,
}

/// Close the batch: slips become paid, reimbursements are consumed, and the
/// month's attendance is locked. Irreversible.
pub async fn mark_payroll_paid<S: HrStore>(
    store: &S,
    actor: &Actor,
    batch_id: u64,
    doc: &SettingsDoc,
) -> Result<PaidReport> {
    authorize(&doc.work.policy_ctx(), Action::MarkPayrollPaid, actor, Relation::Other)?;

    let mut batch = store
        .batch_by_id(batch_id)
        .await?
        .ok_or_else(|| HrError::not_found("Payroll batch not found"))?;

    match batch.status {
        BatchStatus::Processed => {}
        BatchStatus::Paid => return Err(HrError::conflict("Batch is already paid")),
        BatchStatus::Draft => return Err(HrError::conflict("Batch has not been processed")),
        BatchStatus::Cancelled => return Err(HrError::conflict("Batch was cancelled")),
    }

    let slips = store.slips_for_batch(batch.id).await?;
    let slips_paid = store.mark_slips_paid(batch.id).await?;
    for slip in &slips {
        if slip.reimbursements > Decimal::ZERO {
            store
                .mark_reimbursed(slip.employee_id, batch.month, batch.year)
                .await?;
        }
    }

    let attendance_locked = store.lock_month(batch.month, batch.year).await?;

    batch.status = BatchStatus::Paid;
    batch.paid_at = Some(Utc::now());
    store.update_batch(&batch).await?;

    info!(
        batch_id = batch.id,
        slips_paid,
        attendance_locked,
        "payroll batch paid and month locked"
    );
    audit::emit(AuditEvent {
        actor_id: actor.user_id,
        action: "payroll.pay",
        entity: "payroll_batch",
        entity_id: batch.id,
        detail: format!("{} slips paid, {} attendance records locked", slips_paid, attendance_locked),
    });

    Ok(PaidReport {
        batch_id: batch.id,
        slips_paid,
        attendance_locked,
    })
}

#[derive(Debug, Clone, Default)]
pub struct SlipComponents {
    pub basic: Option<Decimal>,
    pub allowances: Option<Decimal>,
    pub reimbursements: Option<Decimal>,
    pub loss_of_pay: Option<Decimal>,
    pub pf: Option<Decimal>,
    pub tax: Option<Decimal>,
    pub other_deductions: Option<Decimal>,
}

/// Correct an unpaid slip's components; gross and net are recomputed from
/// the edited figures, never left stale.
pub async fn update_slip<S: HrStore>(
    store: &S,
    actor: &Actor,
    slip_id: u64,
    components: SlipComponents,
    doc: &SettingsDoc,
) -> Result<SalarySlip> {
    authorize(&doc.work.policy_ctx(), Action::EditSlip, actor, Relation::Other)?;

    let mut slip = store
        .slip_by_id(slip_id)
        .await?
        .ok_or_else(|| HrError::not_found("Salary slip not found"))?;

    if slip.status == SlipStatus::Paid {
        return Err(HrError::conflict("A paid slip cannot be edited"));
    }
    if let Some(batch) = store.batch_by_id(slip.batch_id).await? {
        if batch.status == BatchStatus::Paid {
            return Err(HrError::conflict("The slip's batch is already paid"));
        }
    }

    if let Some(v) = components.basic {
        slip.basic = round2(v);
    }
    if let Some(v) = components.allowances {
        slip.allowances = round2(v);
    }
    if let Some(v) = components.reimbursements {
        slip.reimbursements = round2(v);
    }
    if let Some(v) = components.loss_of_pay {
        slip.loss_of_pay = round2(v);
    }
    if let Some(v) = components.pf {
        slip.pf = round2(v);
    }
    if let Some(v) = components.tax {
        slip.tax = round2(v);
    }
    if let Some(v) = components.other_deductions {
        slip.other_deductions = round2(v);
    }

    slip.gross = round2(slip.basic + slip.allowances + slip.reimbursements);
    slip.net = round2(
        slip.gross - slip.loss_of_pay - slip.pf - slip.tax - slip.other_deductions,
    );

    store.update_slip(&slip).await?;

    // Keep the batch total the exact sum of its slips.
    if let Some(mut batch) = store.batch_by_id(slip.batch_id).await? {
        let all = store.slips_for_batch(batch.id).await?;
        batch.total_amount = round2(all.iter().map(|s| s.net).sum());
        store.update_batch(&batch).await?;
    }

    audit::emit(AuditEvent {
        actor_id: actor.user_id,
        action: "payroll.edit_slip",
        entity: "salary_slip",
        entity_id: slip.id,
        detail: format!("net -> {}", slip.net),
    });

    Ok(slip)
}

/// Cancel a batch that was never paid, reopening the month. Its slips are
/// removed so the (employee, month, year) slots become free again.
pub async fn cancel_batch<S: HrStore>(
    store: &S,
    actor: &Actor,
    batch_id: u64,
    doc: &SettingsDoc,
) -> Result<PayrollBatch> {
    authorize(&doc.work.policy_ctx(), Action::CancelBatch, actor, Relation::Other)?;

    let mut batch = store
        .batch_by_id(batch_id)
        .await?
        .ok_or_else(|| HrError::not_found("Payroll batch not found"))?;

    if batch.status == BatchStatus::Paid {
        return Err(HrError::conflict("A paid batch cannot be cancelled"));
    }

    store.delete_all_slips(batch.id).await?;
    batch.status = BatchStatus::Cancelled;
    batch.employee_count = 0;
    batch.total_amount = Decimal::ZERO;
    store.update_batch(&batch).await?;

    audit::emit(AuditEvent {
        actor_id: actor.user_id,
        action: "payroll.cancel_batch",
        entity: "payroll_batch",
        entity_id: batch.id,
        detail: format!("{}-{:02} cancelled", batch.year, batch.month),
    });
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::attendance::{AttendanceSource, AttendanceStatus, NewAttendance};
    use crate::model::role::Role;
    use crate::store::memory::MemStore;
    use crate::store::ReimbursementSource;
    use chrono::NaiveDate;
    use std::str::FromStr;

    fn admin() -> Actor {
        Actor {
            user_id: 1,
            employee_id: None,
            role: Role::Admin,
        }
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn employee(id: u64, salary: u64) -> EmployeeLite {
        EmployeeLite {
            id,
            name: format!("employee-{}", id),
            monthly_salary: Decimal::from(salary),
            manager_id: None,
            role_id: Role::Employee as u8,
            active: true,
        }
    }

    /// June 2026 has 30 days. Give employee 10 two absent days and one half
    /// day; every other working day present.
    async fn seed_attendance(store: &MemStore, employee_id: u64) {
        for day in 1..=30u32 {
            let date = NaiveDate::from_ymd_opt(2026, 6, day).unwrap();
            let status = match day {
                6 | 7 | 13 | 14 | 20 | 21 | 27 | 28 => AttendanceStatus::Weekend,
                2 | 3 => AttendanceStatus::Absent,
                4 => AttendanceStatus::HalfDay,
                _ => AttendanceStatus::Present,
            };
            store
                .insert_attendance(NewAttendance::status_only(
                    employee_id,
                    date,
                    status,
                    AttendanceSource::Adjusted,
                ))
                .await
                .unwrap();
        }
    }

    #[test]
    fn reference_scenario_nets_25700() {
        let summary = MonthSummary {
            present_days: 25,
            half_days: 1,
            absent_days: 2,
            ..Default::default()
        };
        let figures = compute_figures(
            &employee(10, 30_000),
            &summary,
            30,
            Decimal::ZERO,
            &DeductionRates::default(),
        );

        assert_eq!(figures.basic, dec("15000.00"));
        assert_eq!(figures.allowances, dec("15000.00"));
        assert_eq!(figures.loss_of_pay, dec("2500.00"));
        assert_eq!(figures.pf, dec("1800.00"));
        assert_eq!(figures.tax, Decimal::ZERO);
        assert_eq!(figures.gross, dec("30000.00"));
        assert_eq!(figures.net, dec("25700.00"));
    }

    #[test]
    fn tax_kicks_in_above_the_slab() {
        let figures = compute_figures(
            &employee(11, 60_000),
            &MonthSummary::default(),
            30,
            Decimal::ZERO,
            &DeductionRates::default(),
        );
        assert_eq!(figures.tax, dec("6000.00"));
        // 60000 - pf(0.5*60000*0.12=3600) - tax 6000
        assert_eq!(figures.net, dec("50400.00"));
    }

    #[actix_web::test]
    async fn full_run_writes_batch_and_slips() {
        let store = MemStore::new();
        let doc = SettingsDoc::default();
        store.seed_employee(employee(10, 30_000), "EMP-10");
        store.seed_employee(employee(11, 60_000), "EMP-11");
        seed_attendance(&store, 10).await;
        seed_attendance(&store, 11).await;
        store.seed_reimbursement(11, 6, 2026, dec("1200.00"));

        let run = generate_payroll(&store, &admin(), 6, 2026, None, &doc).await.unwrap();
        assert_eq!(run.intended, 2);
        assert_eq!(run.processed, 2);
        assert!(run.failures.is_empty());
        assert_eq!(run.batch.status, BatchStatus::Processed);
        assert_eq!(run.batch.employee_count, 2);

        let total: Decimal = run.slips.iter().map(|s| s.net).sum();
        assert_eq!(run.batch.total_amount, total);

        let with_reimb = run.slips.iter().find(|s| s.employee_id == 11).unwrap();
        assert_eq!(with_reimb.reimbursements, dec("1200.00"));
        assert_eq!(with_reimb.gross, dec("61200.00"));
    }

    #[actix_web::test]
    async fn full_run_conflicts_with_an_existing_batch() {
        let store = MemStore::new();
        let doc = SettingsDoc::default();
        store.seed_employee(employee(10, 30_000), "EMP-10");
        seed_attendance(&store, 10).await;

        generate_payroll(&store, &admin(), 6, 2026, None, &doc).await.unwrap();
        let err = generate_payroll(&store, &admin(), 6, 2026, None, &doc)
            .await
            .unwrap_err();
        assert!(matches!(err, HrError::Conflict(_)));
    }

    #[actix_web::test]
    async fn selective_run_replaces_without_duplicates() {
        let store = MemStore::new();
        let doc = SettingsDoc::default();
        store.seed_employee(employee(10, 30_000), "EMP-10");
        store.seed_employee(employee(11, 60_000), "EMP-11");
        seed_attendance(&store, 10).await;
        seed_attendance(&store, 11).await;

        let first = generate_payroll(&store, &admin(), 6, 2026, Some(vec![10, 11]), &doc)
            .await
            .unwrap();
        assert_eq!(first.processed, 2);

        // Regenerating one employee reuses the batch and leaves one slip
        // per employee.
        let second = generate_payroll(&store, &admin(), 6, 2026, Some(vec![10]), &doc)
            .await
            .unwrap();
        assert_eq!(second.batch.id, first.batch.id);
        assert_eq!(second.processed, 1);

        let slips = store.slips_for_batch(first.batch.id).await.unwrap();
        assert_eq!(slips.len(), 2);
        assert_eq!(
            slips.iter().filter(|s| s.employee_id == 10).count(),
            1
        );
    }

    #[actix_web::test]
    async fn paying_locks_the_month_for_everyone() {
        let store = MemStore::new();
        let doc = SettingsDoc::default();
        store.seed_employee(employee(10, 30_000), "EMP-10");
        seed_attendance(&store, 10).await;
        store.seed_reimbursement(10, 6, 2026, dec("500.00"));

        let run = generate_payroll(&store, &admin(), 6, 2026, None, &doc).await.unwrap();
        let report = mark_payroll_paid(&store, &admin(), run.batch.id, &doc).await.unwrap();
        assert_eq!(report.slips_paid, 1);
        assert_eq!(report.attendance_locked, 30);

        // Paying twice is a conflict.
        let err = mark_payroll_paid(&store, &admin(), run.batch.id, &doc).await.unwrap_err();
        assert!(matches!(err, HrError::Conflict(_)));

        // Every writer is now rejected, regardless of role.
        let err = crate::service::attendance::mark_attendance(
            &store,
            &admin(),
            crate::service::attendance::MarkAttendance {
                employee_id: 10,
                date: NaiveDate::from_ymd_opt(2026, 6, 10).unwrap(),
                check_in: None,
                check_out: None,
                status: Some(AttendanceStatus::Present),
                notes: None,
                source: AttendanceSource::Manual,
            },
            &doc,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, HrError::Conflict(_)));

        // Reimbursements were consumed.
        assert_eq!(
            store.approved_unpaid_total(10, 6, 2026).await.unwrap(),
            Decimal::ZERO
        );

        // Slips in a paid batch reject edits.
        let slip_id = run.slips[0].id;
        let err = update_slip(&store, &admin(), slip_id, SlipComponents::default(), &doc)
            .await
            .unwrap_err();
        assert!(matches!(err, HrError::Conflict(_)));
    }

    #[actix_web::test]
    async fn slip_edits_recompute_totals() {
        let store = MemStore::new();
        let doc = SettingsDoc::default();
        store.seed_employee(employee(10, 30_000), "EMP-10");
        seed_attendance(&store, 10).await;

        let run = generate_payroll(&store, &admin(), 6, 2026, None, &doc).await.unwrap();
        let slip = update_slip(
            &store,
            &admin(),
            run.slips[0].id,
            SlipComponents {
                other_deductions: Some(dec("700.00")),
                ..Default::default()
            },
            &doc,
        )
        .await
        .unwrap();

        assert_eq!(slip.net, run.slips[0].net - dec("700.00"));

        let batch = store.batch_by_id(run.batch.id).await.unwrap().unwrap();
        assert_eq!(batch.total_amount, slip.net);
    }

    #[actix_web::test]
    async fn cancelled_batch_frees_the_month() {
        let store = MemStore::new();
        let doc = SettingsDoc::default();
        store.seed_employee(employee(10, 30_000), "EMP-10");
        seed_attendance(&store, 10).await;

        let run = generate_payroll(&store, &admin(), 6, 2026, None, &doc).await.unwrap();
        cancel_batch(&store, &admin(), run.batch.id, &doc).await.unwrap();

        // The month can be generated again from scratch.
        let rerun = generate_payroll(&store, &admin(), 6, 2026, None, &doc).await.unwrap();
        assert_eq!(rerun.processed, 1);
    }

    #[actix_web::test]
    async fn preview_persists_nothing() {
        let store = MemStore::new();
        let doc = SettingsDoc::default();
        store.seed_employee(employee(10, 30_000), "EMP-10");
        seed_attendance(&store, 10).await;

        let hr = Actor {
            user_id: 5,
            employee_id: Some(30),
            role: Role::Hr,
        };
        let previews = preview_payroll(&store, &hr, 6, 2026, vec![10], &doc).await.unwrap();
        assert_eq!(previews.len(), 1);
        assert_eq!(previews[0].net, dec("25700.00"));

        assert!(store.active_batch(6, 2026).await.unwrap().is_none());
        assert!(store.slip_for(10, 6, 2026).await.unwrap().is_none());

        // Generation itself is beyond HR.
        let err = generate_payroll(&store, &hr, 6, 2026, None, &doc).await.unwrap_err();
        assert!(matches!(err, HrError::Forbidden(_)));
    }
}
