//! Scheduled maintenance driver: once per day, after the configured time,
//! run the half-day correction pass and the absence sweep.
//!
//! Both passes are idempotent, so a restart that repeats a day's run is
//! harmless. Single active instance assumed.

use std::time::Duration;

use chrono::{Local, NaiveDate};
use serde::Serialize;
use tracing::{error, info};

use crate::error::Result;
use crate::service::attendance::{SweepReport, apply_half_day_corrections, run_daily_sweep};
use crate::settings::SettingsDoc;
use crate::store::HrStore;

const TICK: Duration = Duration::from_secs(60);

#[derive(Debug, Serialize)]
pub struct MaintenanceReport {
    pub half_day_corrections: u64,
    pub sweep: SweepReport,
}

/// One full maintenance pass for a given day.
pub async fn run_once<S: HrStore>(
    store: &S,
    date: NaiveDate,
    now: chrono::NaiveTime,
    doc: &SettingsDoc,
) -> Result<MaintenanceReport> {
    let half_day_corrections = apply_half_day_corrections(store, date, now, doc).await?;
    let sweep = run_daily_sweep(store, date, doc).await?;
    Ok(MaintenanceReport {
        half_day_corrections,
        sweep,
    })
}

/// Wall-clock loop driving `run_once` once per day after `sweep_after`.
pub async fn run_loop<S: HrStore>(store: S, doc: SettingsDoc) {
    let mut last_run: Option<NaiveDate> = None;

    info!(after = %doc.work.sweep_after, "maintenance scheduler started");

    loop {
        let now = Local::now();
        let today = now.date_naive();

        if now.time() >= doc.work.sweep_after && last_run != Some(today) {
            match run_once(&store, today, now.time(), &doc).await {
                Ok(report) => {
                    info!(
                        date = %today,
                        corrections = report.half_day_corrections,
                        absent = report.sweep.marked_absent,
                        on_leave = report.sweep.marked_on_leave,
                        "daily maintenance finished"
                    );
                    last_run = Some(today);
                }
                Err(e) => {
                    // Leave last_run unset so the next tick retries.
                    error!(error = %e, "daily maintenance failed");
                }
            }
        }

        actix_web::rt::time::sleep(TICK).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::attendance::{AttendanceSource, AttendanceStatus};
    use crate::model::employee::EmployeeLite;
    use crate::model::role::Role;
    use crate::policy::Actor;
    use crate::service::attendance::{MarkAttendance, mark_attendance};
    use crate::store::memory::MemStore;
    use chrono::{NaiveTime, NaiveDate};
    use rust_decimal::Decimal;

    #[actix_web::test]
    async fn one_pass_corrects_then_sweeps() {
        let store = MemStore::new();
        let doc = SettingsDoc::default();
        store.seed_employee(
            EmployeeLite {
                id: 10,
                name: "Asha".to_string(),
                monthly_salary: Decimal::from(30_000),
                manager_id: None,
                role_id: Role::Employee as u8,
                active: true,
            },
            "EMP-10",
        );
        store.seed_employee(
            EmployeeLite {
                id: 11,
                name: "Bina".to_string(),
                monthly_salary: Decimal::from(30_000),
                manager_id: None,
                role_id: Role::Employee as u8,
                active: true,
            },
            "EMP-11",
        );

        // Yesterday's open check-in for 10; nothing at all for 11 today.
        let yesterday = NaiveDate::from_ymd_opt(2026, 7, 6).unwrap();
        let today = NaiveDate::from_ymd_opt(2026, 7, 7).unwrap();
        mark_attendance(
            &store,
            &Actor::system(),
            MarkAttendance {
                employee_id: 10,
                date: yesterday,
                check_in: Some(NaiveTime::from_hms_opt(9, 0, 0).unwrap()),
                check_out: None,
                status: None,
                notes: None,
                source: AttendanceSource::Biometric,
            },
            &doc,
        )
        .await
        .unwrap();

        let report = run_once(
            &store,
            today,
            NaiveTime::from_hms_opt(20, 30, 0).unwrap(),
            &doc,
        )
        .await
        .unwrap();

        assert_eq!(report.half_day_corrections, 1);
        assert_eq!(report.sweep.marked_absent, 2);

        assert_eq!(
            store.attendance_on(10, yesterday).await.unwrap().unwrap().status,
            AttendanceStatus::HalfDay
        );
        assert_eq!(
            store.attendance_on(11, today).await.unwrap().unwrap().status,
            AttendanceStatus::Absent
        );

        // Re-running the same day changes nothing.
        let again = run_once(
            &store,
            today,
            NaiveTime::from_hms_opt(20, 45, 0).unwrap(),
            &doc,
        )
        .await
        .unwrap();
        assert_eq!(again.half_day_corrections, 0);
        assert_eq!(again.sweep.marked_absent, 0);
        assert_eq!(again.sweep.skipped_existing, 2);
    }
}
