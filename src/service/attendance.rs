//! Attendance determination engine: hours math, status classification,
//! manual marking, the half-day correction pass and the daily absence sweep.
//!
//! Every write path funnels through the same lock check; a locked record is
//! terminal for this engine.

use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::audit::{self, AuditEvent};
use crate::calendar;
use crate::error::{HrError, Result};
use crate::model::attendance::{
    AttendanceRecord, AttendanceSource, AttendanceStatus, MonthSummary, NewAttendance,
};
use crate::policy::{Action, Actor, authorize};
use crate::settings::{SettingsDoc, WorkSettings};
use crate::store::HrStore;
use crate::utils::money::minutes_to_hours;

/// Hours between check-in and check-out; a checkout before the check-in is
/// treated as an overnight shift and gains a day.
pub fn calculate_work_hours(check_in: NaiveTime, check_out: NaiveTime) -> Decimal {
    let mut minutes = (check_out - check_in).num_minutes();
    if minutes < 0 {
        minutes += 24 * 60;
    }
    minutes_to_hours(minutes)
}

/// Total, deterministic mapping from worked hours to a day status.
pub fn classify(hours: Decimal, work: &WorkSettings) -> AttendanceStatus {
    if hours < work.half_day_threshold {
        AttendanceStatus::Absent
    } else if hours < work.standard_work_hours {
        AttendanceStatus::HalfDay
    } else {
        AttendanceStatus::Present
    }
}

/// Derived figures for one day given its timestamps.
#[derive(Debug, Clone, Copy)]
pub struct DerivedDay {
    pub status: AttendanceStatus,
    pub work_hours: Option<Decimal>,
    pub overtime_minutes: i64,
    pub late_minutes: i64,
}

pub fn derive_day(
    date: NaiveDate,
    check_in: Option<NaiveTime>,
    check_out: Option<NaiveTime>,
    work: &WorkSettings,
) -> DerivedDay {
    match (check_in, check_out) {
        (Some(cin), Some(cout)) => {
            let hours = calculate_work_hours(cin, cout);
            let worked_minutes = {
                let mut m = (cout - cin).num_minutes();
                if m < 0 {
                    m += 24 * 60;
                }
                m
            };
            let standard_minutes = (work.standard_work_hours * Decimal::from(60))
                .to_i64()
                .unwrap_or(8 * 60);
            DerivedDay {
                status: classify(hours, work),
                work_hours: Some(hours),
                overtime_minutes: (worked_minutes - standard_minutes).max(0),
                late_minutes: late_minutes(cin, work),
            }
        }
        // A lone check-in is provisionally present until the correction pass
        // or a check-out says otherwise.
        (Some(cin), None) => DerivedDay {
            status: AttendanceStatus::Present,
            work_hours: None,
            overtime_minutes: 0,
            late_minutes: late_minutes(cin, work),
        },
        (None, _) => DerivedDay {
            status: if calendar::is_weekend(date, &work.weekend_days) {
                AttendanceStatus::Weekend
            } else {
                AttendanceStatus::Absent
            },
            work_hours: None,
            overtime_minutes: 0,
            late_minutes: 0,
        },
    }
}

fn late_minutes(check_in: NaiveTime, work: &WorkSettings) -> i64 {
    (check_in - work.shift_start).num_minutes().max(0)
}

#[derive(Debug, Clone)]
pub struct MarkAttendance {
    pub employee_id: u64,
    pub date: NaiveDate,
    pub check_in: Option<NaiveTime>,
    pub check_out: Option<NaiveTime>,
    /// An explicitly supplied status always wins over derivation.
    pub status: Option<AttendanceStatus>,
    pub notes: Option<String>,
    pub source: AttendanceSource,
}

/// Insert-or-update the (employee, date) record.
pub async fn mark_attendance<S: HrStore>(
    store: &S,
    actor: &Actor,
    input: MarkAttendance,
    doc: &SettingsDoc,
) -> Result<AttendanceRecord> {
    let employee = store
        .employee_by_id(input.employee_id)
        .await?
        .ok_or_else(|| HrError::not_found("Employee not found"))?;

    let rel = actor.relation_to(employee.id);
    authorize(&doc.work.policy_ctx(), Action::MarkAttendance, actor, rel)?;

    let existing = store.attendance_on(input.employee_id, input.date).await?;
    if let Some(rec) = &existing {
        ensure_unlocked(rec)?;
    }

    let edited_by = editor_of(actor);

    let record = match existing {
        Some(mut rec) => {
            if input.check_in.is_some() {
                rec.check_in = input.check_in;
            }
            if input.check_out.is_some() {
                rec.check_out = input.check_out;
            }
            let derived = derive_day(rec.date, rec.check_in, rec.check_out, &doc.work);
            rec.status = input.status.unwrap_or(derived.status);
            rec.work_hours = derived.work_hours;
            rec.overtime_minutes = derived.overtime_minutes;
            rec.late_minutes = derived.late_minutes;
            rec.source = input.source;
            rec.edited_by = edited_by;
            if input.notes.is_some() {
                rec.edit_reason = input.notes.clone();
            }
            store.update_attendance(&rec).await?;
            rec
        }
        None => {
            let derived = derive_day(input.date, input.check_in, input.check_out, &doc.work);
            store
                .insert_attendance(NewAttendance {
                    employee_id: input.employee_id,
                    date: input.date,
                    check_in: input.check_in,
                    check_out: input.check_out,
                    status: input.status.unwrap_or(derived.status),
                    work_hours: derived.work_hours,
                    overtime_minutes: derived.overtime_minutes,
                    late_minutes: derived.late_minutes,
                    source: input.source,
                    edited_by,
                    edit_reason: input.notes.clone(),
                })
                .await?
        }
    };

    audit::emit(AuditEvent {
        actor_id: actor.user_id,
        action: "attendance.mark",
        entity: "attendance",
        entity_id: record.id,
        detail: format!("employee {} on {} -> {}", record.employee_id, record.date, record.status),
    });

    Ok(record)
}

#[derive(Debug, Clone, Default)]
pub struct UpdateAttendance {
    pub check_in: Option<NaiveTime>,
    pub check_out: Option<NaiveTime>,
    pub status: Option<AttendanceStatus>,
}

/// Patch an existing record by id, stamping editor and reason.
pub async fn update_attendance<S: HrStore>(
    store: &S,
    actor: &Actor,
    record_id: u64,
    patch: UpdateAttendance,
    reason: String,
    doc: &SettingsDoc,
) -> Result<AttendanceRecord> {
    let mut rec = store
        .attendance_by_id(record_id)
        .await?
        .ok_or_else(|| HrError::not_found("Attendance record not found"))?;

    let rel = actor.relation_to(rec.employee_id);
    authorize(&doc.work.policy_ctx(), Action::UpdateAttendance, actor, rel)?;
    ensure_unlocked(&rec)?;

    if patch.check_in.is_some() {
        rec.check_in = patch.check_in;
    }
    if patch.check_out.is_some() {
        rec.check_out = patch.check_out;
    }
    let derived = derive_day(rec.date, rec.check_in, rec.check_out, &doc.work);
    rec.status = patch.status.unwrap_or(derived.status);
    rec.work_hours = derived.work_hours;
    rec.overtime_minutes = derived.overtime_minutes;
    rec.late_minutes = derived.late_minutes;
    rec.source = AttendanceSource::Adjusted;
    rec.edited_by = editor_of(actor);
    rec.edit_reason = Some(reason);

    store.update_attendance(&rec).await?;

    audit::emit(AuditEvent {
        actor_id: actor.user_id,
        action: "attendance.update",
        entity: "attendance",
        entity_id: rec.id,
        detail: format!("employee {} on {} -> {}", rec.employee_id, rec.date, rec.status),
    });

    Ok(rec)
}

/// Rewrite stale "present but never clocked out" records to half days.
///
/// Fires for past dates unconditionally, and for today once the cutoff time
/// has passed. Applying it twice is a no-op: a corrected record is no longer
/// `present`.
pub async fn apply_half_day_corrections<S: HrStore>(
    store: &S,
    today: NaiveDate,
    now: NaiveTime,
    doc: &SettingsDoc,
) -> Result<u64> {
    let candidates = store.open_present_before(today).await?;
    let mut corrected = 0;

    for mut rec in candidates {
        if rec.is_locked {
            continue;
        }
        if rec.date == today && now < doc.work.auto_half_day_cutoff {
            continue;
        }

        rec.status = AttendanceStatus::HalfDay;
        rec.source = AttendanceSource::Adjusted;
        let note = "auto half-day: checked in but never checked out";
        rec.edit_reason = Some(match rec.edit_reason.take() {
            Some(existing) => format!("{}; {}", existing, note),
            None => note.to_string(),
        });
        store.update_attendance(&rec).await?;
        corrected += 1;
    }

    if corrected > 0 {
        info!(corrected, "half-day correction pass rewrote open records");
    }
    Ok(corrected)
}

#[derive(Debug, Default, Serialize, ToSchema)]
pub struct SweepReport {
    pub date: Option<NaiveDate>,
    pub considered: u64,
    pub marked_absent: u64,
    pub marked_on_leave: u64,
    pub skipped_existing: u64,
    pub failed: u64,
    /// True when the whole date was skipped as a weekend or holiday.
    pub free_day: bool,
}

/// Daily absence sweep. Never overwrites an existing record, so repeated or
/// concurrent runs settle on the same outcome.
pub async fn run_daily_sweep<S: HrStore>(
    store: &S,
    date: NaiveDate,
    doc: &SettingsDoc,
) -> Result<SweepReport> {
    let mut report = SweepReport {
        date: Some(date),
        ..Default::default()
    };

    if calendar::is_weekend(date, &doc.work.weekend_days) || store.is_holiday(date).await? {
        report.free_day = true;
        return Ok(report);
    }

    for employee in store.active_employees().await? {
        report.considered += 1;

        if store.attendance_on(employee.id, date).await?.is_some() {
            report.skipped_existing += 1;
            continue;
        }

        let status = if store
            .approved_leave_covering(employee.id, date)
            .await?
            .is_some()
        {
            AttendanceStatus::OnLeave
        } else {
            AttendanceStatus::Absent
        };

        match store
            .insert_attendance(NewAttendance::status_only(
                employee.id,
                date,
                status,
                AttendanceSource::Adjusted,
            ))
            .await
        {
            Ok(_) => match status {
                AttendanceStatus::OnLeave => report.marked_on_leave += 1,
                _ => report.marked_absent += 1,
            },
            // A concurrent writer beat us to the (employee, date) slot.
            Err(HrError::Conflict(_)) => report.skipped_existing += 1,
            Err(e) => {
                warn!(employee_id = employee.id, error = %e, "sweep failed for employee");
                report.failed += 1;
            }
        }
    }

    info!(
        date = %date,
        absent = report.marked_absent,
        on_leave = report.marked_on_leave,
        existing = report.skipped_existing,
        "daily absence sweep finished"
    );
    Ok(report)
}

/// Lock every record of a month ahead of (or as part of) payroll close.
pub async fn lock_attendance<S: HrStore>(
    store: &S,
    actor: &Actor,
    month: u32,
    year: i32,
    doc: &SettingsDoc,
) -> Result<u64> {
    authorize(
        &doc.work.policy_ctx(),
        Action::LockAttendance,
        actor,
        crate::policy::Relation::Other,
    )?;
    validate_month(month)?;

    let locked = store.lock_month(month, year).await?;
    audit::emit(AuditEvent {
        actor_id: actor.user_id,
        action: "attendance.lock",
        entity: "attendance_month",
        entity_id: (year as u64) * 100 + month as u64,
        detail: format!("locked {} records for {}-{:02}", locked, year, month),
    });
    Ok(locked)
}

/// Month day-count aggregation for one employee.
pub async fn attendance_summary<S: HrStore>(
    store: &S,
    actor: &Actor,
    employee_id: u64,
    month: u32,
    year: i32,
    doc: &SettingsDoc,
) -> Result<MonthSummary> {
    let rel = actor.relation_to(employee_id);
    authorize(&doc.work.policy_ctx(), Action::ViewAttendance, actor, rel)?;
    validate_month(month)?;

    let records = store.attendance_for_month(employee_id, month, year).await?;
    Ok(MonthSummary::tally(&records))
}

pub(crate) fn ensure_unlocked(rec: &AttendanceRecord) -> Result<()> {
    if rec.is_locked {
        Err(HrError::conflict(
            "Attendance record is locked by a closed payroll",
        ))
    } else {
        Ok(())
    }
}

pub(crate) fn validate_month(month: u32) -> Result<()> {
    if (1..=12).contains(&month) {
        Ok(())
    } else {
        Err(HrError::validation("month must be between 1 and 12"))
    }
}

fn editor_of(actor: &Actor) -> Option<u64> {
    if actor.role == crate::model::role::Role::System {
        None
    } else {
        Some(actor.user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::employee::EmployeeLite;
    use crate::model::role::Role;
    use crate::store::memory::MemStore;
    use std::str::FromStr;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn doc() -> SettingsDoc {
        SettingsDoc::default()
    }

    fn seed_store() -> MemStore {
        let store = MemStore::new();
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
                monthly_salary: Decimal::from(45_000),
                manager_id: None,
                role_id: Role::Employee as u8,
                active: true,
            },
            "EMP-11",
        );
        store
    }

    fn admin() -> Actor {
        Actor {
            user_id: 1,
            employee_id: None,
            role: Role::Admin,
        }
    }

    #[test]
    fn overnight_shift_gains_a_day() {
        assert_eq!(
            calculate_work_hours(t(22, 0), t(6, 0)),
            Decimal::from_str("8.00").unwrap()
        );
        assert_eq!(
            calculate_work_hours(t(9, 0), t(18, 0)),
            Decimal::from_str("9.00").unwrap()
        );
        assert_eq!(
            calculate_work_hours(t(9, 0), t(13, 30)),
            Decimal::from_str("4.50").unwrap()
        );
    }

    #[test]
    fn classification_covers_every_band() {
        let work = doc().work;
        assert_eq!(classify(Decimal::from_str("3.99").unwrap(), &work), AttendanceStatus::Absent);
        assert_eq!(classify(Decimal::from(4), &work), AttendanceStatus::HalfDay);
        assert_eq!(classify(Decimal::from_str("7.99").unwrap(), &work), AttendanceStatus::HalfDay);
        assert_eq!(classify(Decimal::from(8), &work), AttendanceStatus::Present);
        assert_eq!(classify(Decimal::from(11), &work), AttendanceStatus::Present);
    }

    #[test]
    fn derive_without_timestamps_checks_the_calendar() {
        let work = doc().work;
        // 2026-07-04 is a Saturday, 2026-07-06 a Monday
        assert_eq!(derive_day(d(2026, 7, 4), None, None, &work).status, AttendanceStatus::Weekend);
        assert_eq!(derive_day(d(2026, 7, 6), None, None, &work).status, AttendanceStatus::Absent);
        assert_eq!(
            derive_day(d(2026, 7, 6), Some(t(9, 0)), None, &work).status,
            AttendanceStatus::Present
        );
    }

    #[test]
    fn overtime_and_lateness_are_clamped_at_zero() {
        let work = doc().work;
        let derived = derive_day(d(2026, 7, 6), Some(t(9, 30)), Some(t(19, 0)), &work);
        assert_eq!(derived.late_minutes, 30);
        assert_eq!(derived.overtime_minutes, 90);

        let short = derive_day(d(2026, 7, 6), Some(t(8, 0)), Some(t(12, 0)), &work);
        assert_eq!(short.late_minutes, 0);
        assert_eq!(short.overtime_minutes, 0);
    }

    #[actix_web::test]
    async fn explicit_status_wins_over_derivation() {
        let store = seed_store();
        let rec = mark_attendance(
            &store,
            &admin(),
            MarkAttendance {
                employee_id: 10,
                date: d(2026, 7, 6),
                check_in: Some(t(9, 0)),
                check_out: Some(t(18, 0)),
                status: Some(AttendanceStatus::OnLeave),
                notes: None,
                source: AttendanceSource::Manual,
            },
            &doc(),
        )
        .await
        .unwrap();
        assert_eq!(rec.status, AttendanceStatus::OnLeave);
        assert_eq!(rec.work_hours, Some(Decimal::from_str("9.00").unwrap()));
    }

    #[actix_web::test]
    async fn marking_twice_updates_the_same_row() {
        let store = seed_store();
        let settings = doc();
        let first = mark_attendance(
            &store,
            &admin(),
            MarkAttendance {
                employee_id: 10,
                date: d(2026, 7, 6),
                check_in: Some(t(9, 0)),
                check_out: None,
                status: None,
                notes: None,
                source: AttendanceSource::Manual,
            },
            &settings,
        )
        .await
        .unwrap();
        assert_eq!(first.status, AttendanceStatus::Present);

        let second = mark_attendance(
            &store,
            &admin(),
            MarkAttendance {
                employee_id: 10,
                date: d(2026, 7, 6),
                check_in: None,
                check_out: Some(t(13, 0)),
                status: None,
                notes: None,
                source: AttendanceSource::Manual,
            },
            &settings,
        )
        .await
        .unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(second.status, AttendanceStatus::HalfDay);
        assert_eq!(second.work_hours, Some(Decimal::from_str("4.00").unwrap()));
    }

    #[actix_web::test]
    async fn hr_cannot_mark_own_attendance() {
        let store = seed_store();
        store.seed_employee(
            EmployeeLite {
                id: 20,
                name: "Hana".to_string(),
                monthly_salary: Decimal::from(50_000),
                manager_id: None,
                role_id: Role::Hr as u8,
                active: true,
            },
            "EMP-20",
        );
        let hr = Actor {
            user_id: 5,
            employee_id: Some(20),
            role: Role::Hr,
        };
        let err = mark_attendance(
            &store,
            &hr,
            MarkAttendance {
                employee_id: 20,
                date: d(2026, 7, 6),
                check_in: Some(t(9, 0)),
                check_out: None,
                status: None,
                notes: None,
                source: AttendanceSource::Manual,
            },
            &doc(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, HrError::Forbidden(_)));
    }

    #[actix_web::test]
    async fn locked_record_rejects_every_write() {
        let store = seed_store();
        let settings = doc();
        mark_attendance(
            &store,
            &admin(),
            MarkAttendance {
                employee_id: 10,
                date: d(2026, 7, 6),
                check_in: Some(t(9, 0)),
                check_out: Some(t(18, 0)),
                status: None,
                notes: None,
                source: AttendanceSource::Manual,
            },
            &settings,
        )
        .await
        .unwrap();

        let locked = lock_attendance(&store, &admin(), 7, 2026, &settings).await.unwrap();
        assert_eq!(locked, 1);

        let err = mark_attendance(
            &store,
            &admin(),
            MarkAttendance {
                employee_id: 10,
                date: d(2026, 7, 6),
                check_in: Some(t(8, 0)),
                check_out: None,
                status: None,
                notes: None,
                source: AttendanceSource::Manual,
            },
            &settings,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, HrError::Conflict(_)));
    }

    #[actix_web::test]
    async fn half_day_correction_is_idempotent() {
        let store = seed_store();
        let settings = doc();
        mark_attendance(
            &store,
            &admin(),
            MarkAttendance {
                employee_id: 10,
                date: d(2026, 7, 6),
                check_in: Some(t(9, 0)),
                check_out: None,
                status: None,
                notes: None,
                source: AttendanceSource::Biometric,
            },
            &settings,
        )
        .await
        .unwrap();

        // Next day: the stale open check-in becomes a half day.
        let first = apply_half_day_corrections(&store, d(2026, 7, 7), t(8, 0), &settings)
            .await
            .unwrap();
        assert_eq!(first, 1);

        let rec = store.attendance_on(10, d(2026, 7, 6)).await.unwrap().unwrap();
        assert_eq!(rec.status, AttendanceStatus::HalfDay);
        assert!(rec.edit_reason.as_deref().unwrap().contains("auto half-day"));

        let second = apply_half_day_corrections(&store, d(2026, 7, 7), t(8, 0), &settings)
            .await
            .unwrap();
        assert_eq!(second, 0);
    }

    #[actix_web::test]
    async fn todays_open_checkin_waits_for_the_cutoff() {
        let store = seed_store();
        let settings = doc();
        mark_attendance(
            &store,
            &admin(),
            MarkAttendance {
                employee_id: 10,
                date: d(2026, 7, 6),
                check_in: Some(t(9, 0)),
                check_out: None,
                status: None,
                notes: None,
                source: AttendanceSource::Biometric,
            },
            &settings,
        )
        .await
        .unwrap();

        let before = apply_half_day_corrections(&store, d(2026, 7, 6), t(12, 0), &settings)
            .await
            .unwrap();
        assert_eq!(before, 0);

        let after = apply_half_day_corrections(&store, d(2026, 7, 6), t(18, 30), &settings)
            .await
            .unwrap();
        assert_eq!(after, 1);
    }

    #[actix_web::test]
    async fn sweep_is_idempotent_and_leave_aware() {
        let store = seed_store();
        let settings = doc();
        let date = d(2026, 7, 6);

        // Employee 11 has an approved leave covering the date.
        let leave = crate::model::leave::NewLeaveRequest {
            employee_id: 11,
            leave_type: "annual".to_string(),
            start_date: date,
            end_date: date,
            days: Decimal::ONE,
            reason: "trip".to_string(),
            status: crate::model::leave::LeaveStatus::Approved,
            manager_id: None,
        };
        store.insert_leave(leave).await.unwrap();

        let first = run_daily_sweep(&store, date, &settings).await.unwrap();
        assert_eq!(first.marked_absent, 1);
        assert_eq!(first.marked_on_leave, 1);
        assert_eq!(first.skipped_existing, 0);

        let second = run_daily_sweep(&store, date, &settings).await.unwrap();
        assert_eq!(second.marked_absent, 0);
        assert_eq!(second.marked_on_leave, 0);
        assert_eq!(second.skipped_existing, 2);

        assert_eq!(
            store.attendance_on(10, date).await.unwrap().unwrap().status,
            AttendanceStatus::Absent
        );
        assert_eq!(
            store.attendance_on(11, date).await.unwrap().unwrap().status,
            AttendanceStatus::OnLeave
        );
    }

    #[actix_web::test]
    async fn sweep_skips_weekends_and_holidays() {
        let store = seed_store();
        let settings = doc();

        let saturday = run_daily_sweep(&store, d(2026, 7, 4), &settings).await.unwrap();
        assert!(saturday.free_day);
        assert_eq!(saturday.considered, 0);

        store.seed_holiday(d(2026, 7, 6));
        let holiday = run_daily_sweep(&store, d(2026, 7, 6), &settings).await.unwrap();
        assert!(holiday.free_day);
        assert!(store.attendance_on(10, d(2026, 7, 6)).await.unwrap().is_none());
    }
}
