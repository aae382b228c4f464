//! Punch ingestion and deduplication, plus the pass that folds pending
//! punches into attendance records.
//!
//! Ingestion is best-effort and repeatable: a punch that fails to insert is
//! logged and counted, never escalated. The cuckoo filter answers "definitely
//! new" cheaply; a filter hit still gets confirmed against the store because
//! false positives are possible.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::audit::{self, AuditEvent};
use crate::error::{HrError, Result};
use crate::model::attendance::AttendanceSource;
use crate::model::punch::{IncomingPunch, PunchDirection, PunchStatus, RawPunch};
use crate::policy::{Action, Actor, Relation, authorize};
use crate::service::attendance::{MarkAttendance, mark_attendance};
use crate::settings::SettingsDoc;
use crate::store::HrStore;
use crate::utils::punch_filter;

/// How many would-be rows a dry run returns for operator review.
const DRY_RUN_SAMPLE: usize = 20;

#[derive(Debug, Default, Serialize, ToSchema)]
pub struct IngestReport {
    /// Identifies this ingestion run in the logs.
    #[schema(example = "5f8b2c1e-3d4a-4f6b-9c7d-2e1a0b9c8d7f")]
    pub run_id: String,

    pub received: u64,
    pub inserted: u64,
    pub duplicates: u64,
    pub failed: u64,
    pub dry_run: bool,
    /// Present only on dry runs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample: Option<Vec<IncomingPunch>>,
}

/// Deduplicate and store a batch of externally sourced punches.
///
/// A dry run performs the same dedup checks but persists nothing and returns
/// a sample of the rows that would be inserted.
pub async fn ingest_punches<S: HrStore>(
    store: &S,
    actor: &Actor,
    punches: Vec<IncomingPunch>,
    dry_run: bool,
    doc: &SettingsDoc,
) -> Result<IngestReport> {
    authorize(
        &doc.work.policy_ctx(),
        Action::IngestPunches,
        actor,
        Relation::Other,
    )?;

    let mut report = IngestReport {
        run_id: Uuid::new_v4().to_string(),
        received: punches.len() as u64,
        dry_run,
        sample: dry_run.then(Vec::new),
        ..Default::default()
    };

    for punch in punches {
        let key = punch_filter::punch_key(&punch.device_person_id, punch.punched_at, &punch.origin);

        if punch_filter::might_exist(&key)
            && store
                .punch_exists(&punch.device_person_id, punch.punched_at, &punch.origin)
                .await?
        {
            report.duplicates += 1;
            continue;
        }

        if dry_run {
            report.inserted += 1;
            if let Some(sample) = &mut report.sample {
                if sample.len() < DRY_RUN_SAMPLE {
                    sample.push(punch);
                }
            }
            continue;
        }

        match store.insert_punch(punch).await {
            Ok(_) => {
                punch_filter::insert(&key);
                report.inserted += 1;
            }
            // The unique index caught what the filter missed.
            Err(HrError::Conflict(_)) => {
                punch_filter::insert(&key);
                report.duplicates += 1;
            }
            Err(e) => {
                warn!(error = %e, "punch insert failed, skipping");
                report.failed += 1;
            }
        }
    }

    info!(
        run_id = %report.run_id,
        received = report.received,
        inserted = report.inserted,
        duplicates = report.duplicates,
        failed = report.failed,
        dry_run,
        "punch ingestion finished"
    );

    if !dry_run {
        audit::emit(AuditEvent {
            actor_id: actor.user_id,
            action: "punches.ingest",
            entity: "raw_punch",
            entity_id: 0,
            detail: format!("{} inserted, {} duplicates", report.inserted, report.duplicates),
        });
    }

    Ok(report)
}

#[derive(Debug, Default, Serialize, ToSchema)]
pub struct ProcessReport {
    pub punches: u64,
    pub employees_updated: u64,
    pub failed_punches: u64,
}

/// Fold a day's pending punches into attendance records.
///
/// Per employee: earliest inward punch becomes the check-in, latest outward
/// punch the check-out. Punches whose person id resolves to no employee, or
/// whose target record is locked, are marked `Failed`.
pub async fn process_pending<S: HrStore>(
    store: &S,
    actor: &Actor,
    date: NaiveDate,
    doc: &SettingsDoc,
) -> Result<ProcessReport> {
    authorize(
        &doc.work.policy_ctx(),
        Action::ProcessPunches,
        actor,
        Relation::Other,
    )?;

    let pending = store.pending_punches_on(date).await?;
    let mut report = ProcessReport {
        punches: pending.len() as u64,
        ..Default::default()
    };

    let mut by_person: BTreeMap<String, Vec<RawPunch>> = BTreeMap::new();
    for punch in pending {
        by_person
            .entry(punch.device_person_id.clone())
            .or_default()
            .push(punch);
    }

    for (person, punches) in by_person {
        let employee = match store.employee_by_code(&person).await? {
            Some(e) => e,
            None => {
                warn!(person = %person, "punches for unknown person id");
                for punch in &punches {
                    store.set_punch_status(punch.id, PunchStatus::Failed).await?;
                    report.failed_punches += 1;
                }
                continue;
            }
        };

        let (check_in, check_out) = clock_pair(&punches);

        let marked = mark_attendance(
            store,
            actor,
            MarkAttendance {
                employee_id: employee.id,
                date,
                check_in,
                check_out,
                status: None,
                notes: None,
                source: AttendanceSource::Biometric,
            },
            doc,
        )
        .await;

        let status = match marked {
            Ok(_) => {
                report.employees_updated += 1;
                PunchStatus::Processed
            }
            Err(e) => {
                warn!(employee_id = employee.id, error = %e, "punch fold failed");
                report.failed_punches += punches.len() as u64;
                PunchStatus::Failed
            }
        };

        for punch in &punches {
            store.set_punch_status(punch.id, status).await?;
        }
    }

    info!(
        date = %date,
        punches = report.punches,
        employees = report.employees_updated,
        failed = report.failed_punches,
        "pending punch processing finished"
    );
    Ok(report)
}

/// First inward and last outward punch of the day. `Auto` punches count for
/// both ends; a single lone punch yields only a check-in.
fn clock_pair(punches: &[RawPunch]) -> (Option<NaiveTime>, Option<NaiveTime>) {
    let check_in = punches
        .iter()
        .filter(|p| matches!(p.direction, PunchDirection::In | PunchDirection::Auto))
        .map(|p| p.punched_at.time())
        .min();

    let check_out = punches
        .iter()
        .filter(|p| matches!(p.direction, PunchDirection::Out | PunchDirection::Auto))
        .map(|p| p.punched_at.time())
        .max()
        .filter(|out| check_in.map_or(true, |cin| *out != cin));

    match (check_in, check_out) {
        (None, out @ Some(_)) => (out, None),
        pair => pair,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::employee::EmployeeLite;
    use crate::model::punch::PunchSource;
    use crate::model::role::Role;
    use crate::store::memory::MemStore;
    use chrono::NaiveDateTime;
    use rust_decimal::Decimal;

    fn dt(day: u32, h: u32, m: u32) -> NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(2026, 7, day)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn punch(person: &str, at: NaiveDateTime, direction: PunchDirection) -> IncomingPunch {
        IncomingPunch {
            device_person_id: person.to_string(),
            punched_at: at,
            direction,
            source: PunchSource::Biometric,
            origin: "10.0.4.17".to_string(),
        }
    }

    fn gateway() -> Actor {
        Actor {
            user_id: 2,
            employee_id: None,
            role: Role::ApiUser,
        }
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
        store
    }

    #[actix_web::test]
    async fn duplicates_are_dropped_not_errored() {
        let store = seed_store();
        let doc = SettingsDoc::default();
        let batch = vec![
            punch("EMP-10", dt(6, 9, 0), PunchDirection::In),
            punch("EMP-10", dt(6, 9, 0), PunchDirection::In),
            punch("EMP-10", dt(6, 18, 0), PunchDirection::Out),
        ];

        let report = ingest_punches(&store, &gateway(), batch.clone(), false, &doc)
            .await
            .unwrap();
        assert_eq!(report.inserted, 2);
        assert_eq!(report.duplicates, 1);
        assert_eq!(report.failed, 0);

        // A repeated delivery of the same batch inserts nothing new.
        let again = ingest_punches(&store, &gateway(), batch, false, &doc).await.unwrap();
        assert_eq!(again.inserted, 0);
        assert_eq!(again.duplicates, 3);
    }

    #[actix_web::test]
    async fn dry_run_persists_nothing() {
        let store = seed_store();
        let doc = SettingsDoc::default();
        let batch = vec![punch("EMP-10", dt(7, 9, 0), PunchDirection::In)];

        let report = ingest_punches(&store, &gateway(), batch.clone(), true, &doc)
            .await
            .unwrap();
        assert_eq!(report.inserted, 1);
        assert_eq!(report.sample.as_ref().unwrap().len(), 1);

        assert!(
            !store
                .punch_exists("EMP-10", dt(7, 9, 0), "10.0.4.17")
                .await
                .unwrap()
        );
    }

    #[actix_web::test]
    async fn pending_punches_become_an_attendance_record() {
        let store = seed_store();
        let doc = SettingsDoc::default();
        let date = chrono::NaiveDate::from_ymd_opt(2026, 7, 8).unwrap();
        let batch = vec![
            punch("EMP-10", dt(8, 9, 2), PunchDirection::In),
            punch("EMP-10", dt(8, 13, 0), PunchDirection::Auto),
            punch("EMP-10", dt(8, 18, 4), PunchDirection::Out),
            punch("GHOST-1", dt(8, 10, 0), PunchDirection::In),
        ];
        ingest_punches(&store, &gateway(), batch, false, &doc).await.unwrap();

        let report = process_pending(&store, &Actor::system(), date, &doc).await.unwrap();
        assert_eq!(report.punches, 4);
        assert_eq!(report.employees_updated, 1);
        assert_eq!(report.failed_punches, 1);

        let rec = store.attendance_on(10, date).await.unwrap().unwrap();
        assert_eq!(rec.check_in, Some(NaiveTime::from_hms_opt(9, 2, 0).unwrap()));
        assert_eq!(rec.check_out, Some(NaiveTime::from_hms_opt(18, 4, 0).unwrap()));
        assert_eq!(rec.source, AttendanceSource::Biometric);

        // Nothing stays pending for that day.
        assert!(store.pending_punches_on(date).await.unwrap().is_empty());
    }
}
