//! Regularization: an employee disputes a derived attendance record; an
//! approval patches exactly the fields the request names, nothing more.

use tracing::info;

use crate::audit::{self, AuditEvent};
use crate::error::{HrError, Result};
use crate::model::attendance::{AttendanceSource, NewAttendance};
use crate::model::regularization::{
    NewRegularization, RegularizationKind, RegularizationRequest, RegularizationStatus,
};
use crate::policy::{Action, Actor, authorize};
use crate::service::attendance::{derive_day, ensure_unlocked};
use crate::settings::SettingsDoc;
use crate::store::HrStore;

/// File a correction against one's own attendance date.
pub async fn request_regularization<S: HrStore>(
    store: &S,
    actor: &Actor,
    input: NewRegularization,
    doc: &SettingsDoc,
) -> Result<RegularizationRequest> {
    let rel = actor.relation_to(input.employee_id);
    authorize(&doc.work.policy_ctx(), Action::RequestRegularization, actor, rel)?;

    match input.kind {
        RegularizationKind::CheckIn if input.requested_check_in.is_none() => {
            return Err(HrError::validation("requested_check_in is required"));
        }
        RegularizationKind::CheckOut if input.requested_check_out.is_none() => {
            return Err(HrError::validation("requested_check_out is required"));
        }
        RegularizationKind::Both
            if input.requested_check_in.is_none() || input.requested_check_out.is_none() =>
        {
            return Err(HrError::validation(
                "both requested_check_in and requested_check_out are required",
            ));
        }
        RegularizationKind::StatusChange if input.requested_status.is_none() => {
            return Err(HrError::validation("requested_status is required"));
        }
        _ => {}
    }
    if input.reason.trim().is_empty() {
        return Err(HrError::validation("a reason is required"));
    }

    let request = store.insert_regularization(input).await?;

    audit::emit(AuditEvent {
        actor_id: actor.user_id,
        action: "regularization.request",
        entity: "regularization",
        entity_id: request.id,
        detail: format!("employee {} on {} ({})", request.employee_id, request.date, request.kind),
    });
    Ok(request)
}

/// Approve or reject. Approval applies only the fields implied by the
/// request kind to the attendance record, creating one if the date has none,
/// and stamps editor and reason. A resolved request cannot be resolved again.
pub async fn process_regularization<S: HrStore>(
    store: &S,
    actor: &Actor,
    request_id: u64,
    approve: bool,
    remarks: Option<String>,
    doc: &SettingsDoc,
) -> Result<RegularizationRequest> {
    let mut request = store
        .regularization_by_id(request_id)
        .await?
        .ok_or_else(|| HrError::not_found("Regularization request not found"))?;

    if request.status != RegularizationStatus::Pending {
        return Err(HrError::conflict("Request has already been resolved"));
    }

    let rel = actor.relation_to(request.employee_id);
    authorize(&doc.work.policy_ctx(), Action::ProcessRegularization, actor, rel)?;

    if !approve {
        request.status = RegularizationStatus::Rejected;
        request.reviewed_by = Some(actor.user_id);
        request.review_remarks = remarks;
        store.update_regularization(&request).await?;
        emit(actor, &request, "regularization.reject");
        return Ok(request);
    }

    let note = format!("regularization #{}: {}", request.id, request.reason);
    let existing = store.attendance_on(request.employee_id, request.date).await?;

    match existing {
        Some(mut rec) => {
            ensure_unlocked(&rec)?;
            apply_patch(&mut rec.check_in, &mut rec.check_out, &request);
            match request.kind {
                RegularizationKind::StatusChange => {
                    rec.status = request.requested_status.expect("validated at submission");
                }
                _ => {
                    let derived = derive_day(rec.date, rec.check_in, rec.check_out, &doc.work);
                    rec.status = derived.status;
                    rec.work_hours = derived.work_hours;
                    rec.overtime_minutes = derived.overtime_minutes;
                    rec.late_minutes = derived.late_minutes;
                }
            }
            rec.source = AttendanceSource::Adjusted;
            rec.edited_by = Some(actor.user_id);
            rec.edit_reason = Some(note);
            store.update_attendance(&rec).await?;
        }
        None => {
            let mut check_in = None;
            let mut check_out = None;
            apply_patch(&mut check_in, &mut check_out, &request);

            let derived = derive_day(request.date, check_in, check_out, &doc.work);
            let status = match request.kind {
                RegularizationKind::StatusChange => {
                    request.requested_status.expect("validated at submission")
                }
                _ => derived.status,
            };
            store
                .insert_attendance(NewAttendance {
                    employee_id: request.employee_id,
                    date: request.date,
                    check_in,
                    check_out,
                    status,
                    work_hours: derived.work_hours,
                    overtime_minutes: derived.overtime_minutes,
                    late_minutes: derived.late_minutes,
                    source: AttendanceSource::Adjusted,
                    edited_by: Some(actor.user_id),
                    edit_reason: Some(note),
                })
                .await?;
        }
    }

    request.status = RegularizationStatus::Approved;
    request.reviewed_by = Some(actor.user_id);
    request.review_remarks = remarks;
    store.update_regularization(&request).await?;

    info!(request_id = request.id, employee_id = request.employee_id, "regularization applied");
    emit(actor, &request, "regularization.approve");
    Ok(request)
}

fn apply_patch(
    check_in: &mut Option<chrono::NaiveTime>,
    check_out: &mut Option<chrono::NaiveTime>,
    request: &RegularizationRequest,
) {
    match request.kind {
        RegularizationKind::CheckIn => *check_in = request.requested_check_in,
        RegularizationKind::CheckOut => *check_out = request.requested_check_out,
        RegularizationKind::Both => {
            *check_in = request.requested_check_in;
            *check_out = request.requested_check_out;
        }
        RegularizationKind::StatusChange => {}
    }
}

fn emit(actor: &Actor, request: &RegularizationRequest, action: &'static str) {
    audit::emit(AuditEvent {
        actor_id: actor.user_id,
        action,
        entity: "regularization",
        entity_id: request.id,
        detail: format!("-> {}", request.status),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::attendance::AttendanceStatus;
    use crate::model::employee::EmployeeLite;
    use crate::model::role::Role;
    use crate::store::memory::MemStore;
    use chrono::{NaiveDate, NaiveTime};
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 7, day).unwrap()
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
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

    fn owner() -> Actor {
        Actor {
            user_id: 110,
            employee_id: Some(10),
            role: Role::Employee,
        }
    }

    fn hr() -> Actor {
        Actor {
            user_id: 130,
            employee_id: Some(30),
            role: Role::Hr,
        }
    }

    fn checkout_request() -> NewRegularization {
        NewRegularization {
            employee_id: 10,
            date: d(6),
            kind: RegularizationKind::CheckOut,
            requested_check_in: None,
            requested_check_out: Some(t(18, 30)),
            requested_status: None,
            reason: "forgot to clock out".to_string(),
        }
    }

    #[actix_web::test]
    async fn kind_and_fields_must_agree() {
        let store = seed_store();
        let doc = SettingsDoc::default();

        let mut bad = checkout_request();
        bad.requested_check_out = None;
        let err = request_regularization(&store, &owner(), bad, &doc).await.unwrap_err();
        assert!(matches!(err, HrError::Validation(_)));

        // Only one's own attendance can be disputed.
        let mut foreign = checkout_request();
        foreign.employee_id = 42;
        let err = request_regularization(&store, &owner(), foreign, &doc).await.unwrap_err();
        assert!(matches!(err, HrError::Forbidden(_)));
    }

    #[actix_web::test]
    async fn approval_patches_only_the_requested_fields() {
        let store = seed_store();
        let doc = SettingsDoc::default();

        // Half-day record from the correction pass: check-in, no check-out.
        crate::service::attendance::mark_attendance(
            &store,
            &Actor::system(),
            crate::service::attendance::MarkAttendance {
                employee_id: 10,
                date: d(6),
                check_in: Some(t(9, 0)),
                check_out: None,
                status: Some(AttendanceStatus::HalfDay),
                notes: None,
                source: crate::model::attendance::AttendanceSource::Biometric,
            },
            &doc,
        )
        .await
        .unwrap();

        let request = request_regularization(&store, &owner(), checkout_request(), &doc)
            .await
            .unwrap();
        let resolved = process_regularization(&store, &hr(), request.id, true, None, &doc)
            .await
            .unwrap();
        assert_eq!(resolved.status, RegularizationStatus::Approved);

        let rec = store.attendance_on(10, d(6)).await.unwrap().unwrap();
        assert_eq!(rec.check_in, Some(t(9, 0)));
        assert_eq!(rec.check_out, Some(t(18, 30)));
        assert_eq!(rec.status, AttendanceStatus::Present);
        assert_eq!(rec.work_hours, Some(Decimal::from_str("9.50").unwrap()));
        assert!(rec.edit_reason.as_deref().unwrap().contains("regularization"));

        // Resolving again is a conflict.
        let err = process_regularization(&store, &hr(), request.id, true, None, &doc)
            .await
            .unwrap_err();
        assert!(matches!(err, HrError::Conflict(_)));
    }

    #[actix_web::test]
    async fn approval_creates_a_record_when_none_exists() {
        let store = seed_store();
        let doc = SettingsDoc::default();

        let request = request_regularization(
            &store,
            &owner(),
            NewRegularization {
                employee_id: 10,
                date: d(7),
                kind: RegularizationKind::Both,
                requested_check_in: Some(t(9, 0)),
                requested_check_out: Some(t(18, 0)),
                requested_status: None,
                reason: "device offline".to_string(),
            },
            &doc,
        )
        .await
        .unwrap();

        process_regularization(&store, &hr(), request.id, true, None, &doc)
            .await
            .unwrap();

        let rec = store.attendance_on(10, d(7)).await.unwrap().unwrap();
        assert_eq!(rec.status, AttendanceStatus::Present);
        assert_eq!(rec.source, AttendanceSource::Adjusted);
    }

    #[actix_web::test]
    async fn rejection_touches_nothing_and_self_review_is_blocked() {
        let store = seed_store();
        let doc = SettingsDoc::default();

        let request = request_regularization(&store, &owner(), checkout_request(), &doc)
            .await
            .unwrap();

        // The owner cannot review their own request even as HR.
        let self_review = Actor {
            user_id: 110,
            employee_id: Some(10),
            role: Role::Hr,
        };
        let err = process_regularization(&store, &self_review, request.id, true, None, &doc)
            .await
            .unwrap_err();
        assert!(matches!(err, HrError::Forbidden(_)));

        let rejected =
            process_regularization(&store, &hr(), request.id, false, Some("no".to_string()), &doc)
                .await
                .unwrap();
        assert_eq!(rejected.status, RegularizationStatus::Rejected);
        assert!(store.attendance_on(10, d(6)).await.unwrap().is_none());
    }

    #[actix_web::test]
    async fn status_change_skips_rederivation() {
        let store = seed_store();
        let doc = SettingsDoc::default();

        let request = request_regularization(
            &store,
            &owner(),
            NewRegularization {
                employee_id: 10,
                date: d(8),
                kind: RegularizationKind::StatusChange,
                requested_check_in: None,
                requested_check_out: None,
                requested_status: Some(AttendanceStatus::Present),
                reason: "worked offsite".to_string(),
            },
            &doc,
        )
        .await
        .unwrap();

        process_regularization(&store, &hr(), request.id, true, None, &doc)
            .await
            .unwrap();

        let rec = store.attendance_on(10, d(8)).await.unwrap().unwrap();
        assert_eq!(rec.status, AttendanceStatus::Present);
        assert!(rec.check_in.is_none());
    }
}
