//! Leave lifecycle: submission, two-level approval, cancellation and the
//! per-year balance ledger.
//!
//! Approval ordering matters for crash safety: covered attendance days are
//! verified writable first, then written, then the balance is consumed, and
//! the request status flips last. The attendance writes are upserts, so a
//! re-run after a partial failure converges instead of double-writing.

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use tracing::info;

use crate::audit::{self, AuditEvent};
use crate::calendar;
use crate::error::{HrError, Result};
use crate::model::attendance::{AttendanceSource, AttendanceStatus, NewAttendance};
use crate::model::leave::{LeaveBalance, LeaveRequest, LeaveStatus, NewLeaveRequest};
use crate::model::role::Role;
use crate::policy::{Action, Actor, Relation, authorize};
use crate::settings::SettingsDoc;
use crate::store::HrStore;

#[derive(Debug, Clone)]
pub struct SubmitLeave {
    pub employee_id: u64,
    pub leave_type: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: String,
}

/// Submit a request. The day count is recomputed server-side and checked
/// against the year's balance, which is materialized lazily on first use.
pub async fn submit_leave<S: HrStore>(
    store: &S,
    actor: &Actor,
    input: SubmitLeave,
    doc: &SettingsDoc,
) -> Result<LeaveRequest> {
    let employee = store
        .employee_by_id(input.employee_id)
        .await?
        .ok_or_else(|| HrError::not_found("Employee not found"))?;

    let rel = actor.relation_to(employee.id);
    authorize(&doc.work.policy_ctx(), Action::SubmitLeave, actor, rel)?;

    if input.start_date > input.end_date {
        return Err(HrError::validation("start_date cannot be after end_date"));
    }
    if input.leave_type.trim().is_empty() {
        return Err(HrError::validation("leave_type is required"));
    }

    let days = Decimal::from(calendar::working_days_between(
        input.start_date,
        input.end_date,
        &doc.work.weekend_days,
    ));
    if days.is_zero() {
        return Err(HrError::validation(
            "requested range contains no working days",
        ));
    }

    let year = input.start_date.year();
    let balance =
        materialize_balance(store, employee.id, &input.leave_type, year, doc).await?;
    if balance.remaining < days {
        return Err(HrError::validation(format!(
            "insufficient {} balance: {} remaining, {} requested",
            input.leave_type, balance.remaining, days
        )));
    }

    // Route past the manager level when there is no manager, or the manager
    // is HR/admin and will see it at the final level anyway.
    let manager = match employee.manager_id {
        Some(id) => store.employee_by_id(id).await?,
        None => None,
    };
    let status = match &manager {
        Some(m) if Role::from_id(m.role_id) == Some(Role::Employee) => LeaveStatus::PendingManager,
        _ => LeaveStatus::PendingHr,
    };

    let request = store
        .insert_leave(NewLeaveRequest {
            employee_id: employee.id,
            leave_type: input.leave_type,
            start_date: input.start_date,
            end_date: input.end_date,
            days,
            reason: input.reason,
            status,
            manager_id: manager.map(|m| m.id),
        })
        .await?;

    audit::emit(AuditEvent {
        actor_id: actor.user_id,
        action: "leave.submit",
        entity: "leave_request",
        entity_id: request.id,
        detail: format!(
            "employee {} {} {}..{} ({} days)",
            request.employee_id, request.leave_type, request.start_date, request.end_date, days
        ),
    });

    Ok(request)
}

/// Manager-level approve/reject. Only the matching manager may act, and only
/// while the request sits at the manager level.
pub async fn manager_decide<S: HrStore>(
    store: &S,
    actor: &Actor,
    request_id: u64,
    approve: bool,
    remarks: Option<String>,
    doc: &SettingsDoc,
) -> Result<LeaveRequest> {
    let mut request = fetch_request(store, request_id).await?;

    if request.status != LeaveStatus::PendingManager {
        return Err(HrError::conflict("Request is not awaiting a manager decision"));
    }

    let rel = if actor.employee_id.is_some() && actor.employee_id == request.manager_id {
        Relation::Report
    } else {
        actor.relation_to(request.employee_id)
    };
    authorize(&doc.work.policy_ctx(), Action::ManagerDecideLeave, actor, rel)?;

    request.status = if approve {
        LeaveStatus::PendingHr
    } else {
        LeaveStatus::Rejected
    };
    request.remarks = remarks;
    store.update_leave(&request).await?;

    audit::emit(AuditEvent {
        actor_id: actor.user_id,
        action: if approve { "leave.manager_approve" } else { "leave.manager_reject" },
        entity: "leave_request",
        entity_id: request.id,
        detail: format!("-> {}", request.status),
    });

    Ok(request)
}

/// Final HR/admin decision. Self-approval is blocked by the policy table;
/// an HR request raised by another HR account escalates to admin.
pub async fn hr_decide<S: HrStore>(
    store: &S,
    actor: &Actor,
    request_id: u64,
    approve: bool,
    remarks: Option<String>,
    doc: &SettingsDoc,
) -> Result<LeaveRequest> {
    let mut request = fetch_request(store, request_id).await?;

    if !request.status.is_pre_terminal() {
        return Err(HrError::conflict("Request has already been resolved"));
    }

    let rel = actor.relation_to(request.employee_id);
    authorize(&doc.work.policy_ctx(), Action::FinalizeLeave, actor, rel)?;

    if actor.role == Role::Hr {
        let requester = store
            .employee_by_id(request.employee_id)
            .await?
            .ok_or_else(|| HrError::not_found("Employee not found"))?;
        if Role::from_id(requester.role_id) == Some(Role::Hr) {
            return Err(HrError::forbidden(
                "An HR request must be finalized by an admin",
            ));
        }
    }

    if !approve {
        request.status = LeaveStatus::Rejected;
        request.approver_id = actor.employee_id;
        request.remarks = remarks;
        store.update_leave(&request).await?;
        emit_decision(actor, &request, "leave.reject");
        return Ok(request);
    }

    // Verify every covered day is writable before touching anything.
    let dates = calendar::dates_between(request.start_date, request.end_date);
    let mut existing = Vec::with_capacity(dates.len());
    for date in &dates {
        let rec = store.attendance_on(request.employee_id, *date).await?;
        if let Some(rec) = &rec {
            if rec.is_locked {
                return Err(HrError::conflict(format!(
                    "Attendance for {} is locked by a closed payroll",
                    date
                )));
            }
        }
        existing.push(rec);
    }

    let mut balance = materialize_balance(
        store,
        request.employee_id,
        &request.leave_type,
        request.start_date.year(),
        doc,
    )
    .await?;
    if balance.remaining < request.days {
        return Err(HrError::validation(format!(
            "insufficient {} balance at approval time",
            request.leave_type
        )));
    }

    let note = format!("leave request #{} approved", request.id);
    for (date, rec) in dates.iter().zip(existing) {
        match rec {
            Some(mut rec) => {
                rec.status = AttendanceStatus::OnLeave;
                rec.source = AttendanceSource::Adjusted;
                rec.edited_by = Some(actor.user_id);
                rec.edit_reason = Some(note.clone());
                store.update_attendance(&rec).await?;
            }
            None => {
                let mut row = NewAttendance::status_only(
                    request.employee_id,
                    *date,
                    AttendanceStatus::OnLeave,
                    AttendanceSource::Adjusted,
                );
                row.edited_by = Some(actor.user_id);
                row.edit_reason = Some(note.clone());
                store.insert_attendance(row).await?;
            }
        }
    }

    balance.consume(request.days);
    store.save_leave_balance(&balance).await?;

    request.status = LeaveStatus::Approved;
    request.approver_id = actor.employee_id;
    request.remarks = remarks;
    store.update_leave(&request).await?;

    info!(
        request_id = request.id,
        employee_id = request.employee_id,
        days = %request.days,
        "leave approved"
    );
    emit_decision(actor, &request, "leave.approve");
    Ok(request)
}

/// Owner withdrawal / privileged cancellation. Cancelling an approved
/// request reverses the balance consumption.
pub async fn cancel_leave<S: HrStore>(
    store: &S,
    actor: &Actor,
    request_id: u64,
    remarks: Option<String>,
    doc: &SettingsDoc,
) -> Result<LeaveRequest> {
    let mut request = fetch_request(store, request_id).await?;

    let rel = actor.relation_to(request.employee_id);
    authorize(&doc.work.policy_ctx(), Action::CancelLeave, actor, rel)?;

    match request.status {
        LeaveStatus::Approved => {
            restore_balance(store, &request, doc).await?;
            request.status = LeaveStatus::Cancelled;
        }
        s if s.is_pre_terminal() => {
            request.status = if rel == Relation::Own {
                LeaveStatus::Withdrawn
            } else {
                LeaveStatus::Cancelled
            };
        }
        _ => return Err(HrError::conflict("Request has already been resolved")),
    }

    request.remarks = remarks;
    store.update_leave(&request).await?;
    emit_decision(actor, &request, "leave.cancel");
    Ok(request)
}

#[derive(Debug, Clone)]
pub struct EditLeave {
    pub leave_type: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub reason: Option<String>,
}

/// Owner-only edit while the request is still pending. Days are recomputed
/// and re-checked against the balance.
pub async fn edit_leave<S: HrStore>(
    store: &S,
    actor: &Actor,
    request_id: u64,
    edit: EditLeave,
    doc: &SettingsDoc,
) -> Result<LeaveRequest> {
    let mut request = fetch_request(store, request_id).await?;

    let rel = actor.relation_to(request.employee_id);
    authorize(&doc.work.policy_ctx(), Action::EditLeave, actor, rel)?;

    if !request.status.is_pre_terminal() {
        return Err(HrError::conflict("Only a pending request can be edited"));
    }

    if let Some(t) = edit.leave_type {
        request.leave_type = t;
    }
    if let Some(s) = edit.start_date {
        request.start_date = s;
    }
    if let Some(e) = edit.end_date {
        request.end_date = e;
    }
    if let Some(r) = edit.reason {
        request.reason = r;
    }

    if request.start_date > request.end_date {
        return Err(HrError::validation("start_date cannot be after end_date"));
    }

    request.days = Decimal::from(calendar::working_days_between(
        request.start_date,
        request.end_date,
        &doc.work.weekend_days,
    ));
    if request.days.is_zero() {
        return Err(HrError::validation(
            "requested range contains no working days",
        ));
    }

    let balance = materialize_balance(
        store,
        request.employee_id,
        &request.leave_type,
        request.start_date.year(),
        doc,
    )
    .await?;
    if balance.remaining < request.days {
        return Err(HrError::validation(format!(
            "insufficient {} balance: {} remaining, {} requested",
            request.leave_type, balance.remaining, request.days
        )));
    }

    store.update_leave(&request).await?;
    Ok(request)
}

/// Owner delete while pending; admins may delete in any state (approved
/// deletions give the balance back first).
pub async fn delete_leave<S: HrStore>(
    store: &S,
    actor: &Actor,
    request_id: u64,
    doc: &SettingsDoc,
) -> Result<()> {
    let request = fetch_request(store, request_id).await?;

    let rel = actor.relation_to(request.employee_id);
    authorize(&doc.work.policy_ctx(), Action::DeleteLeave, actor, rel)?;

    if actor.role != Role::Admin && !request.status.is_pre_terminal() {
        return Err(HrError::conflict("Only a pending request can be deleted"));
    }

    if request.status == LeaveStatus::Approved {
        restore_balance(store, &request, doc).await?;
    }

    store.delete_leave(request_id).await?;
    audit::emit(AuditEvent {
        actor_id: actor.user_id,
        action: "leave.delete",
        entity: "leave_request",
        entity_id: request_id,
        detail: format!("employee {}", request.employee_id),
    });
    Ok(())
}

/// Apply a changed annual limit to every materialized balance of the type.
/// `used` is kept; `remaining` clamps at zero.
pub async fn reconfigure_leave_limit<S: HrStore>(
    store: &S,
    actor: &Actor,
    leave_type: &str,
    year: i32,
    new_total: Decimal,
    doc: &SettingsDoc,
) -> Result<u64> {
    authorize(
        &doc.work.policy_ctx(),
        Action::ReconfigureLeaveLimit,
        actor,
        Relation::Other,
    )?;

    if new_total < Decimal::ZERO {
        return Err(HrError::validation("limit cannot be negative"));
    }

    let mut updated = 0;
    for mut balance in store.balances_for_type(leave_type, year).await? {
        balance.reconfigure(new_total);
        store.save_leave_balance(&balance).await?;
        updated += 1;
    }

    info!(leave_type, year, %new_total, updated, "leave limit reconfigured");
    Ok(updated)
}

async fn fetch_request<S: HrStore>(store: &S, id: u64) -> Result<LeaveRequest> {
    store
        .leave_by_id(id)
        .await?
        .ok_or_else(|| HrError::not_found("Leave request not found"))
}

/// Balance resolution on first reference: explicit per-type limit, then the
/// legacy aggregate limit, then the hard fallback.
async fn materialize_balance<S: HrStore>(
    store: &S,
    employee_id: u64,
    leave_type: &str,
    year: i32,
    doc: &SettingsDoc,
) -> Result<LeaveBalance> {
    if let Some(balance) = store.leave_balance(employee_id, leave_type, year).await? {
        return Ok(balance);
    }
    let balance = LeaveBalance::fresh(
        employee_id,
        leave_type,
        year,
        doc.leave.limit_for(leave_type),
    );
    store.save_leave_balance(&balance).await?;
    Ok(balance)
}

async fn restore_balance<S: HrStore>(
    store: &S,
    request: &LeaveRequest,
    doc: &SettingsDoc,
) -> Result<()> {
    let mut balance = materialize_balance(
        store,
        request.employee_id,
        &request.leave_type,
        request.start_date.year(),
        doc,
    )
    .await?;
    balance.restore(request.days);
    store.save_leave_balance(&balance).await
}

fn emit_decision(actor: &Actor, request: &LeaveRequest, action: &'static str) {
    audit::emit(AuditEvent {
        actor_id: actor.user_id,
        action,
        entity: "leave_request",
        entity_id: request.id,
        detail: format!("-> {}", request.status),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::employee::EmployeeLite;
    use crate::store::memory::MemStore;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, m, day).unwrap()
    }

    fn employee(id: u64, role: Role, manager_id: Option<u64>) -> EmployeeLite {
        EmployeeLite {
            id,
            name: format!("employee-{}", id),
            monthly_salary: Decimal::from(30_000),
            manager_id,
            role_id: role as u8,
            active: true,
        }
    }

    fn actor_for(employee_id: u64, role: Role) -> Actor {
        Actor {
            user_id: 100 + employee_id,
            employee_id: Some(employee_id),
            role,
        }
    }

    /// 10 reports to manager 42 (plain employee); 30 is HR, 99 is admin.
    fn seed_store() -> MemStore {
        let store = MemStore::new();
        store.seed_employee(employee(10, Role::Employee, Some(42)), "EMP-10");
        store.seed_employee(employee(42, Role::Employee, None), "EMP-42");
        store.seed_employee(employee(30, Role::Hr, None), "EMP-30");
        store.seed_employee(employee(31, Role::Hr, None), "EMP-31");
        store.seed_employee(employee(99, Role::Admin, None), "EMP-99");
        store
    }

    fn submit_input(employee_id: u64) -> SubmitLeave {
        SubmitLeave {
            employee_id,
            leave_type: "annual".to_string(),
            // Mon..Wed
            start_date: d(7, 6),
            end_date: d(7, 8),
            reason: "family travel".to_string(),
        }
    }

    #[actix_web::test]
    async fn submission_routes_through_the_manager() {
        let store = seed_store();
        let doc = SettingsDoc::default();

        let request = submit_leave(&store, &actor_for(10, Role::Employee), submit_input(10), &doc)
            .await
            .unwrap();
        assert_eq!(request.status, LeaveStatus::PendingManager);
        assert_eq!(request.manager_id, Some(42));
        assert_eq!(request.days, Decimal::from(3));

        // No manager: straight to HR.
        let request = submit_leave(&store, &actor_for(42, Role::Employee), submit_input(42), &doc)
            .await
            .unwrap();
        assert_eq!(request.status, LeaveStatus::PendingHr);
    }

    #[actix_web::test]
    async fn day_count_is_recomputed_not_trusted() {
        let store = seed_store();
        let doc = SettingsDoc::default();

        // Fri..Mon spans a weekend: 2 working days.
        let request = submit_leave(
            &store,
            &actor_for(10, Role::Employee),
            SubmitLeave {
                employee_id: 10,
                leave_type: "annual".to_string(),
                start_date: d(7, 10),
                end_date: d(7, 13),
                reason: "long weekend".to_string(),
            },
            &doc,
        )
        .await
        .unwrap();
        assert_eq!(request.days, Decimal::from(2));

        // A weekend-only range has nothing to take.
        let err = submit_leave(
            &store,
            &actor_for(10, Role::Employee),
            SubmitLeave {
                employee_id: 10,
                leave_type: "annual".to_string(),
                start_date: d(7, 4),
                end_date: d(7, 5),
                reason: "weekend".to_string(),
            },
            &doc,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, HrError::Validation(_)));
    }

    #[actix_web::test]
    async fn insufficient_balance_rejects_submission() {
        let store = seed_store();
        let doc = SettingsDoc::default();
        store
            .save_leave_balance(&LeaveBalance {
                employee_id: 10,
                leave_type: "annual".to_string(),
                year: 2026,
                total: Decimal::from(2),
                used: Decimal::ZERO,
                remaining: Decimal::from(2),
            })
            .await
            .unwrap();

        let err = submit_leave(&store, &actor_for(10, Role::Employee), submit_input(10), &doc)
            .await
            .unwrap_err();
        assert!(matches!(err, HrError::Validation(_)));
    }

    #[actix_web::test]
    async fn approval_round_trip_writes_and_reverses() {
        let store = seed_store();
        let doc = SettingsDoc::default();

        let request = submit_leave(&store, &actor_for(10, Role::Employee), submit_input(10), &doc)
            .await
            .unwrap();

        // Wrong manager is rejected.
        let err = manager_decide(&store, &actor_for(30, Role::Hr), request.id, true, None, &doc)
            .await
            .unwrap_err();
        assert!(matches!(err, HrError::Forbidden(_)));

        manager_decide(&store, &actor_for(42, Role::Employee), request.id, true, None, &doc)
            .await
            .unwrap();

        let approved = hr_decide(&store, &actor_for(30, Role::Hr), request.id, true, None, &doc)
            .await
            .unwrap();
        assert_eq!(approved.status, LeaveStatus::Approved);

        // Exactly one on-leave record per covered calendar day.
        for day in [d(7, 6), d(7, 7), d(7, 8)] {
            let rec = store.attendance_on(10, day).await.unwrap().unwrap();
            assert_eq!(rec.status, AttendanceStatus::OnLeave);
        }
        assert!(store.attendance_on(10, d(7, 9)).await.unwrap().is_none());

        let balance = store.leave_balance(10, "annual", 2026).await.unwrap().unwrap();
        assert_eq!(balance.used, Decimal::from(3));
        assert_eq!(balance.remaining, balance.total - balance.used);

        // Cancelling the approved request restores the ledger.
        cancel_leave(&store, &actor_for(10, Role::Employee), request.id, None, &doc)
            .await
            .unwrap();
        let balance = store.leave_balance(10, "annual", 2026).await.unwrap().unwrap();
        assert_eq!(balance.used, Decimal::ZERO);
        assert_eq!(balance.remaining, balance.total);
    }

    #[actix_web::test]
    async fn approval_is_never_self_service() {
        let store = seed_store();
        let doc = SettingsDoc::default();

        let request = submit_leave(&store, &actor_for(30, Role::Hr), submit_input(30), &doc)
            .await
            .unwrap();
        assert_eq!(request.status, LeaveStatus::PendingHr);

        // Own request.
        let err = hr_decide(&store, &actor_for(30, Role::Hr), request.id, true, None, &doc)
            .await
            .unwrap_err();
        assert!(matches!(err, HrError::Forbidden(_)));

        // A fellow HR account must escalate to admin.
        let err = hr_decide(&store, &actor_for(31, Role::Hr), request.id, true, None, &doc)
            .await
            .unwrap_err();
        assert!(matches!(err, HrError::Forbidden(_)));

        let approved = hr_decide(&store, &actor_for(99, Role::Admin), request.id, true, None, &doc)
            .await
            .unwrap();
        assert_eq!(approved.status, LeaveStatus::Approved);
    }

    #[actix_web::test]
    async fn owner_withdrawal_and_resolution_guards() {
        let store = seed_store();
        let doc = SettingsDoc::default();

        let request = submit_leave(&store, &actor_for(10, Role::Employee), submit_input(10), &doc)
            .await
            .unwrap();

        let withdrawn =
            cancel_leave(&store, &actor_for(10, Role::Employee), request.id, None, &doc)
                .await
                .unwrap();
        assert_eq!(withdrawn.status, LeaveStatus::Withdrawn);

        // Already resolved: neither cancel nor decide may run again.
        let err = cancel_leave(&store, &actor_for(10, Role::Employee), request.id, None, &doc)
            .await
            .unwrap_err();
        assert!(matches!(err, HrError::Conflict(_)));
        let err = hr_decide(&store, &actor_for(99, Role::Admin), request.id, true, None, &doc)
            .await
            .unwrap_err();
        assert!(matches!(err, HrError::Conflict(_)));
    }

    #[actix_web::test]
    async fn approval_fails_whole_when_a_day_is_locked() {
        let store = seed_store();
        let doc = SettingsDoc::default();

        let request = submit_leave(&store, &actor_for(42, Role::Employee), submit_input(42), &doc)
            .await
            .unwrap();

        // One covered day already locked by payroll close.
        store
            .insert_attendance(NewAttendance::status_only(
                42,
                d(7, 7),
                AttendanceStatus::Present,
                AttendanceSource::Manual,
            ))
            .await
            .unwrap();
        store.lock_month(7, 2026).await.unwrap();

        let err = hr_decide(&store, &actor_for(30, Role::Hr), request.id, true, None, &doc)
            .await
            .unwrap_err();
        assert!(matches!(err, HrError::Conflict(_)));

        // Nothing was consumed and no day was written.
        let balance = store.leave_balance(42, "annual", 2026).await.unwrap().unwrap();
        assert_eq!(balance.used, Decimal::ZERO);
        assert!(store.attendance_on(42, d(7, 6)).await.unwrap().is_none());
    }

    #[actix_web::test]
    async fn reconfigure_keeps_used_and_clamps_remaining() {
        let store = seed_store();
        let doc = SettingsDoc::default();
        store
            .save_leave_balance(&LeaveBalance {
                employee_id: 10,
                leave_type: "annual".to_string(),
                year: 2026,
                total: Decimal::from(12),
                used: Decimal::from(5),
                remaining: Decimal::from(7),
            })
            .await
            .unwrap();

        let updated = reconfigure_leave_limit(
            &store,
            &actor_for(99, Role::Admin),
            "annual",
            2026,
            Decimal::from(3),
            &doc,
        )
        .await
        .unwrap();
        assert_eq!(updated, 1);

        let balance = store.leave_balance(10, "annual", 2026).await.unwrap().unwrap();
        assert_eq!(balance.total, Decimal::from(3));
        assert_eq!(balance.used, Decimal::from(5));
        assert_eq!(balance.remaining, Decimal::ZERO);
    }
}
