use crate::error::{HrError, Result};
use crate::model::role::Role;

/// Identity attached to every core operation. Built from the verified token
/// for HTTP callers; scheduled jobs run as [`Actor::system`].
#[derive(Debug, Clone, Copy)]
pub struct Actor {
    pub user_id: u64,
    pub employee_id: Option<u64>,
    pub role: Role,
}

impl Actor {
    pub fn system() -> Self {
        Self {
            user_id: 0,
            employee_id: None,
            role: Role::System,
        }
    }

    /// Relationship between this actor and the employee a resource belongs to.
    pub fn relation_to(&self, employee_id: u64) -> Relation {
        match self.employee_id {
            Some(own) if own == employee_id => Relation::Own,
            _ => Relation::Other,
        }
    }
}

/// How the actor stands to the resource's owning employee.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Own,
    /// Actor is the designated manager on the resource.
    Report,
    Other,
}

/// Every policy-gated operation in the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    IngestPunches,
    ProcessPunches,
    MarkAttendance,
    UpdateAttendance,
    ViewAttendance,
    LockAttendance,
    SubmitLeave,
    ManagerDecideLeave,
    FinalizeLeave,
    CancelLeave,
    EditLeave,
    DeleteLeave,
    RequestRegularization,
    ProcessRegularization,
    GeneratePayroll,
    PreviewPayroll,
    MarkPayrollPaid,
    CancelBatch,
    EditSlip,
    ReconfigureLeaveLimit,
}

/// Settings-derived switches consulted by the table.
#[derive(Debug, Clone, Copy)]
pub struct PolicyCtx {
    pub allow_self_clock_in: bool,
}

/// Single authorization table for the whole core, keyed by
/// (operation, actor role, resource relationship). Services evaluate it once
/// at entry instead of re-deriving role checks inline.
///
/// Two rules need request state the table cannot see and stay in the
/// services: a manager decision must come from the matching `manager_id`,
/// and HR may not finalize a request raised by another HR account.
pub fn authorize(ctx: &PolicyCtx, action: Action, actor: &Actor, rel: Relation) -> Result<()> {
    use Action::*;
    use Relation::*;
    use Role::*;

    let allowed = match (action, actor.role, rel) {
        (IngestPunches | ProcessPunches, Admin | Hr | System | ApiUser, _) => true,

        // HR never touches its own attendance; only an admin may.
        (MarkAttendance | UpdateAttendance, Admin, _) => true,
        (MarkAttendance | UpdateAttendance, Hr, Other | Report) => true,
        (MarkAttendance | UpdateAttendance, System, _) => true,
        (MarkAttendance, Employee, Own) => ctx.allow_self_clock_in,

        (ViewAttendance, Admin | Hr | System, _) => true,
        (ViewAttendance, _, Own) => true,

        (LockAttendance, Admin | System, _) => true,

        (ReconfigureLeaveLimit, Admin, _) => true,

        (SubmitLeave, _, Own) => actor.employee_id.is_some(),
        (SubmitLeave, Admin, Other) => true,

        (ManagerDecideLeave, _, Report) => true,

        (FinalizeLeave, Admin | Hr, Other | Report) => true,

        (CancelLeave, Admin, _) => true,
        (CancelLeave, _, Own) => true,

        (EditLeave, _, Own) => true,

        (DeleteLeave, Admin, _) => true,
        (DeleteLeave, _, Own) => true,

        (RequestRegularization, _, Own) => actor.employee_id.is_some(),

        (ProcessRegularization, Admin | Hr, Other | Report) => true,

        (GeneratePayroll | MarkPayrollPaid | CancelBatch | EditSlip, Admin, _) => true,

        (PreviewPayroll, Admin | Hr, _) => true,

        _ => false,
    };

    if allowed {
        Ok(())
    } else {
        Err(HrError::forbidden(format!(
            "{:?} is not permitted for this actor",
            action
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor(role: Role, employee_id: Option<u64>) -> Actor {
        Actor {
            user_id: 9,
            employee_id,
            role,
        }
    }

    const CTX: PolicyCtx = PolicyCtx {
        allow_self_clock_in: true,
    };

    #[test]
    fn employee_marks_own_attendance_only_when_enabled() {
        let emp = actor(Role::Employee, Some(10));
        assert!(authorize(&CTX, Action::MarkAttendance, &emp, Relation::Own).is_ok());

        let disabled = PolicyCtx {
            allow_self_clock_in: false,
        };
        assert!(authorize(&disabled, Action::MarkAttendance, &emp, Relation::Own).is_err());
        assert!(authorize(&CTX, Action::MarkAttendance, &emp, Relation::Other).is_err());
    }

    #[test]
    fn hr_cannot_touch_own_attendance() {
        let hr = actor(Role::Hr, Some(11));
        assert!(authorize(&CTX, Action::MarkAttendance, &hr, Relation::Own).is_err());
        assert!(authorize(&CTX, Action::MarkAttendance, &hr, Relation::Other).is_ok());

        let admin = actor(Role::Admin, Some(12));
        assert!(authorize(&CTX, Action::MarkAttendance, &admin, Relation::Own).is_ok());
    }

    #[test]
    fn leave_finalization_is_never_self_service() {
        let hr = actor(Role::Hr, Some(11));
        assert!(authorize(&CTX, Action::FinalizeLeave, &hr, Relation::Own).is_err());
        assert!(authorize(&CTX, Action::FinalizeLeave, &hr, Relation::Other).is_ok());

        let emp = actor(Role::Employee, Some(10));
        assert!(authorize(&CTX, Action::FinalizeLeave, &emp, Relation::Other).is_err());
    }

    #[test]
    fn payroll_is_admin_only() {
        let hr = actor(Role::Hr, Some(11));
        let admin = actor(Role::Admin, None);
        assert!(authorize(&CTX, Action::GeneratePayroll, &hr, Relation::Other).is_err());
        assert!(authorize(&CTX, Action::GeneratePayroll, &admin, Relation::Other).is_ok());
        assert!(authorize(&CTX, Action::PreviewPayroll, &hr, Relation::Other).is_ok());
        assert!(authorize(&CTX, Action::MarkPayrollPaid, &hr, Relation::Other).is_err());
    }

    #[test]
    fn sweep_runs_as_system() {
        let sys = Actor::system();
        assert!(authorize(&CTX, Action::MarkAttendance, &sys, Relation::Other).is_ok());
        assert!(authorize(&CTX, Action::LockAttendance, &sys, Relation::Other).is_ok());
    }
}
