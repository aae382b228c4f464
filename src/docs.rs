use crate::api::attendance::{LockMonth, MarkAttendance, UpdateAttendance};
use crate::api::leave::{
    CancelLeave, CreateLeave, DecideLeave, DecisionLevel, LeaveListResponse, ReconfigureLimit,
    UpdateLeave,
};
use crate::api::payroll::{BatchDetail, CreatePayroll, PreviewPayroll, UpdateSlip};
use crate::api::punches::{IngestPunches, ProcessPunches};
use crate::api::regularization::{CreateRegularization, ReviewRemarks};
use crate::model::attendance::{AttendanceRecord, AttendanceStatus, MonthSummary};
use crate::model::leave::{LeaveBalance, LeaveRequest, LeaveStatus};
use crate::model::payroll::{PayrollBatch, SalarySlip};
use crate::model::punch::{IncomingPunch, RawPunch};
use crate::model::regularization::{RegularizationKind, RegularizationRequest};
use crate::service::ingest::{IngestReport, ProcessReport};
use crate::service::payroll::{PaidReport, PayrollRun, SlipFailure, SlipFigures};
use utoipa::Modify;
use utoipa::OpenApi;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Workpay API",
        version = "1.0.0",
        description = r#"
## Attendance & Payroll Core

Consolidates raw time-clock events into daily attendance facts, reconciles
them against leave, and derives monthly payroll batches with deterministic,
auditable salary math.

### 🔹 Key Features
- **Punch Ingestion**
  - Deduplicated intake of raw clock events, with a dry-run mode
- **Attendance**
  - Manual marking, corrections, month summaries and payroll locking
- **Leave Management**
  - Submission, two-level approval, cancellation and balance ledgers
- **Regularization**
  - Employee-initiated corrections to derived attendance records
- **Payroll**
  - Batch generation, previews, slip corrections and payout closing

### 🔐 Security
All endpoints are protected using **JWT Bearer authentication**. Tokens are
issued by the identity service; authorization inside is role- and
ownership-based.

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::api::punches::ingest_punches,
        crate::api::punches::process_punches,

        crate::api::attendance::mark_attendance,
        crate::api::attendance::update_attendance,
        crate::api::attendance::lock_attendance,
        crate::api::attendance::attendance_summary,

        crate::api::leave::create_leave,
        crate::api::leave::leave_list,
        crate::api::leave::get_leave,
        crate::api::leave::update_leave,
        crate::api::leave::delete_leave,
        crate::api::leave::approve_leave,
        crate::api::leave::reject_leave,
        crate::api::leave::cancel_leave,
        crate::api::leave::reconfigure_limit,

        crate::api::regularization::create_regularization,
        crate::api::regularization::approve_regularization,
        crate::api::regularization::reject_regularization,

        crate::api::payroll::create_payroll,
        crate::api::payroll::preview_payroll,
        crate::api::payroll::get_payroll,
        crate::api::payroll::pay_payroll,
        crate::api::payroll::cancel_payroll,
        crate::api::payroll::update_slip
    ),
    components(
        schemas(
            IngestPunches,
            ProcessPunches,
            IncomingPunch,
            RawPunch,
            IngestReport,
            ProcessReport,
            MarkAttendance,
            UpdateAttendance,
            LockMonth,
            AttendanceRecord,
            AttendanceStatus,
            MonthSummary,
            CreateLeave,
            UpdateLeave,
            DecideLeave,
            DecisionLevel,
            CancelLeave,
            ReconfigureLimit,
            LeaveRequest,
            LeaveStatus,
            LeaveBalance,
            LeaveListResponse,
            CreateRegularization,
            ReviewRemarks,
            RegularizationKind,
            RegularizationRequest,
            CreatePayroll,
            PreviewPayroll,
            UpdateSlip,
            PayrollBatch,
            SalarySlip,
            PayrollRun,
            SlipFigures,
            SlipFailure,
            PaidReport,
            BatchDetail
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Punches", description = "Raw clock event intake APIs"),
        (name = "Attendance", description = "Attendance management APIs"),
        (name = "Leave", description = "Leave management APIs"),
        (name = "Regularization", description = "Attendance correction APIs"),
        (name = "Payroll", description = "Payroll management APIs"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
