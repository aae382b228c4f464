use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema,
    strum_macros::Display,
)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PunchDirection {
    In,
    Out,
    Auto,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema,
    strum_macros::Display,
)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PunchSource {
    Biometric,
    Api,
    Import,
}

/// Processing lifecycle of a raw punch. Ingestion writes `Pending`; only the
/// determination engine advances it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema,
    strum_macros::Display,
)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PunchStatus {
    Pending,
    Processed,
    Failed,
}

/// One physical clock event as received from a device or gateway.
///
/// Rows are append-only: duplicates (same person, instant and origin) are
/// dropped at ingestion and nothing ever deletes a stored punch.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct RawPunch {
    #[schema(example = 1)]
    pub id: u64,

    /// Person identifier as the originating device knows it.
    #[schema(example = "EMP-1024")]
    pub device_person_id: String,

    #[schema(example = "2026-07-01T09:01:12", value_type = String, format = "date-time")]
    pub punched_at: NaiveDateTime,

    pub direction: PunchDirection,

    pub source: PunchSource,

    /// Network address or import tag of the originating device.
    #[schema(example = "10.0.4.17")]
    pub origin: String,

    pub status: PunchStatus,

    #[schema(value_type = String, format = "date-time")]
    pub received_at: DateTime<Utc>,
}

/// Punch as submitted by an external source, before it has an id or status.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct IncomingPunch {
    #[schema(example = "EMP-1024")]
    pub device_person_id: String,

    #[schema(example = "2026-07-01T09:01:12", value_type = String, format = "date-time")]
    pub punched_at: NaiveDateTime,

    pub direction: PunchDirection,

    pub source: PunchSource,

    #[schema(example = "10.0.4.17")]
    pub origin: String,
}
