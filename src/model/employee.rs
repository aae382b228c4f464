use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Slice of the employee directory this core needs. The directory itself is
/// owned elsewhere; we only read it through the `EmployeeDirectory` trait.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct EmployeeLite {
    #[schema(example = 1001)]
    pub id: u64,

    #[schema(example = "John Doe")]
    pub name: String,

    #[schema(example = "30000.00", value_type = String)]
    pub monthly_salary: Decimal,

    #[schema(example = 42, nullable = true)]
    pub manager_id: Option<u64>,

    /// Role id as the identity service assigns them.
    #[schema(example = 3)]
    pub role_id: u8,

    pub active: bool,
}
