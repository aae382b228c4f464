//! Work-rules configuration: a versioned document with defaults and an
//! explicit migration for the legacy shape, loaded once at startup by
//! [`SettingsService::load`]. Services receive an immutable snapshot; nothing
//! materializes defaults as a side effect of a read.

use std::collections::BTreeMap;

use chrono::{NaiveTime, Weekday};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{HrError, Result};
use crate::policy::PolicyCtx;
use crate::store::HrStore;

pub const SETTINGS_VERSION: u32 = 2;

/// When a leave type has neither an explicit nor a legacy configured limit.
const FALLBACK_ANNUAL_LIMIT: u32 = 12;

fn default_standard_work_hours() -> Decimal {
    Decimal::from(8)
}

fn default_half_day_threshold() -> Decimal {
    Decimal::from(4)
}

fn default_allow_self_clock_in() -> bool {
    true
}

fn default_shift_start() -> NaiveTime {
    NaiveTime::from_hms_opt(9, 0, 0).unwrap()
}

fn default_auto_half_day_cutoff() -> NaiveTime {
    NaiveTime::from_hms_opt(18, 0, 0).unwrap()
}

fn default_sweep_after() -> NaiveTime {
    NaiveTime::from_hms_opt(20, 0, 0).unwrap()
}

fn default_weekend_days() -> Vec<Weekday> {
    vec![Weekday::Sat, Weekday::Sun]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkSettings {
    #[serde(default = "default_standard_work_hours")]
    pub standard_work_hours: Decimal,

    #[serde(default = "default_half_day_threshold")]
    pub half_day_threshold: Decimal,

    #[serde(default = "default_allow_self_clock_in")]
    pub allow_self_clock_in: bool,

    #[serde(default = "default_shift_start")]
    pub shift_start: NaiveTime,

    /// Past this clock time, today's open check-ins are half-day candidates.
    #[serde(default = "default_auto_half_day_cutoff")]
    pub auto_half_day_cutoff: NaiveTime,

    /// The daily sweep runs once per day after this time.
    #[serde(default = "default_sweep_after")]
    pub sweep_after: NaiveTime,

    #[serde(default = "default_weekend_days")]
    pub weekend_days: Vec<Weekday>,
}

impl Default for WorkSettings {
    fn default() -> Self {
        Self {
            standard_work_hours: default_standard_work_hours(),
            half_day_threshold: default_half_day_threshold(),
            allow_self_clock_in: default_allow_self_clock_in(),
            shift_start: default_shift_start(),
            auto_half_day_cutoff: default_auto_half_day_cutoff(),
            sweep_after: default_sweep_after(),
            weekend_days: default_weekend_days(),
        }
    }
}

impl WorkSettings {
    pub fn policy_ctx(&self) -> PolicyCtx {
        PolicyCtx {
            allow_self_clock_in: self.allow_self_clock_in,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeavePolicy {
    /// Per-type annual limits in days.
    #[serde(default)]
    pub annual_limits: BTreeMap<String, Decimal>,

    /// Aggregate limit carried over from the v1 settings shape; consulted
    /// only when a type has no explicit limit.
    #[serde(default)]
    pub legacy_annual_limit: Option<Decimal>,
}

impl LeavePolicy {
    /// Limit resolution order: explicit type limit, legacy aggregate,
    /// hard fallback.
    pub fn limit_for(&self, leave_type: &str) -> Decimal {
        self.annual_limits
            .get(leave_type)
            .copied()
            .or(self.legacy_annual_limit)
            .unwrap_or_else(|| Decimal::from(FALLBACK_ANNUAL_LIMIT))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxSlab {
    pub above: Decimal,
    pub rate: Decimal,
}

fn default_basic_ratio() -> Decimal {
    Decimal::new(5, 1) // 0.5
}

fn default_pf_rate() -> Decimal {
    Decimal::new(12, 2) // 0.12
}

fn default_tax_slabs() -> Vec<TaxSlab> {
    vec![TaxSlab {
        above: Decimal::from(50_000),
        rate: Decimal::new(10, 2),
    }]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeductionRates {
    /// Share of monthly salary treated as basic pay.
    #[serde(default = "default_basic_ratio")]
    pub basic_ratio: Decimal,

    /// Provident fund rate applied to basic pay.
    #[serde(default = "default_pf_rate")]
    pub pf_rate: Decimal,

    /// Rate tables are configuration, not tax law. The highest matching
    /// slab wins; no slab means no tax.
    #[serde(default = "default_tax_slabs")]
    pub tax_slabs: Vec<TaxSlab>,

    #[serde(default)]
    pub other: Decimal,
}

impl Default for DeductionRates {
    fn default() -> Self {
        Self {
            basic_ratio: default_basic_ratio(),
            pf_rate: default_pf_rate(),
            tax_slabs: default_tax_slabs(),
            other: Decimal::ZERO,
        }
    }
}

impl DeductionRates {
    pub fn tax_for(&self, monthly_salary: Decimal) -> Decimal {
        let rate = self
            .tax_slabs
            .iter()
            .filter(|slab| monthly_salary > slab.above)
            .map(|slab| slab.rate)
            .max()
            .unwrap_or(Decimal::ZERO);
        crate::utils::money::round2(monthly_salary * rate)
    }
}

/// The whole persisted settings document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsDoc {
    pub version: u32,

    #[serde(default)]
    pub work: WorkSettings,

    #[serde(default)]
    pub leave: LeavePolicy,

    #[serde(default)]
    pub deductions: DeductionRates,
}

impl Default for SettingsDoc {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            work: WorkSettings::default(),
            leave: LeavePolicy::default(),
            deductions: DeductionRates::default(),
        }
    }
}

impl SettingsDoc {
    pub fn validate(&self) -> Result<()> {
        if self.work.standard_work_hours <= Decimal::ZERO {
            return Err(HrError::validation("standard_work_hours must be positive"));
        }
        if self.work.half_day_threshold <= Decimal::ZERO {
            return Err(HrError::validation("half_day_threshold must be positive"));
        }
        if self.work.half_day_threshold >= self.work.standard_work_hours {
            return Err(HrError::validation(
                "half_day_threshold must be below standard_work_hours",
            ));
        }
        if self.deductions.pf_rate < Decimal::ZERO || self.deductions.pf_rate > Decimal::ONE {
            return Err(HrError::validation("pf_rate must be between 0 and 1"));
        }
        if self.deductions.basic_ratio <= Decimal::ZERO
            || self.deductions.basic_ratio > Decimal::ONE
        {
            return Err(HrError::validation("basic_ratio must be between 0 and 1"));
        }
        if self.work.weekend_days.is_empty() || self.work.weekend_days.len() > 6 {
            return Err(HrError::validation("weekend_days must name 1 to 6 days"));
        }
        Ok(())
    }
}

/// The v1 document was a flat blob with a single `work_hours` float and one
/// aggregate `annual_leave_limit`.
fn migrate_v1(raw: &serde_json::Value) -> SettingsDoc {
    let mut doc = SettingsDoc::default();

    if let Some(hours) = raw.get("work_hours").and_then(|v| v.as_f64()) {
        if let Ok(hours) = Decimal::try_from(hours) {
            doc.work.standard_work_hours = hours;
            doc.work.half_day_threshold = hours / Decimal::from(2);
        }
    }
    if let Some(limit) = raw.get("annual_leave_limit").and_then(|v| v.as_f64()) {
        if let Ok(limit) = Decimal::try_from(limit) {
            doc.leave.legacy_annual_limit = Some(limit);
        }
    }
    if let Some(allow) = raw.get("allow_self_clock_in").and_then(|v| v.as_bool()) {
        doc.work.allow_self_clock_in = allow;
    }

    doc
}

/// Explicitly initialized, single-instance configuration service.
///
/// Startup contract: `load` runs before the server accepts traffic, migrates
/// old documents in place and fails fast on an invalid document.
pub struct SettingsService {
    doc: SettingsDoc,
}

impl SettingsService {
    pub async fn load<S: HrStore>(store: &S) -> Result<Self> {
        let doc = match store.load_settings().await? {
            None => {
                let doc = SettingsDoc::default();
                store.save_settings(&to_json(&doc)?).await?;
                tracing::info!("no settings document found, wrote defaults");
                doc
            }
            Some(raw) => {
                let version = raw.get("version").and_then(|v| v.as_u64()).unwrap_or(1);
                if version < SETTINGS_VERSION as u64 {
                    let doc = migrate_v1(&raw);
                    store.save_settings(&to_json(&doc)?).await?;
                    tracing::info!(from = version, "migrated settings document");
                    doc
                } else {
                    serde_json::from_value(raw).map_err(|e| {
                        HrError::Internal(format!("settings document unreadable: {}", e))
                    })?
                }
            }
        };

        doc.validate()?;
        Ok(Self { doc })
    }

    pub fn doc(&self) -> &SettingsDoc {
        &self.doc
    }
}

fn to_json(doc: &SettingsDoc) -> Result<serde_json::Value> {
    serde_json::to_value(doc).map_err(|e| HrError::Internal(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemStore;
    use std::str::FromStr;

    #[test]
    fn limit_resolution_priority() {
        let mut policy = LeavePolicy::default();
        assert_eq!(policy.limit_for("annual"), Decimal::from(12));

        policy.legacy_annual_limit = Some(Decimal::from(18));
        assert_eq!(policy.limit_for("annual"), Decimal::from(18));

        policy
            .annual_limits
            .insert("annual".to_string(), Decimal::from(24));
        assert_eq!(policy.limit_for("annual"), Decimal::from(24));
        assert_eq!(policy.limit_for("sick"), Decimal::from(18));
    }

    #[test]
    fn tax_uses_highest_matching_slab() {
        let rates = DeductionRates::default();
        assert_eq!(rates.tax_for(Decimal::from(30_000)), Decimal::ZERO);
        assert_eq!(rates.tax_for(Decimal::from(50_000)), Decimal::ZERO);
        assert_eq!(
            rates.tax_for(Decimal::from(60_000)),
            Decimal::from_str("6000.00").unwrap()
        );
    }

    #[test]
    fn threshold_must_stay_below_standard_hours() {
        let mut doc = SettingsDoc::default();
        doc.work.half_day_threshold = Decimal::from(9);
        assert!(doc.validate().is_err());
    }

    #[actix_web::test]
    async fn load_writes_defaults_once() {
        let store = MemStore::new();
        let service = SettingsService::load(&store).await.unwrap();
        assert_eq!(service.doc().version, SETTINGS_VERSION);
        assert!(store.load_settings().await.unwrap().is_some());
    }

    #[actix_web::test]
    async fn load_migrates_v1_blob() {
        let store = MemStore::new();
        store
            .save_settings(&serde_json::json!({
                "work_hours": 9.0,
                "annual_leave_limit": 20.0
            }))
            .await
            .unwrap();

        let service = SettingsService::load(&store).await.unwrap();
        let doc = service.doc();
        assert_eq!(doc.version, SETTINGS_VERSION);
        assert_eq!(doc.work.standard_work_hours, Decimal::from(9));
        assert_eq!(
            doc.work.half_day_threshold,
            Decimal::from_str("4.5").unwrap()
        );
        assert_eq!(doc.leave.legacy_annual_limit, Some(Decimal::from(20)));

        // The migrated document is persisted with the current version.
        let saved = store.load_settings().await.unwrap().unwrap();
        assert_eq!(saved["version"], SETTINGS_VERSION);
    }
}
