pub mod employee_cache;
pub mod money;
pub mod punch_filter;
