use anyhow::Result;
use futures_util::StreamExt;
use moka::future::Cache;
use once_cell::sync::Lazy;
use sqlx::MySqlPool;
use std::time::Duration;

use crate::model::employee::EmployeeLite;

/// Directory lookups are hot on every attendance write; the directory itself
/// changes rarely, so a short-TTL cache in front of it is enough.
pub static EMPLOYEE_CACHE: Lazy<Cache<u64, EmployeeLite>> = Lazy::new(|| {
    Cache::builder()
        .max_capacity(100_000)
        .time_to_live(Duration::from_secs(600)) // 10 min TTL
        .build()
});

pub async fn put(employee: EmployeeLite) {
    EMPLOYEE_CACHE.insert(employee.id, employee).await;
}

pub async fn get(employee_id: u64) -> Option<EmployeeLite> {
    EMPLOYEE_CACHE.get(&employee_id).await
}

pub async fn invalidate(employee_id: u64) {
    EMPLOYEE_CACHE.invalidate(&employee_id).await;
}

/// Load active employees into the cache in batches at startup.
pub async fn warmup_employee_cache(pool: &MySqlPool, batch_size: usize) -> Result<()> {
    let mut stream = sqlx::query_as::<_, EmployeeLite>(
        r#"
        SELECT id, name, monthly_salary, manager_id, role_id, active
        FROM employees
        WHERE active = 1
        "#,
    )
    .fetch(pool);

    let mut batch = Vec::with_capacity(batch_size);
    let mut total_count = 0usize;

    while let Some(row) = stream.next().await {
        let employee: EmployeeLite = row?;
        batch.push(employee);
        total_count += 1;

        if batch.len() >= batch_size {
            batch_put(std::mem::take(&mut batch)).await;
        }
    }

    if !batch.is_empty() {
        batch_put(batch).await;
    }

    log::info!("Employee cache warmup complete: {} active employees", total_count);

    Ok(())
}

async fn batch_put(employees: Vec<EmployeeLite>) {
    let futures: Vec<_> = employees
        .into_iter()
        .map(|e| EMPLOYEE_CACHE.insert(e.id, e))
        .collect();

    futures::future::join_all(futures).await;
}
