use anyhow::{Result, anyhow};
use autoscale_cuckoo_filter::CuckooFilter;
use chrono::NaiveDateTime;
use futures::StreamExt;
use once_cell::sync::Lazy;
use sqlx::MySqlPool;
use std::sync::RwLock;

/// Expected capacity and false-positive rate.
/// Tune these based on real punch volumes.
const FILTER_CAPACITY: usize = 1_000_000;
const FALSE_POSITIVE_RATE: f64 = 0.001;

static PUNCH_FILTER: Lazy<RwLock<CuckooFilter<String>>> = Lazy::new(|| {
    RwLock::new(CuckooFilter::new(FILTER_CAPACITY, FALSE_POSITIVE_RATE))
});

/// Natural key of a punch: (device person, instant, originating device).
#[inline]
pub fn punch_key(device_person_id: &str, punched_at: NaiveDateTime, origin: &str) -> String {
    format!("{}|{}|{}", device_person_id, punched_at, origin)
}

/// Check if a punch might already be stored (false positives possible,
/// so a hit still needs a store lookup before the punch is dropped).
pub fn might_exist(key: &str) -> bool {
    PUNCH_FILTER
        .read()
        .expect("punch filter poisoned")
        .contains(&key.to_string())
}

/// Record a newly stored punch in the filter.
pub fn insert(key: &str) {
    PUNCH_FILTER
        .write()
        .expect("punch filter poisoned")
        .add(&key.to_string());
}

/// Warm up the punch filter from persisted punches using streaming + batching.
pub async fn warmup_punch_filter(pool: &MySqlPool, batch_size: usize) -> Result<()> {
    let mut stream = sqlx::query_as::<_, (String, NaiveDateTime, String)>(
        "SELECT device_person_id, punched_at, origin FROM raw_punches",
    )
    .fetch(pool);

    let mut batch = Vec::with_capacity(batch_size);
    let mut total = 0usize;

    while let Some(row) = stream.next().await {
        let (person, at, origin) = row.map_err(|e| anyhow!("DB row fetch failed: {}", e))?;

        batch.push(punch_key(&person, at, &origin));
        total += 1;

        if batch.len() == batch_size {
            insert_batch(&batch);
            batch.clear();
        }
    }

    if !batch.is_empty() {
        insert_batch(&batch);
    }

    log::info!("Punch filter warmup complete: {} punches", total);
    Ok(())
}

fn insert_batch(keys: &[String]) {
    let mut filter = PUNCH_FILTER.write().expect("punch filter poisoned");

    for key in keys {
        filter.add(key);
    }
}
