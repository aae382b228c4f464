use serde::Serialize;

/// Audit event emitted into the tracing pipeline. The core does not persist
/// the trail; a subscriber on the `audit` target owns storage.
#[derive(Debug, Serialize)]
pub struct AuditEvent<'a> {
    pub actor_id: u64,
    pub action: &'a str,
    pub entity: &'a str,
    pub entity_id: u64,
    pub detail: String,
}

pub fn emit(event: AuditEvent<'_>) {
    tracing::info!(
        target: "audit",
        actor_id = event.actor_id,
        action = event.action,
        entity = event.entity,
        entity_id = event.entity_id,
        detail = %event.detail,
        "audit"
    );
}
