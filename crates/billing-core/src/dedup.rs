//! Billable-event de-duplication: a retention-windowed log of processed keys
//! plus the stable hash clients and server share to derive keys.

use std::collections::BTreeMap;

use contracts::BillableEventType;

/// Processed dedup keys for one sponsor's campaigns. Checked before any side
/// effect and marked only after a charge commits, so a retried event that
/// never committed is billable and a committed one replays as a no-op.
#[derive(Debug, Clone, Default)]
pub struct DedupLog {
    seen_at_by_key: BTreeMap<String, i64>,
}

impl DedupLog {
    pub fn is_duplicate(
        &self,
        campaign_id: &str,
        event_type: BillableEventType,
        dedup_key: &str,
    ) -> bool {
        self.seen_at_by_key
            .contains_key(&composite_key(campaign_id, event_type, dedup_key))
    }

    pub fn mark(
        &mut self,
        campaign_id: &str,
        event_type: BillableEventType,
        dedup_key: &str,
        now: i64,
    ) {
        self.seen_at_by_key
            .insert(composite_key(campaign_id, event_type, dedup_key), now);
    }

    /// Drop keys older than the retention window. Keys outside the window
    /// are billable again; the window bounds memory, not correctness of
    /// in-window retries.
    pub fn prune(&mut self, now: i64, window_secs: i64) {
        self.seen_at_by_key
            .retain(|_, seen_at| now - *seen_at <= window_secs);
    }

    pub fn len(&self) -> usize {
        self.seen_at_by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen_at_by_key.is_empty()
    }
}

fn composite_key(campaign_id: &str, event_type: BillableEventType, dedup_key: &str) -> String {
    format!("{campaign_id}|{event_type}|{dedup_key}")
}

/// Deterministic key for (campaign, viewer, event type, time bucket): one
/// billable occurrence per ad per viewer per bucket.
pub fn derive_key(
    campaign_id: &str,
    viewer_id: &str,
    event_type: BillableEventType,
    occurred_at: i64,
    bucket_secs: i64,
) -> String {
    let bucket = occurred_at.div_euclid(bucket_secs.max(1));
    let mut hash = 0_u64;
    for byte in campaign_id
        .as_bytes()
        .iter()
        .chain(viewer_id.as_bytes())
        .chain(event_type.to_string().as_bytes())
    {
        hash = hash.rotate_left(5) ^ u64::from(*byte);
        hash = hash.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    }
    hash ^= (bucket as u64).wrapping_mul(0x517C_C1B7_2722_0A95);
    format!("dk:{hash:016x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_only_after_mark() {
        let mut log = DedupLog::default();
        assert!(!log.is_duplicate("cmp:a", BillableEventType::View, "k1"));

        log.mark("cmp:a", BillableEventType::View, "k1", 100);
        assert!(log.is_duplicate("cmp:a", BillableEventType::View, "k1"));
        // Same key, different event type: distinct billable occurrence.
        assert!(!log.is_duplicate("cmp:a", BillableEventType::Click, "k1"));
    }

    #[test]
    fn prune_expires_old_keys() {
        let mut log = DedupLog::default();
        log.mark("cmp:a", BillableEventType::View, "k1", 100);
        log.mark("cmp:a", BillableEventType::View, "k2", 650);

        // Retention is inclusive: a key exactly window-old survives.
        log.prune(700, 600);
        assert_eq!(log.len(), 2);

        log.prune(701, 600);
        assert!(log.is_duplicate("cmp:a", BillableEventType::View, "k2"));
        assert!(!log.is_duplicate("cmp:a", BillableEventType::View, "k1"));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn derived_keys_stable_within_bucket() {
        // Buckets are div_euclid(60): 960..1020 is one bucket, 1020 starts the next.
        let a = derive_key("cmp:a", "viewer_1", BillableEventType::View, 1_000, 60);
        let b = derive_key("cmp:a", "viewer_1", BillableEventType::View, 1_019, 60);
        let c = derive_key("cmp:a", "viewer_1", BillableEventType::View, 1_020, 60);
        assert_eq!(a, b);
        assert_ne!(a, c);

        let other_viewer = derive_key("cmp:a", "viewer_2", BillableEventType::View, 1_000, 60);
        assert_ne!(a, other_viewer);
    }
}
