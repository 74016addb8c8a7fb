//! Derived daily-burn aggregation. Read-only over debit ledger entries and
//! never authoritative for balance; safe to serve slightly stale.

use std::collections::BTreeMap;

use contracts::{DailyBurnRow, LedgerEntry, LedgerEntryKind, SECS_PER_DAY};

pub fn epoch_day(unix_secs: i64) -> i64 {
    unix_secs.div_euclid(SECS_PER_DAY)
}

/// Debit totals grouped by UTC day and campaign, inclusive day range.
pub fn daily_burn(entries: &[LedgerEntry], from_day: i64, to_day: i64) -> Vec<DailyBurnRow> {
    let mut buckets: BTreeMap<(i64, String), (i64, u64)> = BTreeMap::new();
    for entry in entries {
        if entry.kind != LedgerEntryKind::Debit {
            continue;
        }
        let day = epoch_day(entry.created_at);
        if day < from_day || day > to_day {
            continue;
        }
        let bucket = buckets.entry((day, entry.reference.clone())).or_insert((0, 0));
        bucket.0 += -entry.amount;
        bucket.1 += 1;
    }

    buckets
        .into_iter()
        .map(|((day, campaign_id), (debit_total, event_count))| DailyBurnRow {
            day: day_string(day),
            campaign_id,
            debit_total,
            event_count,
        })
        .collect()
}

/// `YYYY-MM-DD` for an epoch day (days since 1970-01-01), proleptic
/// Gregorian civil-date arithmetic.
pub fn day_string(epoch_day: i64) -> String {
    let z = epoch_day + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1_460 + doe / 36_524 - doe / 146_096) / 365;
    let year = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = if month <= 2 { year + 1 } else { year };
    format!("{year:04}-{month:02}-{day:02}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn debit(campaign: &str, amount: i64, created_at: i64) -> LedgerEntry {
        LedgerEntry {
            entry_id: format!("spn_001:{created_at}"),
            sponsor_id: "spn_001".to_string(),
            kind: LedgerEntryKind::Debit,
            amount: -amount,
            resulting_balance: 0,
            reference: campaign.to_string(),
            created_at,
        }
    }

    #[test]
    fn day_string_matches_known_dates() {
        assert_eq!(day_string(0), "1970-01-01");
        assert_eq!(day_string(31), "1970-02-01");
        assert_eq!(day_string(19_723), "2024-01-01");
    }

    #[test]
    fn groups_debits_by_day_and_campaign() {
        let entries = vec![
            debit("cmp:a", 45, 100),
            debit("cmp:a", 45, 200),
            debit("cmp:b", 60, 300),
            debit("cmp:a", 45, SECS_PER_DAY + 10),
        ];
        let rows = daily_burn(&entries, 0, 1);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].campaign_id, "cmp:a");
        assert_eq!(rows[0].debit_total, 90);
        assert_eq!(rows[0].event_count, 2);
        assert_eq!(rows[2].day, "1970-01-02");
    }

    #[test]
    fn deposits_and_range_are_excluded() {
        let mut deposit = debit("txn:1", 0, 100);
        deposit.kind = LedgerEntryKind::Deposit;
        deposit.amount = 1000;

        let entries = vec![deposit, debit("cmp:a", 45, SECS_PER_DAY * 5)];
        assert!(daily_burn(&entries, 0, 1).is_empty());
        assert_eq!(daily_burn(&entries, 5, 5).len(), 1);
    }
}
