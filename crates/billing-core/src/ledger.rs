//! Append-only ledger book: the sole source of truth for a sponsor's wallet.

use std::collections::BTreeMap;

use contracts::{LedgerEntry, LedgerEntryKind};

/// One sponsor's immutable entry log. Entries are only ever appended;
/// `resulting_balance` is computed at write time so the latest entry always
/// carries the authoritative balance.
#[derive(Debug, Clone)]
pub struct LedgerBook {
    sponsor_id: String,
    entries: Vec<LedgerEntry>,
    next_sequence: u64,
    /// Positive debit totals keyed by campaign reference, maintained at
    /// append time so reconciliation checks stay O(1).
    debit_totals_by_campaign: BTreeMap<String, i64>,
}

impl LedgerBook {
    pub fn new(sponsor_id: impl Into<String>) -> Self {
        Self {
            sponsor_id: sponsor_id.into(),
            entries: Vec::new(),
            next_sequence: 1,
            debit_totals_by_campaign: BTreeMap::new(),
        }
    }

    /// Rebuild a book from persisted entries, restoring the sequence counter
    /// and per-campaign debit totals.
    pub fn restore(sponsor_id: impl Into<String>, entries: Vec<LedgerEntry>) -> Self {
        let sponsor_id = sponsor_id.into();
        let mut debit_totals_by_campaign = BTreeMap::new();
        for entry in &entries {
            if entry.kind == LedgerEntryKind::Debit {
                *debit_totals_by_campaign
                    .entry(entry.reference.clone())
                    .or_insert(0) += -entry.amount;
            }
        }
        let next_sequence = entries.len() as u64 + 1;
        Self {
            sponsor_id,
            entries,
            next_sequence,
            debit_totals_by_campaign,
        }
    }

    pub fn sponsor_id(&self) -> &str {
        &self.sponsor_id
    }

    /// Latest entry's resulting balance, or 0 with no entries.
    pub fn balance(&self) -> i64 {
        self.entries
            .last()
            .map(|entry| entry.resulting_balance)
            .unwrap_or(0)
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn latest(&self) -> Option<&LedgerEntry> {
        self.entries.last()
    }

    /// Sum of debits referencing the campaign, as a positive amount.
    pub fn debit_total_for(&self, campaign_id: &str) -> i64 {
        self.debit_totals_by_campaign
            .get(campaign_id)
            .copied()
            .unwrap_or(0)
    }

    /// Append one entry with `resulting_balance = balance + amount`. The
    /// caller (the wallet) has already validated the amount against policy;
    /// the book itself only guarantees the balance chain.
    pub fn append(
        &mut self,
        kind: LedgerEntryKind,
        amount: i64,
        reference: impl Into<String>,
        created_at: i64,
    ) -> LedgerEntry {
        let reference = reference.into();
        let resulting_balance = self.balance() + amount;
        let entry = LedgerEntry {
            entry_id: format!("{}:{:08}", self.sponsor_id, self.next_sequence),
            sponsor_id: self.sponsor_id.clone(),
            kind,
            amount,
            resulting_balance,
            reference: reference.clone(),
            created_at,
        };
        self.next_sequence += 1;
        if kind == LedgerEntryKind::Debit {
            *self.debit_totals_by_campaign.entry(reference).or_insert(0) += -amount;
        }
        self.entries.push(entry.clone());
        entry
    }
}
