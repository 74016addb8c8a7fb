//! AdEngine: composes wallets, campaigns, dedup, selection, and admin
//! control behind per-sponsor serialization.
//!
//! Concurrency discipline: one mutex per sponsor account. Billable events
//! for different sponsors run fully in parallel; events touching the same
//! wallet are serialized so the check-then-write debit is one atomic unit.

mod admin;
mod billing;
mod serve;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use contracts::{
    Campaign, DailyBurnRow, EngineConfig, LedgerEntry, PendingDeposit, RateCard, Sponsor,
    SponsorStatus,
};
use serde_json::{json, Value};

use crate::campaign::CampaignError;
use crate::dedup::DedupLog;
use crate::reporting;
use crate::selector::SelectorRng;
use crate::wallet::{Wallet, WalletError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    UnknownSponsor(String),
    UnknownCampaign(String),
    UnknownDeposit(String),
    SponsorAlreadyRegistered(String),
    DepositAlreadyDecided(String),
    EmptyAdjustmentReason,
    InvalidBudget(i64),
    InvalidDepositAmount(i64),
    Wallet(WalletError),
    Campaign(CampaignError),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownSponsor(id) => write!(f, "unknown sponsor: {id}"),
            Self::UnknownCampaign(id) => write!(f, "unknown campaign: {id}"),
            Self::UnknownDeposit(id) => write!(f, "unknown deposit: {id}"),
            Self::SponsorAlreadyRegistered(id) => {
                write!(f, "sponsor already registered: {id}")
            }
            Self::DepositAlreadyDecided(id) => {
                write!(f, "deposit already decided: {id}")
            }
            Self::EmptyAdjustmentReason => {
                write!(f, "wallet adjustments require a human-readable reason")
            }
            Self::InvalidBudget(amount) => write!(f, "invalid campaign budget: {amount}"),
            Self::InvalidDepositAmount(amount) => write!(f, "invalid deposit amount: {amount}"),
            Self::Wallet(err) => write!(f, "wallet: {err}"),
            Self::Campaign(err) => write!(f, "campaign: {err}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<WalletError> for EngineError {
    fn from(value: WalletError) -> Self {
        Self::Wallet(value)
    }
}

impl From<CampaignError> for EngineError {
    fn from(value: CampaignError) -> Self {
        Self::Campaign(value)
    }
}

/// Everything serialized under one sponsor's lock: the wallet (ledger), the
/// sponsor's campaigns, its processed dedup keys, and any reconciliation
/// holds on its campaigns.
#[derive(Debug)]
pub struct SponsorAccount {
    pub sponsor: Sponsor,
    pub wallet: Wallet,
    pub campaigns: BTreeMap<String, Campaign>,
    pub dedup: DedupLog,
    pub reconciliation_holds: BTreeSet<String>,
    next_campaign_sequence: u64,
}

impl SponsorAccount {
    fn new(sponsor: Sponsor) -> Self {
        let wallet = Wallet::new(sponsor.sponsor_id.clone());
        Self {
            sponsor,
            wallet,
            campaigns: BTreeMap::new(),
            dedup: DedupLog::default(),
            reconciliation_holds: BTreeSet::new(),
            next_campaign_sequence: 1,
        }
    }
}

/// Balance-affecting state change, recorded in order under the originating
/// sponsor's lock and drained by the persistence layer as one delta.
#[derive(Debug, Clone, PartialEq)]
pub enum JournalRecord {
    SponsorUpserted(Sponsor),
    LedgerAppended(LedgerEntry),
    CampaignUpserted(Campaign),
    DepositUpserted(PendingDeposit),
    RateCardUpdated(RateCard),
}

#[derive(Debug)]
pub struct AdEngine {
    config: EngineConfig,
    accounts: RwLock<BTreeMap<String, Arc<Mutex<SponsorAccount>>>>,
    /// campaign_id -> sponsor_id, so billable events reach the right lock.
    campaign_owners: RwLock<BTreeMap<String, String>>,
    deposits: Mutex<BTreeMap<String, PendingDeposit>>,
    rates: RwLock<RateCard>,
    selector_rng: Mutex<SelectorRng>,
    journal: Mutex<Vec<JournalRecord>>,
    deposit_sequence: AtomicU64,
}

impl AdEngine {
    pub fn new(config: EngineConfig) -> Self {
        let rates = config.initial_rates;
        let seed = config.seed;
        Self {
            config,
            accounts: RwLock::new(BTreeMap::new()),
            campaign_owners: RwLock::new(BTreeMap::new()),
            deposits: Mutex::new(BTreeMap::new()),
            rates: RwLock::new(rates),
            selector_rng: Mutex::new(SelectorRng::new(seed)),
            journal: Mutex::new(Vec::new()),
            deposit_sequence: AtomicU64::new(1),
        }
    }

    /// Rebuild an engine from persisted state. Journal starts empty: the
    /// restored rows are already durable.
    pub fn restore(
        config: EngineConfig,
        sponsors: Vec<Sponsor>,
        ledgers: BTreeMap<String, Vec<LedgerEntry>>,
        campaigns: Vec<Campaign>,
        deposits: Vec<PendingDeposit>,
        rates: RateCard,
    ) -> Self {
        let mut accounts = BTreeMap::new();
        let mut ledgers = ledgers;
        for sponsor in sponsors {
            let sponsor_id = sponsor.sponsor_id.clone();
            let entries = ledgers.remove(&sponsor_id).unwrap_or_default();
            let mut account = SponsorAccount::new(sponsor);
            account.wallet = Wallet::restore(sponsor_id.clone(), entries);
            accounts.insert(sponsor_id, Arc::new(Mutex::new(account)));
        }

        let mut campaign_owners = BTreeMap::new();
        for campaign in campaigns {
            campaign_owners.insert(campaign.campaign_id.clone(), campaign.sponsor_id.clone());
            if let Some(handle) = accounts.get(&campaign.sponsor_id) {
                let mut account = lock_account(handle);
                let sequence = campaign_sequence(&campaign.campaign_id);
                account.next_campaign_sequence = account.next_campaign_sequence.max(sequence + 1);
                account
                    .campaigns
                    .insert(campaign.campaign_id.clone(), campaign);
            }
        }

        let mut deposit_sequence = 1;
        let mut deposit_map = BTreeMap::new();
        for deposit in deposits {
            deposit_sequence = deposit_sequence.max(transaction_sequence(&deposit.transaction_id) + 1);
            deposit_map.insert(deposit.transaction_id.clone(), deposit);
        }

        let seed = config.seed;
        Self {
            config,
            accounts: RwLock::new(accounts),
            campaign_owners: RwLock::new(campaign_owners),
            deposits: Mutex::new(deposit_map),
            rates: RwLock::new(rates),
            selector_rng: Mutex::new(SelectorRng::new(seed)),
            journal: Mutex::new(Vec::new()),
            deposit_sequence: AtomicU64::new(deposit_sequence),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn current_rates(&self) -> RateCard {
        *read_lock(&self.rates)
    }

    pub fn register_sponsor(&self, sponsor_id: &str, now: i64) -> Result<Sponsor, EngineError> {
        let mut accounts = write_lock(&self.accounts);
        if accounts.contains_key(sponsor_id) {
            return Err(EngineError::SponsorAlreadyRegistered(sponsor_id.to_string()));
        }
        let sponsor = Sponsor {
            sponsor_id: sponsor_id.to_string(),
            status: SponsorStatus::Active,
            created_at: now,
        };
        accounts.insert(
            sponsor_id.to_string(),
            Arc::new(Mutex::new(SponsorAccount::new(sponsor.clone()))),
        );
        drop(accounts);

        self.journal_push(JournalRecord::SponsorUpserted(sponsor.clone()));
        Ok(sponsor)
    }

    pub fn sponsor_ids(&self) -> Vec<String> {
        read_lock(&self.accounts).keys().cloned().collect()
    }

    pub fn sponsor(&self, sponsor_id: &str) -> Result<Sponsor, EngineError> {
        let handle = self.account(sponsor_id)?;
        let account = lock_account(&handle);
        Ok(account.sponsor.clone())
    }

    pub fn balance(&self, sponsor_id: &str) -> Result<i64, EngineError> {
        let handle = self.account(sponsor_id)?;
        let account = lock_account(&handle);
        Ok(account.wallet.balance())
    }

    pub fn ledger_entries(&self, sponsor_id: &str) -> Result<Vec<LedgerEntry>, EngineError> {
        let handle = self.account(sponsor_id)?;
        let account = lock_account(&handle);
        Ok(account.wallet.book().entries().to_vec())
    }

    pub fn campaign(&self, campaign_id: &str) -> Result<Campaign, EngineError> {
        let sponsor_id = self.owner_of(campaign_id)?;
        let handle = self.account(&sponsor_id)?;
        let account = lock_account(&handle);
        account
            .campaigns
            .get(campaign_id)
            .cloned()
            .ok_or_else(|| EngineError::UnknownCampaign(campaign_id.to_string()))
    }

    pub fn campaigns_for_sponsor(&self, sponsor_id: &str) -> Result<Vec<Campaign>, EngineError> {
        let handle = self.account(sponsor_id)?;
        let account = lock_account(&handle);
        Ok(account.campaigns.values().cloned().collect())
    }

    pub fn deposit(&self, transaction_id: &str) -> Result<PendingDeposit, EngineError> {
        lock_mutex(&self.deposits)
            .get(transaction_id)
            .cloned()
            .ok_or_else(|| EngineError::UnknownDeposit(transaction_id.to_string()))
    }

    pub fn deposits_for_sponsor(&self, sponsor_id: &str) -> Vec<PendingDeposit> {
        lock_mutex(&self.deposits)
            .values()
            .filter(|deposit| deposit.sponsor_id == sponsor_id)
            .cloned()
            .collect()
    }

    /// Derived daily-burn rows for a sponsor, inclusive epoch-day range.
    pub fn daily_burn(
        &self,
        sponsor_id: &str,
        from_day: i64,
        to_day: i64,
    ) -> Result<Vec<DailyBurnRow>, EngineError> {
        let entries = self.ledger_entries(sponsor_id)?;
        Ok(reporting::daily_burn(&entries, from_day, to_day))
    }

    /// Reconciliation check: campaign.budget_spent against the summed debit
    /// entries referencing it. True when they agree.
    pub fn verify_campaign_spend(&self, campaign_id: &str) -> Result<bool, EngineError> {
        let sponsor_id = self.owner_of(campaign_id)?;
        let handle = self.account(&sponsor_id)?;
        let account = lock_account(&handle);
        let campaign = account
            .campaigns
            .get(campaign_id)
            .ok_or_else(|| EngineError::UnknownCampaign(campaign_id.to_string()))?;
        Ok(campaign.budget_spent == account.wallet.book().debit_total_for(campaign_id))
    }

    /// Sponsor summary for inspection endpoints. Derived view; the ledger
    /// stays the only authority.
    pub fn inspect_sponsor(&self, sponsor_id: &str) -> Result<Value, EngineError> {
        let handle = self.account(sponsor_id)?;
        let account = lock_account(&handle);
        let campaigns = account
            .campaigns
            .values()
            .map(|campaign| {
                json!({
                    "campaign_id": campaign.campaign_id,
                    "placement": campaign.placement,
                    "status": campaign.status.to_string(),
                    "budget_total": campaign.budget_total,
                    "budget_spent": campaign.budget_spent,
                    "views_count": campaign.views_count,
                    "clicks_count": campaign.clicks_count,
                    "reconciliation_hold": account
                        .reconciliation_holds
                        .contains(&campaign.campaign_id),
                })
            })
            .collect::<Vec<_>>();

        Ok(json!({
            "sponsor_id": account.sponsor.sponsor_id,
            "status": account.sponsor.status,
            "balance": account.wallet.balance(),
            "ledger_entry_count": account.wallet.book().entries().len(),
            "campaigns": campaigns,
            "pending_dedup_keys": account.dedup.len(),
        }))
    }

    /// Take all journal records accumulated since the last drain.
    pub fn drain_journal(&self) -> Vec<JournalRecord> {
        std::mem::take(&mut *lock_mutex(&self.journal))
    }

    /// Put undelivered records back at the front after a failed flush.
    pub fn requeue_journal(&self, records: Vec<JournalRecord>) {
        if records.is_empty() {
            return;
        }
        let mut journal = lock_mutex(&self.journal);
        let mut merged = records;
        merged.append(&mut journal);
        *journal = merged;
    }

    fn account(&self, sponsor_id: &str) -> Result<Arc<Mutex<SponsorAccount>>, EngineError> {
        read_lock(&self.accounts)
            .get(sponsor_id)
            .cloned()
            .ok_or_else(|| EngineError::UnknownSponsor(sponsor_id.to_string()))
    }

    fn owner_of(&self, campaign_id: &str) -> Result<String, EngineError> {
        read_lock(&self.campaign_owners)
            .get(campaign_id)
            .cloned()
            .ok_or_else(|| EngineError::UnknownCampaign(campaign_id.to_string()))
    }

    fn journal_push(&self, record: JournalRecord) {
        lock_mutex(&self.journal).push(record);
    }

    fn journal_extend(&self, records: impl IntoIterator<Item = JournalRecord>) {
        lock_mutex(&self.journal).extend(records);
    }

    fn next_transaction_id(&self) -> String {
        let sequence = self.deposit_sequence.fetch_add(1, Ordering::SeqCst);
        format!("txn:{sequence:08}")
    }
}

fn campaign_sequence(campaign_id: &str) -> u64 {
    campaign_id
        .rsplit(':')
        .next()
        .and_then(|raw| raw.parse::<u64>().ok())
        .unwrap_or(0)
}

fn transaction_sequence(transaction_id: &str) -> u64 {
    transaction_id
        .rsplit(':')
        .next()
        .and_then(|raw| raw.parse::<u64>().ok())
        .unwrap_or(0)
}

// Poisoning is ignored: the ledger is append-only and balances derive from
// it, so the data behind a poisoned lock is still usable.
fn lock_account<'a>(handle: &'a Arc<Mutex<SponsorAccount>>) -> MutexGuard<'a, SponsorAccount> {
    handle.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn lock_mutex<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests;
