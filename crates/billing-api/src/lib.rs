//! In-process API facade over the billing engine with SQLite persistence
//! and the HTTP control surface.

mod persistence;
mod server;

use std::path::Path;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use billing_core::{AdEngine, EngineError};
use contracts::{
    BillableEventType, BillingOutcome, Campaign, DailyBurnRow, EngineConfig, LedgerEntry,
    PendingDeposit, Placement, PlacementRates, RateCard, ServeDecision, Sponsor,
};
use persistence::SqliteBillingStore;
pub use persistence::{PersistedEngineState, PersistenceError};
pub use server::{serve, ServerError};

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as i64)
        .unwrap_or(0)
}

#[derive(Debug)]
pub struct EngineApi {
    engine: AdEngine,
    store: Mutex<Option<SqliteBillingStore>>,
    last_persistence_error: Mutex<Option<String>>,
}

impl EngineApi {
    pub fn from_config(config: EngineConfig) -> Self {
        Self {
            engine: AdEngine::new(config),
            store: Mutex::new(None),
            last_persistence_error: Mutex::new(None),
        }
    }

    /// Open against a SQLite file: rehydrate the engine recorded there, or
    /// bootstrap a fresh one under `config` when the file holds no engine.
    pub fn open_with_store(
        config: EngineConfig,
        path: impl AsRef<Path>,
    ) -> Result<Self, PersistenceError> {
        let mut store = SqliteBillingStore::open(path)?;

        let engine = match store.load_state(&config.engine_id)? {
            Some(state) => AdEngine::restore(
                state.config,
                state.sponsors,
                state.ledgers,
                state.campaigns,
                state.deposits,
                state.rates,
            ),
            None => {
                store.persist_delta(&config, &[])?;
                AdEngine::new(config)
            }
        };

        Ok(Self {
            engine,
            store: Mutex::new(Some(store)),
            last_persistence_error: Mutex::new(None),
        })
    }

    pub fn attach_sqlite_store(&self, path: impl AsRef<Path>) -> Result<(), PersistenceError> {
        let store = SqliteBillingStore::open(path)?;
        *lock_state(&self.store) = Some(store);
        Ok(())
    }

    /// Drain the engine journal and write it as one transaction. On failure
    /// the drained records are requeued so the next flush retries them.
    pub fn flush_persistence_checked(&self) -> Result<(), PersistenceError> {
        let mut guard = lock_state(&self.store);
        let Some(store) = guard.as_mut() else {
            return Err(PersistenceError::NotAttached);
        };

        let records = self.engine.drain_journal();
        if records.is_empty() {
            return Ok(());
        }

        match store.persist_delta(self.engine.config(), &records) {
            Ok(()) => {
                *lock_state(&self.last_persistence_error) = None;
                Ok(())
            }
            Err(err) => {
                self.engine.requeue_journal(records);
                Err(err)
            }
        }
    }

    pub fn last_persistence_error(&self) -> Option<String> {
        lock_state(&self.last_persistence_error).clone()
    }

    pub fn engine(&self) -> &AdEngine {
        &self.engine
    }

    pub fn register_sponsor(&self, sponsor_id: &str) -> Result<Sponsor, EngineError> {
        let sponsor = self.engine.register_sponsor(sponsor_id, unix_now())?;
        self.flush_if_enabled();
        Ok(sponsor)
    }

    pub fn select_ad(&self, placement: Placement, viewer_id: &str) -> ServeDecision {
        self.engine.select_ad(placement, viewer_id, unix_now())
    }

    pub fn record_event(
        &self,
        campaign_id: &str,
        event_type: BillableEventType,
        dedup_key: &str,
    ) -> Result<BillingOutcome, EngineError> {
        let outcome = self
            .engine
            .record_event(campaign_id, event_type, dedup_key, unix_now())?;
        self.flush_if_enabled();
        Ok(outcome)
    }

    pub fn request_top_up(
        &self,
        sponsor_id: &str,
        amount: i64,
        proof: &str,
    ) -> Result<PendingDeposit, EngineError> {
        let deposit = self
            .engine
            .request_top_up(sponsor_id, amount, proof, unix_now())?;
        self.flush_if_enabled();
        Ok(deposit)
    }

    pub fn approve_deposit(&self, transaction_id: &str) -> Result<PendingDeposit, EngineError> {
        let deposit = self.engine.approve_deposit(transaction_id, unix_now())?;
        self.flush_if_enabled();
        Ok(deposit)
    }

    pub fn reject_deposit(
        &self,
        transaction_id: &str,
        reason: &str,
    ) -> Result<PendingDeposit, EngineError> {
        let deposit = self
            .engine
            .reject_deposit(transaction_id, reason, unix_now())?;
        self.flush_if_enabled();
        Ok(deposit)
    }

    pub fn adjust_wallet(
        &self,
        sponsor_id: &str,
        amount: i64,
        reason: &str,
    ) -> Result<LedgerEntry, EngineError> {
        let entry = self
            .engine
            .adjust_wallet(sponsor_id, amount, reason, unix_now())?;
        self.flush_if_enabled();
        Ok(entry)
    }

    pub fn create_campaign(
        &self,
        sponsor_id: &str,
        placement: Placement,
        budget_total: i64,
    ) -> Result<Campaign, EngineError> {
        let campaign = self
            .engine
            .create_campaign(sponsor_id, placement, budget_total, unix_now())?;
        self.flush_if_enabled();
        Ok(campaign)
    }

    pub fn campaign_action(
        &self,
        campaign_id: &str,
        action: CampaignAction,
    ) -> Result<Campaign, EngineError> {
        let campaign = match action {
            CampaignAction::Activate => self.engine.activate_campaign(campaign_id),
            CampaignAction::Pause => self.engine.pause_campaign(campaign_id),
            CampaignAction::Resume => self.engine.resume_campaign(campaign_id),
            CampaignAction::Suspend => self.engine.suspend_campaign(campaign_id),
            CampaignAction::Unsuspend => self.engine.unsuspend_campaign(campaign_id),
            CampaignAction::ClearHold => self.engine.clear_reconciliation_hold(campaign_id),
        }?;
        self.flush_if_enabled();
        Ok(campaign)
    }

    pub fn suspend_sponsor(&self, sponsor_id: &str) -> Result<Sponsor, EngineError> {
        let sponsor = self.engine.suspend_sponsor(sponsor_id)?;
        self.flush_if_enabled();
        Ok(sponsor)
    }

    pub fn resume_sponsor(&self, sponsor_id: &str) -> Result<Sponsor, EngineError> {
        let sponsor = self.engine.resume_sponsor(sponsor_id)?;
        self.flush_if_enabled();
        Ok(sponsor)
    }

    pub fn update_rates(&self, feed: PlacementRates, result: PlacementRates) -> RateCard {
        let card = self.engine.update_rates(feed, result);
        self.flush_if_enabled();
        card
    }

    pub fn daily_burn(
        &self,
        sponsor_id: &str,
        from_day: i64,
        to_day: i64,
    ) -> Result<Vec<DailyBurnRow>, EngineError> {
        self.engine.daily_burn(sponsor_id, from_day, to_day)
    }

    /// Daily burn computed from the persisted ledger. `None` when no store
    /// is attached; callers fall back to the in-memory report.
    pub fn daily_burn_persisted(
        &self,
        sponsor_id: &str,
        from_day: i64,
        to_day: i64,
    ) -> Result<Option<Vec<DailyBurnRow>>, PersistenceError> {
        match lock_state(&self.store).as_ref() {
            Some(store) => Ok(Some(store.daily_burn(sponsor_id, from_day, to_day)?)),
            None => Ok(None),
        }
    }

    /// Ledger slice by created_at range from the persisted store, if attached.
    pub fn ledger_range_persisted(
        &self,
        sponsor_id: &str,
        from_created: i64,
        to_created: i64,
    ) -> Result<Option<Vec<LedgerEntry>>, PersistenceError> {
        match lock_state(&self.store).as_ref() {
            Some(store) => Ok(Some(store.load_ledger_range(
                sponsor_id,
                from_created,
                to_created,
            )?)),
            None => Ok(None),
        }
    }

    fn flush_if_enabled(&self) {
        if lock_state(&self.store).is_none() {
            return;
        }

        if let Err(err) = self.flush_persistence_checked() {
            *lock_state(&self.last_persistence_error) = Some(err.to_string());
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CampaignAction {
    Activate,
    Pause,
    Resume,
    Suspend,
    Unsuspend,
    ClearHold,
}

fn lock_state<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
