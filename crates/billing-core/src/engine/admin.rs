//! Admin control surface: sponsor suspension, manual wallet adjustments,
//! deposit review, rate updates, and campaign lifecycle. Every
//! balance-affecting action lands in the ledger, never anywhere else.

use contracts::{
    Campaign, DepositState, LedgerEntry, PendingDeposit, Placement, PlacementRates, RateCard,
    Sponsor, SponsorStatus,
};

use super::{lock_account, lock_mutex, write_lock, AdEngine, EngineError, JournalRecord};
use crate::campaign;

impl AdEngine {
    /// Flip the sponsor off. Eligibility is recomputed from sponsor status
    /// at selection time, so none of the sponsor's campaigns need writes.
    pub fn suspend_sponsor(&self, sponsor_id: &str) -> Result<Sponsor, EngineError> {
        self.set_sponsor_status(sponsor_id, SponsorStatus::Suspended)
    }

    pub fn resume_sponsor(&self, sponsor_id: &str) -> Result<Sponsor, EngineError> {
        self.set_sponsor_status(sponsor_id, SponsorStatus::Active)
    }

    fn set_sponsor_status(
        &self,
        sponsor_id: &str,
        status: SponsorStatus,
    ) -> Result<Sponsor, EngineError> {
        let handle = self.account(sponsor_id)?;
        let mut account = lock_account(&handle);
        account.sponsor.status = status;
        let sponsor = account.sponsor.clone();
        self.journal_push(JournalRecord::SponsorUpserted(sponsor.clone()));
        Ok(sponsor)
    }

    /// Manual signed adjustment; the audit reason is stored as the ledger
    /// entry's reference.
    pub fn adjust_wallet(
        &self,
        sponsor_id: &str,
        amount: i64,
        reason: &str,
        now: i64,
    ) -> Result<LedgerEntry, EngineError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(EngineError::EmptyAdjustmentReason);
        }
        let handle = self.account(sponsor_id)?;
        let mut account = lock_account(&handle);
        let entry = account.wallet.adjust(amount, reason, now)?;
        self.journal_push(JournalRecord::LedgerAppended(entry.clone()));
        Ok(entry)
    }

    /// Sponsor-initiated top-up: records a pending deposit for review. No
    /// balance change until an admin approves it.
    pub fn request_top_up(
        &self,
        sponsor_id: &str,
        amount: i64,
        proof: &str,
        now: i64,
    ) -> Result<PendingDeposit, EngineError> {
        if amount <= 0 {
            return Err(EngineError::InvalidDepositAmount(amount));
        }
        // Existence check up front so a bad sponsor id fails loudly.
        let _ = self.account(sponsor_id)?;

        let deposit = PendingDeposit {
            transaction_id: self.next_transaction_id(),
            sponsor_id: sponsor_id.to_string(),
            amount,
            proof: proof.to_string(),
            state: DepositState::Pending,
            reject_reason: None,
            created_at: now,
            decided_at: None,
        };
        lock_mutex(&self.deposits).insert(deposit.transaction_id.clone(), deposit.clone());
        self.journal_push(JournalRecord::DepositUpserted(deposit.clone()));
        Ok(deposit)
    }

    /// Credit the wallet exactly once per transaction id. Re-approving an
    /// approved deposit is a no-op success, never a double credit.
    pub fn approve_deposit(
        &self,
        transaction_id: &str,
        now: i64,
    ) -> Result<PendingDeposit, EngineError> {
        let mut deposits = lock_mutex(&self.deposits);
        let deposit = deposits
            .get_mut(transaction_id)
            .ok_or_else(|| EngineError::UnknownDeposit(transaction_id.to_string()))?;

        match deposit.state {
            DepositState::Approved => return Ok(deposit.clone()),
            DepositState::Rejected => {
                return Err(EngineError::DepositAlreadyDecided(transaction_id.to_string()))
            }
            DepositState::Pending => {}
        }

        let handle = self.account(&deposit.sponsor_id)?;
        let mut account = lock_account(&handle);
        let entry = account
            .wallet
            .deposit(deposit.amount, transaction_id, now)?;

        deposit.state = DepositState::Approved;
        deposit.decided_at = Some(now);
        let decided = deposit.clone();
        self.journal_extend([
            JournalRecord::LedgerAppended(entry),
            JournalRecord::DepositUpserted(decided.clone()),
        ]);
        Ok(decided)
    }

    /// Mark the external transaction rejected. Writes no ledger entry.
    pub fn reject_deposit(
        &self,
        transaction_id: &str,
        reason: &str,
        now: i64,
    ) -> Result<PendingDeposit, EngineError> {
        let mut deposits = lock_mutex(&self.deposits);
        let deposit = deposits
            .get_mut(transaction_id)
            .ok_or_else(|| EngineError::UnknownDeposit(transaction_id.to_string()))?;

        match deposit.state {
            DepositState::Rejected => return Ok(deposit.clone()),
            DepositState::Approved => {
                return Err(EngineError::DepositAlreadyDecided(transaction_id.to_string()))
            }
            DepositState::Pending => {}
        }

        deposit.state = DepositState::Rejected;
        deposit.reject_reason = Some(reason.to_string());
        deposit.decided_at = Some(now);
        let decided = deposit.clone();
        self.journal_push(JournalRecord::DepositUpserted(decided.clone()));
        Ok(decided)
    }

    /// Bump the process-wide rate card. Already-active campaigns keep their
    /// snapshots; only future activations see the new version.
    pub fn update_rates(&self, feed: PlacementRates, result: PlacementRates) -> RateCard {
        let mut rates = write_lock(&self.rates);
        let card = RateCard {
            version: rates.version + 1,
            feed,
            result,
        };
        *rates = card;
        drop(rates);
        self.journal_push(JournalRecord::RateCardUpdated(card));
        card
    }

    pub fn create_campaign(
        &self,
        sponsor_id: &str,
        placement: Placement,
        budget_total: i64,
        now: i64,
    ) -> Result<Campaign, EngineError> {
        if budget_total <= 0 {
            return Err(EngineError::InvalidBudget(budget_total));
        }
        let handle = self.account(sponsor_id)?;
        let mut account = lock_account(&handle);
        let sequence = account.next_campaign_sequence;
        account.next_campaign_sequence += 1;
        let campaign_id = format!("cmp:{sponsor_id}:{sequence:04}");
        let created = campaign::new_campaign(&campaign_id, sponsor_id, placement, budget_total, now);
        account
            .campaigns
            .insert(campaign_id.clone(), created.clone());
        self.journal_push(JournalRecord::CampaignUpserted(created.clone()));
        drop(account);

        write_lock(&self.campaign_owners).insert(campaign_id, sponsor_id.to_string());
        Ok(created)
    }

    pub fn activate_campaign(&self, campaign_id: &str) -> Result<Campaign, EngineError> {
        let card = self.current_rates();
        self.mutate_campaign(campaign_id, |c| campaign::activate(c, &card))
    }

    pub fn pause_campaign(&self, campaign_id: &str) -> Result<Campaign, EngineError> {
        self.mutate_campaign(campaign_id, campaign::pause)
    }

    pub fn resume_campaign(&self, campaign_id: &str) -> Result<Campaign, EngineError> {
        self.mutate_campaign(campaign_id, campaign::resume)
    }

    pub fn suspend_campaign(&self, campaign_id: &str) -> Result<Campaign, EngineError> {
        self.mutate_campaign(campaign_id, campaign::admin_suspend)
    }

    pub fn unsuspend_campaign(&self, campaign_id: &str) -> Result<Campaign, EngineError> {
        self.mutate_campaign(campaign_id, campaign::admin_resume)
    }

    /// Operator acknowledgement for a reconciliation hold: re-align
    /// budget_spent with the ledger (the ledger wins) and release the hold.
    pub fn clear_reconciliation_hold(&self, campaign_id: &str) -> Result<Campaign, EngineError> {
        let sponsor_id = self.owner_of(campaign_id)?;
        let handle = self.account(&sponsor_id)?;
        let mut account = lock_account(&handle);
        let ledger_total = account.wallet.book().debit_total_for(campaign_id);
        let campaign = account
            .campaigns
            .get_mut(campaign_id)
            .ok_or_else(|| EngineError::UnknownCampaign(campaign_id.to_string()))?;
        campaign.budget_spent = ledger_total;
        if campaign.budget_spent >= campaign.budget_total {
            campaign::mark_out_of_budget(campaign);
        }
        let updated = campaign.clone();
        account.reconciliation_holds.remove(campaign_id);
        self.journal_push(JournalRecord::CampaignUpserted(updated.clone()));
        Ok(updated)
    }

    fn mutate_campaign(
        &self,
        campaign_id: &str,
        mutate: impl FnOnce(&mut Campaign) -> Result<(), crate::campaign::CampaignError>,
    ) -> Result<Campaign, EngineError> {
        let sponsor_id = self.owner_of(campaign_id)?;
        let handle = self.account(&sponsor_id)?;
        let mut account = lock_account(&handle);
        let campaign = account
            .campaigns
            .get_mut(campaign_id)
            .ok_or_else(|| EngineError::UnknownCampaign(campaign_id.to_string()))?;
        mutate(campaign)?;
        let updated = campaign.clone();
        self.journal_push(JournalRecord::CampaignUpserted(updated.clone()));
        Ok(updated)
    }
}
