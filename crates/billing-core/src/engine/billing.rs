//! The billing pipeline: one billable event in, at most one ledger debit and
//! one budget increment out, applied as a single unit under the sponsor lock.

use contracts::{BillableEventType, BillingOutcome, CampaignStatus};

use super::{lock_account, AdEngine, EngineError, JournalRecord};
use crate::campaign;
use crate::wallet::WalletError;

impl AdEngine {
    /// Record a view or click against a campaign. Every expected rejection
    /// is a returned [`BillingOutcome`]; only unknown ids are errors.
    ///
    /// The whole sequence from dedup check through wallet debit and spend
    /// increment runs under the owning sponsor's mutex, so no interleaving
    /// can debit the wallet without incrementing the campaign or vice versa.
    pub fn record_event(
        &self,
        campaign_id: &str,
        event_type: BillableEventType,
        dedup_key: &str,
        now: i64,
    ) -> Result<BillingOutcome, EngineError> {
        let sponsor_id = self.owner_of(campaign_id)?;
        let handle = self.account(&sponsor_id)?;
        let mut account = lock_account(&handle);

        account.dedup.prune(now, self.config.dedup_window_secs);
        if account.dedup.is_duplicate(campaign_id, event_type, dedup_key) {
            return Ok(BillingOutcome::Deduplicated);
        }

        let campaign = account
            .campaigns
            .get(campaign_id)
            .ok_or_else(|| EngineError::UnknownCampaign(campaign_id.to_string()))?;
        if campaign.status != CampaignStatus::Active {
            return Ok(BillingOutcome::CampaignNotActive {
                status: campaign.status,
            });
        }

        // Safety net: the atomicity guarantee should make this unreachable.
        // If spent and ledger disagree, halt debits on this campaign until an
        // operator clears the hold.
        let ledger_debit_total = account.wallet.book().debit_total_for(campaign_id);
        let budget_spent = campaign.budget_spent;
        if account.reconciliation_holds.contains(campaign_id) || budget_spent != ledger_debit_total
        {
            account.reconciliation_holds.insert(campaign_id.to_string());
            return Ok(BillingOutcome::ReconciliationMismatch {
                budget_spent,
                ledger_debit_total,
            });
        }

        let Some(snapshot) = campaign.rate_snapshot else {
            // Active without a snapshot cannot be reached through the state
            // machine; treat it as not billable rather than guessing a rate.
            return Ok(BillingOutcome::CampaignNotActive {
                status: campaign.status,
            });
        };
        let cost = match event_type {
            BillableEventType::View => snapshot.view_cost,
            BillableEventType::Click => snapshot.click_cost,
        };

        // Budget ceiling first: the event that would cross it is rejected
        // outright, never truncated, and no ledger write happens.
        if campaign.budget_spent + cost > campaign.budget_total {
            let campaign = account
                .campaigns
                .get_mut(campaign_id)
                .ok_or_else(|| EngineError::UnknownCampaign(campaign_id.to_string()))?;
            campaign::mark_out_of_budget(campaign);
            let updated = campaign.clone();
            self.journal_push(JournalRecord::CampaignUpserted(updated));
            return Ok(BillingOutcome::InsufficientFunds {
                campaign_status: CampaignStatus::OutOfBudget,
            });
        }

        let entry = match account.wallet.try_debit(cost, campaign_id, now) {
            Ok(entry) => entry,
            Err(WalletError::InsufficientFunds { .. }) => {
                let campaign = account
                    .campaigns
                    .get_mut(campaign_id)
                    .ok_or_else(|| EngineError::UnknownCampaign(campaign_id.to_string()))?;
                campaign::mark_out_of_budget(campaign);
                let updated = campaign.clone();
                self.journal_push(JournalRecord::CampaignUpserted(updated));
                return Ok(BillingOutcome::InsufficientFunds {
                    campaign_status: CampaignStatus::OutOfBudget,
                });
            }
            Err(other) => return Err(EngineError::Wallet(other)),
        };
        let new_balance = entry.resulting_balance;

        let campaign = account
            .campaigns
            .get_mut(campaign_id)
            .ok_or_else(|| EngineError::UnknownCampaign(campaign_id.to_string()))?;
        campaign::record_spend(campaign, cost);
        match event_type {
            BillableEventType::View => campaign.views_count += 1,
            BillableEventType::Click => campaign.clicks_count += 1,
        }
        let budget_spent = campaign.budget_spent;
        let campaign_status = campaign.status;
        let updated = campaign.clone();

        account.dedup.mark(campaign_id, event_type, dedup_key, now);

        // Journal while still holding the sponsor lock so records for one
        // sponsor land in commit order.
        self.journal_extend([
            JournalRecord::LedgerAppended(entry),
            JournalRecord::CampaignUpserted(updated),
        ]);

        Ok(BillingOutcome::Charged {
            cost,
            new_balance,
            budget_spent,
            campaign_status,
        })
    }
}
