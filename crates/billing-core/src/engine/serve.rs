//! Ad selection. A pure read-then-pick: eligibility is computed from the
//! current account state but tolerates staleness; the billing pipeline is
//! the enforcement point, so at worst one extra impression is shown and its
//! charge is rejected there.

use contracts::{CampaignStatus, Placement, ServeDecision, SponsorStatus};

use super::{lock_account, lock_mutex, read_lock, AdEngine};
use crate::campaign;
use crate::dedup;
use crate::selector::{pick_weighted, CandidateAd};

impl AdEngine {
    pub fn select_ad(&self, placement: Placement, viewer_id: &str, now: i64) -> ServeDecision {
        let handles = read_lock(&self.accounts)
            .values()
            .cloned()
            .collect::<Vec<_>>();

        let mut candidates = Vec::new();
        for handle in handles {
            let account = lock_account(&handle);
            if account.sponsor.status != SponsorStatus::Active {
                continue;
            }
            if account.wallet.balance() <= 0 {
                continue;
            }
            for campaign in account.campaigns.values() {
                if campaign.placement != placement
                    || campaign.status != CampaignStatus::Active
                    || campaign.budget_spent >= campaign.budget_total
                    || account.reconciliation_holds.contains(&campaign.campaign_id)
                {
                    continue;
                }
                candidates.push(CandidateAd {
                    campaign_id: campaign.campaign_id.clone(),
                    sponsor_id: campaign.sponsor_id.clone(),
                    remaining_budget: campaign::remaining_budget(campaign),
                    created_at: campaign.created_at,
                });
            }
        }

        let picked = {
            let mut rng = lock_mutex(&self.selector_rng);
            pick_weighted(candidates, &mut rng)
        };

        match picked {
            Some(candidate) => {
                let view_dedup_hint = dedup::derive_key(
                    &candidate.campaign_id,
                    viewer_id,
                    contracts::BillableEventType::View,
                    now,
                    self.config.dedup_bucket_secs,
                );
                ServeDecision::Sponsored {
                    campaign_id: candidate.campaign_id,
                    sponsor_id: candidate.sponsor_id,
                    placement,
                    view_dedup_hint,
                }
            }
            None => ServeDecision::House {
                house_ad_id: self.config.house_ads.for_placement(placement).to_string(),
                placement,
            },
        }
    }
}
