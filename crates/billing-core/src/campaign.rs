//! Campaign state machine and spend accounting.

use std::fmt;

use contracts::{Campaign, CampaignStatus, Placement, RateCard, RateSnapshot};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CampaignError {
    InvalidTransition {
        from: CampaignStatus,
        action: &'static str,
    },
    NotActivated(String),
}

impl fmt::Display for CampaignError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidTransition { from, action } => {
                write!(f, "cannot {action} a campaign in status {from}")
            }
            Self::NotActivated(campaign_id) => {
                write!(f, "campaign {campaign_id} has no rate snapshot")
            }
        }
    }
}

impl std::error::Error for CampaignError {}

pub fn new_campaign(
    campaign_id: impl Into<String>,
    sponsor_id: impl Into<String>,
    placement: Placement,
    budget_total: i64,
    created_at: i64,
) -> Campaign {
    Campaign {
        campaign_id: campaign_id.into(),
        sponsor_id: sponsor_id.into(),
        placement,
        budget_total,
        budget_spent: 0,
        status: CampaignStatus::Draft,
        rate_snapshot: None,
        views_count: 0,
        clicks_count: 0,
        created_at,
    }
}

pub fn remaining_budget(campaign: &Campaign) -> i64 {
    campaign.budget_total - campaign.budget_spent
}

/// Draft -> Active, snapshotting the rate card in effect. The snapshot is
/// what every later billable event on this campaign is priced from.
pub fn activate(campaign: &mut Campaign, card: &RateCard) -> Result<(), CampaignError> {
    match campaign.status {
        CampaignStatus::Draft => {
            campaign.rate_snapshot = Some(RateSnapshot::from_card(card, campaign.placement));
            campaign.status = CampaignStatus::Active;
            Ok(())
        }
        from => Err(CampaignError::InvalidTransition {
            from,
            action: "activate",
        }),
    }
}

pub fn pause(campaign: &mut Campaign) -> Result<(), CampaignError> {
    match campaign.status {
        CampaignStatus::Active => {
            campaign.status = CampaignStatus::Paused;
            Ok(())
        }
        from => Err(CampaignError::InvalidTransition {
            from,
            action: "pause",
        }),
    }
}

/// Paused -> Active. Keeps the original rate snapshot; resuming is not a
/// re-activation and never reprices the campaign.
pub fn resume(campaign: &mut Campaign) -> Result<(), CampaignError> {
    match campaign.status {
        CampaignStatus::Paused => {
            if campaign.rate_snapshot.is_none() {
                return Err(CampaignError::NotActivated(campaign.campaign_id.clone()));
            }
            campaign.status = CampaignStatus::Active;
            Ok(())
        }
        from => Err(CampaignError::InvalidTransition {
            from,
            action: "resume",
        }),
    }
}

pub fn admin_suspend(campaign: &mut Campaign) -> Result<(), CampaignError> {
    match campaign.status {
        CampaignStatus::Draft | CampaignStatus::Active | CampaignStatus::Paused => {
            campaign.status = CampaignStatus::SuspendedByAdmin;
            Ok(())
        }
        from => Err(CampaignError::InvalidTransition {
            from,
            action: "suspend",
        }),
    }
}

/// SuspendedByAdmin -> Paused: the sponsor decides whether to resume serving.
pub fn admin_resume(campaign: &mut Campaign) -> Result<(), CampaignError> {
    match campaign.status {
        CampaignStatus::SuspendedByAdmin => {
            campaign.status = CampaignStatus::Paused;
            Ok(())
        }
        from => Err(CampaignError::InvalidTransition {
            from,
            action: "resume",
        }),
    }
}

pub fn mark_out_of_budget(campaign: &mut Campaign) {
    campaign.status = CampaignStatus::OutOfBudget;
}

/// Record a successful charge. Reaching the budget ceiling flips the status
/// synchronously so no further debit can be accepted.
pub fn record_spend(campaign: &mut Campaign, cost: i64) {
    campaign.budget_spent += cost;
    if campaign.budget_spent >= campaign.budget_total {
        campaign.status = CampaignStatus::OutOfBudget;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> Campaign {
        new_campaign("cmp:spn_001:0001", "spn_001", Placement::Feed, 100, 1)
    }

    #[test]
    fn activation_snapshots_current_card() {
        let mut campaign = draft();
        let card = RateCard::default();
        activate(&mut campaign, &card).expect("activate");

        assert_eq!(campaign.status, CampaignStatus::Active);
        let snapshot = campaign.rate_snapshot.expect("snapshot set");
        assert_eq!(snapshot.card_version, card.version);
        assert_eq!(snapshot.view_cost, card.feed.view_cost);
    }

    #[test]
    fn resume_keeps_original_snapshot() {
        let mut campaign = draft();
        let card = RateCard::default();
        activate(&mut campaign, &card).expect("activate");
        pause(&mut campaign).expect("pause");
        resume(&mut campaign).expect("resume");

        let snapshot = campaign.rate_snapshot.expect("snapshot kept");
        assert_eq!(snapshot.card_version, card.version);
    }

    #[test]
    fn spend_at_ceiling_flips_out_of_budget() {
        let mut campaign = draft();
        activate(&mut campaign, &RateCard::default()).expect("activate");
        record_spend(&mut campaign, 60);
        assert_eq!(campaign.status, CampaignStatus::Active);
        record_spend(&mut campaign, 40);
        assert_eq!(campaign.status, CampaignStatus::OutOfBudget);
        assert_eq!(remaining_budget(&campaign), 0);
    }

    #[test]
    fn out_of_budget_cannot_be_resumed() {
        let mut campaign = draft();
        activate(&mut campaign, &RateCard::default()).expect("activate");
        record_spend(&mut campaign, 100);

        let err = resume(&mut campaign).expect_err("resume should fail");
        assert!(matches!(
            err,
            CampaignError::InvalidTransition {
                from: CampaignStatus::OutOfBudget,
                ..
            }
        ));
    }
}
