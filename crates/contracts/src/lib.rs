//! v1 cross-boundary contracts for the billing engine, API, persistence, and CLI.

use std::fmt;

use serde::{Deserialize, Serialize};

pub mod serde_amount;

pub const SCHEMA_VERSION_V1: &str = "1.0";
pub const SECS_PER_DAY: i64 = 86_400;

/// Ad slots the platform rents out. Fixed set; campaigns target exactly one.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    Feed,
    Result,
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Feed => write!(f, "feed"),
            Self::Result => write!(f, "result"),
        }
    }
}

/// Per-placement billing rates in minor currency units (satang).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlacementRates {
    #[serde(with = "serde_amount")]
    pub view_cost: i64,
    #[serde(with = "serde_amount")]
    pub click_cost: i64,
}

/// Process-wide rate configuration. Versioned so campaigns can prove which
/// card they snapshotted at activation time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RateCard {
    pub version: u64,
    pub feed: PlacementRates,
    pub result: PlacementRates,
}

impl RateCard {
    pub fn rates_for(&self, placement: Placement) -> PlacementRates {
        match placement {
            Placement::Feed => self.feed,
            Placement::Result => self.result,
        }
    }
}

impl Default for RateCard {
    fn default() -> Self {
        Self {
            version: 1,
            feed: PlacementRates {
                view_cost: 45,
                click_cost: 300,
            },
            result: PlacementRates {
                view_cost: 60,
                click_cost: 400,
            },
        }
    }
}

/// Rates frozen onto a campaign when it activates. A later card update never
/// reprices events on an already-active campaign.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RateSnapshot {
    pub card_version: u64,
    #[serde(with = "serde_amount")]
    pub view_cost: i64,
    #[serde(with = "serde_amount")]
    pub click_cost: i64,
}

impl RateSnapshot {
    pub fn from_card(card: &RateCard, placement: Placement) -> Self {
        let rates = card.rates_for(placement);
        Self {
            card_version: card.version,
            view_cost: rates.view_cost,
            click_cost: rates.click_cost,
        }
    }
}

/// Non-billable placeholder ads served when no sponsor campaign is eligible.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HouseAds {
    pub feed: String,
    pub result: String,
}

impl HouseAds {
    pub fn for_placement(&self, placement: Placement) -> &str {
        match placement {
            Placement::Feed => &self.feed,
            Placement::Result => &self.result,
        }
    }
}

impl Default for HouseAds {
    fn default() -> Self {
        Self {
            feed: "house:feed_default".to_string(),
            result: "house:result_default".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EngineConfig {
    pub schema_version: String,
    pub engine_id: String,
    #[serde(with = "serde_amount::u64_string")]
    pub seed: u64,
    /// Retention window for processed dedup keys, in seconds.
    pub dedup_window_secs: i64,
    /// Time-bucket width used when deriving dedup keys server-side.
    pub dedup_bucket_secs: i64,
    pub initial_rates: RateCard,
    pub house_ads: HouseAds,
    pub notes: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            engine_id: "engine_local_001".to_string(),
            seed: 1337,
            dedup_window_secs: 600,
            dedup_bucket_secs: 60,
            initial_rates: RateCard::default(),
            house_ads: HouseAds::default(),
            notes: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SponsorStatus {
    Active,
    Suspended,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Sponsor {
    pub sponsor_id: String,
    pub status: SponsorStatus,
    pub created_at: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LedgerEntryKind {
    Deposit,
    Debit,
    Adjustment,
}

impl fmt::Display for LedgerEntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deposit => write!(f, "deposit"),
            Self::Debit => write!(f, "debit"),
            Self::Adjustment => write!(f, "adjustment"),
        }
    }
}

/// Immutable, append-only record of one balance-affecting event. The latest
/// entry's `resulting_balance` is the sole authority for a sponsor's wallet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerEntry {
    pub entry_id: String,
    pub sponsor_id: String,
    pub kind: LedgerEntryKind,
    /// Signed delta in minor units; negative for debits and debit-adjustments.
    #[serde(with = "serde_amount")]
    pub amount: i64,
    #[serde(with = "serde_amount")]
    pub resulting_balance: i64,
    /// campaign_id for debits, transaction_id for deposits, admin note for
    /// adjustments.
    pub reference: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Draft,
    Active,
    Paused,
    OutOfBudget,
    SuspendedByAdmin,
}

impl fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Draft => write!(f, "draft"),
            Self::Active => write!(f, "active"),
            Self::Paused => write!(f, "paused"),
            Self::OutOfBudget => write!(f, "out_of_budget"),
            Self::SuspendedByAdmin => write!(f, "suspended_by_admin"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Campaign {
    pub campaign_id: String,
    pub sponsor_id: String,
    pub placement: Placement,
    #[serde(with = "serde_amount")]
    pub budget_total: i64,
    #[serde(with = "serde_amount")]
    pub budget_spent: i64,
    pub status: CampaignStatus,
    /// Present once the campaign has been activated at least once.
    pub rate_snapshot: Option<RateSnapshot>,
    pub views_count: u64,
    pub clicks_count: u64,
    pub created_at: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BillableEventType {
    View,
    Click,
}

impl fmt::Display for BillableEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::View => write!(f, "view"),
            Self::Click => write!(f, "click"),
        }
    }
}

/// Outcome of one billable event. Every variant is an expected, reported
/// result; callers branch on it, nothing is thrown.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BillingOutcome {
    Charged {
        #[serde(with = "serde_amount")]
        cost: i64,
        #[serde(with = "serde_amount")]
        new_balance: i64,
        #[serde(with = "serde_amount")]
        budget_spent: i64,
        campaign_status: CampaignStatus,
    },
    Deduplicated,
    CampaignNotActive {
        status: CampaignStatus,
    },
    InsufficientFunds {
        campaign_status: CampaignStatus,
    },
    /// Safety net: campaign.budget_spent disagrees with the summed debit
    /// entries. Further debits on the campaign are halted until an operator
    /// clears the hold.
    ReconciliationMismatch {
        #[serde(with = "serde_amount")]
        budget_spent: i64,
        #[serde(with = "serde_amount")]
        ledger_debit_total: i64,
    },
}

/// Result of an ad-serving request. House ads are non-billable placeholders.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ServeDecision {
    Sponsored {
        campaign_id: String,
        sponsor_id: String,
        placement: Placement,
        /// Server-derived dedup key the client may reuse when reporting the
        /// impression for this viewer and time bucket.
        view_dedup_hint: String,
    },
    House {
        house_ad_id: String,
        placement: Placement,
    },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DepositState {
    Pending,
    Approved,
    Rejected,
}

/// Externally-proven top-up awaiting (or past) human review. Approval is
/// idempotent on transaction_id; rejection never writes a ledger entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PendingDeposit {
    pub transaction_id: String,
    pub sponsor_id: String,
    #[serde(with = "serde_amount")]
    pub amount: i64,
    pub proof: String,
    pub state: DepositState,
    pub reject_reason: Option<String>,
    pub created_at: i64,
    pub decided_at: Option<i64>,
}

/// One row of the derived daily-burn report: debit total for one campaign on
/// one UTC day. Never authoritative for balance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DailyBurnRow {
    pub day: String,
    pub campaign_id: String,
    #[serde(with = "serde_amount")]
    pub debit_total: i64,
    pub event_count: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    SponsorNotFound,
    CampaignNotFound,
    DepositNotFound,
    InvalidCommand,
    InvalidQuery,
    InvalidAdjustment,
    StateConflict,
    ContractVersionUnsupported,
    InternalError,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiError {
    pub schema_version: String,
    pub error_code: ErrorCode,
    pub message: String,
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(error_code: ErrorCode, message: impl Into<String>, details: Option<String>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            error_code,
            message: message.into(),
            details,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_snapshot_freezes_card_values() {
        let card = RateCard::default();
        let snapshot = RateSnapshot::from_card(&card, Placement::Result);
        assert_eq!(snapshot.card_version, card.version);
        assert_eq!(snapshot.view_cost, card.result.view_cost);
        assert_eq!(snapshot.click_cost, card.result.click_cost);
    }

    #[test]
    fn billing_outcome_serializes_tagged() {
        let outcome = BillingOutcome::Charged {
            cost: 45,
            new_balance: 955,
            budget_spent: 45,
            campaign_status: CampaignStatus::Active,
        };
        let value = serde_json::to_value(&outcome).expect("serialize");
        assert_eq!(value["outcome"], "charged");
        assert_eq!(value["cost"], "45");
    }

    #[test]
    fn serve_decision_round_trips() {
        let decision = ServeDecision::House {
            house_ad_id: "house:feed_default".to_string(),
            placement: Placement::Feed,
        };
        let raw = serde_json::to_string(&decision).expect("serialize");
        let decoded: ServeDecision = serde_json::from_str(&raw).expect("deserialize");
        assert_eq!(decision, decoded);
    }
}
