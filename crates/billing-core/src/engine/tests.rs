use contracts::{
    BillableEventType, BillingOutcome, CampaignStatus, DepositState, EngineConfig, Placement,
    PlacementRates, ServeDecision, SponsorStatus,
};

use super::*;

fn engine() -> AdEngine {
    AdEngine::new(EngineConfig::default())
}

/// Sponsor with an approved balance and one active feed campaign.
fn funded_campaign(engine: &AdEngine, sponsor_id: &str, balance: i64, budget: i64) -> String {
    engine.register_sponsor(sponsor_id, 1).expect("register");
    let deposit = engine
        .request_top_up(sponsor_id, balance, "slip.jpg", 2)
        .expect("top up");
    engine
        .approve_deposit(&deposit.transaction_id, 3)
        .expect("approve");
    let campaign = engine
        .create_campaign(sponsor_id, Placement::Feed, budget, 4)
        .expect("create");
    engine
        .activate_campaign(&campaign.campaign_id)
        .expect("activate");
    campaign.campaign_id
}

#[test]
fn three_views_burn_down_to_865() {
    let engine = engine();
    let campaign_id = funded_campaign(&engine, "spn_001", 1000, 1000);

    for (key, expected) in [("k1", 955), ("k2", 910), ("k3", 865)] {
        let outcome = engine
            .record_event(&campaign_id, BillableEventType::View, key, 10)
            .expect("record");
        match outcome {
            BillingOutcome::Charged {
                cost, new_balance, ..
            } => {
                assert_eq!(cost, 45);
                assert_eq!(new_balance, expected);
            }
            other => panic!("expected charge, got {other:?}"),
        }
    }

    assert_eq!(engine.balance("spn_001").expect("balance"), 865);
    let entries = engine.ledger_entries("spn_001").expect("entries");
    assert!(entries.iter().all(|entry| entry.resulting_balance >= 0));
    assert_eq!(
        entries.last().map(|entry| entry.resulting_balance),
        Some(865)
    );
}

#[test]
fn budget_ceiling_rejects_without_truncating() {
    let engine = engine();
    let campaign_id = funded_campaign(&engine, "spn_001", 10_000, 100);

    // Two charges at view cost 45 leave the budget at 90 of 100.
    for key in ["k1", "k2"] {
        engine
            .record_event(&campaign_id, BillableEventType::View, key, 10)
            .expect("record");
    }
    assert_eq!(engine.campaign(&campaign_id).expect("campaign").budget_spent, 90);

    let outcome = engine
        .record_event(&campaign_id, BillableEventType::View, "k3", 11)
        .expect("record");
    assert_eq!(
        outcome,
        BillingOutcome::InsufficientFunds {
            campaign_status: CampaignStatus::OutOfBudget
        }
    );

    let campaign = engine.campaign(&campaign_id).expect("campaign");
    assert_eq!(campaign.status, CampaignStatus::OutOfBudget);
    assert_eq!(campaign.budget_spent, 90);
    // Rejected event wrote nothing to the ledger.
    assert_eq!(engine.balance("spn_001").expect("balance"), 10_000 - 90);
}

#[test]
fn replayed_dedup_key_charges_once() {
    let engine = engine();
    let campaign_id = funded_campaign(&engine, "spn_001", 1000, 1000);

    let first = engine
        .record_event(&campaign_id, BillableEventType::View, "dup", 10)
        .expect("record");
    assert!(matches!(first, BillingOutcome::Charged { .. }));

    let second = engine
        .record_event(&campaign_id, BillableEventType::View, "dup", 11)
        .expect("record");
    assert_eq!(second, BillingOutcome::Deduplicated);

    let debits = engine
        .ledger_entries("spn_001")
        .expect("entries")
        .iter()
        .filter(|entry| entry.kind == contracts::LedgerEntryKind::Debit)
        .count();
    assert_eq!(debits, 1);
    assert_eq!(engine.campaign(&campaign_id).expect("campaign").budget_spent, 45);
}

#[test]
fn dedup_key_expires_after_retention_window() {
    let mut config = EngineConfig::default();
    config.dedup_window_secs = 600;
    let engine = AdEngine::new(config);
    let campaign_id = funded_campaign(&engine, "spn_001", 1000, 1000);

    engine
        .record_event(&campaign_id, BillableEventType::View, "dup", 100)
        .expect("record");
    let replay = engine
        .record_event(&campaign_id, BillableEventType::View, "dup", 800)
        .expect("record");
    // Outside the window the key is billable again.
    assert!(matches!(replay, BillingOutcome::Charged { .. }));
}

#[test]
fn paused_campaign_drops_the_charge() {
    let engine = engine();
    let campaign_id = funded_campaign(&engine, "spn_001", 1000, 1000);
    engine.pause_campaign(&campaign_id).expect("pause");

    let outcome = engine
        .record_event(&campaign_id, BillableEventType::View, "k1", 10)
        .expect("record");
    assert_eq!(
        outcome,
        BillingOutcome::CampaignNotActive {
            status: CampaignStatus::Paused
        }
    );
    assert_eq!(engine.balance("spn_001").expect("balance"), 1000);
}

#[test]
fn suspended_sponsor_is_never_selected() {
    let engine = engine();
    let campaign_id = funded_campaign(&engine, "spn_001", 1000, 1000);

    match engine.select_ad(Placement::Feed, "viewer_1", 10) {
        ServeDecision::Sponsored {
            campaign_id: picked,
            ..
        } => assert_eq!(picked, campaign_id),
        other => panic!("expected sponsored ad, got {other:?}"),
    }

    engine.suspend_sponsor("spn_001").expect("suspend");
    assert_eq!(
        engine.sponsor("spn_001").expect("sponsor").status,
        SponsorStatus::Suspended
    );

    for sequence in 0..32 {
        match engine.select_ad(Placement::Feed, "viewer_1", 10 + sequence) {
            ServeDecision::House { house_ad_id, .. } => {
                assert_eq!(house_ad_id, "house:feed_default")
            }
            other => panic!("suspended sponsor served: {other:?}"),
        }
    }
}

#[test]
fn selection_respects_placement() {
    let engine = engine();
    let _feed = funded_campaign(&engine, "spn_001", 1000, 1000);

    match engine.select_ad(Placement::Result, "viewer_1", 10) {
        ServeDecision::House { house_ad_id, .. } => {
            assert_eq!(house_ad_id, "house:result_default")
        }
        other => panic!("feed campaign served on result placement: {other:?}"),
    }
}

#[test]
fn negative_adjustment_below_balance_is_rejected() {
    let engine = engine();
    engine.register_sponsor("spn_001", 1).expect("register");
    let deposit = engine
        .request_top_up("spn_001", 30, "slip.jpg", 2)
        .expect("top up");
    engine
        .approve_deposit(&deposit.transaction_id, 3)
        .expect("approve");

    let err = engine
        .adjust_wallet("spn_001", -50, "billing dispute", 4)
        .expect_err("should reject");
    assert!(matches!(
        err,
        EngineError::Wallet(WalletError::InvalidAdjustment { balance: 30, amount: -50 })
    ));
    assert_eq!(engine.balance("spn_001").expect("balance"), 30);
}

#[test]
fn adjustment_requires_reason() {
    let engine = engine();
    engine.register_sponsor("spn_001", 1).expect("register");
    let err = engine
        .adjust_wallet("spn_001", 100, "   ", 2)
        .expect_err("should reject");
    assert_eq!(err, EngineError::EmptyAdjustmentReason);
}

#[test]
fn deposit_approval_is_idempotent() {
    let engine = engine();
    engine.register_sponsor("spn_001", 1).expect("register");
    let deposit = engine
        .request_top_up("spn_001", 500, "slip.jpg", 2)
        .expect("top up");

    engine
        .approve_deposit(&deposit.transaction_id, 3)
        .expect("first approve");
    engine
        .approve_deposit(&deposit.transaction_id, 4)
        .expect("second approve is a no-op");

    assert_eq!(engine.balance("spn_001").expect("balance"), 500);
    assert_eq!(engine.ledger_entries("spn_001").expect("entries").len(), 1);
}

#[test]
fn rejected_deposit_writes_no_ledger_entry() {
    let engine = engine();
    engine.register_sponsor("spn_001", 1).expect("register");
    let deposit = engine
        .request_top_up("spn_001", 500, "slip.jpg", 2)
        .expect("top up");

    let rejected = engine
        .reject_deposit(&deposit.transaction_id, "unreadable slip", 3)
        .expect("reject");
    assert_eq!(rejected.state, DepositState::Rejected);
    assert_eq!(rejected.reject_reason.as_deref(), Some("unreadable slip"));
    assert!(engine.ledger_entries("spn_001").expect("entries").is_empty());

    // A decided deposit cannot flip to the other decision.
    let err = engine
        .approve_deposit(&deposit.transaction_id, 4)
        .expect_err("approve after reject");
    assert!(matches!(err, EngineError::DepositAlreadyDecided(_)));
}

#[test]
fn rate_update_never_reprices_active_campaigns() {
    let engine = engine();
    let campaign_id = funded_campaign(&engine, "spn_001", 1000, 1000);

    engine.update_rates(
        PlacementRates {
            view_cost: 90,
            click_cost: 600,
        },
        PlacementRates {
            view_cost: 120,
            click_cost: 800,
        },
    );

    let outcome = engine
        .record_event(&campaign_id, BillableEventType::View, "k1", 10)
        .expect("record");
    match outcome {
        BillingOutcome::Charged { cost, .. } => assert_eq!(cost, 45),
        other => panic!("expected charge, got {other:?}"),
    }

    // A campaign activated after the update snapshots the new card.
    let fresh = engine
        .create_campaign("spn_001", Placement::Feed, 500, 20)
        .expect("create");
    engine
        .activate_campaign(&fresh.campaign_id)
        .expect("activate");
    let outcome = engine
        .record_event(&fresh.campaign_id, BillableEventType::View, "k2", 21)
        .expect("record");
    match outcome {
        BillingOutcome::Charged { cost, .. } => assert_eq!(cost, 90),
        other => panic!("expected charge, got {other:?}"),
    }
}

#[test]
fn clicks_bill_at_click_cost() {
    let engine = engine();
    let campaign_id = funded_campaign(&engine, "spn_001", 1000, 1000);
    let outcome = engine
        .record_event(&campaign_id, BillableEventType::Click, "c1", 10)
        .expect("record");
    match outcome {
        BillingOutcome::Charged { cost, .. } => assert_eq!(cost, 300),
        other => panic!("expected charge, got {other:?}"),
    }
    assert_eq!(engine.campaign(&campaign_id).expect("campaign").clicks_count, 1);
}

#[test]
fn reconciliation_mismatch_halts_and_clears() {
    let engine = engine();
    let campaign_id = funded_campaign(&engine, "spn_001", 1000, 1000);
    engine
        .record_event(&campaign_id, BillableEventType::View, "k1", 10)
        .expect("record");
    assert!(engine.verify_campaign_spend(&campaign_id).expect("verify"));

    // Corrupt the mirror the way a partial-apply bug would.
    {
        let handle = engine.account("spn_001").expect("account");
        let mut account = lock_account(&handle);
        let campaign = account.campaigns.get_mut(&campaign_id).expect("campaign");
        campaign.budget_spent += 5;
    }
    assert!(!engine.verify_campaign_spend(&campaign_id).expect("verify"));

    let outcome = engine
        .record_event(&campaign_id, BillableEventType::View, "k2", 11)
        .expect("record");
    assert_eq!(
        outcome,
        BillingOutcome::ReconciliationMismatch {
            budget_spent: 50,
            ledger_debit_total: 45
        }
    );

    // Held campaigns drop out of selection even though budget remains.
    assert!(matches!(
        engine.select_ad(Placement::Feed, "viewer_1", 12),
        ServeDecision::House { .. }
    ));

    // Operator clears the hold: ledger wins, billing resumes.
    let repaired = engine
        .clear_reconciliation_hold(&campaign_id)
        .expect("clear hold");
    assert_eq!(repaired.budget_spent, 45);
    let outcome = engine
        .record_event(&campaign_id, BillableEventType::View, "k2", 13)
        .expect("record");
    assert!(matches!(outcome, BillingOutcome::Charged { .. }));
}

#[test]
fn journal_drain_and_requeue_preserve_order() {
    let engine = engine();
    let campaign_id = funded_campaign(&engine, "spn_001", 1000, 1000);
    engine
        .record_event(&campaign_id, BillableEventType::View, "k1", 10)
        .expect("record");

    let drained = engine.drain_journal();
    assert!(!drained.is_empty());
    assert!(engine.drain_journal().is_empty());

    engine.requeue_journal(drained.clone());
    engine
        .record_event(&campaign_id, BillableEventType::View, "k2", 11)
        .expect("record");
    let merged = engine.drain_journal();
    assert_eq!(merged[..drained.len()], drained[..]);
    assert!(merged.len() > drained.len());
}

#[test]
fn restore_round_trips_engine_state() {
    let engine = engine();
    let campaign_id = funded_campaign(&engine, "spn_001", 1000, 500);
    engine
        .record_event(&campaign_id, BillableEventType::View, "k1", 10)
        .expect("record");

    let mut ledgers = std::collections::BTreeMap::new();
    ledgers.insert(
        "spn_001".to_string(),
        engine.ledger_entries("spn_001").expect("entries"),
    );
    let restored = AdEngine::restore(
        engine.config().clone(),
        vec![engine.sponsor("spn_001").expect("sponsor")],
        ledgers,
        engine.campaigns_for_sponsor("spn_001").expect("campaigns"),
        engine.deposits_for_sponsor("spn_001"),
        engine.current_rates(),
    );

    assert_eq!(restored.balance("spn_001").expect("balance"), 955);
    assert!(restored.verify_campaign_spend(&campaign_id).expect("verify"));

    // Sequences continue past restored ids.
    let next = restored
        .create_campaign("spn_001", Placement::Result, 200, 20)
        .expect("create");
    assert_eq!(next.campaign_id, "cmp:spn_001:0002");
    let deposit = restored
        .request_top_up("spn_001", 100, "slip.jpg", 21)
        .expect("top up");
    assert_eq!(deposit.transaction_id, "txn:00000002");
}

#[test]
fn inspect_sponsor_summarizes_account() {
    let engine = engine();
    let campaign_id = funded_campaign(&engine, "spn_001", 1000, 500);
    engine
        .record_event(&campaign_id, BillableEventType::View, "k1", 10)
        .expect("record");

    let summary = engine.inspect_sponsor("spn_001").expect("inspect");
    assert_eq!(summary["balance"], 955);
    assert_eq!(summary["campaigns"][0]["budget_spent"], 45);
    assert_eq!(summary["campaigns"][0]["reconciliation_hold"], false);
}
