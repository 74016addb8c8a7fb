use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;

use billing_core::AdEngine;
use contracts::{
    BillableEventType, BillingOutcome, CampaignStatus, EngineConfig, LedgerEntryKind, Placement,
};
use proptest::prelude::*;

fn engine_with_funded_campaign(balance: i64, budget: i64) -> (AdEngine, String) {
    let engine = AdEngine::new(EngineConfig::default());
    engine.register_sponsor("spn_001", 1).expect("register");
    let deposit = engine
        .request_top_up("spn_001", balance, "slip.jpg", 2)
        .expect("top up");
    engine
        .approve_deposit(&deposit.transaction_id, 3)
        .expect("approve");
    let campaign = engine
        .create_campaign("spn_001", Placement::Feed, budget, 4)
        .expect("create");
    engine
        .activate_campaign(&campaign.campaign_id)
        .expect("activate");
    (engine, campaign.campaign_id)
}

#[test]
fn concurrent_views_settle_at_865_with_no_negative_intermediate() {
    let (engine, campaign_id) = engine_with_funded_campaign(1000, 1000);
    let engine = Arc::new(engine);

    let handles = (0..3)
        .map(|index| {
            let engine = Arc::clone(&engine);
            let campaign_id = campaign_id.clone();
            thread::spawn(move || {
                engine
                    .record_event(
                        &campaign_id,
                        BillableEventType::View,
                        &format!("viewer_{index}"),
                        10,
                    )
                    .expect("record")
            })
        })
        .collect::<Vec<_>>();

    for handle in handles {
        let outcome = handle.join().expect("thread");
        assert!(matches!(outcome, BillingOutcome::Charged { cost: 45, .. }));
    }

    let entries = engine.ledger_entries("spn_001").expect("entries");
    let debits = entries
        .iter()
        .filter(|entry| entry.kind == LedgerEntryKind::Debit)
        .collect::<Vec<_>>();
    assert_eq!(debits.len(), 3);
    assert!(entries.iter().all(|entry| entry.resulting_balance >= 0));
    assert_eq!(engine.balance("spn_001").expect("balance"), 865);
}

#[test]
fn exactly_k_of_n_concurrent_events_charge() {
    // Wallet funds 8 charges at 45; 32 threads race for them.
    let (engine, campaign_id) = engine_with_funded_campaign(8 * 45, 1_000_000);
    let engine = Arc::new(engine);

    let handles = (0..32)
        .map(|index| {
            let engine = Arc::clone(&engine);
            let campaign_id = campaign_id.clone();
            thread::spawn(move || {
                engine
                    .record_event(
                        &campaign_id,
                        BillableEventType::View,
                        &format!("viewer_{index}"),
                        10,
                    )
                    .expect("record")
            })
        })
        .collect::<Vec<_>>();

    let mut charged = 0;
    let mut rejected = 0;
    for handle in handles {
        match handle.join().expect("thread") {
            BillingOutcome::Charged { new_balance, .. } => {
                assert!(new_balance >= 0);
                charged += 1;
            }
            BillingOutcome::InsufficientFunds { .. } | BillingOutcome::CampaignNotActive { .. } => {
                rejected += 1
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    assert_eq!(charged, 8);
    assert_eq!(rejected, 24);
    assert_eq!(engine.balance("spn_001").expect("balance"), 0);
    assert_eq!(
        engine.campaign(&campaign_id).expect("campaign").status,
        CampaignStatus::OutOfBudget
    );
}

#[test]
fn concurrent_replays_of_one_key_charge_once() {
    let (engine, campaign_id) = engine_with_funded_campaign(10_000, 10_000);
    let engine = Arc::new(engine);

    let handles = (0..16)
        .map(|_| {
            let engine = Arc::clone(&engine);
            let campaign_id = campaign_id.clone();
            thread::spawn(move || {
                engine
                    .record_event(&campaign_id, BillableEventType::View, "same_key", 10)
                    .expect("record")
            })
        })
        .collect::<Vec<_>>();

    let outcomes = handles
        .into_iter()
        .map(|handle| handle.join().expect("thread"))
        .collect::<Vec<_>>();

    let charged = outcomes
        .iter()
        .filter(|outcome| matches!(outcome, BillingOutcome::Charged { .. }))
        .count();
    let deduplicated = outcomes
        .iter()
        .filter(|outcome| matches!(outcome, BillingOutcome::Deduplicated))
        .count();
    assert_eq!(charged, 1);
    assert_eq!(deduplicated, 15);
    assert_eq!(engine.campaign(&campaign_id).expect("campaign").budget_spent, 45);
}

#[test]
fn sponsors_do_not_interfere_under_parallel_load() {
    let engine = Arc::new(AdEngine::new(EngineConfig::default()));
    let mut campaign_ids = Vec::new();
    for index in 0..4 {
        let sponsor_id = format!("spn_{index:03}");
        engine.register_sponsor(&sponsor_id, 1).expect("register");
        let deposit = engine
            .request_top_up(&sponsor_id, 45 * 10, "slip.jpg", 2)
            .expect("top up");
        engine
            .approve_deposit(&deposit.transaction_id, 3)
            .expect("approve");
        let campaign = engine
            .create_campaign(&sponsor_id, Placement::Feed, 45 * 10, 4)
            .expect("create");
        engine
            .activate_campaign(&campaign.campaign_id)
            .expect("activate");
        campaign_ids.push((sponsor_id, campaign.campaign_id));
    }

    let handles = campaign_ids
        .iter()
        .cloned()
        .map(|(_, campaign_id)| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                for event in 0..10 {
                    engine
                        .record_event(
                            &campaign_id,
                            BillableEventType::View,
                            &format!("viewer_{event}"),
                            10,
                        )
                        .expect("record");
                }
            })
        })
        .collect::<Vec<_>>();
    for handle in handles {
        handle.join().expect("thread");
    }

    for (sponsor_id, campaign_id) in campaign_ids {
        assert_eq!(engine.balance(&sponsor_id).expect("balance"), 0);
        let campaign = engine.campaign(&campaign_id).expect("campaign");
        assert_eq!(campaign.budget_spent, 450);
        assert_eq!(campaign.status, CampaignStatus::OutOfBudget);
        assert!(engine.verify_campaign_spend(&campaign_id).expect("verify"));
    }
}

#[test]
fn ledger_entry_ids_stay_unique_under_concurrency() {
    let (engine, campaign_id) = engine_with_funded_campaign(45 * 64, 45 * 64);
    let engine = Arc::new(engine);

    let handles = (0..64)
        .map(|index| {
            let engine = Arc::clone(&engine);
            let campaign_id = campaign_id.clone();
            thread::spawn(move || {
                let _ = engine.record_event(
                    &campaign_id,
                    BillableEventType::View,
                    &format!("viewer_{index}"),
                    10,
                );
            })
        })
        .collect::<Vec<_>>();
    for handle in handles {
        handle.join().expect("thread");
    }

    let entries = engine.ledger_entries("spn_001").expect("entries");
    let ids = entries
        .iter()
        .map(|entry| entry.entry_id.clone())
        .collect::<BTreeSet<_>>();
    assert_eq!(ids.len(), entries.len());
}

#[derive(Debug, Clone)]
enum WalletOp {
    Deposit(i64),
    Adjust(i64),
    ViewEvent(u8),
}

fn wallet_op() -> impl Strategy<Value = WalletOp> {
    prop_oneof![
        (1_i64..5_000).prop_map(WalletOp::Deposit),
        (-2_000_i64..2_000).prop_map(WalletOp::Adjust),
        any::<u8>().prop_map(WalletOp::ViewEvent),
    ]
}

proptest! {
    /// Any sequence of deposits, signed adjustments, and billable events
    /// keeps the balance non-negative and equal to the latest entry's
    /// resulting_balance, and never lets budget_spent pass budget_total.
    #[test]
    fn invariants_hold_for_arbitrary_op_sequences(ops in prop::collection::vec(wallet_op(), 1..60)) {
        let (engine, campaign_id) = engine_with_funded_campaign(500, 2_000);
        let mut now = 10_i64;

        for op in ops {
            now += 1;
            match op {
                WalletOp::Deposit(amount) => {
                    let deposit = engine
                        .request_top_up("spn_001", amount, "slip.jpg", now)
                        .expect("top up");
                    engine.approve_deposit(&deposit.transaction_id, now).expect("approve");
                }
                WalletOp::Adjust(amount) => {
                    if amount != 0 {
                        // Underflowing adjustments must be rejected without a write.
                        let _ = engine.adjust_wallet("spn_001", amount, "proptest", now);
                    }
                }
                WalletOp::ViewEvent(key) => {
                    let _ = engine
                        .record_event(
                            &campaign_id,
                            BillableEventType::View,
                            &format!("k{key}_{now}"),
                            now,
                        )
                        .expect("record");
                }
            }

            let balance = engine.balance("spn_001").expect("balance");
            prop_assert!(balance >= 0);

            let entries = engine.ledger_entries("spn_001").expect("entries");
            prop_assert_eq!(
                balance,
                entries.last().map(|entry| entry.resulting_balance).unwrap_or(0)
            );
            prop_assert!(entries.iter().all(|entry| entry.resulting_balance >= 0));

            let campaign = engine.campaign(&campaign_id).expect("campaign");
            prop_assert!(campaign.budget_spent <= campaign.budget_total);
            prop_assert!(engine.verify_campaign_spend(&campaign_id).expect("verify"));
        }
    }
}
