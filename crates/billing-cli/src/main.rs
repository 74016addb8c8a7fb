use std::env;
use std::net::SocketAddr;
use std::sync::Arc;

use billing_api::{serve, EngineApi};
use contracts::{BillableEventType, EngineConfig, Placement, ServeDecision};

fn print_usage() {
    println!("billing-cli <command>");
    println!("commands:");
    println!("  serve [addr] [sqlite_path]");
    println!("    default addr: 127.0.0.1:8080");
    println!("  demo [sqlite_path]");
    println!("    seeds sponsors and campaigns, runs synthetic traffic, persists to sqlite");
    println!("  burn <sqlite_path> <sponsor_id> <from_day> <to_day>");
    println!("    prints the persisted daily burn report");
}

fn parse_socket_addr(value: Option<&String>) -> Result<SocketAddr, String> {
    let raw = value.map(String::as_str).unwrap_or("127.0.0.1:8080");
    raw.parse::<SocketAddr>()
        .map_err(|_| format!("invalid addr: {raw}"))
}

fn default_sqlite_path() -> String {
    std::env::var("ADENGINE_SQLITE_PATH")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| "adengine.sqlite".to_string())
}

fn parse_sqlite_path(value: Option<&String>) -> String {
    value
        .map(String::to_string)
        .filter(|path| !path.trim().is_empty())
        .unwrap_or_else(default_sqlite_path)
}

fn parse_day(value: Option<&String>, label: &str) -> Result<i64, String> {
    let raw = value.ok_or_else(|| format!("missing {label}"))?;
    raw.parse::<i64>()
        .map_err(|_| format!("invalid {label}: {raw}"))
}

fn run_demo(args: &[String]) -> Result<(), String> {
    let sqlite_path = parse_sqlite_path(args.get(2));

    let api = EngineApi::open_with_store(EngineConfig::default(), &sqlite_path)
        .map_err(|err| format!("failed to open sqlite store: {err}"))?;

    for index in 1..=3 {
        let sponsor_id = format!("spn_{index:03}");
        api.register_sponsor(&sponsor_id)
            .map_err(|err| format!("failed to register {sponsor_id}: {err}"))?;

        let deposit = api
            .request_top_up(&sponsor_id, 50_000, "demo-slip.jpg")
            .map_err(|err| format!("failed to top up {sponsor_id}: {err}"))?;
        api.approve_deposit(&deposit.transaction_id)
            .map_err(|err| format!("failed to approve deposit: {err}"))?;

        let placement = if index % 2 == 0 {
            Placement::Result
        } else {
            Placement::Feed
        };
        let campaign = api
            .create_campaign(&sponsor_id, placement, 20_000)
            .map_err(|err| format!("failed to create campaign: {err}"))?;
        api.campaign_action(&campaign.campaign_id, billing_api::CampaignAction::Activate)
            .map_err(|err| format!("failed to activate campaign: {err}"))?;
    }

    let mut charged = 0_u64;
    let mut house = 0_u64;
    for round in 0..200 {
        let viewer = format!("viewer_{:03}", round % 40);
        let placement = if round % 3 == 0 {
            Placement::Result
        } else {
            Placement::Feed
        };

        match api.select_ad(placement, &viewer) {
            ServeDecision::Sponsored {
                campaign_id,
                view_dedup_hint,
                ..
            } => {
                let outcome = api
                    .record_event(&campaign_id, BillableEventType::View, &view_dedup_hint)
                    .map_err(|err| format!("billable event failed: {err}"))?;
                if matches!(outcome, contracts::BillingOutcome::Charged { .. }) {
                    charged += 1;
                }
            }
            ServeDecision::House { .. } => house += 1,
        }
    }

    if let Some(error) = api.last_persistence_error() {
        return Err(format!("persistence error after demo: {error}"));
    }

    println!(
        "demo complete: charged={} house_fills={} sqlite={}",
        charged, house, sqlite_path
    );
    for sponsor_id in api.engine().sponsor_ids() {
        let balance = api
            .engine()
            .balance(&sponsor_id)
            .map_err(|err| format!("failed to read balance: {err}"))?;
        println!("  {sponsor_id}: balance={balance}");
    }
    Ok(())
}

fn run_burn_report(args: &[String]) -> Result<(), String> {
    let sqlite_path = args
        .get(2)
        .cloned()
        .ok_or_else(|| "missing sqlite_path".to_string())?;
    let sponsor_id = args
        .get(3)
        .cloned()
        .ok_or_else(|| "missing sponsor_id".to_string())?;
    let from_day = parse_day(args.get(4), "from_day")?;
    let to_day = parse_day(args.get(5), "to_day")?;

    let api = EngineApi::open_with_store(EngineConfig::default(), &sqlite_path)
        .map_err(|err| format!("failed to open sqlite store: {err}"))?;

    let rows = api
        .daily_burn_persisted(&sponsor_id, from_day, to_day)
        .map_err(|err| format!("failed to load burn report: {err}"))?
        .unwrap_or_default();

    if rows.is_empty() {
        println!("no debits for {sponsor_id} in [{from_day}, {to_day}]");
        return Ok(());
    }

    for row in rows {
        println!(
            "{} {} debit_total={} events={}",
            row.day, row.campaign_id, row.debit_total, row.event_count
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();
    let command = args.get(1).map(String::as_str);

    match command {
        Some("serve") => {
            let addr = match parse_socket_addr(args.get(2)) {
                Ok(addr) => addr,
                Err(message) => {
                    eprintln!("{message}");
                    std::process::exit(2);
                }
            };
            let sqlite_path = parse_sqlite_path(args.get(3));

            let api = match EngineApi::open_with_store(EngineConfig::default(), &sqlite_path) {
                Ok(api) => Arc::new(api),
                Err(err) => {
                    eprintln!("failed to open sqlite store: {err}");
                    std::process::exit(1);
                }
            };

            println!("listening on {addr} (sqlite={sqlite_path})");
            if let Err(err) = serve(addr, api).await {
                eprintln!("server error: {err}");
                std::process::exit(1);
            }
        }
        Some("demo") => {
            if let Err(message) = run_demo(&args) {
                eprintln!("{message}");
                std::process::exit(1);
            }
        }
        Some("burn") => {
            if let Err(message) = run_burn_report(&args) {
                eprintln!("{message}");
                std::process::exit(1);
            }
        }
        _ => print_usage(),
    }
}
