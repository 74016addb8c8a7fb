use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, Query, Request, State};
use axum::http::header::{HeaderName, HeaderValue};
use axum::http::Method;
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use billing_core::EngineError;
use contracts::{
    ApiError, BillableEventType, BillingOutcome, Campaign, DailyBurnRow, ErrorCode, LedgerEntry,
    PendingDeposit, Placement, PlacementRates, RateCard, ServeDecision, Sponsor,
    SCHEMA_VERSION_V1,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{CampaignAction, EngineApi, PersistenceError};

const DEFAULT_PAGE_SIZE: usize = 500;
const MAX_PAGE_SIZE: usize = 5000;

include!("error.rs");
include!("state.rs");
include!("routes/serving.rs");
include!("routes/sponsor.rs");
include!("routes/admin.rs");
include!("util.rs");

pub async fn serve(addr: SocketAddr, api: Arc<EngineApi>) -> Result<(), ServerError> {
    let state = AppState { api };
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/serve", post(serve_ad))
        .route("/api/v1/events/view", post(record_view))
        .route("/api/v1/events/click", post(record_click))
        .route("/api/v1/sponsors", post(register_sponsor).get(list_sponsors))
        .route("/api/v1/sponsors/{sponsor_id}", get(get_sponsor))
        .route("/api/v1/sponsors/{sponsor_id}/ledger", get(get_ledger))
        .route("/api/v1/sponsors/{sponsor_id}/burn", get(get_daily_burn))
        .route("/api/v1/sponsors/{sponsor_id}/topups", post(request_top_up))
        .route("/api/v1/sponsors/{sponsor_id}/deposits", get(list_deposits))
        .route(
            "/api/v1/sponsors/{sponsor_id}/campaigns",
            post(create_campaign).get(list_campaigns),
        )
        .route("/api/v1/campaigns/{campaign_id}", get(get_campaign))
        .route("/api/v1/campaigns/{campaign_id}/activate", post(activate_campaign))
        .route("/api/v1/campaigns/{campaign_id}/pause", post(pause_campaign))
        .route("/api/v1/campaigns/{campaign_id}/resume", post(resume_campaign))
        .route(
            "/api/v1/admin/sponsors/{sponsor_id}/suspend",
            post(admin_suspend_sponsor),
        )
        .route(
            "/api/v1/admin/sponsors/{sponsor_id}/resume",
            post(admin_resume_sponsor),
        )
        .route(
            "/api/v1/admin/sponsors/{sponsor_id}/inspect",
            get(admin_inspect_sponsor),
        )
        .route(
            "/api/v1/admin/wallets/{sponsor_id}/adjust",
            post(admin_adjust_wallet),
        )
        .route(
            "/api/v1/admin/deposits/{transaction_id}/approve",
            post(admin_approve_deposit),
        )
        .route(
            "/api/v1/admin/deposits/{transaction_id}/reject",
            post(admin_reject_deposit),
        )
        .route("/api/v1/admin/rates", put(admin_update_rates).get(admin_get_rates))
        .route(
            "/api/v1/admin/campaigns/{campaign_id}/suspend",
            post(admin_suspend_campaign),
        )
        .route(
            "/api/v1/admin/campaigns/{campaign_id}/unsuspend",
            post(admin_unsuspend_campaign),
        )
        .route(
            "/api/v1/admin/campaigns/{campaign_id}/clear_hold",
            post(admin_clear_hold),
        )
        .route(
            "/api/v1/admin/campaigns/{campaign_id}/verify",
            get(admin_verify_campaign),
        )
        .layer(middleware::from_fn(cors_middleware))
        .with_state(state)
}

async fn cors_middleware(request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        let mut response = Response::new(axum::body::Body::empty());
        *response.status_mut() = StatusCode::NO_CONTENT;
        apply_cors_headers(response.headers_mut());
        return response;
    }

    let mut response = next.run(request).await;
    apply_cors_headers(response.headers_mut());
    response
}
