async fn admin_suspend_sponsor(
    Path(sponsor_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<SponsorResponse>, HttpApiError> {
    let sponsor = state
        .api
        .suspend_sponsor(&sponsor_id)
        .map_err(HttpApiError::from_engine)?;
    let balance = state
        .api
        .engine()
        .balance(&sponsor_id)
        .map_err(HttpApiError::from_engine)?;

    Ok(Json(SponsorResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        sponsor,
        balance,
        acting_as: None,
    }))
}

async fn admin_resume_sponsor(
    Path(sponsor_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<SponsorResponse>, HttpApiError> {
    let sponsor = state
        .api
        .resume_sponsor(&sponsor_id)
        .map_err(HttpApiError::from_engine)?;
    let balance = state
        .api
        .engine()
        .balance(&sponsor_id)
        .map_err(HttpApiError::from_engine)?;

    Ok(Json(SponsorResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        sponsor,
        balance,
        acting_as: None,
    }))
}

#[derive(Debug, Serialize)]
struct InspectResponse {
    schema_version: String,
    summary: Value,
}

async fn admin_inspect_sponsor(
    Path(sponsor_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<InspectResponse>, HttpApiError> {
    let summary = state
        .api
        .engine()
        .inspect_sponsor(&sponsor_id)
        .map_err(HttpApiError::from_engine)?;

    Ok(Json(InspectResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        summary,
    }))
}

#[derive(Debug, Deserialize)]
struct AdjustWalletRequest {
    amount: i64,
    reason: String,
}

#[derive(Debug, Serialize)]
struct AdjustWalletResponse {
    schema_version: String,
    entry: LedgerEntry,
}

async fn admin_adjust_wallet(
    Path(sponsor_id): Path<String>,
    State(state): State<AppState>,
    Json(request): Json<AdjustWalletRequest>,
) -> Result<Json<AdjustWalletResponse>, HttpApiError> {
    let entry = state
        .api
        .adjust_wallet(&sponsor_id, request.amount, &request.reason)
        .map_err(HttpApiError::from_engine)?;

    Ok(Json(AdjustWalletResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        entry,
    }))
}

async fn admin_approve_deposit(
    Path(transaction_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<DepositResponse>, HttpApiError> {
    let deposit = state
        .api
        .approve_deposit(&transaction_id)
        .map_err(HttpApiError::from_engine)?;

    Ok(Json(DepositResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        deposit,
    }))
}

#[derive(Debug, Deserialize)]
struct RejectDepositRequest {
    reason: String,
}

async fn admin_reject_deposit(
    Path(transaction_id): Path<String>,
    State(state): State<AppState>,
    Json(request): Json<RejectDepositRequest>,
) -> Result<Json<DepositResponse>, HttpApiError> {
    let deposit = state
        .api
        .reject_deposit(&transaction_id, &request.reason)
        .map_err(HttpApiError::from_engine)?;

    Ok(Json(DepositResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        deposit,
    }))
}

#[derive(Debug, Deserialize)]
struct UpdateRatesRequest {
    feed: PlacementRates,
    result: PlacementRates,
}

#[derive(Debug, Serialize)]
struct RatesResponse {
    schema_version: String,
    rates: RateCard,
}

async fn admin_update_rates(
    State(state): State<AppState>,
    Json(request): Json<UpdateRatesRequest>,
) -> Result<Json<RatesResponse>, HttpApiError> {
    if request.feed.view_cost < 0
        || request.feed.click_cost < 0
        || request.result.view_cost < 0
        || request.result.click_cost < 0
    {
        return Err(HttpApiError::invalid_query(
            "rates must be non-negative",
            None,
        ));
    }

    let rates = state.api.update_rates(request.feed, request.result);

    Ok(Json(RatesResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        rates,
    }))
}

async fn admin_get_rates(State(state): State<AppState>) -> Json<RatesResponse> {
    Json(RatesResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        rates: state.api.engine().current_rates(),
    })
}

async fn admin_suspend_campaign(
    Path(campaign_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<CampaignResponse>, HttpApiError> {
    campaign_lifecycle(state, campaign_id, CampaignAction::Suspend)
}

async fn admin_unsuspend_campaign(
    Path(campaign_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<CampaignResponse>, HttpApiError> {
    campaign_lifecycle(state, campaign_id, CampaignAction::Unsuspend)
}

async fn admin_clear_hold(
    Path(campaign_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<CampaignResponse>, HttpApiError> {
    campaign_lifecycle(state, campaign_id, CampaignAction::ClearHold)
}

#[derive(Debug, Serialize)]
struct VerifyCampaignResponse {
    schema_version: String,
    campaign_id: String,
    spend_matches_ledger: bool,
}

async fn admin_verify_campaign(
    Path(campaign_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<VerifyCampaignResponse>, HttpApiError> {
    let spend_matches_ledger = state
        .api
        .engine()
        .verify_campaign_spend(&campaign_id)
        .map_err(HttpApiError::from_engine)?;

    Ok(Json(VerifyCampaignResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        campaign_id,
        spend_matches_ledger,
    }))
}
