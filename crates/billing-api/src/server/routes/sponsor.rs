#[derive(Debug, Deserialize)]
struct RegisterSponsorRequest {
    sponsor_id: String,
}

#[derive(Debug, Serialize)]
struct SponsorResponse {
    schema_version: String,
    sponsor: Sponsor,
    balance: i64,
    acting_as: Option<String>,
}

async fn register_sponsor(
    State(state): State<AppState>,
    Json(request): Json<RegisterSponsorRequest>,
) -> Result<Json<SponsorResponse>, HttpApiError> {
    let sponsor_id = request.sponsor_id.trim();
    if sponsor_id.is_empty() {
        return Err(HttpApiError::invalid_query(
            "sponsor_id must not be empty",
            None,
        ));
    }

    let sponsor = state
        .api
        .register_sponsor(sponsor_id)
        .map_err(HttpApiError::from_engine)?;

    Ok(Json(SponsorResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        sponsor,
        balance: 0,
        acting_as: None,
    }))
}

#[derive(Debug, Serialize)]
struct ListSponsorsResponse {
    schema_version: String,
    sponsor_ids: Vec<String>,
}

async fn list_sponsors(State(state): State<AppState>) -> Json<ListSponsorsResponse> {
    Json(ListSponsorsResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        sponsor_ids: state.api.engine().sponsor_ids(),
    })
}

async fn get_sponsor(
    Path(sponsor_id): Path<String>,
    Query(acting): Query<ActingAsQuery>,
    State(state): State<AppState>,
) -> Result<Json<SponsorResponse>, HttpApiError> {
    let sponsor = state
        .api
        .engine()
        .sponsor(&sponsor_id)
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
        acting_as: acting.acting_as,
    }))
}

#[derive(Debug, Deserialize)]
struct LedgerQuery {
    cursor: Option<usize>,
    page_size: Option<usize>,
    from_created: Option<i64>,
    to_created: Option<i64>,
}

#[derive(Debug, Serialize)]
struct LedgerResponse {
    schema_version: String,
    sponsor_id: String,
    balance: i64,
    entries: Vec<LedgerEntry>,
    next_cursor: Option<usize>,
    acting_as: Option<String>,
}

async fn get_ledger(
    Path(sponsor_id): Path<String>,
    State(state): State<AppState>,
    Query(query): Query<LedgerQuery>,
    Query(acting): Query<ActingAsQuery>,
) -> Result<Json<LedgerResponse>, HttpApiError> {
    let balance = state
        .api
        .engine()
        .balance(&sponsor_id)
        .map_err(HttpApiError::from_engine)?;

    // Time-ranged reads come from the persisted ledger when a store is
    // attached; everything else is answered from memory.
    let entries = match (query.from_created, query.to_created) {
        (None, None) => state
            .api
            .engine()
            .ledger_entries(&sponsor_id)
            .map_err(HttpApiError::from_engine)?,
        (from, to) => {
            let from = from.unwrap_or(0);
            let to = to.unwrap_or(i64::MAX);
            match state
                .api
                .ledger_range_persisted(&sponsor_id, from, to)
                .map_err(HttpApiError::from_persistence)?
            {
                Some(persisted) => persisted,
                None => state
                    .api
                    .engine()
                    .ledger_entries(&sponsor_id)
                    .map_err(HttpApiError::from_engine)?
                    .into_iter()
                    .filter(|entry| entry.created_at >= from && entry.created_at <= to)
                    .collect(),
            }
        }
    };

    let (start, end, next_cursor) = paginate(entries.len(), query.cursor, query.page_size)?;

    Ok(Json(LedgerResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        sponsor_id,
        balance,
        entries: entries[start..end].to_vec(),
        next_cursor,
        acting_as: acting.acting_as,
    }))
}

#[derive(Debug, Deserialize)]
struct BurnQuery {
    from_day: i64,
    to_day: i64,
}

#[derive(Debug, Serialize)]
struct BurnResponse {
    schema_version: String,
    sponsor_id: String,
    rows: Vec<DailyBurnRow>,
    acting_as: Option<String>,
}

async fn get_daily_burn(
    Path(sponsor_id): Path<String>,
    State(state): State<AppState>,
    Query(query): Query<BurnQuery>,
    Query(acting): Query<ActingAsQuery>,
) -> Result<Json<BurnResponse>, HttpApiError> {
    if query.from_day > query.to_day {
        return Err(HttpApiError::invalid_query(
            "from_day must not exceed to_day",
            Some(format!("from_day={} to_day={}", query.from_day, query.to_day)),
        ));
    }

    // Existence check first so an unknown sponsor is a 404, not an empty report.
    state
        .api
        .engine()
        .sponsor(&sponsor_id)
        .map_err(HttpApiError::from_engine)?;

    let rows = match state
        .api
        .daily_burn_persisted(&sponsor_id, query.from_day, query.to_day)
        .map_err(HttpApiError::from_persistence)?
    {
        Some(persisted) => persisted,
        None => state
            .api
            .daily_burn(&sponsor_id, query.from_day, query.to_day)
            .map_err(HttpApiError::from_engine)?,
    };

    Ok(Json(BurnResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        sponsor_id,
        rows,
        acting_as: acting.acting_as,
    }))
}

#[derive(Debug, Deserialize)]
struct TopUpRequest {
    amount: i64,
    proof: String,
}

#[derive(Debug, Serialize)]
struct DepositResponse {
    schema_version: String,
    deposit: PendingDeposit,
}

async fn request_top_up(
    Path(sponsor_id): Path<String>,
    State(state): State<AppState>,
    Json(request): Json<TopUpRequest>,
) -> Result<Json<DepositResponse>, HttpApiError> {
    let deposit = state
        .api
        .request_top_up(&sponsor_id, request.amount, &request.proof)
        .map_err(HttpApiError::from_engine)?;

    Ok(Json(DepositResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        deposit,
    }))
}

#[derive(Debug, Serialize)]
struct ListDepositsResponse {
    schema_version: String,
    sponsor_id: String,
    deposits: Vec<PendingDeposit>,
}

async fn list_deposits(
    Path(sponsor_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<ListDepositsResponse>, HttpApiError> {
    state
        .api
        .engine()
        .sponsor(&sponsor_id)
        .map_err(HttpApiError::from_engine)?;

    Ok(Json(ListDepositsResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        deposits: state.api.engine().deposits_for_sponsor(&sponsor_id),
        sponsor_id,
    }))
}

#[derive(Debug, Deserialize)]
struct CreateCampaignRequest {
    placement: Placement,
    budget_total: i64,
}

#[derive(Debug, Serialize)]
struct CampaignResponse {
    schema_version: String,
    campaign: Campaign,
}

async fn create_campaign(
    Path(sponsor_id): Path<String>,
    State(state): State<AppState>,
    Json(request): Json<CreateCampaignRequest>,
) -> Result<Json<CampaignResponse>, HttpApiError> {
    let campaign = state
        .api
        .create_campaign(&sponsor_id, request.placement, request.budget_total)
        .map_err(HttpApiError::from_engine)?;

    Ok(Json(CampaignResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        campaign,
    }))
}

#[derive(Debug, Serialize)]
struct ListCampaignsResponse {
    schema_version: String,
    sponsor_id: String,
    campaigns: Vec<Campaign>,
}

async fn list_campaigns(
    Path(sponsor_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<ListCampaignsResponse>, HttpApiError> {
    let campaigns = state
        .api
        .engine()
        .campaigns_for_sponsor(&sponsor_id)
        .map_err(HttpApiError::from_engine)?;

    Ok(Json(ListCampaignsResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        sponsor_id,
        campaigns,
    }))
}

async fn get_campaign(
    Path(campaign_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<CampaignResponse>, HttpApiError> {
    let campaign = state
        .api
        .engine()
        .campaign(&campaign_id)
        .map_err(HttpApiError::from_engine)?;

    Ok(Json(CampaignResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        campaign,
    }))
}

async fn activate_campaign(
    Path(campaign_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<CampaignResponse>, HttpApiError> {
    campaign_lifecycle(state, campaign_id, CampaignAction::Activate)
}

async fn pause_campaign(
    Path(campaign_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<CampaignResponse>, HttpApiError> {
    campaign_lifecycle(state, campaign_id, CampaignAction::Pause)
}

async fn resume_campaign(
    Path(campaign_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<CampaignResponse>, HttpApiError> {
    campaign_lifecycle(state, campaign_id, CampaignAction::Resume)
}

fn campaign_lifecycle(
    state: AppState,
    campaign_id: String,
    action: CampaignAction,
) -> Result<Json<CampaignResponse>, HttpApiError> {
    let campaign = state
        .api
        .campaign_action(&campaign_id, action)
        .map_err(HttpApiError::from_engine)?;

    Ok(Json(CampaignResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        campaign,
    }))
}
