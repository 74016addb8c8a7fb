#[derive(Debug, Deserialize)]
struct ServeRequest {
    placement: Placement,
    viewer_id: String,
}

#[derive(Debug, Serialize)]
struct ServeResponse {
    schema_version: String,
    decision: ServeDecision,
}

async fn serve_ad(
    State(state): State<AppState>,
    Json(request): Json<ServeRequest>,
) -> Result<Json<ServeResponse>, HttpApiError> {
    if request.viewer_id.trim().is_empty() {
        return Err(HttpApiError::invalid_query(
            "viewer_id must not be empty",
            None,
        ));
    }

    let decision = state.api.select_ad(request.placement, &request.viewer_id);

    Ok(Json(ServeResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        decision,
    }))
}

#[derive(Debug, Deserialize)]
struct BillableEventRequest {
    campaign_id: String,
    dedup_key: String,
}

#[derive(Debug, Serialize)]
struct BillableEventResponse {
    schema_version: String,
    campaign_id: String,
    event_type: BillableEventType,
    #[serde(flatten)]
    outcome: BillingOutcome,
}

async fn record_view(
    State(state): State<AppState>,
    Json(request): Json<BillableEventRequest>,
) -> Result<Json<BillableEventResponse>, HttpApiError> {
    record_billable(state, request, BillableEventType::View)
}

async fn record_click(
    State(state): State<AppState>,
    Json(request): Json<BillableEventRequest>,
) -> Result<Json<BillableEventResponse>, HttpApiError> {
    record_billable(state, request, BillableEventType::Click)
}

fn record_billable(
    state: AppState,
    request: BillableEventRequest,
    event_type: BillableEventType,
) -> Result<Json<BillableEventResponse>, HttpApiError> {
    if request.dedup_key.trim().is_empty() {
        return Err(HttpApiError::invalid_query(
            "dedup_key must not be empty",
            None,
        ));
    }

    let outcome = state
        .api
        .record_event(&request.campaign_id, event_type, &request.dedup_key)
        .map_err(HttpApiError::from_engine)?;

    Ok(Json(BillableEventResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        campaign_id: request.campaign_id,
        event_type,
        outcome,
    }))
}
