#[derive(Clone)]
struct AppState {
    api: Arc<EngineApi>,
}

/// Reads may carry `acting_as=<admin_id>` so audit trails can distinguish an
/// operator browsing a sponsor's data from the sponsor itself. The value is
/// echoed back, never authorized here.
#[derive(Debug, Deserialize)]
struct ActingAsQuery {
    acting_as: Option<String>,
}
