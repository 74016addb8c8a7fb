#[derive(Debug)]
pub enum ServerError {
    Io(std::io::Error),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "server io error: {err}"),
        }
    }
}

impl std::error::Error for ServerError {}

impl From<std::io::Error> for ServerError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

#[derive(Debug)]
struct HttpApiError {
    status: StatusCode,
    error: ApiError,
}

impl HttpApiError {
    fn invalid_query(message: impl Into<String>, details: Option<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: ApiError::new(ErrorCode::InvalidQuery, message, details),
        }
    }

    fn internal(message: impl Into<String>, details: Option<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error: ApiError::new(ErrorCode::InternalError, message, details),
        }
    }

    fn from_engine(err: EngineError) -> Self {
        let (status, code, message) = match &err {
            EngineError::UnknownSponsor(_) => (
                StatusCode::NOT_FOUND,
                ErrorCode::SponsorNotFound,
                "sponsor_id does not match a registered sponsor",
            ),
            EngineError::UnknownCampaign(_) => (
                StatusCode::NOT_FOUND,
                ErrorCode::CampaignNotFound,
                "campaign_id does not match a known campaign",
            ),
            EngineError::UnknownDeposit(_) => (
                StatusCode::NOT_FOUND,
                ErrorCode::DepositNotFound,
                "transaction_id does not match a recorded deposit",
            ),
            EngineError::SponsorAlreadyRegistered(_)
            | EngineError::DepositAlreadyDecided(_)
            | EngineError::Campaign(_) => (
                StatusCode::CONFLICT,
                ErrorCode::StateConflict,
                "operation conflicts with current state",
            ),
            EngineError::Wallet(_) => (
                StatusCode::BAD_REQUEST,
                ErrorCode::InvalidAdjustment,
                "wallet operation was rejected",
            ),
            EngineError::EmptyAdjustmentReason
            | EngineError::InvalidBudget(_)
            | EngineError::InvalidDepositAmount(_) => (
                StatusCode::BAD_REQUEST,
                ErrorCode::InvalidCommand,
                "request payload failed validation",
            ),
        };

        Self {
            status,
            error: ApiError::new(code, message, Some(err.to_string())),
        }
    }

    fn from_persistence(err: PersistenceError) -> Self {
        match err {
            PersistenceError::NotAttached => {
                Self::invalid_query("persistence store is not attached", None)
            }
            other => Self::internal("persistence operation failed", Some(other.to_string())),
        }
    }
}

impl IntoResponse for HttpApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.error)).into_response()
    }
}
