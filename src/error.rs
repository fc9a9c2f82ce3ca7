use thiserror::Error;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, SafetyError>;

/// Every failure in the safety core is a local precondition violation.
/// Nothing here is retried.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SafetyError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("you already have an active trip")]
    TripAlreadyActive,

    #[error("there is no active trip")]
    NoActiveTrip,

    #[error("origin and destination are the same place")]
    DegenerateRoute,

    #[error("report {0} not found")]
    ReportNotFound(Uuid),

    #[error("navigation graph: {0}")]
    Graph(String),
}

impl SafetyError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Stable machine-readable name, used in API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::TripAlreadyActive => "trip_already_active",
            Self::NoActiveTrip => "no_active_trip",
            Self::DegenerateRoute => "degenerate_route",
            Self::ReportNotFound(_) => "report_not_found",
            Self::Graph(_) => "graph",
        }
    }
}

impl From<osmpbf::Error> for SafetyError {
    fn from(err: osmpbf::Error) -> Self {
        Self::Graph(err.to_string())
    }
}
