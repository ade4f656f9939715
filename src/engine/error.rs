use ulid::Ulid;

use crate::model::Status;

#[derive(Debug)]
pub enum EngineError {
    /// Ill-formed, past, or over-long time range.
    InvalidWindow(&'static str),
    /// The slot is held by the named active reservation.
    ConflictDetected(Ulid),
    /// The requested action violates the state machine.
    InvalidTransition { from: Status, action: &'static str },
    /// Lost-update race: the record moved past the expected version.
    StaleWrite { id: Ulid, current: u64 },
    NotFound(Ulid),
    /// Schedule lock wait ran out.
    Busy(&'static str),
    /// A tracking code was already assigned to this record.
    AlreadyAssigned(Ulid),
    LimitExceeded(&'static str),
    WalError(String),
}

impl EngineError {
    /// Whether the caller may retry after re-reading calendar state.
    /// Everything else signals a caller bug or stale UI and is surfaced
    /// verbatim.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::ConflictDetected(_)
                | EngineError::Busy(_)
                | EngineError::StaleWrite { .. }
        )
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::InvalidWindow(reason) => write!(f, "invalid window: {reason}"),
            EngineError::ConflictDetected(id) => {
                write!(f, "conflicts with active reservation: {id}")
            }
            EngineError::InvalidTransition { from, action } => {
                write!(f, "invalid transition: cannot {action} from '{}'", from.as_str())
            }
            EngineError::StaleWrite { id, current } => {
                write!(f, "stale write on {id}: record is at version {current}")
            }
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::Busy(what) => write!(f, "busy: timed out waiting for {what}"),
            EngineError::AlreadyAssigned(id) => {
                write!(f, "service id already assigned on {id}")
            }
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::WalError(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
