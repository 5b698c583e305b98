//! Errors raised while driving a simulated session.

use repgraph::ReplicationError;
use schema::ClientId;
use thiserror::Error;

pub type SimResult<T> = Result<T, ConvergenceError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ConvergenceError {
    /// Some conditions were still false when the tick budget ran out.
    #[error("not converged after {ticks} ticks: {}", failed.join(", "))]
    Timeout { failed: Vec<String>, ticks: u32 },

    #[error("unknown peer {client}")]
    UnknownPeer { client: ClientId },

    #[error("peer {peer}: {source}")]
    Replication {
        peer: ClientId,
        #[source]
        source: ReplicationError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_names_every_failed_condition() {
        let err = ConvergenceError::Timeout {
            failed: vec!["score".to_string(), "inventory".to_string()],
            ticks: 30,
        };
        assert_eq!(
            err.to_string(),
            "not converged after 30 ticks: score, inventory"
        );
    }
}
