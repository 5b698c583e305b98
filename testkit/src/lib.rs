//! Deterministic multi-peer sessions for testing replication.
//!
//! [`SimNetwork`] runs one server and any number of clients, each a
//! [`repgraph::ReplicationGraph`], over an in-memory link with a fixed
//! latency in ticks. [`SimNetwork::wait_for`] steps the session until a set
//! of named [`Condition`]s hold and reports the ones that never did.
//!
//! Cross-replica comparison lives here, not in the engine.

mod condition;
mod error;
mod network;

pub use condition::{value_of, Condition};
pub use error::{ConvergenceError, SimResult};
pub use network::{Envelope, SimConfig, SimNetwork, StepReport};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_session_converges_immediately() {
        let mut net = SimNetwork::new(SimConfig::default());
        assert_eq!(net.wait_for(&[], 10), Ok(0));
        assert_eq!(net.tick(), 0);
    }

    #[test]
    fn false_condition_times_out_with_its_name() {
        let mut net = SimNetwork::new(SimConfig::default());
        let never = Condition::new("never", |_| false);
        let always = Condition::new("always", |_| true);
        assert_eq!(
            net.wait_for(&[never, always], 3),
            Err(ConvergenceError::Timeout {
                failed: vec!["never".to_string()],
                ticks: 3,
            })
        );
        assert_eq!(net.tick(), 3);
    }
}
