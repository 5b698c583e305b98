//! Replication graph configuration.

use bitstream::BufferConfig;
use codec::CodecLimits;
use schema::Topology;

/// Per-peer replication settings. Every peer in a session uses the same
/// topology.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicationConfig {
    pub topology: Topology,
    /// Maximum objects tracked (hard safety cap).
    pub max_objects: usize,
    /// Ticks the new owner waits after an ownership change before writing.
    pub handoff_delay_ticks: u32,
    /// Framing limits for received messages.
    pub limits: wire::Limits,
    /// Value limits for received sections.
    pub codec_limits: CodecLimits,
    /// Scratch buffer used to encode one variable body.
    pub buffer: BufferConfig,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            topology: Topology::ClientServer,
            max_objects: 1_000_000,
            handoff_delay_ticks: 2,
            limits: wire::Limits::default(),
            codec_limits: CodecLimits::default(),
            buffer: BufferConfig::default(),
        }
    }
}

impl ReplicationConfig {
    /// Creates a configuration for `topology` with default limits.
    #[must_use]
    pub fn new(topology: Topology) -> Self {
        Self {
            topology,
            ..Self::default()
        }
    }

    /// Creates a configuration with small limits for tests.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            topology: Topology::ClientServer,
            max_objects: 64,
            handoff_delay_ticks: 2,
            limits: wire::Limits::for_testing(),
            codec_limits: CodecLimits::for_testing(),
            buffer: BufferConfig {
                initial_capacity: 256,
                max_capacity: 1024,
            },
        }
    }

    /// Sets the topology.
    #[must_use]
    pub fn topology(mut self, topology: Topology) -> Self {
        self.topology = topology;
        self
    }
}
