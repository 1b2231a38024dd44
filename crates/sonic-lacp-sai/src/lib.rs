//! Safe interface to the ASIC data plane for link aggregation.
//!
//! The Mux machine drives the data plane through exactly these operations.
//! Implementations must be idempotent and must not block: a call queues the
//! hardware programming and returns; persistent failures surface through the
//! caller's retry-then-demote path, never through the machine itself.
//!
//! Two implementations ship here: [`NullSai`] (logs and succeeds, for the
//! daemon without a connected ASIC) and [`MockSai`] (records every call, for
//! tests).

use std::sync::Mutex;
use thiserror::Error;
use tracing::debug;

/// Result type alias for SAI operations.
pub type SaiResult<T> = Result<T, SaiError>;

/// Errors reported by the ASIC adaptor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SaiError {
    /// The adaptor cannot take the request right now; the caller may retry.
    #[error("SAI busy: {0}")]
    Busy(String),

    /// The request named an object the ASIC does not know.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The operation failed permanently.
    #[error("SAI failure: {0}")]
    Failure(String),
}

impl SaiError {
    pub fn busy(message: impl Into<String>) -> Self {
        SaiError::Busy(message.into())
    }

    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        SaiError::InvalidParameter(message.into())
    }

    /// True if the caller should retry once before demoting the port.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SaiError::Busy(_))
    }
}

/// The data-plane operations the Mux machine is allowed to issue.
pub trait LagSaiApi: Send + Sync {
    /// Attaches the port's multiplexer to the aggregator.
    fn attach_port_to_lag(&self, port: u16, lag_id: u32) -> SaiResult<()>;

    /// Detaches the port's multiplexer from whatever aggregator holds it.
    fn detach_port_from_lag(&self, port: u16) -> SaiResult<()>;

    fn enable_collecting(&self, port: u16) -> SaiResult<()>;
    fn disable_collecting(&self, port: u16) -> SaiResult<()>;
    fn enable_distributing(&self, port: u16) -> SaiResult<()>;
    fn disable_distributing(&self, port: u16) -> SaiResult<()>;

    /// Coupled-control hardware programs both directions atomically.
    fn enable_collecting_distributing(&self, port: u16) -> SaiResult<()>;
    fn disable_collecting_distributing(&self, port: u16) -> SaiResult<()>;

    /// False if the ASIC can only couple collecting and distributing; the
    /// Mux machine is then built with the coupled ruleset.
    fn supports_independent_control(&self) -> bool {
        true
    }
}

/// One recorded adaptor call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaiOp {
    Attach { port: u16, lag_id: u32 },
    Detach { port: u16 },
    EnableCollecting { port: u16 },
    DisableCollecting { port: u16 },
    EnableDistributing { port: u16 },
    DisableDistributing { port: u16 },
    EnableCollectingDistributing { port: u16 },
    DisableCollectingDistributing { port: u16 },
}

/// No-op adaptor for running the daemon without a programmable ASIC.
#[derive(Debug, Default)]
pub struct NullSai;

impl LagSaiApi for NullSai {
    fn attach_port_to_lag(&self, port: u16, lag_id: u32) -> SaiResult<()> {
        debug!(port, lag_id, "sai: attach");
        Ok(())
    }

    fn detach_port_from_lag(&self, port: u16) -> SaiResult<()> {
        debug!(port, "sai: detach");
        Ok(())
    }

    fn enable_collecting(&self, port: u16) -> SaiResult<()> {
        debug!(port, "sai: enable collecting");
        Ok(())
    }

    fn disable_collecting(&self, port: u16) -> SaiResult<()> {
        debug!(port, "sai: disable collecting");
        Ok(())
    }

    fn enable_distributing(&self, port: u16) -> SaiResult<()> {
        debug!(port, "sai: enable distributing");
        Ok(())
    }

    fn disable_distributing(&self, port: u16) -> SaiResult<()> {
        debug!(port, "sai: disable distributing");
        Ok(())
    }

    fn enable_collecting_distributing(&self, port: u16) -> SaiResult<()> {
        debug!(port, "sai: enable collecting+distributing");
        Ok(())
    }

    fn disable_collecting_distributing(&self, port: u16) -> SaiResult<()> {
        debug!(port, "sai: disable collecting+distributing");
        Ok(())
    }
}

/// Recording adaptor for tests.
#[derive(Debug, Default)]
pub struct MockSai {
    ops: Mutex<Vec<SaiOp>>,
    independent: bool,
}

impl MockSai {
    pub fn new() -> Self {
        MockSai {
            ops: Mutex::new(Vec::new()),
            independent: true,
        }
    }

    /// A mock whose hardware can only couple collecting and distributing.
    pub fn coupled() -> Self {
        MockSai {
            ops: Mutex::new(Vec::new()),
            independent: false,
        }
    }

    /// Returns and clears the recorded calls.
    pub fn take_ops(&self) -> Vec<SaiOp> {
        std::mem::take(&mut self.ops.lock().unwrap())
    }

    pub fn ops(&self) -> Vec<SaiOp> {
        self.ops.lock().unwrap().clone()
    }

    fn record(&self, op: SaiOp) -> SaiResult<()> {
        self.ops.lock().unwrap().push(op);
        Ok(())
    }
}

impl LagSaiApi for MockSai {
    fn attach_port_to_lag(&self, port: u16, lag_id: u32) -> SaiResult<()> {
        self.record(SaiOp::Attach { port, lag_id })
    }

    fn detach_port_from_lag(&self, port: u16) -> SaiResult<()> {
        self.record(SaiOp::Detach { port })
    }

    fn enable_collecting(&self, port: u16) -> SaiResult<()> {
        self.record(SaiOp::EnableCollecting { port })
    }

    fn disable_collecting(&self, port: u16) -> SaiResult<()> {
        self.record(SaiOp::DisableCollecting { port })
    }

    fn enable_distributing(&self, port: u16) -> SaiResult<()> {
        self.record(SaiOp::EnableDistributing { port })
    }

    fn disable_distributing(&self, port: u16) -> SaiResult<()> {
        self.record(SaiOp::DisableDistributing { port })
    }

    fn enable_collecting_distributing(&self, port: u16) -> SaiResult<()> {
        self.record(SaiOp::EnableCollectingDistributing { port })
    }

    fn disable_collecting_distributing(&self, port: u16) -> SaiResult<()> {
        self.record(SaiOp::DisableCollectingDistributing { port })
    }

    fn supports_independent_control(&self) -> bool {
        self.independent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_records_in_order() {
        let sai = MockSai::new();
        sai.attach_port_to_lag(1, 2000).unwrap();
        sai.enable_collecting(1).unwrap();
        sai.enable_distributing(1).unwrap();

        assert_eq!(
            sai.take_ops(),
            vec![
                SaiOp::Attach { port: 1, lag_id: 2000 },
                SaiOp::EnableCollecting { port: 1 },
                SaiOp::EnableDistributing { port: 1 },
            ]
        );
        assert!(sai.take_ops().is_empty());
    }

    #[test]
    fn test_capability_flag() {
        assert!(MockSai::new().supports_independent_control());
        assert!(!MockSai::coupled().supports_independent_control());
    }

    #[test]
    fn test_retryable_classification() {
        assert!(SaiError::busy("queue full").is_retryable());
        assert!(!SaiError::invalid_parameter("no such port").is_retryable());
    }
}
