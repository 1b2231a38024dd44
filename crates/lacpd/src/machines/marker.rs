//! Marker responder (802.1AX-2014 6.5.4).
//!
//! We never originate Marker requests (the distributor keeps conversations
//! pinned), so the responder's whole job is echoing requests back so the
//! partner can drain a link. Responses are exempt from the LACPDU rate
//! limit.

use crate::event::{Action, Actions};
use crate::port::PortVars;
use sonic_lacp_pdu::{MarkerKind, MarkerPdu, SlowPdu};
use tracing::debug;

/// Handles a received LAMPDU.
pub fn on_marker(vars: &mut PortVars, pdu: MarkerPdu, actions: &mut Actions) {
    match pdu.kind {
        MarkerKind::Info => {
            vars.counters.marker_rx += 1;
            vars.counters.marker_response_tx += 1;
            actions.push(Action::Transmit(SlowPdu::Marker(pdu.response_to())));
        }
        MarkerKind::Response => {
            // not ours: we sent no request
            debug!(
                port = vars.number,
                transaction = pdu.transaction_id,
                "unsolicited marker response dropped"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::test_support::test_vars;
    use sonic_lacp_types::MacAddress;

    fn marker(kind: MarkerKind) -> MarkerPdu {
        MarkerPdu {
            kind,
            requester_port: 11,
            requester_system: MacAddress::new([0, 0, 0, 0, 0, 9]),
            transaction_id: 77,
        }
    }

    #[test]
    fn test_marker_info_is_echoed() {
        let mut vars = test_vars();
        let mut actions = Vec::new();
        on_marker(&mut vars, marker(MarkerKind::Info), &mut actions);

        assert_eq!(vars.counters.marker_rx, 1);
        assert_eq!(vars.counters.marker_response_tx, 1);
        match actions.as_slice() {
            [Action::Transmit(SlowPdu::Marker(resp))] => {
                assert_eq!(resp.kind, MarkerKind::Response);
                assert_eq!(resp.requester_port, 11);
                assert_eq!(resp.transaction_id, 77);
            }
            other => panic!("unexpected actions: {other:?}"),
        }
    }

    #[test]
    fn test_unsolicited_response_is_dropped() {
        let mut vars = test_vars();
        let mut actions = Vec::new();
        on_marker(&mut vars, marker(MarkerKind::Response), &mut actions);
        assert!(actions.is_empty());
    }
}
