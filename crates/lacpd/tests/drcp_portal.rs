//! DRCP portal scenarios: two portal systems exchanging DRCPDUs over a
//! simulated intra-portal link.

use sonic_lacp_sai::MockSai;
use sonic_lacpd::sim::SimEndpoint;
use sonic_lacpd::{ConfigError, DistributedRelayConfig, LacpSystem};
use std::sync::Arc;
use std::time::Duration;

const IPP_A: u16 = 100;
const IPP_B: u16 = 200;

fn build_system(priority: u16, mac: &str) -> (LacpSystem, Arc<SimEndpoint>) {
    let endpoint = Arc::new(SimEndpoint::new());
    let system = LacpSystem::new(
        priority,
        mac.parse().unwrap(),
        Arc::new(MockSai::new()),
        endpoint.clone(),
    );
    (system, endpoint)
}

fn dr_config(name: &str, system_number: u8, ipp_port: u16) -> DistributedRelayConfig {
    DistributedRelayConfig {
        name: name.to_string(),
        portal_addr: "02:00:00:00:aa:01".parse().unwrap(),
        portal_priority: 32768,
        system_number,
        aggregator_id: 2000,
        aggregator_mac: "02:00:00:00:bb:01".parse().unwrap(),
        aggregator_priority: 32768,
        admin_aggregator_key: 50,
        ipp_port,
        three_system: false,
        gateway_assignments: Vec::new(),
    }
}

async fn bridged_portals(
    a_config: DistributedRelayConfig,
    b_config: DistributedRelayConfig,
) -> (LacpSystem, LacpSystem) {
    let (a, a_io) = build_system(128, "00:01:02:03:04:05");
    let (b, b_io) = build_system(128, "00:11:22:33:44:55");
    a_io.connect(IPP_A, b.clone(), IPP_B);
    b_io.connect(IPP_B, a.clone(), IPP_A);

    a.create_dr(a_config).await.unwrap();
    b.create_dr(b_config).await.unwrap();
    (a, b)
}

/// Matching conversation administrations: the portals agree and split the
/// VID space odd/even with no overlap and full coverage.
#[tokio::test(start_paused = true)]
async fn test_matching_portals_split_vid_space() {
    let (a, b) = bridged_portals(dr_config("dr0", 1, IPP_A), dr_config("dr0", 2, IPP_B)).await;

    tokio::time::sleep(Duration::from_secs(3)).await;

    let view_a = a.dr_view("dr0").unwrap();
    let view_b = b.dr_view("dr0").unwrap();
    assert_eq!(view_a.ps_state, "PORTAL_SYSTEM_UPDATE");
    assert_eq!(view_b.ps_state, "PORTAL_SYSTEM_UPDATE");
    assert_eq!(view_a.ipp_rx_state, "CURRENT");
    assert_eq!(view_b.ipp_rx_state, "CURRENT");
    assert!(!view_a.differ_portal);
    assert_eq!(view_a.gateway_digest, view_b.gateway_digest);

    // odd VIDs at system 1, even at system 2
    assert!(view_a.gateway_conversations.contains(&1));
    assert!(view_a.gateway_conversations.contains(&4095));
    assert!(!view_a.gateway_conversations.contains(&100));
    assert!(view_b.gateway_conversations.contains(&100));

    let overlap: Vec<u16> = view_a
        .gateway_conversations
        .iter()
        .filter(|id| view_b.gateway_conversations.contains(id))
        .copied()
        .collect();
    assert!(overlap.is_empty());
    assert_eq!(
        view_a.gateway_conversations.len() + view_b.gateway_conversations.len(),
        4095
    );
}

/// S6: disagreeing conversation maps drive both PS machines into
/// DIFFER_PORTAL and the claims collapse so nothing is served twice.
#[tokio::test(start_paused = true)]
async fn test_digest_mismatch_collapses_claims() {
    let mut b_config = dr_config("dr0", 2, IPP_B);
    // B believes a block of odd VIDs belongs to system 2
    b_config.gateway_assignments = (101..=199)
        .step_by(2)
        .map(|vid| (vid, vec![2u8]))
        .collect();

    let (a, b) = bridged_portals(dr_config("dr0", 1, IPP_A), b_config).await;

    tokio::time::sleep(Duration::from_secs(4)).await;

    let view_a = a.dr_view("dr0").unwrap();
    let view_b = b.dr_view("dr0").unwrap();
    assert_eq!(view_a.ps_state, "DIFFER_PORTAL");
    assert_eq!(view_b.ps_state, "DIFFER_PORTAL");
    assert!(view_a.differ_portal);
    assert!(view_b.differ_portal);
    assert_ne!(view_a.gateway_digest, view_b.gateway_digest);

    // no conversation is claimed by both sides
    let overlap: Vec<u16> = view_a
        .gateway_conversations
        .iter()
        .filter(|id| view_b.gateway_conversations.contains(id))
        .copied()
        .collect();
    assert!(overlap.is_empty(), "dual-claimed conversations: {overlap:?}");

    let port_overlap: Vec<u16> = view_a
        .port_conversations
        .iter()
        .filter(|id| view_b.port_conversations.contains(id))
        .copied()
        .collect();
    assert!(port_overlap.is_empty());
}

/// A DRCPDU from a foreign portal is discarded without disturbing state.
#[tokio::test(start_paused = true)]
async fn test_foreign_portal_discarded() {
    let mut foreign = dr_config("dr0", 2, IPP_B);
    foreign.portal_addr = "02:00:00:00:aa:99".parse().unwrap();
    let (a, _b) = bridged_portals(dr_config("dr0", 1, IPP_A), foreign).await;

    tokio::time::sleep(Duration::from_secs(2)).await;

    let view_a = a.dr_view("dr0").unwrap();
    assert_eq!(view_a.ipp_rx_state, "DISCARD");
    // our own claims are untouched by the misconfigured neighbor
    assert!(view_a.gateway_conversations.contains(&1));
}

/// Portal configuration validation.
#[tokio::test(start_paused = true)]
async fn test_portal_config_validation() {
    let (a, _io) = build_system(128, "00:01:02:03:04:05");

    let mut three = dr_config("dr0", 1, IPP_A);
    three.three_system = true;
    assert_eq!(
        a.create_dr(three).await.unwrap_err(),
        ConfigError::ThreeSystemPortal
    );

    let bad_number = dr_config("dr0", 3, IPP_A);
    assert_eq!(
        a.create_dr(bad_number).await.unwrap_err(),
        ConfigError::InvalidPortalSystemNumber(3)
    );

    a.create_dr(dr_config("dr0", 1, IPP_A)).await.unwrap();
    assert_eq!(
        a.create_dr(dr_config("dr0", 1, IPP_A)).await.unwrap_err(),
        ConfigError::DuplicatePortal("dr0".to_string())
    );
    assert_eq!(a.portal_count(), 1);

    a.delete_dr("dr0").await.unwrap();
    assert_eq!(a.portal_count(), 0);
    assert_eq!(
        a.delete_dr("dr0").await.unwrap_err(),
        ConfigError::UnknownPortal("dr0".to_string())
    );
}
