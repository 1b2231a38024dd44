//! End-to-end LACP scenarios over the simulation bridge, driven on the
//! paused tokio clock.

use sonic_lacp_sai::MockSai;
use sonic_lacp_types::{LacpMode, LacpTimeout, MacAddress, PortProperties};
use sonic_lacpd::sim::SimEndpoint;
use sonic_lacpd::{
    AggPortConfig, AggregatorConfig, AggregatorType, ConfigError, LacpSystem, Selection,
};
use std::sync::Arc;
use std::time::Duration;

fn build_system(priority: u16, mac: &str) -> (LacpSystem, Arc<SimEndpoint>, Arc<MockSai>) {
    let endpoint = Arc::new(SimEndpoint::new());
    let sai = Arc::new(MockSai::new());
    let system = LacpSystem::new(
        priority,
        mac.parse().unwrap(),
        sai.clone(),
        endpoint.clone(),
    );
    (system, endpoint, sai)
}

fn agg_config(name: &str, id: u32, key: u16, min_links: u16) -> AggregatorConfig {
    AggregatorConfig {
        name: name.to_string(),
        id,
        mac: MacAddress::new([0x02, 0, 0, 0, 0, id as u8]),
        actor_admin_key: key,
        agg_type: AggregatorType::Lacp,
        min_links,
        initial_members: Vec::new(),
    }
}

fn port_config(number: u16, key: u16) -> AggPortConfig {
    AggPortConfig {
        number,
        priority: 128,
        actor_admin_key: key,
        agg_id: None,
        enabled: true,
        mode: LacpMode::Active,
        timeout: LacpTimeout::Short,
        properties: PortProperties::default(),
    }
}

async fn settle(duration: Duration) {
    tokio::time::sleep(duration).await;
}

/// Every port snapshot must satisfy the structural invariants.
async fn check_invariants(system: &LacpSystem, ports: &[u16]) {
    for &number in ports {
        let snapshot = system.port_view(number).unwrap();
        if snapshot.agg_id != 0 {
            let agg = system.aggregator_view(snapshot.agg_id).await.unwrap();
            assert!(
                agg.members.contains(&number),
                "port {number} points at aggregator {} but is not in its member list",
                snapshot.agg_id
            );
        }
        if snapshot.mux_state == "DISTRIBUTING" {
            assert_eq!(snapshot.selection, Selection::Selected);
            assert!(snapshot.partner_state.sync());
            assert!(snapshot.partner_state.collecting());
        }
        if snapshot.mux_state == "COLLECTING" || snapshot.mux_state == "DISTRIBUTING" {
            assert!(snapshot.actor_state.sync());
        }
    }
}

/// S1: two mirrored two-port systems converge to DISTRIBUTING within 4s.
#[tokio::test(start_paused = true)]
async fn test_two_port_lag_convergence() {
    let (a, a_io, _) = build_system(128, "00:01:02:03:04:05");
    let (b, b_io, _) = build_system(128, "00:11:22:33:44:55");
    a_io.connect(1, b.clone(), 11);
    a_io.connect(2, b.clone(), 12);
    b_io.connect(11, a.clone(), 1);
    b_io.connect(12, a.clone(), 2);

    a.create_aggregator(agg_config("PortChannel0001", 2000, 50, 0)).await.unwrap();
    b.create_aggregator(agg_config("PortChannel0002", 3000, 50, 0)).await.unwrap();
    for port in [1, 2] {
        a.create_port(port_config(port, 50)).await.unwrap();
    }
    for port in [11, 12] {
        b.create_port(port_config(port, 50)).await.unwrap();
    }

    settle(Duration::from_secs(4)).await;

    for port in [1, 2] {
        let snapshot = a.port_view(port).unwrap();
        assert_eq!(snapshot.mux_state, "DISTRIBUTING", "A port {port}");
        assert_eq!(snapshot.selection, Selection::Selected);
        assert_eq!(snapshot.partner_system, b.system_id());
    }
    for port in [11, 12] {
        let snapshot = b.port_view(port).unwrap();
        assert_eq!(snapshot.mux_state, "DISTRIBUTING", "B port {port}");
    }

    let agg = a.aggregator_view(2000).await.unwrap();
    assert_eq!(agg.members, vec![1, 2]);
    assert_eq!(agg.selected_members, vec![1, 2]);
    assert!(agg.ready);
    assert_eq!(agg.partner_system, b.system_id());

    check_invariants(&a, &[1, 2]).await;
    check_invariants(&b, &[11, 12]).await;

    // steady state transmit rate stays within three per fast interval
    let before = a.port_view(1).unwrap().counters.lacpdu_tx;
    settle(Duration::from_secs(3)).await;
    let after = a.port_view(1).unwrap().counters.lacpdu_tx;
    assert!(
        after - before <= 9,
        "port 1 sent {} LACPDUs in 3s",
        after - before
    );
}

/// S2: the partner goes silent; 3s to EXPIRED (mux back to ATTACHED),
/// another 3s to DEFAULTED.
#[tokio::test(start_paused = true)]
async fn test_partner_timeout_degrades() {
    let (a, a_io, _) = build_system(128, "00:01:02:03:04:05");
    let (b, b_io, _) = build_system(128, "00:11:22:33:44:55");
    a_io.connect(1, b.clone(), 11);
    b_io.connect(11, a.clone(), 1);

    a.create_aggregator(agg_config("PortChannel0001", 2000, 50, 0)).await.unwrap();
    b.create_aggregator(agg_config("PortChannel0002", 3000, 50, 0)).await.unwrap();
    a.create_port(port_config(1, 50)).await.unwrap();
    b.create_port(port_config(11, 50)).await.unwrap();

    settle(Duration::from_secs(4)).await;
    assert_eq!(a.port_view(1).unwrap().mux_state, "DISTRIBUTING");

    // B falls silent; A keeps talking into the void
    b_io.disconnect(11);

    settle(Duration::from_millis(3500)).await;
    let snapshot = a.port_view(1).unwrap();
    assert_eq!(snapshot.rx_state, "EXPIRED");
    assert!(!snapshot.partner_state.sync());
    assert_eq!(snapshot.mux_state, "ATTACHED");

    settle(Duration::from_millis(3000)).await;
    let snapshot = a.port_view(1).unwrap();
    assert_eq!(snapshot.rx_state, "DEFAULTED");
    assert!(snapshot.actor_state.defaulted());
    // the partner record fell back to the admin defaults
    assert!(snapshot.partner_system.is_zero());
}

/// S3: three ports brought up together share one wait_while gate.
#[tokio::test(start_paused = true)]
async fn test_wait_while_coalescing() {
    let (a, _io, _) = build_system(128, "00:01:02:03:04:05");
    a.create_aggregator(agg_config("PortChannel0001", 2000, 50, 0)).await.unwrap();
    for port in [1, 2, 3] {
        a.create_port(port_config(port, 50)).await.unwrap();
    }

    // before the wait expires nobody is attached
    settle(Duration::from_millis(1900)).await;
    for port in [1, 2, 3] {
        let snapshot = a.port_view(port).unwrap();
        assert_eq!(snapshot.mux_state, "WAITING", "port {port}");
    }
    let agg = a.aggregator_view(2000).await.unwrap();
    assert!(!agg.ready);

    // one gate releases all three within the same turn
    settle(Duration::from_millis(400)).await;
    let agg = a.aggregator_view(2000).await.unwrap();
    assert!(agg.ready);
    for port in [1, 2, 3] {
        let snapshot = a.port_view(port).unwrap();
        assert_ne!(snapshot.mux_state, "WAITING", "port {port}");
        assert_ne!(snapshot.mux_state, "DETACHED", "port {port}");
    }
}

/// S4: below min-links everything stands by; the third port flips all
/// three to SELECTED.
#[tokio::test(start_paused = true)]
async fn test_min_links() {
    let (a, _io, _) = build_system(128, "00:01:02:03:04:05");
    a.create_aggregator(agg_config("PortChannel0001", 2000, 50, 3)).await.unwrap();
    for port in [1, 2] {
        a.create_port(port_config(port, 50)).await.unwrap();
    }

    settle(Duration::from_secs(3)).await;
    for port in [1, 2] {
        let snapshot = a.port_view(port).unwrap();
        assert_eq!(snapshot.selection, Selection::Standby, "port {port}");
        assert_eq!(snapshot.agg_id, 2000);
    }
    let agg = a.aggregator_view(2000).await.unwrap();
    assert!(agg.selected_members.is_empty());

    a.create_port(port_config(3, 50)).await.unwrap();
    settle(Duration::from_secs(3)).await;
    for port in [1, 2, 3] {
        let snapshot = a.port_view(port).unwrap();
        assert_eq!(snapshot.selection, Selection::Selected, "port {port}");
    }
    let agg = a.aggregator_view(2000).await.unwrap();
    assert_eq!(agg.selected_members, vec![1, 2, 3]);
}

/// S5: a duplicate aggregator id is rejected without touching anything.
#[tokio::test(start_paused = true)]
async fn test_duplicate_aggregator_rejected() {
    let (a, _io, _) = build_system(128, "00:01:02:03:04:05");
    a.create_aggregator(agg_config("PortChannel0001", 2000, 50, 0)).await.unwrap();

    let before = a.aggregator_view(2000).await.unwrap();
    let err = a
        .create_aggregator(agg_config("PortChannel0002", 2000, 51, 0))
        .await
        .unwrap_err();
    assert_eq!(err, ConfigError::DuplicateAggregatorId(2000));

    assert_eq!(a.aggregator_count(), 1);
    let after = a.aggregator_view(2000).await.unwrap();
    assert_eq!(after.name, before.name);
    assert_eq!(after.oper_key, before.oper_key);

    // name and key collisions are rejected the same way
    let err = a
        .create_aggregator(agg_config("PortChannel0001", 2001, 51, 0))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        ConfigError::DuplicateAggregatorName("PortChannel0001".to_string())
    );
    let err = a
        .create_aggregator(agg_config("PortChannel0003", 2001, 50, 0))
        .await
        .unwrap_err();
    assert_eq!(err, ConfigError::DuplicateAggregatorKey(50));
    assert_eq!(a.aggregator_count(), 1);
}

/// Deletion symmetry: tearing everything down empties the registries.
#[tokio::test(start_paused = true)]
async fn test_deletion_symmetry() {
    let (a, _io, _) = build_system(128, "00:01:02:03:04:05");
    a.create_aggregator(agg_config("PortChannel0001", 2000, 50, 0)).await.unwrap();
    for port in [1, 2] {
        a.create_port(port_config(port, 50)).await.unwrap();
    }
    settle(Duration::from_secs(3)).await;

    // a port still associated with its aggregator cannot be deleted
    let err = a.delete_port(1).await.unwrap_err();
    assert_eq!(err, ConfigError::PortStillMember(1));

    a.delete_aggregator(2000).await.unwrap();
    settle(Duration::from_millis(100)).await;
    for port in [1, 2] {
        let snapshot = a.port_view(port).unwrap();
        assert_eq!(snapshot.selection, Selection::Unselected);
        assert_eq!(snapshot.agg_id, 0);
        assert_eq!(snapshot.mux_state, "DETACHED");
    }

    a.delete_port(1).await.unwrap();
    a.delete_port(2).await.unwrap();
    assert_eq!(a.aggregator_count(), 0);
    assert_eq!(a.port_count(), 0);
}

/// Removing a member detaches it and leaves the rest of the LAG alone.
#[tokio::test(start_paused = true)]
async fn test_remove_member_detaches() {
    let (a, _io, sai) = build_system(128, "00:01:02:03:04:05");
    a.create_aggregator(agg_config("PortChannel0001", 2000, 50, 0)).await.unwrap();
    for port in [1, 2] {
        a.create_port(port_config(port, 50)).await.unwrap();
    }
    settle(Duration::from_secs(3)).await;
    assert_eq!(a.port_view(1).unwrap().selection, Selection::Selected);
    sai.take_ops();

    a.remove_member(2000, 2).await.unwrap();
    settle(Duration::from_millis(200)).await;

    let removed = a.port_view(2).unwrap();
    assert_eq!(removed.selection, Selection::Unselected);
    assert_eq!(removed.agg_id, 0);
    assert_eq!(removed.mux_state, "DETACHED");

    let kept = a.port_view(1).unwrap();
    assert_eq!(kept.selection, Selection::Selected);
    assert_eq!(kept.agg_id, 2000);

    let agg = a.aggregator_view(2000).await.unwrap();
    assert_eq!(agg.members, vec![1]);

    // the data plane was told to stop the removed port
    let ops = sai.take_ops();
    assert!(ops
        .iter()
        .any(|op| matches!(op, sonic_lacp_sai::SaiOp::Detach { port: 2 })));
}

/// A malformed frame is counted and dropped without moving any machine.
#[tokio::test(start_paused = true)]
async fn test_bad_pdu_is_contained() {
    let (a, _io, _) = build_system(128, "00:01:02:03:04:05");
    a.create_aggregator(agg_config("PortChannel0001", 2000, 50, 0)).await.unwrap();
    a.create_port(port_config(1, 50)).await.unwrap();
    settle(Duration::from_secs(3)).await;

    let before = a.port_view(1).unwrap();
    a.deliver_frame(1, &[0xde, 0xad, 0xbe, 0xef]);
    settle(Duration::from_millis(50)).await;

    let after = a.port_view(1).unwrap();
    assert_eq!(after.counters.parse_errors, before.counters.parse_errors + 1);
    assert_eq!(after.rx_state, before.rx_state);
    assert_eq!(after.mux_state, before.mux_state);
    assert_eq!(after.selection, before.selection);
}
