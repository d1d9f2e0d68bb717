//! End-to-end reconciliation behavior over a real on-disk store.

mod common;

use portkeeper::{Error, PortFilter, PortStatus, ReserveOptions};

use common::create_test_service;

#[test]
fn full_reservation_lifecycle() {
    let mut service = create_test_service();

    assert_eq!(service.check_port(3000).unwrap(), PortStatus::Free);

    let reservation = service
        .reserve_port(
            3000,
            &ReserveOptions::new("api-server")
                .with_description(Some("REST API".into()))
                .with_tags(vec!["backend".into()]),
        )
        .unwrap();
    assert_eq!(reservation.project(), "api-server");
    assert_eq!(service.check_port(3000).unwrap(), PortStatus::Reserved);

    assert!(service.release_port(3000).unwrap());
    assert_eq!(service.check_port(3000).unwrap(), PortStatus::Free);
}

#[test]
fn conflicting_project_is_rejected_until_release() {
    let mut service = create_test_service();

    service
        .reserve_port(4000, &ReserveOptions::new("alpha"))
        .unwrap();

    let err = service
        .reserve_port(4000, &ReserveOptions::new("beta"))
        .unwrap_err();
    match err {
        Error::PortReserved { project, .. } => assert_eq!(project, "alpha"),
        other => panic!("unexpected error: {other}"),
    }

    // Same project still goes through.
    service
        .reserve_port(4000, &ReserveOptions::new("alpha"))
        .unwrap();

    service.release_port(4000).unwrap();
    service
        .reserve_port(4000, &ReserveOptions::new("beta"))
        .unwrap();
}

#[test]
fn releasing_unreserved_port_is_a_no_op() {
    let mut service = create_test_service();
    assert!(!service.release_port(5000).unwrap());
}

#[test]
fn listing_filters_and_revalidates() {
    let mut service = create_test_service();

    service
        .reserve_port(3000, &ReserveOptions::new("api-server"))
        .unwrap();
    service
        .reserve_port(3001, &ReserveOptions::new("worker"))
        .unwrap();

    // 3001 gets bound behind the store's back.
    service.inspector().bind(3001, 77);

    let all = service.list_ports(&PortFilter::default()).unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].status(), PortStatus::Reserved);
    assert_eq!(all[1].status(), PortStatus::InUse);
    assert_eq!(all[1].pid(), None); // write-back flips status only

    let api_only = service
        .list_ports(&PortFilter::by_project("API"))
        .unwrap();
    assert_eq!(api_only.len(), 1);
    assert_eq!(api_only[0].project(), "api-server");
}

#[test]
fn kill_frees_the_port_for_reservation() {
    let mut service = create_test_service();

    service
        .reserve_port(3000, &ReserveOptions::new("api"))
        .unwrap();
    service.inspector().bind(3000, 42);
    service.process_control().spawn_stubborn(42);

    // Bulk list flips the row to in-use.
    service.list_ports(&PortFilter::default()).unwrap();
    let err = service
        .reserve_port(3000, &ReserveOptions::new("api"))
        .unwrap_err();
    assert!(matches!(err, Error::PortInUse { .. }));

    service.kill_process(3000).unwrap();
    assert_eq!(service.process_control().force_killed(), [42]);

    // The cached in-use state is cleared; with the socket gone the port
    // reads free and can be reserved again.
    service.inspector().release(3000);
    service
        .reserve_port(3000, &ReserveOptions::new("api"))
        .unwrap();
}

#[test]
fn kill_without_listener_is_a_distinct_error() {
    let mut service = create_test_service();
    assert!(matches!(
        service.kill_process(9999),
        Err(Error::NoProcessOnPort { .. })
    ));
}

#[test]
fn scan_reflects_live_bindings_sorted() {
    let service = create_test_service();
    service.inspector().bind(9090, 3);
    service.inspector().bind(3000, 1);
    service.inspector().bind(8080, 2);

    let active = service.scan_active_ports().unwrap();
    let ports: Vec<u16> = active.iter().map(|a| a.port.value()).collect();
    assert_eq!(ports, [3000, 8080, 9090]);
}

#[test]
fn port_zero_is_rejected_everywhere() {
    let mut service = create_test_service();

    assert!(service.check_port(0).is_err());
    assert!(service
        .reserve_port(0, &ReserveOptions::new("x"))
        .is_err());
    assert!(service.release_port(0).is_err());
    assert!(service.kill_process(0).is_err());
}

#[test]
fn reservations_survive_reopening_the_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ports.db");

    {
        let db = portkeeper::Database::open(portkeeper::DatabaseConfig::new(&path)).unwrap();
        let mut service = portkeeper::PortService::new(
            db,
            portkeeper::MockInspector::new(),
            portkeeper::MockProcessControl::new(),
        );
        service
            .reserve_port(3000, &ReserveOptions::new("api"))
            .unwrap();
    }

    let db = portkeeper::Database::open(portkeeper::DatabaseConfig::new(&path)).unwrap();
    let mut service = portkeeper::PortService::new(
        db,
        portkeeper::MockInspector::new(),
        portkeeper::MockProcessControl::new(),
    );
    assert_eq!(service.check_port(3000).unwrap(), PortStatus::Reserved);
}
