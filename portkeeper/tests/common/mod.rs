//! Common test utilities for integration tests.

use portkeeper::database::{Database, DatabaseConfig};
use portkeeper::{MockInspector, MockProcessControl, PortService};

/// Creates a test database in a temporary location.
///
/// The backing directory is leaked so it outlives the returned handle.
#[allow(dead_code)]
pub fn create_test_database() -> Database {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test.db");
    let db = Database::open(DatabaseConfig::new(path)).unwrap();
    std::mem::forget(dir);
    db
}

/// Creates a service over a fresh store with scripted OS fakes.
#[allow(dead_code)]
pub fn create_test_service() -> PortService<MockInspector, MockProcessControl> {
    PortService::new(
        create_test_database(),
        MockInspector::new(),
        MockProcessControl::new(),
    )
    .with_termination_grace(std::time::Duration::from_millis(10))
}
