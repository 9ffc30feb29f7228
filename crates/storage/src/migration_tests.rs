// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

struct BumpVersion;

impl Migration for BumpVersion {
    fn source_version(&self) -> u32 {
        1
    }
    fn target_version(&self) -> u32 {
        2
    }
    fn migrate(&self, snapshot: &mut Value) -> Result<(), MigrationError> {
        if let Some(obj) = snapshot.as_object_mut() {
            obj.insert("migrated".into(), json!(true));
        }
        Ok(())
    }
}

#[test]
fn same_version_is_a_no_op() {
    let registry = MigrationRegistry::new();
    let snapshot = json!({"v": 3, "state": {}});
    let migrated = registry.migrate_to(snapshot.clone(), 3).unwrap();
    assert_eq!(migrated, snapshot);
}

#[test]
fn newer_than_target_is_rejected() {
    let registry = MigrationRegistry::new();
    let snapshot = json!({"v": 9, "state": {}});
    let err = registry.migrate_to(snapshot, 3).unwrap_err();
    assert!(matches!(err, MigrationError::TooNew(9, 3)));
}

#[test]
fn missing_path_is_reported() {
    let registry = MigrationRegistry::new();
    let snapshot = json!({"v": 1, "state": {}});
    let err = registry.migrate_to(snapshot, 5).unwrap_err();
    assert!(matches!(err, MigrationError::NoPath(1, 5)));
}

#[test]
fn registered_migration_runs_and_bumps_version() {
    let mut registry = MigrationRegistry::new();
    registry.migrations.push(Box::new(BumpVersion));
    let snapshot = json!({"v": 1, "state": {}});
    let migrated = registry.migrate_to(snapshot, 2).unwrap();
    assert_eq!(migrated["v"], json!(2));
    assert_eq!(migrated["migrated"], json!(true));
}
