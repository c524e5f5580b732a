/*!
 * Configuration Tests
 * Environment overrides and app manifest loading
 */

use app_lifecycle::apps::AppDirectory;
use app_lifecycle::core::ConfigError;
use app_lifecycle::{LifecycleConfig, StaticAppDirectory};
use std::io::Write;
use std::time::Duration;

#[test]
fn test_lookup_overrides() {
    let config = LifecycleConfig::from_lookup(|key| match key {
        "LIFECYCLE_NOT_RESPONDING_MS" => Some("2500".into()),
        "LIFECYCLE_STAGE_TIMEOUT_MS" => Some("100".into()),
        "LIFECYCLE_STRICT_BOOT" => Some("true".into()),
        _ => None,
    });

    assert_eq!(config.not_responding_timeout, Duration::from_millis(2500));
    assert_eq!(config.default_stage_timeout, Some(Duration::from_millis(100)));
    assert!(config.strict_boot);
    assert!(config.apps_path.is_none());
}

#[test]
fn test_manifest_loads_descriptors() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"[
            {{"id": "com.example.v1", "execPath": "/usr/bin/v1"}},
            {{"id": "com.example.v2", "execPath": "/usr/bin/v2", "nativeInterfaceVersion": 2, "locked": true}},
            {{"id": "com.example.alias", "execPath": "/usr/bin/v2", "redirect": "com.example.v2"}}
        ]"#
    )
    .unwrap();

    let apps = StaticAppDirectory::from_manifest(file.path()).unwrap();
    assert_eq!(apps.len(), 3);

    let v1 = apps.get_app_by_id("com.example.v1").unwrap();
    assert_eq!(v1.native_interface_version, 1);
    assert!(!v1.locked);
    assert!(apps.get_app_by_id("com.example.v2").unwrap().locked);
    assert_eq!(
        apps.get_app_by_id("com.example.alias").unwrap().redirect.as_deref(),
        Some("com.example.v2")
    );
}

#[test]
fn test_manifest_errors() {
    let dir = tempfile::tempdir().unwrap();

    let missing = StaticAppDirectory::from_manifest(&dir.path().join("apps.json"));
    assert!(matches!(missing, Err(ConfigError::Io { .. })));

    let bad = dir.path().join("bad.json");
    std::fs::write(&bad, "{ not json").unwrap();
    assert!(matches!(
        StaticAppDirectory::from_manifest(&bad),
        Err(ConfigError::Parse { .. })
    ));
}
