use super::*;

#[test]
fn test_defaults_when_empty() {
    let cfg = parse("").unwrap();
    assert_eq!(cfg.server.port, 3000);
    assert_eq!(cfg.server.host, "0.0.0.0");
    assert_eq!(cfg.whatsapp.session_dir, "whatsapp_session");
    assert_eq!(cfg.groups.snapshot_file, "groups.json");
    assert_eq!(cfg.groups.refresh_delay(), Duration::from_secs(2));
    assert_eq!(cfg.connection.reconnect_delay(), Duration::ZERO);
    assert_eq!(cfg.log.level, "info");
    assert!(cfg.log.dir.is_none());
}

#[test]
fn test_partial_sections_keep_defaults() {
    let cfg = parse(
        r#"
        [server]
        port = 8080

        [groups]
        refresh_delay_ms = 500
    "#,
    )
    .unwrap();
    assert_eq!(cfg.server.port, 8080);
    assert_eq!(cfg.server.host, "0.0.0.0");
    assert_eq!(cfg.groups.refresh_delay_ms, 500);
    assert_eq!(cfg.groups.snapshot_file, "groups.json");
}

#[test]
fn test_invalid_toml_is_config_error() {
    let err = parse("[server\nport = ").unwrap_err();
    assert!(matches!(err, GatewayError::Config(_)));
}

#[test]
fn test_port_override() {
    let mut cfg = Config::default();
    apply_env_overrides(&mut cfg, Some("4100")).unwrap();
    assert_eq!(cfg.server.port, 4100);
}

#[test]
fn test_blank_port_override_ignored() {
    let mut cfg = Config::default();
    apply_env_overrides(&mut cfg, Some("  ")).unwrap();
    assert_eq!(cfg.server.port, 3000);
    apply_env_overrides(&mut cfg, None).unwrap();
    assert_eq!(cfg.server.port, 3000);
}

#[test]
fn test_invalid_port_override_rejected() {
    let mut cfg = Config::default();
    let err = apply_env_overrides(&mut cfg, Some("http")).unwrap_err();
    assert!(err.to_string().contains("invalid PORT"));
}

#[test]
fn test_load_missing_file_uses_defaults() {
    let cfg = load_with_port("/nonexistent/__wagate_test__/config.toml", None).unwrap();
    assert_eq!(cfg.groups.snapshot_file, "groups.json");
    assert_eq!(cfg.server.port, 3000);
}

#[test]
fn test_load_file_then_port_override() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[server]\nport = 8080\n").unwrap();

    let path = path.to_string_lossy().into_owned();
    assert_eq!(load_with_port(&path, None).unwrap().server.port, 8080);
    assert_eq!(load_with_port(&path, Some("9090")).unwrap().server.port, 9090);
    assert!(load_with_port(&path, Some("nope")).is_err());
}

#[test]
fn test_shellexpand_home() {
    let expanded = shellexpand("~/sessions");
    if std::env::var_os("HOME").is_some() {
        assert!(!expanded.starts_with('~'));
        assert!(expanded.ends_with("/sessions"));
    }
    assert_eq!(shellexpand("relative/dir"), "relative/dir");
}
