use manual_catalog::load_config::{load_config, SCAN_ROOT_ENV};
use manual_catalog_core::config::{MergeMode, ResolverConfig};
use serial_test::serial;
use std::env;
use std::fs;
use tempfile::tempdir;

#[test]
#[serial]
fn minimal_public_base_config_gets_defaults_and_rebased_paths() {
    env::remove_var(SCAN_ROOT_ENV);
    let dir = tempdir().unwrap();
    fs::create_dir_all(dir.path().join("manuals")).unwrap();
    let path = dir.path().join("catalog.yaml");
    fs::write(
        &path,
        r#"
scan_root: manuals
resolver:
  type: public_base
  base_url: "https://files.example.com/share"
"#,
    )
    .unwrap();

    let config = load_config(&path).expect("Config should load");

    assert_eq!(config.scan_root, dir.path().join("manuals"));
    assert_eq!(config.catalog.output, dir.path().join("manuals.json"));
    assert_eq!(config.watch.log_file, dir.path().join("watcher_log.txt"));
    assert_eq!(config.catalog.merge, MergeMode::MergeAndPrune);
    assert!(config.validation.enabled);
    match config.resolver {
        ResolverConfig::PublicBase(source) => {
            assert_eq!(source.base_url, "https://files.example.com/share")
        }
        ResolverConfig::Graph(_) => panic!("Unexpected graph resolver"),
    }
}

#[test]
#[serial]
fn graph_config_with_auth_parses_all_sections() {
    env::remove_var(SCAN_ROOT_ENV);
    let dir = tempdir().unwrap();
    let path = dir.path().join("catalog.yaml");
    fs::write(
        &path,
        format!(
            r#"
scan_root: "{root}"
catalog:
  merge: rebuild
  reuse_existing_links: false
  allowed_extensions: [".pdf"]
resolver:
  type: graph
  site_hostname: contoso.sharepoint.com
  site_path: /sites/Support
  remote_prefix: Manuals
auth:
  client_id: "00000000-0000-0000-0000-000000000000"
  tenant_id: "11111111-1111-1111-1111-111111111111"
  login_hint: support@contoso.com
watch:
  debounce_ms: 500
  rebuild_command: ["./rebuild.sh"]
  git:
    remote: origin
    branch: main
"#,
            root = dir.path().display()
        ),
    )
    .unwrap();

    let config = load_config(&path).expect("Config should load");

    assert_eq!(config.catalog.merge, MergeMode::Rebuild);
    assert!(!config.catalog.reuse_existing_links);
    assert_eq!(config.catalog.allowed_extensions, vec![".pdf".to_string()]);
    match &config.resolver {
        ResolverConfig::Graph(source) => {
            assert_eq!(source.site_hostname, "contoso.sharepoint.com");
            assert_eq!(source.library, "Documents");
            assert_eq!(source.remote_prefix, "Manuals");
        }
        ResolverConfig::PublicBase(_) => panic!("Unexpected public base resolver"),
    }
    let auth = config.auth.expect("auth section");
    assert_eq!(auth.login_hint, "support@contoso.com");
    assert_eq!(auth.credential_cache, dir.path().join("credential_cache.json"));
    assert_eq!(config.watch.debounce_ms, 500);
    assert_eq!(
        config.watch.rebuild_command,
        Some(vec!["./rebuild.sh".to_string()])
    );
    assert_eq!(config.watch.git.remote.as_deref(), Some("origin"));
    assert!(config.watch.git.enabled);
}

#[test]
#[serial]
fn graph_resolver_without_auth_is_rejected() {
    env::remove_var(SCAN_ROOT_ENV);
    let dir = tempdir().unwrap();
    let path = dir.path().join("catalog.yaml");
    fs::write(
        &path,
        r#"
scan_root: "."
resolver:
  type: graph
  site_hostname: contoso.sharepoint.com
  site_path: /sites/Support
"#,
    )
    .unwrap();

    let err = load_config(&path).expect_err("graph without auth must fail");
    assert!(err.to_string().contains("auth"), "got: {err}");
}

#[test]
#[serial]
fn scan_root_can_be_overridden_from_environment() {
    let dir = tempdir().unwrap();
    let other = tempdir().unwrap();
    let path = dir.path().join("catalog.yaml");
    fs::write(
        &path,
        r#"
scan_root: does-not-exist
resolver:
  type: public_base
  base_url: "https://files.example.com/share"
"#,
    )
    .unwrap();

    env::set_var(SCAN_ROOT_ENV, other.path());
    let result = load_config(&path);
    env::remove_var(SCAN_ROOT_ENV);

    let config = result.expect("Config should load with overridden scan root");
    assert_eq!(config.scan_root, other.path());
}

#[test]
#[serial]
fn missing_scan_root_is_an_error() {
    env::remove_var(SCAN_ROOT_ENV);
    let dir = tempdir().unwrap();
    let path = dir.path().join("catalog.yaml");
    fs::write(
        &path,
        r#"
scan_root: nowhere
resolver:
  type: public_base
  base_url: "https://files.example.com/share"
"#,
    )
    .unwrap();

    assert!(load_config(&path).is_err());
}

#[test]
#[serial]
fn malformed_yaml_is_an_error() {
    env::remove_var(SCAN_ROOT_ENV);
    let dir = tempdir().unwrap();
    let path = dir.path().join("catalog.yaml");
    fs::write(&path, "scan_root: [unterminated").unwrap();
    assert!(load_config(&path).is_err());
}
