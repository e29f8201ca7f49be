pub mod config;
pub mod logging;
pub mod error;
pub mod validation;
pub mod bom;

pub use config::*;
pub use logging::*;
pub use error::*;
pub use validation::*;
pub use bom::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8090);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.sync, SyncConfig::size_matched());
    }

    #[test]
    fn test_sync_profiles() {
        let legacy = SyncConfig::for_profile(SyncProfile::Legacy);
        assert_eq!(legacy.no_variants, NoVariantsPolicy::Warn);
        assert!(!legacy.resolves_variants());
        assert!(!legacy.sync_routing);

        let sized = SyncConfig::for_profile(SyncProfile::SizeMatched);
        assert_eq!(sized.no_variants, NoVariantsPolicy::Block);
        assert_eq!(sized.matching_attributes, vec!["Size".to_string()]);
        assert!(sized.sync_routing);
    }

    #[test]
    fn test_sync_config_deserializes_policy_names() {
        let config: SyncConfig = serde_json::from_str(
            r#"{
                "profile": "legacy",
                "no_variants": "block",
                "matching_attributes": ["Size", "Colour"],
                "sync_routing": false,
                "enabled_variants_only": true,
                "announce_skips": false
            }"#,
        )
        .unwrap();

        assert_eq!(config.profile, SyncProfile::Legacy);
        assert_eq!(config.no_variants, NoVariantsPolicy::Block);
        assert_eq!(config.matching_attributes.len(), 2);
    }

    fn config_dir(name: &str, local_toml: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("bomsync-config-{}-{}", name, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("local.toml"), local_toml).unwrap();
        dir
    }

    #[test]
    fn test_profile_from_file_selects_preset() {
        let dir = config_dir("legacy", "[sync]\nprofile = \"legacy\"\n");

        let config = AppConfig::load_from(&dir).unwrap();
        assert_eq!(config.sync, SyncConfig::legacy());
        assert_eq!(config.server.port, 8090);

        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_file_overrides_apply_on_top_of_profile() {
        let dir = config_dir(
            "override",
            "[sync]\nprofile = \"legacy\"\nno_variants = \"block\"\n",
        );

        let config = AppConfig::load_from(&dir).unwrap();
        assert_eq!(config.sync.profile, SyncProfile::Legacy);
        assert_eq!(config.sync.no_variants, NoVariantsPolicy::Block);
        assert!(config.sync.matching_attributes.is_empty());
        assert!(!config.sync.sync_routing);

        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_missing_sync_section_defaults_to_size_matched() {
        let dir = config_dir("empty", "[server]\nport = 9100\n");

        let config = AppConfig::load_from(&dir).unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.sync, SyncConfig::size_matched());

        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_error_handling() {
        let error = BomSyncError::validation("test_field", "test message");
        assert_eq!(error.error_code(), "VALIDATION_ERROR");
        assert_eq!(error.http_status_code(), 400);
    }

    #[test]
    fn test_blocked_error_response() {
        let error = BomSyncError::blocked(
            "Missing Variant Items",
            vec!["Row 1: A".to_string(), "Row 2: B".to_string()],
        );
        assert!(error.is_blocking());
        assert_eq!(error.http_status_code(), 417);
        assert_eq!(error.to_string(), "Missing Variant Items: Row 1: A; Row 2: B");

        let response = ErrorResponse::from(error);
        assert_eq!(response.code, "SYNC_BLOCKED");
        assert_eq!(response.title.as_deref(), Some("Missing Variant Items"));
        assert_eq!(response.messages.len(), 2);
    }
}
