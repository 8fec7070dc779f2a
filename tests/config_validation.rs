use opsdeck::config::Config;

#[test]
fn test_valid_config() {
    let config = Config::default();
    assert!(config.validate().is_ok());
}

#[test]
fn test_invalid_finder() {
    let mut config = Config::default();
    config.picker.finder = "invalid_finder".to_string();
    assert!(config.validate().is_err());
}

#[test]
fn test_valid_finders() {
    for finder in ["auto", "fzf", "skim"] {
        let mut config = Config::default();
        config.picker.finder = finder.to_string();
        assert!(
            config.validate().is_ok(),
            "Finder '{}' should be valid",
            finder
        );
    }
}

#[test]
fn test_endpoint_schemes() {
    let mut config = Config::default();
    config.endpoints.graphql_url = "ftp://example.com/graphql".to_string();
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.endpoints.ws_url = "https://example.com/graphql".to_string();
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.endpoints.api_url = "https://api.example.com".to_string();
    config.endpoints.graphql_url = "https://api.example.com/graphql".to_string();
    config.endpoints.ws_url = "wss://api.example.com/graphql".to_string();
    assert!(config.validate().is_ok());
}

#[test]
fn test_subscription_backoff_bounds() {
    let mut config = Config::default();
    config.subscriptions.retry_attempts = 0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.subscriptions.initial_delay_ms = config.subscriptions.max_delay_ms + 1;
    assert!(config.validate().is_err());
}

#[test]
fn test_partial_file_keeps_defaults() {
    let config: Config = toml::from_str(
        r#"
        [endpoints]
        graphql_url = "https://ops.example.com/graphql"
        "#,
    )
    .unwrap();

    assert_eq!(config.endpoints.graphql_url, "https://ops.example.com/graphql");
    assert_eq!(config.endpoints.ws_url, "ws://localhost:3000/graphql");
    assert_eq!(config.picker.finder, "auto");
    assert!(config.validate().is_ok());
}
