use super::*;

// =============================================================================
// env_bool: uses unique env var names to avoid races with parallel tests.
// =============================================================================

#[test]
fn env_bool_true_variants() {
    for (i, val) in ["1", "true", "yes", "on"].iter().enumerate() {
        let key = format!("__TEST_LS_EB_TRUE_{i}__");
        unsafe { std::env::set_var(&key, val) };
        assert_eq!(env_bool(&key), Some(true), "expected true for {val:?}");
        unsafe { std::env::remove_var(&key) };
    }
}

#[test]
fn env_bool_false_variants() {
    for (i, val) in ["0", "false", "no", "off"].iter().enumerate() {
        let key = format!("__TEST_LS_EB_FALSE_{i}__");
        unsafe { std::env::set_var(&key, val) };
        assert_eq!(env_bool(&key), Some(false), "expected false for {val:?}");
        unsafe { std::env::remove_var(&key) };
    }
}

#[test]
fn env_bool_case_insensitive_and_trimmed() {
    let key = "__TEST_LS_EB_CI_118__";
    unsafe { std::env::set_var(key, "  TRUE ") };
    assert_eq!(env_bool(key), Some(true));
    unsafe { std::env::remove_var(key) };
}

#[test]
fn env_bool_invalid_returns_none() {
    let key = "__TEST_LS_EB_INVALID_119__";
    unsafe { std::env::set_var(key, "maybe") };
    assert_eq!(env_bool(key), None);
    unsafe { std::env::remove_var(key) };
}

#[test]
fn env_bool_unset_returns_none() {
    assert_eq!(env_bool("__TEST_LS_EB_SURELY_UNSET_120__"), None);
}

// =============================================================================
// env_parse
// =============================================================================

#[test]
fn env_parse_reads_value() {
    let key = "__TEST_LS_EP_VALUE_121__";
    unsafe { std::env::set_var(key, " 42 ") };
    assert_eq!(env_parse::<u64>(key, 7), 42);
    unsafe { std::env::remove_var(key) };
}

#[test]
fn env_parse_falls_back_on_garbage() {
    let key = "__TEST_LS_EP_GARBAGE_122__";
    unsafe { std::env::set_var(key, "lots") };
    assert_eq!(env_parse::<u16>(key, 3000), 3000);
    unsafe { std::env::remove_var(key) };
}

#[test]
fn env_parse_falls_back_when_unset() {
    assert_eq!(env_parse::<usize>("__TEST_LS_EP_UNSET_123__", 256), 256);
}

// =============================================================================
// SessionConfig
// =============================================================================

#[test]
fn session_config_defaults() {
    let config = SessionConfig::default();
    assert_eq!(config.access_ttl, time::Duration::hours(1));
    assert_eq!(config.refresh_ttl, time::Duration::days(30));
    assert_eq!(config.lookup_timeout, Duration::from_secs(2));
    assert!(!config.cookie_secure);
}

#[test]
fn config_error_names_variable() {
    let err = ConfigError::Missing("DATABASE_URL");
    assert!(err.to_string().contains("DATABASE_URL"));
}
