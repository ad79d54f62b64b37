//! Tests for startup settings loaded through `EnvSource`

use std::collections::HashMap;

use shared::{GroupId, SharedError};

use crate::config::{EngineConfig, JurySettings};
use crate::error::EngineError;
use crate::services::env::RealEnvSource;
use crate::traits::{EnvSource, MockEnvSource};

fn env_with(pairs: &[(&str, &str)]) -> MockEnvSource {
    let values: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let mut env = MockEnvSource::new();
    env.expect_var().returning(move |key| values.get(key).cloned());
    env
}

const REQUIRED: [(&str, &str); 2] = [
    ("JURY_ADMIN_PASSWORD", "hunter2"),
    ("EMAIL_FROM", "jury@example.com"),
];

#[test]
fn test_missing_admin_password_is_fatal() {
    let env = env_with(&[("EMAIL_FROM", "jury@example.com")]);
    match JurySettings::load(&env) {
        Err(EngineError::MissingEnv { key }) => assert_eq!(key, "JURY_ADMIN_PASSWORD"),
        other => panic!("expected MissingEnv, got {other:?}"),
    }
}

#[test]
fn test_empty_email_sender_is_fatal() {
    let env = env_with(&[("JURY_ADMIN_PASSWORD", "hunter2"), ("EMAIL_FROM", "")]);
    match JurySettings::load(&env) {
        Err(EngineError::MissingEnv { key }) => assert_eq!(key, "EMAIL_FROM"),
        other => panic!("expected MissingEnv, got {other:?}"),
    }
}

#[test]
fn test_defaults_apply_when_optional_keys_unset() {
    let settings = JurySettings::load(&env_with(&REQUIRED)).unwrap();
    assert_eq!(settings.admin_password, "hunter2");
    assert_eq!(settings.email_from, "jury@example.com");
    assert_eq!(settings.engine.scoring.reliability_prior.alpha, 10.0);
    assert_eq!(settings.engine.scoring.reliability_prior.beta, 1.0);
    assert_eq!(settings.engine.group_quota, 3);
    assert!(settings.engine.single_holder);
    assert!(settings.engine.group_layout.is_empty());
}

#[test]
fn test_optional_keys_override_defaults() {
    let mut pairs = REQUIRED.to_vec();
    pairs.extend([
        ("JURY_ALPHA_PRIOR", "4.5"),
        ("JURY_BETA_PRIOR", "2"),
        ("JURY_GROUP_QUOTA", "5"),
        ("JURY_SINGLE_HOLDER", "off"),
        ("JURY_LEASE_TTL_SECS", "30"),
        ("JURY_RETRY_ATTEMPTS", "4"),
        ("JURY_GROUPS", "1-10,11-20"),
    ]);
    let settings = JurySettings::load(&env_with(&pairs)).unwrap();
    let engine = settings.engine;

    assert_eq!(engine.scoring.reliability_prior.alpha, 4.5);
    assert_eq!(engine.scoring.reliability_prior.beta, 2.0);
    assert_eq!(engine.group_quota, 5);
    assert!(!engine.single_holder);
    assert_eq!(engine.lease_ttl, chrono::Duration::seconds(30));
    assert_eq!(engine.retry.max_attempts, 4);
    assert_eq!(engine.group_layout.group_for(15), GroupId(1));
}

#[test]
fn test_invalid_values_are_rejected() {
    for (key, value) in [
        ("JURY_ALPHA_PRIOR", "-1"),
        ("JURY_GROUP_QUOTA", "many"),
        ("JURY_SINGLE_HOLDER", "maybe"),
        ("JURY_RETRY_ATTEMPTS", "0"),
        ("JURY_GROUPS", "10-1"),
    ] {
        let mut pairs = REQUIRED.to_vec();
        pairs.push((key, value));
        let result = JurySettings::load(&env_with(&pairs));
        assert!(
            matches!(
                result,
                Err(EngineError::SharedError(SharedError::InvalidConfig { .. }))
            ),
            "{key}={value} should be rejected, got {result:?}"
        );
    }
}

#[test]
fn test_out_of_range_windows_are_rejected() {
    for key in ["JURY_LEASE_TTL_SECS", "JURY_IDLE_TIMEOUT_SECS"] {
        for value in ["9223372036854775807", "10000000000000", "0", "-30"] {
            let mut pairs = REQUIRED.to_vec();
            pairs.push((key, value));
            let result = JurySettings::load(&env_with(&pairs));
            assert!(
                matches!(
                    result,
                    Err(EngineError::SharedError(SharedError::InvalidConfig { .. }))
                ),
                "{key}={value} should be rejected, got {result:?}"
            );
        }
    }

    let mut pairs = REQUIRED.to_vec();
    pairs.push(("JURY_IDLE_TIMEOUT_SECS", "31536000"));
    let settings = JurySettings::load(&env_with(&pairs)).unwrap();
    assert_eq!(settings.engine.idle_timeout, chrono::Duration::days(365));
}

#[test]
fn test_engine_config_caps_lease_length() {
    let config = EngineConfig {
        lease_ttl: chrono::Duration::days(EngineConfig::MAX_WINDOW_DAYS + 1),
        ..EngineConfig::default()
    };
    assert!(matches!(
        config.validate(),
        Err(EngineError::SharedError(SharedError::InvalidConfig { .. }))
    ));
    assert!(EngineConfig::default().validate().is_ok());
}

#[test]
fn test_real_source_reads_process_environment() {
    std::env::set_var("JURY_ENV_SOURCE_CHECK", "present");
    let env = RealEnvSource::new();
    assert_eq!(env.var("JURY_ENV_SOURCE_CHECK").as_deref(), Some("present"));
    assert_eq!(env.var("JURY_ENV_SOURCE_UNSET"), None);
    std::env::remove_var("JURY_ENV_SOURCE_CHECK");
}
