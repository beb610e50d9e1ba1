use anyhow::Result;
use proptest::prelude::*;

use admin_console::config::ConsoleConfig;
use admin_console::obfuscation::PathObfuscator;
use admin_console::AppError;

#[test]
fn tokens_round_trip_and_differ_per_call() -> Result<()> {
    let obfuscator = PathObfuscator::new("console-secret")?;

    let first = obfuscator.encrypt("ACME/7")?;
    let second = obfuscator.encrypt("ACME/7")?;
    assert_ne!(first, second, "a fresh nonce per token");
    assert_eq!(obfuscator.decrypt(&first)?, "ACME/7");
    assert_eq!(obfuscator.decrypt(&second)?, "ACME/7");
    Ok(())
}

#[test]
fn tokens_do_not_cross_secrets() -> Result<()> {
    let token = PathObfuscator::new("one")?.encrypt("42")?;
    let err = PathObfuscator::new("two")?.decrypt(&token).expect_err("wrong key");
    assert!(matches!(err, AppError::BadRequest(_)));
    Ok(())
}

#[test]
fn tampered_or_garbage_tokens_are_rejected() -> Result<()> {
    let obfuscator = PathObfuscator::new("console-secret")?;
    let mut token = obfuscator.encrypt("42")?.into_bytes();
    let last = token.len() - 1;
    token[last] = if token[last] == b'A' { b'B' } else { b'A' };
    let token = String::from_utf8(token)?;

    assert!(obfuscator.decrypt(&token).is_err());
    assert!(obfuscator.decrypt("not base64!").is_err());
    assert!(obfuscator.decrypt("").is_err());
    Ok(())
}

#[test]
fn obfuscator_comes_from_config() -> Result<()> {
    let config = ConsoleConfig::from_lookup(|key| (key == "URL_SECRET").then(|| "s3cret".to_string()))?;
    let token = config.obfuscator()?.encrypt("positions")?;
    assert_eq!(PathObfuscator::new("s3cret")?.decrypt(&token)?, "positions");

    let unset = ConsoleConfig::from_lookup(|_| None)?;
    assert!(matches!(unset.obfuscator(), Err(AppError::Configuration(_))));
    Ok(())
}

proptest! {
    #[test]
    fn any_segment_round_trips_without_slashes(segment in "[ -.0-~]{0,64}") {
        let obfuscator = PathObfuscator::new("property-secret").unwrap();
        let token = obfuscator.encrypt(&segment).unwrap();

        prop_assert!(!token.contains('/'));
        prop_assert!(!token.contains('='));
        prop_assert_eq!(obfuscator.decrypt(&token).unwrap(), segment);
    }
}
