//! Input policy checks, applied before any cryptographic work.

use std::time::Duration;

use crate::error::CaError;

/// Maximum CN length accepted for issuance.
pub const MAX_CN_LEN: usize = 64;

/// Default ceiling on requested validity (one year).
pub const DEFAULT_MAX_VALIDITY: Duration = Duration::from_secs(8760 * 3600);

/// Check the common-name character policy.
///
/// CNs become filesystem directory names downstream, so the alphabet
/// is restricted to letters, digits, hyphen, and underscore — no
/// separators, no dots, nothing a path could interpret.
pub fn validate_cn(cn: &str) -> Result<(), CaError> {
    if cn.is_empty() {
        return Err(CaError::Validation("common name must not be empty".into()));
    }
    if cn.len() > MAX_CN_LEN {
        return Err(CaError::Validation(format!(
            "common name exceeds {MAX_CN_LEN} characters"
        )));
    }
    if let Some(bad) = cn
        .chars()
        .find(|c| !c.is_ascii_alphanumeric() && *c != '-' && *c != '_')
    {
        return Err(CaError::Validation(format!(
            "common name contains disallowed character {bad:?} (allowed: letters, digits, hyphen, underscore)"
        )));
    }
    Ok(())
}

/// Check a requested validity duration against the configured ceiling.
pub fn validate_validity(requested: Duration, ceiling: Duration) -> Result<(), CaError> {
    if requested.is_zero() {
        return Err(CaError::Validation("validity must be greater than zero".into()));
    }
    if requested > ceiling {
        return Err(CaError::Validation(format!(
            "validity {} exceeds the configured maximum {}",
            humantime::format_duration(requested),
            humantime::format_duration(ceiling)
        )));
    }
    Ok(())
}

/// Whether a CN can double as a DNS SAN. Underscores are allowed in
/// CNs but not in hostnames.
pub fn cn_is_dns_safe(cn: &str) -> bool {
    !cn.is_empty() && cn.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_typical_device_names() {
        for cn in ["site-001", "mqtt_bridge", "EMQX-node-2", "a"] {
            validate_cn(cn).unwrap();
        }
    }

    #[test]
    fn rejects_spaces_and_punctuation() {
        for cn in ["bad cn!", "a/b", "dot.name", "..", "semi;colon", "ütf"] {
            let err = validate_cn(cn).unwrap_err();
            assert!(matches!(err, CaError::Validation(_)), "{cn} should fail");
        }
    }

    #[test]
    fn rejects_empty_and_oversized() {
        assert!(validate_cn("").is_err());
        assert!(validate_cn(&"x".repeat(MAX_CN_LEN + 1)).is_err());
        assert!(validate_cn(&"x".repeat(MAX_CN_LEN)).is_ok());
    }

    #[test]
    fn validation_message_names_the_constraint() {
        let err = validate_cn("bad cn!").unwrap_err();
        assert!(err.to_string().contains("disallowed character"));
    }

    #[test]
    fn validity_within_ceiling_passes() {
        let ceiling = Duration::from_secs(8760 * 3600);
        validate_validity(Duration::from_secs(720 * 3600), ceiling).unwrap();
        validate_validity(ceiling, ceiling).unwrap();
    }

    #[test]
    fn validity_above_ceiling_fails() {
        let ceiling = Duration::from_secs(720 * 3600);
        let err = validate_validity(Duration::from_secs(721 * 3600), ceiling).unwrap_err();
        assert!(err.to_string().contains("exceeds"));
    }

    #[test]
    fn zero_validity_fails() {
        assert!(validate_validity(Duration::ZERO, DEFAULT_MAX_VALIDITY).is_err());
    }

    #[test]
    fn underscore_cn_is_not_dns_safe() {
        assert!(cn_is_dns_safe("site-001"));
        assert!(!cn_is_dns_safe("mqtt_bridge"));
    }
}
