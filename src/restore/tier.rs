// archivetool/src/restore/tier.rs
//
// Retrieval tier validation. Single-object restores and batch job
// submissions use two disjoint vocabularies: the batch enumeration is
// upper-case and has no expedited tier. The mode flag selects exactly one
// enumeration; we never try both.

use crate::errors::{AppError, Result};

const BATCH_TIERS: &[&str] = &["STANDARD", "BULK"];
const SINGLE_TIERS: &[&str] = &["Standard", "Bulk", "Expedited"];

/// Default tier applied when neither the caller nor the configuration
/// supplies one.
pub fn default_tier(batch_mode: bool) -> &'static str {
    if batch_mode { "STANDARD" } else { "Standard" }
}

/// Validates a requested retrieval option against the enumeration for the
/// execution mode and returns its canonical spelling. Empty or absent input
/// is valid and returns `None` (the caller substitutes a default).
pub fn validate_retrieval_option(raw: Option<&str>, batch_mode: bool) -> Result<Option<String>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let allowed = if batch_mode { BATCH_TIERS } else { SINGLE_TIERS };
    for canonical in allowed {
        if canonical.eq_ignore_ascii_case(trimmed) {
            return Ok(Some((*canonical).to_string()));
        }
    }

    Err(AppError::InvalidInput(format!(
        "retrieval option '{}' is not valid for a {} restore; allowed values: {}",
        trimmed,
        if batch_mode { "batch" } else { "single-object" },
        allowed.join(", ")
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_mode_accepts_standard() -> anyhow::Result<()> {
        assert_eq!(
            validate_retrieval_option(Some("STANDARD"), true)?,
            Some("STANDARD".to_string())
        );
        Ok(())
    }

    #[test]
    fn test_batch_mode_rejects_expedited() {
        let err = validate_retrieval_option(Some("Expedited"), true).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
        assert!(err.to_string().contains("STANDARD, BULK"));
    }

    #[test]
    fn test_single_mode_accepts_expedited() -> anyhow::Result<()> {
        assert_eq!(
            validate_retrieval_option(Some("Expedited"), false)?,
            Some("Expedited".to_string())
        );
        Ok(())
    }

    #[test]
    fn test_matching_is_case_insensitive_and_canonicalizing() -> anyhow::Result<()> {
        assert_eq!(
            validate_retrieval_option(Some("bulk"), true)?,
            Some("BULK".to_string())
        );
        assert_eq!(
            validate_retrieval_option(Some("STANDARD"), false)?,
            Some("Standard".to_string())
        );
        Ok(())
    }

    #[test]
    fn test_surrounding_whitespace_is_trimmed() -> anyhow::Result<()> {
        assert_eq!(
            validate_retrieval_option(Some("  Bulk \t"), false)?,
            Some("Bulk".to_string())
        );
        Ok(())
    }

    #[test]
    fn test_empty_and_absent_input_are_valid() -> anyhow::Result<()> {
        assert_eq!(validate_retrieval_option(None, false)?, None);
        assert_eq!(validate_retrieval_option(Some("   "), true)?, None);
        Ok(())
    }
}
