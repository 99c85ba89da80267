//! Custom field validators shared by request payloads.

use validator::ValidationError;

/// Reject language rosters containing blank entries. An empty roster is
/// accepted and means "use the configured default roster".
pub fn validate_languages(languages: &[String]) -> Result<(), ValidationError> {
    if languages.iter().any(|language| language.trim().is_empty()) {
        return Err(ValidationError::new("blank_language")
            .with_message("language names must not be blank".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_roster_is_accepted() {
        assert!(validate_languages(&[]).is_ok());
    }

    #[test]
    fn blank_entries_are_rejected() {
        let languages = vec!["Python".to_string(), "  ".to_string()];
        assert!(validate_languages(&languages).is_err());
    }
}
