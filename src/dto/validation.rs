//! Validation helpers for DTOs.

use validator::ValidationError;

/// Upper bound on question text accepted at the HTTP boundary.
pub const MAX_QUESTION_TEXT_CHARS: usize = 2000;
/// Upper bound on the visitor identifier length.
pub const MAX_VISITOR_ID_LEN: usize = 128;

/// Validates that question text has visible content and is not oversized.
pub fn validate_question_text(text: &str) -> Result<(), ValidationError> {
    if text.trim().is_empty() {
        let mut err = ValidationError::new("question_text_blank");
        err.message = Some("Question text must not be empty".into());
        return Err(err);
    }

    let chars = text.trim().chars().count();
    if chars > MAX_QUESTION_TEXT_CHARS {
        let mut err = ValidationError::new("question_text_length");
        err.message = Some(
            format!("Question text must be at most {MAX_QUESTION_TEXT_CHARS} characters (got {chars})")
                .into(),
        );
        return Err(err);
    }

    Ok(())
}

/// Validates that a visitor ID is 1 to 128 visible ASCII characters.
///
/// # Examples
///
/// ```ignore
/// validate_visitor_id("3f0c2a9e-1b7d-4c55-9a61-0d2e6b1f8a44") // Ok
/// validate_visitor_id("")                                     // Err - empty
/// validate_visitor_id("has space")                            // Err - not visible
/// ```
pub fn validate_visitor_id(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() || id.len() > MAX_VISITOR_ID_LEN {
        let mut err = ValidationError::new("visitor_id_length");
        err.message = Some(
            format!(
                "Visitor ID must be between 1 and {MAX_VISITOR_ID_LEN} characters (got {})",
                id.len()
            )
            .into(),
        );
        return Err(err);
    }

    if !id.chars().all(|c| c.is_ascii_graphic()) {
        let mut err = ValidationError::new("visitor_id_format");
        err.message = Some("Visitor ID must contain only visible ASCII characters".into());
        return Err(err);
    }

    Ok(())
}
