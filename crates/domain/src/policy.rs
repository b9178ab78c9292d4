//! Input constraints for writes

/// Input policy violations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyViolation {
    #[error("Content must be at least 1 character long.")]
    EmptyContent,
    #[error("An authenticated actor is required")]
    MissingActor,
}

/// Content must contain at least one character. Whitespace counts.
pub fn check_content(content: &str) -> Result<(), PolicyViolation> {
    if content.is_empty() {
        return Err(PolicyViolation::EmptyContent);
    }
    Ok(())
}

/// The actor id comes from the auth layer; an empty one means nobody is signed in.
pub fn check_actor(actor_id: &str) -> Result<(), PolicyViolation> {
    if actor_id.trim().is_empty() {
        return Err(PolicyViolation::MissingActor);
    }
    Ok(())
}
