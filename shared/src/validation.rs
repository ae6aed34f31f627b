use crate::models::{VoteAction, VoteForm, VoteOptions, RESET_KEYWORD};

pub const MAX_LABEL_LENGTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Missing vote field")]
    MissingVote,
    #[error("Unknown option: {0}")]
    UnknownOption(String),
    #[error("Option label must not be empty")]
    EmptyLabel,
    #[error("Option label exceeds maximum length of {MAX_LABEL_LENGTH}")]
    LabelTooLong,
    #[error("Option labels must differ: {0}")]
    DuplicateLabel(String),
}

/// Turns a submitted form into an action. `action=reset` is accepted as an
/// alias of `vote=reset`; an empty `vote` value counts as missing.
pub fn parse_vote_form(form: &VoteForm) -> Result<VoteAction, ValidationError> {
    if form.action.as_deref().map(str::trim) == Some(RESET_KEYWORD) {
        return Ok(VoteAction::Reset);
    }

    match form.vote.as_deref() {
        Some(RESET_KEYWORD) => Ok(VoteAction::Reset),
        Some(label) if !label.is_empty() => Ok(VoteAction::Vote(label.to_string())),
        _ => Err(ValidationError::MissingVote),
    }
}

/// Only consulted in strict mode; by default any label passes through to the
/// store.
pub fn validate_vote_label(label: &str, options: &VoteOptions) -> Result<(), ValidationError> {
    if options.contains(label) {
        Ok(())
    } else {
        Err(ValidationError::UnknownOption(label.to_string()))
    }
}

pub fn validate_options(options: &VoteOptions) -> Result<(), ValidationError> {
    for label in options.labels() {
        if label.trim().is_empty() { return Err(ValidationError::EmptyLabel); }
        if label.len() > MAX_LABEL_LENGTH { return Err(ValidationError::LabelTooLong); }
    }
    if options.first == options.second {
        return Err(ValidationError::DuplicateLabel(options.first.clone()));
    }
    Ok(())
}
