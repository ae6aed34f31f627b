#[cfg(test)]
mod tests {
    use crate::error::ErrorCode;
    use crate::models::{PageView, Tally, VoteAction, VoteForm, VoteOptions};
    use crate::validation::{parse_vote_form, validate_options, validate_vote_label, ValidationError};

    fn form(vote: Option<&str>, action: Option<&str>) -> VoteForm {
        VoteForm {
            vote: vote.map(String::from),
            action: action.map(String::from),
        }
    }

    fn options() -> VoteOptions {
        VoteOptions::new("Cats", "Dogs")
    }

    #[test]
    fn test_parse_vote_form() {
        assert_eq!(parse_vote_form(&form(Some("Cats"), None)), Ok(VoteAction::Vote("Cats".into())));
        assert_eq!(parse_vote_form(&form(Some("reset"), None)), Ok(VoteAction::Reset));
        assert_eq!(parse_vote_form(&form(None, Some("reset"))), Ok(VoteAction::Reset));
        assert_eq!(parse_vote_form(&form(Some("Dogs"), Some("reset"))), Ok(VoteAction::Reset));
    }

    #[test]
    fn test_missing_vote() {
        assert_eq!(parse_vote_form(&form(None, None)), Err(ValidationError::MissingVote));
        assert_eq!(parse_vote_form(&form(Some(""), None)), Err(ValidationError::MissingVote));
        assert_eq!(parse_vote_form(&form(None, Some("other"))), Err(ValidationError::MissingVote));
    }

    #[test]
    fn test_unknown_label_passes_parsing() {
        assert_eq!(parse_vote_form(&form(Some("Birds"), None)), Ok(VoteAction::Vote("Birds".into())));
        assert!(matches!(
            validate_vote_label("Birds", &options()),
            Err(ValidationError::UnknownOption(label)) if label == "Birds"
        ));
        assert!(validate_vote_label("Dogs", &options()).is_ok());
    }

    #[test]
    fn test_validate_options() {
        assert!(validate_options(&options()).is_ok());
        assert_eq!(validate_options(&VoteOptions::new("", "Dogs")), Err(ValidationError::EmptyLabel));
        assert_eq!(validate_options(&VoteOptions::new("Cats", "  ")), Err(ValidationError::EmptyLabel));
        assert_eq!(
            validate_options(&VoteOptions::new("Cats", "Cats")),
            Err(ValidationError::DuplicateLabel("Cats".into()))
        );
        assert_eq!(
            validate_options(&VoteOptions::new("x".repeat(65), "Dogs")),
            Err(ValidationError::LabelTooLong)
        );
    }

    #[test]
    fn test_percentages() {
        assert_eq!(Tally { value1: 0, value2: 0 }.percentages(), (0, 0));
        assert_eq!(Tally { value1: 3, value2: 1 }.percentages(), (75, 25));
        assert_eq!(Tally { value1: 1, value2: 2 }.percentages(), (33, 67));
        assert_eq!(Tally { value1: 5, value2: 0 }.percentages(), (100, 0));
    }

    #[test]
    fn test_page_view() {
        let view = PageView::new("Pets", &options(), Tally { value1: 3, value2: 0 });
        assert_eq!(view.button1, "Cats");
        assert_eq!(view.button2, "Dogs");
        assert_eq!((view.value1, view.value2), (3, 0));
        assert_eq!((view.percent1, view.percent2), (100, 0));
        assert_eq!(view.title, "Pets");
    }

    #[test]
    fn test_percentages_with_huge_counts() {
        assert_eq!(Tally { value1: i64::MAX, value2: 1 }.percentages(), (100, 0));
        assert_eq!(Tally { value1: 1, value2: i64::MAX }.percentages(), (0, 100));
        assert_eq!(Tally { value1: i64::MAX, value2: i64::MAX }.total(), i64::MAX);

        let view = PageView::new("Pets", &options(), Tally { value1: i64::MAX, value2: 1 });
        assert_eq!((view.percent1, view.percent2), (100, 0));
        assert_eq!(view.value1, i64::MAX);
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(ErrorCode::InvalidInput.status_code(), 400);
        assert_eq!(ErrorCode::StoreUnavailable.status_code(), 503);
        assert_eq!(ErrorCode::StoreUnavailable.to_string(), "Counter store unavailable");
    }
}
