use serde::{Serialize, Deserialize};

/// Keyword that resets both counters instead of voting.
pub const RESET_KEYWORD: &str = "reset";

/// The two labels a running instance accepts votes for. Each label doubles as
/// the counter's key in the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VoteOptions {
    pub first: String,
    pub second: String,
}

impl VoteOptions {
    pub fn new(first: impl Into<String>, second: impl Into<String>) -> Self {
        Self {
            first: first.into(),
            second: second.into(),
        }
    }

    pub fn labels(&self) -> [&str; 2] {
        [&self.first, &self.second]
    }

    pub fn contains(&self, label: &str) -> bool {
        self.first == label || self.second == label
    }
}

/// Raw form body of `POST /`. Both fields are optional so a missing field
/// becomes a client error instead of a form-guard failure.
#[cfg_attr(feature = "backend", derive(rocket::FromForm))]
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VoteForm {
    pub vote: Option<String>,
    pub action: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteAction {
    Reset,
    Vote(String),
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tally {
    pub value1: i64,
    pub value2: i64,
}

impl Tally {
    pub fn total(&self) -> i64 {
        self.value1.max(0).saturating_add(self.value2.max(0))
    }

    /// Rounded share of each option in percent; `(0, 0)` before the first vote.
    pub fn percentages(&self) -> (u8, u8) {
        if self.total() == 0 {
            return (0, 0);
        }
        let (first, second) = (self.value1.max(0) as f64, self.value2.max(0) as f64);
        let share = ((first / (first + second)) * 100.0).round().clamp(0.0, 100.0) as u8;
        (share, 100 - share)
    }
}

/// Everything the index template renders.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PageView {
    pub title: String,
    pub button1: String,
    pub button2: String,
    pub value1: i64,
    pub value2: i64,
    pub percent1: u8,
    pub percent2: u8,
}

impl PageView {
    pub fn new(title: &str, options: &VoteOptions, tally: Tally) -> Self {
        let (percent1, percent2) = tally.percentages();
        Self {
            title: title.to_string(),
            button1: options.first.clone(),
            button2: options.second.clone(),
            value1: tally.value1,
            value2: tally.value2,
            percent1,
            percent2,
        }
    }
}
