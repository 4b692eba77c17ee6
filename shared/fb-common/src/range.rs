//! Post Range Expressions
//!
//! A single token selecting which posts of a topic to return:
//!
//! | Token      | Selection                                   |
//! |------------|---------------------------------------------|
//! | `N`        | the post numbered `N`                       |
//! | `N-M`      | posts numbered `N..=M`                      |
//! | `-M`       | posts numbered `..=M` (`-0` selects nothing) |
//! | `N-`       | posts numbered `N..`                        |
//! | `recent`   | the last 30 posts                           |
//! | `l<K>`     | the last `K` posts                          |
//!
//! Lower bounds of zero are read as one. Results are always ordered by
//! number ascending.

use std::str::FromStr;

/// Window used by `recent`.
pub const RECENT_WINDOW: i64 = 30;

/// Parsed range expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostRange {
    /// No token: every post.
    All,
    /// Exactly one post number.
    Single(i64),
    /// Inclusive bounds, either of which may be open.
    Span {
        lower: Option<i64>,
        upper: Option<i64>,
    },
    /// The last `n` posts by number.
    Last(i64),
}

/// Concrete selection a store can execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// Nothing can match.
    Empty,
    /// Numbers within `lower..=upper` (open when `None`).
    Numbers {
        lower: Option<i64>,
        upper: Option<i64>,
    },
    /// The last `n` posts by number.
    Last(i64),
}

/// Errors parsing a range token.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RangeParseError {
    #[error("empty range expression")]
    Empty,
    #[error("invalid range expression: {0}")]
    Invalid(String),
}

impl PostRange {
    /// Parses an optional token; `None` selects every post.
    pub fn parse_opt(token: Option<&str>) -> Result<Self, RangeParseError> {
        token.map_or(Ok(Self::All), str::parse)
    }

    /// Reduces the expression to a selection over post numbers.
    pub fn selection(&self) -> Selection {
        match *self {
            Self::All => Selection::Numbers {
                lower: None,
                upper: None,
            },
            Self::Single(n) if n <= 0 => Selection::Empty,
            Self::Single(n) => Selection::Numbers {
                lower: Some(n),
                upper: Some(n),
            },
            Self::Span { lower, upper } => {
                let lower = lower.map(|n| n.max(1));
                match (lower, upper) {
                    (_, Some(upper)) if upper <= 0 => Selection::Empty,
                    (Some(lower), Some(upper)) if lower > upper => Selection::Empty,
                    (lower, upper) => Selection::Numbers { lower, upper },
                }
            }
            Self::Last(n) if n <= 0 => Selection::Empty,
            Self::Last(n) => Selection::Last(n),
        }
    }

    /// Applies the expression to an ascending list of existing post numbers.
    pub fn apply(&self, numbers: &[i64]) -> Vec<i64> {
        match self.selection() {
            Selection::Empty => Vec::new(),
            Selection::Numbers { lower, upper } => numbers
                .iter()
                .copied()
                .filter(|n| lower.is_none_or(|l| *n >= l) && upper.is_none_or(|u| *n <= u))
                .collect(),
            Selection::Last(count) => {
                let skip = numbers.len().saturating_sub(count as usize);
                numbers[skip..].to_vec()
            }
        }
    }
}

fn parse_number(raw: &str, token: &str) -> Result<i64, RangeParseError> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(RangeParseError::Invalid(token.to_string()));
    }
    raw.parse()
        .map_err(|_| RangeParseError::Invalid(token.to_string()))
}

impl FromStr for PostRange {
    type Err = RangeParseError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let token = token.trim();
        if token.is_empty() {
            return Err(RangeParseError::Empty);
        }

        if token == "recent" {
            return Ok(Self::Last(RECENT_WINDOW));
        }

        if let Some(window) = token.strip_prefix('l') {
            return parse_number(window, token).map(Self::Last);
        }

        match token.split_once('-') {
            None => parse_number(token, token).map(Self::Single),
            Some(("", "")) => Err(RangeParseError::Invalid(token.to_string())),
            Some(("", upper)) => Ok(Self::Span {
                lower: None,
                upper: Some(parse_number(upper, token)?),
            }),
            Some((lower, "")) => Ok(Self::Span {
                lower: Some(parse_number(lower, token)?),
                upper: None,
            }),
            Some((lower, upper)) => Ok(Self::Span {
                lower: Some(parse_number(lower, token)?),
                upper: Some(parse_number(upper, token)?),
            }),
        }
    }
}
