use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Result of running a processing section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Reject,
    Fail,
    Ok,
    Handled,
    Invalid,
    Disallow,
    NotFound,
    Noop,
    Updated,
}

impl Outcome {
    pub const ALL: [Outcome; 9] = [
        Outcome::Reject,
        Outcome::Fail,
        Outcome::Ok,
        Outcome::Handled,
        Outcome::Invalid,
        Outcome::Disallow,
        Outcome::NotFound,
        Outcome::Noop,
        Outcome::Updated,
    ];

    /// Position in [`Outcome::ALL`], used to index outcome maps.
    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Reject => "reject",
            Outcome::Fail => "fail",
            Outcome::Ok => "ok",
            Outcome::Handled => "handled",
            Outcome::Invalid => "invalid",
            Outcome::Disallow => "disallow",
            Outcome::NotFound => "notfound",
            Outcome::Noop => "noop",
            Outcome::Updated => "updated",
        }
    }

    /// Whether the outcome counts as a failure for the exchange.
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            Outcome::Reject | Outcome::Fail | Outcome::Invalid | Outcome::Disallow | Outcome::NotFound
        )
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Outcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Outcome::ALL
            .into_iter()
            .find(|o| o.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown outcome: {s}"))
    }
}
