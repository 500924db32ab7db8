//! Validated ticket identifiers for the three issue classes the tool handles.

use std::fmt;
use std::str::FromStr;

use crate::error::{AppError, Result};
use crate::ticket::types::IssueId;

pub const CHALLENGE_REQUEST_PREFIX: &str = "CHLRQ";
pub const CHALLENGE_CREATION_PREFIX: &str = "CHLC";
pub const APPLICATION_CREATION_PREFIX: &str = "CHLC";

/// Accepts 2 to 4 ASCII digits, nothing else.
fn parse_issue_number(prefix: &str, input: &str) -> Result<String> {
    let valid = (2..=4).contains(&input.len()) && input.bytes().all(|b| b.is_ascii_digit());
    if !valid {
        return Err(AppError::InvalidIssueId(format!(
            "{prefix}-{input} is not valid, enter 2-4 digits"
        )));
    }
    Ok(input.to_string())
}

macro_rules! issue_type {
    ($(#[$meta:meta])* $name:ident, $prefix:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub struct $name {
            number: String,
        }

        impl $name {
            pub const PREFIX: &'static str = $prefix;

            pub fn new(number: &str) -> Result<Self> {
                Ok(Self {
                    number: parse_issue_number(Self::PREFIX, number)?,
                })
            }

            pub fn number(&self) -> &str {
                &self.number
            }

            pub fn issue_id(&self) -> IssueId {
                IssueId::new(self.to_string())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}-{}", Self::PREFIX, self.number)
            }
        }

        impl FromStr for $name {
            type Err = AppError;

            fn from_str(s: &str) -> Result<Self> {
                Self::new(s)
            }
        }
    };
}

issue_type!(
    /// The ticket raised for an incoming defect report; closed once every fix is in.
    ChallengeRequestIssue,
    CHALLENGE_REQUEST_PREFIX
);

issue_type!(
    /// A ticket for one challenge affected by the defect.
    ChallengeCreationIssue,
    CHALLENGE_CREATION_PREFIX
);

issue_type!(
    /// The application-level ticket that challenge tickets are linked to.
    ApplicationCreationIssue,
    APPLICATION_CREATION_PREFIX
);
