use std::fmt;

/// Result of a state-replacing or source-writing operation.
///
/// Core operations never return errors to their caller; they log and report
/// one of these instead so callers can tell a failure from "nothing to do".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Unchanged,
    Updated(usize),
    Failed(String),
}

impl Outcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }

    pub fn failed(reason: impl fmt::Display) -> Self {
        Outcome::Failed(reason.to_string())
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Unchanged => f.write_str("unchanged"),
            Outcome::Updated(count) => write!(f, "updated {}", count),
            Outcome::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}
