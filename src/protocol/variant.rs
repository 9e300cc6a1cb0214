//! Session variants
//!
//! A variant fixes the shape of a session: which optional keys the owner
//! sends, which inputs follow, and which pipeline the compute party runs.
//! Both peers must agree on it; every envelope carries it so that a
//! disagreement is caught on the first frame instead of misreading later ones.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionVariant {
    /// One income, one expense: net income and savings contribution
    Budget,
    /// Income, expense categories and a stated goal
    GoalTracking,
    /// Lists of income and expense items summed in batched slots
    Itemized,
}

impl SessionVariant {
    pub const ALL: [SessionVariant; 3] = [
        SessionVariant::Budget,
        SessionVariant::GoalTracking,
        SessionVariant::Itemized,
    ];

    /// Whether the session ships rotation keys after the relinearization key
    pub fn requires_rotation_keys(&self) -> bool {
        matches!(self, SessionVariant::Itemized)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionVariant::Budget => "budget",
            SessionVariant::GoalTracking => "goal-tracking",
            SessionVariant::Itemized => "itemized",
        }
    }
}

impl fmt::Display for SessionVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SessionVariant::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| format!("unknown variant '{}' (expected budget, goal-tracking or itemized)", s))
    }
}
