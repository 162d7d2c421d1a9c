use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A named collection of records attached to a product version.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Association {
    /// Links to shared environments.
    Environments,
    /// The version's own team members.
    Team,
    /// Test runs recorded against the version.
    Runs,
    /// Test case versions written for the version.
    Caseversions,
}

impl Association {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Environments => "environments",
            Self::Team => "team",
            Self::Runs => "runs",
            Self::Caseversions => "caseversions",
        }
    }

    /// Link collections can be duplicated onto another version. Runs and case
    /// versions are owned records and cannot.
    pub fn is_copyable(&self) -> bool {
        matches!(self, Self::Environments | Self::Team)
    }
}

impl FromStr for Association {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "environments" => Ok(Self::Environments),
            "team" => Ok(Self::Team),
            "runs" => Ok(Self::Runs),
            "caseversions" => Ok(Self::Caseversions),
            other => Err(Error::validation(format!("unknown association: {}", other))),
        }
    }
}
