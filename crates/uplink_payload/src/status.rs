use crate::PayloadError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Health verdict derived from an uplink's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UplinkStatus {
    Passing,
    /// Also the state of a device that has not reported yet.
    #[default]
    Failing,
}

impl UplinkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UplinkStatus::Passing => "passing",
            UplinkStatus::Failing => "failing",
        }
    }
}

impl fmt::Display for UplinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UplinkStatus {
    type Err = PayloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "passing" => Ok(UplinkStatus::Passing),
            "failing" => Ok(UplinkStatus::Failing),
            other => Err(PayloadError::UnknownStatus(other.to_string())),
        }
    }
}
