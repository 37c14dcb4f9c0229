// Governor flag/config value: "N%" or "none".

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

static PERCENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([0-9]+)%$").expect("valid percent regex"));

/// Frequency to pin the CPUs to while a command runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum GovernorSetting {
    /// Leave the governor alone.
    None,
    /// Percent of the way between the lowest and highest frequency.
    Percent(i32),
}

impl Default for GovernorSetting {
    fn default() -> Self {
        Self::Percent(90)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("governor must be \"none\" or \"N%\" with N between 0 and 100, got {0:?}")]
pub struct InvalidGovernorSetting(String);

impl FromStr for GovernorSetting {
    type Err = InvalidGovernorSetting;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "none" {
            return Ok(Self::None);
        }
        PERCENT_RE
            .captures(s)
            .and_then(|caps| caps[1].parse::<i32>().ok())
            .filter(|pct| *pct <= 100)
            .map(Self::Percent)
            .ok_or_else(|| InvalidGovernorSetting(s.to_string()))
    }
}

impl TryFrom<String> for GovernorSetting {
    type Error = InvalidGovernorSetting;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<GovernorSetting> for String {
    fn from(g: GovernorSetting) -> Self {
        g.to_string()
    }
}

impl fmt::Display for GovernorSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Percent(pct) => write!(f, "{pct}%"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!("none".parse(), Ok(GovernorSetting::None));
        assert_eq!("0%".parse(), Ok(GovernorSetting::Percent(0)));
        assert_eq!("90%".parse(), Ok(GovernorSetting::Percent(90)));
        assert_eq!("100%".parse(), Ok(GovernorSetting::Percent(100)));
    }

    #[test]
    fn test_parse_rejects() {
        for bad in ["", "90", "%", "-5%", "101%", "ninety%", "None", "50 %"] {
            assert!(bad.parse::<GovernorSetting>().is_err(), "{bad:?}");
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(GovernorSetting::None.to_string(), "none");
        assert_eq!(GovernorSetting::default().to_string(), "90%");
    }
}
