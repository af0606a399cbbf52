use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ResourceError;

/// Release track. Trust decreases from `Stable` to `Alpha`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Stable,
    Beta,
    Alpha,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Self::Stable, Self::Beta, Self::Alpha];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stable => "stable",
            Self::Beta => "beta",
            Self::Alpha => "alpha",
        }
    }

    /// The next less trusted channel a new latest version cascades into.
    pub fn next(self) -> Option<Channel> {
        match self {
            Self::Stable => Some(Self::Beta),
            Self::Beta => Some(Self::Alpha),
            Self::Alpha => None,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for Channel {
    type Err = ResourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stable" => Ok(Self::Stable),
            "beta" => Ok(Self::Beta),
            "alpha" => Ok(Self::Alpha),
            _ => Err(ResourceError::InvalidChannel(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cascade_order() {
        assert_eq!(Channel::Stable.next(), Some(Channel::Beta));
        assert_eq!(Channel::Beta.next(), Some(Channel::Alpha));
        assert_eq!(Channel::Alpha.next(), None);
    }

    #[test]
    fn parse_channel() {
        assert_eq!("Stable".parse::<Channel>().unwrap(), Channel::Stable);
        assert_eq!(" beta ".parse::<Channel>().unwrap(), Channel::Beta);
        assert!("nightly".parse::<Channel>().is_err());
    }

    #[test]
    fn serde_lowercase() {
        assert_eq!(serde_json::to_string(&Channel::Alpha).unwrap(), "\"alpha\"");
        let parsed: Channel = serde_json::from_str("\"stable\"").unwrap();
        assert_eq!(parsed, Channel::Stable);
    }
}
