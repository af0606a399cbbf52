use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ResourceError;

/// Target operating system. `Any` marks artifacts that run everywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Os {
    Any,
    Windows,
    Linux,
    Darwin,
    Android,
}

impl Os {
    pub const ALL: [Os; 5] = [
        Self::Any,
        Self::Windows,
        Self::Linux,
        Self::Darwin,
        Self::Android,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::Windows => "windows",
            Self::Linux => "linux",
            Self::Darwin => "darwin",
            Self::Android => "android",
        }
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for Os {
    type Err = ResourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "any" | "all" => Ok(Self::Any),
            "windows" | "win" => Ok(Self::Windows),
            "linux" => Ok(Self::Linux),
            "darwin" | "macos" | "mac" | "osx" => Ok(Self::Darwin),
            "android" => Ok(Self::Android),
            _ => Err(ResourceError::InvalidOs(s.to_string())),
        }
    }
}

/// CPU architecture. `Any` marks architecture-independent artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    Any,
    X86,
    X64,
    Arm64,
}

impl Arch {
    pub const ALL: [Arch; 4] = [Self::Any, Self::X86, Self::X64, Self::Arm64];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::X86 => "x86",
            Self::X64 => "x64",
            Self::Arm64 => "arm64",
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for Arch {
    type Err = ResourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "any" | "all" => Ok(Self::Any),
            "x86" | "386" | "i386" | "i686" => Ok(Self::X86),
            "x64" | "amd64" | "x86_64" => Ok(Self::X64),
            "arm64" | "aarch64" => Ok(Self::Arm64),
            _ => Err(ResourceError::InvalidArch(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Platform {
    pub os:   Os,
    pub arch: Arch,
}

impl Platform {
    pub const ANY: Platform = Platform {
        os:   Os::Any,
        arch: Arch::Any,
    };

    pub fn new(os: Os, arch: Arch) -> Self { Self { os, arch } }

    /// Lookup order for artifacts: exact match first, then the
    /// architecture-independent build, then the universal one.
    pub fn fallbacks(self) -> Vec<Platform> {
        let mut order = vec![self];
        for candidate in [Platform::new(self.os, Arch::Any), Platform::ANY] {
            if !order.contains(&candidate) {
                order.push(candidate);
            }
        }
        order
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}-{}", self.os, self.arch) }
}
