use std::fmt;

use thiserror::Error;
use updist_resource::{Arch, Channel, Os};

pub const DELIMITER: char = '|';

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("resource id '{0}' contains the key delimiter")]
    Delimiter(String),
    #[error("resource id is empty")]
    Empty,
}

/// `{resource_id}|{os}|{arch}|{channel}`.
///
/// Os, arch and channel come from closed sets, so every key of a resource can
/// be enumerated with [`CacheKey::all_for_resource`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    resource_id: String,
    os:          Os,
    arch:        Arch,
    channel:     Channel,
}

impl CacheKey {
    pub fn new(
        resource_id: impl Into<String>,
        os: Os,
        arch: Arch,
        channel: Channel,
    ) -> Result<Self, KeyError> {
        let resource_id = resource_id.into();
        if resource_id.is_empty() {
            return Err(KeyError::Empty);
        }
        if resource_id.contains(DELIMITER) {
            return Err(KeyError::Delimiter(resource_id));
        }
        Ok(Self {
            resource_id,
            os,
            arch,
            channel,
        })
    }

    pub fn resource_id(&self) -> &str { &self.resource_id }

    /// The os × arch × channel cross-product for one resource.
    pub fn all_for_resource(resource_id: &str) -> Result<Vec<CacheKey>, KeyError> {
        let mut keys = Vec::with_capacity(Os::ALL.len() * Arch::ALL.len() * Channel::ALL.len());
        for os in Os::ALL {
            for arch in Arch::ALL {
                for channel in Channel::ALL {
                    keys.push(Self::new(resource_id, os, arch, channel)?);
                }
            }
        }
        Ok(keys)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{DELIMITER}{}{DELIMITER}{}{DELIMITER}{}",
            self.resource_id, self.os, self.arch, self.channel
        )
    }
}
