use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

const MAX_COMPONENTS: usize = 4;

/// A `major.minor.build.revision` version identifier.
///
/// Missing trailing components count as zero, so `1.2` and `1.2.0.0` are
/// equal. The number of components written is only kept for display.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    components: [u32; MAX_COMPONENTS],
    len: usize,
}

impl Version {
    #[must_use]
    pub fn new(major: u32, minor: u32, build: u32, revision: u32) -> Self {
        Self {
            components: [major, minor, build, revision],
            len: MAX_COMPONENTS,
        }
    }

    #[must_use]
    pub fn major(&self) -> u32 {
        self.components[0]
    }

    #[must_use]
    pub fn minor(&self) -> u32 {
        self.components[1]
    }

    #[must_use]
    pub fn build(&self) -> u32 {
        self.components[2]
    }

    #[must_use]
    pub fn revision(&self) -> u32 {
        self.components[3]
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.components == other.components
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.components.hash(state);
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.components.cmp(&other.components)
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, component) in self.components[..self.len].iter().enumerate() {
            if index > 0 {
                f.write_str(".")?;
            }
            write!(f, "{component}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VersionParseError {
    #[error("Version string is empty")]
    Empty,
    #[error("Expected at most {MAX_COMPONENTS} components, got: {input}")]
    TooManyComponents { input: String },
    #[error("Invalid version component {position}: {value:?}")]
    InvalidComponent { position: usize, value: String },
}

impl FromStr for Version {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
        if trimmed.is_empty() {
            return Err(VersionParseError::Empty);
        }

        let mut components = [0_u32; MAX_COMPONENTS];
        let mut len = 0;
        for (position, part) in trimmed.split('.').enumerate() {
            if position >= MAX_COMPONENTS {
                return Err(VersionParseError::TooManyComponents {
                    input: trimmed.to_string(),
                });
            }
            // `u32::from_str` accepts a leading '+', which is not a version digit.
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(VersionParseError::InvalidComponent {
                    position,
                    value: part.to_string(),
                });
            }
            components[position] = part
                .parse()
                .map_err(|_| VersionParseError::InvalidComponent {
                    position,
                    value: part.to_string(),
                })?;
            len = position + 1;
        }

        Ok(Self { components, len })
    }
}

impl TryFrom<String> for Version {
    type Error = VersionParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Version> for String {
    fn from(value: Version) -> Self {
        value.to_string()
    }
}
