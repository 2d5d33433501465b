use std::fmt;
use std::str::FromStr;

use ::cid::Cid;
use serde::{Deserialize, Serialize};

/// Pinned by every companion at startup, whatever the pin list holds.
pub const TEIA_STARTUP_PIN: &str = "bafkreidtuosuw37f5xmn65b3ksdiikajy7pwjjslzj2lxxz2vc4wdy3zku";

/// A validated content identifier.
///
/// The pin list itself stores the raw strings the user typed; this type
/// is only constructed at the point where we need to talk to the node and
/// the identifier has to actually resolve to an IPFS path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentId(Cid);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContentIdError {
    #[error("content identifier is empty")]
    Empty,
    #[error("malformed content identifier {input:?}: {reason}")]
    Malformed { input: String, reason: String },
}

impl ContentId {
    /// Parse a CID from user input. Surrounding whitespace and a leading
    /// `/ipfs/` prefix are tolerated.
    pub fn parse(input: &str) -> Result<Self, ContentIdError> {
        let trimmed = strip(input);
        if trimmed.is_empty() {
            return Err(ContentIdError::Empty);
        }

        Cid::try_from(trimmed)
            .map(Self)
            .map_err(|e| ContentIdError::Malformed {
                input: input.to_string(),
                reason: e.to_string(),
            })
    }

    /// The `/ipfs/<cid>` path the node's pin API expects.
    pub fn ipfs_path(&self) -> String {
        format!("/ipfs/{}", self.0)
    }

    /// The form an identifier is stored and compared in.
    ///
    /// `/ipfs/<cid>`, `<cid>` and any other encoding of the same CID all map
    /// to one string. Input that is not a CID is only trimmed and stripped,
    /// so it still round-trips through the pin list.
    pub fn canonicalize(input: &str) -> String {
        let bare = strip(input);
        match Cid::try_from(bare) {
            Ok(cid) => cid.to_string(),
            Err(_) => bare.to_string(),
        }
    }
}

fn strip(input: &str) -> &str {
    let trimmed = input.trim();
    trimmed.strip_prefix("/ipfs/").unwrap_or(trimmed).trim()
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ContentId {
    type Err = ContentIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ContentId {
    type Error = ContentIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ContentId> for String {
    fn from(value: ContentId) -> Self {
        value.to_string()
    }
}
