use std::fmt;
use std::str::FromStr;

/// Teia's public IPFS node. Every companion dials it on startup so that
/// content pinned by one user is quickly reachable from the others.
pub const TEIA_BOOTSTRAP_PEER: &str =
    "/dnsaddr/ipfs.teia.art/p2p/12D3KooWP84PmvN2ncA2vDCzoea2DGgBsEgxRreiMWpvZdpEgtrq";

const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// A multiaddr that terminates in a `/p2p/<peer id>` component.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BootstrapPeer {
    address: String,
    peer_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BootstrapPeerError {
    #[error("multiaddr must start with '/': {0}")]
    NotAMultiaddr(String),
    #[error("multiaddr has no /p2p/<peer id> component: {0}")]
    MissingPeerId(String),
    #[error("invalid peer id {0:?}")]
    InvalidPeerId(String),
}

impl BootstrapPeer {
    pub fn parse(address: &str) -> Result<Self, BootstrapPeerError> {
        let address = address.trim();
        if !address.starts_with('/') {
            return Err(BootstrapPeerError::NotAMultiaddr(address.to_string()));
        }

        let (_, peer_id) = address
            .rsplit_once("/p2p/")
            .ok_or_else(|| BootstrapPeerError::MissingPeerId(address.to_string()))?;

        if peer_id.is_empty() || !peer_id.chars().all(|c| BASE58_ALPHABET.contains(c)) {
            return Err(BootstrapPeerError::InvalidPeerId(peer_id.to_string()));
        }

        Ok(Self {
            address: address.to_string(),
            peer_id: peer_id.to_string(),
        })
    }

    /// The compiled-in Teia peer.
    pub fn teia() -> Self {
        Self::parse(TEIA_BOOTSTRAP_PEER).expect("compiled-in bootstrap peer must parse")
    }

    /// Full multiaddr, transport part included.
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }
}

impl fmt::Display for BootstrapPeer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.address)
    }
}

impl FromStr for BootstrapPeer {
    type Err = BootstrapPeerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
