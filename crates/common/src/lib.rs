/**
 * Content identifiers as the companion understands them.
 * Thin validation layer over the `cid` crate that also
 *  knows how to turn an identifier into an IPFS path.
 */
pub mod content;
/**
 * Well-known peers the companion dials at startup.
 */
pub mod peer;
/**
 * Helper for setting build version information
 *  at compile time.
 */
pub mod version;

pub mod prelude {
    pub use crate::content::{ContentId, ContentIdError, TEIA_STARTUP_PIN};
    pub use crate::peer::{BootstrapPeer, BootstrapPeerError, TEIA_BOOTSTRAP_PEER};
    pub use crate::version::BuildInfo;
}
