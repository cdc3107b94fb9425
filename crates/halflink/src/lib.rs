//! Ordered request/reply over half-duplex serial links.
//!
//! halflink lets a host issue binary requests to one device on a serial line
//! and get the replies back in issuance order, with any link failure
//! surfacing to every caller.
//!
//! # Crate Structure
//!
//! - [`transport`]: Serial device streams (115200 8N1) and port enumeration
//! - [`frame`]: Sentinel-header framing and the codec [`Dispatcher`](frame::Dispatcher) contract
//! - [`keyring`]: Keyed fixed-width packet codec (behind `keyring` feature)
//! - [`remote`]: Host proxy and supervised device worker (behind `remote` feature)

/// Re-export transport types.
pub mod transport {
    pub use halflink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use halflink_frame::*;
}

/// Re-export keyring codec types (requires `keyring` feature).
#[cfg(feature = "keyring")]
pub mod keyring {
    pub use halflink_keyring::*;
}

/// Re-export remote link types (requires `remote` feature).
#[cfg(feature = "remote")]
pub mod remote {
    pub use halflink_remote::*;
}
