//! # ab-eip
//!
//! A session-layer client library for Allen-Bradley/Rockwell and Omron
//! EtherNet/IP PLCs. Applications open named "tags" against a gateway and
//! read or write them as typed bytes; a single background worker thread
//! owns every socket, CIP/PCCC request framing, and Class-3 connection
//! lifecycle behind that handle. See SPEC_FULL.md for the full design.

pub mod attrib;
pub mod cli;
pub mod codec;
pub mod error;
pub mod io_handler;
pub mod path;
pub mod registry;
pub mod request;
pub mod session;
pub mod tag;

pub use attrib::TagConfig;
pub use error::{PlcError, PlcResult};
pub use path::PlcFamily;
pub use session::Session;
pub use tag::Tag;

/// The current version of this library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
