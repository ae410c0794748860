#![doc = concat!(
    "[![crates.io](https://img.shields.io/crates/v/", env!("CARGO_PKG_NAME"), ")](https://crates.io/crates/", env!("CARGO_PKG_NAME"), ")",
    " ",
    "[![docs.rs](https://img.shields.io/docsrs/", env!("CARGO_PKG_NAME"), ")](https://docs.rs/", env!("CARGO_PKG_NAME"), ")",
    " ",
    "![license](https://img.shields.io/crates/l/", env!("CARGO_PKG_NAME"), ")"
)]
#![doc = ""]
#![doc = env!("CARGO_PKG_DESCRIPTION")]
//!
//! ### Supported mechanisms
//!
//! see [`factory::Builtin`], any other mechanism can be wired in with [`Registry::register`].
//!
//! ### Usage
//!
//! ```
//! use asasl::{Credentials, Factory};
//!
//! let factory = Factory::default();
//! let credentials = Credentials::new("juliet", "r0m30myr0m30").with_host("capulet.lit");
//!
//! let mut mechanism = factory.negotiate(["PLAIN", "SCRAM-SHA-1"], credentials)?;
//! assert_eq!(mechanism.name(), "SCRAM-SHA-1");
//!
//! let client_first = mechanism.start()?;
//! assert!(client_first.is_some());
//! # Ok::<(), asasl::Error>(())
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(
    missing_docs,
    clippy::unwrap_used,
    clippy::panic,
    clippy::unimplemented,
    clippy::todo,
    clippy::undocumented_unsafe_blocks
)]
#![forbid(unsafe_code)]

mod error;
pub use error::{Error, Result};

mod config;
pub use config::Config;

mod credentials;
pub use credentials::Credentials;

pub mod mechanism;
pub use mechanism::{Mechanism, State};

pub mod registry;
pub use registry::{MechanismName, Registry};

pub mod factory;
pub use factory::Factory;
