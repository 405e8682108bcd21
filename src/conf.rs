//! Mail settings module.
//!
//! Settings are merged from prioritized sources and resolved once, when a
//! mailer or backend is built.

#[cfg(feature = "conf")]
pub use epistle_conf::*;
