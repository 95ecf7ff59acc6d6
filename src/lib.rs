//! file-taxes - unattended tax filing against Paraguay's Marangatu portal
//!
//! Logs in (solving the login captcha when the portal asks for one), reads
//! the account's pending obligations and resolves each with a registered
//! handler, then sends a single summary notification.

pub mod auth;
pub mod captcha;
pub mod codec;
pub mod config;
pub mod detect;
pub mod dispatch;
pub mod domain;
pub mod error;
pub mod notify;
pub mod orchestrator;
pub mod portal;
pub mod session;

pub use error::{FilerError, Result};
