//! Domain types for file-taxes
//!
//! - Profile: the taxpayer as the portal describes them
//! - Obligation: one outstanding action (form filing or profile update)
//! - HandlerResult / RunReport: what came of each obligation and of the run
//! - period: the filing period being worked on

pub mod obligation;
pub mod period;
pub mod profile;
pub mod report;

pub use obligation::Obligation;
pub use period::{current_filing_period, profile_field_key};
pub use profile::Profile;
pub use report::{HandlerResult, ReportEntry, RunFailure, RunReport};
