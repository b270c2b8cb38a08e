//! Connection profiles.
//!
//! # Data Flow
//! ```text
//! share link (pasted / scanned / subscription)
//!     → link.rs (scheme detection, host/port/name, domain check)
//!     → Connection (stored by the application)
//!
//! stored connections + selected id
//!     → builder.rs (outbound per connection, fixed inbounds/dns/routing)
//!     → runtime document text
//!     → Controller::start
//! ```
//!
//! # Design Decisions
//! - Only hosts on the allowed domain are accepted
//! - The selected connection is the one routing targets; the others are
//!   present but unused until selected

pub mod builder;
pub mod link;

pub use builder::{build_document, BuildOptions, ProfileError, SELECTED_TAG};
pub use link::{is_valid_subscription_url, parse_link, Connection, LinkError, ParsedLink, Protocol};
