//! Update-decision engine for appcast feeds.
//!
//! This crate holds everything needed to decide whether a host application
//! should announce an update, independent of any presentation layer:
//! - Version parsing and ordering.
//! - Feed retrieval over HTTP and feed document parsing.
//! - Persisted skip / remind-later decisions.
//! - The check-cycle orchestration that ties them together.

pub mod clock;
mod engine;
mod error;
mod feed;
mod identity;
mod parser;
pub mod store;
mod version;

/// Check-cycle orchestration, its configuration, and its outcomes.
pub use engine::{
    CheckContext, CheckOutcome, CheckResult, Cycle, RemindLater, RemindLaterUnit, UpdateEngine,
};
/// Error taxonomy surfaced by a check cycle.
pub use error::{CheckError, ParseError, StoreError};
/// Feed retrieval seam and its HTTP implementation.
pub use feed::{FeedFetcher, FetchError, FetchedFeed, HttpFeedFetcher};
/// Application identity and the namespace it derives.
pub use identity::{AppIdentity, Namespace};
/// Feed document model and parsing.
pub use parser::{PointerWidth, ReleaseCandidate, parse_feed, select_candidate};
/// Persisted decision state and its storage backends.
pub use store::{DecisionState, DecisionStore, JsonFileDecisionStore, MemoryDecisionStore};
/// Structured version identifiers.
pub use version::{Version, VersionParseError};
