//! UDP Logger Relay - translate amateur radio logging broadcasts into N1MM XML.
//!
//! This crate provides:
//! - Dialect detection for WSJT-X, Fldigi, JS8Call, VarAC and N1MM messages
//! - Tolerant nom-based parsers that extract a normalized contact record
//! - An N1MM Logger Plus `contactinfo` XML serializer
//! - An async UDP relay with a bounded worker pool and statistics tracking
//!
//! # Example
//!
//! ```rust
//! use udp_logger_relay::{StationProfile, detect, n1mm, parser};
//!
//! let message = "<call:6>VK1ABC<band:3>20m<mode:3>FT8<rst_sent:3>-05<rst_rcvd:3>-12<eor>";
//! let dialect = detect(message);
//! let record = parser::parse(message, dialect).expect("Failed to parse message");
//!
//! let xml = n1mm::serialize(&record, &StationProfile::default()).expect("Failed to serialize");
//! assert!(xml.contains("<call>VK1ABC</call>"));
//! ```

pub mod adif;
pub mod band;
pub mod config;
pub mod contact;
pub mod detect;
pub mod filter;
pub mod metrics;
pub mod n1mm;
pub mod parser;
pub mod pipeline;
pub mod relay;
pub mod samples;
pub mod scan;
pub mod stats;

pub use band::{UNKNOWN_BAND, frequency_to_band};
pub use config::Config;
pub use contact::{ContactRecord, Dialect, DialectSelection, StationProfile};
pub use detect::detect;
pub use filter::SourceFilter;
pub use n1mm::SerializeError;
pub use parser::{ParseError, parse};
pub use pipeline::{DropReason, Pipeline, Translated};
pub use relay::Relay;
pub use stats::{RelayStats, RelaySummary};
