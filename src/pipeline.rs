//! Per-datagram processing: filter, detect, parse, serialize.
//!
//! A [`Pipeline`] holds everything that stays fixed for the lifetime of the
//! process (the source filter, the dialect selection and the station
//! profile) and carries no per-message state, so one instance is shared by
//! every worker.

use std::borrow::Cow;
use std::net::SocketAddr;

use thiserror::Error;
use tracing::debug;

use crate::config::Config;
use crate::contact::{ContactRecord, Dialect, DialectSelection, StationProfile};
use crate::detect::detect;
use crate::filter::SourceFilter;
use crate::n1mm::{self, SerializeError};
use crate::parser::{self, ParseError};

/// Why a datagram was not forwarded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DropReason {
    #[error("datagram from {0} is not from an allowed source")]
    SourceRejected(SocketAddr),

    #[error("parse failed: {0}")]
    Parse(#[from] ParseError),

    #[error("serialization failed: {0}")]
    Serialize(#[from] SerializeError),
}

/// A datagram that made it through the pipeline, ready to send.
#[derive(Debug, Clone, PartialEq)]
pub struct Translated {
    /// Dialect the message was parsed as.
    pub dialect: Dialect,

    /// The normalized contact.
    pub record: ContactRecord,

    /// N1MM XML for the target.
    pub xml: String,
}

/// Stateless message translator shared by all workers.
#[derive(Debug, Clone)]
pub struct Pipeline {
    filter: SourceFilter,
    selection: DialectSelection,
    profile: StationProfile,
}

impl Pipeline {
    pub fn new(filter: SourceFilter, selection: DialectSelection, profile: StationProfile) -> Self {
        Self {
            filter,
            selection,
            profile,
        }
    }

    /// Build a pipeline from validated configuration.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Ok(Self::new(
            SourceFilter::new(config.listen.port),
            config.dialect_selection()?,
            config.formatting.n1mm.clone(),
        ))
    }

    pub fn selection(&self) -> DialectSelection {
        self.selection
    }

    pub fn profile(&self) -> &StationProfile {
        &self.profile
    }

    /// Whether datagrams from `source` should be processed at all.
    pub fn accepts(&self, source: SocketAddr) -> bool {
        self.filter.accepts(source)
    }

    /// The dialect `payload` will be parsed as.
    pub fn dialect_for(&self, payload: &str) -> Dialect {
        match self.selection {
            DialectSelection::Auto => detect(payload),
            DialectSelection::Fixed(dialect) => dialect,
        }
    }

    /// Detect, parse and serialize a decoded payload.
    pub fn translate(&self, payload: &str) -> Result<Translated, DropReason> {
        let dialect = self.dialect_for(payload);
        debug!("Dialect: {} ({})", dialect, self.selection);

        let record = parser::parse(payload, dialect).inspect_err(|e| {
            debug!("Parse failed: {}", e);
        })?;

        if let Ok(json) = serde_json::to_string(&record) {
            debug!("Parsed contact: {}", json);
        }

        let xml = n1mm::serialize(&record, &self.profile)?;
        debug!("N1MM XML:\n{}", xml);

        Ok(Translated {
            dialect,
            record,
            xml,
        })
    }

    /// Run a raw datagram from `source` through the whole pipeline.
    pub fn process(&self, payload: &[u8], source: SocketAddr) -> Result<Translated, DropReason> {
        if !self.accepts(source) {
            return Err(DropReason::SourceRejected(source));
        }
        self.translate(&decode(payload))
    }
}

/// Decode a datagram as UTF-8, replacing invalid sequences.
///
/// Replacement characters count as noise for binary detection.
pub fn decode(payload: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(payload)
}
