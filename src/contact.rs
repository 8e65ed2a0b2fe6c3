//! Data structures representing a logged contact.
//!
//! Every inbound datagram that parses successfully becomes a [`ContactRecord`],
//! regardless of which application sent it. The record only lives long enough
//! to be rendered as N1MM XML and sent on.

use chrono::{DateTime, FixedOffset, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::band::band_for_frequency_str;

/// The source application dialect of an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dialect {
    /// WSJT-X ADIF log upload
    #[serde(rename = "wsjt-x")]
    Wsjtx,
    /// Fldigi
    #[serde(rename = "fldigi")]
    Fldigi,
    /// JS8Call
    #[serde(rename = "js8call")]
    Js8Call,
    /// VarAC (JSON, ADIF or plain text)
    #[serde(rename = "varac")]
    VarAc,
    /// N1MM Logger Plus contactinfo XML
    #[serde(rename = "n1mm")]
    N1mm,
    /// Anything else, parsed heuristically
    #[serde(rename = "general")]
    Generic,
}

impl Dialect {
    /// All dialects, in detection priority order.
    pub const ALL: [Dialect; 6] = [
        Dialect::N1mm,
        Dialect::VarAc,
        Dialect::Wsjtx,
        Dialect::Fldigi,
        Dialect::Js8Call,
        Dialect::Generic,
    ];

    /// Canonical lower-case name, as used in configuration files.
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::Wsjtx => "wsjt-x",
            Dialect::Fldigi => "fldigi",
            Dialect::Js8Call => "js8call",
            Dialect::VarAc => "varac",
            Dialect::N1mm => "n1mm",
            Dialect::Generic => "general",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a dialect name is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown source type '{0}' (expected auto, wsjt-x, fldigi, js8call, varac, n1mm or general)")]
pub struct UnknownDialect(pub String);

impl FromStr for Dialect {
    type Err = UnknownDialect;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wsjt-x" | "wsjtx" => Ok(Dialect::Wsjtx),
            "fldigi" => Ok(Dialect::Fldigi),
            "js8call" | "js8" => Ok(Dialect::Js8Call),
            "varac" | "var-ac" => Ok(Dialect::VarAc),
            "n1mm" => Ok(Dialect::N1mm),
            "general" | "generic" => Ok(Dialect::Generic),
            _ => Err(UnknownDialect(s.to_string())),
        }
    }
}

/// How the pipeline picks a dialect for each message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialectSelection {
    /// Run the detector on every message.
    Auto,
    /// Treat every message as the given dialect.
    Fixed(Dialect),
}

impl DialectSelection {
    /// Resolve the configured `auto_detect` flag and `source_type` string.
    ///
    /// An explicit dialect name always wins. `"auto"` detects per message
    /// unless detection is switched off, in which case everything is parsed
    /// as [`Dialect::Generic`].
    pub fn from_config(auto_detect: bool, source_type: &str) -> Result<Self, UnknownDialect> {
        if source_type.trim().eq_ignore_ascii_case("auto") {
            return Ok(if auto_detect {
                DialectSelection::Auto
            } else {
                DialectSelection::Fixed(Dialect::Generic)
            });
        }
        source_type.parse().map(DialectSelection::Fixed)
    }
}

impl fmt::Display for DialectSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DialectSelection::Auto => write!(f, "auto"),
            DialectSelection::Fixed(dialect) => write!(f, "{}", dialect),
        }
    }
}

/// The sending station's identity, attached to every outbound record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StationProfile {
    /// Station callsign (`<mycall>`).
    pub station: String,

    /// Operator callsign or name (`<operator>`).
    pub operator: String,

    /// Contest identifier (`<contestname>`).
    pub contest: String,
}

impl Default for StationProfile {
    fn default() -> Self {
        Self {
            station: "UDP-RELAY".to_string(),
            operator: "OP".to_string(),
            contest: "GENERAL".to_string(),
        }
    }
}

/// A normalized contact extracted from any supported dialect.
///
/// # Example
///
/// The WSJT-X ADIF upload
/// ```text
/// <call:6>VK1ABC<band:3>20m<mode:3>FT8<rst_sent:3>-05<rst_rcvd:3>-12<eor>
/// ```
///
/// becomes a record with:
/// - `callsign`: "VK1ABC"
/// - `band`: Some("20m")
/// - `mode`: Some("FT8")
/// - `rst_sent`: Some("-05")
/// - `rst_rcvd`: Some("-12")
/// - `timestamp`: the local time the message was parsed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContactRecord {
    /// The contacted station. Never empty on a successfully parsed record.
    pub callsign: String,

    /// Frequency in MHz, as decimal text.
    pub frequency: Option<String>,

    /// Operating mode.
    pub mode: Option<String>,

    /// Band label, such as "20m" or "UNK".
    pub band: Option<String>,

    /// Signal report sent.
    pub rst_sent: Option<String>,

    /// Signal report received.
    pub rst_rcvd: Option<String>,

    /// When the contact happened. Parsed times are UTC; the fallback is
    /// the local time of parsing.
    pub timestamp: DateTime<FixedOffset>,

    /// Free-text contest exchange.
    pub exchange: Option<String>,
}

impl ContactRecord {
    /// Create a record for `callsign` with every optional field unset and a
    /// timestamp of now.
    pub fn new(callsign: impl Into<String>) -> Self {
        Self {
            callsign: callsign.into(),
            frequency: None,
            mode: None,
            band: None,
            rst_sent: None,
            rst_rcvd: None,
            timestamp: local_now(),
            exchange: None,
        }
    }

    /// Fill in the band from the frequency when it was not supplied.
    ///
    /// Frequencies that are not numbers leave the band unset.
    pub fn derive_band(&mut self) {
        if self.band.is_some() {
            return;
        }
        if let Some(band) = self.frequency.as_deref().and_then(band_for_frequency_str) {
            self.band = Some(band.to_string());
        }
    }

    /// Default both signal reports to `report` where they are unset.
    pub fn default_reports(&mut self, report: &str) {
        self.rst_sent.get_or_insert_with(|| report.to_string());
        self.rst_rcvd.get_or_insert_with(|| report.to_string());
    }
}

impl fmt::Display for ContactRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} on {} {} ({} MHz) at {}",
            self.callsign,
            self.band.as_deref().unwrap_or("?"),
            self.mode.as_deref().unwrap_or("?"),
            self.frequency.as_deref().unwrap_or("?"),
            self.timestamp.format("%Y-%m-%d %H:%M:%S")
        )
    }
}

/// The current local time with its UTC offset attached.
pub fn local_now() -> DateTime<FixedOffset> {
    Local::now().fixed_offset()
}
