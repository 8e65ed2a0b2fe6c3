//! Dialect parsers that turn a raw message into a [`ContactRecord`].
//!
//! Every parser is best-effort: the callsign is the only field whose absence
//! is an error, everything else is left unset or defaulted. Extraction is
//! scraping rather than full parsing (see [`crate::scan`]), so unknown tags,
//! extra JSON members and truncated payloads are tolerated.
//!
//! # Supported formats
//!
//! ```text
//! WSJT-X   <call:6>VK1ABC<band:3>20m<mode:3>FT8<rst_sent:3>-05<rst_rcvd:3>-12<eor>
//! VarAC    {"app":"VarAC","call":"W1ABC","freq":"14.105","mode":"VARA HF"}
//!          <CALL:5>W1ABC<MODE:7>VARA HF<QSO_DATE:8>20231012<TIME_ON:6>143000<EOR>
//!          QSO with VK2XYZ on 7.105 VARA
//! N1MM     <contactinfo timestamp="2023-10-12 14:30:00"><call>VK1DEF</call>...</contactinfo>
//! Generic  QSO with VK1ABC on 14.074 MHz FT8
//! ```

use chrono::{DateTime, FixedOffset};
use nom::{IResult, branch::alt, bytes::complete::tag};
use thiserror::Error;

use crate::adif::{AdifFields, has_end_of_record};
use crate::contact::{ContactRecord, Dialect};
use crate::detect::contains_binary;
use crate::scan::{self, adif_value};

/// Errors that can occur while parsing a message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("no callsign found in {dialect} message")]
    MissingCallsign { dialect: Dialect },

    #[error("{dialect} message contains binary data")]
    BinaryPayload { dialect: Dialect },

    #[error("wsjt-x message has no ADIF <call:> tag")]
    MissingAdifCall,
}

impl ParseError {
    /// The dialect the message was being parsed as.
    pub fn dialect(&self) -> Dialect {
        match self {
            ParseError::MissingCallsign { dialect } | ParseError::BinaryPayload { dialect } => {
                *dialect
            }
            ParseError::MissingAdifCall => Dialect::Wsjtx,
        }
    }
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Signal report used by VarAC JSON/text and N1MM when none is given.
pub const DEFAULT_REPORT: &str = "599";

/// Signal report used by VarAC ADIF exports when none is given.
pub const DEFAULT_ADIF_REPORT: &str = "+00";

/// Mode assumed for VarAC messages that do not name one.
pub const DEFAULT_VARAC_MODE: &str = "VARA";

/// Mode assumed by the generic parser when no keyword matches.
pub const DEFAULT_GENERIC_MODE: &str = "DATA";

/// Mode keywords recognized by the generic parser.
const GENERIC_MODES: &[&str] = &[
    "FT8", "FT4", "PSK31", "RTTY", "CW", "SSB", "LSB", "USB", "AM", "FM",
];

/// Parse a message as the given dialect.
///
/// On success the band is filled in from the frequency when the message did
/// not carry one.
///
/// # Example
///
/// ```
/// use udp_logger_relay::{contact::Dialect, parser::parse};
///
/// let record = parse(r#"{"call":"EA1ABC","freq":"7.105"}"#, Dialect::VarAc).unwrap();
/// assert_eq!(record.callsign, "EA1ABC");
/// assert_eq!(record.band.as_deref(), Some("40m"));
/// ```
pub fn parse(payload: &str, dialect: Dialect) -> ParseResult<ContactRecord> {
    let mut record = match dialect {
        Dialect::Wsjtx => parse_wsjtx(payload),
        Dialect::VarAc => parse_varac(payload),
        Dialect::N1mm => parse_n1mm(payload),
        // Detected separately but carry nothing a dedicated parser could use
        Dialect::Fldigi | Dialect::Js8Call | Dialect::Generic => parse_generic(payload, dialect),
    }?;
    record.derive_band();
    Ok(record)
}

/// Build a record around a callsign, failing if it is missing or blank.
fn require_callsign(callsign: Option<&str>, dialect: Dialect) -> ParseResult<ContactRecord> {
    match callsign.map(str::trim) {
        Some(call) if !call.is_empty() => Ok(ContactRecord::new(call)),
        _ => Err(ParseError::MissingCallsign { dialect }),
    }
}

fn owned(value: Option<&str>) -> Option<String> {
    value.map(str::to_string)
}

/// Parse a WSJT-X ADIF log upload.
///
/// WSJT-X also streams a binary telemetry protocol on the same port; those
/// datagrams are rejected before any field is looked at.
fn parse_wsjtx(payload: &str) -> ParseResult<ContactRecord> {
    if contains_binary(payload) {
        return Err(ParseError::BinaryPayload {
            dialect: Dialect::Wsjtx,
        });
    }
    if !payload.to_ascii_lowercase().contains("<call:") {
        return Err(ParseError::MissingAdifCall);
    }

    let field = |name, value: fn(&str) -> IResult<&str, &str>| {
        scan::adif_field(payload, name, value)
    };

    let mut record = require_callsign(field("call", adif_value::callsign), Dialect::Wsjtx)?;
    record.band = owned(field("band", adif_value::band));
    record.mode = owned(field("mode", adif_value::mode));
    record.rst_sent = owned(field("rst_sent", adif_value::report));
    record.rst_rcvd = owned(field("rst_rcvd", adif_value::report));
    record.frequency = owned(field("freq", scan::decimal));

    let date = field("qso_date", adif_value::date);
    let time = field("time_on", adif_value::time);
    if let Some(timestamp) = date.zip(time).and_then(|(d, t)| wsjtx_timestamp(d, t)) {
        record.timestamp = timestamp;
    }

    Ok(record)
}

/// `YYYYMMDD` plus `HHMM[SS]`, with the time right-padded to six digits.
fn wsjtx_timestamp(date: &str, time: &str) -> Option<DateTime<FixedOffset>> {
    let digits = format!("{}{:0<6}", date, time);
    scan::parse_compact_timestamp(&digits, "%Y%m%d%H%M%S")
}

/// Parse any of the three VarAC sub-formats.
fn parse_varac(payload: &str) -> ParseResult<ContactRecord> {
    let is_adif = payload.to_ascii_uppercase().contains("<CALL:") && has_end_of_record(payload);

    let mut record = if is_adif {
        parse_varac_adif(payload)?
    } else if payload.contains('{') && payload.contains('}') {
        parse_varac_json(payload)?
    } else {
        parse_varac_text(payload)?
    };

    let report = if is_adif {
        DEFAULT_ADIF_REPORT
    } else {
        DEFAULT_REPORT
    };
    record.default_reports(report);

    Ok(record)
}

/// VarAC's ADIF log export.
fn parse_varac_adif(payload: &str) -> ParseResult<ContactRecord> {
    let fields = AdifFields::parse(payload);

    let mut record = require_callsign(fields.non_empty("CALL"), Dialect::VarAc)?;
    record.callsign = record.callsign.to_ascii_uppercase();
    record.mode = Some(
        fields
            .non_empty("MODE")
            .or_else(|| fields.non_empty("SUBMODE"))
            .unwrap_or(DEFAULT_VARAC_MODE)
            .to_string(),
    );
    record.band = owned(fields.non_empty("BAND"));
    record.frequency = owned(fields.non_empty("FREQ"));
    record.rst_sent = owned(fields.non_empty("RST_SENT"));
    record.rst_rcvd = owned(fields.non_empty("RST_RCVD"));
    record.exchange = owned(fields.non_empty("COMMENT"));

    if let (Some(date), Some(time)) = (fields.non_empty("QSO_DATE"), fields.non_empty("TIME_ON")) {
        if let Some(timestamp) = varac_adif_timestamp(&format!("{}{}", date, time)) {
            record.timestamp = timestamp;
        }
    }

    Ok(record)
}

/// Concatenated `QSO_DATE` and `TIME_ON`, with or without seconds.
fn varac_adif_timestamp(digits: &str) -> Option<DateTime<FixedOffset>> {
    let with_seconds = || {
        digits
            .get(..14)
            .filter(|_| digits.len() >= 13)
            .and_then(|d| scan::parse_compact_timestamp(d, "%Y%m%d%H%M%S"))
    };
    let without_seconds = || {
        digits
            .get(..12)
            .filter(|_| digits.len() >= 11)
            .and_then(|d| scan::parse_compact_timestamp(d, "%Y%m%d%H%M"))
    };
    with_seconds().or_else(without_seconds)
}

/// VarAC's JSON broadcast. Members are scraped individually so partial or
/// malformed JSON still yields whatever fields are readable.
fn parse_varac_json(payload: &str) -> ParseResult<ContactRecord> {
    let mut record = require_callsign(scan::json_callsign(payload, "call"), Dialect::VarAc)?;

    record.frequency = owned(scan::json_number(
        payload,
        alt((tag("frequency"), tag("freq"))),
    ));
    record.mode = Some(
        scan::json_string(payload, tag("mode"))
            .unwrap_or(DEFAULT_VARAC_MODE)
            .to_string(),
    );
    record.band = owned(scan::json_string(payload, tag("band")));
    record.rst_sent = owned(scan::json_string(payload, tag("rst_sent")));
    record.rst_rcvd = owned(scan::json_string(
        payload,
        alt((tag("rst_received"), tag("rst_rcvd"))),
    ));

    if let Some(timestamp) =
        scan::json_string(payload, tag("timestamp")).and_then(scan::parse_timestamp)
    {
        record.timestamp = timestamp;
    }

    Ok(record)
}

/// Free-form VarAC status text such as `QSO with VK2XYZ on 7.105 VARA`.
fn parse_varac_text(payload: &str) -> ParseResult<ContactRecord> {
    let upper = payload.to_uppercase();
    let callsign = scan::phrase_callsign(payload)
        .map(str::to_uppercase)
        .or_else(|| scan::first_callsign(&upper).map(str::to_string));

    let mut record = require_callsign(callsign.as_deref(), Dialect::VarAc)?;

    record.frequency = owned(
        scan::prefixed_frequency(payload).or_else(|| scan::standalone_frequency(payload)),
    );

    let mode = if upper.contains("VARA HF") {
        "VARA HF"
    } else if upper.contains("VARA FM") {
        "VARA FM"
    } else {
        DEFAULT_VARAC_MODE
    };
    record.mode = Some(mode.to_string());

    Ok(record)
}

/// Parse an N1MM Logger Plus `contactinfo` broadcast.
fn parse_n1mm(payload: &str) -> ParseResult<ContactRecord> {
    let element = |name| scan::xml_element(payload, name);

    let mut record = require_callsign(element("call"), Dialect::N1mm)?;
    record.frequency = owned(element("rxfreq").or_else(|| element("txfreq")));
    record.mode = owned(element("mode"));
    record.band = owned(element("band"));
    record.rst_sent = owned(element("snt"));
    record.rst_rcvd = owned(element("rcv"));
    record.exchange = owned(element("exchange1").or_else(|| element("exchange")));

    if let Some(timestamp) =
        scan::xml_attribute(payload, "timestamp").and_then(scan::parse_timestamp)
    {
        record.timestamp = timestamp;
    }

    record.default_reports(DEFAULT_REPORT);
    Ok(record)
}

/// Last-resort heuristic extraction from free text.
fn parse_generic(payload: &str, dialect: Dialect) -> ParseResult<ContactRecord> {
    if contains_binary(payload) {
        return Err(ParseError::BinaryPayload { dialect });
    }

    let mut record = require_callsign(scan::first_callsign(payload), dialect)?;
    record.frequency = owned(scan::mhz_frequency(payload));
    record.band = scan::metre_band(payload).map(|digits| format!("{}m", digits));

    let upper = payload.to_uppercase();
    let mode = scan::words(&upper)
        .find(|w| GENERIC_MODES.contains(w))
        .unwrap_or(DEFAULT_GENERIC_MODE);
    record.mode = Some(mode.to_string());

    Ok(record)
}
