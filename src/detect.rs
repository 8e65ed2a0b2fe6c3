//! Source dialect detection.
//!
//! Detection is a fixed sequence of substring heuristics run against a
//! lower-cased copy of the message, first match wins. The structural markers
//! (N1MM XML, VarAC JSON/ADIF) are checked before the loose WSJT-X, Fldigi
//! and JS8Call substrings, otherwise a VarAC ADIF export carrying
//! `<mode:7>VARA HF` would be taken for a WSJT-X log upload.

use crate::adif::AdifFields;
use crate::contact::Dialect;
use crate::scan::has_adif_tag;

/// Share of non-printable characters above which a payload is treated as
/// binary protocol noise.
pub const BINARY_THRESHOLD: f64 = 0.10;

/// Characters that never appear in the text dialects.
///
/// Control characters other than tab, LF and CR, plus the replacement
/// character produced when decoding invalid UTF-8.
#[inline]
pub fn is_noise_char(c: char) -> bool {
    (c.is_control() && !matches!(c, '\t' | '\n' | '\r')) || c == char::REPLACEMENT_CHARACTER
}

/// Fraction of bytes in `payload` taken up by non-printable characters.
///
/// Measured in bytes so that multi-byte text does not inflate the ratio.
pub fn binary_fraction(payload: &str) -> f64 {
    if payload.is_empty() {
        return 0.0;
    }
    let noise: usize = payload
        .chars()
        .filter(|&c| is_noise_char(c))
        .map(char::len_utf8)
        .sum();
    noise as f64 / payload.len() as f64
}

/// Whether the payload is mostly binary (e.g. the WSJT-X telemetry protocol).
#[inline]
pub fn looks_binary(payload: &str) -> bool {
    binary_fraction(payload) > BINARY_THRESHOLD
}

/// Whether the payload contains any non-printable character at all.
#[inline]
pub fn contains_binary(payload: &str) -> bool {
    payload.chars().any(is_noise_char)
}

/// Classify a raw message into one of the supported dialects.
///
/// # Example
///
/// ```
/// use udp_logger_relay::{contact::Dialect, detect::detect};
///
/// assert_eq!(detect("<call:6>VK1ABC<mode:3>FT8<eor>"), Dialect::Wsjtx);
/// assert_eq!(detect(r#"{"call":"EA1ABC","freq":"7.105"}"#), Dialect::VarAc);
/// assert_eq!(detect("some random message"), Dialect::Generic);
/// ```
pub fn detect(payload: &str) -> Dialect {
    if looks_binary(payload) {
        return Dialect::Generic;
    }

    let lower = payload.to_lowercase();

    if is_n1mm(&lower) {
        Dialect::N1mm
    } else if is_varac(&lower) {
        Dialect::VarAc
    } else if is_wsjtx(&lower) {
        Dialect::Wsjtx
    } else if lower.contains("fldigi") {
        Dialect::Fldigi
    } else if lower.contains("js8call") || lower.contains("js8") {
        Dialect::Js8Call
    } else {
        Dialect::Generic
    }
}

fn is_n1mm(lower: &str) -> bool {
    lower.contains("<contactinfo")
        || lower.contains("<contestname>")
        || lower.contains("<mycall>")
        || lower.contains("n1mm")
}

fn is_varac(lower: &str) -> bool {
    if lower.contains("varac")
        || lower.contains("var-ac")
        || lower.contains("\"app\":\"varac\"")
        || lower.contains("<app>varac</app>")
    {
        return true;
    }

    if lower.contains("<mode:") || lower.contains("<submode:") {
        let fields = AdifFields::parse(lower);
        let is_vara = |name| fields.get(name).is_some_and(|v| v.contains("vara"));
        if is_vara("MODE") || is_vara("SUBMODE") {
            return true;
        }
    }

    lower.contains('{') && lower.contains("\"call\"") && lower.contains("\"freq")
}

fn is_wsjtx(lower: &str) -> bool {
    (lower.contains("<call:") && !lower.contains("vara"))
        || (lower.contains("wsjt-x") && has_adif_tag(lower))
}
