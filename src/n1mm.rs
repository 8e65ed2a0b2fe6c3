//! N1MM Logger Plus `contactinfo` XML serializer.
//!
//! The output always carries the full N1MM field set in a fixed order, with
//! fields this relay has no data for written as empty elements:
//!
//! ```text
//! <contactinfo app="UDP-Logger-Relay" timestamp="2023-10-12 12:30:00">
//!   <contestname>GENERAL</contestname>
//!   <mycall>UDP-RELAY</mycall>
//!   <band>20m</band>
//!   ...
//!   <radionr>1</radionr>
//!   <roverlocation></roverlocation>
//!   <RadioUsed></RadioUsed>
//! </contactinfo>
//! ```

use std::fmt::{self, Write};

use thiserror::Error;

use crate::contact::{ContactRecord, StationProfile};

/// Value of the root `app` attribute.
pub const APP_NAME: &str = "UDP-Logger-Relay";

/// Radio number reported for every contact.
pub const RADIO_NUMBER: &str = "1";

/// Format of the root `timestamp` attribute.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Child elements of `contactinfo`, in output order.
pub const FIELDS: [&str; 32] = [
    "contestname",
    "mycall",
    "band",
    "rxfreq",
    "txfreq",
    "operator",
    "mode",
    "call",
    "countryprefix",
    "wpxprefix",
    "stationprefix",
    "continent",
    "snt",
    "rcv",
    "gridsquare",
    "exchange1",
    "section",
    "comment",
    "qth",
    "name",
    "power",
    "misctext",
    "zone",
    "prec",
    "ck",
    "ismult1",
    "ismult2",
    "ismult3",
    "points",
    "radionr",
    "roverlocation",
    "RadioUsed",
];

/// Errors that can occur while rendering a record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SerializeError {
    #[error("failed to format XML: {0}")]
    Format(#[from] fmt::Error),
}

/// Render `record` as N1MM XML on behalf of `profile`.
///
/// The timestamp is printed in whatever offset the record carries, so parsed
/// UTC times come out as UTC and the local "now" fallback as local time.
pub fn serialize(record: &ContactRecord, profile: &StationProfile) -> Result<String, SerializeError> {
    let frequency = text(&record.frequency);

    let values: [&str; 32] = [
        &profile.contest,
        &profile.station,
        text(&record.band),
        frequency,
        frequency,
        &profile.operator,
        text(&record.mode),
        &record.callsign,
        "",
        "",
        "",
        "",
        text(&record.rst_sent),
        text(&record.rst_rcvd),
        "",
        text(&record.exchange),
        "",
        "",
        "",
        "",
        "",
        "",
        "",
        "",
        "",
        "",
        "",
        "",
        "",
        RADIO_NUMBER,
        "",
        "",
    ];

    let timestamp = record.timestamp.format(TIMESTAMP_FORMAT).to_string();

    let mut output = String::with_capacity(1024);
    write!(output, "<contactinfo app=\"")?;
    escape_into(&mut output, APP_NAME);
    write!(output, "\" timestamp=\"")?;
    escape_into(&mut output, &timestamp);
    writeln!(output, "\">")?;

    for (field, value) in FIELDS.into_iter().zip(values) {
        write!(output, "  <{}>", field)?;
        escape_into(&mut output, value);
        writeln!(output, "</{}>", field)?;
    }

    write!(output, "</contactinfo>")?;
    Ok(output)
}

fn text(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("")
}

/// Whether XML 1.0 can carry `c` at all.
#[inline]
fn is_xml_char(c: char) -> bool {
    match c {
        '\t' | '\n' | '\r' => true,
        '\u{FFFE}' | '\u{FFFF}' => false,
        c => c >= ' ',
    }
}

/// Append `value` with the five XML special characters escaped.
///
/// Characters XML cannot carry become U+FFFD.
fn escape_into(output: &mut String, value: &str) {
    for c in value.chars() {
        match c {
            c if !is_xml_char(c) => output.push(char::REPLACEMENT_CHARACTER),
            '&' => output.push_str("&amp;"),
            '<' => output.push_str("&lt;"),
            '>' => output.push_str("&gt;"),
            '"' => output.push_str("&quot;"),
            '\'' => output.push_str("&apos;"),
            c => output.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contact::Dialect;
    use crate::parser::parse;
    use chrono::{FixedOffset, TimeZone};
    use proptest::prelude::*;

    fn sample_record() -> ContactRecord {
        let mut record = ContactRecord::new("VK1ABC");
        record.frequency = Some("14.074".to_string());
        record.band = Some("20m".to_string());
        record.mode = Some("FT8".to_string());
        record.rst_sent = Some("-05".to_string());
        record.rst_rcvd = Some("-12".to_string());
        record.timestamp = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2023, 10, 12, 12, 30, 0)
            .unwrap();
        record
    }

    #[test]
    fn test_serialize_full_record() {
        let xml = serialize(&sample_record(), &StationProfile::default()).unwrap();

        assert!(xml.starts_with(
            "<contactinfo app=\"UDP-Logger-Relay\" timestamp=\"2023-10-12 12:30:00\">\n"
        ));
        assert!(xml.ends_with("</contactinfo>"));
        assert!(xml.contains("  <contestname>GENERAL</contestname>\n"));
        assert!(xml.contains("  <mycall>UDP-RELAY</mycall>\n"));
        assert!(xml.contains("  <operator>OP</operator>\n"));
        assert!(xml.contains("  <band>20m</band>\n"));
        assert!(xml.contains("  <rxfreq>14.074</rxfreq>\n"));
        assert!(xml.contains("  <txfreq>14.074</txfreq>\n"));
        assert!(xml.contains("  <call>VK1ABC</call>\n"));
        assert!(xml.contains("  <mode>FT8</mode>\n"));
        assert!(xml.contains("  <snt>-05</snt>\n"));
        assert!(xml.contains("  <rcv>-12</rcv>\n"));
        assert!(xml.contains("  <radionr>1</radionr>\n"));
    }

    #[test]
    fn test_serialize_emits_every_field_in_order() {
        let record = ContactRecord::new("W1AW");
        let xml = serialize(&record, &StationProfile::default()).unwrap();

        let lines: Vec<&str> = xml.lines().collect();
        assert_eq!(lines.len(), FIELDS.len() + 2);
        for (line, field) in lines[1..=FIELDS.len()].iter().zip(FIELDS) {
            assert!(
                line.starts_with(&format!("  <{}>", field)),
                "expected <{}> but got {}",
                field,
                line
            );
        }
        assert!(xml.contains("  <band></band>\n"));
        assert!(xml.contains("  <exchange1></exchange1>\n"));
        assert!(xml.contains("  <RadioUsed></RadioUsed>\n"));
    }

    #[test]
    fn test_serialize_uses_station_profile() {
        let profile = StationProfile {
            station: "W1AW".to_string(),
            operator: "Hiram".to_string(),
            contest: "ARRL-DX".to_string(),
        };
        let xml = serialize(&sample_record(), &profile).unwrap();
        assert!(xml.contains("<mycall>W1AW</mycall>"));
        assert!(xml.contains("<operator>Hiram</operator>"));
        assert!(xml.contains("<contestname>ARRL-DX</contestname>"));
    }

    #[test]
    fn test_serialize_escapes_special_characters() {
        let mut record = sample_record();
        record.exchange = Some("5NN <MA> & \"QTH\" it's".to_string());
        let xml = serialize(&record, &StationProfile::default()).unwrap();
        assert!(xml.contains(
            "<exchange1>5NN &lt;MA&gt; &amp; &quot;QTH&quot; it&apos;s</exchange1>"
        ));
    }

    #[test]
    fn test_serialize_replaces_control_characters() {
        let mut record = sample_record();
        record.exchange = Some("bad\x01value".to_string());
        let xml = serialize(&record, &StationProfile::default()).unwrap();
        assert!(xml.contains("<exchange1>bad\u{FFFD}value</exchange1>"));
        assert!(xml.contains("<call>VK1ABC</call>"));

        let profile = StationProfile {
            operator: "OP\u{FFFF}".to_string(),
            ..StationProfile::default()
        };
        let xml = serialize(&sample_record(), &profile).unwrap();
        assert!(xml.contains("<operator>OP\u{FFFD}</operator>"));

        // Tab, LF and CR pass through
        let mut record = sample_record();
        record.exchange = Some("a\tb".to_string());
        let xml = serialize(&record, &StationProfile::default()).unwrap();
        assert!(xml.contains("<exchange1>a\tb</exchange1>"));
    }

    #[test]
    fn test_serialize_keeps_record_offset() {
        let mut record = sample_record();
        record.timestamp = FixedOffset::east_opt(10 * 3600)
            .unwrap()
            .with_ymd_and_hms(2023, 10, 12, 22, 30, 0)
            .unwrap();
        let xml = serialize(&record, &StationProfile::default()).unwrap();
        assert!(xml.contains("timestamp=\"2023-10-12 22:30:00\""));
    }

    #[test]
    fn test_n1mm_timestamp_survives_round_trip() {
        let message = r#"<contactinfo app="N1MM Logger Plus" timestamp="2025-11-19 01:36:37"><call>WB4WOJ</call><mode>CW</mode><band>14</band></contactinfo>"#;
        let record = parse(message, Dialect::N1mm).unwrap();
        let xml = serialize(&record, &StationProfile::default()).unwrap();

        assert!(xml.contains("timestamp=\"2025-11-19 01:36:37\""));
        assert!(xml.contains("<call>WB4WOJ</call>"));
        assert!(xml.contains("<band>14</band>"));
        assert!(xml.contains("<snt>599</snt>"));
    }

    proptest! {
        #[test]
        fn prop_call_and_mode_appear_verbatim(
            call in "[A-Z]{1,2}[0-9][A-Z]{1,3}",
            mode in "[A-Z0-9]{2,6}",
            band in "[0-9]{1,3}c?m",
        ) {
            let mut record = ContactRecord::new(call.clone());
            record.mode = Some(mode.clone());
            record.band = Some(band.clone());
            let xml = serialize(&record, &StationProfile::default()).unwrap();

            let call_tag = format!("<call>{}</call>", call);
            let mode_tag = format!("<mode>{}</mode>", mode);
            let band_tag = format!("<band>{}</band>", band);
            prop_assert!(xml.contains(&call_tag));
            prop_assert!(xml.contains(&mode_tag));
            prop_assert!(xml.contains(&band_tag));
        }
    }
}
