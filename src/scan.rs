//! Pattern scanning helpers shared by the detector and the dialect parsers.
//!
//! Inbound messages are loosely structured text, so instead of parsing a
//! whole message with one grammar we run small `nom` parsers at successive
//! offsets and keep the first (leftmost) match. None of these helpers fail
//! hard: a missing field is simply `None`.

use chrono::{DateTime, FixedOffset, NaiveDateTime};
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, tag_no_case, take_while, take_while_m_n, take_while1},
    character::complete::{char, digit1, multispace0, multispace1, one_of, satisfy},
    combinator::{map_res, not, opt, recognize},
    sequence::{delimited, preceded, terminated},
};

/// Characters that count as part of a word for boundary checks (ASCII `\w`).
#[inline]
pub fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

#[inline]
fn is_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n' | '\x0c')
}

#[inline]
fn is_callsign_char(c: char) -> bool {
    c.is_ascii_uppercase() || c.is_ascii_digit() || c == '/'
}

/// Run `parser` at every character offset of `input` and return the output
/// of the first offset where it succeeds.
pub fn find_first<'a, O, P>(input: &'a str, mut parser: P) -> Option<O>
where
    P: Parser<&'a str, Output = O, Error = nom::error::Error<&'a str>>,
{
    input
        .char_indices()
        .find_map(|(i, _)| parser.parse(&input[i..]).ok().map(|(_, out)| out))
}

/// Like [`find_first`], but only tries offsets that start a word.
pub fn find_first_at_word_start<'a, O, P>(input: &'a str, mut parser: P) -> Option<O>
where
    P: Parser<&'a str, Output = O, Error = nom::error::Error<&'a str>>,
{
    let mut prev: Option<char> = None;
    for (i, c) in input.char_indices() {
        let at_boundary = prev.is_none_or(|p| !is_word_char(p));
        prev = Some(c);
        if at_boundary
            && is_word_char(c)
            && let Ok((_, out)) = parser.parse(&input[i..])
        {
            return Some(out);
        }
    }
    None
}

/// Succeeds without consuming input when the next character ends a word.
fn word_end(input: &str) -> IResult<&str, ()> {
    not(satisfy(is_word_char)).parse(input)
}

/// A decimal number such as `14`, `14.` or `14.074`.
pub fn decimal(input: &str) -> IResult<&str, &str> {
    recognize((digit1, opt((char('.'), opt(digit1))))).parse(input)
}

/// Iterate over maximal runs of word characters.
pub fn words(input: &str) -> impl Iterator<Item = &str> {
    input.split(|c: char| !is_word_char(c)).filter(|w| !w.is_empty())
}

/// Check whether a whole word has the shape of an amateur callsign.
///
/// The accepted shape is one to three letters or digits, a digit, up to three
/// more letters or digits, and a final letter: `K1A`, `VK1ABC`, `3DA0RU`.
/// Only upper-case letters are accepted.
pub fn is_callsign(word: &str) -> bool {
    let bytes = word.as_bytes();
    let len = bytes.len();
    if !(3..=8).contains(&len)
        || !bytes
            .iter()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
        || !bytes[len - 1].is_ascii_uppercase()
    {
        return false;
    }

    // The separating digit sits after a 1-3 character prefix and before a
    // suffix of at most three characters plus the final letter.
    let first = len.saturating_sub(5).max(1);
    let last = 3.min(len - 2);
    (first..=last).any(|i| bytes[i].is_ascii_digit())
}

/// The first callsign-shaped word in `input`.
pub fn first_callsign(input: &str) -> Option<&str> {
    words(input).find(|w| is_callsign(w))
}

/// A callsign introduced by `QSO with`, `QSO completed with` or `call:`.
///
/// The phrase match is case-insensitive, and so is the callsign itself.
pub fn phrase_callsign(input: &str) -> Option<&str> {
    let qso_with = recognize((
        tag_no_case("qso"),
        multispace1,
        alt((
            tag_no_case("with"),
            recognize((tag_no_case("completed"), multispace1, tag_no_case("with"))),
        )),
        multispace1,
    ));
    let call_prefix = recognize((
        tag_no_case("call"),
        take_while1(|c: char| c == ':' || is_space(c)),
    ));
    find_first(
        input,
        preceded(
            alt((qso_with, call_prefix)),
            take_while1(|c: char| c.is_ascii_alphanumeric() || c == '/'),
        ),
    )
}

/// A decimal immediately followed by `MHz`, e.g. `14.074 MHz`.
pub fn mhz_frequency(input: &str) -> Option<&str> {
    find_first(input, terminated(decimal, (multispace0, tag("MHz"))))
}

/// A band written as digits followed by `m`, e.g. `20m`. Returns the digits.
pub fn metre_band(input: &str) -> Option<&str> {
    find_first(input, terminated(digit1, (char('m'), word_end)))
}

/// A decimal introduced by `on `, `@ ` or `freq:`.
pub fn prefixed_frequency(input: &str) -> Option<&str> {
    let prefix = alt((
        recognize((tag("on"), multispace1)),
        recognize((char('@'), multispace1)),
        recognize((tag("freq"), take_while1(|c: char| c == ':' || is_space(c)))),
    ));
    find_first(input, preceded(prefix, decimal))
}

/// A standalone `D.DDD` or `DD.DDD` number, bounded by non-word characters.
pub fn standalone_frequency(input: &str) -> Option<&str> {
    let digit = |c: char| c.is_ascii_digit();
    find_first_at_word_start(
        input,
        terminated(
            recognize((
                take_while_m_n(1, 2, digit),
                char('.'),
                take_while_m_n(3, 3, digit),
            )),
            word_end,
        ),
    )
}

/// An ADIF tag header `<name:len>` for a specific field, returning `len`.
///
/// The field name is matched case-insensitively.
pub fn adif_tag<'a>(name: &'a str) -> impl Parser<&'a str, Output = usize, Error = nom::error::Error<&'a str>> {
    delimited(
        (char('<'), tag_no_case(name), char(':')),
        map_res(digit1, str::parse::<usize>),
        char('>'),
    )
}

/// Any ADIF tag header with a length, `<name:len>` or `<name:len:type>`.
pub fn any_adif_tag(input: &str) -> IResult<&str, (&str, usize)> {
    let (rest, (_, name, _, len, _, _)) = (
        char('<'),
        take_while1(|c: char| c != ':' && c != '<' && c != '>'),
        char(':'),
        map_res(digit1, str::parse::<usize>),
        opt((char(':'), take_while(|c: char| c != '>' && c != '<'))),
        char('>'),
    )
        .parse(input)?;
    Ok((rest, (name, len)))
}

/// Whether the text contains anything shaped like an ADIF tag header.
pub fn has_adif_tag(input: &str) -> bool {
    find_first(input, any_adif_tag).is_some()
}

/// ADIF value patterns used when scraping WSJT-X log uploads.
pub mod adif_value {
    use super::*;

    /// `[A-Z0-9/]+`
    pub fn callsign(input: &str) -> IResult<&str, &str> {
        take_while1(is_callsign_char).parse(input)
    }

    /// `20m`, `70cm`, `1.25m`
    pub fn band(input: &str) -> IResult<&str, &str> {
        recognize((
            digit1,
            opt((char('.'), digit1)),
            alt((tag("cm"), tag("mm"), tag("m"))),
        ))
        .parse(input)
    }

    /// A run of word characters, e.g. `FT8`.
    pub fn mode(input: &str) -> IResult<&str, &str> {
        take_while1(is_word_char).parse(input)
    }

    /// A signed report such as `-05` or `+12`.
    pub fn report(input: &str) -> IResult<&str, &str> {
        recognize((opt(one_of("+-")), digit1)).parse(input)
    }

    /// Exactly eight digits, `YYYYMMDD`.
    pub fn date(input: &str) -> IResult<&str, &str> {
        terminated(
            take_while_m_n(8, 8, |c: char| c.is_ascii_digit()),
            not(satisfy(|c: char| c.is_ascii_digit())),
        )
        .parse(input)
    }

    /// Four to six digits, `HHMM[SS]`.
    pub fn time(input: &str) -> IResult<&str, &str> {
        terminated(
            take_while_m_n(4, 6, |c: char| c.is_ascii_digit()),
            not(satisfy(|c: char| c.is_ascii_digit())),
        )
        .parse(input)
    }
}

/// The value following the first `<name:len>` tag that `value` accepts.
///
/// The declared length is ignored; the value pattern decides where the
/// value ends.
pub fn adif_field<'a, P>(input: &'a str, name: &'a str, value: P) -> Option<&'a str>
where
    P: Parser<&'a str, Output = &'a str, Error = nom::error::Error<&'a str>>,
{
    find_first(input, preceded(adif_tag(name), value))
}

/// Text content of the first `<name>text</name>` element, trimmed.
///
/// The content may not contain `<`, and whitespace-only content counts as
/// missing.
pub fn xml_element<'a>(input: &'a str, name: &str) -> Option<&'a str> {
    find_first(
        input,
        terminated(
            preceded((char('<'), tag(name), char('>')), take_while1(|c: char| c != '<')),
            (tag("</"), tag(name), char('>')),
        ),
    )
    .map(str::trim)
    .filter(|s| !s.is_empty())
}

/// Value of the first `name="value"` attribute.
pub fn xml_attribute<'a>(input: &'a str, name: &str) -> Option<&'a str> {
    find_first(
        input,
        delimited((tag(name), tag("=\"")), take_while1(|c: char| c != '"'), char('"')),
    )
}

/// The quoted key of a JSON member followed by its colon.
fn json_key<'a, K>(key: K) -> impl Parser<&'a str, Output = (), Error = nom::error::Error<&'a str>>
where
    K: Parser<&'a str, Output = &'a str, Error = nom::error::Error<&'a str>>,
{
    (char('"'), key, char('"'), multispace0, char(':'), multispace0).map(|_| ())
}

/// The string value of the first `"key": "value"` member whose key `key`
/// accepts. Values must be non-empty.
pub fn json_string<'a, K>(input: &'a str, key: K) -> Option<&'a str>
where
    K: Parser<&'a str, Output = &'a str, Error = nom::error::Error<&'a str>>,
{
    find_first(
        input,
        delimited(
            (json_key(key), char('"')),
            take_while1(|c: char| c != '"'),
            char('"'),
        ),
    )
}

/// Like [`json_string`], but the value must be a callsign (`[A-Z0-9/]+`).
pub fn json_callsign<'a>(input: &'a str, key: &'a str) -> Option<&'a str> {
    find_first(
        input,
        delimited(
            (json_key(tag(key)), char('"')),
            take_while1(is_callsign_char),
            char('"'),
        ),
    )
}

/// A numeric member, quoted or not, e.g. `"freq": "14.105"` or `"freq": 14.105`.
pub fn json_number<'a, K>(input: &'a str, key: K) -> Option<&'a str>
where
    K: Parser<&'a str, Output = &'a str, Error = nom::error::Error<&'a str>>,
{
    find_first(input, preceded((json_key(key), opt(char('"'))), decimal))
}

/// Parse `YYYY-MM-DD HH:MM:SS` or `YYYY-MM-DDTHH:MM:SSZ` as UTC.
pub fn parse_timestamp(text: &str) -> Option<DateTime<FixedOffset>> {
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%SZ"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .map(|naive| naive.and_utc().fixed_offset())
}

/// Parse concatenated ADIF date and time digits as UTC.
///
/// `format` is a chrono format such as `%Y%m%d%H%M%S`.
pub fn parse_compact_timestamp(digits: &str, format: &str) -> Option<DateTime<FixedOffset>> {
    NaiveDateTime::parse_from_str(digits, format)
        .ok()
        .map(|naive| naive.and_utc().fixed_offset())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_is_callsign() {
        assert!(is_callsign("VK1ABC"));
        assert!(is_callsign("W1AW"));
        assert!(is_callsign("K1A"));
        assert!(is_callsign("3DA0RU"));
        assert!(is_callsign("EA1ABC"));
        assert!(!is_callsign("QSO"));
        assert!(!is_callsign("FT8"));
        assert!(!is_callsign("vk1abc"));
        assert!(!is_callsign("14074"));
        assert!(!is_callsign("W1"));
        assert!(!is_callsign("ABCDEFGHI"));
        // Digit too far from the end
        assert!(!is_callsign("K1ABCDE"));
    }

    #[test]
    fn test_first_callsign_skips_non_calls() {
        assert_eq!(
            first_callsign("QSO with VK1ABC on 14.074 MHz FT8 mode"),
            Some("VK1ABC")
        );
        assert_eq!(first_callsign("nothing here"), None);
        // Must be a whole word
        assert_eq!(first_callsign("xVK1ABC_"), None);
    }

    #[test]
    fn test_phrase_callsign() {
        assert_eq!(phrase_callsign("QSO with VK2XYZ on 7.105 VARA"), Some("VK2XYZ"));
        assert_eq!(phrase_callsign("VarAC QSO completed with EA1ABC"), Some("EA1ABC"));
        assert_eq!(phrase_callsign("Call: w1abc"), Some("w1abc"));
        assert_eq!(phrase_callsign("nothing to see"), None);
    }

    #[test]
    fn test_frequency_patterns() {
        assert_eq!(mhz_frequency("on 14.074 MHz FT8"), Some("14.074"));
        assert_eq!(mhz_frequency("14.074MHz"), Some("14.074"));
        assert_eq!(mhz_frequency("14.074 mhz"), None);

        assert_eq!(prefixed_frequency("QSO with VK2XYZ on 7.105 VARA"), Some("7.105"));
        assert_eq!(prefixed_frequency("@ 14.105"), Some("14.105"));
        assert_eq!(prefixed_frequency("freq: 21.105"), Some("21.105"));
        assert_eq!(prefixed_frequency("no numbers"), None);

        assert_eq!(standalone_frequency("QSO 14.105 done"), Some("14.105"));
        assert_eq!(standalone_frequency("QSO 114.105 done"), None);
        assert_eq!(standalone_frequency("QSO 14.1055 done"), None);
    }

    #[test]
    fn test_decimal_at_end_of_input() {
        assert_eq!(decimal("14.105"), Ok(("", "14.105")));
        assert_eq!(decimal("14."), Ok(("", "14.")));
        assert_eq!(decimal("14"), Ok(("", "14")));
        assert_eq!(decimal("7.070 MHz"), Ok((" MHz", "7.070")));
        assert_eq!(prefixed_frequency("QSO with VK2XYZ on 14.105"), Some("14.105"));
    }

    #[test]
    fn test_metre_band() {
        assert_eq!(metre_band("worked on 20m today"), Some("20"));
        assert_eq!(metre_band("20min"), None);
        assert_eq!(metre_band("40m"), Some("40"));
    }

    #[test]
    fn test_adif_field_values() {
        let msg = "<call:6>VK1ABC<band:3>20m<mode:3>FT8<rst_sent:3>-05<eor>";
        assert_eq!(adif_field(msg, "call", adif_value::callsign), Some("VK1ABC"));
        assert_eq!(adif_field(msg, "band", adif_value::band), Some("20m"));
        assert_eq!(adif_field(msg, "mode", adif_value::mode), Some("FT8"));
        assert_eq!(adif_field(msg, "rst_sent", adif_value::report), Some("-05"));
        assert_eq!(adif_field(msg, "rst_rcvd", adif_value::report), None);

        // Tag names are case-insensitive
        assert_eq!(
            adif_field("<CALL:4>W1AW<EOR>", "call", adif_value::callsign),
            Some("W1AW")
        );
        assert_eq!(adif_field("<band:4>70cm", "band", adif_value::band), Some("70cm"));
    }

    #[test]
    fn test_adif_date_time_values() {
        assert_eq!(adif_value::date("20231012<").map(|r| r.1), Ok("20231012"));
        assert!(adif_value::date("2023101<").is_err());
        assert!(adif_value::date("202310120<").is_err());
        assert_eq!(adif_value::time("1230<").map(|r| r.1), Ok("1230"));
        assert_eq!(adif_value::time("123000").map(|r| r.1), Ok("123000"));
        assert!(adif_value::time("123").is_err());
    }

    #[test]
    fn test_has_adif_tag() {
        assert!(has_adif_tag("wsjt-x <call:6>VK1ABC"));
        assert!(has_adif_tag("<qso_date:8:d>20231012"));
        assert!(!has_adif_tag("wsjt-x heartbeat"));
        assert!(!has_adif_tag("<eor>"));
    }

    #[test]
    fn test_xml_scraping() {
        let xml = r#"<contactinfo app="N1MM" timestamp="2025-11-19 01:36:37"><mycall>W1AW</mycall><call> WB4WOJ </call><mode></mode></contactinfo>"#;
        assert_eq!(xml_element(xml, "call"), Some("WB4WOJ"));
        assert_eq!(xml_element(xml, "mycall"), Some("W1AW"));
        assert_eq!(xml_element(xml, "mode"), None);
        assert_eq!(xml_element(xml, "band"), None);
        assert_eq!(xml_attribute(xml, "timestamp"), Some("2025-11-19 01:36:37"));
        assert_eq!(xml_attribute(xml, "app"), Some("N1MM"));
    }

    #[test]
    fn test_json_scraping() {
        let json = r#"{"app":"VarAC", "call" : "W1ABC","frequency":14.105,"rst_rcvd":"579"}"#;
        assert_eq!(json_callsign(json, "call"), Some("W1ABC"));
        assert_eq!(
            json_number(json, alt((tag("frequency"), tag("freq")))),
            Some("14.105")
        );
        assert_eq!(json_string(json, tag("rst_rcvd")), Some("579"));
        assert_eq!(json_string(json, tag("mode")), None);
        // Lower-case callsigns are not callsigns
        assert_eq!(json_callsign(r#"{"call":"w1abc"}"#, "call"), None);
    }

    #[test]
    fn test_parse_timestamp() {
        let expected = Utc.with_ymd_and_hms(2025, 11, 19, 1, 36, 37).unwrap();
        assert_eq!(parse_timestamp("2025-11-19 01:36:37").unwrap(), expected);
        assert_eq!(parse_timestamp("2025-11-19T01:36:37Z").unwrap(), expected);
        assert!(parse_timestamp("19/11/2025").is_none());
        assert_eq!(
            parse_timestamp("2025-11-19 01:36:37").unwrap().offset().local_minus_utc(),
            0
        );
    }

    #[test]
    fn test_parse_compact_timestamp() {
        let ts = parse_compact_timestamp("20231012123000", "%Y%m%d%H%M%S").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2023, 10, 12, 12, 30, 0).unwrap());
        assert!(parse_compact_timestamp("20231312123000", "%Y%m%d%H%M%S").is_none());
    }
}
