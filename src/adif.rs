//! Generic ADIF field extraction.
//!
//! ADIF records are a flat run of `<FIELD:length>value` tags, optionally
//! with a type indicator (`<QSO_DATE:8:D>`), terminated by `<EOR>`. The
//! declared length is authoritative: exactly that many characters are taken
//! as the value, so values may themselves contain `<`.

use std::collections::HashMap;

use nom::{IResult, Parser, bytes::complete::take};

use crate::scan::any_adif_tag;

/// Fields of one ADIF record, keyed by upper-case field name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdifFields {
    fields: HashMap<String, String>,
}

impl AdifFields {
    /// Extract every length-prefixed field from `input`.
    ///
    /// Tags without a length (`<EOR>`, `<EOH>`) and fields whose declared
    /// length runs past the end of the input are skipped. When a field
    /// appears more than once the first occurrence wins.
    pub fn parse(input: &str) -> Self {
        let mut fields = HashMap::new();
        let mut rest = input;

        while let Some(start) = rest.find('<') {
            rest = &rest[start..];
            match any_adif_tag(rest) {
                Ok((after_tag, (name, len))) => match field_value(after_tag, len) {
                    Ok((after_value, value)) => {
                        fields
                            .entry(name.to_ascii_uppercase())
                            .or_insert_with(|| value.to_string());
                        rest = after_value;
                    }
                    Err(_) => rest = after_tag,
                },
                Err(_) => rest = &rest[1..],
            }
        }

        Self { fields }
    }

    /// Get a field by name (case-insensitive).
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .get(&name.to_ascii_uppercase())
            .map(String::as_str)
    }

    /// Get a field, treating whitespace-only values as missing.
    pub fn non_empty(&self, name: &str) -> Option<&str> {
        self.get(name).map(str::trim).filter(|v| !v.is_empty())
    }

    /// Number of fields extracted.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether no fields were extracted.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Exactly `len` characters of field value.
fn field_value(input: &str, len: usize) -> IResult<&str, &str> {
    take(len).parse(input)
}

/// Whether the text carries an ADIF end-of-record marker.
pub fn has_end_of_record(input: &str) -> bool {
    input.to_ascii_uppercase().contains("<EOR>")
}
