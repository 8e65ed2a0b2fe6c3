//! Frequency to amateur band mapping.

/// Label returned for frequencies outside every known band.
pub const UNKNOWN_BAND: &str = "UNK";

/// Band edges in MHz, inclusive on both ends.
const BANDS: &[(f64, f64, &str)] = &[
    (1.8, 2.0, "160m"),
    (3.5, 4.0, "80m"),
    (7.0, 7.3, "40m"),
    (14.0, 14.35, "20m"),
    (21.0, 21.45, "15m"),
    (28.0, 29.7, "10m"),
    (50.0, 54.0, "6m"),
    (144.0, 148.0, "2m"),
    (420.0, 450.0, "70cm"),
];

/// Returns the amateur band label for a frequency in MHz.
///
/// Frequencies that fall outside every band (including NaN) map to
/// [`UNKNOWN_BAND`] rather than an error.
pub fn frequency_to_band(freq_mhz: f64) -> &'static str {
    BANDS
        .iter()
        .find(|(low, high, _)| (*low..=*high).contains(&freq_mhz))
        .map(|(_, _, band)| *band)
        .unwrap_or(UNKNOWN_BAND)
}

/// Parses a decimal MHz string and maps it to a band.
///
/// Returns `None` when the text is not a number at all.
pub fn band_for_frequency_str(freq_mhz: &str) -> Option<&'static str> {
    freq_mhz
        .trim()
        .parse::<f64>()
        .ok()
        .map(frequency_to_band)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_band_centres() {
        let cases = [
            (1.85, "160m"),
            (3.7, "80m"),
            (7.1, "40m"),
            (14.2, "20m"),
            (21.2, "15m"),
            (28.5, "10m"),
            (52.0, "6m"),
            (146.0, "2m"),
            (435.0, "70cm"),
        ];

        for (freq, band) in cases {
            assert_eq!(frequency_to_band(freq), band, "frequency {}", freq);
        }
    }

    #[test]
    fn test_band_edges_inclusive() {
        assert_eq!(frequency_to_band(7.0), "40m");
        assert_eq!(frequency_to_band(7.3), "40m");
        assert_eq!(frequency_to_band(14.35), "20m");
        assert_eq!(frequency_to_band(6.999), UNKNOWN_BAND);
        assert_eq!(frequency_to_band(7.301), UNKNOWN_BAND);
    }

    #[test]
    fn test_unknown_frequencies() {
        assert_eq!(frequency_to_band(999.0), UNKNOWN_BAND);
        assert_eq!(frequency_to_band(0.0), UNKNOWN_BAND);
        assert_eq!(frequency_to_band(-14.074), UNKNOWN_BAND);
        assert_eq!(frequency_to_band(f64::NAN), UNKNOWN_BAND);
        // Hz instead of MHz does not land in a band
        assert_eq!(frequency_to_band(14_074_000.0), UNKNOWN_BAND);
    }

    #[test]
    fn test_band_for_frequency_str() {
        assert_eq!(band_for_frequency_str("7.105"), Some("40m"));
        assert_eq!(band_for_frequency_str(" 14.074 "), Some("20m"));
        assert_eq!(band_for_frequency_str("1402500"), Some(UNKNOWN_BAND));
        assert_eq!(band_for_frequency_str("abc"), None);
        assert_eq!(band_for_frequency_str(""), None);
    }

    proptest! {
        #[test]
        fn prop_in_range_frequencies_map_to_their_band(idx in 0usize..9, t in 0.0f64..=1.0) {
            let (low, high, band) = BANDS[idx];
            let freq = (low + (high - low) * t).clamp(low, high);
            prop_assert_eq!(frequency_to_band(freq), band);
        }

        #[test]
        fn prop_every_frequency_has_a_label(freq in proptest::num::f64::ANY) {
            let band = frequency_to_band(freq);
            let known = BANDS.iter().any(|(_, _, b)| *b == band);
            prop_assert!(known || band == UNKNOWN_BAND);
        }

        #[test]
        fn prop_out_of_range_frequencies_are_unknown(freq in 0.0f64..1000.0) {
            let inside = BANDS.iter().any(|(low, high, _)| freq >= *low && freq <= *high);
            prop_assume!(!inside);
            prop_assert_eq!(frequency_to_band(freq), UNKNOWN_BAND);
        }
    }
}
