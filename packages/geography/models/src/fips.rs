//! State and county FIPS code utilities.
//!
//! Source tables key counties by 5-digit codes (2-digit state + 3-digit
//! county) while the entity registry and boundary files mix state
//! abbreviations and state FIPS codes. Everything is normalized to the
//! 2-digit state FIPS code before joining.

/// State FIPS code of the high-latitude region that gets its own
/// equal-area projection.
pub const ALASKA_FIPS: &str = "02";

/// State FIPS code of Connecticut, whose county identifiers changed
/// vintage (legacy counties to planning regions).
pub const CONNECTICUT_FIPS: &str = "09";

/// A US state (or DC) with its FIPS code, postal abbreviation, and name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct State {
    /// Two-digit FIPS code.
    pub fips: &'static str,
    /// Two-letter postal abbreviation.
    pub abbr: &'static str,
    /// Full name.
    pub name: &'static str,
}

const fn state(fips: &'static str, abbr: &'static str, name: &'static str) -> State {
    State { fips, abbr, name }
}

/// The 50 US states + DC, ordered by FIPS code.
pub const STATES: &[State] = &[
    state("01", "AL", "Alabama"),
    state("02", "AK", "Alaska"),
    state("04", "AZ", "Arizona"),
    state("05", "AR", "Arkansas"),
    state("06", "CA", "California"),
    state("08", "CO", "Colorado"),
    state("09", "CT", "Connecticut"),
    state("10", "DE", "Delaware"),
    state("11", "DC", "District of Columbia"),
    state("12", "FL", "Florida"),
    state("13", "GA", "Georgia"),
    state("15", "HI", "Hawaii"),
    state("16", "ID", "Idaho"),
    state("17", "IL", "Illinois"),
    state("18", "IN", "Indiana"),
    state("19", "IA", "Iowa"),
    state("20", "KS", "Kansas"),
    state("21", "KY", "Kentucky"),
    state("22", "LA", "Louisiana"),
    state("23", "ME", "Maine"),
    state("24", "MD", "Maryland"),
    state("25", "MA", "Massachusetts"),
    state("26", "MI", "Michigan"),
    state("27", "MN", "Minnesota"),
    state("28", "MS", "Mississippi"),
    state("29", "MO", "Missouri"),
    state("30", "MT", "Montana"),
    state("31", "NE", "Nebraska"),
    state("32", "NV", "Nevada"),
    state("33", "NH", "New Hampshire"),
    state("34", "NJ", "New Jersey"),
    state("35", "NM", "New Mexico"),
    state("36", "NY", "New York"),
    state("37", "NC", "North Carolina"),
    state("38", "ND", "North Dakota"),
    state("39", "OH", "Ohio"),
    state("40", "OK", "Oklahoma"),
    state("41", "OR", "Oregon"),
    state("42", "PA", "Pennsylvania"),
    state("44", "RI", "Rhode Island"),
    state("45", "SC", "South Carolina"),
    state("46", "SD", "South Dakota"),
    state("47", "TN", "Tennessee"),
    state("48", "TX", "Texas"),
    state("49", "UT", "Utah"),
    state("50", "VT", "Vermont"),
    state("51", "VA", "Virginia"),
    state("53", "WA", "Washington"),
    state("54", "WV", "West Virginia"),
    state("55", "WI", "Wisconsin"),
    state("56", "WY", "Wyoming"),
];

/// Looks up a state by its two-digit FIPS code.
#[must_use]
pub fn by_fips(fips: &str) -> Option<&'static State> {
    STATES.iter().find(|s| s.fips == fips)
}

/// Looks up a state by its postal abbreviation (case-insensitive).
#[must_use]
pub fn by_abbr(abbr: &str) -> Option<&'static State> {
    STATES.iter().find(|s| s.abbr.eq_ignore_ascii_case(abbr))
}

/// Normalizes a state reference (abbreviation, FIPS code, or a FIPS code
/// missing its leading zero) to the two-digit FIPS code.
#[must_use]
pub fn normalize_state(code: &str) -> Option<&'static str> {
    let code = code.trim();
    if code.is_empty() {
        return None;
    }
    if code.bytes().all(|b| b.is_ascii_digit()) {
        let padded = format!("{code:0>2}");
        return by_fips(&padded).map(|s| s.fips);
    }
    by_abbr(code).map(|s| s.fips)
}

/// Builds the 5-digit county code from its state and county parts,
/// zero-padding each (`"2"`, `"13"` -> `"02013"`).
///
/// Returns `None` if either part is empty, non-numeric, or too long.
#[must_use]
pub fn county_code(state_fips: &str, county_fips: &str) -> Option<String> {
    let state_fips = state_fips.trim();
    let county_fips = county_fips.trim();
    if !is_digits(state_fips, 2) || !is_digits(county_fips, 3) {
        return None;
    }
    Some(format!("{state_fips:0>2}{county_fips:0>3}"))
}

/// Normalizes a full county code, restoring a leading zero lost by
/// spreadsheet round-trips (`"4013"` -> `"04013"`). Accepts an
/// `NRI_ID`-style `C` prefix.
#[must_use]
pub fn normalize_county_code(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let raw = raw.strip_prefix('C').unwrap_or(raw);
    // "4013.0" from float-typed spreadsheet exports
    let raw = raw.strip_suffix(".0").unwrap_or(raw);
    if !is_digits(raw, 5) {
        return None;
    }
    Some(format!("{raw:0>5}"))
}

/// Returns the state FIPS prefix of a 5-digit county code.
#[must_use]
pub fn county_state(county_code: &str) -> Option<&str> {
    county_code.get(..2)
}

fn is_digits(s: &str, max_len: usize) -> bool {
    !s.is_empty() && s.len() <= max_len && s.bytes().all(|b| b.is_ascii_digit())
}
