//! Translation of API choice labels to the destination's single-letter codes,
//! and URN parsing.

use temba_migrate_core::{SourceRecord, ValidationError};

/// Label → code table for one choice field.
pub(crate) type Choices = &'static [(&'static str, &'static str)];

pub(crate) const FIELD_VALUE_TYPES: Choices = &[
    ("text", "T"),
    ("number", "N"),
    ("numeric", "N"),
    ("datetime", "D"),
    ("state", "S"),
    ("district", "I"),
    ("ward", "W"),
];

pub(crate) const GROUP_STATUSES: Choices =
    &[("initializing", "I"), ("evaluating", "V"), ("ready", "R")];

pub(crate) const CONTACT_STATUSES: Choices =
    &[("active", "A"), ("blocked", "B"), ("stopped", "S"), ("archived", "V")];

pub(crate) const ARCHIVE_PERIODS: Choices = &[("daily", "D"), ("monthly", "M")];

pub(crate) const FLOW_TYPES: Choices =
    &[("message", "M"), ("voice", "V"), ("survey", "S"), ("background", "B")];

pub(crate) const CAMPAIGN_UNITS: Choices =
    &[("minutes", "M"), ("hours", "H"), ("days", "D"), ("weeks", "W")];

pub(crate) const FLOW_START_STATUSES: Choices = &[
    ("pending", "P"),
    ("queued", "Q"),
    ("starting", "S"),
    ("started", "S"),
    ("complete", "C"),
    ("completed", "C"),
    ("failed", "F"),
    ("interrupted", "I"),
];

/// Organization roles; the codes pick the destination's role table.
pub(crate) const USER_ROLES: Choices = &[
    ("administrator", "A"),
    ("editor", "E"),
    ("viewer", "V"),
    ("agent", "T"),
    ("surveyor", "S"),
];

pub(crate) const RUN_EXIT_TYPES: Choices =
    &[("completed", "C"), ("interrupted", "I"), ("expired", "E"), ("failed", "F")];

/// Shared by messages and broadcasts.
pub(crate) const MSG_STATUSES: Choices = &[
    ("initializing", "I"),
    ("pending", "P"),
    ("queued", "Q"),
    ("wired", "W"),
    ("sent", "S"),
    ("delivered", "D"),
    ("read", "R"),
    ("handled", "H"),
    ("errored", "E"),
    ("failed", "F"),
    ("completed", "C"),
];

pub(crate) const MSG_DIRECTIONS: Choices = &[("in", "I"), ("out", "O")];

pub(crate) const MSG_TYPES: Choices = &[
    ("text", "T"),
    ("optin", "O"),
    ("voice", "V"),
    ("inbox", "I"),
    ("flow", "F"),
    ("ivr", "V"),
];

pub(crate) const MSG_VISIBILITIES: Choices =
    &[("visible", "V"), ("archived", "A"), ("deleted", "D")];

pub(crate) const DATE_STYLES: Choices =
    &[("day_first", "D"), ("month_first", "M"), ("year_first", "Y")];

/// Look up the code for `label` in `choices`. Unknown labels invalidate the record.
pub(crate) fn code(
    record: &SourceRecord,
    field: &str,
    choices: Choices,
    label: &str,
) -> Result<String, ValidationError> {
    choices
        .iter()
        .find(|(l, _)| l.eq_ignore_ascii_case(label))
        .map(|(_, c)| (*c).to_owned())
        .ok_or_else(|| record.invalid(format!("unknown {field} `{label}`")))
}

/// A URN split into its parts. `identity` is `scheme:path`, the value the
/// destination keys URNs on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ParsedUrn {
    pub scheme: String,
    pub path: String,
    pub display: Option<String>,
    pub identity: String,
}

/// Parse `scheme:path[?query][#display]`.
pub(crate) fn parse_urn(urn: &str) -> Option<ParsedUrn> {
    let (scheme, rest) = urn.trim().split_once(':')?;
    let (rest, display) = match rest.split_once('#') {
        Some((rest, display)) => (rest, Some(display.to_owned()).filter(|d| !d.is_empty())),
        None => (rest, None),
    };
    let path = rest.split_once('?').map_or(rest, |(path, _)| path);
    if scheme.is_empty() || path.is_empty() {
        return None;
    }
    let scheme = scheme.to_ascii_lowercase();
    Some(ParsedUrn {
        identity: format!("{scheme}:{path}"),
        scheme,
        path: path.to_owned(),
        display,
    })
}
