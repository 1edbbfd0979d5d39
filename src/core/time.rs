//! Shared timestamp/event helpers.

use serde_json::{Map, Value as JsonValue};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use ulid::Ulid;

/// `date(1)`-style stamp used in history records, e.g. `Sun Oct 19 09:30:00 UTC 2026`.
pub fn now_history_stamp() -> String {
    history_stamp(OffsetDateTime::now_utc())
}

pub fn history_stamp(at: OffsetDateTime) -> String {
    let fmt = format_description!(
        "[weekday repr:short] [month repr:short] [day padding:space] [hour]:[minute]:[second] UTC [year]"
    );
    at.format(&fmt).unwrap_or_else(|_| rfc3339_stamp(at))
}

/// Log line prefix, e.g. `2026-10-19 09:30:00,123`.
pub fn now_log_stamp() -> String {
    log_stamp(OffsetDateTime::now_utc())
}

pub fn log_stamp(at: OffsetDateTime) -> String {
    let fmt = format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second],[subsecond digits:3]"
    );
    at.format(&fmt).unwrap_or_else(|_| rfc3339_stamp(at))
}

fn rfc3339_stamp(at: OffsetDateTime) -> String {
    at.format(&Rfc3339)
        .unwrap_or_else(|_| format!("{}Z", at.unix_timestamp()))
}

pub fn new_event_id() -> String {
    Ulid::new().to_string()
}

/// Object printed by the CLI in `--json` mode: `cmd`, `status`, an RFC 3339
/// `ts`, an `event_id`, then the fields of `extra` when it is an object.
pub fn cli_envelope(cmd: &str, status: &str, extra: JsonValue) -> JsonValue {
    let mut fields = Map::new();
    fields.insert("cmd".into(), cmd.into());
    fields.insert("status".into(), status.into());
    fields.insert("ts".into(), rfc3339_stamp(OffsetDateTime::now_utc()).into());
    fields.insert("event_id".into(), new_event_id().into());
    if let JsonValue::Object(extra) = extra {
        fields.extend(extra);
    }
    JsonValue::Object(fields)
}
