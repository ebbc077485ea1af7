//! QR payload text format.
//!
//! ```text
//! CHARLA <talk>
//! Fecha: <date>
//! Rut: <nationalId>
//! Email: <email>
//! ```

use serde::{Deserialize, Serialize};

const TALK_PREFIX: &str = "CHARLA ";
const DATE_PREFIX: &str = "Fecha: ";
const NATIONAL_ID_PREFIX: &str = "Rut: ";
const EMAIL_PREFIX: &str = "Email: ";

/// Fields decoded from an attendee QR code. All four are non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendancePayload {
    pub talk: String,
    pub date: String,
    pub national_id: String,
    pub email: String,
}

/// Parses the four-line payload. Returns `None` rather than a partial record.
///
/// Trailing blank lines are tolerated; any other extra line is not.
pub fn decode(raw: &str) -> Option<AttendancePayload> {
    let mut lines = raw.lines();

    let talk = field(lines.next()?, TALK_PREFIX)?;
    let date = field(lines.next()?, DATE_PREFIX)?;
    let national_id = field(lines.next()?, NATIONAL_ID_PREFIX)?;
    let email = field(lines.next()?, EMAIL_PREFIX)?;

    if lines.any(|rest| !rest.trim().is_empty()) {
        return None;
    }

    Some(AttendancePayload {
        talk,
        date,
        national_id,
        email,
    })
}

/// Renders a payload in the wire format `decode` accepts.
pub fn encode(payload: &AttendancePayload) -> String {
    format!(
        "{TALK_PREFIX}{}\n{DATE_PREFIX}{}\n{NATIONAL_ID_PREFIX}{}\n{EMAIL_PREFIX}{}",
        payload.talk, payload.date, payload.national_id, payload.email
    )
}

fn field(line: &str, prefix: &str) -> Option<String> {
    let value = line.strip_prefix(prefix)?.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "CHARLA Intro to Rust\nFecha: 2025-03-01\nRut: 12345678-9\nEmail: a@b.com";

    #[test]
    fn decodes_the_documented_example() {
        let payload = decode(SAMPLE).unwrap();
        assert_eq!(payload.talk, "Intro to Rust");
        assert_eq!(payload.date, "2025-03-01");
        assert_eq!(payload.national_id, "12345678-9");
        assert_eq!(payload.email, "a@b.com");
    }

    #[test]
    fn encode_then_decode_returns_the_fields() {
        let original = AttendancePayload {
            talk: "Ownership & Borrowing".into(),
            date: "1 de marzo, 18:00".into(),
            national_id: "9.876.543-K".into(),
            email: "ana@example.cl".into(),
        };
        assert_eq!(decode(&encode(&original)), Some(original));
    }

    #[test]
    fn values_are_trimmed() {
        let raw = "CHARLA   Async Rust  \r\nFecha:  2025-03-01 \r\nRut: 1-9\r\nEmail: x@y.z  ";
        let payload = decode(raw).unwrap();
        assert_eq!(payload.talk, "Async Rust");
        assert_eq!(payload.date, "2025-03-01");
        assert_eq!(payload.email, "x@y.z");
    }

    #[test]
    fn fewer_than_four_lines_fails() {
        assert_eq!(decode("CHARLA a\nFecha: b\nRut: c"), None);
        assert_eq!(decode(""), None);
    }

    #[test]
    fn empty_field_fails() {
        assert_eq!(decode("CHARLA a\nFecha:    \nRut: c\nEmail: d"), None);
    }

    #[test]
    fn wrong_or_missing_prefix_fails() {
        assert_eq!(decode("TALK a\nFecha: b\nRut: c\nEmail: d"), None);
        assert_eq!(decode("CHARLA a\nFecha: b\nEmail: d\nRut: c"), None);
        assert_eq!(decode("CHARLAa\nFecha: b\nRut: c\nEmail: d"), None);
    }

    #[test]
    fn trailing_blank_lines_are_tolerated_but_extra_content_is_not() {
        assert!(decode(&format!("{SAMPLE}\n\n")).is_some());
        assert_eq!(decode(&format!("{SAMPLE}\nExtra: yes")), None);
    }
}
