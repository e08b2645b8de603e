//! Form field validation shared by the RSVP, check-in and subscription flows.
//!
//! All functions are total: they either return the normalized value or a
//! [`ValidationError`] naming the offending field.

use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

pub const MAX_EMAIL_LENGTH: usize = 254;
pub const MAX_NAME_LENGTH: usize = 100;
/// 9999-12-31T23:59:59Z, event times past this are typos.
pub const MAX_TIMESTAMP: i64 = 253_402_300_799;

lazy_static! {
    static ref EMAIL_REGEX: Regex =
        Regex::new(r"^[^\s@]+@[^\s@.]+(\.[^\s@.]+)*\.[A-Za-z]{2,}$").unwrap();
    static ref ZIP_REGEX: Regex = Regex::new(r"^\d{5}(-\d{4})?$").unwrap();
    static ref SLUG_REGEX: Regex = Regex::new(r"^[a-z0-9]+(-[a-z0-9]+)*$").unwrap();
    static ref NON_ALPHANUMERIC_RUN: Regex = Regex::new(r"[^a-z0-9]+").unwrap();
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please enter a valid email address")]
    InvalidEmail,

    #[error("Please enter a valid 5-digit ZIP code")]
    InvalidZip,

    #[error("Please enter a valid 10-digit phone number")]
    InvalidPhone,

    #[error("{field} is required")]
    InvalidName { field: &'static str },

    #[error("{field} must be at most {max} characters")]
    TooLong { field: &'static str, max: usize },

    #[error("{field} is not a valid time")]
    InvalidTime { field: &'static str },

    #[error("The event cannot end before it starts")]
    EndsBeforeStart,
}

impl ValidationError {
    /// The form field the error refers to.
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::InvalidEmail => "email",
            ValidationError::InvalidZip => "zip",
            ValidationError::InvalidPhone => "phone",
            ValidationError::InvalidName { field } => field,
            ValidationError::TooLong { field, .. } => field,
            ValidationError::InvalidTime { field } => field,
            ValidationError::EndsBeforeStart => "ends_at",
        }
    }
}

pub fn validate_email(raw: &str) -> Result<String, ValidationError> {
    let email = raw.trim().to_lowercase();
    if email.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::TooLong {
            field: "email",
            max: MAX_EMAIL_LENGTH,
        });
    }
    if !EMAIL_REGEX.is_match(&email) {
        return Err(ValidationError::InvalidEmail);
    }
    Ok(email)
}

pub fn validate_zip(raw: &str) -> Result<String, ValidationError> {
    let zip = raw.trim();
    if ZIP_REGEX.is_match(zip) {
        Ok(zip.to_string())
    } else {
        Err(ValidationError::InvalidZip)
    }
}

/// Reduces a phone number to its canonical 10 digits, which is the key used
/// to resolve members. A leading US country code is dropped.
pub fn normalize_phone(raw: &str) -> Result<String, ValidationError> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    match digits.len() {
        10 => Ok(digits),
        11 if digits.starts_with('1') => Ok(digits[1..].to_string()),
        _ => Err(ValidationError::InvalidPhone),
    }
}

pub fn format_phone(canonical: &str) -> String {
    if canonical.len() == 10 && canonical.chars().all(|c| c.is_ascii_digit()) {
        format!(
            "({}) {}-{}",
            &canonical[0..3],
            &canonical[3..6],
            &canonical[6..10]
        )
    } else {
        canonical.to_string()
    }
}

pub fn validate_name(field: &'static str, raw: &str) -> Result<String, ValidationError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ValidationError::InvalidName { field });
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(ValidationError::TooLong {
            field,
            max: MAX_NAME_LENGTH,
        });
    }
    Ok(name.to_string())
}

/// Event times are unix seconds between the epoch and the end of year 9999.
pub fn validate_event_times(starts_at: i64, ends_at: Option<i64>) -> Result<(), ValidationError> {
    if !(0..=MAX_TIMESTAMP).contains(&starts_at) {
        return Err(ValidationError::InvalidTime { field: "starts_at" });
    }
    if let Some(ends_at) = ends_at {
        if !(0..=MAX_TIMESTAMP).contains(&ends_at) {
            return Err(ValidationError::InvalidTime { field: "ends_at" });
        }
        if ends_at < starts_at {
            return Err(ValidationError::EndsBeforeStart);
        }
    }
    Ok(())
}

/// Optional fields: blank input is treated as absent.
pub fn optional<F>(raw: Option<&str>, validate: F) -> Result<Option<String>, ValidationError>
where
    F: Fn(&str) -> Result<String, ValidationError>,
{
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => validate(value).map(Some),
    }
}

pub fn slugify(title: &str) -> String {
    let lowered = title.to_lowercase();
    let slug = NON_ALPHANUMERIC_RUN.replace_all(&lowered, "-");
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "event".to_string()
    } else {
        slug.to_string()
    }
}

/// Extracts an event slug from either a bare slug or an event page path such
/// as `/events/town-hall` or `/events/town-hall/rsvp`.
pub fn parse_event_slug(input: &str) -> Option<String> {
    let trimmed = input.trim().trim_matches('/');
    let candidate = match trimmed.strip_prefix("events/") {
        Some(rest) => rest.split('/').next().unwrap_or_default(),
        None if !trimmed.contains('/') => trimmed,
        None => return None,
    };
    if SLUG_REGEX.is_match(candidate) {
        Some(candidate.to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_and_normalizes_emails() {
        assert_eq!(
            validate_email("  Jane.Doe@Example.org ").unwrap(),
            "jane.doe@example.org"
        );
        assert!(validate_email("volunteer+rally@mail.co.uk").is_ok());
    }

    #[test]
    fn rejects_malformed_emails() {
        for bad in ["", "plainaddress", "@example.com", "jane@", "jane doe@x.com", "jane@x", "jane@@x.com"] {
            assert_eq!(validate_email(bad), Err(ValidationError::InvalidEmail), "{}", bad);
        }
        let long = format!("{}@example.com", "a".repeat(250));
        assert!(matches!(
            validate_email(&long),
            Err(ValidationError::TooLong { field: "email", .. })
        ));
    }

    #[test]
    fn validates_zip_codes() {
        assert_eq!(validate_zip("02139").unwrap(), "02139");
        assert_eq!(validate_zip(" 02139-4307 ").unwrap(), "02139-4307");
        for bad in ["", "2139", "021390", "02139-43", "abcde"] {
            assert_eq!(validate_zip(bad), Err(ValidationError::InvalidZip), "{}", bad);
        }
    }

    #[test]
    fn normalizes_phone_numbers() {
        assert_eq!(normalize_phone("(555) 123-4567").unwrap(), "5551234567");
        assert_eq!(normalize_phone("+1 555.123.4567").unwrap(), "5551234567");
        assert_eq!(normalize_phone("15551234567").unwrap(), "5551234567");
        for bad in ["", "555-1234", "25551234567", "555123456789"] {
            assert_eq!(normalize_phone(bad), Err(ValidationError::InvalidPhone), "{}", bad);
        }
    }

    #[test]
    fn validates_event_times() {
        assert!(validate_event_times(1_700_000_000, None).is_ok());
        assert!(validate_event_times(1_700_000_000, Some(1_700_000_000)).is_ok());
        assert_eq!(
            validate_event_times(i64::MAX, None),
            Err(ValidationError::InvalidTime { field: "starts_at" })
        );
        assert_eq!(
            validate_event_times(-1, None),
            Err(ValidationError::InvalidTime { field: "starts_at" })
        );
        assert_eq!(
            validate_event_times(1_700_000_000, Some(i64::MAX)),
            Err(ValidationError::InvalidTime { field: "ends_at" })
        );
        let err = validate_event_times(1_700_000_000, Some(1_699_999_999)).unwrap_err();
        assert_eq!(err, ValidationError::EndsBeforeStart);
        assert_eq!(err.field(), "ends_at");
    }

    #[test]
    fn formats_canonical_phone() {
        assert_eq!(format_phone("5551234567"), "(555) 123-4567");
        assert_eq!(format_phone("12345"), "12345");
    }

    #[test]
    fn validates_names() {
        assert_eq!(validate_name("first_name", "  Ada ").unwrap(), "Ada");
        assert_eq!(
            validate_name("first_name", "   "),
            Err(ValidationError::InvalidName { field: "first_name" })
        );
        let err = validate_name("last_name", &"x".repeat(101)).unwrap_err();
        assert_eq!(err.field(), "last_name");
    }

    #[test]
    fn optional_fields_skip_blank_values() {
        assert_eq!(optional(None, validate_zip).unwrap(), None);
        assert_eq!(optional(Some("  "), validate_zip).unwrap(), None);
        assert_eq!(
            optional(Some("02139"), validate_zip).unwrap(),
            Some("02139".to_string())
        );
        assert!(optional(Some("nope"), validate_zip).is_err());
    }

    #[test]
    fn slugifies_titles() {
        assert_eq!(slugify("Town Hall: Housing & Rent!"), "town-hall-housing-rent");
        assert_eq!(slugify("  --  "), "event");
        assert_eq!(slugify("Canvass 2026"), "canvass-2026");
    }

    #[test]
    fn parses_event_slugs() {
        assert_eq!(parse_event_slug("town-hall"), Some("town-hall".to_string()));
        assert_eq!(
            parse_event_slug("/events/town-hall/rsvp"),
            Some("town-hall".to_string())
        );
        assert_eq!(parse_event_slug("/events/town-hall/"), Some("town-hall".to_string()));
        assert_eq!(parse_event_slug("/about/us"), None);
        assert_eq!(parse_event_slug("Town Hall"), None);
        assert_eq!(parse_event_slug(""), None);
    }
}
