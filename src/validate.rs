//! Field validators shared by the boarding wizard, the dashboards and the CLI.
//!
//! `validate_*` functions return `None` when the value is acceptable and a
//! user-facing message otherwise. `is_valid_*` functions are plain predicates.
use chrono::{Datelike, Local, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[^\s@]+@[^\s@]+\.([a-z]{2,})(\.[a-z]{2,})?$").expect("valid email regex")
});

static UK_POSTCODE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[A-Z]{1,2}[0-9][0-9A-Z]?\s?[0-9][A-Z]{2}$").expect("valid postcode regex")
});

static DOB_SEPARATOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[/\-.\s]+").expect("valid separator regex"));

static VAT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(GB[0-9]{9}|GBGD[0-9]{3}|GBHA[0-9]{3}|XI[0-9]{9}|[0-9]{9})$").expect("valid VAT regex")
});

static WEBSITE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(https?://)?([a-z0-9]([a-z0-9-]*[a-z0-9])?\.)+[a-z]{2,}(:[0-9]+)?(/\S*)?$")
        .expect("valid website regex")
});

static IBAN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z]{2}[0-9]{2}[A-Z0-9]{4,30}$").expect("valid IBAN regex"));

const MIN_BIRTH_YEAR: i32 = 1915;
const MIN_AGE_YEARS: f64 = 18.0;
const DAYS_PER_YEAR: f64 = 365.25;

/// `local@domain.tld` shape, optionally with a second-level suffix (`.co.uk`).
pub fn is_valid_email(value: &str) -> bool {
    EMAIL_RE.is_match(value.trim())
}

/// Standard UK postcode shapes (`SW1A 1AA`, `M1 1AA`, `B33 8TH`).
pub fn is_valid_uk_postcode(value: &str) -> bool {
    let collapsed = value.split_whitespace().collect::<Vec<_>>().join(" ");
    UK_POSTCODE_RE.is_match(&collapsed)
}

/// Legal names must be present and free of digits.
pub fn validate_legal_name(value: &str) -> Option<String> {
    let t = value.trim();
    if t.is_empty() {
        return Some("This field is required.".into());
    }
    if t.chars().any(|c| c.is_ascii_digit()) {
        return Some("Please enter a name without numbers.".into());
    }
    None
}

/// Telephone numbers: 10 to 15 digits once punctuation and spaces are dropped.
pub fn validate_phone_number(value: &str) -> Option<String> {
    let digits = value.chars().filter(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return Some("Please enter your telephone number.".into());
    }
    if digits < 10 {
        return Some("Enter at least 10 digits (e.g. 07943 490 548).".into());
    }
    if digits > 15 {
        return Some("Number is too long.".into());
    }
    None
}

/// Account passwords: at least 8 characters and confirmed.
pub fn validate_password(password: &str, confirm: &str) -> Option<String> {
    if password.is_empty() {
        return Some("Enter a password".into());
    }
    if password.chars().count() < 8 {
        return Some("Password must be at least 8 characters".into());
    }
    if password != confirm {
        return Some("Passwords do not match".into());
    }
    None
}

/// Six-digit email verification code; separators typed by the user are ignored.
pub fn validate_verification_code(value: &str) -> Result<String, String> {
    let digits: String = value.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() != 6 {
        return Err("Enter the 6-digit code from your email.".into());
    }
    Ok(digits)
}

/// Date of birth in `DD/MM/YYYY` order, checked against the local date.
pub fn validate_date_of_birth(value: &str) -> Option<String> {
    validate_date_of_birth_on(value, Local::now().date_naive())
}

/// Date of birth in `DD/MM/YYYY` order (`/`, `-`, `.` or space separated),
/// checked against `today`.
pub fn validate_date_of_birth_on(value: &str, today: NaiveDate) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Some("Please enter your date of birth.".into());
    }
    let parts: Vec<Option<i64>> = DOB_SEPARATOR_RE
        .split(trimmed)
        .map(parse_leading_int)
        .collect();
    if parts.len() != 3 || parts.iter().any(Option::is_none) {
        return Some("Enter a valid date in DD / MM / YYYY format.".into());
    }
    let (day, month, year) = match (parts[0], parts[1], parts[2]) {
        (Some(d), Some(m), Some(y)) => (d, m, y),
        _ => return Some("Enter a valid date in DD / MM / YYYY format.".into()),
    };
    if !(1..=31).contains(&day) {
        return Some("Day must be between 1 and 31.".into());
    }
    if !(1..=12).contains(&month) {
        return Some("Month must be between 1 and 12.".into());
    }
    if year < i64::from(MIN_BIRTH_YEAR) {
        return Some("Year must be 1915 or later.".into());
    }
    if year > i64::from(today.year()) {
        return Some("Date of birth cannot be in the future.".into());
    }
    let birth = match NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32) {
        Some(d) => d,
        None => return Some("Enter a valid date (e.g. 31 days only in some months).".into()),
    };
    let age_years = (today - birth).num_days() as f64 / DAYS_PER_YEAR;
    if age_years < MIN_AGE_YEARS {
        return Some("You must be at least 18 years old.".into());
    }
    None
}

/// Integer prefix of `s` after leading whitespace, with an optional sign.
/// Returns `None` when no digit follows.
fn parse_leading_int(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (negative, rest) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    let n: i64 = digits.parse().ok()?;
    Some(if negative { -n } else { n })
}

/// Optional UK/NI VAT registration number.
pub fn validate_vat_number(value: &str) -> Option<String> {
    let compact = normalize_vat(value);
    if compact.is_empty() {
        return None;
    }
    if VAT_RE.is_match(&compact) {
        None
    } else {
        Some("Enter a valid VAT number (e.g. GB123456789).".into())
    }
}

/// VAT number without whitespace, upper-cased.
pub fn normalize_vat(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_uppercase()
}

/// Optional comma-separated list of websites.
pub fn validate_website(value: &str) -> Option<String> {
    for entry in value.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        if !WEBSITE_RE.is_match(entry) {
            return Some(format!(
                "\"{}\" is not a valid website (e.g. example.com or https://example.com).",
                entry
            ));
        }
    }
    None
}

/// UK sort code: six digits, dashes and spaces allowed. No modulus check.
pub fn validate_sort_code(value: &str) -> Option<String> {
    let digits = strip_separators(value);
    if digits.is_empty() {
        return Some("Please enter your sort code.".into());
    }
    if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Some("Sort code must be 6 digits (e.g. 12-34-56).".into());
    }
    None
}

/// UK account number: eight digits. No modulus check.
pub fn validate_account_number(value: &str) -> Option<String> {
    let digits = strip_separators(value);
    if digits.is_empty() {
        return Some("Please enter your account number.".into());
    }
    if digits.len() != 8 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Some("Account number must be 8 digits.".into());
    }
    None
}

/// ISO 13616 IBAN shape after removing spaces and upper-casing.
pub fn validate_iban(value: &str) -> Option<String> {
    let iban = normalize_iban(value);
    if iban.is_empty() {
        return Some("Please enter your IBAN.".into());
    }
    if IBAN_RE.is_match(&iban) {
        None
    } else {
        Some("Enter a valid IBAN (e.g. GB82 WEST 1234 5698 7654 32).".into())
    }
}

/// IBAN without whitespace, upper-cased.
pub fn normalize_iban(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_uppercase()
}

fn strip_separators(value: &str) -> String {
    value
        .chars()
        .filter(|c| *c != '-' && !c.is_whitespace())
        .collect()
}
