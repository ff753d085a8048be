//! Format rules for applicant input.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::error::ValidationError;

/// Cities an applicant can pick during the identity survey.
pub const CITIES: [&str; 10] = [
    "Москва",
    "Санкт-Петербург",
    "Новосибирск",
    "Екатеринбург",
    "Казань",
    "Нижний Новгород",
    "Челябинск",
    "Омск",
    "Самара",
    "Ростов-на-Дону",
];

static NAME_PART: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[А-ЯЁ][а-яё]+$").expect("valid name regex"));

static BIRTH_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{2}\.\d{2}\.\d{4}$").expect("valid date regex"));

/// Surname, given name and patronymic, each capitalised Cyrillic.
/// Returns the name joined with single spaces.
pub fn validate_full_name(input: &str) -> Result<String, ValidationError> {
    let parts: Vec<&str> = input.split_whitespace().collect();
    if parts.len() != 3 || !parts.iter().all(|p| NAME_PART.is_match(p)) {
        return Err(ValidationError::FullName);
    }
    Ok(parts.join(" "))
}

/// Exact match against [`CITIES`].
pub fn validate_city(input: &str) -> Result<&'static str, ValidationError> {
    let input = input.trim();
    CITIES
        .iter()
        .copied()
        .find(|c| *c == input)
        .ok_or_else(|| ValidationError::UnknownCity(input.to_string()))
}

/// `DD.MM.YYYY`, which must also be a real calendar date.
pub fn parse_birth_date(input: &str) -> Result<NaiveDate, ValidationError> {
    let input = input.trim();
    if !BIRTH_DATE.is_match(input) {
        return Err(ValidationError::BirthDate);
    }
    NaiveDate::parse_from_str(input, "%d.%m.%Y").map_err(|_| ValidationError::BirthDate)
}

/// Interview answers are free text but must say something.
pub fn validate_answer(input: &str) -> Result<String, ValidationError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ValidationError::EmptyAnswer);
    }
    Ok(input.to_string())
}
