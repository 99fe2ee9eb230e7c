//! Field validation for request payloads.
//!
//! Checks accumulate into a [`Validator`]; `finish()` turns any failures into
//! a single [`DomainError::Validation`].

use std::str::FromStr;

use super::errors::{DomainError, FieldError};
use crate::utils::time;

#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<FieldError>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&mut self, field: &str, message: impl Into<String>) {
        self.errors.push(FieldError::new(field, message));
    }

    /// Trimmed, non-empty, length-bounded text. Returns the trimmed value.
    pub fn required_text(
        &mut self,
        field: &str,
        value: Option<&str>,
        min: usize,
        max: usize,
        missing: &str,
        bad_length: &str,
    ) -> Option<String> {
        let trimmed = value.map(str::trim).unwrap_or_default();
        if trimmed.is_empty() {
            self.fail(field, missing);
            return None;
        }
        let len = trimmed.chars().count();
        if len < min || len > max {
            self.fail(field, bad_length);
            return None;
        }
        Some(trimmed.to_string())
    }

    /// Optional text with an upper bound. Blank values collapse to `None`.
    pub fn optional_text(
        &mut self,
        field: &str,
        value: Option<&str>,
        max: usize,
        too_long: &str,
    ) -> Option<String> {
        let trimmed = value.map(str::trim).filter(|v| !v.is_empty())?;
        if trimmed.chars().count() > max {
            self.fail(field, too_long);
            return None;
        }
        Some(trimmed.to_string())
    }

    /// Optional identifier: must not be blank when present.
    pub fn optional_id(&mut self, field: &str, value: Option<&str>, label: &str) -> Option<String> {
        let value = value?;
        let trimmed = value.trim();
        if trimmed.is_empty() {
            self.fail(field, format!("{} cannot be empty if provided.", label));
            return None;
        }
        Some(trimmed.to_string())
    }

    /// Optional enum value parsed with its `FromStr` impl.
    pub fn optional_enum<T>(&mut self, field: &str, value: Option<&str>) -> Option<T>
    where
        T: FromStr<Err = String>,
    {
        let value = value?;
        match value.trim().parse::<T>() {
            Ok(v) => Some(v),
            Err(msg) => {
                self.fail(field, msg);
                None
            }
        }
    }

    /// Optional ISO 8601 date, normalised to the stored representation.
    pub fn optional_date(&mut self, field: &str, value: Option<&str>) -> Option<String> {
        let value = value.map(str::trim).filter(|v| !v.is_empty())?;
        match time::normalize(value) {
            Some(v) => Some(v),
            None => {
                self.fail(field, "Invalid due date format. Must be ISO8601.");
                None
            }
        }
    }

    pub fn finish(self) -> Result<(), DomainError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(DomainError::Validation(self.errors))
        }
    }
}
