//! Field-level validation errors returned to API clients.

use std::{collections::BTreeMap, fmt::Display};

use rust_decimal::Decimal;
use serde::Serialize;

use crate::{
    Error,
    money::{MAX_AMOUNT, MONEY_SCALE},
};

/// A map from request field names to a message describing why the field is invalid.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<&'static str, String>);

impl FieldErrors {
    /// Create an empty set of field errors.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an [Error::Validation] for a single invalid field.
    pub fn single(field: &'static str, message: impl Into<String>) -> Error {
        let mut errors = Self::new();
        errors.add(field, message);
        Error::Validation(errors)
    }

    /// Record that `field` is invalid. Only the first message for a field is kept.
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_insert_with(|| message.into());
    }

    /// The message recorded for `field`, if any.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    /// Whether no field errors have been recorded.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `Ok(())` if no errors were recorded, otherwise [Error::Validation].
    pub fn into_result(self) -> Result<(), Error> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(self))
        }
    }

    /// Record an error if `value` is empty or only whitespace.
    pub(crate) fn require_text(&mut self, field: &'static str, value: &str) {
        if value.trim().is_empty() {
            self.add(field, format!("The {field} field is required."));
        }
    }

    /// Record an error if `value` is longer than `max` characters.
    pub(crate) fn max_length(&mut self, field: &'static str, value: &str, max: usize) {
        if value.chars().count() > max {
            self.add(
                field,
                format!("The {field} field must not be greater than {max} characters."),
            );
        }
    }

    /// Record an error if `value` is less than `min`.
    pub(crate) fn min_amount(&mut self, field: &'static str, value: Decimal, min: Decimal) {
        if value < min {
            self.add(field, format!("The {field} field must be at least {min}."));
        }
    }

    /// Record an error if `value` is not an amount of money between `min` and [MAX_AMOUNT]
    /// with at most two decimal places.
    pub(crate) fn money_amount(&mut self, field: &'static str, value: Decimal, min: Decimal) {
        self.min_amount(field, value, min);
        if value.abs() > MAX_AMOUNT {
            self.add(
                field,
                format!("The {field} field must not be greater than {MAX_AMOUNT}."),
            );
        }
        if value.normalize().scale() > MONEY_SCALE {
            self.add(
                field,
                format!("The {field} field must have at most {MONEY_SCALE} decimal places."),
            );
        }
    }
}

impl Display for FieldErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let messages: Vec<String> = self
            .0
            .iter()
            .map(|(field, message)| format!("{field}: {message}"))
            .collect();

        write!(f, "{}", messages.join("; "))
    }
}
