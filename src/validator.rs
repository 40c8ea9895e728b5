use std::collections::{HashMap, HashSet};

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// True when every value in the slice is distinct.
pub fn unique(values: &[String]) -> bool {
    let mut seen = HashSet::new();
    values.iter().all(|v| seen.insert(v.as_str()))
}

/// True when `value` appears in the allow-list.
pub fn permitted<T: PartialEq>(value: &T, list: &[T]) -> bool {
    list.contains(value)
}

/// Accumulates field-level validation failures. A pure accumulator: no
/// failure is ever an error in itself, callers inspect `valid()` once all
/// checks have run. Only the first message recorded for a field is kept.
#[derive(Debug, Default)]
pub struct Validator {
    errors: HashMap<String, String>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: &str, message: &str) {
        self.errors
            .entry(field.to_string())
            .or_insert_with(|| message.to_string());
    }

    pub fn check(&mut self, ok: bool, field: &str, message: &str) {
        if !ok {
            self.add_error(field, message);
        }
    }

    pub fn into_errors(self) -> HashMap<String, String> {
        self.errors
    }
}
