use std::collections::HashMap;
use std::hash::Hash;

/// Accumulates named field errors from untrusted input. Checks never
/// short-circuit; the first failure recorded for a field wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Validator {
    errors: HashMap<String, String>,
}

impl Validator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True while no field has failed a check.
    #[must_use]
    pub fn valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: &str, message: &str) {
        self.errors
            .entry(field.to_owned())
            .or_insert_with(|| message.to_owned());
    }

    /// Records `message` under `field` when `ok` is false.
    pub fn check(&mut self, ok: bool, field: &str, message: &str) {
        if !ok {
            self.add_error(field, message);
        }
    }

    #[must_use]
    pub fn errors(&self) -> &HashMap<String, String> {
        &self.errors
    }

    #[must_use]
    pub fn into_errors(self) -> HashMap<String, String> {
        self.errors
    }
}

/// True when every value in the slice is distinct.
#[must_use]
pub fn unique<T: Eq + Hash>(values: &[T]) -> bool {
    let distinct: std::collections::HashSet<&T> = values.iter().collect();
    distinct.len() == values.len()
}

/// True when `value` appears in the allow-list.
#[must_use]
pub fn permitted<T: PartialEq + ?Sized>(value: &T, allowed: &[&T]) -> bool {
    allowed.iter().any(|entry| *entry == value)
}

/// Structural email check: one `@`, non-empty local part, dotted domain,
/// no whitespace. Deliverability is the mail system's problem.
#[must_use]
pub fn matches_email(value: &str) -> bool {
    if value.len() > 254 || value.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return false;
    }
    domain.split('.').count() >= 2 && domain.split('.').all(|label| !label.is_empty())
}
