//! # Constraint Validation
//!
//! Minimal constraint checks that collect [`Violation`]s in evaluation order.
//! A violation path names the invoked operation, then the parameter and
//! optionally the field (`doSomething.requestBody.value`).

use std::fmt;

use crate::error::{Fault, ValidationOrigin};

/// A single failed constraint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub path: String,
    pub message: String,
}

impl Violation {
    pub fn new<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Violations collected for one validated invocation, in evaluation order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Violations(Vec<Violation>);

impl Violations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of a single constraint check
    pub fn check(&mut self, outcome: Option<Violation>) -> &mut Self {
        if let Some(violation) = outcome {
            self.0.push(violation);
        }
        self
    }

    pub fn extend(&mut self, other: Violations) -> &mut Self {
        self.0.extend(other.0);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Violation> {
        self.0.iter()
    }

    /// `Ok` when nothing was violated, otherwise a validation fault raised at `origin`
    pub fn into_result(self, origin: ValidationOrigin) -> Result<(), Fault> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(Fault::Validation {
                origin,
                violations: self,
            })
        }
    }
}

impl From<Vec<Violation>> for Violations {
    fn from(violations: Vec<Violation>) -> Self {
        Self(violations)
    }
}

impl fmt::Display for Violations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, violation) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", violation)?;
        }
        Ok(())
    }
}

/// Types that can check their own constraints.
///
/// `path` is the prefix for every violation path, usually `<operation>.<parameter>`.
pub trait Validate {
    fn validate(&self, path: &str) -> Violations;
}

/// Join a parent path and a field name
pub fn field_path(parent: &str, field: &str) -> String {
    format!("{}.{}", parent, field)
}

pub fn not_null<T>(path: &str, value: &Option<T>) -> Option<Violation> {
    value
        .is_none()
        .then(|| Violation::new(path, "must not be null"))
}

/// Length check in characters; an absent value is left to [`not_null`]
pub fn size(path: &str, value: Option<&str>, min: usize, max: usize) -> Option<Violation> {
    let length = value?.chars().count();
    (length < min || length > max)
        .then(|| Violation::new(path, format!("size must be between {} and {}", min, max)))
}

pub fn min(path: &str, value: i64, min: i64) -> Option<Violation> {
    (value < min).then(|| {
        Violation::new(path, format!("must be greater than or equal to {}", min))
    })
}
