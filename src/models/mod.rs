//! # Data Models
//!
//! Payloads shared by the demo controllers.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::validation::{Validate, Violation, Violations, field_path, not_null, size};

/// Basic service information response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceInfo {
    /// The name of the service
    pub service: String,
    /// The version of the service
    pub version: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            service: "fault-normalizer".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Request body used by the validation demos
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct TestRequestBody {
    /// Must not be null
    pub value: Option<String>,
    /// Must not be null, 1 to 255 characters
    pub value2: Option<String>,
}

impl Validate for TestRequestBody {
    fn validate(&self, path: &str) -> Violations {
        let mut violations = Violations::new();
        let value_path = field_path(path, "value");
        let value2_path = field_path(path, "value2");

        violations
            .check(not_null(&value_path, &self.value))
            .check(not_null(&value2_path, &self.value2))
            .check(size(&value2_path, self.value2.as_deref(), 1, 255))
            .check(values_equal(path, self));

        violations
    }
}

/// Class-level constraint: both values must match
fn values_equal(path: &str, body: &TestRequestBody) -> Option<Violation> {
    (body.value != body.value2).then(|| Violation::new(path, "Values not equal"))
}
