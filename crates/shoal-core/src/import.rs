// Composite identity codec for cross-session re-identification.
//
// An import identifier is a single comma-delimited string: the
// resource's natural key components in schema order, then the
// connection profile name. Arity is fixed per resource type.

use crate::error::CoreError;
use crate::schema::ResourceSchema;

const DELIMITER: &str = ",";

/// Decoded composite natural key, profile name last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeKey {
    components: Vec<String>,
}

impl CompositeKey {
    /// Encode components into a single import identifier.
    pub fn encode(components: &[&str]) -> String {
        components.join(DELIMITER)
    }

    /// Decode and validate an import identifier against a schema.
    ///
    /// Fails when the component count does not match the schema's
    /// arity or any component is empty; the error names the expected
    /// format (e.g. `name,svm.name,cx_profile_name`).
    pub fn decode(schema: &ResourceSchema, raw: &str) -> Result<Self, CoreError> {
        let components: Vec<String> = raw.split(DELIMITER).map(str::to_owned).collect();
        let expected = schema.import_fields();

        if components.len() != expected.len() || components.iter().any(String::is_empty) {
            return Err(CoreError::ImportFormat {
                expected: expected.join(DELIMITER),
                got: raw.to_owned(),
            });
        }

        Ok(Self { components })
    }

    /// Natural key components, in schema order (profile excluded).
    pub fn natural_key(&self) -> &[String] {
        &self.components[..self.components.len() - 1]
    }

    /// The connection profile name (always the last component).
    pub fn profile_name(&self) -> &str {
        self.components
            .last()
            .expect("decode guarantees at least one component")
    }

    pub fn components(&self) -> &[String] {
        &self.components
    }
}
