// Static per-resource field tables.
//
// Each resource type declares its fields once, as data: capability
// thresholds, natural-key membership, and size/unit companion links all
// live here so that the diff engine, capability gate, and reconciler
// stay resource-agnostic. Adding a newly gated field touches only the
// table.

use shoal_api::ClusterVersion;

/// Minimum cluster version for a gated field.
///
/// Thresholds mirror how release gates are written against this API
/// family: "generation == 9 && major > 9" becomes `Capability { 9, 9 }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capability {
    pub min_generation: u32,
    /// The field is supported strictly above this major version.
    pub min_major_exclusive: u32,
}

impl Capability {
    pub const fn new(min_generation: u32, min_major_exclusive: u32) -> Self {
        Self {
            min_generation,
            min_major_exclusive,
        }
    }

    pub fn supported_by(&self, version: ClusterVersion) -> bool {
        version.at_least(self.min_generation, self.min_major_exclusive + 1)
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}+", self.min_generation, self.min_major_exclusive + 1)
    }
}

/// How a field participates in diffing and request bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Ordinary attribute, compared by structural equality.
    Attribute,
    /// Numeric size expressed in the unit named by the companion field.
    /// The remote side always reports raw bytes; comparison and request
    /// bodies normalize to bytes.
    Size { unit_field: &'static str },
    /// Unit companion of a size field. Client-side presentation only:
    /// never diffed, never sent.
    Unit,
}

/// One field in a resource schema.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    /// Field name; dots address nested response objects (`svm.name`).
    pub name: &'static str,
    pub kind: FieldKind,
    /// Minimum cluster version, if the field is gated.
    pub capability: Option<Capability>,
    /// Part of the resource's natural key.
    pub natural_key: bool,
}

impl FieldSpec {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Attribute,
            capability: None,
            natural_key: false,
        }
    }

    /// Gate this field at `generation` and strictly above `major`.
    pub const fn gated(mut self, min_generation: u32, min_major_exclusive: u32) -> Self {
        self.capability = Some(Capability::new(min_generation, min_major_exclusive));
        self
    }

    pub const fn size(mut self, unit_field: &'static str) -> Self {
        self.kind = FieldKind::Size { unit_field };
        self
    }

    pub const fn unit(mut self) -> Self {
        self.kind = FieldKind::Unit;
        self
    }

    pub const fn key(mut self) -> Self {
        self.natural_key = true;
        self
    }

    pub fn supported_by(&self, version: ClusterVersion) -> bool {
        self.capability.is_none_or(|c| c.supported_by(version))
    }
}

/// Static description of one resource type.
#[derive(Debug, Clone, Copy)]
pub struct ResourceSchema {
    /// Human name used in errors and logs (`storage volume`).
    pub resource_type: &'static str,
    /// REST collection path (`storage/volumes`).
    pub rest_path: &'static str,
    pub fields: &'static [FieldSpec],
}

impl ResourceSchema {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Natural-key fields, in schema order.
    pub fn natural_key_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|f| f.natural_key)
    }

    /// Import identifier arity: natural key components plus the
    /// connection profile name.
    pub fn import_arity(&self) -> usize {
        self.natural_key_fields().count() + 1
    }

    /// Component names for the import identifier, profile last.
    pub fn import_fields(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> =
            self.natural_key_fields().map(|f| f.name).collect();
        names.push("cx_profile_name");
        names
    }

    /// Fields to request on read, restricted to what the connected
    /// cluster supports. Unit companions are client-side only.
    pub fn read_fields(&self, version: ClusterVersion) -> Vec<&'static str> {
        self.fields
            .iter()
            .filter(|f| f.kind != FieldKind::Unit && f.supported_by(version))
            .map(|f| f.name)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIELDS: &[FieldSpec] = &[
        FieldSpec::new("name").key(),
        FieldSpec::new("svm.name").key(),
        FieldSpec::new("space.size").size("size_unit"),
        FieldSpec::new("size_unit").unit(),
        FieldSpec::new("analytics.state").gated(9, 10),
    ];

    const SCHEMA: ResourceSchema = ResourceSchema {
        resource_type: "storage volume",
        rest_path: "storage/volumes",
        fields: FIELDS,
    };

    fn version(generation: u32, major: u32) -> ClusterVersion {
        ClusterVersion {
            generation,
            major,
            minor: 0,
        }
    }

    #[test]
    fn import_arity_counts_keys_plus_profile() {
        assert_eq!(SCHEMA.import_arity(), 3);
        assert_eq!(
            SCHEMA.import_fields(),
            ["name", "svm.name", "cx_profile_name"]
        );
    }

    #[test]
    fn gate_is_exclusive_on_major() {
        let gate = Capability::new(9, 10);
        assert!(!gate.supported_by(version(9, 9)));
        assert!(!gate.supported_by(version(9, 10)));
        assert!(gate.supported_by(version(9, 11)));
        assert!(gate.supported_by(version(10, 0)));
    }

    #[test]
    fn read_fields_exclude_unsupported_and_units() {
        assert_eq!(
            SCHEMA.read_fields(version(9, 9)),
            ["name", "svm.name", "space.size"]
        );
        assert_eq!(
            SCHEMA.read_fields(version(9, 11)),
            ["name", "svm.name", "space.size", "analytics.state"]
        );
    }
}
