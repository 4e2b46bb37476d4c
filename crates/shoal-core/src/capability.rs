// Version gating of optional fields.
//
// Reading: a gated field below threshold stays Unknown in the observed
// bag — never Null — so it can neither appear in a patch nor produce a
// spurious "removed" diff. Writing: a desired value for an unsupported
// field is a hard error; silently dropping caller intent is the one
// thing this layer must never do.

use serde_json::{Map, Value as Json};
use shoal_api::ClusterVersion;

use crate::error::CoreError;
use crate::schema::{FieldKind, ResourceSchema};
use crate::units;
use crate::value::{AttributeBag, Value};

/// Build the observed bag from a raw response record.
///
/// Gated fields the cluster does not support are left Unknown. For
/// supported fields, a missing response value reads as explicitly
/// absent (Null).
pub fn observe(schema: &ResourceSchema, version: ClusterVersion, record: &Map<String, Json>) -> AttributeBag {
    let mut bag = AttributeBag::new();

    for field in schema.fields {
        if field.kind == FieldKind::Unit {
            continue;
        }
        if !field.supported_by(version) {
            continue; // stays Unknown
        }
        match lookup_path(record, field.name) {
            Some(Json::Null) | None => bag.set(field.name, Value::Null),
            Some(value) => bag.set(field.name, Value::Present(value.clone())),
        };
    }

    bag
}

/// Reject desired values for fields the connected cluster does not support.
pub fn check_desired(
    schema: &ResourceSchema,
    version: ClusterVersion,
    desired: &AttributeBag,
) -> Result<(), CoreError> {
    for field in schema.fields {
        if desired.get(field.name).is_unknown() {
            continue;
        }
        if let Some(capability) = field.capability {
            if !capability.supported_by(version) {
                return Err(CoreError::Capability {
                    field: field.name,
                    required: capability.to_string(),
                    actual: version.to_string(),
                });
            }
        }
    }
    Ok(())
}

/// Build a request body from a bag, gate-checked and normalized.
///
/// Dotted field names become nested objects (`svm.name` →
/// `{"svm": {"name": ...}}`); sized fields are sent in raw bytes; unit
/// companions are never sent.
pub fn request_body(
    schema: &ResourceSchema,
    version: ClusterVersion,
    bag: &AttributeBag,
) -> Result<Json, CoreError> {
    check_desired(schema, version, bag)?;

    let mut body = Map::new();
    for field in schema.fields {
        let value = bag.get(field.name);
        if value.is_unknown() {
            continue;
        }
        match field.kind {
            FieldKind::Unit => {}
            FieldKind::Size { unit_field } => {
                let size = value.as_u64().ok_or_else(|| CoreError::InvalidAttribute {
                    field: field.name.to_owned(),
                    reason: "size must be a non-negative integer".to_owned(),
                })?;
                let unit = bag.get(unit_field).as_str().unwrap_or("bytes").to_owned();
                let bytes =
                    units::to_bytes(size, &unit).ok_or_else(|| CoreError::InvalidAttribute {
                        field: unit_field.to_owned(),
                        reason: format!(
                            "invalid size unit {unit:?}, required one of: {}",
                            units::valid_units()
                        ),
                    })?;
                insert_path(&mut body, field.name, Json::from(bytes))?;
            }
            FieldKind::Attribute => {
                if let Some(json) = value.to_body_json() {
                    insert_path(&mut body, field.name, json)?;
                }
            }
        }
    }

    Ok(Json::Object(body))
}

/// Resolve a dotted path against a nested response object.
fn lookup_path<'a>(record: &'a Map<String, Json>, path: &str) -> Option<&'a Json> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = record.get(first)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Insert a value at a dotted path, creating intermediate objects.
///
/// Fails when an intermediate segment already holds a scalar, which
/// happens only with a field table declaring both `a` and `a.b`.
fn insert_path(body: &mut Map<String, Json>, path: &str, value: Json) -> Result<(), CoreError> {
    let mut segments: Vec<&str> = path.split('.').collect();
    let leaf = segments.pop().unwrap_or(path);

    let mut current = body;
    for segment in segments {
        current = current
            .entry(segment.to_owned())
            .or_insert_with(|| Json::Object(Map::new()))
            .as_object_mut()
            .ok_or_else(|| CoreError::InvalidAttribute {
                field: path.to_owned(),
                reason: format!("'{segment}' already carries a non-object value"),
            })?;
    }
    current.insert(leaf.to_owned(), value);
    Ok(())
}
