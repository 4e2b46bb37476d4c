// Desired-vs-observed diffing.
//
// Produces a minimal patch: only fields whose desired value actually
// differs from the observed value, with sized fields compared in raw
// bytes. An empty patch means Update is a true no-op.

use crate::error::CoreError;
use crate::schema::{FieldKind, FieldSpec, ResourceSchema};
use crate::units;
use crate::value::{AttributeBag, Value};

/// Compute the minimal patch taking `observed` to `desired`.
///
/// For each schema field: an Unknown desired value is skipped (no
/// caller intent, keep the remote value); equal values are skipped;
/// anything else lands in the patch, including explicit empty / zero /
/// false values. Sized fields are normalized to raw bytes on both
/// sides before comparison and the patch carries bytes.
pub fn diff(
    schema: &ResourceSchema,
    desired: &AttributeBag,
    observed: &AttributeBag,
) -> Result<AttributeBag, CoreError> {
    let mut patch = AttributeBag::new();

    for field in schema.fields {
        match field.kind {
            // Unit companions are presentation only.
            FieldKind::Unit => {}
            FieldKind::Size { unit_field } => {
                let desired_value = desired.get(field.name);
                if desired_value.is_unknown() {
                    continue;
                }
                let desired_bytes = desired_bytes(field, unit_field, desired, desired_value)?;
                let observed_bytes = observed.get(field.name).as_u64();
                if Some(desired_bytes) != observed_bytes {
                    patch.set(field.name, Value::present(desired_bytes));
                }
            }
            FieldKind::Attribute => {
                let desired_value = desired.get(field.name);
                if desired_value.is_unknown() {
                    continue;
                }
                if desired_value != observed.get(field.name) {
                    patch.set(field.name, desired_value.clone());
                }
            }
        }
    }

    Ok(patch)
}

/// Normalize a desired size to raw bytes using its unit companion.
///
/// The observed side always reports bytes, so comparing without this
/// normalization would flag every unit-scaled size as drifted.
fn desired_bytes(
    field: &FieldSpec,
    unit_field: &str,
    desired: &AttributeBag,
    desired_value: &Value,
) -> Result<u64, CoreError> {
    let size = desired_value
        .as_u64()
        .ok_or_else(|| CoreError::InvalidAttribute {
            field: field.name.to_owned(),
            reason: "size must be a non-negative integer".to_owned(),
        })?;

    let unit = match desired.get(unit_field) {
        Value::Present(v) => v
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| CoreError::InvalidAttribute {
                field: unit_field.to_owned(),
                reason: "unit must be a string".to_owned(),
            })?,
        // No unit expressed: the size is already raw bytes.
        _ => "bytes".to_owned(),
    };

    units::to_bytes(size, &unit).ok_or_else(|| CoreError::InvalidAttribute {
        field: unit_field.to_owned(),
        reason: format!(
            "invalid size unit {unit:?}, required one of: {}",
            units::valid_units()
        ),
    })
}

/// Overlay a patch onto an observed bag.
///
/// Satisfies `apply(observed, diff(desired, observed)) == desired`
/// restricted to fields where desired is not Unknown (sizes compare in
/// bytes).
pub fn apply(observed: &AttributeBag, patch: &AttributeBag) -> AttributeBag {
    let mut result = observed.clone();
    for (name, value) in patch.iter() {
        result.set(name, value.clone());
    }
    result
}
