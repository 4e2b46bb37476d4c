// Power-of-two size units.
//
// The cluster reports sizes in raw bytes; desired state may express
// them in any unit. Everything normalizes to bytes before comparison.

/// Supported units and their byte multipliers (powers of two).
pub const POW2_BYTE_MAP: &[(&str, u64)] = &[
    ("bytes", 1),
    ("b", 1),
    ("kb", 1 << 10),
    ("mb", 1 << 20),
    ("gb", 1 << 30),
    ("tb", 1 << 40),
    ("pb", 1 << 50),
    ("eb", 1 << 60),
];

/// Byte multiplier for a unit name, if the unit is valid.
pub fn unit_to_bytes(unit: &str) -> Option<u64> {
    POW2_BYTE_MAP
        .iter()
        .find(|(name, _)| *name == unit)
        .map(|(_, factor)| *factor)
}

/// Comma-separated list of valid unit names, for error messages.
pub fn valid_units() -> String {
    let names: Vec<&str> = POW2_BYTE_MAP.iter().map(|(name, _)| *name).collect();
    names.join(", ")
}

/// Scale a sized value to raw bytes. `None` for an invalid unit or
/// a product that overflows.
pub fn to_bytes(size: u64, unit: &str) -> Option<u64> {
    unit_to_bytes(unit).and_then(|factor| size.checked_mul(factor))
}

/// Render raw bytes in the largest unit that divides them exactly.
pub fn byte_format(bytes: u64) -> (u64, &'static str) {
    // Walk from largest to smallest; skip the "b" alias so exact byte
    // counts render as "bytes".
    for (name, factor) in POW2_BYTE_MAP.iter().rev() {
        if *name == "b" {
            continue;
        }
        if *factor <= bytes && bytes % factor == 0 {
            return (bytes / factor, name);
        }
    }
    (bytes, "bytes")
}
