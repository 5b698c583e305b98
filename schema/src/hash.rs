//! Deterministic layout hashing.

use blake3::Hasher;

use crate::{ObjectSchema, Permissions, ReadPermission, ValueKind, WritePermission};

/// Computes a deterministic hash of an object layout.
///
/// Names are excluded: two peers agree on the wire as long as ids, kinds and
/// permissions match in declaration order.
#[must_use]
pub fn schema_hash(schema: &ObjectSchema) -> u64 {
    let mut hasher = Hasher::new();
    write_len(&mut hasher, schema.components.len());

    for component in &schema.components {
        write_u16(&mut hasher, component.id.get());
        write_len(&mut hasher, component.variables.len());

        for variable in &component.variables {
            write_u16(&mut hasher, variable.id.get());
            write_kind(&mut hasher, &variable.kind);
            write_permissions(&mut hasher, variable.permissions);
        }
    }

    let hash = hasher.finalize();
    let mut head = [0u8; 8];
    head.copy_from_slice(&hash.as_bytes()[..8]);
    u64::from_le_bytes(head)
}

fn write_kind(hasher: &mut Hasher, kind: &ValueKind) {
    match kind {
        ValueKind::Bool => write_u8(hasher, 0),
        ValueKind::UInt { bits } => {
            write_u8(hasher, 1);
            write_u8(hasher, *bits);
        }
        ValueKind::SInt { bits } => {
            write_u8(hasher, 2);
            write_u8(hasher, *bits);
        }
        ValueKind::Float { bits } => {
            write_u8(hasher, 3);
            write_u8(hasher, *bits);
        }
        ValueKind::Enum { bits } => {
            write_u8(hasher, 4);
            write_u8(hasher, *bits);
        }
        ValueKind::FixedString { capacity } => {
            write_u8(hasher, 5);
            write_u16(hasher, *capacity);
        }
        ValueKind::Custom { name } => {
            write_u8(hasher, 6);
            write_len(hasher, name.len());
            hasher.update(name.as_bytes());
        }
        ValueKind::Option(inner) => {
            write_u8(hasher, 7);
            write_kind(hasher, inner);
        }
        ValueKind::List(inner) => {
            write_u8(hasher, 8);
            write_kind(hasher, inner);
        }
        ValueKind::Dictionary(key, value) => {
            write_u8(hasher, 9);
            write_kind(hasher, key);
            write_kind(hasher, value);
        }
        ValueKind::HashSet(inner) => {
            write_u8(hasher, 10);
            write_kind(hasher, inner);
        }
        ValueKind::Struct(fields) => {
            write_u8(hasher, 11);
            write_len(hasher, fields.len());
            for field in fields {
                write_kind(hasher, field);
            }
        }
    }
}

fn write_permissions(hasher: &mut Hasher, permissions: Permissions) {
    write_u8(
        hasher,
        match permissions.read {
            ReadPermission::Everyone => 0,
            ReadPermission::Owner => 1,
        },
    );
    write_u8(
        hasher,
        match permissions.write {
            WritePermission::Server => 0,
            WritePermission::Owner => 1,
        },
    );
}

fn write_u8(hasher: &mut Hasher, value: u8) {
    hasher.update(&[value]);
}

fn write_u16(hasher: &mut Hasher, value: u16) {
    hasher.update(&value.to_le_bytes());
}

fn write_len(hasher: &mut Hasher, value: usize) {
    hasher.update(&(value as u64).to_le_bytes());
}
