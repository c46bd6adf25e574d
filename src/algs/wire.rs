//! Fixed-layout, little-endian wire records for the collective phases.
//!
//! All multi-byte integers in these structs are **little-endian** on the wire.
//! We store them pre-LE with `.to_le()` and decode with `.from_le()`.
//! Floating-point values travel as their IEEE-754 bit pattern.

use bytemuck::{Pod, Zeroable};
use static_assertions::{const_assert, const_assert_eq};
use std::mem::{align_of, size_of};

pub fn cast_slice<T: Pod>(v: &[T]) -> &[u8] {
    bytemuck::cast_slice(v)
}

pub fn cast_slice_mut<T: Pod>(v: &mut [T]) -> &mut [u8] {
    bytemuck::cast_slice_mut(v)
}

/// Decode a received byte buffer into `n` records, copying so that the
/// result is correctly aligned regardless of the buffer's alignment.
pub fn decode_records<T: Pod>(raw: &[u8], n: usize) -> Option<Vec<T>> {
    if raw.len() != n * size_of::<T>() {
        return None;
    }
    let mut out = vec![T::zeroed(); n];
    cast_slice_mut(&mut out).copy_from_slice(raw);
    Some(out)
}

/// Count of records that follow in the data phase.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WireCount {
    pub n_le: u32,
}

impl WireCount {
    pub fn new(n: usize) -> Self {
        Self {
            n_le: (n as u32).to_le(),
        }
    }
    pub fn get(&self) -> usize {
        u32::from_le(self.n_le) as usize
    }
}

/// A field definition `(field id, components per entity)`.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WireFieldDef {
    pub field_le: i32,
    pub size_le: u32,
}

impl WireFieldDef {
    pub fn new(field: i32, size: usize) -> Self {
        Self {
            field_le: field.to_le(),
            size_le: (size as u32).to_le(),
        }
    }
    pub fn decode(&self) -> (i32, usize) {
        (i32::from_le(self.field_le), u32::from_le(self.size_le) as usize)
    }
}

/// One locally known `(id type, id, field)` registration. `has_field_le == 0`
/// marks a structural (field-less) slot.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WireRegistration {
    pub id_le: i64,
    pub id_type_le: i32,
    pub field_le: i32,
    pub has_field_le: u32,
    pub _pad: u32,
}

impl WireRegistration {
    pub fn new(id_type: i32, id: i64, field: Option<i32>) -> Self {
        Self {
            id_le: id.to_le(),
            id_type_le: id_type.to_le(),
            field_le: field.unwrap_or(0).to_le(),
            has_field_le: u32::from(field.is_some()).to_le(),
            _pad: 0,
        }
    }
    pub fn decode(&self) -> (i32, i64, Option<i32>) {
        let field = (u32::from_le(self.has_field_le) != 0).then(|| i32::from_le(self.field_le));
        (i32::from_le(self.id_type_le), i64::from_le(self.id_le), field)
    }
}

/// A structural `(row, col)` pair of the sparsity graph.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WirePair {
    pub row_le: u64,
    pub col_le: u64,
}

impl WirePair {
    pub fn new(row: usize, col: usize) -> Self {
        Self {
            row_le: (row as u64).to_le(),
            col_le: (col as u64).to_le(),
        }
    }
    pub fn decode(&self) -> (usize, usize) {
        (
            u64::from_le(self.row_le) as usize,
            u64::from_le(self.col_le) as usize,
        )
    }
}

/// A numeric contribution `(row, col, value)`; vectors send `col = 0`.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WireCoef {
    pub row_le: u64,
    pub col_le: u64,
    pub value_bits_le: u64,
}

impl WireCoef {
    pub fn new(row: usize, col: usize, value: f64) -> Self {
        Self {
            row_le: (row as u64).to_le(),
            col_le: (col as u64).to_le(),
            value_bits_le: value.to_bits().to_le(),
        }
    }
    pub fn decode(&self) -> (usize, usize, f64) {
        (
            u64::from_le(self.row_le) as usize,
            u64::from_le(self.col_le) as usize,
            f64::from_bits(u64::from_le(self.value_bits_le)),
        )
    }
}

/// Flattened slave-constraint record. Each constraint travels as one record
/// with `master == RHS_MARKER` carrying the rhs, followed by one record per
/// master term.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WireConstraintTerm {
    pub slave_le: u64,
    pub master_le: u64,
    pub value_bits_le: u64,
}

impl WireConstraintTerm {
    pub const RHS_MARKER: u64 = u64::MAX;

    pub fn rhs(slave: usize, rhs: f64) -> Self {
        Self {
            slave_le: (slave as u64).to_le(),
            master_le: Self::RHS_MARKER.to_le(),
            value_bits_le: rhs.to_bits().to_le(),
        }
    }
    pub fn term(slave: usize, master: usize, weight: f64) -> Self {
        Self {
            slave_le: (slave as u64).to_le(),
            master_le: (master as u64).to_le(),
            value_bits_le: weight.to_bits().to_le(),
        }
    }
    pub fn is_rhs(&self) -> bool {
        u64::from_le(self.master_le) == Self::RHS_MARKER
    }
    pub fn slave(&self) -> usize {
        u64::from_le(self.slave_le) as usize
    }
    pub fn master(&self) -> usize {
        u64::from_le(self.master_le) as usize
    }
    pub fn value(&self) -> f64 {
        f64::from_bits(u64::from_le(self.value_bits_le))
    }
}

// ===== Compile-time sanity checks =========================================

const_assert_eq!(size_of::<WireCount>(), 4);
const_assert_eq!(size_of::<WireFieldDef>(), 8);
const_assert_eq!(size_of::<WireRegistration>(), 24);
const_assert_eq!(size_of::<WirePair>(), 16);
const_assert_eq!(size_of::<WireCoef>(), 24);
const_assert_eq!(size_of::<WireConstraintTerm>(), 24);
const_assert!(align_of::<WireRegistration>() == 8);
