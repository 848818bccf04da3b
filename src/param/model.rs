//! Parameter data model: typed addresses, directories, and the client-side
//! mirror of a remote parameter.
//!
//! `SPEC_FULL.md` §9 (REDESIGN FLAGS item 3) replaces the reference
//! implementation's raw pointer plus ad-hoc alignment check with a
//! [`TypedAccessor`] constructed once at registration time; the type
//! witness and the validity rule travel together from then on.

use bitflags::bitflags;

bitflags! {
    /// Parameter kind and bookkeeping bits.
    ///
    /// `DIR`..`READONLY` are carried on the wire (the low byte of a
    /// descriptor's `param_type` field); `NO_INIT`/`REQ_VAL` are
    /// client-local bookkeeping on a [`ParameterValue`] mirror and are
    /// never put on the wire.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "serializable", derive(serde::Serialize, serde::Deserialize))]
    pub struct ParamType: u16 {
        /// This entry is a directory (its index-0 slot carries the name).
        const DIR = 1 << 0;
        /// Plain numeric value.
        const VALUE = 1 << 1;
        /// Value whose formatting string enumerates display labels.
        const ENUM = 1 << 2;
        /// Boolean value, rendered as `OFF`/`ON` in text mode.
        const BOOL = 1 << 3;
        /// Function-like entry; read/write of a bare value is rejected.
        const FUNC = 1 << 4;
        /// Writes are rejected regardless of bounds.
        const READONLY = 1 << 5;
        /// Client-local: no descriptor has been received yet.
        const NO_INIT = 1 << 6;
        /// Client-local: a value fetch is currently in flight.
        const REQ_VAL = 1 << 7;
    }
}

/// Mask of the bits that travel on the wire.
const WIRE_MASK: u16 =
    (ParamType::DIR.bits())
        | ParamType::VALUE.bits()
        | ParamType::ENUM.bits()
        | ParamType::BOOL.bits()
        | ParamType::FUNC.bits()
        | ParamType::READONLY.bits();

impl ParamType {
    /// The subset of these flags that is meaningful on the wire.
    pub fn to_wire_byte(self) -> u8 {
        (self.bits() & WIRE_MASK) as u8
    }

    /// Reconstructs flags from a wire byte, with no client-local bits set.
    pub fn from_wire_byte(byte: u8) -> ParamType {
        ParamType::from_bits_truncate(byte as u16)
    }
}

/// The underlying scalar type a parameter's local memory cell holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serializable", derive(serde::Serialize, serde::Deserialize))]
pub enum ValueType {
    I8,
    U8,
    I16,
    U16,
    I32,
    F32,
}

impl ValueType {
    fn align(self) -> usize {
        match self {
            ValueType::I8 | ValueType::U8 => 1,
            ValueType::I16 | ValueType::U16 => 2,
            ValueType::I32 | ValueType::F32 => 4,
        }
    }
}

/// Addresses at or below this value are a reserved sentinel region and are
/// never dereferenced, per `SPEC_FULL.md` §4.1.
const SENTINEL_REGION_MAX: usize = 255;

/// A type-witnessed, alignment-validated accessor to one parameter's local
/// memory cell.
///
/// Constructing a `TypedAccessor` is the single place a raw address enters
/// this engine; every read/write re-validates the sentinel/alignment rule,
/// since the backing memory is owned by whatever embedded subsystem
/// registered the parameter and may be hardware-mapped.
#[derive(Debug)]
pub struct TypedAccessor {
    address: usize,
    value_type: ValueType,
}

impl TypedAccessor {
    /// Builds an accessor over a raw address.
    ///
    /// # Safety
    /// `address`, if it passes the sentinel/alignment check, must point to
    /// a live, uniquely-owned value of the size implied by `value_type` for
    /// as long as this `TypedAccessor` is used.
    pub unsafe fn new(address: usize, value_type: ValueType) -> Self {
        TypedAccessor {
            address,
            value_type,
        }
    }

    /// Builds an accessor from a `'static` reference to a local value,
    /// the safe constructor used by registration code that owns its own
    /// storage (the common case for this crate's parameter directories).
    pub fn from_static_i32(cell: &'static mut i32, value_type: ValueType) -> Self {
        assert!(matches!(value_type, ValueType::I32));
        TypedAccessor {
            address: cell as *mut i32 as usize,
            value_type,
        }
    }

    /// Builds an accessor from a `'static` reference to a local `f32`.
    pub fn from_static_f32(cell: &'static mut f32) -> Self {
        TypedAccessor {
            address: cell as *mut f32 as usize,
            value_type: ValueType::F32,
        }
    }

    fn is_valid(&self) -> bool {
        self.address > SENTINEL_REGION_MAX && self.address % self.value_type.align() == 0
    }

    /// Reads the raw (unscaled) integer value. Returns `0` without
    /// touching memory if the address is in the sentinel region or
    /// misaligned for its declared type (testable property 7).
    pub fn read_raw(&self) -> i32 {
        if !self.is_valid() {
            return 0;
        }
        // SAFETY: validated above; caller established liveness at construction.
        unsafe {
            match self.value_type {
                ValueType::I8 => *(self.address as *const i8) as i32,
                ValueType::U8 => *(self.address as *const u8) as i32,
                ValueType::I16 => *(self.address as *const i16) as i32,
                ValueType::U16 => *(self.address as *const u16) as i32,
                ValueType::I32 => *(self.address as *const i32),
                ValueType::F32 => *(self.address as *const f32) as i32,
            }
        }
    }

    /// Writes a raw (unscaled) integer value. Returns `false` without
    /// touching memory if the address is invalid.
    pub fn write_raw(&self, v: i32) -> bool {
        if !self.is_valid() {
            return false;
        }
        // SAFETY: validated above; caller established liveness at construction.
        unsafe {
            match self.value_type {
                ValueType::I8 => *(self.address as *mut i8) = v as i8,
                ValueType::U8 => *(self.address as *mut u8) = v as u8,
                ValueType::I16 => *(self.address as *mut i16) = v as i16,
                ValueType::U16 => *(self.address as *mut u16) = v as u16,
                ValueType::I32 => *(self.address as *mut i32) = v,
                ValueType::F32 => *(self.address as *mut f32) = v as f32,
            }
        }
        true
    }

    /// Reads the raw `f32` value (for `value_type == F32` parameters only).
    pub fn read_float(&self) -> f32 {
        if !self.is_valid() {
            return 0.0;
        }
        // SAFETY: validated above; caller established liveness at construction.
        unsafe { *(self.address as *const f32) }
    }

    /// Writes a raw `f32` value. Returns `false` without touching memory if
    /// the address is invalid.
    pub fn write_float(&self, v: f32) -> bool {
        if !self.is_valid() {
            return false;
        }
        // SAFETY: validated above; caller established liveness at construction.
        unsafe { *(self.address as *mut f32) = v };
        true
    }
}

/// Computes `10^decimal` by repeated multiplication, matching the
/// reference implementation's `pow10i` rather than `f32::powi`/`powf`.
pub(crate) fn pow10(decimal: u8) -> f32 {
    let mut result = 1.0f32;
    for _ in 0..decimal {
        result *= 10.0;
    }
    result
}

/// A single parameter served by this node: its memory cell, bounds, and
/// display metadata.
#[derive(Debug)]
pub struct ParameterAddress {
    accessor: TypedAccessor,
    /// Minimum accepted wire value (directory entries hold 0 here).
    pub min: i32,
    /// Maximum accepted wire value (directory entries hold the directory's
    /// child count, per `SPEC_FULL.md` §4.5's `max = directory.size` rule).
    pub max: i32,
    pub step: i32,
    pub default: i32,
    pub decimal: u8,
    pub value_type: ValueType,
    pub param_type: ParamType,
    pub name: Option<String>,
    pub formatting: Option<String>,
}

impl ParameterAddress {
    /// Builds a new served parameter entry.
    pub fn new(
        accessor: TypedAccessor,
        min: i32,
        max: i32,
        step: i32,
        default: i32,
        decimal: u8,
        value_type: ValueType,
        param_type: ParamType,
        name: Option<String>,
        formatting: Option<String>,
    ) -> Self {
        ParameterAddress {
            accessor,
            min,
            max,
            step,
            default,
            decimal,
            value_type,
            param_type,
            name,
            formatting,
        }
    }

    /// Reads this parameter's current value in wire scale (int, or a
    /// `round(float * 10^decimal)` fixed-point int for `F32` entries).
    pub fn get_value(&self) -> i32 {
        match self.value_type {
            ValueType::F32 => {
                let scaled = self.accessor.read_float() * pow10(self.decimal);
                scaled.round() as i32
            }
            _ => self.accessor.read_raw(),
        }
    }

    /// Writes `v` (wire scale) into this parameter's cell.
    ///
    /// Returns `0` on success, `1` if `v` is out of `[min, max]`, the
    /// entry is read-only, or the address failed its validity check —
    /// matching the reference `i32` `{0 = ok, 1 = out of range/invalid}`
    /// convention named in spec.md §6.
    pub fn set_value(&self, v: i32) -> i32 {
        if v < self.min || v > self.max {
            return 1;
        }
        if self.param_type.contains(ParamType::READONLY) {
            return 1;
        }
        let ok = match self.value_type {
            ValueType::F32 => self.accessor.write_float(v as f32 / pow10(self.decimal)),
            _ => self.accessor.write_raw(v),
        };
        if ok { 0 } else { 1 }
    }
}

/// An ordered sequence of parameters; index 0 conventionally carries the
/// directory's own display name.
#[derive(Debug, Default)]
pub struct ParameterDirectory {
    pub entries: Vec<ParameterAddress>,
}

impl ParameterDirectory {
    pub fn new() -> Self {
        ParameterDirectory { entries: Vec::new() }
    }

    /// The directory's display name: its own index-0 name if set, else the
    /// first child's name, else `"Unknown directory"` — the fallback chain
    /// `SPEC_FULL.md` §4.5 specifies.
    pub fn display_name(&self) -> &str {
        if let Some(name) = self.entries.first().and_then(|e| e.name.as_deref()) {
            if !name.is_empty() {
                return name;
            }
        }
        if let Some(name) = self.entries.get(1).and_then(|e| e.name.as_deref()) {
            return name;
        }
        "Unknown directory"
    }
}

/// Client-side mirror of one remote parameter, kept up to date by replies
/// dispatched through the [`crate::param::queue::ParamClientQueue`].
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serializable", derive(serde::Serialize, serde::Deserialize))]
pub struct ParameterValue {
    pub value: i32,
    pub min: i32,
    pub max: i32,
    pub step: i32,
    pub decimal: u8,
    pub value_type: ValueType,
    pub param_type: ParamType,
    pub name: Option<String>,
    pub formatting: Option<String>,
    pub index: u8,
}

impl ParameterValue {
    /// A freshly registered mirror: no descriptor has arrived yet.
    pub fn new(index: u8) -> Self {
        ParameterValue {
            value: 0,
            min: 0,
            max: 0,
            step: 0,
            decimal: 0,
            value_type: ValueType::I32,
            param_type: ParamType::NO_INIT,
            name: None,
            formatting: None,
            index,
        }
    }

    /// Applies an inbound value-only reply: updates `value`, clears `REQ_VAL`.
    pub fn apply_value_reply(&mut self, value: i32) {
        self.value = value;
        self.param_type.remove(ParamType::REQ_VAL);
    }

    /// Applies an inbound descriptor reply: replaces numeric fields and
    /// name/formatting strings, clears `NO_INIT` and `REQ_VAL`.
    pub fn apply_descriptor_reply(
        &mut self,
        value: i32,
        min: i32,
        max: i32,
        step: i32,
        decimal: u8,
        wire_param_type: u8,
        name: String,
        formatting: String,
    ) {
        self.value = value;
        self.min = min;
        self.max = max;
        self.step = step;
        self.decimal = decimal;
        self.param_type = ParamType::from_wire_byte(wire_param_type);
        self.name = Some(name);
        self.formatting = Some(formatting);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn misaligned_address_reads_zero_and_does_not_panic() {
        // Odd address, declared as a 16-bit value: misaligned by the 2-byte rule.
        let accessor = unsafe { TypedAccessor::new(257, ValueType::I16) };
        assert_eq!(accessor.read_raw(), 0);
        assert!(!accessor.write_raw(42));
    }

    #[test]
    fn sentinel_region_address_reads_zero() {
        let accessor = unsafe { TypedAccessor::new(4, ValueType::I8) };
        assert_eq!(accessor.read_raw(), 0);
    }

    #[test]
    fn float_round_trips_through_decimal_scaling() {
        let cell_ref: &'static mut f32 = Box::leak(Box::new(0.0f32));
        let accessor = TypedAccessor::from_static_f32(cell_ref);
        let addr = ParameterAddress::new(
            accessor,
            0,
            10_000,
            1,
            0,
            2,
            ValueType::F32,
            ParamType::VALUE,
            None,
            None,
        );
        assert_eq!(addr.set_value(1234), 0);
        assert_eq!(addr.get_value(), 1234);
    }

    #[test]
    fn pow10_matches_repeated_multiplication() {
        assert_eq!(pow10(0), 1.0);
        assert_eq!(pow10(3), 1000.0);
    }
}
