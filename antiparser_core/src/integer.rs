use crate::error::AntiparserError;
use crate::object::{DataField, ObjectAttrs, sealed};
use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// Bit width of a fixed-size integer object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
#[serde(rename_all = "kebab-case")]
pub enum IntWidth {
    Bits8,
    Bits16,
    Bits32,
}

impl IntWidth {
    pub fn bits(self) -> u32 {
        match self {
            IntWidth::Bits8 => 8,
            IntWidth::Bits16 => 16,
            IntWidth::Bits32 => 32,
        }
    }

    pub fn kind(self) -> &'static str {
        match self {
            IntWidth::Bits8 => "int8",
            IntWidth::Bits16 => "int16",
            IntWidth::Bits32 => "int32",
        }
    }

    /// Inclusive value range representable at this width.
    pub fn range(self, signed: bool) -> (i64, i64) {
        let bits = self.bits();
        if signed {
            (-(1i64 << (bits - 1)), (1i64 << (bits - 1)) - 1)
        } else {
            (0, (1i64 << bits) - 1)
        }
    }
}

/// An 8, 16 or 32-bit integer field, signed or unsigned.
///
/// In random mode the bounds double as the value range: each permutation
/// draws from `[min_size, max_size)`. Incremental mode leaves integers alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedInt {
    pub(crate) attrs: ObjectAttrs,
    pub(crate) width: IntWidth,
    pub(crate) signed: bool,
    pub(crate) content: i64,
}

impl FixedInt {
    /// An unsigned integer of the given width, bounded by its full range.
    pub fn new(width: IntWidth) -> Self {
        let (min, max) = width.range(false);
        Self {
            attrs: ObjectAttrs::with_bounds(min, max),
            width,
            signed: false,
            content: 0,
        }
    }

    pub fn int8() -> Self {
        Self::new(IntWidth::Bits8)
    }

    pub fn int16() -> Self {
        Self::new(IntWidth::Bits16)
    }

    pub fn int32() -> Self {
        Self::new(IntWidth::Bits32)
    }

    pub fn width(&self) -> IntWidth {
        self.width
    }

    pub fn signed(&self) -> bool {
        self.signed
    }

    /// Switches signedness and resets the bounds to the new full range.
    /// Call `set_bounds` afterwards to narrow them.
    pub fn set_signed(&mut self, signed: bool) {
        let (min, max) = self.width.range(signed);
        self.signed = signed;
        self.attrs.min_size = min;
        self.attrs.max_size = max;
    }

    pub fn content(&self) -> i64 {
        self.content
    }

    /// Stores `value` as-is; range checks happen when the payload is encoded.
    pub fn set_content(&mut self, value: i64) {
        self.content = value;
    }

    /// Inclusive range the content must fall in to be encodable.
    pub fn value_range(&self) -> (i64, i64) {
        self.width.range(self.signed)
    }
}

impl sealed::Sealed for FixedInt {
    fn attrs_mut(&mut self) -> &mut ObjectAttrs {
        &mut self.attrs
    }
}

impl DataField for FixedInt {
    fn attrs(&self) -> &ObjectAttrs {
        &self.attrs
    }

    fn check_attrs(&self, attrs: &ObjectAttrs) -> Result<(), AntiparserError> {
        attrs.check_order()
    }
}
