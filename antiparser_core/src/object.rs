use crate::error::AntiparserError;
use crate::integer::FixedInt;
use crate::strings::{FreeformString, KeywordString};
use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// Default lower length bound for freshly created string objects.
pub const DEFAULT_MIN_SIZE: i64 = 1;
/// Default upper length bound for freshly created string objects.
pub const DEFAULT_MAX_SIZE: i64 = 1024;

/// Byte order used when an integer object is packed into the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Encode, Decode)]
#[serde(rename_all = "kebab-case")]
pub enum ByteOrder {
    #[default]
    Native,
    Big,
    Little,
}

/// How the mutation engine rewrites an object's content on each permutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Encode, Decode)]
#[serde(rename_all = "kebab-case")]
pub enum MutationMode {
    /// Fresh content of a random length within the declared bounds.
    #[default]
    Random,
    /// Content whose length climbs a ladder of boundary sizes, one rung per permutation.
    Incremental,
}

/// Attributes shared by every data object variant.
///
/// For string-like objects `min_size`/`max_size` bound the content length; for
/// integer objects they bound the value drawn in random mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectAttrs {
    pub(crate) min_size: i64,
    pub(crate) max_size: i64,
    pub(crate) optional: bool,
    pub(crate) is_static: bool,
    pub(crate) byte_order: ByteOrder,
    pub(crate) mode: MutationMode,
}

impl ObjectAttrs {
    pub(crate) fn with_bounds(min_size: i64, max_size: i64) -> Self {
        Self {
            min_size,
            max_size,
            optional: false,
            is_static: false,
            byte_order: ByteOrder::Native,
            mode: MutationMode::Random,
        }
    }

    /// Lower bound: minimum length for strings, minimum value for integers.
    pub fn min_size(&self) -> i64 {
        self.min_size
    }

    /// Upper bound: maximum length for strings, maximum value for integers.
    pub fn max_size(&self) -> i64 {
        self.max_size
    }

    /// Whether each payload build includes the object only on a fair coin flip.
    pub fn optional(&self) -> bool {
        self.optional
    }

    /// Whether the mutation engine skips the object.
    pub fn is_static(&self) -> bool {
        self.is_static
    }

    /// Byte order for integer encoding; string variants ignore it.
    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    pub fn mode(&self) -> MutationMode {
        self.mode
    }

    /// The one constraint every variant shares: `min_size <= max_size`.
    pub(crate) fn check_order(&self) -> Result<(), AntiparserError> {
        if self.min_size > self.max_size {
            return Err(AntiparserError::config(format!(
                "min_size {} is greater than max_size {}",
                self.min_size, self.max_size
            )));
        }
        Ok(())
    }
}

impl Default for ObjectAttrs {
    fn default() -> Self {
        Self::with_bounds(DEFAULT_MIN_SIZE, DEFAULT_MAX_SIZE)
    }
}

pub(crate) mod sealed {
    use super::ObjectAttrs;

    pub trait Sealed {
        fn attrs_mut(&mut self) -> &mut ObjectAttrs;
    }
}

use sealed::Sealed as _;

/// Applies `update` to a copy of the object's attributes and commits it only
/// if the object accepts the result.
fn update_attrs<T>(field: &mut T, update: impl FnOnce(&mut ObjectAttrs)) -> Result<(), AntiparserError>
where
    T: DataField + ?Sized,
{
    let mut candidate = field.attrs().clone();
    update(&mut candidate);
    field.check_attrs(&candidate)?;
    *field.attrs_mut() = candidate;
    Ok(())
}

/// Uniform accessors for the attributes every data object carries.
///
/// Setters that can break an invariant validate the new state first and
/// leave the object untouched on error.
pub trait DataField: sealed::Sealed {
    fn attrs(&self) -> &ObjectAttrs;

    /// Checks a candidate attribute set against this object's own constraints.
    fn check_attrs(&self, attrs: &ObjectAttrs) -> Result<(), AntiparserError>;

    fn min_size(&self) -> i64 {
        self.attrs().min_size
    }

    fn max_size(&self) -> i64 {
        self.attrs().max_size
    }

    fn optional(&self) -> bool {
        self.attrs().optional
    }

    fn is_static(&self) -> bool {
        self.attrs().is_static
    }

    fn byte_order(&self) -> ByteOrder {
        self.attrs().byte_order
    }

    fn mode(&self) -> MutationMode {
        self.attrs().mode
    }

    /// Sets both bounds at once, so a range can be moved past the current one
    /// without tripping over the `min_size <= max_size` check halfway.
    fn set_bounds(&mut self, min_size: i64, max_size: i64) -> Result<(), AntiparserError> {
        update_attrs(self, |attrs| {
            attrs.min_size = min_size;
            attrs.max_size = max_size;
        })
    }

    fn set_min_size(&mut self, min_size: i64) -> Result<(), AntiparserError> {
        update_attrs(self, |attrs| attrs.min_size = min_size)
    }

    fn set_max_size(&mut self, max_size: i64) -> Result<(), AntiparserError> {
        update_attrs(self, |attrs| attrs.max_size = max_size)
    }

    fn set_mode(&mut self, mode: MutationMode) -> Result<(), AntiparserError> {
        update_attrs(self, |attrs| attrs.mode = mode)
    }

    /// An optional object is included in each payload build with probability 1/2.
    fn set_optional(&mut self, optional: bool) {
        self.attrs_mut().optional = optional;
    }

    /// A static object is never touched by the mutation engine.
    fn set_static(&mut self, is_static: bool) {
        self.attrs_mut().is_static = is_static;
    }

    fn set_byte_order(&mut self, byte_order: ByteOrder) {
        self.attrs_mut().byte_order = byte_order;
    }

    /// Re-checks the object's current state.
    fn validate(&self) -> Result<(), AntiparserError> {
        self.check_attrs(self.attrs())
    }
}

/// One typed field of a payload.
///
/// The codec and the mutation engine dispatch on this discriminant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataObject {
    /// Raw bytes followed by an optional terminator.
    Freeform(FreeformString),
    /// Like `Freeform`, but always followed by a single `0x00`.
    CString(FreeformString),
    /// `keyword + separator + content + terminator`.
    Keyword(KeywordString),
    /// An 8, 16 or 32-bit integer.
    Int(FixedInt),
}

impl DataObject {
    /// Wraps a freeform string so that it is encoded with a trailing null byte.
    pub fn cstring(string: FreeformString) -> Self {
        DataObject::CString(string)
    }

    /// Short, stable name of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            DataObject::Freeform(_) => "string",
            DataObject::CString(_) => "cstring",
            DataObject::Keyword(_) => "keyword",
            DataObject::Int(int) => int.width().kind(),
        }
    }

    /// Length of the current content for string-like objects.
    pub fn content_size(&self) -> Option<usize> {
        match self {
            DataObject::Freeform(s) | DataObject::CString(s) => Some(s.content_size()),
            DataObject::Keyword(k) => Some(k.content_size()),
            DataObject::Int(_) => None,
        }
    }

    /// A flat key/value listing of every field, for logs and diagnostics.
    pub fn debug_view(&self) -> Vec<(&'static str, String)> {
        let attrs = self.attrs();
        let mut view = vec![
            ("kind", self.kind().to_string()),
            ("min_size", attrs.min_size.to_string()),
            ("max_size", attrs.max_size.to_string()),
            ("optional", attrs.optional.to_string()),
            ("static", attrs.is_static.to_string()),
            ("byte_order", format!("{:?}", attrs.byte_order)),
            ("mode", format!("{:?}", attrs.mode)),
        ];
        match self {
            DataObject::Freeform(s) | DataObject::CString(s) => {
                view.push(("illegal_chars", escape(s.illegal_chars())));
                view.push(("terminator", escape_opt(s.terminator())));
                view.push(("content_size", s.content_size().to_string()));
                view.push(("content", escape(s.content())));
            }
            DataObject::Keyword(k) => {
                let keywords: Vec<String> = k.keywords().iter().map(|kw| escape(kw)).collect();
                view.push(("keywords", keywords.join(",")));
                view.push(("current_keyword", escape(k.current_keyword())));
                view.push(("separator", escape(k.separator())));
                view.push(("illegal_chars", escape(k.illegal_chars())));
                view.push(("terminator", escape_opt(k.terminator())));
                view.push(("content_size", k.content_size().to_string()));
                view.push(("content", escape(k.content())));
            }
            DataObject::Int(int) => {
                view.push(("signed", int.signed().to_string()));
                view.push(("content", int.content().to_string()));
            }
        }
        view
    }
}

fn escape(bytes: &[u8]) -> String {
    bytes.escape_ascii().to_string()
}

fn escape_opt(bytes: Option<&[u8]>) -> String {
    bytes.map_or_else(|| "none".to_string(), escape)
}

impl sealed::Sealed for DataObject {
    fn attrs_mut(&mut self) -> &mut ObjectAttrs {
        match self {
            DataObject::Freeform(s) | DataObject::CString(s) => s.attrs_mut(),
            DataObject::Keyword(k) => k.attrs_mut(),
            DataObject::Int(int) => int.attrs_mut(),
        }
    }
}

impl DataField for DataObject {
    fn attrs(&self) -> &ObjectAttrs {
        match self {
            DataObject::Freeform(s) | DataObject::CString(s) => s.attrs(),
            DataObject::Keyword(k) => k.attrs(),
            DataObject::Int(int) => int.attrs(),
        }
    }

    fn check_attrs(&self, attrs: &ObjectAttrs) -> Result<(), AntiparserError> {
        match self {
            DataObject::Freeform(s) | DataObject::CString(s) => s.check_attrs(attrs),
            DataObject::Keyword(k) => k.check_attrs(attrs),
            DataObject::Int(int) => int.check_attrs(attrs),
        }
    }
}

impl From<FreeformString> for DataObject {
    fn from(string: FreeformString) -> Self {
        DataObject::Freeform(string)
    }
}

impl From<KeywordString> for DataObject {
    fn from(keyword: KeywordString) -> Self {
        DataObject::Keyword(keyword)
    }
}

impl From<FixedInt> for DataObject {
    fn from(int: FixedInt) -> Self {
        DataObject::Int(int)
    }
}
