use crate::container::Container;
use crate::error::AntiparserError;
use crate::integer::{FixedInt, IntWidth};
use crate::object::{ByteOrder, DataField, DataObject, MutationMode, ObjectAttrs};
use crate::strings::{CharSet, FreeformString, KeywordString};
use bincode::{
    Decode, Encode,
    config::{Configuration, Fixint, LittleEndian, NoLimit},
    error::{DecodeError, EncodeError},
};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Schema version written into every snapshot.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Bincode settings shared by every snapshot encoder and decoder.
pub(crate) fn bincode_config() -> Configuration<LittleEndian, Fixint, NoLimit> {
    bincode::config::standard()
        .with_little_endian()
        .with_fixed_int_encoding()
}

/// A self-contained record of one container permutation: every object's
/// variant and field values, in payload order, plus the payload itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct Snapshot {
    /// Schema version, [`SNAPSHOT_VERSION`] for snapshots written by this crate.
    pub version: u32,
    /// Every object of the container, in payload order.
    pub objects: Vec<ObjectRecord>,
    /// The payload the container held when the snapshot was taken.
    pub payload: Vec<u8>,
}

/// The attributes shared by every object variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct AttrsRecord {
    /// Lower length bound for strings, lower value bound for integers.
    pub min_size: i64,
    /// Upper length bound for strings, upper value bound for integers.
    pub max_size: i64,
    pub optional: bool,
    pub is_static: bool,
    pub byte_order: ByteOrder,
    pub mode: MutationMode,
}

/// A freeform or C string. The null byte of a C string is not part of `content`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct StringRecord {
    pub attrs: AttrsRecord,
    /// Excluded bytes; the permitted range is recomputed on import.
    pub illegal_chars: Vec<u8>,
    pub terminator: Option<Vec<u8>>,
    pub content: Vec<u8>,
}

/// A keyword string. `current_keyword` must be one of `keywords`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct KeywordRecord {
    pub attrs: AttrsRecord,
    pub keywords: Vec<Vec<u8>>,
    pub current_keyword: Vec<u8>,
    pub separator: Vec<u8>,
    pub illegal_chars: Vec<u8>,
    pub terminator: Option<Vec<u8>>,
    pub content: Vec<u8>,
}

/// A fixed-width integer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct IntRecord {
    pub attrs: AttrsRecord,
    pub width: IntWidth,
    pub signed: bool,
    pub content: i64,
}

/// One object, tagged with its variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ObjectRecord {
    String(StringRecord),
    CString(StringRecord),
    Keyword(KeywordRecord),
    Int(IntRecord),
}

impl Snapshot {
    pub fn to_bincode(&self) -> Result<Vec<u8>, EncodeError> {
        bincode::encode_to_vec(self, bincode_config())
    }

    pub fn from_bincode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let (snapshot, _length) = bincode::decode_from_slice(bytes, bincode_config())?;
        Ok(snapshot)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl From<&ObjectAttrs> for AttrsRecord {
    fn from(attrs: &ObjectAttrs) -> Self {
        Self {
            min_size: attrs.min_size(),
            max_size: attrs.max_size(),
            optional: attrs.optional(),
            is_static: attrs.is_static(),
            byte_order: attrs.byte_order(),
            mode: attrs.mode(),
        }
    }
}

impl From<AttrsRecord> for ObjectAttrs {
    fn from(record: AttrsRecord) -> Self {
        let mut attrs = ObjectAttrs::with_bounds(record.min_size, record.max_size);
        attrs.optional = record.optional;
        attrs.is_static = record.is_static;
        attrs.byte_order = record.byte_order;
        attrs.mode = record.mode;
        attrs
    }
}

impl From<&FreeformString> for StringRecord {
    fn from(string: &FreeformString) -> Self {
        Self {
            attrs: string.attrs().into(),
            illegal_chars: string.illegal_chars().to_vec(),
            terminator: string.terminator().map(<[u8]>::to_vec),
            content: string.content().to_vec(),
        }
    }
}

impl From<StringRecord> for FreeformString {
    fn from(record: StringRecord) -> Self {
        Self {
            attrs: record.attrs.into(),
            charset: CharSet::excluding(&record.illegal_chars),
            terminator: record.terminator,
            content: record.content,
        }
    }
}

impl From<&DataObject> for ObjectRecord {
    fn from(object: &DataObject) -> Self {
        match object {
            DataObject::Freeform(string) => ObjectRecord::String(string.into()),
            DataObject::CString(string) => ObjectRecord::CString(string.into()),
            DataObject::Keyword(keyword) => ObjectRecord::Keyword(KeywordRecord {
                attrs: keyword.attrs().into(),
                keywords: keyword.keywords().to_vec(),
                current_keyword: keyword.current_keyword().to_vec(),
                separator: keyword.separator().to_vec(),
                illegal_chars: keyword.illegal_chars().to_vec(),
                terminator: keyword.terminator().map(<[u8]>::to_vec),
                content: keyword.content().to_vec(),
            }),
            DataObject::Int(int) => ObjectRecord::Int(IntRecord {
                attrs: int.attrs().into(),
                width: int.width(),
                signed: int.signed(),
                content: int.content(),
            }),
        }
    }
}

impl TryFrom<ObjectRecord> for DataObject {
    type Error = AntiparserError;

    /// Rebuilds an object from its record, applying the same checks the
    /// setters enforce.
    fn try_from(record: ObjectRecord) -> Result<Self, Self::Error> {
        let object = match record {
            ObjectRecord::String(string) => DataObject::Freeform(string.into()),
            ObjectRecord::CString(string) => DataObject::CString(string.into()),
            ObjectRecord::Keyword(keyword) => {
                if keyword.keywords.is_empty() {
                    return Err(AntiparserError::Snapshot(
                        "keyword record has no keywords".to_string(),
                    ));
                }
                if !keyword.keywords.contains(&keyword.current_keyword) {
                    return Err(AntiparserError::Snapshot(format!(
                        "current keyword \"{}\" is not one of the record's keywords",
                        keyword.current_keyword.escape_ascii()
                    )));
                }
                DataObject::Keyword(KeywordString {
                    attrs: keyword.attrs.into(),
                    keywords: keyword.keywords,
                    current_keyword: keyword.current_keyword,
                    separator: keyword.separator,
                    charset: CharSet::excluding(&keyword.illegal_chars),
                    terminator: keyword.terminator,
                    content: keyword.content,
                })
            }
            ObjectRecord::Int(int) => DataObject::Int(FixedInt {
                attrs: int.attrs.into(),
                width: int.width,
                signed: int.signed,
                content: int.content,
            }),
        };
        object.validate()?;
        Ok(object)
    }
}

/// Records every object of `container`, in order, along with its current payload.
///
/// # Arguments
/// * `container`: The container to record; it is not modified.
///
/// # Returns
/// A [`Snapshot`] at [`SNAPSHOT_VERSION`].
pub fn export_snapshot<R: Rng>(container: &Container<R>) -> Snapshot {
    Snapshot {
        version: SNAPSHOT_VERSION,
        objects: container.objects().map(|(_, object)| object.into()).collect(),
        payload: container.payload().to_vec(),
    }
}

/// Rebuilds a container by appending each recorded object in order.
///
/// The recorded payload is restored afterwards, so the imported container
/// emits exactly the exported permutation even when optional objects would
/// roll differently under `rng`.
///
/// # Arguments
/// * `snapshot`: A snapshot produced by [`export_snapshot`], possibly after a
///   trip through bincode or JSON.
/// * `rng`: Generator for the new container's later permutations.
///
/// # Returns
/// The rebuilt container, or `AntiparserError::Snapshot` for an unknown
/// version or inconsistent keyword record, and any setter or encoding error
/// raised while replaying the objects.
pub fn import_snapshot<R: Rng>(snapshot: Snapshot, rng: R) -> Result<Container<R>, AntiparserError> {
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(AntiparserError::Snapshot(format!(
            "unsupported snapshot version {} (expected {})",
            snapshot.version, SNAPSHOT_VERSION
        )));
    }
    let mut container = Container::new(rng);
    for record in snapshot.objects {
        container.append(DataObject::try_from(record)?)?;
    }
    container.restore_payload(snapshot.payload);
    Ok(container)
}
