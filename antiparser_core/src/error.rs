use crate::container::ObjectId;
use thiserror::Error;

/// Errors raised by data objects, the mutation engine, the payload codec
/// and the container.
///
/// None of these are fatal: a caller can fix the offending object, delete it
/// from the container, or abandon the container altogether.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AntiparserError {
    /// A setter was handed a value that would leave the object unusable,
    /// e.g. `min_size > max_size`, an empty keyword list, or an illegal-character
    /// set that leaves nothing to sample from.
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// An integer object's content does not fit its declared width and signedness.
    #[error("Cannot encode {bits}-bit {signedness} integer {value}: outside [{min}, {max}]")]
    Encoding {
        bits: u32,
        signedness: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    /// The referenced object is not a member of the container.
    #[error("Object {0} not found in container")]
    NotFound(ObjectId),

    /// A snapshot could not be turned back into a container.
    #[error("Snapshot error: {0}")]
    Snapshot(String),
}

impl AntiparserError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        AntiparserError::Configuration(msg.into())
    }
}
