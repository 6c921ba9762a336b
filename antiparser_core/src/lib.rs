pub mod codec;
pub mod config;
pub mod container;
pub mod error;
pub mod integer;
pub mod mutator;
pub mod object;
pub mod snapshot;
pub mod store;
pub mod strings;

pub use codec::{build_payload, encode_object};
pub use config::{AntiparserConfig, GeneratorSettings, ObjectKind, ObjectSpec};
pub use container::{Container, ObjectId};
pub use error::AntiparserError;
pub use integer::{FixedInt, IntWidth};
pub use mutator::{IncrementalMutator, Mutator, RandomMutator, mutate_object};
pub use object::{ByteOrder, DataField, DataObject, MutationMode, ObjectAttrs};
pub use snapshot::{Snapshot, export_snapshot, import_snapshot};
pub use store::{SnapshotEntry, SnapshotStore, StoreError, write_payload};
pub use strings::{CharSet, FreeformString, KeywordString};
