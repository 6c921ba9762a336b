use crate::codec::build_payload;
use crate::error::AntiparserError;
use crate::mutator::mutate_object;
use crate::object::{DataField, DataObject};
use rand::Rng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use rand_core::SeedableRng;
use std::fmt;
use tracing::debug;

/// Handle to an object appended to a [`Container`].
///
/// Handles are unique within the container that issued them, so two
/// otherwise identical objects can still be told apart on `delete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An ordered sequence of data objects and the payload derived from it.
///
/// The payload is never edited directly: every operation that changes the
/// sequence or its contents re-runs the codec before returning. All random
/// decisions, including optional-inclusion rolls, draw from the container's
/// own generator, so a seeded container produces the same payloads every run.
///
/// Single-writer: callers sharing a container across threads must provide
/// their own locking.
pub struct Container<R: Rng = ChaCha8Rng> {
    entries: Vec<(ObjectId, DataObject)>,
    payload: Vec<u8>,
    rng: R,
    next_id: u64,
}

impl Container<ChaCha8Rng> {
    /// A container driven by a ChaCha8 generator seeded with `seed`.
    pub fn seeded(seed: u64) -> Self {
        Self::new(ChaCha8Rng::seed_from_u64(seed))
    }
}

impl<R: Rng> Container<R> {
    pub fn new(rng: R) -> Self {
        Self {
            entries: Vec::new(),
            payload: Vec::new(),
            rng,
            next_id: 0,
        }
    }

    /// Adds `object` at the tail and rebuilds the payload.
    ///
    /// If the object cannot be encoded it is not kept, and the previous
    /// payload stays in place.
    pub fn append(&mut self, object: impl Into<DataObject>) -> Result<ObjectId, AntiparserError> {
        let object = object.into();
        let id = ObjectId(self.next_id);
        debug!(%id, kind = object.kind(), "appending object");
        self.entries.push((id, object));
        if let Err(e) = self.rebuild_payload() {
            self.entries.pop();
            return Err(e);
        }
        self.next_id += 1;
        Ok(id)
    }

    /// Removes the object behind `id`, rebuilds the payload and hands the object back.
    ///
    /// If the remaining sequence cannot be encoded the object is put back in
    /// its old position and the previous payload stays in place.
    pub fn delete(&mut self, id: ObjectId) -> Result<DataObject, AntiparserError> {
        let index = self.index_of(id)?;
        debug!(%id, "removing object");
        let (_, object) = self.entries.remove(index);
        if let Err(e) = self.rebuild_payload() {
            self.entries.insert(index, (id, object));
            return Err(e);
        }
        Ok(object)
    }

    /// Puts the objects in a uniformly random order and rebuilds the payload.
    pub fn shuffle(&mut self) -> Result<(), AntiparserError> {
        self.entries.shuffle(&mut self.rng);
        debug!(order = ?self.ids(), "shuffled objects");
        self.rebuild_payload()
    }

    /// Mutates every non-static object according to its mode.
    ///
    /// The payload is rebuilt after each object, so optional objects are
    /// rolled once per member; the final payload reflects every mutation.
    /// A member whose mutation cannot be encoded is reverted and the error
    /// returned, leaving earlier members mutated.
    pub fn permute(&mut self) -> Result<(), AntiparserError> {
        debug!(objects = self.entries.len(), "permuting");
        for index in 0..self.entries.len() {
            let previous = self.entries[index].1.clone();
            let outcome = mutate_object(&mut self.entries[index].1, &mut self.rng)
                .and_then(|()| self.rebuild_payload());
            if let Err(e) = outcome {
                self.entries[index].1 = previous;
                return Err(e);
            }
        }
        Ok(())
    }

    /// Runs the codec again over the current sequence, re-rolling optional objects.
    ///
    /// On error the previous payload is kept.
    pub fn rebuild_payload(&mut self) -> Result<(), AntiparserError> {
        let payload = build_payload(self.entries.iter().map(|(_, object)| object), &mut self.rng)?;
        debug!(len = payload.len(), "payload rebuilt");
        self.payload = payload;
        Ok(())
    }

    /// Applies `edit` to one member, then rebuilds the payload.
    ///
    /// The edited object is checked with [`DataField::validate`] afterwards,
    /// though setters used inside `edit` already reject invalid values. If
    /// `edit`, validation or the rebuild fails, the member is restored to its
    /// state before the call and the previous payload stays in place.
    pub fn modify<F>(&mut self, id: ObjectId, edit: F) -> Result<(), AntiparserError>
    where
        F: FnOnce(&mut DataObject) -> Result<(), AntiparserError>,
    {
        let index = self.index_of(id)?;
        let previous = self.entries[index].1.clone();
        let outcome = match edit(&mut self.entries[index].1) {
            Ok(()) => self.entries[index].1.validate(),
            Err(e) => Err(e),
        };
        if let Err(e) = outcome.and_then(|()| self.rebuild_payload()) {
            self.entries[index].1 = previous;
            return Err(e);
        }
        Ok(())
    }

    fn index_of(&self, id: ObjectId) -> Result<usize, AntiparserError> {
        self.entries
            .iter()
            .position(|(entry_id, _)| *entry_id == id)
            .ok_or(AntiparserError::NotFound(id))
    }

    /// The payload of the latest build.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn get(&self, id: ObjectId) -> Option<&DataObject> {
        self.entries
            .iter()
            .find(|(entry_id, _)| *entry_id == id)
            .map(|(_, object)| object)
    }

    /// The members in payload order.
    pub fn objects(&self) -> impl Iterator<Item = (ObjectId, &DataObject)> {
        self.entries.iter().map(|(id, object)| (*id, object))
    }

    pub fn ids(&self) -> Vec<ObjectId> {
        self.entries.iter().map(|(id, _)| *id).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Structured debug views of every member, in payload order.
    pub fn describe(&self) -> Vec<(ObjectId, Vec<(&'static str, String)>)> {
        self.entries
            .iter()
            .map(|(id, object)| (*id, object.debug_view()))
            .collect()
    }

    /// Emits one `debug` event per member listing all of its fields.
    pub fn log_objects(&self) {
        for (id, view) in self.describe() {
            let fields: Vec<String> = view.iter().map(|(k, v)| format!("{k}={v}")).collect();
            debug!(%id, "{}", fields.join(" "));
        }
    }

    /// Replaces the cached payload without re-running the codec. Used when a
    /// snapshot restores the exact bytes it was exported with.
    pub(crate) fn restore_payload(&mut self, payload: Vec<u8>) {
        self.payload = payload;
    }
}

impl<R: Rng> fmt::Debug for Container<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("entries", &self.entries)
            .field("payload_len", &self.payload.len())
            .finish()
    }
}
