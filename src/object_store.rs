use crate::{
    commit::Commit,
    error::{Error, Result},
    object::{Object, ObjectKind},
    object_id::ObjectId,
};

pub mod directory;
pub mod in_memory;

pub trait ObjectStore {
    fn has(&self, id: ObjectId) -> Result<bool>;

    /// Reads the type and payload stored under `id`, or `None` if there
    /// is no such object.
    fn read_raw(&self, id: ObjectId) -> Result<Option<(ObjectKind, Vec<u8>)>>;

    /// Stores a payload under the digest of its framed bytes. Writing an
    /// object which is already present changes nothing.
    fn insert_raw(&mut self, kind: ObjectKind, payload: &[u8]) -> Result<ObjectId>;

    fn read(&self, id: ObjectId) -> Result<Option<Object>> {
        match self.read_raw(id)? {
            Some((kind, payload)) => Ok(Some(Object::deserialize(kind, &payload)?)),
            None => Ok(None),
        }
    }

    fn insert(&mut self, object: &Object) -> Result<ObjectId> {
        self.insert_raw(object.kind(), &object.serialize())
    }

    /// Reads an object which must exist and must be a commit.
    fn read_commit(&self, id: ObjectId) -> Result<Commit> {
        match self.read(id)? {
            Some(Object::Commit(commit)) => Ok(commit),
            Some(other) => Err(Error::UnexpectedType {
                id,
                expected: ObjectKind::Commit,
                actual: other.kind(),
            }),
            None => Err(Error::ObjectNotFound(id)),
        }
    }
}
