use std::collections::BTreeMap;

use crate::{
    error::Result,
    object::{hash, ObjectKind},
    object_id::ObjectId,
};

use super::ObjectStore;

/// An [`ObjectStore`] which keeps uncompressed payloads in memory.
#[derive(Debug, Default)]
pub struct InMemoryObjectStore {
    objects: BTreeMap<ObjectId, (ObjectKind, Vec<u8>)>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl ObjectStore for InMemoryObjectStore {
    fn has(&self, id: ObjectId) -> Result<bool> {
        Ok(self.objects.contains_key(&id))
    }

    fn read_raw(&self, id: ObjectId) -> Result<Option<(ObjectKind, Vec<u8>)>> {
        Ok(self.objects.get(&id).cloned())
    }

    fn insert_raw(&mut self, kind: ObjectKind, payload: &[u8]) -> Result<ObjectId> {
        let id = hash(kind, payload);
        self.objects
            .entry(id)
            .or_insert_with(|| (kind, Vec::from(payload)));
        Ok(id)
    }
}

#[test]
fn test_in_memory_object_store() {
    use crate::object::Object;

    let mut store = InMemoryObjectStore::new();
    let id = store.insert(&Object::Blob(b"hello, world".to_vec())).unwrap();
    assert_eq!(store.insert_raw(ObjectKind::Blob, b"hello, world").unwrap(), id);
    assert_eq!(store.len(), 1);
    assert!(store.has(id).unwrap());
    assert_eq!(
        store.read(id).unwrap(),
        Some(Object::Blob(b"hello, world".to_vec()))
    );
    assert_eq!(store.read(hash(ObjectKind::Tree, b"")).unwrap(), None);
}

#[test]
fn test_read_commit_checks_type() {
    use crate::error::Error;

    let mut store = InMemoryObjectStore::new();
    let blob = store.insert_raw(ObjectKind::Blob, b"data").unwrap();
    match store.read_commit(blob) {
        Err(Error::UnexpectedType { actual, .. }) => assert_eq!(actual, ObjectKind::Blob),
        other => panic!("unexpected {:?}", other),
    }
    let missing = hash(ObjectKind::Commit, b"");
    match store.read_commit(missing) {
        Err(Error::ObjectNotFound(id)) => assert_eq!(id, missing),
        other => panic!("unexpected {:?}", other),
    }
}
