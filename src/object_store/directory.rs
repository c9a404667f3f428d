use std::{
    fs::{create_dir_all, read_dir, File},
    io::{ErrorKind, Read, Write},
    path::PathBuf,
};

use flate2::{read::ZlibDecoder, write::ZlibEncoder, Compression};

use crate::{
    error::{Error, Result},
    object::{frame, unframe, ObjectKind},
    object_id::ObjectId,
};

use super::ObjectStore;

/// A persistent [`ObjectStore`] stored in a directory,
/// using the first two hexadecimal characters of the [`ObjectId`]
/// to determine which directory to place the object in
/// and creating a file with the rest of the hexadecimal characters
/// as the file name. Files hold the zlib compressed framed object.
#[derive(Debug, Clone)]
pub struct DirectoryObjectStore {
    root: PathBuf,
}

impl DirectoryObjectStore {
    pub fn new(root: PathBuf) -> Result<Self> {
        if !root.try_exists()? {
            log::info!("creating directory store root: {:?}", root);
            create_dir_all(&root)?;
        }
        Ok(Self { root })
    }

    fn path(&self, id: ObjectId) -> PathBuf {
        let (subdir, filename) = id.fan_out();
        self.root.join(subdir).join(filename)
    }

    /// Every stored object whose hex digest starts with `prefix`.
    /// The prefix must be at least two characters long.
    pub fn find_prefix(&self, prefix: &str) -> Result<Vec<ObjectId>> {
        if prefix.len() < 2 || !prefix.is_char_boundary(2) {
            return Ok(Vec::new());
        }
        let (subdir, rest) = prefix.split_at(2);
        let entries = match read_dir(self.root.join(subdir)) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let mut found = Vec::new();
        for entry in entries {
            let name = entry?.file_name();
            let Some(name) = name.to_str() else { continue };
            if !name.starts_with(rest) {
                continue;
            }
            if let Ok(id) = format!("{}{}", subdir, name).parse::<ObjectId>() {
                found.push(id);
            }
        }
        found.sort();
        log::debug!("{} objects match prefix {}", found.len(), prefix);
        Ok(found)
    }
}

impl ObjectStore for DirectoryObjectStore {
    fn has(&self, id: ObjectId) -> Result<bool> {
        log::info!("checking whether {} is contained in {:?}", id, self.root);
        Ok(self.path(id).try_exists()?)
    }

    fn read_raw(&self, id: ObjectId) -> Result<Option<(ObjectKind, Vec<u8>)>> {
        log::info!("reading {} from {:?}", id, self.root);
        let mut compressed = Vec::new();
        match File::options().read(true).open(self.path(id)) {
            Ok(mut f) => {
                f.read_to_end(&mut compressed)?;
            }
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        }

        let mut framed = Vec::new();
        ZlibDecoder::new(compressed.as_slice())
            .read_to_end(&mut framed)
            .map_err(|err| Error::MalformedObject {
                id,
                reason: format!("cannot decompress: {}", err),
            })?;
        let (kind, payload) = unframe(id, &framed)?;
        Ok(Some((kind, payload.to_vec())))
    }

    fn insert_raw(&mut self, kind: ObjectKind, payload: &[u8]) -> Result<ObjectId> {
        let framed = frame(kind, payload);
        let id = ObjectId::digest(&framed);
        log::info!("inserting {} {} into {:?}", kind, id, self.root);
        let path = self.path(id);
        if path.try_exists()? {
            log::info!("{:?} already exists", path);
            return Ok(id);
        }
        if let Some(subdir_path) = path.parent() {
            log::debug!("creating subdir path {:?} in {:?}", subdir_path, self.root);
            create_dir_all(subdir_path)?;
        }

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&framed)?;
        let compressed = encoder.finish()?;
        match File::options().write(true).create_new(true).open(&path) {
            Ok(mut f) => f.write_all(&compressed)?,
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                log::info!("{:?} was written concurrently", path);
            }
            Err(err) => return Err(err.into()),
        }
        Ok(id)
    }
}

#[test]
fn test_directory_object_store() {
    let tempdir = tempfile::tempdir().unwrap();
    let mut store = DirectoryObjectStore::new(tempdir.path().join("objects")).unwrap();
    let id = store.insert_raw(ObjectKind::Blob, b"hello").unwrap();
    assert_eq!(id.to_hex(), "b6fc4c620b67d95f953a5c1c1230aaab5db5a1b0");
    assert!(store.has(id).unwrap());
    assert!(tempdir
        .path()
        .join("objects/b6/fc4c620b67d95f953a5c1c1230aaab5db5a1b0")
        .is_file());
    assert_eq!(
        store.read_raw(id).unwrap(),
        Some((ObjectKind::Blob, b"hello".to_vec()))
    );
}

#[test]
fn test_stored_file_is_zlib_framed() {
    let tempdir = tempfile::tempdir().unwrap();
    let mut store = DirectoryObjectStore::new(tempdir.path().into()).unwrap();
    let id = store.insert_raw(ObjectKind::Blob, b"hello").unwrap();
    let compressed = std::fs::read(store.path(id)).unwrap();
    let mut framed = Vec::new();
    ZlibDecoder::new(compressed.as_slice())
        .read_to_end(&mut framed)
        .unwrap();
    assert_eq!(framed, b"blob 5\0hello");
}

#[test]
fn test_insert_is_write_once() {
    let tempdir = tempfile::tempdir().unwrap();
    let mut store = DirectoryObjectStore::new(tempdir.path().into()).unwrap();
    let first = store.insert_raw(ObjectKind::Blob, b"same").unwrap();
    let modified = std::fs::metadata(store.path(first)).unwrap().modified().unwrap();
    let second = store.insert_raw(ObjectKind::Blob, b"same").unwrap();
    assert_eq!(first, second);
    assert_eq!(
        std::fs::metadata(store.path(first)).unwrap().modified().unwrap(),
        modified
    );
    let subdir = store.path(first).parent().unwrap().to_path_buf();
    assert_eq!(read_dir(subdir).unwrap().count(), 1);
}

#[test]
fn test_missing_object_is_none() {
    let tempdir = tempfile::tempdir().unwrap();
    let store = DirectoryObjectStore::new(tempdir.path().into()).unwrap();
    let id = crate::object::hash(ObjectKind::Blob, b"never written");
    assert!(!store.has(id).unwrap());
    assert_eq!(store.read_raw(id).unwrap(), None);
}

#[test]
fn test_declared_length_mismatch_is_malformed() {
    let tempdir = tempfile::tempdir().unwrap();
    let mut store = DirectoryObjectStore::new(tempdir.path().into()).unwrap();
    let id = store.insert_raw(ObjectKind::Blob, b"hello").unwrap();
    for forged in [&b"blob 4\0hello"[..], b"blob 6\0hello"] {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(forged).unwrap();
        std::fs::write(store.path(id), encoder.finish().unwrap()).unwrap();
        match store.read_raw(id) {
            Err(Error::MalformedObject { id: bad, .. }) => assert_eq!(bad, id),
            other => panic!("unexpected {:?}", other),
        }
    }
}

#[test]
fn test_truncated_file_is_malformed() {
    let tempdir = tempfile::tempdir().unwrap();
    let mut store = DirectoryObjectStore::new(tempdir.path().into()).unwrap();
    let id = store.insert_raw(ObjectKind::Blob, &[7u8; 4096]).unwrap();
    let compressed = std::fs::read(store.path(id)).unwrap();
    std::fs::write(store.path(id), &compressed[..compressed.len() / 2]).unwrap();
    assert!(matches!(
        store.read_raw(id),
        Err(Error::MalformedObject { .. })
    ));
}

#[test]
fn test_find_prefix() {
    let tempdir = tempfile::tempdir().unwrap();
    let mut store = DirectoryObjectStore::new(tempdir.path().into()).unwrap();
    let id = store.insert_raw(ObjectKind::Blob, b"hello").unwrap();
    assert_eq!(store.find_prefix("b6fc").unwrap(), vec![id]);
    assert_eq!(store.find_prefix("b6fd").unwrap(), vec![]);
    assert_eq!(store.find_prefix("00").unwrap(), vec![]);
}
