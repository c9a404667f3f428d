use std::{fmt::Display, str::FromStr};

use crate::{
    commit::Commit,
    error::{Error, Result},
    kvlm::Kvlm,
    object_id::ObjectId,
};

/// The four object types a store can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Blob,
    Tree,
    Commit,
    Tag,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Blob => "blob",
            ObjectKind::Tree => "tree",
            ObjectKind::Commit => "commit",
            ObjectKind::Tag => "tag",
        }
    }

    /// Parses the type token of a stored object's header.
    pub fn from_token(token: &[u8]) -> Result<Self> {
        match token {
            b"blob" => Ok(ObjectKind::Blob),
            b"tree" => Ok(ObjectKind::Tree),
            b"commit" => Ok(ObjectKind::Commit),
            b"tag" => Ok(ObjectKind::Tag),
            _ => Err(Error::UnknownObjectType(
                String::from_utf8_lossy(token).into_owned(),
            )),
        }
    }
}

impl Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses a type name supplied for writing, where an unrecognised name
/// means there is no way to serialize the object.
impl FromStr for ObjectKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ObjectKind::from_token(s.as_bytes())
            .map_err(|_| Error::UnsupportedObjectType(s.to_string()))
    }
}

/// A decoded object. Only commits carry structure; the other kinds are
/// kept as the bytes they were stored with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Object {
    Blob(Vec<u8>),
    Tree(Vec<u8>),
    Commit(Commit),
    Tag(Vec<u8>),
}

impl Object {
    pub fn kind(&self) -> ObjectKind {
        match self {
            Object::Blob(_) => ObjectKind::Blob,
            Object::Tree(_) => ObjectKind::Tree,
            Object::Commit(_) => ObjectKind::Commit,
            Object::Tag(_) => ObjectKind::Tag,
        }
    }

    /// The payload bytes, without the header.
    pub fn serialize(&self) -> Vec<u8> {
        match self {
            Object::Blob(data) | Object::Tree(data) | Object::Tag(data) => data.clone(),
            Object::Commit(commit) => commit.kvlm().serialize(),
        }
    }

    pub fn deserialize(kind: ObjectKind, payload: &[u8]) -> Result<Self> {
        Ok(match kind {
            ObjectKind::Blob => Object::Blob(payload.to_vec()),
            ObjectKind::Tree => Object::Tree(payload.to_vec()),
            ObjectKind::Commit => Object::Commit(Commit::try_from(Kvlm::parse(payload)?)?),
            ObjectKind::Tag => Object::Tag(payload.to_vec()),
        })
    }

    pub fn id(&self) -> ObjectId {
        hash(self.kind(), &self.serialize())
    }
}

/// Lays out `{type} {len}\0{payload}`.
pub fn frame(kind: ObjectKind, payload: &[u8]) -> Vec<u8> {
    let header = format!("{} {}\0", kind, payload.len());
    let mut framed = Vec::with_capacity(header.len() + payload.len());
    framed.extend_from_slice(header.as_bytes());
    framed.extend_from_slice(payload);
    framed
}

/// The digest of an object, computed over its framed bytes.
pub fn hash(kind: ObjectKind, payload: &[u8]) -> ObjectId {
    ObjectId::digest(&frame(kind, payload))
}

/// Splits framed bytes back into type and payload, checking the declared
/// length against the bytes actually present.
pub fn unframe(id: ObjectId, framed: &[u8]) -> Result<(ObjectKind, &[u8])> {
    let malformed = |reason: String| Error::MalformedObject { id, reason };

    let space = framed
        .iter()
        .position(|&b| b == b' ')
        .ok_or_else(|| malformed(String::from("missing type token")))?;
    let null = framed[space..]
        .iter()
        .position(|&b| b == 0)
        .map(|offset| space + offset)
        .ok_or_else(|| malformed(String::from("missing header terminator")))?;

    let declared: usize = std::str::from_utf8(&framed[space + 1..null])
        .ok()
        .filter(|len| !len.is_empty() && len.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|len| len.parse().ok())
        .ok_or_else(|| malformed(String::from("invalid length")))?;
    let payload = &framed[null + 1..];
    if payload.len() != declared {
        return Err(malformed(format!(
            "length mismatch: header says {} bytes, found {}",
            declared,
            payload.len()
        )));
    }

    let kind = ObjectKind::from_token(&framed[..space])?;
    Ok((kind, payload))
}

#[test]
fn test_frame_and_hash_blob() {
    assert_eq!(frame(ObjectKind::Blob, b"hello"), b"blob 5\0hello");
    assert_eq!(
        hash(ObjectKind::Blob, b"hello").to_hex(),
        "b6fc4c620b67d95f953a5c1c1230aaab5db5a1b0"
    );
}

#[test]
fn test_same_bytes_different_types() {
    assert_ne!(hash(ObjectKind::Blob, b""), hash(ObjectKind::Tree, b""));
    assert_eq!(
        hash(ObjectKind::Tree, b"").to_hex(),
        "4b825dc642cb6eb9a060e54bf8d69288fbee4904"
    );
}

#[test]
fn test_unframe() {
    let id = hash(ObjectKind::Blob, b"hello");
    let (kind, payload) = unframe(id, b"blob 5\0hello").unwrap();
    assert_eq!(kind, ObjectKind::Blob);
    assert_eq!(payload, b"hello");

    for bad in [
        &b"blob 4\0hello"[..],
        b"blob 6\0hello",
        b"blob \0hello",
        b"blob 5hello",
        b"blob",
    ] {
        match unframe(id, bad) {
            Err(Error::MalformedObject { .. }) => {}
            other => panic!("{:?} unframed as {:?}", String::from_utf8_lossy(bad), other),
        }
    }

    match unframe(id, b"frob 5\0hello") {
        Err(Error::UnknownObjectType(token)) => assert_eq!(token, "frob"),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_kind_names() {
    assert_eq!("tag".parse::<ObjectKind>().unwrap(), ObjectKind::Tag);
    match "frob".parse::<ObjectKind>() {
        Err(Error::UnsupportedObjectType(name)) => assert_eq!(name, "frob"),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_commit_payload_round_trips() {
    let payload = b"tree 4b825dc642cb6eb9a060e54bf8d69288fbee4904\n\ninitial commit\n";
    let object = Object::deserialize(ObjectKind::Commit, payload).unwrap();
    assert_eq!(object.kind(), ObjectKind::Commit);
    assert_eq!(object.serialize(), payload);
    assert_eq!(object.id(), hash(ObjectKind::Commit, payload));
}
