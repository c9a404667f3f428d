use std::path::PathBuf;

use derive_more::{Display, From};

use crate::{object::ObjectKind, object_id::ObjectId};

/// Everything that can go wrong while locating a repository or
/// reading and writing its objects.
#[derive(Debug, Display, From)]
pub enum Error {
    #[from]
    #[display(fmt = "I/O error: {}", _0)]
    Io(std::io::Error),
    #[from]
    #[display(fmt = "JSON error: {}", _0)]
    Json(serde_json::Error),
    #[display(fmt = "not a repository (or any of the parent directories): {:?}", _0)]
    NotARepository(PathBuf),
    #[display(fmt = "configuration file missing: {:?}", _0)]
    MissingConfig(PathBuf),
    #[display(fmt = "invalid configuration at line {}: {}", line, reason)]
    InvalidConfig { line: usize, reason: String },
    #[display(fmt = "unsupported repositoryformatversion {}", _0)]
    UnsupportedSchema(i64),
    #[display(fmt = "{:?} is not a directory", _0)]
    NotADirectory(PathBuf),
    #[display(fmt = "{:?} is not empty", _0)]
    DestinationNotEmpty(PathBuf),
    #[display(fmt = "object not found: {}", _0)]
    ObjectNotFound(ObjectId),
    #[display(fmt = "malformed object {}: {}", id, reason)]
    MalformedObject { id: ObjectId, reason: String },
    #[display(fmt = "unknown object type {:?}", _0)]
    UnknownObjectType(String),
    #[display(fmt = "unsupported object type for serialization {:?}", _0)]
    UnsupportedObjectType(String),
    #[display(fmt = "malformed key-value list: {}", _0)]
    MalformedKvlm(String),
    #[display(fmt = "object {} is a {}, expected a {}", id, actual, expected)]
    UnexpectedType {
        id: ObjectId,
        expected: ObjectKind,
        actual: ObjectKind,
    },
    #[display(fmt = "invalid object id {:?}", _0)]
    InvalidObjectId(String),
    #[display(fmt = "no object named {:?}", _0)]
    UnresolvedName(String),
    #[display(fmt = "short object id {} is ambiguous", name)]
    AmbiguousName {
        name: String,
        candidates: Vec<ObjectId>,
    },
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Json(err) => Some(err),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
