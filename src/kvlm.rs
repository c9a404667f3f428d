use crate::error::{Error, Result};

/// The value stored under a key: repeated keys (like `parent` on a merge
/// commit) are promoted from [`Value::Single`] to [`Value::Many`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Single(Vec<u8>),
    Many(Vec<Vec<u8>>),
}

impl Value {
    /// All the values in declaration order.
    pub fn values(&self) -> &[Vec<u8>] {
        match self {
            Value::Single(v) => std::slice::from_ref(v),
            Value::Many(vs) => vs,
        }
    }

    fn push(&mut self, value: Vec<u8>) {
        match self {
            Value::Single(first) => {
                let first = std::mem::take(first);
                *self = Value::Many(vec![first, value]);
            }
            Value::Many(vs) => vs.push(value),
        }
    }
}

/// A key-value list with a trailing message, as found in commit objects.
///
/// Field order is insertion order, so a parsed document serializes back
/// to the bytes it came from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Kvlm {
    fields: Vec<(Vec<u8>, Value)>,
    message: Vec<u8>,
}

impl Kvlm {
    pub fn new(message: impl Into<Vec<u8>>) -> Self {
        Self {
            fields: Vec::new(),
            message: message.into(),
        }
    }

    pub fn message(&self) -> &[u8] {
        &self.message
    }

    pub fn get(&self, key: &[u8]) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(k, _)| k.as_slice() == key)
            .map(|(_, v)| v)
    }

    /// Every value under `key`, or an empty slice if the key is absent.
    pub fn get_all(&self, key: &[u8]) -> &[Vec<u8>] {
        self.get(key).map(Value::values).unwrap_or(&[])
    }

    pub fn first(&self, key: &[u8]) -> Option<&[u8]> {
        self.get_all(key).first().map(Vec::as_slice)
    }

    /// Adds a value under `key`. An existing key keeps its position and
    /// gains another value; it is never overwritten.
    pub fn insert(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        let key = key.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => existing.push(value),
            None => self.fields.push((key, Value::Single(value))),
        }
    }

    pub fn fields(&self) -> impl Iterator<Item = (&[u8], &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_slice(), v))
    }

    pub fn parse(raw: &[u8]) -> Result<Self> {
        let mut doc = Kvlm::default();
        let mut start = 0;
        loop {
            let rest = &raw[start..];
            let space = rest.iter().position(|&b| b == b' ');
            let newline = rest.iter().position(|&b| b == b'\n');

            let space = match (space, newline) {
                (Some(space), Some(newline)) if space < newline => space,
                (_, Some(0)) => {
                    doc.message = rest[1..].to_vec();
                    return Ok(doc);
                }
                (_, Some(_)) => {
                    return Err(malformed(start, "line has no key"));
                }
                (Some(_), None) => {
                    return Err(malformed(start, "field is not terminated by a newline"));
                }
                (None, None) => {
                    return Err(malformed(start, "missing blank line before message"));
                }
            };
            if space == 0 {
                return Err(malformed(start, "empty key"));
            }

            // A newline followed by a space continues the value.
            let mut end = space;
            loop {
                end = match rest[end + 1..].iter().position(|&b| b == b'\n') {
                    Some(offset) => end + 1 + offset,
                    None => return Err(malformed(start, "field is not terminated by a newline")),
                };
                if rest.get(end + 1) != Some(&b' ') {
                    break;
                }
            }

            let key = rest[..space].to_vec();
            let value = unfold(&rest[space + 1..end]);
            log::trace!("kvlm field {:?}", String::from_utf8_lossy(&key));
            doc.insert(key, value);
            start += end + 1;
        }
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for (key, value) in &self.fields {
            for v in value.values() {
                out.extend_from_slice(key);
                out.push(b' ');
                out.extend_from_slice(&fold(v));
                out.push(b'\n');
            }
        }
        out.push(b'\n');
        out.extend_from_slice(&self.message);
        out
    }
}

fn malformed(offset: usize, reason: &str) -> Error {
    Error::MalformedKvlm(format!("{} at byte {}", reason, offset))
}

/// Indents every embedded newline with a space.
fn fold(value: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(value.len());
    for &b in value {
        out.push(b);
        if b == b'\n' {
            out.push(b' ');
        }
    }
    out
}

/// Drops the space after every embedded newline.
fn unfold(value: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(value.len());
    let mut i = 0;
    while i < value.len() {
        out.push(value[i]);
        if value[i] == b'\n' && value.get(i + 1) == Some(&b' ') {
            i += 1;
        }
        i += 1;
    }
    out
}

#[cfg(test)]
const SAMPLE: &[u8] = concat!(
    "tree 29ff16c9c14e2652b22f8b78bb08a5a07930c147\n",
    "parent 206941306e8a8af65b66eaaaea388a7ae24d49a0\n",
    "author Thibault Polge <thibault@thb.lt> 1527025023 +0200\n",
    "committer Thibault Polge <thibault@thb.lt> 1527025044 +0200\n",
    "gpgsig -----BEGIN PGP SIGNATURE-----\n",
    " \n",
    " iQIzBAABCAAdFiEExwXquOM8bWb4Q2zVGxM2FxoLkGQFAlsEjZQACgkQGxM2FxoL\n",
    " kGQdcBAAqPP+ln4nGDd2gETXjvOpOxLzIMEw4A9gU6CzWzm+oB8mEIKyaH0UFIPh\n",
    " -----END PGP SIGNATURE-----\n",
    "\n",
    "Create first draft\n",
)
.as_bytes();

#[test]
fn test_parse_sample_commit() {
    let doc = Kvlm::parse(SAMPLE).unwrap();
    assert_eq!(
        doc.first(b"tree"),
        Some(&b"29ff16c9c14e2652b22f8b78bb08a5a07930c147"[..])
    );
    assert_eq!(doc.get_all(b"parent").len(), 1);
    let sig = doc.first(b"gpgsig").unwrap();
    assert!(sig.starts_with(b"-----BEGIN PGP SIGNATURE-----\n\niQIz"));
    assert!(sig.ends_with(b"\n-----END PGP SIGNATURE-----"));
    assert_eq!(doc.message(), b"Create first draft\n");
    let keys: Vec<&[u8]> = doc.fields().map(|(k, _)| k).collect();
    assert_eq!(
        keys,
        vec![&b"tree"[..], b"parent", b"author", b"committer", b"gpgsig"]
    );
}

#[test]
fn test_serialize_reproduces_input() {
    let doc = Kvlm::parse(SAMPLE).unwrap();
    assert_eq!(doc.serialize(), SAMPLE);
}

#[test]
fn test_repeated_keys_are_promoted() {
    let raw = b"tree t\nparent a\nparent b\nparent c\n\nmerge\n";
    let doc = Kvlm::parse(raw).unwrap();
    assert_eq!(
        doc.get(b"parent"),
        Some(&Value::Many(vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]))
    );
    assert_eq!(doc.get(b"tree"), Some(&Value::Single(b"t".to_vec())));
    assert_eq!(doc.serialize(), raw);
}

#[test]
fn test_empty_message_and_no_fields() {
    let doc = Kvlm::parse(b"\n").unwrap();
    assert_eq!(doc.fields().count(), 0);
    assert_eq!(doc.message(), b"");
    assert_eq!(doc.serialize(), b"\n");
}

#[test]
fn test_malformed_documents() {
    for raw in [
        &b"tree abc\n"[..],
        b"tree abc",
        b"tree abc\nnokey\n\nmsg",
        b" leading space\n\nmsg",
        b"",
    ] {
        match Kvlm::parse(raw) {
            Err(Error::MalformedKvlm(_)) => {}
            other => panic!("{:?} parsed as {:?}", String::from_utf8_lossy(raw), other),
        }
    }
}

#[test]
fn test_fold_and_unfold() {
    assert_eq!(fold(b"a\nb\n"), b"a\n b\n ");
    assert_eq!(unfold(b"a\n b\n "), b"a\nb\n");
    assert_eq!(unfold(b"a\n  b"), b"a\n b");
}

#[cfg(test)]
mod properties {
    use super::Kvlm;
    use proptest::prelude::*;

    fn document() -> impl Strategy<Value = Kvlm> {
        (
            prop::collection::vec(("[a-z]{1,8}", "[ -~\n]{0,24}"), 0..8),
            "[ -~\n]{0,64}",
        )
            .prop_map(|(fields, message)| {
                let mut doc = Kvlm::new(message);
                for (key, value) in fields {
                    doc.insert(key, value);
                }
                doc
            })
    }

    proptest! {
        #[test]
        fn parse_inverts_serialize(doc in document()) {
            let bytes = doc.serialize();
            prop_assert_eq!(Kvlm::parse(&bytes).unwrap(), doc);
        }
    }
}
