use crate::{
    error::{Error, Result},
    kvlm::Kvlm,
    object_id::ObjectId,
};

/// A particular commit: the tree it records, the commits it evolved from,
/// and whatever other headers it was written with.
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct Commit {
    tree: ObjectId,
    parents: Vec<ObjectId>,
    kvlm: Kvlm,
}

impl Commit {
    /// Builds a commit with its headers in the usual order: `tree`, then
    /// every `parent`. Further headers can be added with [`Commit::with_header`].
    pub fn new(tree: ObjectId, parents: Vec<ObjectId>, message: impl Into<Vec<u8>>) -> Self {
        let mut kvlm = Kvlm::new(message);
        kvlm.insert("tree", tree.to_hex());
        for parent in &parents {
            kvlm.insert("parent", parent.to_hex());
        }
        Commit {
            tree,
            parents,
            kvlm,
        }
    }

    /// Appends an opaque header such as `author` or `committer`.
    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.kvlm.insert(key, value);
        self
    }

    pub fn tree(&self) -> ObjectId {
        self.tree
    }

    /// The parents in the order they were declared. A root commit has none.
    pub fn parents(&self) -> &[ObjectId] {
        &self.parents
    }

    pub fn message(&self) -> &[u8] {
        self.kvlm.message()
    }

    /// The first line of the message.
    pub fn summary(&self) -> String {
        let message = String::from_utf8_lossy(self.message());
        message.trim().lines().next().unwrap_or("").to_string()
    }

    pub fn kvlm(&self) -> &Kvlm {
        &self.kvlm
    }
}

impl TryFrom<Kvlm> for Commit {
    type Error = Error;

    fn try_from(kvlm: Kvlm) -> Result<Self> {
        let tree = kvlm
            .first(b"tree")
            .ok_or_else(|| Error::MalformedKvlm(String::from("commit has no tree")))?;
        let tree = ObjectId::try_from(tree)?;
        let parents = kvlm
            .get_all(b"parent")
            .iter()
            .map(|parent| ObjectId::try_from(parent.as_slice()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Commit {
            tree,
            parents,
            kvlm,
        })
    }
}

#[test]
fn test_new_commit_layout() {
    let tree = crate::object::hash(crate::object::ObjectKind::Tree, b"");
    let parent = crate::object::hash(crate::object::ObjectKind::Blob, b"not really a commit");
    let commit = Commit::new(tree, vec![parent], "second\n\nlonger body\n")
        .with_header("author", "A U Thor <author@example.com> 0 +0000");
    let expected = format!(
        "tree {}\nparent {}\nauthor A U Thor <author@example.com> 0 +0000\n\nsecond\n\nlonger body\n",
        tree, parent
    );
    assert_eq!(commit.kvlm().serialize(), expected.as_bytes());
    assert_eq!(commit.summary(), "second");
    assert_eq!(commit.parents(), &[parent]);
}

#[test]
fn test_from_kvlm() {
    let raw = b"tree 4b825dc642cb6eb9a060e54bf8d69288fbee4904\n\
parent e69de29bb2d1d6434b8b29ae775ad8c2e48c5391\n\
parent b6fc4c620b67d95f953a5c1c1230aaab5db5a1b0\n\
\n\
merge\n";
    let commit = Commit::try_from(Kvlm::parse(raw).unwrap()).unwrap();
    assert_eq!(
        commit.tree().to_hex(),
        "4b825dc642cb6eb9a060e54bf8d69288fbee4904"
    );
    assert_eq!(commit.parents().len(), 2);
    assert_eq!(commit.summary(), "merge");
}

#[test]
fn test_commit_requires_tree() {
    let kvlm = Kvlm::parse(b"author nobody\n\nno tree\n").unwrap();
    match Commit::try_from(kvlm) {
        Err(Error::MalformedKvlm(_)) => {}
        other => panic!("unexpected {:?}", other),
    }
    let kvlm = Kvlm::parse(b"tree nothex\n\nbad tree\n").unwrap();
    assert!(Commit::try_from(kvlm).is_err());
}
