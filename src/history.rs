use std::{collections::BTreeSet, fmt::Display};

use serde::Serialize;

use crate::{error::Result, object_id::ObjectId, object_store::ObjectStore};

/// One commit reached by [`walk`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Visit {
    pub id: ObjectId,
    /// First line of the commit message.
    pub summary: String,
    pub parents: Vec<ObjectId>,
}

/// Visits every commit reachable from `start` through `parent` links,
/// depth first with parents in declared order. Commits already in
/// `visited` are skipped, so shared ancestors are reported once.
pub fn walk<S: ObjectStore>(
    store: &S,
    start: ObjectId,
    visited: &mut BTreeSet<ObjectId>,
) -> Result<Vec<Visit>> {
    let mut visits = Vec::new();
    let mut stack = vec![start];
    while let Some(id) = stack.pop() {
        if !visited.insert(id) {
            continue;
        }
        log::debug!("visiting commit {}", id);
        let commit = store.read_commit(id)?;
        stack.extend(commit.parents().iter().rev().copied());
        visits.push(Visit {
            id,
            summary: commit.summary(),
            parents: commit.parents().to_vec(),
        });
    }
    Ok(visits)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Node {
    pub id: ObjectId,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Edge {
    pub child: ObjectId,
    pub parent: ObjectId,
}

/// The history reachable from a commit as a directed graph: one node
/// per commit, one edge per parent link. Root commits have no outgoing edges.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommitGraph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl CommitGraph {
    pub fn build<S: ObjectStore>(store: &S, start: ObjectId) -> Result<Self> {
        let visits = walk(store, start, &mut BTreeSet::new())?;
        Ok(CommitGraph::from(visits))
    }
}

/// Renders the graph in Graphviz DOT syntax.
impl Display for CommitGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "digraph log{{")?;
        writeln!(f, "  node[shape=rect]")?;
        for node in &self.nodes {
            let label = node.label.replace('\\', "\\\\").replace('"', "\\\"");
            writeln!(f, "  c_{} [label=\"{}\"]", node.id, label)?;
        }
        for edge in &self.edges {
            writeln!(f, "  c_{} -> c_{};", edge.child, edge.parent)?;
        }
        writeln!(f, "}}")
    }
}

impl From<Vec<Visit>> for CommitGraph {
    fn from(visits: Vec<Visit>) -> Self {
        let mut graph = CommitGraph::default();
        for visit in visits {
            for &parent in &visit.parents {
                graph.edges.push(Edge {
                    child: visit.id,
                    parent,
                });
            }
            graph.nodes.push(Node {
                id: visit.id,
                label: format!("{}: {}", visit.id.short(), visit.summary),
            });
        }
        graph
    }
}

#[cfg(test)]
fn commit(
    store: &mut crate::object_store::in_memory::InMemoryObjectStore,
    parents: Vec<ObjectId>,
    message: &str,
) -> ObjectId {
    use crate::{commit::Commit, object::Object};

    let tree = crate::object::hash(crate::object::ObjectKind::Tree, b"");
    store
        .insert(&Object::Commit(Commit::new(tree, parents, message)))
        .unwrap()
}

#[test]
fn test_single_root_commit() {
    let mut store = crate::object_store::in_memory::InMemoryObjectStore::new();
    let root = commit(&mut store, vec![], "initial commit\n");
    let graph = CommitGraph::build(&store, root).unwrap();
    assert_eq!(graph.nodes.len(), 1);
    assert!(graph.edges.is_empty());
    assert_eq!(
        graph.nodes[0].label,
        format!("{}: initial commit", root.short())
    );
}

#[test]
fn test_diamond_visits_shared_ancestor_once() {
    let mut store = crate::object_store::in_memory::InMemoryObjectStore::new();
    let base = commit(&mut store, vec![], "base\n");
    let left = commit(&mut store, vec![base], "left\n");
    let right = commit(&mut store, vec![base], "right\n");
    let merge = commit(&mut store, vec![left, right], "merge\n");

    let visits = walk(&store, merge, &mut BTreeSet::new()).unwrap();
    let order: Vec<ObjectId> = visits.iter().map(|v| v.id).collect();
    assert_eq!(order, vec![merge, left, base, right]);

    let graph = CommitGraph::from(visits);
    assert_eq!(graph.nodes.len(), 4);
    assert_eq!(graph.edges.len(), 4);
    assert_eq!(
        graph.edges[0],
        Edge {
            child: merge,
            parent: left
        }
    );
}

#[test]
fn test_visited_commits_are_skipped() {
    let mut store = crate::object_store::in_memory::InMemoryObjectStore::new();
    let base = commit(&mut store, vec![], "base\n");
    let tip = commit(&mut store, vec![base], "tip\n");
    let mut visited = BTreeSet::new();
    visited.insert(base);
    let visits = walk(&store, tip, &mut visited).unwrap();
    assert_eq!(visits.len(), 1);
    assert!(walk(&store, tip, &mut visited).unwrap().is_empty());
}

#[test]
fn test_missing_parent_is_an_error() {
    let mut store = crate::object_store::in_memory::InMemoryObjectStore::new();
    let ghost = crate::object::hash(crate::object::ObjectKind::Commit, b"ghost");
    let tip = commit(&mut store, vec![ghost], "orphan\n");
    assert!(matches!(
        CommitGraph::build(&store, tip),
        Err(crate::error::Error::ObjectNotFound(id)) if id == ghost
    ));
}

#[test]
fn test_dot_output_escapes_labels() {
    let mut store = crate::object_store::in_memory::InMemoryObjectStore::new();
    let root = commit(&mut store, vec![], "say \"hi\" \\o/\nbody\n");
    let child = commit(&mut store, vec![root], "second\n");
    let dot = CommitGraph::build(&store, child).unwrap().to_string();
    assert!(dot.starts_with("digraph log{\n  node[shape=rect]\n"));
    assert!(dot.contains(&format!(
        "  c_{} [label=\"{}: say \\\"hi\\\" \\\\o/\"]\n",
        root,
        root.short()
    )));
    assert!(dot.contains(&format!("  c_{} -> c_{};\n", child, root)));
    assert!(dot.ends_with("}\n"));
}

#[test]
fn test_bootstrap_write_and_walk() {
    use crate::{
        commit::Commit,
        object::{frame, Object, ObjectKind},
        repository::Repository,
    };

    let tempdir = tempfile::tempdir().unwrap();
    let repo = Repository::init(&tempdir.path().join("p")).unwrap();
    let mut store = repo.store().unwrap();

    let blob = store.insert_raw(ObjectKind::Blob, b"hello").unwrap();
    assert_eq!(blob, ObjectId::digest(&frame(ObjectKind::Blob, b"hello")));
    assert_eq!(blob, ObjectId::digest(b"blob 5\x00hello"));

    let tree = store.insert_raw(ObjectKind::Tree, b"").unwrap();
    let initial = store
        .insert(&Object::Commit(Commit::new(tree, vec![], "initial commit\n")))
        .unwrap();
    let graph = CommitGraph::build(&store, initial).unwrap();
    assert_eq!(graph.nodes.len(), 1);
    assert!(graph.edges.is_empty());

    let reopened = Repository::find(&tempdir.path().join("p")).unwrap();
    let commit = reopened.store().unwrap().read_commit(initial).unwrap();
    assert_eq!(commit.message(), b"initial commit\n");
    assert!(commit.parents().is_empty());
}
