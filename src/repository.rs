use std::{
    fs::{create_dir_all, read_dir, read_to_string, write},
    io::ErrorKind,
    path::{Path, PathBuf},
};

use crate::{
    config::{Config, SUPPORTED_FORMAT_VERSION},
    error::{Error, Result},
    object_id::{ObjectId, HEX_LEN},
    object_store::directory::DirectoryObjectStore,
};

/// The hidden directory which marks the root of a repository.
pub const METADATA_DIR: &str = ".git";
/// The branch `HEAD` points at in a freshly initialized repository.
pub const DEFAULT_BRANCH: &str = "master";

const DESCRIPTION: &str =
    "Unnamed repository; edit this file 'description' to name the repository.\n";
const SKELETON: [&str; 4] = ["branches", "objects", "refs/tags", "refs/heads"];
const MIN_PREFIX_LEN: usize = 4;
const MAX_SYMREF_DEPTH: usize = 5;

/// A handle on a repository: its working directory, its metadata
/// directory, and the configuration read from it.
#[derive(Debug, Clone)]
pub struct Repository {
    worktree: PathBuf,
    gitdir: PathBuf,
    config: Config,
}

impl Repository {
    /// Opens the repository whose working directory is `worktree`.
    pub fn open(worktree: PathBuf) -> Result<Self> {
        let gitdir = worktree.join(METADATA_DIR);
        if !gitdir.is_dir() {
            return Err(Error::NotARepository(worktree));
        }
        let config_path = gitdir.join("config");
        if !config_path.is_file() {
            return Err(Error::MissingConfig(config_path));
        }
        let config = Config::read(&config_path)?;
        let version = config.repository_format_version()?;
        if version != SUPPORTED_FORMAT_VERSION {
            return Err(Error::UnsupportedSchema(version));
        }
        Ok(Repository {
            worktree,
            gitdir,
            config,
        })
    }

    /// Finds the repository containing `start` by walking up its ancestors.
    /// Returns `None` when the filesystem root is reached without finding one.
    /// A `start` which does not exist is searched from its nearest existing ancestor.
    pub fn locate(start: &Path) -> Result<Option<Self>> {
        let mut existing = std::path::absolute(start)?;
        while !existing.try_exists()? {
            match existing.parent() {
                Some(parent) => existing = parent.to_path_buf(),
                None => return Ok(None),
            }
        }
        let mut candidate = existing.canonicalize()?;
        loop {
            log::debug!("looking for {} in {:?}", METADATA_DIR, candidate);
            if candidate.join(METADATA_DIR).is_dir() {
                return Repository::open(candidate).map(Some);
            }
            match candidate.parent() {
                Some(parent) => candidate = parent.to_path_buf(),
                None => return Ok(None),
            }
        }
    }

    /// Like [`Repository::locate`], but not finding a repository is an error.
    pub fn find(start: &Path) -> Result<Self> {
        Repository::locate(start)?.ok_or_else(|| Error::NotARepository(start.to_path_buf()))
    }

    /// Creates a new repository at `path`, which must not exist, be an
    /// empty directory, or be a directory without a populated metadata
    /// directory.
    pub fn init(path: &Path) -> Result<Self> {
        if path.try_exists()? {
            if !path.is_dir() {
                return Err(Error::NotADirectory(path.to_path_buf()));
            }
            let gitdir = path.join(METADATA_DIR);
            if gitdir.try_exists()? {
                if !gitdir.is_dir() {
                    return Err(Error::NotADirectory(gitdir));
                }
                if read_dir(&gitdir)?.next().is_some() {
                    return Err(Error::DestinationNotEmpty(path.to_path_buf()));
                }
            }
        } else {
            log::info!("creating {:?}", path);
            create_dir_all(path)?;
        }

        let worktree = path.canonicalize()?;
        let gitdir = worktree.join(METADATA_DIR);
        for dir in SKELETON {
            create_dir_all(gitdir.join(dir))?;
        }
        write(gitdir.join("description"), DESCRIPTION)?;
        write(
            gitdir.join("HEAD"),
            format!("ref: refs/heads/{}\n", DEFAULT_BRANCH),
        )?;
        let config = Config::default();
        config.write(&gitdir.join("config"))?;
        log::info!("initialized empty repository in {:?}", gitdir);

        Ok(Repository {
            worktree,
            gitdir,
            config,
        })
    }

    pub fn worktree(&self) -> &Path {
        &self.worktree
    }

    pub fn gitdir(&self) -> &Path {
        &self.gitdir
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> Result<DirectoryObjectStore> {
        DirectoryObjectStore::new(self.gitdir.join("objects"))
    }

    /// Follows the reference stored at `name` (relative to the metadata
    /// directory) through any `ref: ` indirections. Returns `None` if the
    /// chain ends at a reference which does not exist yet.
    pub fn resolve_ref(&self, name: &str) -> Result<Option<ObjectId>> {
        let mut name = name.to_string();
        for _ in 0..MAX_SYMREF_DEPTH {
            let contents = match read_to_string(self.gitdir.join(&name)) {
                Ok(contents) => contents,
                Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
                Err(err) => return Err(err.into()),
            };
            let contents = contents.trim();
            match contents.strip_prefix("ref: ") {
                Some(target) => {
                    log::trace!("{} -> {}", name, target);
                    name = target.trim().to_string();
                }
                None => return contents.parse().map(Some),
            }
        }
        Err(Error::UnresolvedName(name))
    }

    /// Turns a name into a full object id. Accepts `HEAD`, full digests,
    /// reference paths, branch and tag names, and unambiguous digest
    /// prefixes of at least four characters.
    pub fn resolve(&self, name: &str) -> Result<ObjectId> {
        if name == "HEAD" {
            return self
                .resolve_ref(name)?
                .ok_or_else(|| Error::UnresolvedName(name.to_string()));
        }
        if name.len() == HEX_LEN {
            if let Ok(id) = name.to_ascii_lowercase().parse() {
                return Ok(id);
            }
        }

        let mut refs = vec![format!("refs/heads/{}", name), format!("refs/tags/{}", name)];
        if name.starts_with("refs/") {
            refs.insert(0, name.to_string());
        }
        for candidate in refs {
            if self.gitdir.join(&candidate).is_file() {
                if let Some(id) = self.resolve_ref(&candidate)? {
                    return Ok(id);
                }
            }
        }

        if name.len() >= MIN_PREFIX_LEN && name.chars().all(|c| c.is_ascii_hexdigit()) {
            let prefix = name.to_ascii_lowercase();
            let mut candidates = self.store()?.find_prefix(&prefix)?;
            match candidates.len() {
                0 => {}
                1 => return Ok(candidates.remove(0)),
                _ => {
                    return Err(Error::AmbiguousName {
                        name: name.to_string(),
                        candidates,
                    })
                }
            }
        }
        Err(Error::UnresolvedName(name.to_string()))
    }
}

#[test]
fn test_init_layout() {
    let tempdir = tempfile::tempdir().unwrap();
    let path = tempdir.path().join("fresh");
    let repo = Repository::init(&path).unwrap();
    let gitdir = repo.gitdir();
    for dir in ["branches", "objects", "refs/tags", "refs/heads"] {
        assert!(gitdir.join(dir).is_dir(), "{} missing", dir);
    }
    assert_eq!(
        read_to_string(gitdir.join("HEAD")).unwrap(),
        "ref: refs/heads/master\n"
    );
    assert!(read_to_string(gitdir.join("description"))
        .unwrap()
        .starts_with("Unnamed repository"));
    let config = Config::read(&gitdir.join("config")).unwrap();
    assert_eq!(config.repository_format_version().unwrap(), 0);
    assert!(!config.filemode().unwrap());
    assert!(!config.bare().unwrap());
}

#[test]
fn test_init_into_existing_directories() {
    let tempdir = tempfile::tempdir().unwrap();
    Repository::init(tempdir.path()).unwrap();
    match Repository::init(tempdir.path()) {
        Err(Error::DestinationNotEmpty(_)) => {}
        other => panic!("unexpected {:?}", other),
    }

    let with_files = tempfile::tempdir().unwrap();
    write(with_files.path().join("README"), "hi").unwrap();
    std::fs::create_dir(with_files.path().join(METADATA_DIR)).unwrap();
    assert!(Repository::init(with_files.path()).is_ok());

    let file = tempdir.path().join("plain-file");
    write(&file, "").unwrap();
    assert!(matches!(
        Repository::init(&file),
        Err(Error::NotADirectory(_))
    ));
}

#[test]
fn test_locate_walks_up() {
    let tempdir = tempfile::tempdir().unwrap();
    let root = tempdir.path().join("a/b");
    Repository::init(&root).unwrap();
    let nested = root.join("c/d");
    create_dir_all(&nested).unwrap();

    let repo = Repository::locate(&nested).unwrap().unwrap();
    assert_eq!(repo.worktree(), root.canonicalize().unwrap());
    let repo = Repository::find(&root.join("c")).unwrap();
    assert_eq!(repo.worktree(), root.canonicalize().unwrap());
}

#[test]
fn test_locate_without_repository() {
    let tempdir = tempfile::tempdir().unwrap();
    let lonely = tempdir.path().join("x/y");
    create_dir_all(&lonely).unwrap();
    assert!(
        Repository::locate(tempdir.path()).unwrap().is_none(),
        "{:?} is inside a repository",
        tempdir.path()
    );
    assert!(Repository::locate(&lonely).unwrap().is_none());
    assert!(matches!(
        Repository::find(&lonely),
        Err(Error::NotARepository(_))
    ));
}

#[test]
fn test_locate_from_missing_path() {
    let tempdir = tempfile::tempdir().unwrap();
    assert!(Repository::locate(tempdir.path()).unwrap().is_none());
    let missing = tempdir.path().join("x/y");
    assert!(Repository::locate(&missing).unwrap().is_none());
    assert!(matches!(
        Repository::find(&missing),
        Err(Error::NotARepository(path)) if path == missing
    ));

    Repository::init(tempdir.path()).unwrap();
    let repo = Repository::find(&missing).unwrap();
    assert_eq!(repo.worktree(), tempdir.path().canonicalize().unwrap());
}

#[test]
fn test_open_checks_config() {
    let tempdir = tempfile::tempdir().unwrap();
    let repo = Repository::init(tempdir.path()).unwrap();
    let config_path = repo.gitdir().join("config");

    let mut config = Config::default();
    config.set("core", "repositoryformatversion", "1");
    config.write(&config_path).unwrap();
    assert!(matches!(
        Repository::open(repo.worktree().to_path_buf()),
        Err(Error::UnsupportedSchema(1))
    ));

    std::fs::remove_file(&config_path).unwrap();
    assert!(matches!(
        Repository::open(repo.worktree().to_path_buf()),
        Err(Error::MissingConfig(_))
    ));
}

#[test]
fn test_resolve_names() {
    use crate::object::ObjectKind;
    use crate::object_store::ObjectStore;

    let tempdir = tempfile::tempdir().unwrap();
    let repo = Repository::init(tempdir.path()).unwrap();
    assert!(matches!(
        repo.resolve("HEAD"),
        Err(Error::UnresolvedName(_))
    ));

    let id = repo
        .store()
        .unwrap()
        .insert_raw(ObjectKind::Blob, b"hello")
        .unwrap();
    write(repo.gitdir().join("refs/heads/master"), format!("{}\n", id)).unwrap();
    write(repo.gitdir().join("refs/tags/v1"), format!("{}\n", id)).unwrap();

    assert_eq!(repo.resolve("HEAD").unwrap(), id);
    assert_eq!(repo.resolve("master").unwrap(), id);
    assert_eq!(repo.resolve("refs/heads/master").unwrap(), id);
    assert_eq!(repo.resolve("v1").unwrap(), id);
    assert_eq!(repo.resolve(&id.to_hex()).unwrap(), id);
    assert_eq!(repo.resolve("b6fc4c6").unwrap(), id);
    assert_eq!(repo.resolve("B6FC4C6").unwrap(), id);
    assert!(matches!(
        repo.resolve("nope"),
        Err(Error::UnresolvedName(_))
    ));
}

#[test]
fn test_resolve_ambiguous_prefix() {
    use crate::object::ObjectKind;
    use crate::object_store::ObjectStore;

    let tempdir = tempfile::tempdir().unwrap();
    let repo = Repository::init(tempdir.path()).unwrap();
    let mut store = repo.store().unwrap();
    let mut seen = std::collections::BTreeMap::new();
    let mut n = 0u32;
    let (prefix, first, second) = loop {
        let id = store
            .insert_raw(ObjectKind::Blob, n.to_string().as_bytes())
            .unwrap();
        let prefix = id.to_hex()[..MIN_PREFIX_LEN].to_string();
        if let Some(first) = seen.insert(prefix.clone(), id) {
            break (prefix, first, id);
        }
        n += 1;
    };
    match repo.resolve(&prefix) {
        Err(Error::AmbiguousName { name, candidates }) => {
            assert_eq!(name, prefix);
            let mut expected = vec![first, second];
            expected.sort();
            assert_eq!(candidates, expected);
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(repo.resolve(&second.to_hex()[..12]).unwrap(), second);
}
