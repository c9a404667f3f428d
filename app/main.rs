use std::{
    env::current_dir,
    io::{stdout, Write},
    path::PathBuf,
    process::ExitCode,
};

use clap::{Parser, Subcommand};
use lib::{
    error::{Error, Result},
    history::CommitGraph,
    object::{hash, Object, ObjectKind},
    object_store::ObjectStore,
    repository::Repository,
};

#[derive(Parser, Debug)]
#[clap(about = "A content addressable object store")]
struct Arguments {
    #[clap(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[clap(about = "initialize a new, empty repository")]
    Init {
        #[arg(default_value = ".", help = "where to create the repository")]
        path: PathBuf,
    },
    #[clap(about = "print the payload of a stored object")]
    CatFile {
        #[arg(help = "the expected type: blob, commit, tag or tree")]
        kind: String,
        #[arg(help = "the object to display")]
        object: String,
    },
    #[clap(about = "compute the object id of a file, optionally storing it")]
    HashObject {
        #[arg(short = 't', long = "type", default_value = "blob")]
        kind: String,
        #[arg(short, long, help = "write the object into the repository")]
        write: bool,
        path: PathBuf,
    },
    #[clap(about = "print the history of a commit as a graph")]
    Log {
        #[arg(default_value = "HEAD", help = "the commit to start at")]
        commit: String,
        #[arg(long, help = "print JSON instead of Graphviz DOT")]
        json: bool,
    },
    #[clap(about = "print the object id a name resolves to")]
    RevParse { name: String },
}

fn run(cmd: Command) -> Result<()> {
    use Command::*;
    match cmd {
        Init { path } => {
            let repo = Repository::init(&path)?;
            println!(
                "Initialized empty repository in {}",
                repo.gitdir().display()
            );
        }
        CatFile { kind, object } => {
            let expected: ObjectKind = kind.parse()?;
            let repo = Repository::find(&current_dir()?)?;
            let id = repo.resolve(&object)?;
            let (actual, payload) = repo
                .store()?
                .read_raw(id)?
                .ok_or(Error::ObjectNotFound(id))?;
            if actual != expected {
                return Err(Error::UnexpectedType {
                    id,
                    expected,
                    actual,
                });
            }
            stdout().write_all(&payload)?;
        }
        HashObject { kind, write, path } => {
            let kind: ObjectKind = kind.parse()?;
            let payload = std::fs::read(&path)?;
            // Refuse anything that would not read back, such as a commit without a tree.
            Object::deserialize(kind, &payload)?;
            let id = if write {
                let repo = Repository::find(&current_dir()?)?;
                repo.store()?.insert_raw(kind, &payload)?
            } else {
                hash(kind, &payload)
            };
            println!("{}", id);
        }
        Log { commit, json } => {
            let repo = Repository::find(&current_dir()?)?;
            let id = repo.resolve(&commit)?;
            let graph = CommitGraph::build(&repo.store()?, id)?;
            if json {
                serde_json::to_writer_pretty(stdout(), &graph)?;
                println!();
            } else {
                print!("{}", graph);
            }
        }
        RevParse { name } => {
            let repo = Repository::find(&current_dir()?)?;
            println!("{}", repo.resolve(&name)?);
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Arguments::parse();
    match run(args.cmd) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", err);
            if let Error::AmbiguousName { candidates, .. } = &err {
                for id in candidates {
                    eprintln!("  candidate {}", id);
                }
            }
            ExitCode::FAILURE
        }
    }
}
