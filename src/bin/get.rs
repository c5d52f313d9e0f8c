//! `get [-s SRC_REPO] [-r REMOTE] [-v]... [-q] [--bwlimit B] [--compress L]
//! [-t] [-c] [--print-tags] ( (--ff|--append|--pick|--force-pick|--new-tag|
//! --overwrite|--unnamed) SRC[:DEST] )...` (§6).
//!
//! The method flags repeat and interleave in any order, and their order of
//! appearance is each target's processing order (§4.5/§4.6). `structopt`'s
//! derive macro has no way to express "this flag name selects the method
//! and also carries the value, repeated and interleaved with five other
//! flags that do the same", so this binary parses `std::env::args()` by
//! hand in one pass instead, exactly the kind of explicit grammar bup's own
//! `options.Options` optspec is (see SPEC_FULL.md §3.4).

use std::path::PathBuf;

use gitvault::config;
use gitvault::error::{Error, Result};
use gitvault::get::{self, Method, Spec};
use gitvault::store::ObjectStore;
use gitvault::Identity;

struct Opt {
    source: Option<PathBuf>,
    remote: Option<String>,
    verbose: u8,
    quiet: bool,
    bwlimit: Option<u64>,
    compress: u8,
    print_trees: bool,
    print_commits: bool,
    print_tags: bool,
    specs: Vec<Spec>,
}

fn method_for(flag: &str) -> Option<Method> {
    Some(match flag {
        "--ff" => Method::Ff,
        "--append" => Method::Append,
        "--pick" => Method::Pick,
        "--force-pick" => Method::ForcePick,
        "--new-tag" => Method::NewTag,
        "--overwrite" => Method::Overwrite,
        "--unnamed" => Method::Unnamed,
        _ => return None,
    })
}

fn parse_args(args: Vec<String>) -> Result<Opt> {
    let mut opt = Opt {
        source: None,
        remote: None,
        verbose: 0,
        quiet: false,
        bwlimit: None,
        compress: 1,
        print_trees: false,
        print_commits: false,
        print_tags: false,
        specs: Vec::new(),
    };

    let mut it = args.into_iter();
    while let Some(arg) = it.next() {
        if let Some(method) = method_for(&arg) {
            let value = it.next().ok_or_else(|| Error::BadSpec(format!("{} requires a value", arg)))?;
            opt.specs.push(Spec::parse(method, &value)?);
            continue;
        }
        match arg.as_str() {
            "-s" | "--source" => {
                let v = it.next().ok_or_else(|| Error::BadSpec("-s requires a value".into()))?;
                opt.source = Some(PathBuf::from(v));
            }
            "-r" | "--remote" => {
                let v = it.next().ok_or_else(|| Error::BadSpec("-r requires a value".into()))?;
                opt.remote = Some(v);
            }
            "-v" | "--verbose" => opt.verbose += 1,
            "-q" | "--quiet" => opt.quiet = true,
            "--bwlimit" => {
                let v = it.next().ok_or_else(|| Error::BadSpec("--bwlimit requires a value".into()))?;
                opt.bwlimit = Some(v.parse().map_err(|_| Error::BadSpec("--bwlimit must be a number".into()))?);
            }
            "--compress" => {
                let v = it.next().ok_or_else(|| Error::BadSpec("--compress requires a value".into()))?;
                opt.compress = v.parse().map_err(|_| Error::BadSpec("--compress must be 0-9".into()))?;
            }
            "-t" | "--print-trees" => opt.print_trees = true,
            "-c" | "--print-commits" => opt.print_commits = true,
            "--print-tags" => opt.print_tags = true,
            other => return Err(Error::BadSpec(format!("unrecognized argument: {}", other))),
        }
    }

    if opt.specs.is_empty() {
        return Err(Error::BadSpec("at least one (--ff|--append|...) SRC[:DEST] is required".into()));
    }
    Ok(opt)
}

/// Only local destination repositories are wired up end to end; `remote`
/// (this crate) parses transfer URLs but the wire transport itself is a
/// non-goal (SPEC_FULL.md §5), so a real `-r`/reverse-mode destination has
/// nowhere to land yet.
fn open_dest(opt: &Opt) -> Result<ObjectStore> {
    if let Some(spec) = &opt.remote {
        let endpoint = gitvault::remote::parse(spec)?;
        return Err(Error::Transport(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            format!("remote destinations ({:?}) are not implemented, only local repositories are", endpoint),
        )));
    }
    ObjectStore::open(&config::repo_root())
}

fn run(opt: Opt) -> Result<()> {
    config::init_logging(opt.verbose, opt.quiet);

    if config::is_server_reverse() && opt.remote.is_some() {
        return Err(Error::BadSpec("don't use -r in reverse mode; it's automatic".into()));
    }

    let src_root = opt.source.clone().unwrap_or_else(config::repo_root);
    let src_store = ObjectStore::open(&src_root)?;
    let dest_store = open_dest(&opt)?;
    let identity = Identity::from_environment();

    let targets = get::resolve_targets(opt.specs, &src_store, &dest_store)?;
    let outcome = get::transfer(&src_store, &dest_store, targets, &identity)?;

    for item in &outcome.items {
        match &item.dest_ref {
            None => {}
            Some(r) if r.starts_with("refs/tags/") => {
                if opt.print_tags {
                    println!("{}", item.new_id);
                }
            }
            Some(_) => {
                if opt.print_trees {
                    if let Some(tree) = item.tree {
                        println!("{}", tree);
                    }
                }
                if opt.print_commits {
                    println!("{}", item.new_id);
                }
            }
        }
        if opt.verbose > 0 {
            log::info!("{}", item.src_path);
        }
    }

    for err in &outcome.ref_errors {
        log::error!("{}", err);
    }
    if !outcome.ref_errors.is_empty() {
        return Err(Error::Transport(std::io::Error::new(
            std::io::ErrorKind::Other,
            format!("{} errors encountered while saving", outcome.ref_errors.len()),
        )));
    }
    Ok(())
}

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let result = parse_args(args).and_then(run);
    result.unwrap_or_else(|err| {
        eprintln!("get: fatal: {}", err);
        std::process::exit(1)
    })
}
