//! §4.5 Resolver — per-method legality checks and dest defaulting, before
//! any object is transferred.
//!
//! Grounded line-for-line in `examples/original_source/cmd/get-cmd.py`'s
//! `resolve_src`/`resolve_branch_dest`/`resolve_ff`/`resolve_append`/
//! `resolve_pick`/`resolve_new_tag`/`resolve_overwrite`/`resolve_unnamed`/
//! `resolve_targets`.

use crate::error::{Error, Result};
use crate::get::spec::{Method, Spec};
use crate::id::ObjectId;
use crate::store::ObjectStore;
use crate::vfs::{self, Kind};

/// A resolved VFS location. Unlike `vfs::Loc`, `kind` may be `None`: a
/// destination that doesn't exist yet still has a `path` (so a ref name
/// can be derived from it) but nothing else.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Loc {
    pub kind: Option<Kind>,
    pub hash: Option<ObjectId>,
    pub path: String,
}

impl From<vfs::Loc> for Loc {
    fn from(l: vfs::Loc) -> Loc {
        Loc {
            kind: Some(l.kind),
            hash: l.hash,
            path: l.path,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Target {
    pub spec: Spec,
    pub src: Loc,
    pub dest: Option<Loc>,
}

fn find_vfs_item(store: &ObjectStore, path: &str) -> Result<Option<Loc>> {
    Ok(vfs::path_info(store, path)?.map(Loc::from))
}

fn resolve_src(spec: &Spec, src_store: &ObjectStore) -> Result<Loc> {
    let src = find_vfs_item(src_store, &spec.src)?
        .ok_or_else(|| Error::NotFound(format!("cannot find source for {:?}", spec.describe())))?;
    if src.hash == Some(ObjectId::empty_tree()) {
        return Err(Error::NotFound(format!(
            "cannot find source for {:?} (no hash)",
            spec.describe()
        )));
    }
    if src.kind == Some(Kind::Root) {
        return Err(Error::BadSpec(format!(
            "cannot fetch entire repository for {:?}",
            spec.describe()
        )));
    }
    Ok(src)
}

/// §9: "`get_save_branch`" reads a save's parent branch name off the
/// source VFS node. This reduced VFS has no save->branch back-reference
/// (a save is just a bare commit id, §5 non-goal), so the decision is to
/// propagate `NotFound` unconditionally rather than guess at a branch.
fn get_save_branch(save_path: &str) -> Result<String> {
    Err(Error::NotFound(format!(
        "cannot infer a destination branch for save {:?}",
        save_path
    )))
}

fn validate_dest_path(path: String, spec: &Spec) -> Result<String> {
    if path.starts_with("/.") && !path.starts_with("/.tag/") {
        return Err(Error::BadSpec(format!(
            "unsupported destination path {:?} in {:?}",
            path,
            spec.describe()
        )));
    }
    Ok(path)
}

fn resolve_branch_dest(mut spec: Spec, src: &Loc, dest_store: &ObjectStore) -> Result<(Spec, Loc)> {
    if spec.dest.is_none() {
        if src.kind == Some(Kind::Branch) {
            spec.dest = Some(spec.src.clone());
        } else if src.kind == Some(Kind::Save) {
            spec.dest = Some(get_save_branch(&spec.src)?);
        } else if src.path.starts_with("/.tag/") {
            spec.dest = Some(spec.src.clone());
        }
    }
    let dest_path = spec
        .dest
        .clone()
        .ok_or_else(|| Error::BadSpec(format!("no destination (implicit or explicit) for {:?}", spec.describe())))?;

    let dest = match find_vfs_item(dest_store, &dest_path)? {
        Some(d) => {
            if d.kind == Some(Kind::Commit) {
                return Err(Error::BadSpec(format!(
                    "destination for {:?} is a tagged commit, not a branch",
                    spec.describe()
                )));
            }
            if d.kind != Some(Kind::Branch) {
                return Err(Error::BadSpec(format!(
                    "destination for {:?} is not a branch",
                    spec.describe()
                )));
            }
            d
        }
        None => Loc {
            kind: None,
            hash: None,
            path: vfs::cleanup_path(&dest_path),
        },
    };

    if dest.path.starts_with("/.") {
        return Err(Error::BadSpec(format!(
            "destination for {:?} must be a valid branch name",
            spec.describe()
        )));
    }

    Ok((spec, dest))
}

pub fn resolve_ff(spec: Spec, src_store: &ObjectStore, dest_store: &ObjectStore) -> Result<Target> {
    let src = resolve_src(&spec, src_store)?;
    if src.kind == Some(Kind::Tree) {
        return Err(Error::BadSpec(format!(
            "{:?} is impossible; can only --append a tree to a branch",
            spec.describe()
        )));
    }
    if !matches!(src.kind, Some(Kind::Branch) | Some(Kind::Save) | Some(Kind::Commit)) {
        return Err(Error::BadSpec(format!(
            "source for {:?} must be a branch, save, or commit",
            spec.describe()
        )));
    }
    let (spec, dest) = resolve_branch_dest(spec, &src, dest_store)?;
    Ok(Target { spec, src, dest: Some(dest) })
}

pub fn resolve_append(spec: Spec, src_store: &ObjectStore, dest_store: &ObjectStore) -> Result<Target> {
    let src = resolve_src(&spec, src_store)?;
    if !matches!(
        src.kind,
        Some(Kind::Branch) | Some(Kind::Save) | Some(Kind::Commit) | Some(Kind::Tree)
    ) {
        return Err(Error::BadSpec(format!(
            "source for {:?} must be a branch, save, commit, or tree",
            spec.describe()
        )));
    }
    let (spec, dest) = resolve_branch_dest(spec, &src, dest_store)?;
    Ok(Target { spec, src, dest: Some(dest) })
}

pub fn resolve_pick(mut spec: Spec, src_store: &ObjectStore, dest_store: &ObjectStore) -> Result<Target> {
    let src = resolve_src(&spec, src_store)?;
    if src.kind == Some(Kind::Tree) {
        return Err(Error::BadSpec(format!("{:?} is impossible; can only --append a tree", spec.describe())));
    }
    if !matches!(src.kind, Some(Kind::Commit) | Some(Kind::Save)) {
        return Err(Error::BadSpec(format!(
            "{:?} impossible; can only pick a commit or save",
            spec.describe()
        )));
    }
    if spec.dest.is_none() {
        if src.path.starts_with("/.tag/") {
            spec.dest = Some(spec.src.clone());
        } else if src.kind == Some(Kind::Save) {
            spec.dest = Some(get_save_branch(&spec.src)?);
        }
    }
    let dest_path = spec
        .dest
        .clone()
        .ok_or_else(|| Error::BadSpec(format!("no destination provided for {:?}", spec.describe())))?;

    let dest = match find_vfs_item(dest_store, &dest_path)? {
        Some(d) => {
            if d.kind != Some(Kind::Branch) && !d.path.starts_with("/.tag/") {
                return Err(Error::BadSpec(format!("{:?} destination is not a tag or branch", spec.describe())));
            }
            if spec.method == Method::Pick && d.hash.is_some() && d.path.starts_with("/.tag/") {
                return Err(Error::BadSpec(format!(
                    "cannot overwrite existing tag for {:?} (requires --force-pick)",
                    spec.describe()
                )));
            }
            d
        }
        None => {
            let path = validate_dest_path(vfs::cleanup_path(&dest_path), &spec)?;
            Loc { kind: None, hash: None, path }
        }
    };
    Ok(Target { spec, src, dest: Some(dest) })
}

pub fn resolve_new_tag(mut spec: Spec, src_store: &ObjectStore, dest_store: &ObjectStore) -> Result<Target> {
    let src = resolve_src(&spec, src_store)?;
    if spec.dest.is_none() && src.path.starts_with("/.tag/") {
        spec.dest = Some(src.path.clone());
    }
    let dest_path = spec
        .dest
        .clone()
        .ok_or_else(|| Error::BadSpec(format!("no destination (implicit or explicit) for {:?}", spec.describe())))?;

    let dest = match find_vfs_item(dest_store, &dest_path)? {
        Some(d) => d,
        None => Loc {
            kind: None,
            hash: None,
            path: vfs::cleanup_path(&dest_path),
        },
    };
    if !dest.path.starts_with("/.tag/") {
        return Err(Error::BadSpec(format!("destination for {:?} must be a VFS tag", spec.describe())));
    }
    if dest.hash.is_some() {
        return Err(Error::BadSpec(format!(
            "cannot overwrite existing tag for {:?} (requires --overwrite)",
            spec.describe()
        )));
    }
    Ok(Target { spec, src, dest: Some(dest) })
}

pub fn resolve_overwrite(mut spec: Spec, src_store: &ObjectStore, dest_store: &ObjectStore) -> Result<Target> {
    let src = resolve_src(&spec, src_store)?;
    if spec.dest.is_none() && (src.path.starts_with("/.tag/") || src.kind == Some(Kind::Branch)) {
        spec.dest = Some(spec.src.clone());
    }
    let dest_path = spec
        .dest
        .clone()
        .ok_or_else(|| Error::BadSpec(format!("no destination provided for {:?}", spec.describe())))?;

    let dest = match find_vfs_item(dest_store, &dest_path)? {
        Some(d) => {
            if d.kind != Some(Kind::Branch) && !d.path.starts_with("/.tag/") {
                return Err(Error::BadSpec(format!("{:?} impossible; can only overwrite branch or tag", spec.describe())));
            }
            d
        }
        None => {
            let path = validate_dest_path(vfs::cleanup_path(&dest_path), &spec)?;
            Loc { kind: None, hash: None, path }
        }
    };
    if !dest.path.starts_with("/.tag/") && !matches!(src.kind, Some(Kind::Branch) | Some(Kind::Save) | Some(Kind::Commit)) {
        return Err(Error::BadSpec(format!(
            "cannot overwrite branch with {:?} for {:?}",
            src.kind,
            spec.describe()
        )));
    }
    Ok(Target { spec, src, dest: Some(dest) })
}

pub fn resolve_unnamed(spec: Spec, src_store: &ObjectStore, _dest_store: &ObjectStore) -> Result<Target> {
    if spec.dest.is_some() {
        return Err(Error::BadSpec(format!("destination name given for {:?}", spec.describe())));
    }
    let src = resolve_src(&spec, src_store)?;
    Ok(Target { spec, src, dest: None })
}

/// Resolves every target spec, then rejects any second spec that would
/// silently clobber a tag another spec already targets this run (the
/// asymmetric exception: `--overwrite`/`--force-pick` are explicitly
/// allowed to re-target a tag, everything else is not).
pub fn resolve_targets(specs: Vec<Spec>, src_store: &ObjectStore, dest_store: &ObjectStore) -> Result<Vec<Target>> {
    let mut items = Vec::with_capacity(specs.len());
    for spec in specs {
        let method = spec.method;
        let target = match method {
            Method::Ff => resolve_ff(spec, src_store, dest_store)?,
            Method::Append => resolve_append(spec, src_store, dest_store)?,
            Method::Pick | Method::ForcePick => resolve_pick(spec, src_store, dest_store)?,
            Method::NewTag => resolve_new_tag(spec, src_store, dest_store)?,
            Method::Overwrite => resolve_overwrite(spec, src_store, dest_store)?,
            Method::Unnamed => resolve_unnamed(spec, src_store, dest_store)?,
        };
        items.push(target);
    }

    let mut tags_targeted = std::collections::HashSet::new();
    for item in &items {
        let dest_path = match &item.dest {
            Some(d) => &d.path,
            None => continue,
        };
        if !dest_path.starts_with("/.tag/") {
            continue;
        }
        if tags_targeted.contains(dest_path) {
            if !matches!(item.spec.method, Method::Overwrite | Method::ForcePick) {
                return Err(Error::BadSpec(format!(
                    "cannot overwrite tag {:?} via {:?}",
                    dest_path,
                    item.spec.describe()
                )));
            }
        } else {
            tags_targeted.insert(dest_path.clone());
        }
    }
    Ok(items)
}
