//! A minimal VFS façade: path -> object resolution only (§1 non-goal: full
//! VFS browsing semantics are explicitly out of scope). `path_info`
//! already returns the *normalized* kind the spec's `Loc` type expects
//! (`dir`/`chunked-file` -> `tree`, `file` -> `blob`), so `Resolver` never
//! has to do that mapping itself.

use std::fmt;

use crate::error::Result;
use crate::id::{ObjectId, ObjectKind};
use crate::object::Tree;
use crate::refs::{RefSet, HEADS_PREFIX, TAGS_PREFIX};
use crate::store::ObjectStore;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Kind {
    Root,
    Branch,
    /// A specific historical revision under a branch. This reduced VFS
    /// identifies a save by the commit id itself rather than bup's
    /// timestamp-named checkpoints (full save-browsing semantics are the
    /// explicit non-goal in §1); see DESIGN.md.
    Save,
    Commit,
    Tree,
    Blob,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Kind::Root => "root",
            Kind::Branch => "branch",
            Kind::Save => "save",
            Kind::Commit => "commit",
            Kind::Tree => "tree",
            Kind::Blob => "blob",
        };
        write!(f, "{}", s)
    }
}

/// `Loc(type, hash, path)` (§3).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Loc {
    pub kind: Kind,
    pub hash: Option<ObjectId>,
    pub path: String,
}

/// Normalizes a VFS path: absolute, no `.`/`..`, no trailing slash (except
/// root itself).
pub fn cleanup_path(p: &str) -> String {
    let mut out = Vec::new();
    for seg in p.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                out.pop();
            }
            s => out.push(s),
        }
    }
    if out.is_empty() {
        "/".to_owned()
    } else {
        format!("/{}", out.join("/"))
    }
}

fn segments(path: &str) -> Vec<&str> {
    path.trim_matches('/').split('/').filter(|s| !s.is_empty()).collect()
}

/// Resolves a VFS path against a repository, returning `None` if nothing
/// at that path currently exists.
pub fn path_info(store: &ObjectStore, path: &str) -> Result<Option<Loc>> {
    let path = cleanup_path(path);
    let segs = segments(&path);
    let refs = store.refs();

    if segs.is_empty() {
        return Ok(Some(Loc {
            kind: Kind::Root,
            hash: None,
            path,
        }));
    }

    if segs[0] == ".tag" {
        return resolve_tag(store, &refs, &segs[1..], &path);
    }

    resolve_branch_path(store, &refs, &segs, &path)
}

fn resolve_tag(
    store: &ObjectStore,
    refs: &RefSet,
    rest: &[&str],
    path: &str,
) -> Result<Option<Loc>> {
    if rest.is_empty() {
        return Ok(None);
    }
    let ref_name = format!("{}{}", TAGS_PREFIX, rest.join("/"));
    let hash = match refs.read(&ref_name)? {
        Some(h) => h,
        None => {
            return Ok(Some(Loc {
                kind: Kind::Commit,
                hash: None,
                path: path.to_owned(),
            }))
        }
    };
    let (kind, _) = store.cat(&hash)?;
    let vfs_kind = match kind {
        ObjectKind::Commit => Kind::Commit,
        ObjectKind::Tree => Kind::Tree,
        ObjectKind::Blob => Kind::Blob,
        ObjectKind::Tag => Kind::Commit,
    };
    Ok(Some(Loc {
        kind: vfs_kind,
        hash: Some(hash),
        path: path.to_owned(),
    }))
}

fn resolve_branch_path(
    store: &ObjectStore,
    refs: &RefSet,
    segs: &[&str],
    path: &str,
) -> Result<Option<Loc>> {
    let branch = segs[0];
    let ref_name = format!("{}{}", HEADS_PREFIX, branch);
    let tip = match refs.read(&ref_name)? {
        Some(h) => h,
        None => return Ok(None),
    };

    if segs.len() == 1 {
        return Ok(Some(Loc {
            kind: Kind::Branch,
            hash: Some(tip),
            path: path.to_owned(),
        }));
    }

    let save_id = match ObjectId::from_hex(segs[1]) {
        Ok(id) => id,
        // §9: "get_save_branch" ambiguity resolved by propagating NotFound
        // unconditionally rather than guessing a secondary resolution.
        Err(_) => return Ok(None),
    };
    if store.cat(&save_id).is_err() {
        return Ok(None);
    }

    if segs.len() == 2 {
        return Ok(Some(Loc {
            kind: Kind::Save,
            hash: Some(save_id),
            path: path.to_owned(),
        }));
    }

    let info = crate::object::CommitInfo::decode(&store.cat(&save_id)?.1)?;
    resolve_tree_path(store, info.tree, &segs[2..], path)
}

fn resolve_tree_path(
    store: &ObjectStore,
    mut current: ObjectId,
    rest: &[&str],
    path: &str,
) -> Result<Option<Loc>> {
    for (i, name) in rest.iter().enumerate() {
        let (kind, payload) = store.cat(&current)?;
        if kind != ObjectKind::Tree {
            return Ok(None);
        }
        let tree = Tree::decode(&payload)?;
        let entry = match tree.entries.iter().find(|e| e.name == *name) {
            Some(e) => e,
            None => return Ok(None),
        };
        current = entry.child;
        let is_last = i == rest.len() - 1;
        if is_last {
            let (child_kind, _) = store.cat(&current)?;
            let vfs_kind = match child_kind {
                ObjectKind::Tree => Kind::Tree,
                ObjectKind::Blob => Kind::Blob,
                _ => return Ok(None),
            };
            return Ok(Some(Loc {
                kind: vfs_kind,
                hash: Some(current),
                path: path.to_owned(),
            }));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{EntryKind, TreeEntry};
    use crate::writer::Writer;
    use tempfile::tempdir;

    #[test]
    fn root_resolves_without_hash() {
        let dir = tempdir().unwrap();
        let store = ObjectStore::open(dir.path()).unwrap();
        let loc = path_info(&store, "/").unwrap().unwrap();
        assert_eq!(loc.kind, Kind::Root);
        assert_eq!(loc.hash, None);
    }

    #[test]
    fn branch_and_file_resolve() {
        let dir = tempdir().unwrap();
        let store = ObjectStore::open(dir.path()).unwrap();
        let mut writer = Writer::new(&store, |_| {}).unwrap();
        let blob = writer.new_blob(b"hi".to_vec()).unwrap();
        let mut tree = Tree::new();
        tree.push(TreeEntry {
            mode: 0o100644,
            name: "f.txt".into(),
            child: blob,
            kind: EntryKind::Normal,
        });
        let tree_id = writer.new_tree(&tree).unwrap();
        let commit = writer
            .new_commit(
                tree_id,
                vec![],
                "a".into(),
                "a@b".into(),
                1,
                0,
                "a".into(),
                "a@b".into(),
                1,
                0,
                "m".into(),
            )
            .unwrap();
        writer.close().unwrap();
        store.refs().update_ref("refs/heads/main", commit, None).unwrap();

        let store = ObjectStore::open(dir.path()).unwrap();
        let branch_loc = path_info(&store, "/main").unwrap().unwrap();
        assert_eq!(branch_loc.kind, Kind::Branch);
        assert_eq!(branch_loc.hash, Some(commit));

        let file_loc = path_info(&store, &format!("/main/{}/f.txt", commit))
            .unwrap()
            .unwrap();
        assert_eq!(file_loc.kind, Kind::Blob);
        assert_eq!(file_loc.hash, Some(blob));
    }

    #[test]
    fn unknown_branch_is_none() {
        let dir = tempdir().unwrap();
        let store = ObjectStore::open(dir.path()).unwrap();
        assert!(path_info(&store, "/nope").unwrap().is_none());
    }

    #[test]
    fn cleanup_normalizes_dots_and_slashes() {
        assert_eq!(cleanup_path("/a/./b/../c"), "/a/c");
        assert_eq!(cleanup_path(""), "/");
        assert_eq!(cleanup_path("a/b"), "/a/b");
    }
}
