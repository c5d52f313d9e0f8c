//! §4.6 Transfer — copies each resolved target's transitive closure into
//! the destination store and stages the resulting ref updates, applying
//! them only after every object write has succeeded.
//!
//! Grounded in `examples/original_source/cmd/get-cmd.py`'s `handle_*`
//! functions and the `updated_refs` staging dict applied at the very end
//! via `dest_repo.update_ref`.

use std::collections::{HashMap, HashSet};

use log::info;

use crate::error::{Error, Result};
use crate::get::resolve::Target;
use crate::get::spec::Method;
use crate::id::{ObjectId, ObjectKind};
use crate::identity::Identity;
use crate::object::CommitInfo;
use crate::store::ObjectStore;
use crate::vfs::Kind;
use crate::walk;
use crate::writer::Writer;

struct HandlerResult {
    new_id: ObjectId,
    tree: Option<ObjectId>,
}

/// What one target produced, for `--print-trees`/`-c`/`--print-tags` and
/// `-v` echoing (§6).
pub struct LoggedItem {
    pub src_path: String,
    pub src_kind: Kind,
    pub new_id: ObjectId,
    pub tree: Option<ObjectId>,
    pub dest_ref: Option<String>,
}

pub struct Outcome {
    pub items: Vec<LoggedItem>,
    pub ref_errors: Vec<String>,
}

/// Copies everything reachable from `seed` that `writer`'s destination
/// doesn't already have. `Walk`'s `stop_at` already prunes on `exists`, so
/// whatever it yields is guaranteed new (§4.3/§4.2).
fn copy_closure(src: &ObjectStore, writer: &mut Writer, seed: ObjectId) -> Result<()> {
    for item in walk::walk(src, seed, |id| writer.exists(id), true) {
        let item = item?;
        let payload = item.payload.expect("include_data requested");
        writer.just_write(item.id, item.kind, &payload)?;
    }
    Ok(())
}

/// All commit ids reachable from `start` by following every parent link,
/// visited depth-first. Good enough for bup's (normally linear) save
/// chains; `handle_append` only needs membership plus a root-to-tip order.
fn rev_list(store: &ObjectStore, start: ObjectId) -> Result<Vec<ObjectId>> {
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    let mut stack = vec![start];
    while let Some(id) = stack.pop() {
        if !seen.insert(id) {
            continue;
        }
        let (kind, payload) = store.cat(&id)?;
        if kind != ObjectKind::Commit {
            continue;
        }
        out.push(id);
        let info = CommitInfo::decode(&payload)?;
        stack.extend(info.parents.iter().rev());
    }
    Ok(out)
}

fn now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

fn append_commit(
    src: &ObjectStore,
    writer: &mut Writer,
    identity: &Identity,
    hash: ObjectId,
    parent: Option<ObjectId>,
) -> Result<(ObjectId, ObjectId)> {
    copy_closure(src, writer, hash)?;
    let (_, payload) = src.cat(&hash)?;
    let info = CommitInfo::decode(&payload)?;
    let commit = writer.new_commit(
        info.tree,
        parent.into_iter().collect(),
        info.author_name,
        info.author_mail,
        info.author_sec,
        info.author_tz,
        identity.user.clone(),
        identity.mail.clone(),
        now(),
        0,
        info.message,
    )?;
    Ok((commit, info.tree))
}

fn append_commits(
    src: &ObjectStore,
    writer: &mut Writer,
    identity: &Identity,
    commits: &[ObjectId],
    dest_hash: Option<ObjectId>,
) -> Result<HandlerResult> {
    let mut last = dest_hash;
    let mut tree = None;
    for &c in commits {
        let (new_c, t) = append_commit(src, writer, identity, c, last)?;
        last = Some(new_c);
        tree = Some(t);
    }
    let new_id = last.ok_or_else(|| Error::BadSpec("append produced no commits".into()))?;
    Ok(HandlerResult { new_id, tree })
}

fn handle_ff(item: &Target, src: &ObjectStore, writer: &mut Writer) -> Result<HandlerResult> {
    let src_hash = item.src.hash.expect("resolved src always has a hash");
    let commits = rev_list(src, src_hash)?;
    let dest_hash = item.dest.as_ref().and_then(|d| d.hash);
    if dest_hash.is_none() || commits.contains(&dest_hash.unwrap()) {
        copy_closure(src, writer, src_hash)?;
        let (_, payload) = src.cat(&src_hash)?;
        let info = CommitInfo::decode(&payload)?;
        return Ok(HandlerResult { new_id: src_hash, tree: Some(info.tree) });
    }
    Err(Error::AncestorViolation(format!(
        "destination is not an ancestor of source for {:?}",
        item.spec.describe()
    )))
}

fn handle_append(item: &Target, src: &ObjectStore, writer: &mut Writer, identity: &Identity) -> Result<HandlerResult> {
    let src_hash = item.src.hash.expect("resolved src always has a hash");
    let dest_hash = item.dest.as_ref().and_then(|d| d.hash);
    if item.src.kind == Some(Kind::Tree) {
        copy_closure(src, writer, src_hash)?;
        let msg = "bup save\n\nGenerated by a get transfer\n".to_owned();
        let commit = writer.new_commit(
            src_hash,
            dest_hash.into_iter().collect(),
            identity.user.clone(),
            identity.mail.clone(),
            now(),
            0,
            identity.user.clone(),
            identity.mail.clone(),
            now(),
            0,
            msg,
        )?;
        return Ok(HandlerResult { new_id: commit, tree: Some(src_hash) });
    }
    let mut commits = rev_list(src, src_hash)?;
    commits.reverse();
    append_commits(src, writer, identity, &commits, dest_hash)
}

fn handle_pick(item: &Target, src: &ObjectStore, writer: &mut Writer, identity: &Identity) -> Result<HandlerResult> {
    let src_hash = item.src.hash.expect("resolved src always has a hash");
    let dest_hash = item.dest.as_ref().and_then(|d| d.hash);
    let (new_id, tree) = append_commit(src, writer, identity, src_hash, dest_hash)?;
    Ok(HandlerResult { new_id, tree: Some(tree) })
}

fn handle_new_tag(item: &Target, src: &ObjectStore, writer: &mut Writer) -> Result<HandlerResult> {
    let src_hash = item.src.hash.expect("resolved src always has a hash");
    copy_closure(src, writer, src_hash)?;
    Ok(HandlerResult { new_id: src_hash, tree: None })
}

fn handle_overwrite(item: &Target, src: &ObjectStore, writer: &mut Writer) -> Result<HandlerResult> {
    let src_hash = item.src.hash.expect("resolved src always has a hash");
    copy_closure(src, writer, src_hash)?;
    let dest_is_tag = item.dest.as_ref().map(|d| d.path.starts_with("/.tag/")).unwrap_or(false);
    if dest_is_tag {
        return Ok(HandlerResult { new_id: src_hash, tree: None });
    }
    let (_, payload) = src.cat(&src_hash)?;
    let info = CommitInfo::decode(&payload)?;
    Ok(HandlerResult { new_id: src_hash, tree: Some(info.tree) })
}

fn handle_unnamed(item: &Target, src: &ObjectStore, writer: &mut Writer) -> Result<HandlerResult> {
    let src_hash = item.src.hash.expect("resolved src always has a hash");
    copy_closure(src, writer, src_hash)?;
    Ok(HandlerResult { new_id: src_hash, tree: None })
}

fn dest_ref_name(path: &str) -> String {
    match path.strip_prefix("/.tag/") {
        Some(tag) => format!("refs/tags/{}", tag),
        None => format!("refs/heads/{}", path.trim_start_matches('/')),
    }
}

/// Runs every resolved target through its handler, writing into a single
/// `Writer` session, then applies all staged ref updates only after that
/// writer closes (§4.6: "ref updates are deferred and applied atomically
/// after every write succeeds"). A ref update that loses its CAS race is
/// recorded as an error rather than aborting the remaining updates,
/// mirroring `add_error`'s continue-on-error behavior.
pub fn transfer(src: &ObjectStore, dest: &ObjectStore, targets: Vec<Target>, identity: &Identity) -> Result<Outcome> {
    let mut updated_refs: HashMap<String, (Option<ObjectId>, ObjectId)> = HashMap::new();
    let mut logged = Vec::new();
    let mut writer = Writer::new(dest, |basename| info!("get: wrote {}", basename))?;

    for item in targets {
        let dest_path = item.dest.as_ref().map(|d| d.path.clone());
        let dest_ref = dest_path.as_deref().map(dest_ref_name);
        let dest_hash = item.dest.as_ref().and_then(|d| d.hash);
        let orig_ref = dest_ref
            .as_ref()
            .and_then(|r| updated_refs.get(r))
            .map(|(orig, _)| *orig)
            .unwrap_or(dest_hash);

        let src_kind = item.src.kind.expect("resolved src always has a kind");
        let method = item.spec.method;
        let result = match method {
            Method::Ff => handle_ff(&item, src, &mut writer)?,
            Method::Append => handle_append(&item, src, &mut writer, identity)?,
            Method::Pick | Method::ForcePick => handle_pick(&item, src, &mut writer, identity)?,
            Method::NewTag => handle_new_tag(&item, src, &mut writer)?,
            Method::Overwrite => handle_overwrite(&item, src, &mut writer)?,
            Method::Unnamed => handle_unnamed(&item, src, &mut writer)?,
        };

        if let Some(ref_name) = &dest_ref {
            updated_refs.insert(ref_name.clone(), (orig_ref, result.new_id));
        }
        logged.push(LoggedItem {
            src_path: item.spec.src.clone(),
            src_kind,
            new_id: result.new_id,
            tree: result.tree,
            dest_ref,
        });
    }

    writer.close()?;

    let mut ref_errors = Vec::new();
    let refs = dest.refs();
    for (ref_name, (orig_ref, new_ref)) in updated_refs {
        match refs.update_ref(&ref_name, new_ref, orig_ref) {
            Ok(()) => info!("get: updated {} ({:?} -> {})", ref_name, orig_ref, new_ref),
            Err(e) => ref_errors.push(format!("unable to update ref {:?}: {}", ref_name, e)),
        }
    }

    Ok(Outcome { items: logged, ref_errors })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::get::resolve::resolve_targets;
    use crate::get::spec::Spec;
    use crate::object::{EntryKind, Tree, TreeEntry};
    use tempfile::tempdir;

    fn seed_branch(store: &ObjectStore, branch: &str, content: &[u8]) -> ObjectId {
        let mut writer = Writer::new(store, |_| {}).unwrap();
        let blob = writer.new_blob(content.to_vec()).unwrap();
        let mut tree = Tree::new();
        tree.push(TreeEntry {
            mode: 0o100644,
            name: "f".into(),
            child: blob,
            kind: EntryKind::Normal,
        });
        let tree_id = writer.new_tree(&tree).unwrap();
        let commit = writer
            .new_commit(tree_id, vec![], "a".into(), "a@b".into(), 1, 0, "a".into(), "a@b".into(), 1, 0, "m".into())
            .unwrap();
        writer.close().unwrap();
        store.refs().update_ref(&format!("refs/heads/{}", branch), commit, None).unwrap();
        commit
    }

    #[test]
    fn ff_transfers_and_updates_branch_ref() {
        let src_dir = tempdir().unwrap();
        let dest_dir = tempdir().unwrap();
        let src_store = ObjectStore::open(src_dir.path()).unwrap();
        let commit = seed_branch(&src_store, "main", b"hi");
        let dest_store = ObjectStore::open(dest_dir.path()).unwrap();
        let identity = Identity {
            user: "t".into(),
            mail: "t@t".into(),
            host: "t".into(),
        };

        let spec = Spec::parse(crate::get::spec::Method::Ff, "main").unwrap();
        let targets = resolve_targets(vec![spec], &src_store, &dest_store).unwrap();
        let outcome = transfer(&src_store, &dest_store, targets, &identity).unwrap();
        assert!(outcome.ref_errors.is_empty());
        assert_eq!(outcome.items[0].new_id, commit);

        let dest_store = ObjectStore::open(dest_dir.path()).unwrap();
        assert!(dest_store.contains(&commit));
        assert_eq!(dest_store.refs().read("refs/heads/main").unwrap(), Some(commit));
    }

    #[test]
    fn new_tag_does_not_touch_branch_namespace() {
        let src_dir = tempdir().unwrap();
        let dest_dir = tempdir().unwrap();
        let src_store = ObjectStore::open(src_dir.path()).unwrap();
        let commit = seed_branch(&src_store, "main", b"hi");
        let dest_store = ObjectStore::open(dest_dir.path()).unwrap();
        let identity = Identity {
            user: "t".into(),
            mail: "t@t".into(),
            host: "t".into(),
        };

        let spec = Spec::parse(crate::get::spec::Method::NewTag, "main:.tag/v1").unwrap();
        let targets = resolve_targets(vec![spec], &src_store, &dest_store).unwrap();
        transfer(&src_store, &dest_store, targets, &identity).unwrap();

        let dest_store = ObjectStore::open(dest_dir.path()).unwrap();
        assert_eq!(dest_store.refs().read("refs/tags/v1").unwrap(), Some(commit));
        assert_eq!(dest_store.refs().read("refs/heads/main").unwrap(), None);
    }

    #[test]
    fn ff_rejects_non_ancestor_destination() {
        let src_dir = tempdir().unwrap();
        let dest_dir = tempdir().unwrap();
        let src_store = ObjectStore::open(src_dir.path()).unwrap();
        let src_commit = seed_branch(&src_store, "main", b"src");
        let dest_store = ObjectStore::open(dest_dir.path()).unwrap();
        let _dest_commit = seed_branch(&dest_store, "main", b"dest-only");
        let identity = Identity {
            user: "t".into(),
            mail: "t@t".into(),
            host: "t".into(),
        };

        let spec = Spec::parse(crate::get::spec::Method::Ff, "main").unwrap();
        let targets = resolve_targets(vec![spec], &src_store, &dest_store).unwrap();
        let err = transfer(&src_store, &dest_store, targets, &identity).unwrap_err();
        assert!(matches!(err, Error::AncestorViolation(_)));
        let _ = src_commit;
    }
}
