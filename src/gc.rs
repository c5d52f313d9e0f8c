//! §4.4 Collector — garbage collection and pack compaction.
//!
//! Grounded directly in `examples/original_source/cmd/gc-cmd.py`:
//! `find_live_objects` (live set via `stop_at = id in live_objs`) and
//! `sweep` (per-pack keep/delete/rewrite decision, `on_pack_finish`-gated
//! stale-file removal) are reproduced here against `Walk`/`Writer` instead
//! of a generator and a `PackWriter`.

use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;

use log::{debug, info};

use crate::error::{Error, Result};
use crate::id::ObjectId;
use crate::store::ObjectStore;
use crate::walk;
use crate::writer::Writer;

#[derive(Clone, Debug)]
pub struct GcOptions {
    /// Rewrite a pack only if more than this percent of it is garbage.
    pub threshold: u8,
    /// Compression level passed through for parity with the command-line
    /// surface; the pack format here has no per-object compression, so
    /// this is currently inert. See DESIGN.md.
    pub compress: u8,
    pub verbose: u32,
}

impl Default for GcOptions {
    fn default() -> GcOptions {
        GcOptions {
            threshold: 10,
            compress: 1,
            verbose: 0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct GcReport {
    pub before: usize,
    pub after: usize,
}

fn count_objects(store: &ObjectStore) -> usize {
    store
        .pack_basenames()
        .filter_map(|b| store.index_for(b))
        .map(|idx| idx.len())
        .sum()
}

fn find_live_objects(store: &ObjectStore) -> Result<std::collections::HashSet<ObjectId>> {
    use std::collections::HashSet;

    // `live` is both the accumulator and the walker's dedup set, exactly as
    // `find_live_objects`'s `stop_at = lambda x: x in live_objs` is in the
    // original: each ref's walk prunes anything already proven live by an
    // earlier ref. The `Rc<RefCell<_>>` is just how Rust shares that single
    // mutable set between the closure and the loop that feeds it.
    let live: Rc<RefCell<HashSet<ObjectId>>> = Rc::new(RefCell::new(HashSet::new()));
    for (_name, id) in store.refs().list()? {
        let stop_at_live = Rc::clone(&live);
        let it = walk::walk(store, id, move |candidate| stop_at_live.borrow().contains(candidate), false);
        for item in it {
            let item = item?;
            live.borrow_mut().insert(item.id);
        }
    }
    Ok(Rc::try_unwrap(live).unwrap_or_else(|rc| RefCell::new(rc.borrow().clone())).into_inner())
}

fn drain_stale(stale: &Rc<RefCell<Vec<PathBuf>>>) {
    for path in stale.borrow_mut().drain(..) {
        if path.exists() {
            debug!("gc: removing {}", path.display());
            let _ = fs::remove_file(&path);
        }
    }
}

/// Runs one garbage-collection pass: compute the live set from every ref
/// tip, then rewrite or delete each pack depending on how much of it
/// survives.
pub fn collect(store: &mut ObjectStore, opts: &GcOptions) -> Result<GcReport> {
    if opts.threshold > 100 {
        return Err(Error::BadSpec(format!(
            "--threshold must be a percent in 0..=100, got {}",
            opts.threshold
        )));
    }

    let before = count_objects(store);
    info!("gc: found {} objects", before);
    if before == 0 {
        info!("gc: nothing to collect");
        return Ok(GcReport { before: 0, after: 0 });
    }

    let live = find_live_objects(store)?;

    // No on-disk aggregate indexes (midx/bloom) exist in this store, so
    // there is nothing to invalidate, but the sequencing still matters
    // for anyone layering such a cache on top: clear before sweeping.
    debug!("gc: clearing midx files");
    debug!("gc: clearing bloom filter");
    // This store keeps no separate reflog (§9 open question, resolved as
    // a no-op: nothing here records ref history beyond the ref file
    // itself), so there is nothing to expire.
    debug!("gc: clearing reflog");

    info!("gc: removing unreachable data");
    let pack_dir = ObjectStore::pack_dir_for(store.root());
    let stale: Rc<RefCell<Vec<PathBuf>>> = Rc::new(RefCell::new(Vec::new()));
    let stale_for_hook = Rc::clone(&stale);
    let hook_pack_dir = pack_dir.clone();
    let mut writer = Writer::new(store, move |basename| {
        info!("gc: created {}", basename);
        let _ = &hook_pack_dir;
        drain_stale(&stale_for_hook);
    })?;

    let basenames: Vec<String> = store.pack_basenames().map(str::to_owned).collect();
    let threshold_frac = (100 - opts.threshold) as f64 / 100.0;

    for basename in &basenames {
        let idx = match store.index_for(basename) {
            Some(idx) => idx,
            None => continue,
        };
        let pack_path = pack_dir.join(format!("{}.pack", basename));
        let idx_path = pack_dir.join(format!("{}.idx", basename));

        let live_ids: Vec<ObjectId> = idx.ids().filter(|id| live.contains(id)).collect();
        if live_ids.is_empty() {
            info!("gc: {} (delete)", basename);
            stale.borrow_mut().push(pack_path);
            stale.borrow_mut().push(idx_path);
            continue;
        }

        let live_frac = live_ids.len() as f64 / idx.len() as f64;
        if live_frac > threshold_frac {
            info!("gc: {} (keep: {:.0}% live)", basename, live_frac * 100.0);
            continue;
        }

        info!("gc: {} (rewrite: {:.2}% live)", basename, live_frac * 100.0);
        for id in live_ids {
            if !writer.exists(&id) {
                let (kind, payload) = store.cat(&id)?;
                writer.just_write(id, kind, &payload)?;
            }
        }
        stale.borrow_mut().push(pack_path);
        stale.borrow_mut().push(idx_path);
    }

    writer.close()?;
    drain_stale(&stale);

    store.refresh()?;
    let after = count_objects(store);
    if before > 0 {
        info!(
            "gc: discarded {:.0}% of objects",
            (before - after) as f64 / before as f64 * 100.0
        );
    }
    Ok(GcReport { before, after })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{EntryKind, Tree, TreeEntry};
    use tempfile::tempdir;

    fn commit_with_blob(writer: &mut Writer, content: &[u8], msg: &str) -> ObjectId {
        let blob = writer.new_blob(content.to_vec()).unwrap();
        let mut tree = Tree::new();
        tree.push(TreeEntry {
            mode: 0o100644,
            name: "f".into(),
            child: blob,
            kind: EntryKind::Normal,
        });
        let tree_id = writer.new_tree(&tree).unwrap();
        writer
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
                msg.into(),
            )
            .unwrap()
    }

    #[test]
    fn threshold_over_100_is_rejected() {
        let dir = tempdir().unwrap();
        let mut store = ObjectStore::open(dir.path()).unwrap();
        let opts = GcOptions {
            threshold: 150,
            ..GcOptions::default()
        };
        let err = collect(&mut store, &opts).unwrap_err();
        assert!(matches!(err, Error::BadSpec(_)));
    }

    #[test]
    fn unreferenced_pack_is_deleted_entirely() {
        let dir = tempdir().unwrap();
        let store = ObjectStore::open(dir.path()).unwrap();
        let mut writer = Writer::new(&store, |_| {}).unwrap();
        let _orphan = commit_with_blob(&mut writer, b"orphan", "orphan");
        writer.close().unwrap();

        let mut store = ObjectStore::open(dir.path()).unwrap();
        let report = collect(&mut store, &GcOptions::default()).unwrap();
        assert_eq!(report.before, 3);
        assert_eq!(report.after, 0);
        assert_eq!(count_objects(&store), 0);
    }

    #[test]
    fn referenced_objects_survive_gc() {
        let dir = tempdir().unwrap();
        let store = ObjectStore::open(dir.path()).unwrap();
        let mut writer = Writer::new(&store, |_| {}).unwrap();
        let kept = commit_with_blob(&mut writer, b"kept", "kept");
        let _orphan = commit_with_blob(&mut writer, b"orphan", "orphan");
        writer.close().unwrap();
        store.refs().update_ref("refs/heads/main", kept, None).unwrap();

        let mut store = ObjectStore::open(dir.path()).unwrap();
        let report = collect(&mut store, &GcOptions::default()).unwrap();
        assert_eq!(report.before, 6);
        assert_eq!(report.after, 3);

        store.refresh().unwrap();
        let (kind, _) = store.cat(&kept).unwrap();
        assert_eq!(kind, crate::id::ObjectKind::Commit);
    }

    #[test]
    fn mixed_pack_is_rewritten_keeping_only_live_objects() {
        let dir = tempdir().unwrap();
        let store = ObjectStore::open(dir.path()).unwrap();
        let mut writer = Writer::new(&store, |_| {}).unwrap();
        let kept = commit_with_blob(&mut writer, b"kept", "kept");
        let _orphan = commit_with_blob(&mut writer, b"orphan", "orphan");
        writer.close().unwrap(); // both land in the same pack
        store.refs().update_ref("refs/heads/main", kept, None).unwrap();

        let mut store = ObjectStore::open(dir.path()).unwrap();
        let opts = GcOptions {
            threshold: 90, // force a rewrite rather than a keep
            ..GcOptions::default()
        };
        let report = collect(&mut store, &opts).unwrap();
        assert_eq!(report.after, 3);
        store.refresh().unwrap();
        assert!(store.contains(&kept));
    }
}
