//! §4.2 Writer — append objects into a new pack, dedup against what's
//! already visible, and finalize atomically.

use std::collections::HashSet;
use std::path::PathBuf;

use crate::error::Result;
use crate::id::{ObjectId, ObjectKind};
use crate::object::{self, Blob, CommitInfo, Tree};
use crate::pack::PackBuilder;
use crate::store::ObjectStore;

/// Appends objects into a fresh pack, deduping against everything the
/// store already has. `exists` is advisory except when it returns `true`
/// (§4.2): a writer refreshes its view from the store only at
/// construction and at each `breakpoint`/`close`, but every id it writes
/// itself is recorded immediately, so within one session duplicate writes
/// are always caught.
pub struct Writer<'a> {
    store: &'a ObjectStore,
    pack_dir: PathBuf,
    known: HashSet<ObjectId>,
    current: Option<PackBuilder>,
    session_counter: u32,
    on_pack_finish: Box<dyn FnMut(&str) + 'a>,
}

impl<'a> Writer<'a> {
    pub fn new(store: &'a ObjectStore, on_pack_finish: impl FnMut(&str) + 'a) -> Result<Writer<'a>> {
        let pack_dir = ObjectStore::pack_dir_for(store.root());
        std::fs::create_dir_all(&pack_dir)?;
        let known = store.pack_basenames().try_fold(HashSet::new(), |mut acc, basename| {
            if let Some(idx) = store.index_for(basename) {
                acc.extend(idx.ids());
            }
            Ok::<_, crate::error::Error>(acc)
        })?;
        Ok(Writer {
            store,
            pack_dir,
            known,
            current: None,
            session_counter: 0,
            on_pack_finish: Box::new(on_pack_finish),
        })
    }

    pub fn exists(&self, id: &ObjectId) -> bool {
        self.known.contains(id)
    }

    fn ensure_current(&mut self) -> Result<&mut PackBuilder> {
        if self.current.is_none() {
            self.session_counter += 1;
            let tag = format!("{}-{}", std::process::id(), self.session_counter);
            self.current = Some(PackBuilder::create(&self.pack_dir, &tag)?);
        }
        Ok(self.current.as_mut().unwrap())
    }

    /// Appends verbatim. Precondition: `!exists(id)`.
    pub fn just_write(&mut self, id: ObjectId, kind: ObjectKind, payload: &[u8]) -> Result<()> {
        debug_assert!(
            !self.exists(&id),
            "just_write called for an id the writer already has: {}",
            id
        );
        self.known.insert(id);
        self.ensure_current()?.append(id, kind, payload)
    }

    fn write_if_new(&mut self, kind: ObjectKind, payload: Vec<u8>) -> Result<ObjectId> {
        let id = object::hash(kind, &payload);
        if !self.exists(&id) {
            self.just_write(id, kind, &payload)?;
        }
        Ok(id)
    }

    pub fn new_blob(&mut self, content: Vec<u8>) -> Result<ObjectId> {
        self.write_if_new(ObjectKind::Blob, Blob::new(content).encode())
    }

    pub fn new_tree(&mut self, tree: &Tree) -> Result<ObjectId> {
        self.write_if_new(ObjectKind::Tree, tree.encode())
    }

    #[allow(clippy::too_many_arguments)]
    pub fn new_commit(
        &mut self,
        tree: ObjectId,
        parents: Vec<ObjectId>,
        author_name: String,
        author_mail: String,
        author_sec: i64,
        author_tz: i32,
        committer_name: String,
        committer_mail: String,
        committer_sec: i64,
        committer_tz: i32,
        message: String,
    ) -> Result<ObjectId> {
        let info = CommitInfo {
            tree,
            parents,
            author_name,
            author_mail,
            author_sec,
            author_tz,
            committer_name,
            committer_mail,
            committer_sec,
            committer_tz,
            message,
        };
        self.write_if_new(ObjectKind::Commit, info.encode())
    }

    fn finalize_current(&mut self) -> Result<Option<String>> {
        let builder = match self.current.take() {
            Some(b) if !b.is_empty() => b,
            Some(b) => {
                b.discard();
                return Ok(None);
            }
            None => return Ok(None),
        };
        match builder.finish(&self.pack_dir)? {
            Some((basename, _entries)) => {
                (self.on_pack_finish)(&basename);
                Ok(Some(basename))
            }
            None => Ok(None),
        }
    }

    /// Finalizes the current pack and opens a fresh one, returning the
    /// basename of the pack that was just closed.
    pub fn breakpoint(&mut self) -> Result<Option<String>> {
        self.finalize_current()
    }

    /// Finalizes and releases. No more ids become visible to other readers
    /// until this returns.
    pub fn close(mut self) -> Result<Option<String>> {
        self.finalize_current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn write_dedup_within_a_session() {
        let dir = tempdir().unwrap();
        let store = ObjectStore::open(dir.path()).unwrap();
        let mut finished = Vec::new();
        let mut writer = Writer::new(&store, |basename| finished.push(basename.to_owned())).unwrap();

        let id1 = writer.new_blob(b"hello".to_vec()).unwrap();
        let id2 = writer.new_blob(b"hello".to_vec()).unwrap();
        assert_eq!(id1, id2);

        let basename = writer.close().unwrap().unwrap();
        assert_eq!(finished, vec![basename.clone()]);

        let mut store2 = ObjectStore::open(dir.path()).unwrap();
        store2.refresh().unwrap();
        let (kind, payload) = store2.cat(&id1).unwrap();
        assert_eq!(kind, ObjectKind::Blob);
        assert_eq!(payload, b"hello");
    }

    #[test]
    fn exists_sees_objects_already_in_the_store() {
        let dir = tempdir().unwrap();
        let store = ObjectStore::open(dir.path()).unwrap();
        let mut writer = Writer::new(&store, |_| {}).unwrap();
        let id = writer.new_blob(b"seed".to_vec()).unwrap();
        writer.close().unwrap();

        let store2 = ObjectStore::open(dir.path()).unwrap();
        let writer2 = Writer::new(&store2, |_| {}).unwrap();
        assert!(writer2.exists(&id));
    }

    #[test]
    fn closing_with_no_writes_publishes_nothing() {
        let dir = tempdir().unwrap();
        let store = ObjectStore::open(dir.path()).unwrap();
        let writer = Writer::new(&store, |_| {}).unwrap();
        assert_eq!(writer.close().unwrap(), None);
    }
}
