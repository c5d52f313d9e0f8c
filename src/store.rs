//! §4.1 ObjectStore — opens a directory of packs and serves `cat`/`hash`.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::id::{ObjectId, ObjectKind};
use crate::object;
use crate::pack::{self, Index};
use crate::refs::RefSet;

/// One opened `.idx` plus the basename it shares with its `.pack`.
struct OpenedPack {
    basename: String,
    index: Index,
}

/// Read-only view over every pack in `objects/pack`, reopened on demand so
/// that packs a `Writer` finalizes mid-invocation become visible (§4.1:
/// "`cat` must be usable concurrently with Writer creating new packs").
pub struct ObjectStore {
    root: PathBuf,
    packs: Vec<OpenedPack>,
}

impl ObjectStore {
    pub fn pack_dir_for(root: &Path) -> PathBuf {
        root.join("objects").join("pack")
    }

    pub fn open(root: &Path) -> Result<ObjectStore> {
        let mut store = ObjectStore {
            root: root.to_path_buf(),
            packs: Vec::new(),
        };
        store.refresh()?;
        Ok(store)
    }

    /// Re-scans the pack directory, picking up packs published since open.
    pub fn refresh(&mut self) -> Result<()> {
        let dir = Self::pack_dir_for(&self.root);
        fs::create_dir_all(&dir)?;
        let mut packs = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("idx") {
                continue;
            }
            let basename = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_owned();
            if !path.with_file_name(format!("{}.pack", basename)).exists() {
                continue; // §3 invariant: idx without a matching pack is not a pack.
            }
            let index = Index::open(&path)?;
            packs.push(OpenedPack { basename, index });
        }
        self.packs = packs;
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn open_index(&self, basename: &str) -> Result<Index> {
        let path = Self::pack_dir_for(&self.root).join(format!("{}.idx", basename));
        Index::open(&path)
    }

    pub fn pack_basenames(&self) -> impl Iterator<Item = &str> {
        self.packs.iter().map(|p| p.basename.as_str())
    }

    pub fn index_for(&self, basename: &str) -> Option<&Index> {
        self.packs.iter().find(|p| p.basename == basename).map(|p| &p.index)
    }

    pub fn contains(&self, id: &ObjectId) -> bool {
        self.packs.iter().any(|p| p.index.contains(id))
    }

    /// Reads `(kind, payload)` for `id`, or `NotFound`.
    pub fn cat(&self, id: &ObjectId) -> Result<(ObjectKind, Vec<u8>)> {
        for p in &self.packs {
            if let Some(offset) = p.index.offset_of(id) {
                let pack_path =
                    Self::pack_dir_for(&self.root).join(format!("{}.pack", p.basename));
                let (kind, payload) = pack::read_record_at(&pack_path, offset)?;
                let actual = object::hash(kind, &payload);
                if actual != *id {
                    return Err(Error::CorruptObject);
                }
                return Ok((kind, payload));
            }
        }
        Err(Error::NotFound(format!("object {} not found", id)))
    }

    pub fn hash(&self, kind: ObjectKind, payload: &[u8]) -> ObjectId {
        object::hash(kind, payload)
    }

    pub fn refs(&self) -> RefSet {
        RefSet::open(&self.root)
    }

    pub fn list_refs(&self) -> Result<Vec<(String, ObjectId)>> {
        self.refs().list()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pack::PackBuilder;
    use tempfile::tempdir;

    #[test]
    fn cat_reads_back_written_object() {
        let dir = tempdir().unwrap();
        let pack_dir = ObjectStore::pack_dir_for(dir.path());
        fs::create_dir_all(&pack_dir).unwrap();

        let mut pb = PackBuilder::create(&pack_dir, "s").unwrap();
        let id = object::hash(ObjectKind::Blob, b"payload");
        pb.append(id, ObjectKind::Blob, b"payload").unwrap();
        pb.finish(&pack_dir).unwrap();

        let store = ObjectStore::open(dir.path()).unwrap();
        let (kind, payload) = store.cat(&id).unwrap();
        assert_eq!(kind, ObjectKind::Blob);
        assert_eq!(payload, b"payload");
        assert!(store.contains(&id));
    }

    #[test]
    fn missing_idx_without_pack_is_ignored() {
        let dir = tempdir().unwrap();
        let pack_dir = ObjectStore::pack_dir_for(dir.path());
        fs::create_dir_all(&pack_dir).unwrap();
        fs::write(pack_dir.join("pack-orphan.idx"), b"not a real idx").unwrap();

        let store = ObjectStore::open(dir.path()).unwrap();
        assert_eq!(store.pack_basenames().count(), 0);
    }
}
