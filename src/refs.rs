//! RefSet — enumerate, read, and compare-and-swap update refs (§3, §4).
//!
//! Refs live under `refs/heads/*` (branches) and `refs/tags/*` (tags), one
//! file per ref holding its hex id, following the teacher's
//! `storage::transport::{read,write}_branch` file-per-ref convention
//! generalized to the two namespaces the spec requires.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::id::ObjectId;

pub const HEADS_PREFIX: &str = "refs/heads/";
pub const TAGS_PREFIX: &str = "refs/tags/";

pub struct RefSet {
    root: PathBuf,
}

impl RefSet {
    pub fn open(root: &Path) -> RefSet {
        RefSet {
            root: root.to_path_buf(),
        }
    }

    fn path_for(&self, ref_name: &str) -> Result<PathBuf> {
        if !(ref_name.starts_with(HEADS_PREFIX) || ref_name.starts_with(TAGS_PREFIX)) {
            return Err(Error::BadSpec(format!("not a heads/tags ref: {}", ref_name)));
        }
        if ref_name.contains("..") || ref_name.contains('\0') {
            return Err(Error::BadSpec(format!("unsafe ref name: {}", ref_name)));
        }
        Ok(self.root.join(ref_name))
    }

    /// Reads a ref's current tip, or `None` if it does not exist yet.
    pub fn read(&self, ref_name: &str) -> Result<Option<ObjectId>> {
        let path = self.path_for(ref_name)?;
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(ObjectId::from_hex(contents.trim())?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Enumerates every current `(name, id)` ref, branches then tags.
    pub fn list(&self) -> Result<Vec<(String, ObjectId)>> {
        let mut out = Vec::new();
        for prefix in [HEADS_PREFIX, TAGS_PREFIX] {
            let dir = self.root.join(prefix);
            if !dir.exists() {
                continue;
            }
            for entry in WalkDir::new(&dir) {
                let entry = entry.map_err(|e| Error::Io(e.into()))?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let rel = entry
                    .path()
                    .strip_prefix(&self.root)
                    .unwrap_or(entry.path())
                    .to_string_lossy()
                    .replace('\\', "/");
                let contents = fs::read_to_string(entry.path())?;
                let id = ObjectId::from_hex(contents.trim())?;
                out.push((rel, id));
            }
        }
        out.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(out)
    }

    /// Conditional update: succeeds iff the ref's current value equals
    /// `expected` (where `None` means "must not exist yet").
    pub fn update_ref(
        &self,
        ref_name: &str,
        new_id: ObjectId,
        expected: Option<ObjectId>,
    ) -> Result<()> {
        let path = self.path_for(ref_name)?;
        let current = self.read(ref_name)?;
        if current != expected {
            return Err(Error::RefConflict(format!(
                "{} changed concurrently (expected {:?}, found {:?})",
                ref_name, expected, current
            )));
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp_path = path.with_extension("tmp-update");
        fs::write(&tmp_path, format!("{}\n", new_id))?;
        fs::rename(&tmp_path, &path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn cas_succeeds_when_expectation_matches() {
        let dir = tempdir().unwrap();
        let refs = RefSet::open(dir.path());
        let id1 = ObjectId::from_bytes([1; 20]);
        let id2 = ObjectId::from_bytes([2; 20]);

        refs.update_ref("refs/heads/main", id1, None).unwrap();
        assert_eq!(refs.read("refs/heads/main").unwrap(), Some(id1));

        refs.update_ref("refs/heads/main", id2, Some(id1)).unwrap();
        assert_eq!(refs.read("refs/heads/main").unwrap(), Some(id2));
    }

    #[test]
    fn cas_fails_on_stale_expectation() {
        let dir = tempdir().unwrap();
        let refs = RefSet::open(dir.path());
        let id1 = ObjectId::from_bytes([1; 20]);
        let id2 = ObjectId::from_bytes([2; 20]);

        refs.update_ref("refs/heads/main", id1, None).unwrap();
        let err = refs
            .update_ref("refs/heads/main", id2, None)
            .unwrap_err();
        assert!(matches!(err, Error::RefConflict(_)));
        assert_eq!(refs.read("refs/heads/main").unwrap(), Some(id1));
    }

    #[test]
    fn list_enumerates_heads_and_tags_sorted() {
        let dir = tempdir().unwrap();
        let refs = RefSet::open(dir.path());
        let id = ObjectId::from_bytes([7; 20]);
        refs.update_ref("refs/heads/main", id, None).unwrap();
        refs.update_ref("refs/tags/v1", id, None).unwrap();

        let list = refs.list().unwrap();
        assert_eq!(
            list,
            vec![
                ("refs/heads/main".to_owned(), id),
                ("refs/tags/v1".to_owned(), id),
            ]
        );
    }

    #[test]
    fn rejects_ref_outside_known_namespaces() {
        let dir = tempdir().unwrap();
        let refs = RefSet::open(dir.path());
        let id = ObjectId::from_bytes([1; 20]);
        assert!(matches!(
            refs.update_ref("HEAD", id, None),
            Err(Error::BadSpec(_))
        ));
    }
}
