//! On-disk pack and index file formats (§3 Pack/Ref; §4.1 ObjectStore).
//!
//! A pack is an append-only sequence of length-prefixed object records. Its
//! sibling `.idx` is a flat, sorted `(ObjectId, offset)` table. Both become
//! visible to readers only via rename, per §5 ("packs become visible only
//! at rename"). The exact byte layout is this crate's own (the spec treats
//! index-format-at-the-byte-level as inherited from the host store and out
//! of scope, §1), but the shape — immutable, append-only pack plus a
//! sorted offset index — follows the teacher's simpler one-object-per-file
//! store generalized to the spec's multi-object pack contract.

use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::id::{ObjectId, ObjectKind};

const PACK_MAGIC: &[u8; 4] = b"GVPK";
const IDX_MAGIC: &[u8; 4] = b"GVIX";
const FORMAT_VERSION: u32 = 1;

fn kind_tag(kind: ObjectKind) -> u8 {
    match kind {
        ObjectKind::Blob => 0,
        ObjectKind::Tree => 1,
        ObjectKind::Commit => 2,
        ObjectKind::Tag => 3,
    }
}

fn tag_kind(tag: u8) -> Result<ObjectKind> {
    Ok(match tag {
        0 => ObjectKind::Blob,
        1 => ObjectKind::Tree,
        2 => ObjectKind::Commit,
        3 => ObjectKind::Tag,
        _ => return Err(Error::CorruptObject),
    })
}

/// A sorted `id -> pack offset` table, read fully into memory. Packs in a
/// backup repository are small enough (§2 size assumptions) that this is
/// simpler and sufficiently fast; `len`/`id_at` are the only operations the
/// spec requires of it (§3).
#[derive(Debug, Clone)]
pub struct Index {
    entries: Vec<(ObjectId, u64)>,
}

impl Index {
    pub fn open(path: &Path) -> Result<Index> {
        let mut f = File::open(path)?;
        let mut magic = [0u8; 4];
        f.read_exact(&mut magic)?;
        if &magic != IDX_MAGIC {
            return Err(Error::CorruptObject);
        }
        let mut u32buf = [0u8; 4];
        f.read_exact(&mut u32buf)?;
        if u32::from_be_bytes(u32buf) != FORMAT_VERSION {
            return Err(Error::CorruptObject);
        }
        let mut u64buf = [0u8; 8];
        f.read_exact(&mut u64buf)?;
        let count = u64::from_be_bytes(u64buf) as usize;

        let mut entries = Vec::with_capacity(count);
        let mut id_buf = [0u8; ObjectId::LEN];
        for _ in 0..count {
            f.read_exact(&mut id_buf)?;
            f.read_exact(&mut u64buf)?;
            entries.push((ObjectId::from_bytes(id_buf), u64::from_be_bytes(u64buf)));
        }
        Ok(Index { entries })
    }

    pub fn write_sorted(path: &Path, mut entries: Vec<(ObjectId, u64)>) -> Result<()> {
        entries.sort_by_key(|(id, _)| *id);
        let tmp_path = sibling_tmp_path(path);
        {
            let mut f = File::create(&tmp_path)?;
            f.write_all(IDX_MAGIC)?;
            f.write_all(&FORMAT_VERSION.to_be_bytes())?;
            f.write_all(&(entries.len() as u64).to_be_bytes())?;
            for (id, offset) in &entries {
                f.write_all(id.as_bytes())?;
                f.write_all(&offset.to_be_bytes())?;
            }
            f.sync_all()?;
        }
        fs::rename(&tmp_path, path)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn id_at(&self, i: usize) -> ObjectId {
        self.entries[i].0
    }

    pub fn offset_at(&self, i: usize) -> u64 {
        self.entries[i].1
    }

    pub fn contains(&self, id: &ObjectId) -> bool {
        self.entries.binary_search_by_key(id, |(id, _)| *id).is_ok()
    }

    pub fn offset_of(&self, id: &ObjectId) -> Option<u64> {
        self.entries
            .binary_search_by_key(id, |(id, _)| *id)
            .ok()
            .map(|i| self.entries[i].1)
    }

    pub fn ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.entries.iter().map(|(id, _)| *id)
    }
}

fn sibling_tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.to_path_buf();
    let name = format!(
        "tmp.{}",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("idx")
    );
    tmp.set_file_name(name);
    tmp
}

/// Reads a single `(kind, payload)` record at a known byte offset.
pub fn read_record_at(pack_path: &Path, offset: u64) -> Result<(ObjectKind, Vec<u8>)> {
    let mut f = File::open(pack_path)?;
    f.seek(SeekFrom::Start(offset))?;
    read_record(&mut f)
}

fn read_record(f: &mut File) -> Result<(ObjectKind, Vec<u8>)> {
    let mut tag = [0u8; 1];
    f.read_exact(&mut tag)?;
    let kind = tag_kind(tag[0])?;
    let mut len_buf = [0u8; 8];
    f.read_exact(&mut len_buf)?;
    let len = u64::from_be_bytes(len_buf) as usize;
    let mut payload = vec![0u8; len];
    f.read_exact(&mut payload)?;
    Ok((kind, payload))
}

/// Iterates every `(offset, kind, payload)` record in a pack file, in
/// on-disk order; used by GC to discover live-set membership and by tests.
pub fn iter_records(pack_path: &Path) -> Result<Vec<(u64, ObjectKind, Vec<u8>)>> {
    let mut f = File::open(pack_path)?;
    let mut magic = [0u8; 4];
    f.read_exact(&mut magic)?;
    if &magic != PACK_MAGIC {
        return Err(Error::CorruptObject);
    }
    let mut u32buf = [0u8; 4];
    f.read_exact(&mut u32buf)?;
    if u32::from_be_bytes(u32buf) != FORMAT_VERSION {
        return Err(Error::CorruptObject);
    }
    let mut out = Vec::new();
    loop {
        let offset = f.stream_position()?;
        let mut tag = [0u8; 1];
        match f.read_exact(&mut tag) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        }
        let kind = tag_kind(tag[0])?;
        let mut len_buf = [0u8; 8];
        f.read_exact(&mut len_buf)?;
        let len = u64::from_be_bytes(len_buf) as usize;
        let mut payload = vec![0u8; len];
        f.read_exact(&mut payload)?;
        out.push((offset, kind, payload));
    }
    Ok(out)
}

/// An in-progress pack file being appended to by a `Writer`. Dropped
/// without `finish`/`discard` ever completing (an early `?` return from a
/// caller holding this in a `Writer`) still must not leave the tmp file
/// behind (§4.2 "a partially written pack is discarded on abort"), so the
/// tmp path is removed in `Drop` unless `finish`/`discard` already handled
/// it.
pub struct PackBuilder {
    tmp_path: PathBuf,
    final_path_hint: PathBuf,
    file: Option<File>,
    offset: u64,
    entries: Vec<(ObjectId, u64)>,
    done: bool,
}

impl PackBuilder {
    pub fn create(dir: &Path, session_tag: &str) -> Result<PackBuilder> {
        let tmp_path = dir.join(format!("tmp.pack.{}", session_tag));
        let mut file = File::create(&tmp_path)?;
        file.write_all(PACK_MAGIC)?;
        file.write_all(&FORMAT_VERSION.to_be_bytes())?;
        let offset = file.stream_position()?;
        Ok(PackBuilder {
            tmp_path: tmp_path.clone(),
            final_path_hint: dir.join("pack-pending.pack"),
            file: Some(file),
            offset,
            entries: Vec::new(),
            done: false,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Appends one record verbatim. Precondition: the caller already
    /// verified the id is not present elsewhere (§4.2 `just_write`).
    pub fn append(&mut self, id: ObjectId, kind: ObjectKind, payload: &[u8]) -> Result<()> {
        let record_offset = self.offset;
        let file = self.file.as_mut().expect("append called after finish/discard");
        file.write_all(&[kind_tag(kind)])?;
        file.write_all(&(payload.len() as u64).to_be_bytes())?;
        file.write_all(payload)?;
        self.offset += 1 + 8 + payload.len() as u64;
        self.entries.push((id, record_offset));
        Ok(())
    }

    /// Finalizes the pack: flushes, hashes the content for a stable name,
    /// renames pack + index into place, and returns the shared basename.
    pub fn finish(mut self, dir: &Path) -> Result<Option<(String, Vec<(ObjectId, u64)>)>> {
        if self.entries.is_empty() {
            if let Some(file) = self.file.take() {
                file.flush()?;
            }
            self.done = true;
            let _ = fs::remove_file(&self.tmp_path);
            return Ok(None);
        }
        if let Some(file) = self.file.take() {
            file.sync_all()?;
        }

        let content = fs::read(&self.tmp_path)?;
        let pack_id = {
            use sha1::{Digest, Sha1};
            let mut hasher = Sha1::new();
            hasher.update(&content);
            hex::encode(hasher.finalize())
        };
        let basename = format!("pack-{}", pack_id);
        let final_pack_path = dir.join(format!("{}.pack", basename));
        fs::rename(&self.tmp_path, &final_pack_path)?;

        let idx_path = dir.join(format!("{}.idx", basename));
        Index::write_sorted(&idx_path, self.entries.clone())?;

        let _ = &self.final_path_hint;
        self.done = true;
        Ok(Some((basename, self.entries)))
    }

    pub fn discard(mut self) {
        self.file.take();
        let _ = fs::remove_file(&self.tmp_path);
        self.done = true;
    }
}

impl Drop for PackBuilder {
    fn drop(&mut self) {
        if !self.done {
            let _ = fs::remove_file(&self.tmp_path);
        }
    }
}
