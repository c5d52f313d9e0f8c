//! Content-addressed object identifiers.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// A 20-byte SHA-1 object id. Equality and hashing are by byte content.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId([u8; 20]);

impl ObjectId {
    pub const LEN: usize = 20;

    pub fn from_bytes(bytes: [u8; 20]) -> ObjectId {
        ObjectId(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<ObjectId> {
        let mut out = [0u8; 20];
        hex::decode_to_slice(s, &mut out).map_err(|_| Error::CorruptObject)?;
        Ok(ObjectId(out))
    }

    /// The sentinel id of the empty tree, used by the resolver to detect an
    /// "empty" source (§4.5: `src.hash == empty-tree sentinel` is rejected).
    pub fn empty_tree() -> ObjectId {
        crate::object::hash(ObjectKind::Tree, &[])
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.to_hex())
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for ObjectId {
    type Err = Error;

    fn from_str(s: &str) -> Result<ObjectId> {
        ObjectId::from_hex(s)
    }
}

/// The kind of a stored object. VFS-derived kinds (`root`, `branch`, `save`,
/// `dir`, `file`, `chunked-file`) are normalized to one of these before
/// they ever reach the store; see `vfs::Kind`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Blob,
    Tree,
    Commit,
    Tag,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Blob => "blob",
            ObjectKind::Tree => "tree",
            ObjectKind::Commit => "commit",
            ObjectKind::Tag => "tag",
        }
    }
}

impl FromStr for ObjectKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<ObjectKind> {
        match s {
            "blob" => Ok(ObjectKind::Blob),
            "tree" => Ok(ObjectKind::Tree),
            "commit" => Ok(ObjectKind::Commit),
            "tag" => Ok(ObjectKind::Tag),
            _ => Err(Error::CorruptObject),
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_roundtrip() {
        let id = ObjectId::from_bytes([1u8; 20]);
        let s = id.to_hex();
        assert_eq!(s.len(), 40);
        assert_eq!(ObjectId::from_hex(&s).unwrap(), id);
    }

    #[test]
    fn bad_hex_is_corrupt() {
        assert!(matches!(
            ObjectId::from_hex("not-hex"),
            Err(Error::CorruptObject)
        ));
    }

    #[test]
    fn kind_round_trips_through_str() {
        for k in [
            ObjectKind::Blob,
            ObjectKind::Tree,
            ObjectKind::Commit,
            ObjectKind::Tag,
        ] {
            let s = k.to_string();
            assert_eq!(s.parse::<ObjectKind>().unwrap(), k);
        }
    }
}
