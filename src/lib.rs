//! A content-addressed pack store plus two operations over it: garbage
//! collection (`gc`) and cross-repository object transfer (`get`).

pub mod config;
pub mod error;
pub mod gc;
pub mod get;
pub mod id;
pub mod identity;
pub mod object;
pub mod pack;
pub mod refs;
pub mod remote;
pub mod store;
pub mod vfs;
pub mod walk;
pub mod writer;

pub use error::{Error, Result};
pub use id::{ObjectId, ObjectKind};
pub use identity::Identity;
pub use store::ObjectStore;
