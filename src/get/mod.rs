//! §4.5/§4.6 cross-repository object transfer: resolve every target spec
//! up front, then copy each one's closure and stage its ref update.

pub mod resolve;
pub mod spec;
pub mod transfer;

pub use resolve::{resolve_targets, Loc, Target};
pub use spec::{Method, Spec};
pub use transfer::{transfer, LoggedItem, Outcome};
