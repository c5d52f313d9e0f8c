//! §4.5 target specs: one `METHOD SRC[:DEST]` argument per `--ff`/
//! `--append`/etc. flag (§6), parsed the way
//! `examples/original_source/cmd/get-cmd.py::parse_target_args` does.

use std::fmt;

use crate::error::{Error, Result};

/// The method named by one flag. `ff-pick` is not modeled: it was a dead
/// branch in the original implementation (assertable but never reachable
/// from its own option parser), so it's dropped here rather than carried
/// forward as an unreachable variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    Ff,
    Append,
    Pick,
    ForcePick,
    NewTag,
    Overwrite,
    Unnamed,
}

impl Method {
    pub fn flag(&self) -> &'static str {
        match self {
            Method::Ff => "--ff",
            Method::Append => "--append",
            Method::Pick => "--pick",
            Method::ForcePick => "--force-pick",
            Method::NewTag => "--new-tag",
            Method::Overwrite => "--overwrite",
            Method::Unnamed => "--unnamed",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.flag())
    }
}

#[derive(Clone, Debug)]
pub struct Spec {
    pub method: Method,
    pub argval: String,
    pub src: String,
    pub dest: Option<String>,
}

impl Spec {
    /// `argval` is the raw `SRC[:DEST]` text after a `--ff`/etc. flag.
    pub fn parse(method: Method, argval: &str) -> Result<Spec> {
        let parts: Vec<&str> = argval.split(':').collect();
        if !(parts.len() == 1 || parts.len() == 2) || parts[0].is_empty() {
            return Err(Error::BadSpec(format!("invalid item {:?}", argval)));
        }
        let src = parts[0].to_owned();
        let dest = match parts.get(1) {
            Some(d) if !d.is_empty() => Some((*d).to_owned()),
            _ => None,
        };
        Ok(Spec {
            method,
            argval: argval.to_owned(),
            src,
            dest,
        })
    }

    pub fn describe(&self) -> String {
        format!("{} {}", self.method.flag(), self.argval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_src_and_dest_on_colon() {
        let spec = Spec::parse(Method::Ff, "branch1:branch2").unwrap();
        assert_eq!(spec.src, "branch1");
        assert_eq!(spec.dest.as_deref(), Some("branch2"));
    }

    #[test]
    fn trailing_colon_means_no_dest() {
        let spec = Spec::parse(Method::Unnamed, "branch1:").unwrap();
        assert_eq!(spec.dest, None);
    }

    #[test]
    fn empty_src_is_rejected() {
        assert!(Spec::parse(Method::Ff, ":dest").is_err());
    }

    #[test]
    fn extra_colons_are_rejected() {
        assert!(Spec::parse(Method::Ff, "a:b:c").is_err());
    }
}
