//! Explicit identity, replacing the process-wide user/host helpers the
//! original source reads from ad hoc (§9 Design Notes: "Global identity
//! state"). Constructed once at invocation start and threaded into
//! `Transfer` rather than read lazily from the environment deep inside it.

use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub user: String,
    pub mail: String,
    pub host: String,
}

impl Identity {
    /// Best-effort local identity, following the teacher's
    /// `env::var("USER")` fallback but filling in a mail/host guess too,
    /// since committer lines require all three (§3 commit payload).
    pub fn from_environment() -> Identity {
        let user = std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_else(|_| "unknown".to_owned());
        let host = hostname_best_effort();
        let mail = format!("{}@{}", user, host);
        Identity { user, mail, host }
    }

    pub fn committer_line(&self) -> String {
        format!("{} <{}>", self.user, self.mail)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}>", self.user, self.mail)
    }
}

fn hostname_best_effort() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .or_else(|| {
            std::fs::read_to_string("/etc/hostname")
                .ok()
                .map(|s| s.trim().to_owned())
        })
        .unwrap_or_else(|| "localhost".to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn committer_line_has_angle_brackets() {
        let id = Identity {
            user: "paul".into(),
            mail: "paul@example.com".into(),
            host: "example.com".into(),
        };
        assert_eq!(id.committer_line(), "paul <paul@example.com>");
    }
}
