//! Environment-derived configuration (§3.3): read once at the CLI layer,
//! never reached for lazily deep inside a module.

use std::path::PathBuf;

/// Repository root, from `BUP_DIR` or the current directory. Locating a
/// repo by walking up from cwd the way `git`/`bup` do is part of the
/// repo-init machinery this crate treats as out of scope (§1 non-goal);
/// `BUP_DIR` (or cwd) is all that's required to open an `ObjectStore`.
pub fn repo_root() -> PathBuf {
    std::env::var_os("BUP_DIR").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."))
}

/// Whether this invocation is running as the remote end of a `get`
/// (§6: "reverse mode forbids `-r`; it's automatic").
pub fn is_server_reverse() -> bool {
    std::env::var_os("BUP_SERVER_REVERSE").is_some()
}

/// Initializes `env_logger` at a level derived from `-v`/`-q` counts,
/// following the teacher's plain `env_logger::init()` but letting the CLI
/// flags pick the filter instead of only `RUST_LOG` (§3.2).
pub fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        log::LevelFilter::Error
    } else {
        match verbose {
            0 => log::LevelFilter::Info,
            1 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    };
    env_logger::Builder::from_default_env().filter_level(level).init();
}
