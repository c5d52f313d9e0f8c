//! `gc [-v]... [--threshold N] [--compress L]` (§6).

use structopt::StructOpt;

use gitvault::config;
use gitvault::gc::{self, GcOptions};
use gitvault::store::ObjectStore;

#[derive(Debug, StructOpt)]
#[structopt(about, author)]
struct Opt {
    /// Increase log output (can be used more than once)
    #[structopt(short, long, parse(from_occurrences))]
    verbose: u8,

    /// Only rewrite a packfile if it's over this percent garbage
    #[structopt(long, default_value = "10")]
    threshold: u8,

    /// Compression level (0-9, 9 is highest); currently inert, see DESIGN.md
    #[structopt(long = "compress", default_value = "1")]
    compress: u8,
}

fn run(opt: Opt) -> gitvault::Result<()> {
    config::init_logging(opt.verbose, false);
    let root = config::repo_root();
    let mut store = ObjectStore::open(&root)?;
    let options = GcOptions {
        threshold: opt.threshold,
        compress: opt.compress,
        verbose: opt.verbose as u32,
    };
    let report = gc::collect(&mut store, &options)?;
    log::info!("gc: {} objects before, {} after", report.before, report.after);
    Ok(())
}

fn main() {
    let opt = Opt::from_args();
    run(opt).unwrap_or_else(|err| {
        eprintln!("gc: fatal: {}", err);
        std::process::exit(1)
    })
}
