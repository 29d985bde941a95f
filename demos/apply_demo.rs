//! `up` demo: runs a full apply against the configured database, printing
//! progress the way `original_source/src/utils/download.py`'s
//! `print_progress` and `src/utils/logger.py`'s cyan-highlighted `Logger`
//! did — a carriage-return-redrawn progress line and a colored status
//! prefix. This is the one place in the crate allowed to touch standard
//! output (§1+: the colored terminal logger is an external collaborator).
//!
//! Run with: `cargo run --example apply_demo`

use std::io::{self, Write as _};

use spkm::catalog::Catalog;
use spkm::config::Config;
use spkm::extract::TarZstdExtractor;
use spkm::progress::ProgressSink;
use spkm::transaction::TransactionManager;

const CYAN: &str = "\x1b[94m";
const RESET: &str = "\x1b[00m";

/// ANSI progress sink, redrawing a single line per package the way the
/// original `print_progress` did (`\x1b[1K\r` then rewrite), switching
/// between K/M units as the transferred total grows.
struct AnsiProgress {
    colors: bool,
}

impl AnsiProgress {
    fn status(&self, msg: &str) {
        if self.colors {
            println!("{CYAN}::{RESET} {msg}");
        } else {
            println!(":: {msg}");
        }
    }
}

impl ProgressSink for AnsiProgress {
    fn on_progress(&self, name: &str, bytes: u64, total: Option<u64>, rate: f64) {
        let unit = |n: u64| -> String {
            if n >= 1024 * 1024 {
                format!("{:.1}M", n as f64 / (1024.0 * 1024.0))
            } else {
                format!("{:.1}K", n as f64 / 1024.0)
            }
        };

        let progress = match total {
            Some(t) if t > 0 => format!("{}/{} ({:.0}%)", unit(bytes), unit(t), (bytes as f64 / t as f64) * 100.0),
            _ => unit(bytes),
        };

        print!("\x1b[1K\r{name}: {progress} @ {}/s", unit(rate as u64));
        let _ = io::stdout().flush();
    }

    fn on_finished(&self, name: &str, success: bool) {
        println!();
        if success {
            self.status(&format!("fetched {name}"));
        } else {
            self.status(&format!("failed to fetch {name}"));
        }
    }
}

fn main() {
    let config = match Config::load_from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("configuration error: {e}");
            std::process::exit(1);
        }
    };

    let catalog = Catalog::new(&config);
    let extractor = TarZstdExtractor;
    let progress = AnsiProgress {
        colors: config.general.colors,
    };
    let manager = TransactionManager::new(&config, &catalog, &extractor, &progress);

    let outcome = manager.apply(|plan| {
        println!(
            "plan: {} to add, {} to remove, {} to upgrade",
            plan.adds.len(),
            plan.dels.len(),
            plan.ups.len()
        );
        if plan.is_empty() {
            return true;
        }
        print!("proceed? [y/N] ");
        let _ = io::stdout().flush();
        let mut line = String::new();
        io::stdin().read_line(&mut line).is_ok() && line.trim().eq_ignore_ascii_case("y")
    });

    match outcome {
        Ok(outcome) => println!("apply finished: {:?}", outcome.state),
        Err(e) => {
            eprintln!("apply failed: {e}");
            std::process::exit(1);
        }
    }
}
