//! `conf` demo: echoes the configuration document, mirroring
//! `original_source/src/operations/config.py`'s behavior and the `conf`
//! CLI surface described in §6.
//!
//! Run with: `cargo run --example conf_demo`

fn main() {
    match spkm::config::Config::load_from_env() {
        Ok(config) => {
            println!("dbpath  = {}", config.general.dbpath.display());
            println!("cache   = {}", config.general.cache.display());
            println!("root    = {}", config.general.root.display());
            println!("threads = {}", config.general.threads);
            println!("colors  = {}", config.general.colors);
            for repo in &config.repos {
                println!("repo    = {} -> {}", repo.name, repo.url);
            }
        }
        Err(e) => {
            eprintln!("could not load configuration: {e}");
            std::process::exit(1);
        }
    }
}
