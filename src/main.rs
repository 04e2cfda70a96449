mod config;
mod errors;
mod logging;
mod paths;
mod security;
mod server;
mod tree;
#[cfg(test)]
mod tests;

use crate::config::Config;
use crate::tree::FileTree;
use anyhow::Context;
use std::path::PathBuf;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let mut config_path = PathBuf::from("dirscope.toml");
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                i += 1;
                if i >= args.len() { eprintln!("--config requires a path"); std::process::exit(2); }
                config_path = PathBuf::from(&args[i]);
            }
            other => { eprintln!("unknown argument: {other}"); std::process::exit(2); }
        }
        i += 1;
    }

    let cfg = Config::load(&config_path)
        .with_context(|| format!("loading config {}", config_path.display()))?;
    logging::init(cfg.logging.format);
    cfg.validate().context("validating config")?;

    let tree = FileTree::new(&cfg.tree_config()).context("canonicalizing root_dir")?;
    let addr = format!("{}:{}", cfg.server.bind_addr, cfg.server.port);

    info!(
        addr = %addr,
        base_path = %cfg.server.base_path,
        root = %tree.root().display(),
        max_depth = cfg.limits.max_depth,
        "dirscope ready"
    );

    server::serve(cfg, tree).await
}
