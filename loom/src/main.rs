mod cli;
mod watcher;

use clap::Parser;
use cli::{CmdExecutor, Opts};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let opts = Opts::parse();
    opts.cmd.execute().await
}
