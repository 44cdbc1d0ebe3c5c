mod dev;

pub use dev::DevOpts;

use clap::Parser;
use enum_dispatch::enum_dispatch;

#[derive(Debug, Parser)]
#[command(name = "loom", version, about = "A no-bundle ES-module dev server")]
pub struct Opts {
    #[command(subcommand)]
    pub cmd: SubCommand,
}

#[enum_dispatch]
pub trait CmdExecutor {
    async fn execute(self) -> anyhow::Result<()>;
}

#[enum_dispatch(CmdExecutor)]
#[derive(Debug, Parser)]
pub enum SubCommand {
    /// Start the dev server for the current project.
    Dev(DevOpts),
}
