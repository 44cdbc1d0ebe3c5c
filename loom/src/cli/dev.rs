use std::path::PathBuf;

use clap::Parser;
use loom_server::{default_plugins, start_server, ProjectConfig, ServerContext};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{fmt::Layer, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer as _};

use crate::cli::CmdExecutor;
use crate::watcher;

#[derive(Debug, Parser)]
pub struct DevOpts {
    /// Path to the project manifest (aliases, server options, log level).
    #[arg(long, short, default_value = "loom.yml")]
    pub config: PathBuf,

    /// Overrides the manifest's project root.
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Overrides the manifest's port.
    #[arg(long)]
    pub port: Option<u16>,

    /// Overrides the manifest's host.
    #[arg(long)]
    pub host: Option<String>,
}

impl CmdExecutor for DevOpts {
    async fn execute(self) -> anyhow::Result<()> {
        let mut config = if self.config.is_file() {
            ProjectConfig::load(&self.config)?
        } else {
            ProjectConfig::default()
        };

        if let Some(root) = self.root {
            config.root = root;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(host) = self.host {
            config.host = host;
        }
        config.validate()?;

        init_tracing(&config.log_filter);

        let ctx = ServerContext::new(config);

        // Keep the debouncer alive for the server's lifetime: dropping it
        // stops the watch.
        let _debouncer = watcher::spawn(ctx.clone())?;

        start_server(ctx, &default_plugins()).await
    }
}

fn init_tracing(filter: &str) {
    let env_filter = EnvFilter::try_new(filter)
        .unwrap_or_else(|_| EnvFilter::default().add_directive(LevelFilter::INFO.into()));
    let layer = Layer::new().with_filter(env_filter);
    let _ = tracing_subscriber::registry().with(layer).try_init();
}
