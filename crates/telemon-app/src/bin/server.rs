//! telemon-server 진입점.

use anyhow::{Context, Result};
use clap::Parser;
use telemon_app::build_info::BuildInfo;
use telemon_app::lifecycle::LifecycleManager;
use telemon_app::settings::{load_server_config, ServerArgs};
use telemon_app::{logging, server};

#[tokio::main]
async fn main() -> Result<()> {
    let args = ServerArgs::parse();
    let config = load_server_config(&args)?;
    logging::init_tracing(&config.log_level);

    BuildInfo::current().log("server");

    let lifecycle = LifecycleManager::new();
    let mut task = tokio::spawn(server::run(config, lifecycle.subscribe()));

    tokio::select! {
        joined = &mut task => {
            return joined.context("서버 태스크 비정상 종료")?;
        }
        _ = lifecycle.wait_for_signal() => {}
    }

    task.await.context("서버 태스크 비정상 종료")?
}
