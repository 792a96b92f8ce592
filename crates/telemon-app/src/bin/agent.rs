//! telemon-agent 진입점.

use anyhow::{Context, Result};
use clap::Parser;
use telemon_app::build_info::BuildInfo;
use telemon_app::lifecycle::LifecycleManager;
use telemon_app::settings::{load_agent_config, AgentArgs};
use telemon_app::{agent, logging};

#[tokio::main]
async fn main() -> Result<()> {
    let args = AgentArgs::parse();
    let config = load_agent_config(&args)?;
    logging::init_tracing(&config.log_level);

    BuildInfo::current().log("agent");

    let lifecycle = LifecycleManager::new();
    let mut task = tokio::spawn(agent::run(config, lifecycle.subscribe()));

    tokio::select! {
        joined = &mut task => {
            return joined.context("에이전트 태스크 비정상 종료")?;
        }
        _ = lifecycle.wait_for_signal() => {}
    }

    task.await.context("에이전트 태스크 비정상 종료")?
}
