//! Hive 演示入口
//!
//! 用法：hive <script.json> [input] [--config <path>]
//! 脚本按配置名给出推理决策序列（{"main": [...], "researcher": [...]}），
//! 回放完成后把最终状态以 JSON 打印到标准输出。

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use hive::agent::AgentBuilder;
use hive::config::load_config;
use hive::engine::ScriptedEngine;
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    hive::observability::init();

    let mut positional = Vec::new();
    let mut config_path = None;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            config_path = Some(PathBuf::from(args.next().context("--config needs a path")?));
        } else {
            positional.push(arg);
        }
    }
    let Some(script_path) = positional.first() else {
        bail!("usage: hive <script.json> [input] [--config <path>]");
    };
    let input = positional
        .get(1)
        .cloned()
        .unwrap_or_else(|| "Run the scripted task.".to_string());

    let config = load_config(config_path).context("Failed to load config")?;
    let script = std::fs::read_to_string(script_path)
        .with_context(|| format!("Failed to read script {}", script_path))?;
    let engine = ScriptedEngine::from_json(&script).context("Invalid script JSON")?;

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let agent = AgentBuilder::new(Arc::new(engine), config)
        .with_event_tx(event_tx)
        .build();

    let events = tokio::spawn(async move {
        while let Some(ev) = event_rx.recv().await {
            if let Ok(line) = serde_json::to_string(&ev) {
                tracing::debug!(event = %line, "loop event");
            }
        }
    });

    let cancel = agent.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Ctrl+C received, cancelling run");
            cancel.cancel();
        }
    });

    let outcome = agent.run(&input).await.context("Run failed")?;
    drop(agent);
    let _ = events.await;

    tracing::info!(
        steps = outcome.steps,
        completion = ?outcome.completion,
        hazards = outcome.hazards.len(),
        "run complete"
    );
    println!("{}", serde_json::to_string_pretty(&outcome.state)?);
    Ok(())
}
