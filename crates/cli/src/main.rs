//! # Loki Event Collector CLI
//!
//! 命令行接口入口点。
//!
//! 提供：
//! - 配置加载与验证
//! - Kubernetes 事件采集与分发
//! - Leader 选举与优雅关闭处理

mod cli;
mod commands;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Commands};
use commands::{run_collector, run_validate};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = match &cli.command {
        Commands::Run(args) => run_collector(&cli, args).await,
        Commands::Validate(args) => run_validate(&cli, args),
    };

    if let Err(ref e) = result {
        tracing::error!(error = %e, "Command failed");
    }

    result
}
