//! 一次性运行：从参数或 stdin 读取产品描述，非流式跑完流水线并打印最终建议
//!
//! 用法: pricer-once "Freemium vs Tiered for a chatbot SaaS"
//!       echo "..." | pricer-once

use std::io::Read;

use anyhow::Context;
use pricer::agent::run_once;
use pricer::config::{load_config, AppConfig};
use pricer::observability;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let cfg = load_config(None).unwrap_or_else(|_| AppConfig::default());
    observability::init(&cfg.app.log_level);

    let args: Vec<String> = std::env::args().skip(1).collect();
    let input = if args.is_empty() {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read input from stdin")?;
        buf
    } else {
        args.join(" ")
    };

    let input = input.trim();
    if input.is_empty() {
        anyhow::bail!("No input given: pass a product description as arguments or on stdin");
    }

    let output = run_once(&cfg, input).await?;
    println!("{}", output);
    Ok(())
}
