use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use card_search::config::{self, AppConfig};
use card_search::Compiler;

const LONG_VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (built ", env!("BUILD_TIME"), ")");

/// Compile a card search query into a SQL predicate / 将卡片搜索语句编译为 SQL 条件
#[derive(Parser, Debug)]
#[command(name = "card-search", version, long_version = LONG_VERSION)]
struct Args {
    /// JSON config file, created with defaults when missing / 配置文件
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the predicate with parameters inlined instead of JSON
    #[arg(long)]
    debug_sql: bool,

    /// Query text, multiple arguments are joined with spaces
    #[arg(required = true)]
    query: Vec<String>,
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr, stdout carries the result / 日志输出到 stderr
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "card_search=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    // Load configuration / 加载配置
    // 未指定时仅在默认路径存在配置文件时读取
    let app_config = match args.config {
        Some(path) => config::load_config(&path).map_err(anyhow::Error::msg)?,
        None => {
            let path = config::default_config_path();
            if path.exists() {
                config::load_config(&path).map_err(anyhow::Error::msg)?
            } else {
                AppConfig::default()
            }
        }
    };

    let query = args.query.join(" ");
    let compiler = Compiler::new(app_config.parser);
    let result = compiler.compile(&query)?;

    if args.debug_sql {
        match &result.sql {
            Some(sql) => println!("{}", sql.to_debug_sql()),
            None => tracing::info!("Query has no terms, nothing to filter"),
        }
    } else {
        println!("{}", serde_json::to_string_pretty(&result)?);
    }

    Ok(())
}
