use bucketsync_lib::cli::{self, Cli};
use bucketsync_lib::logging::init_logging;
use clap::Parser;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json = cli.json;

    let config = match cli.into_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    // 初始化日志系统
    let guard = init_logging(&config.log);

    let code = match cli::run(config).await {
        Ok(report) => {
            if json {
                match serde_json::to_string_pretty(&report) {
                    Ok(out) => println!("{}", out),
                    Err(e) => tracing::warn!("序列化同步报告失败: {}", e),
                }
            }
            0
        }
        Err(e) => {
            tracing::error!("同步失败: {}", e);
            eprintln!("fail to upload files: {}", e);
            1
        }
    };

    // 退出前刷新文件日志
    drop(guard);
    std::process::exit(code);
}
