mod loopback;
mod remote;
mod serve;
mod terminal_output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use uuid::Uuid;

use courier_config::{config_dir, config_file_path, load_and_prepare, validate, CourierConfig};

use remote::RemoteApi;
use terminal_output::{note_error, note_info, note_success, render_task, render_task_table};

#[derive(Parser)]
#[command(name = "courier")]
#[command(about = "Courier: looped message delivery with supervised tasks")]
#[command(version)]
struct Cli {
    /// Config file (defaults to $COURIER_CONFIG_DIR/config.yaml or ~/.courier/config.yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the task server
    Serve {
        /// Port to bind the HTTP server to
        #[arg(short, long)]
        port: Option<u16>,
        /// Address to bind the HTTP server to
        #[arg(long)]
        bind: Option<String>,
        /// Directory holding tasks.json and stored credentials
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Show all tasks, or one task with its recent log
    Status {
        task_id: Option<Uuid>,
        /// Server base URL (defaults to the configured port on localhost)
        #[arg(long)]
        url: Option<String>,
    },
    /// Stop a running task
    Stop {
        task_id: Uuid,
        #[arg(long)]
        url: Option<String>,
    },
}

fn local_url(config: &CourierConfig) -> String {
    format!("http://127.0.0.1:{}", config.server.port)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let path = cli
        .config
        .unwrap_or_else(|| config_file_path(&config_dir()));
    let mut config = load_and_prepare(&path).await?;

    match cli.command {
        Commands::Serve {
            port,
            bind,
            data_dir,
        } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            if let Some(dir) = data_dir {
                config.storage.data_dir = dir;
            }
            courier_logging::init_logger(
                &config.logging.dir,
                &config.logging.level,
                config.logging.json,
            );
            // again with flags applied, now that warnings have somewhere to go
            validate(&config).check(&path.display().to_string())?;
            serve::run_server(config, path).await?;
        }
        Commands::Status { task_id, url } => {
            let api = RemoteApi::new(url.unwrap_or_else(|| local_url(&config)));
            let color = terminal_output::supports_color();
            match task_id {
                Some(id) => match api.task(id).await {
                    Ok(task) => print!("{}", render_task(&task, color)),
                    Err(e) => {
                        note_error(&format!("{e:#}"));
                        std::process::exit(1);
                    }
                },
                None => match api.tasks().await {
                    Ok(tasks) if tasks.is_empty() => note_info("No tasks"),
                    Ok(tasks) => print!("{}", render_task_table(&tasks, color)),
                    Err(e) => {
                        note_error(&format!("{e:#}"));
                        std::process::exit(1);
                    }
                },
            }
        }
        Commands::Stop { task_id, url } => {
            let api = RemoteApi::new(url.unwrap_or_else(|| local_url(&config)));
            match api.stop(task_id).await {
                Ok(task) => note_success(&format!(
                    "Stopped task {} after {} sent, {} failed",
                    task.task_id, task.sent, task.failed
                )),
                Err(e) => {
                    note_error(&format!("{e:#}"));
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}
