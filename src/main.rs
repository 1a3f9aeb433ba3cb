use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

mod cache;
mod clickup;
mod config;
mod console;
mod datetime;
mod error;
mod hud;
mod hud_command;
mod logger;
mod reconcile;
mod rollover;
mod status_command;
mod task;
mod task_source;
mod tasks_command;
mod time_entry;
mod timer;
mod toggl;

use clickup::ClickUpClient;
use config::Settings;
use console::{ConsoleMarkdownList, ConsolePresenter};
use hud_command::{HudArgs, HudCommand};
use status_command::{StatusArgs, StatusCommand};
use task_source::TaskSource;
use tasks_command::{TasksArgs, TasksCommand};
use toggl::TogglClient;

/// Togglのタイマーを表示・操作し、ClickUpのタスクを候補として出すCLIアプリケーション。
///
/// # Examples
/// ```
/// $ cargo run -- status
/// $ cargo run -- tasks --all
/// $ cargo run -- hud
/// ```
#[derive(Debug, Parser)]
#[clap(version, about)]
struct Args {
    #[clap(
        short = 'c',
        long = "config",
        help = "Sets a custom settings file",
        parse(from_os_str)
    )]
    config: Option<PathBuf>,

    #[clap(long = "debug", help = "Enables debug logging")]
    debug: bool,

    #[clap(subcommand)]
    subcommand: SubCommands,
}

/// サブコマンドを表す列挙型。
#[derive(Debug, Subcommand)]
enum SubCommands {
    Status(StatusArgs),
    Tasks(TasksArgs),
    Hud(HudArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    logger::init(args.debug)?;

    let settings = Settings::load(args.config.as_deref()).context("Failed to load settings")?;
    let toggl = settings
        .toggl_token()
        .map(TogglClient::new)
        .transpose()
        .context("Failed to new toggl client")?
        .map(Arc::new);
    let tasks = settings
        .clickup()
        .map(|(token, list_id)| {
            ClickUpClient::new(token).map(|client| TaskSource::new(Arc::new(client), list_id))
        })
        .transpose()
        .context("Failed to new clickup client")?;

    let mut stdout = io::stdout();
    let mut presenter = ConsoleMarkdownList::new(&mut stdout);

    match args.subcommand {
        SubCommands::Status(status) => {
            let report = StatusCommand::new(toggl.as_deref(), tasks.as_ref())
                .run()
                .await;
            presenter.show_status(&report.reconciliation, &report.display)?;
            if status.projects {
                presenter.show_projects(&report.projects)?;
            }
        }
        SubCommands::Tasks(tasks_args) => {
            let tasks = tasks
                .context("ClickUp is not configured: set ClickUp.ApiToken and ClickUp.ListId")?;
            let found = TasksCommand::new(&tasks).run(tasks_args).await?;
            presenter.show_tasks(&found)?;
        }
        SubCommands::Hud(hud) => {
            HudCommand::new(toggl, tasks, hud)
                .run(&mut presenter)
                .await?;
        }
    }

    Ok(())
}
