use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use log::info;
use tokio::io::{stdin, AsyncBufReadExt, BufReader};
use tokio::time::{interval, MissedTickBehavior};

use crate::clickup::TaskListRepository;
use crate::console::ConsolePresenter;
use crate::datetime;
use crate::hud::{Command, Hud, Reaction};
use crate::task_source::TaskSource;
use crate::toggl::TogglRepository;

/// 起動時に表示する操作の一覧。
const USAGE: &str =
    "p: play/pause  r: refresh  l: list  s <n>: select  d <text>: describe  j: projects  c: reconnect  q: quit";

/// 画面を更新する間隔。
const TICK: Duration = Duration::from_secs(1);

/// `hud`サブコマンドの引数。
#[derive(Debug, clap::Args)]
pub struct HudArgs {
    #[clap(short = 'p', long = "project", help = "Attaches started entries to a Toggl project id")]
    pub project: Option<i64>,

    #[clap(short = 'd', long = "description", help = "Sets the task name to start with")]
    pub description: Option<String>,
}

pub struct HudCommand<T, C> {
    hud: Hud<T, C>,
}

impl<T, C> HudCommand<T, C>
where
    T: TogglRepository + 'static,
    C: TaskListRepository + 'static,
{
    /// 新しい`HudCommand`を返す。
    ///
    /// # Arguments
    /// * `toggl` - Toggl APIと通信するためのリポジトリ
    /// * `tasks` - タスクの取得元
    /// * `args` - `hud`サブコマンドの引数
    pub fn new(toggl: Option<Arc<T>>, tasks: Option<TaskSource<C>>, args: HudArgs) -> Self {
        let hud = Hud::new(toggl, tasks, datetime::today())
            .with_description(args.description.as_deref().unwrap_or_default())
            .with_project(args.project);

        Self { hud }
    }

    /// `hud`サブコマンドの処理を行う。
    ///
    /// 1秒ごとに表示を更新しながら標準入力の操作を受け付ける。`q`かCtrl-Cで終了する。
    /// 終了してもリモートで計測中のエントリーは止めないため、次回起動時に引き継がれる。
    pub async fn run<P: ConsolePresenter>(self, presenter: &mut P) -> Result<()> {
        let mut hud = self.hud;
        hud.reconnect();
        presenter.show_notice(USAGE)?;

        let mut lines = BufReader::new(stdin()).lines();
        let mut stdin_open = true;
        let mut ticker = interval(TICK);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let line = hud.tick(datetime::now(), datetime::today());
                    presenter.show_line(&line)?;
                }
                Some(completion) = hud.next_completion() => {
                    hud.complete(completion, datetime::now());
                    presenter.show_line(&hud.display_line(datetime::now()))?;
                }
                line = lines.next_line(), if stdin_open => {
                    let Some(line) = line.context("Failed to read stdin")? else {
                        info!("stdin closed, press Ctrl-C to quit");
                        stdin_open = false;
                        continue;
                    };
                    if line.trim().is_empty() {
                        continue;
                    }

                    match line.parse::<Command>() {
                        Ok(command) => match hud.command(command, datetime::now()) {
                            Reaction::Quit => break,
                            Reaction::Redraw => {}
                            Reaction::Tasks(tasks) => {
                                presenter.show_notice("")?;
                                presenter.show_tasks(&tasks)?;
                            }
                            Reaction::Projects(projects) => {
                                presenter.show_notice("")?;
                                presenter.show_projects(&projects)?;
                            }
                            Reaction::Notice(notice) => presenter.show_notice(&notice)?,
                        },
                        Err(e) => presenter.show_notice(&format!("{:#}", e))?,
                    }
                    presenter.show_line(&hud.display_line(datetime::now()))?;
                }
                _ = tokio::signal::ctrl_c() => break,
            }
        }

        presenter.show_notice("")?;
        info!("Bye.");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{HudArgs, HudCommand};
    use crate::clickup::MockTaskListRepository;
    use crate::toggl::MockTogglRepository;

    #[test]
    fn test_hud_command_applies_args() {
        let args = HudArgs {
            project: Some(3),
            description: Some("Write report".to_string()),
        };

        let command: HudCommand<MockTogglRepository, MockTaskListRepository> =
            HudCommand::new(None, None, args);

        assert_eq!(command.hud.description(), "Write report");
        assert!(!command.hud.timer().is_running());
    }
}
