use std::str::FromStr;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, info, warn};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::cache::TaskCache;
use crate::clickup::TaskListRepository;
use crate::error::SyncError;
use crate::reconcile::{self, Probe, Reconciliation};
use crate::rollover::DayRollover;
use crate::task::Task;
use crate::task_source::TaskSource;
use crate::time_entry::{Project, TimeEntry};
use crate::timer::{self, FocusTimer, StopJob};
use crate::toggl::TogglRepository;

/// タスクがない時の表示。
const NO_TASK: &str = "No active tasks";

/// 利用者からの操作。
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Toggle,
    Refresh,
    ListTasks,
    /// 1から始まるタスク一覧の番号。
    Select(usize),
    Describe(String),
    ListProjects,
    Reconnect,
    Quit,
}

impl FromStr for Command {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let line = s.trim();
        let (name, rest) = line
            .split_once(char::is_whitespace)
            .map(|(name, rest)| (name, rest.trim()))
            .unwrap_or((line, ""));

        let command = match name {
            "p" => Command::Toggle,
            "r" => Command::Refresh,
            "l" => Command::ListTasks,
            "s" => {
                let index = rest
                    .parse::<usize>()
                    .with_context(|| format!("Invalid task number: {}", rest))?;
                if index == 0 {
                    bail!("Task numbers start at 1");
                }
                Command::Select(index)
            }
            "d" if !rest.is_empty() => Command::Describe(rest.to_string()),
            "j" => Command::ListProjects,
            "c" => Command::Reconnect,
            "q" => Command::Quit,
            _ => return Err(anyhow!("Unknown command: {}", line)),
        };

        Ok(command)
    }
}

/// 操作の結果、画面に出すもの。
#[derive(Clone, Debug, PartialEq)]
pub enum Reaction {
    Redraw,
    Tasks(Vec<Task>),
    Projects(Vec<Project>),
    Notice(String),
    Quit,
}

/// バックグラウンドで行ったリモート処理の結果。
#[derive(Debug)]
pub enum Completion {
    /// `revision`は問い合わせを始めた時のタイマーの番号。
    Probed {
        revision: u64,
        probe: Probe,
    },
    EntryStarted {
        session: u64,
        entry: Option<TimeEntry>,
    },
    EntryStopped {
        entry_id: i64,
        stopped: bool,
    },
    /// `date`は取得対象の日付。
    TasksFetched {
        date: NaiveDate,
        result: Result<Vec<Task>, SyncError>,
    },
}

/// タイマーとタスクキャッシュを唯一所有し、すべての更新をここで行う。
///
/// リモートへの問い合わせはtokioのタスクとして実行し、結果は`Completion`としてチャネル経由で
/// 受け取る。状態の読み書きは`tick`/`command`/`complete`の中だけで完結する。
pub struct Hud<T, C> {
    toggl: Option<Arc<T>>,
    tasks: Option<TaskSource<C>>,
    timer: FocusTimer,
    cache: TaskCache,
    rollover: DayRollover,
    description: String,
    project_id: Option<i64>,
    projects: Vec<Project>,
    /// 最後に一覧表示したタスク。`s <n>`の番号はこの一覧を指す。
    listed: Vec<Task>,
    refresh_in_flight: bool,
    probe_in_flight: bool,
    adopt_candidate: bool,
    sender: UnboundedSender<Completion>,
    receiver: UnboundedReceiver<Completion>,
}

impl<T, C> Hud<T, C>
where
    T: TogglRepository + 'static,
    C: TaskListRepository + 'static,
{
    /// 新しい`Hud`を返す。
    ///
    /// # Arguments
    ///
    /// * `toggl` - Togglのリポジトリ。設定されていなければローカルだけで計測する
    /// * `tasks` - タスクの取得元
    /// * `today` - 起動時のLocalタイムゾーンでの日付
    pub fn new(toggl: Option<Arc<T>>, tasks: Option<TaskSource<C>>, today: NaiveDate) -> Self {
        let (sender, receiver) = unbounded_channel();

        Self {
            toggl,
            tasks,
            timer: FocusTimer::new(),
            cache: TaskCache::new(),
            rollover: DayRollover::new(today),
            description: String::new(),
            project_id: None,
            projects: vec![],
            listed: vec![],
            refresh_in_flight: false,
            probe_in_flight: false,
            adopt_candidate: false,
            sender,
            receiver,
        }
    }

    /// 次に計測するタスク名を設定する。
    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    /// 計測を開始する時に付けるプロジェクトを設定する。
    pub fn with_project(mut self, project_id: Option<i64>) -> Self {
        self.project_id = project_id;
        self
    }

    #[cfg(test)]
    pub fn timer(&self) -> &FocusTimer {
        &self.timer
    }

    #[cfg(test)]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[cfg(test)]
    pub fn is_refreshing(&self) -> bool {
        self.refresh_in_flight
    }

    /// 次のリモート処理の結果を待つ。
    pub async fn next_completion(&mut self) -> Option<Completion> {
        self.receiver.recv().await
    }

    /// リモートとの照合をやり直す。問い合わせ中であれば新たに問い合わせない。
    pub fn reconnect(&mut self) -> bool {
        let Some(toggl) = self.toggl.clone() else {
            reconcile::apply(&Probe::default(), &mut self.timer);
            info!("Toggl is not configured, running without remote sync");
            return false;
        };
        if self.probe_in_flight {
            debug!("Reconnect already in flight");
            return false;
        }

        self.probe_in_flight = true;
        let revision = self.timer.revision();
        let sender = self.sender.clone();
        tokio::spawn(async move {
            let probe = reconcile::probe(toggl.as_ref()).await;
            let _ = sender.send(Completion::Probed { revision, probe });
        });
        true
    }

    /// 1秒ごとに呼ばれ、表示する行を返す。日付が変わっていればタスクを取得し直す。
    pub fn tick(&mut self, now: DateTime<Utc>, today: NaiveDate) -> String {
        if self.rollover.observe(today) {
            self.cache.invalidate();
            self.listed.clear();
            self.refresh(today);
        }

        self.display_line(now)
    }

    /// 表示する行を返す。
    pub fn display_line(&self, now: DateTime<Utc>) -> String {
        let icon = if self.timer.is_running() { "⏸" } else { "▶" };
        let label: &str = match self.timer.description() {
            Some(description) => description,
            None if self.description.is_empty() => NO_TASK,
            None => self.description.as_str(),
        };

        format!("{} {} {}", icon, self.timer.display(now), label)
    }

    /// 利用者の操作を処理する。
    pub fn command(&mut self, command: Command, now: DateTime<Utc>) -> Reaction {
        match command {
            Command::Toggle => {
                self.toggle(now);
                Reaction::Redraw
            }
            Command::Refresh => {
                self.cache.invalidate();
                if self.refresh(self.rollover.today()) {
                    Reaction::Notice("Refreshing tasks".to_string())
                } else {
                    Reaction::Redraw
                }
            }
            Command::ListTasks => match self.cache.get(now) {
                Some(tasks) => {
                    self.listed = tasks.to_vec();
                    Reaction::Tasks(self.listed.clone())
                }
                None => {
                    self.refresh(self.rollover.today());
                    Reaction::Notice("Task list is stale, refreshing".to_string())
                }
            },
            Command::Select(index) => {
                let task = index
                    .checked_sub(1)
                    .and_then(|i| self.selectable(now).get(i).cloned());
                match task {
                    Some(task) => {
                        self.description = task.name;
                        Reaction::Redraw
                    }
                    None => Reaction::Notice(format!("No task #{}", index)),
                }
            }
            Command::Describe(description) => {
                self.description = description;
                Reaction::Redraw
            }
            Command::ListProjects => Reaction::Projects(self.projects.clone()),
            Command::Reconnect => {
                if self.reconnect() {
                    Reaction::Notice("Reconnecting".to_string())
                } else {
                    Reaction::Redraw
                }
            }
            Command::Quit => Reaction::Quit,
        }
    }

    /// リモート処理の結果を反映する。
    pub fn complete(&mut self, completion: Completion, now: DateTime<Utc>) {
        match completion {
            Completion::Probed { revision, probe } => {
                self.probe_in_flight = false;
                self.projects = probe.projects.clone();
                if revision != self.timer.revision() {
                    debug!("Timer changed while reconnecting, keeping local state");
                    if probe.workspace_id.is_some() {
                        self.timer.set_workspace(probe.workspace_id);
                    }
                    return;
                }
                match reconcile::apply(&probe, &mut self.timer) {
                    Reconciliation::Resumed { description } => self.description = description,
                    Reconciliation::Idle { .. } => self.fill_candidate(now),
                    Reconciliation::Offline | Reconciliation::KeptLocal => {}
                }
            }
            Completion::EntryStarted { session, entry } => {
                if let Some(job) = self.timer.attach_remote(session, entry) {
                    self.stop_remote(job);
                }
            }
            Completion::EntryStopped { entry_id, stopped } => {
                debug!("Stop of time entry {} finished: {}", entry_id, stopped);
            }
            Completion::TasksFetched { date, result } => {
                self.refresh_in_flight = false;
                let today = self.rollover.today();
                if date != today {
                    debug!("Dropping tasks fetched for {}, fetching {}", date, today);
                    self.refresh(today);
                    return;
                }
                let adopt = std::mem::take(&mut self.adopt_candidate);
                match result {
                    Ok(tasks) => {
                        if adopt && !self.timer.is_running() {
                            if let Some(first) = tasks.first() {
                                self.description = first.name.clone();
                            }
                        }
                        self.cache.put(tasks, now);
                    }
                    Err(e) => warn!("Failed to fetch tasks: {}", e),
                }
            }
        }
    }

    /// 再生と一時停止を切り替える。ローカルの状態は即座に変わり、リモートへの反映は後から行う。
    fn toggle(&mut self, now: DateTime<Utc>) {
        if self.timer.is_running() {
            if let Some(job) = self.timer.pause() {
                self.stop_remote(job);
            }
            return;
        }

        let description: &str = if self.description.is_empty() {
            NO_TASK
        } else {
            self.description.as_str()
        };
        let job = self.timer.play(description, self.project_id, now);
        if let (Some(job), Some(toggl)) = (job, self.toggl.clone()) {
            let sender = self.sender.clone();
            tokio::spawn(async move {
                let entry = timer::start_remote(toggl.as_ref(), &job).await;
                let _ = sender.send(Completion::EntryStarted {
                    session: job.session,
                    entry,
                });
            });
        }
    }

    fn stop_remote(&self, job: StopJob) {
        let Some(toggl) = self.toggl.clone() else {
            return;
        };

        let sender = self.sender.clone();
        tokio::spawn(async move {
            let stopped = timer::stop_remote(toggl.as_ref(), &job).await;
            let _ = sender.send(Completion::EntryStopped {
                entry_id: job.entry.id,
                stopped,
            });
        });
    }

    /// `s <n>`で選べるタスク。一覧表示したものがなければ有効なキャッシュを使う。
    fn selectable(&self, now: DateTime<Utc>) -> &[Task] {
        if self.listed.is_empty() {
            self.cache.get(now).unwrap_or_default()
        } else {
            &self.listed
        }
    }

    /// 計測していない時のタスク名を、今日が期限の最初のタスクにする。
    fn fill_candidate(&mut self, now: DateTime<Utc>) {
        match self.cache.get(now).and_then(|tasks| tasks.first()) {
            Some(first) => self.description = first.name.clone(),
            None => {
                self.adopt_candidate = true;
                self.refresh(self.rollover.today());
            }
        }
    }

    /// 今日が期限のタスクを取得する。取得中であれば新たに取得しない。
    fn refresh(&mut self, today: NaiveDate) -> bool {
        let Some(tasks) = self.tasks.clone() else {
            return false;
        };
        if self.refresh_in_flight {
            debug!("Task refresh already in flight");
            return false;
        }

        self.refresh_in_flight = true;
        let sender = self.sender.clone();
        tokio::spawn(async move {
            let result = tasks.due_on(today).await;
            let _ = sender.send(Completion::TasksFetched {
                date: today,
                result,
            });
        });
        true
    }
}
