use chrono::{DateTime, NaiveDate, Utc};
use log::{info, warn};

use crate::cache::TaskCache;
use crate::clickup::TaskListRepository;
use crate::task::Task;
use crate::task_source::TaskSource;
use crate::time_entry::{Project, TimeEntry};
use crate::timer::FocusTimer;
use crate::toggl::TogglRepository;

/// Togglへの問い合わせ結果。
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Probe {
    pub workspace_id: Option<i64>,
    pub current: Option<TimeEntry>,
    pub projects: Vec<Project>,
}

/// 照合の結果。
#[derive(Clone, Debug, PartialEq)]
pub enum Reconciliation {
    /// ワークスペースが分からないため、リモートとは同期しない。
    Offline,
    /// リモートで計測中のエントリーを引き継いだ。
    Resumed { description: String },
    /// ローカルで計測中のため、ローカルの状態を優先した。
    KeptLocal,
    /// 計測していない。次に取り組むタスクの候補を添える。
    Idle { candidate: Option<Task> },
}

/// Togglに既定のワークスペースと計測中のエントリーを問い合わせる。
///
/// 問い合わせの失敗はログに残し、結果がなかったものとして扱う。
pub async fn probe<T>(toggl: &T) -> Probe
where
    T: TogglRepository + ?Sized,
{
    let workspace_id = match toggl.default_workspace().await {
        Ok(workspace_id) => workspace_id,
        Err(e) => {
            warn!("Failed to resolve default workspace: {}", e);
            None
        }
    };
    let Some(workspace) = workspace_id else {
        return Probe::default();
    };

    let current = toggl.current_entry().await.unwrap_or_else(|e| {
        warn!("Failed to read current time entry: {}", e);
        None
    });
    let projects = toggl.projects(workspace).await.unwrap_or_else(|e| {
        warn!("Failed to read projects: {}", e);
        vec![]
    });

    Probe {
        workspace_id,
        current,
        projects,
    }
}

/// 問い合わせ結果をタイマーに反映する。
///
/// 起動時はリモートを優先し、ローカルで計測中の場合はローカルを優先する。
pub fn apply(probe: &Probe, timer: &mut FocusTimer) -> Reconciliation {
    if timer.is_running() {
        if probe.workspace_id.is_some() {
            timer.set_workspace(probe.workspace_id);
        }
        return Reconciliation::KeptLocal;
    }

    timer.set_workspace(probe.workspace_id);
    if probe.workspace_id.is_none() {
        info!("No workspace available, running without remote sync");
        return Reconciliation::Offline;
    }

    match &probe.current {
        Some(entry) if timer.adopt(entry) => Reconciliation::Resumed {
            description: entry.label().to_string(),
        },
        _ => Reconciliation::Idle { candidate: None },
    }
}

/// 次に取り組むタスクの候補を返す。
///
/// キャッシュが有効ならそれを使い、そうでなければ今日が期限のタスクを取得してキャッシュする。
pub async fn candidate_task<C>(
    tasks: &TaskSource<C>,
    cache: &mut TaskCache,
    now: DateTime<Utc>,
    today: NaiveDate,
) -> Option<Task>
where
    C: TaskListRepository + ?Sized,
{
    if let Some(cached) = cache.get(now) {
        return cached.first().cloned();
    }

    match tasks.due_on(today).await {
        Ok(fetched) => {
            let first = fetched.first().cloned();
            cache.put(fetched, now);
            first
        }
        Err(e) => {
            warn!("Failed to fetch tasks: {}", e);
            None
        }
    }
}

/// 起動時の照合を行う。
///
/// Togglが設定されていない場合やワークスペースが分からない場合は、タスクも取得しない。
pub async fn reconcile<T, C>(
    toggl: Option<&T>,
    tasks: Option<&TaskSource<C>>,
    timer: &mut FocusTimer,
    cache: &mut TaskCache,
    now: DateTime<Utc>,
    today: NaiveDate,
) -> (Reconciliation, Vec<Project>)
where
    T: TogglRepository + ?Sized,
    C: TaskListRepository + ?Sized,
{
    let probe = match toggl {
        Some(toggl) => probe(toggl).await,
        None => Probe::default(),
    };

    let reconciliation = match apply(&probe, timer) {
        Reconciliation::Idle { .. } => {
            let candidate = match tasks {
                Some(tasks) => candidate_task(tasks, cache, now, today).await,
                None => None,
            };
            Reconciliation::Idle { candidate }
        }
        other => other,
    };
    info!("Reconciled: {:?}", reconciliation);

    (reconciliation, probe.projects)
}
