use log::info;

use crate::cache::TaskCache;
use crate::clickup::TaskListRepository;
use crate::datetime;
use crate::reconcile::{reconcile, Reconciliation};
use crate::task_source::TaskSource;
use crate::time_entry::Project;
use crate::timer::FocusTimer;
use crate::toggl::TogglRepository;

/// `status`サブコマンドの引数。
#[derive(Debug, clap::Args)]
pub struct StatusArgs {
    #[clap(long = "projects", help = "Also lists the active projects of the workspace")]
    pub projects: bool,
}

/// `status`サブコマンドの結果。
#[derive(Debug)]
pub struct StatusReport {
    pub reconciliation: Reconciliation,
    pub display: String,
    pub projects: Vec<Project>,
}

pub struct StatusCommand<'a, T: ?Sized, C: ?Sized> {
    toggl: Option<&'a T>,
    tasks: Option<&'a TaskSource<C>>,
}

impl<'a, T, C> StatusCommand<'a, T, C>
where
    T: TogglRepository + ?Sized,
    C: TaskListRepository + ?Sized,
{
    /// 新しい`StatusCommand`を返す。
    ///
    /// # Arguments
    /// * `toggl` - Toggl APIと通信するためのリポジトリ
    /// * `tasks` - タスクの取得元
    pub fn new(toggl: Option<&'a T>, tasks: Option<&'a TaskSource<C>>) -> Self {
        Self { toggl, tasks }
    }

    /// `status`サブコマンドの処理を行う。
    ///
    /// 起動時と同じ照合を1回だけ行い、計測中ならその経過時間を、そうでなければ次のタスクの候補を返す。
    pub async fn run(&self) -> StatusReport {
        let mut timer = FocusTimer::new();
        let mut cache = TaskCache::new();
        let now = datetime::now();

        let (reconciliation, projects) = reconcile(
            self.toggl,
            self.tasks,
            &mut timer,
            &mut cache,
            now,
            datetime::today(),
        )
        .await;
        info!("Status retrieved successfully.");

        StatusReport {
            reconciliation,
            display: timer.display(now),
            projects,
        }
    }
}
