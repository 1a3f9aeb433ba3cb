use anyhow::{Context, Result};
use log::info;

use crate::clickup::TaskListRepository;
use crate::datetime;
use crate::task::Task;
use crate::task_source::TaskSource;

/// `tasks`サブコマンドの引数。
#[derive(Debug, clap::Args)]
pub struct TasksArgs {
    #[clap(short = 'a', long = "all", help = "Shows tasks regardless of the due date")]
    pub all: bool,
}

pub struct TasksCommand<'a, C: ?Sized> {
    tasks: &'a TaskSource<C>,
}

impl<'a, C: TaskListRepository + ?Sized> TasksCommand<'a, C> {
    /// 新しい`TasksCommand`を返す。
    pub fn new(tasks: &'a TaskSource<C>) -> Self {
        Self { tasks }
    }

    /// `tasks`サブコマンドの処理を行う。
    ///
    /// Localタイムゾーンで今日が期限のタスクを取得する。`--all`が指定された場合は期限で絞り込まない。
    pub async fn run(&self, args: TasksArgs) -> Result<Vec<Task>> {
        let tasks = if args.all {
            self.tasks.all().await
        } else {
            self.tasks.due_on(datetime::today()).await
        }
        .context("Failed to retrieve tasks")?;
        info!("Tasks retrieved successfully.");

        Ok(tasks)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rstest::rstest;

    use super::{TasksArgs, TasksCommand};
    use crate::clickup::MockTaskListRepository;
    use crate::error::SyncError;
    use crate::task_source::TaskSource;

    #[rstest]
    #[case::due_today(false)]
    #[case::all(true)]
    #[tokio::test]
    async fn test_tasks_command(#[case] all: bool) {
        let mut repository = MockTaskListRepository::new();
        repository
            .expect_fetch_tasks()
            .withf(move |list_id, due| list_id == "901" && due.is_none() == all)
            .times(1)
            .returning(|_, _| Ok(vec![]));
        let source = TaskSource::new(Arc::new(repository), "901");

        let result = TasksCommand::new(&source).run(TasksArgs { all }).await;

        assert!(result.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_tasks_command_failure() {
        let mut repository = MockTaskListRepository::new();
        repository
            .expect_fetch_tasks()
            .returning(|_, _| Err(SyncError::Transport("offline".to_string())));
        let source = TaskSource::new(Arc::new(repository), "901");

        let result = TasksCommand::new(&source).run(TasksArgs { all: true }).await;

        assert!(result.is_err());
    }
}
