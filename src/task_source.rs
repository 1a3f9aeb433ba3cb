use std::sync::Arc;

use chrono::NaiveDate;
use log::warn;

use crate::clickup::TaskListRepository;
use crate::error::SyncError;
use crate::task::{DueWindow, Task};

/// 対象のタスクリストとリポジトリの組。
pub struct TaskSource<C: ?Sized> {
    repository: Arc<C>,
    list_id: String,
}

impl<C> Clone for TaskSource<C>
where
    C: ?Sized,
{
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            list_id: self.list_id.clone(),
        }
    }
}

impl<C: TaskListRepository + ?Sized> TaskSource<C> {
    /// 新しい`TaskSource`を返す。
    ///
    /// # Arguments
    ///
    /// * `repository` - タスクを取得するリポジトリ
    /// * `list_id` - 対象のタスクリストID
    pub fn new(repository: Arc<C>, list_id: &str) -> Self {
        Self {
            repository,
            list_id: list_id.to_string(),
        }
    }

    /// Localタイムゾーンで`today`に期限があるタスクを取得する。
    pub async fn due_on(&self, today: NaiveDate) -> Result<Vec<Task>, SyncError> {
        let window = match DueWindow::for_day(today) {
            Some(window) => window,
            None => {
                warn!("Could not resolve local midnight for {}", today);
                return Err(SyncError::Inconsistent(format!(
                    "no local midnight on {}",
                    today
                )));
            }
        };

        let tasks = self
            .repository
            .fetch_tasks(&self.list_id, Some(window))
            .await?;

        Ok(tasks
            .into_iter()
            .filter(|task| window.admits(task))
            .collect())
    }

    /// 期限に関係なくタスクを取得する。
    pub async fn all(&self) -> Result<Vec<Task>, SyncError> {
        self.repository.fetch_tasks(&self.list_id, None).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Local, NaiveDate, NaiveTime, TimeZone};

    use super::TaskSource;
    use crate::clickup::MockTaskListRepository;
    use crate::task::{DueDate, DueWindow, Task};

    #[tokio::test]
    async fn test_due_on_passes_window() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        let expected = DueWindow::for_day(today);
        let mut repository = MockTaskListRepository::new();
        repository
            .expect_fetch_tasks()
            .withf(move |list_id, due| list_id == "901" && *due == expected)
            .times(1)
            .returning(|_, _| Ok(vec![]));

        let source = TaskSource::new(Arc::new(repository), "901");

        assert!(source.due_on(today).await.unwrap().is_empty());
    }

    /// 翌日00:00から1ミリ秒後が期限のタスクは除く。
    #[tokio::test]
    async fn test_due_on_drops_tasks_outside_window() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        let midnight = Local
            .from_local_datetime(&today.and_time(NaiveTime::MIN))
            .earliest()
            .unwrap()
            .to_utc();
        let due_at = move |id: &str, offset: Duration| Task {
            id: id.to_string(),
            name: id.to_string(),
            due: Some(DueDate::At(midnight + offset)),
        };
        let mut repository = MockTaskListRepository::new();
        repository.expect_fetch_tasks().returning(move |_, _| {
            Ok(vec![
                due_at("midnight", Duration::zero()),
                due_at("next", Duration::days(1) + Duration::milliseconds(1)),
            ])
        });

        let source = TaskSource::new(Arc::new(repository), "901");
        let tasks = source.due_on(today).await.unwrap();

        assert_eq!(
            tasks.iter().map(|t| t.id.as_str()).collect::<Vec<_>>(),
            vec!["midnight"]
        );
    }

    #[tokio::test]
    async fn test_all_without_window() {
        let mut repository = MockTaskListRepository::new();
        repository
            .expect_fetch_tasks()
            .withf(|_, due| due.is_none())
            .times(1)
            .returning(|_, _| Ok(vec![]));

        let source = TaskSource::new(Arc::new(repository), "901");

        assert!(source.all().await.is_ok());
    }
}
