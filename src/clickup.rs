use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, info};
#[cfg(test)]
use mockall::automock;
use reqwest::{header::AUTHORIZATION, Client};
use serde::Deserialize;

use crate::error::SyncError;
use crate::task::{DueDate, DueWindow, Task};

const CLICKUP_API_URL: &str = "https://api.clickup.com/api/v2";

/// ClickUp APIのタスク一覧をデシリアライズするための構造体。
#[derive(Debug, Deserialize)]
struct ClickUpTasksResponse {
    #[serde(default)]
    tasks: Vec<ClickUpTask>,
}

/// ClickUp APIのタスクをデシリアライズするための構造体。
#[derive(Debug, Deserialize)]
struct ClickUpTask {
    id: String,
    name: Option<String>,
    due_date: Option<String>,
    #[serde(default)]
    due_date_time: bool,
}

impl ClickUpTask {
    fn into_task(self) -> Result<Task, SyncError> {
        let due = match self.due_date {
            Some(raw) => {
                let millis = raw.parse::<i64>().map_err(|e| {
                    SyncError::MalformedResponse(format!("invalid due_date '{}': {}", raw, e))
                })?;
                DueDate::from_millis(millis, self.due_date_time)
            }
            None => None,
        };

        Ok(Task {
            id: self.id,
            name: self.name.unwrap_or_default(),
            due,
        })
    }
}

/// タスクリストを取得するためのリポジトリ。
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TaskListRepository: Send + Sync {
    /// アーカイブ済みと完了済みを除いたタスクを、更新日時の新しい順に返す。
    ///
    /// `due`が指定された場合は、その範囲に期限があるタスクだけを返す。
    async fn fetch_tasks(
        &self,
        list_id: &str,
        due: Option<DueWindow>,
    ) -> Result<Vec<Task>, SyncError>;
}

/// ClickUp APIと通信するためのクライアント。
pub struct ClickUpClient {
    client: Client,
    api_url: String,
    api_token: String,
}

impl ClickUpClient {
    /// 新しい`ClickUpClient`を返す。
    ///
    /// # Arguments
    ///
    /// * `api_token` - ClickUpのAPIトークン
    pub fn new(api_token: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build http client")?;

        Ok(Self {
            client,
            api_url: CLICKUP_API_URL.to_string(),
            api_token: api_token.to_string(),
        })
    }

    /// 接続先のURLを差し替える。
    pub fn with_base_url(mut self, api_url: &str) -> Self {
        self.api_url = api_url.trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl TaskListRepository for ClickUpClient {
    async fn fetch_tasks(
        &self,
        list_id: &str,
        due: Option<DueWindow>,
    ) -> Result<Vec<Task>, SyncError> {
        let mut query = vec![
            ("archived", "false".to_string()),
            ("page", "0".to_string()),
            ("order_by", "updated".to_string()),
            ("reverse", "true".to_string()),
            ("include_closed", "false".to_string()),
        ];
        if let Some(window) = due {
            let (gt, lt) = window.query_bounds();
            query.push(("due_date_gt", gt.to_string()));
            query.push(("due_date_lt", lt.to_string()));
        }
        debug!("Fetching tasks of list {} with {:?}", list_id, query);

        let response = self
            .client
            .get(format!("{}/list/{}/task", self.api_url, list_id))
            .header(AUTHORIZATION, &self.api_token)
            .query(&query)
            .send()
            .await
            .map_err(SyncError::from_reqwest)?
            .error_for_status()
            .map_err(SyncError::from_reqwest)?
            .json::<ClickUpTasksResponse>()
            .await
            .map_err(|e| SyncError::MalformedResponse(e.to_string()))?;
        info!("length of tasks: {}", response.tasks.len());

        response
            .tasks
            .into_iter()
            .map(ClickUpTask::into_task)
            .collect()
    }
}
