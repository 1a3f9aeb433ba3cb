use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::DateTime;
use log::{debug, info};
#[cfg(test)]
use mockall::automock;
use reqwest::{header::CONTENT_TYPE, Client, RequestBuilder};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::datetime;
use crate::error::SyncError;
use crate::time_entry::{Project, TimeEntry};

const TOGGL_API_URL: &str = "https://api.track.toggl.com/api/v9";

/// 作成したタイムエントリーに付けるタグとクライアント名。
const CREATED_WITH: &str = "FocusHUD";

/// Toggl APIのタイムエントリーをデシリアライズするための構造体。
#[derive(Debug, Deserialize)]
struct TogglTimeEntry {
    id: i64,
    workspace_id: i64,
    description: Option<String>,
    start: String,
    duration: i64,
}

impl TryFrom<TogglTimeEntry> for TimeEntry {
    type Error = SyncError;

    fn try_from(entry: TogglTimeEntry) -> Result<Self, Self::Error> {
        let start = DateTime::parse_from_rfc3339(&entry.start)
            .map_err(|e| {
                SyncError::MalformedResponse(format!("invalid start '{}': {}", entry.start, e))
            })?
            .to_utc();

        Ok(TimeEntry {
            id: entry.id,
            workspace_id: entry.workspace_id,
            description: entry.description.unwrap_or_default(),
            start,
            duration: entry.duration,
        })
    }
}

/// Toggl APIのユーザー情報をデシリアライズするための構造体。
#[derive(Debug, Deserialize)]
struct TogglUser {
    default_workspace_id: Option<i64>,
}

/// Toggl APIのプロジェクト情報をデシリアライズするための構造体。
#[derive(Debug, Deserialize)]
struct TogglProject {
    id: i64,
    name: String,
}

/// タイムエントリー開始時に送信する本文。
#[derive(Debug, Serialize)]
struct NewTimeEntry<'a> {
    description: &'a str,
    tags: [&'a str; 1],
    workspace_id: i64,
    project_id: Option<i64>,
    created_with: &'a str,
    start: String,
    duration: i64,
}

/// タイムエントリーを操作するためのリポジトリ。
///
/// どの操作も1回だけ試行し、再試行はしない。失敗は`SyncError`として返し、扱いは呼び出し側に任せる。
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TogglRepository: Send + Sync {
    /// 計測中のタイムエントリーを返す。計測中のものがなければ`None`。
    async fn current_entry(&self) -> Result<Option<TimeEntry>, SyncError>;

    /// 新しいタイムエントリーを計測中の状態で作成する。
    ///
    /// 同じワークスペースで計測中のエントリーがないことは呼び出し側が保証する。
    async fn start_entry(
        &self,
        description: &str,
        workspace_id: i64,
        project_id: Option<i64>,
    ) -> Result<(), SyncError>;

    /// 計測中のタイムエントリーを停止する。
    async fn stop_entry(&self, entry_id: i64, workspace_id: i64) -> Result<(), SyncError>;

    /// 既定のワークスペースIDを返す。
    async fn default_workspace(&self) -> Result<Option<i64>, SyncError>;

    /// ワークスペースの有効なプロジェクト一覧を返す。
    async fn projects(&self, workspace_id: i64) -> Result<Vec<Project>, SyncError>;
}

/// Toggl APIと通信するためのクライアント。
///
/// # Examples
///
/// ```
/// let client = TogglClient::new("api-token").unwrap();
/// let current = client.current_entry().await;
/// ```
pub struct TogglClient {
    client: Client,
    api_url: String,
    api_token: String,
}

impl TogglClient {
    /// 新しい`TogglClient`を返す。
    ///
    /// # Arguments
    ///
    /// * `api_token` - TogglのAPIトークン
    pub fn new(api_token: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build http client")?;

        Ok(Self {
            client,
            api_url: TOGGL_API_URL.to_string(),
            api_token: api_token.to_string(),
        })
    }

    /// 接続先のURLを差し替える。
    pub fn with_base_url(mut self, api_url: &str) -> Self {
        self.api_url = api_url.trim_end_matches('/').to_string();
        self
    }

    /// 認証ヘッダーを付けたリクエストを作る。
    fn request(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}/{}", self.api_url, path))
            .basic_auth(&self.api_token, Some("api_token"))
            .header(CONTENT_TYPE, "application/json")
    }

    /// リクエストを送信し、成功ステータスであることを確認する。
    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response, SyncError> {
        request
            .send()
            .await
            .map_err(SyncError::from_reqwest)?
            .error_for_status()
            .map_err(SyncError::from_reqwest)
    }

    /// GETリクエストを送信してJSONをデシリアライズする。
    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, SyncError> {
        self.send(self.request(reqwest::Method::GET, path))
            .await?
            .json::<T>()
            .await
            .map_err(|e| SyncError::MalformedResponse(e.to_string()))
    }
}

#[async_trait]
impl TogglRepository for TogglClient {
    async fn current_entry(&self) -> Result<Option<TimeEntry>, SyncError> {
        let entry = self
            .get_json::<Option<TogglTimeEntry>>("me/time_entries/current")
            .await?;
        debug!("Current time entry: {:?}", entry);

        entry.map(TimeEntry::try_from).transpose()
    }

    async fn start_entry(
        &self,
        description: &str,
        workspace_id: i64,
        project_id: Option<i64>,
    ) -> Result<(), SyncError> {
        let body = NewTimeEntry {
            description,
            tags: [CREATED_WITH],
            workspace_id,
            project_id,
            created_with: CREATED_WITH,
            start: datetime::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            duration: -1,
        };
        let request = self
            .request(
                reqwest::Method::POST,
                &format!("workspaces/{}/time_entries", workspace_id),
            )
            .json(&body);
        self.send(request).await?;
        info!("Started time entry: {}", description);

        Ok(())
    }

    async fn stop_entry(&self, entry_id: i64, workspace_id: i64) -> Result<(), SyncError> {
        let request = self.request(
            reqwest::Method::PATCH,
            &format!("workspaces/{}/time_entries/{}/stop", workspace_id, entry_id),
        );
        self.send(request).await?;
        info!("Stopped time entry: {}", entry_id);

        Ok(())
    }

    async fn default_workspace(&self) -> Result<Option<i64>, SyncError> {
        let user = self.get_json::<TogglUser>("me").await?;

        Ok(user.default_workspace_id)
    }

    async fn projects(&self, workspace_id: i64) -> Result<Vec<Project>, SyncError> {
        let projects = self
            .get_json::<Vec<TogglProject>>(&format!(
                "workspaces/{}/projects?active=true",
                workspace_id
            ))
            .await?;
        info!("length of projects: {}", projects.len());

        Ok(projects
            .into_iter()
            .map(|project| Project {
                id: project.id,
                name: project.name,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use chrono::{TimeZone, Utc};
    use mockito::{Matcher, Server};
    use once_cell::sync::Lazy;
    use serde_json::json;

    use super::{TogglClient, TogglRepository};
    use crate::datetime::mock_datetime;
    use crate::error::SyncError;

    const TOKEN: &str = "secret-token";

    static AUTHORIZATION: Lazy<String> =
        Lazy::new(|| format!("Basic {}", STANDARD.encode(format!("{}:api_token", TOKEN))));

    fn client(server: &Server) -> TogglClient {
        TogglClient::new(TOKEN).unwrap().with_base_url(&server.url())
    }

    /// 計測中のエントリーはUTCに変換して返す。
    #[tokio::test]
    async fn test_current_entry_running() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/me/time_entries/current")
            .match_header("authorization", AUTHORIZATION.as_str())
            .with_status(200)
            .with_body(
                json!({
                    "id": 42,
                    "workspace_id": 7,
                    "description": "Write report",
                    "start": "2024-01-01T09:00:00+09:00",
                    "duration": -1704067200,
                })
                .to_string(),
            )
            .create_async()
            .await;

        let entry = client(&server).current_entry().await.unwrap().unwrap();

        mock.assert_async().await;
        assert_eq!(entry.id, 42);
        assert_eq!(entry.workspace_id, 7);
        assert_eq!(entry.description, "Write report");
        assert_eq!(entry.start, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert!(entry.is_running());
    }

    /// 計測中のエントリーがない場合はnullが返る。
    #[tokio::test]
    async fn test_current_entry_none() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/me/time_entries/current")
            .with_status(200)
            .with_body("null")
            .create_async()
            .await;

        assert_eq!(client(&server).current_entry().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_current_entry_malformed() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/me/time_entries/current")
            .with_status(200)
            .with_body("{\"id\": \"oops\"}")
            .create_async()
            .await;

        let result = client(&server).current_entry().await;

        assert!(matches!(result, Err(SyncError::MalformedResponse(_))));
    }

    #[tokio::test]
    async fn test_start_entry_sends_running_sentinel() {
        mock_datetime::set_mock_time(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/workspaces/7/time_entries")
            .match_header("authorization", AUTHORIZATION.as_str())
            .match_body(Matcher::PartialJson(json!({
                "description": "Write report",
                "tags": ["FocusHUD"],
                "workspace_id": 7,
                "project_id": 3,
                "start": "2024-01-01T00:00:00Z",
                "duration": -1,
            })))
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let result = client(&server).start_entry("Write report", 7, Some(3)).await;

        mock.assert_async().await;
        assert!(result.is_ok());
        mock_datetime::clear_mock_time();
    }

    /// 停止済みのエントリーを停止しても、エラーとして返るだけで呼び出し側は継続できる。
    #[tokio::test]
    async fn test_stop_entry_twice() {
        let mut server = Server::new_async().await;
        let first = server
            .mock("PATCH", "/workspaces/7/time_entries/42/stop")
            .with_status(200)
            .with_body("{}")
            .expect(1)
            .create_async()
            .await;
        let toggl = client(&server);

        assert!(toggl.stop_entry(42, 7).await.is_ok());
        first.assert_async().await;
        first.remove_async().await;

        let _second = server
            .mock("PATCH", "/workspaces/7/time_entries/42/stop")
            .with_status(409)
            .create_async()
            .await;
        let result = toggl.stop_entry(42, 7).await;

        assert!(matches!(result, Err(SyncError::Status(status)) if status.as_u16() == 409));
    }

    #[tokio::test]
    async fn test_default_workspace() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/me")
            .with_status(200)
            .with_body(json!({"id": 1, "default_workspace_id": 7}).to_string())
            .create_async()
            .await;

        assert_eq!(client(&server).default_workspace().await.unwrap(), Some(7));
    }

    #[tokio::test]
    async fn test_default_workspace_unauthorized() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/me")
            .with_status(403)
            .create_async()
            .await;

        let result = client(&server).default_workspace().await;

        assert!(matches!(result, Err(SyncError::Status(_))));
    }

    #[tokio::test]
    async fn test_projects() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/workspaces/7/projects")
            .match_query(Matcher::UrlEncoded("active".into(), "true".into()))
            .with_status(200)
            .with_body(
                json!([
                    {"id": 1, "name": "Internal", "color": "#fff"},
                    {"id": 2, "name": "Client"},
                ])
                .to_string(),
            )
            .create_async()
            .await;

        let projects = client(&server).projects(7).await.unwrap();

        assert_eq!(
            projects.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(),
            vec!["Internal", "Client"]
        );
    }

    /// 接続できない場合は通信エラーになる。
    #[tokio::test]
    async fn test_transport_error() {
        let toggl = TogglClient::new(TOKEN)
            .unwrap()
            .with_base_url("http://127.0.0.1:1");

        let result = toggl.current_entry().await;

        assert!(matches!(result, Err(SyncError::Transport(_))));
    }
}
