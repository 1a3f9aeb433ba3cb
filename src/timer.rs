use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};

use crate::error::SyncError;
use crate::time_entry::TimeEntry;
use crate::toggl::TogglRepository;

/// 計測していない時の表示。
pub const IDLE_DISPLAY: &str = "00:00";

/// リモートに作成したタイムエントリーの識別子。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RemoteEntry {
    pub id: i64,
    pub workspace_id: i64,
}

/// 計測の状態。
#[derive(Clone, Debug, PartialEq)]
pub enum SessionState {
    Idle,
    Running {
        start: DateTime<Utc>,
        /// リモートのエントリーを特定できていない場合は`None`。
        remote: Option<RemoteEntry>,
        description: String,
        /// 計測を開始するたびに増える番号。遅れて届いた応答の照合に使う。
        session: u64,
    },
}

/// リモートでのタイムエントリー開始処理。
#[derive(Clone, Debug, PartialEq)]
pub struct StartJob {
    pub session: u64,
    pub workspace_id: i64,
    pub description: String,
    pub project_id: Option<i64>,
}

/// リモートでのタイムエントリー停止処理。
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StopJob {
    pub entry: RemoteEntry,
}

/// 再生と一時停止を管理するローカルのタイマー。
///
/// 状態遷移はネットワークを待たずにローカルで即座に行い、リモートへの反映が必要な場合は
/// `StartJob`/`StopJob`を返す。リモートへの反映に失敗してもローカルの状態は戻さない。
#[derive(Debug)]
pub struct FocusTimer {
    state: SessionState,
    workspace_id: Option<i64>,
    sessions: u64,
    /// 再生・一時停止・引き継ぎのたびに増える番号。
    revision: u64,
}

impl Default for FocusTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl FocusTimer {
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
            workspace_id: None,
            sessions: 0,
            revision: 0,
        }
    }

    pub fn set_workspace(&mut self, workspace_id: Option<i64>) {
        self.workspace_id = workspace_id;
    }

    #[cfg(test)]
    pub fn workspace_id(&self) -> Option<i64> {
        self.workspace_id
    }

    #[cfg(test)]
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// 状態が変わるたびに増える番号を返す。問い合わせ中に操作されたかの判定に使う。
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, SessionState::Running { .. })
    }

    /// 計測中のタスク名を返す。
    pub fn description(&self) -> Option<&str> {
        match &self.state {
            SessionState::Running { description, .. } => Some(description),
            SessionState::Idle => None,
        }
    }

    /// 計測を開始する。
    ///
    /// 開始時刻はネットワーク処理より前に記録する。ワークスペースが分かっている場合だけ
    /// リモートで開始するための`StartJob`を返す。
    pub fn play(
        &mut self,
        description: &str,
        project_id: Option<i64>,
        now: DateTime<Utc>,
    ) -> Option<StartJob> {
        if self.is_running() {
            debug!("Timer is already running");
            return None;
        }

        self.sessions += 1;
        self.revision += 1;
        self.state = SessionState::Running {
            start: now,
            remote: None,
            description: description.to_string(),
            session: self.sessions,
        };
        info!("Timer started: {}", description);

        self.workspace_id.map(|workspace_id| StartJob {
            session: self.sessions,
            workspace_id,
            description: description.to_string(),
            project_id,
        })
    }

    /// 計測を止める。
    ///
    /// リモートのエントリーを特定できている場合だけ`StopJob`を返す。識別子は結果に関わらず破棄する。
    pub fn pause(&mut self) -> Option<StopJob> {
        match std::mem::replace(&mut self.state, SessionState::Idle) {
            SessionState::Running { remote, .. } => {
                self.revision += 1;
                info!("Timer paused");
                if remote.is_none() {
                    debug!("No remote entry to stop");
                }
                remote.map(|entry| StopJob { entry })
            }
            SessionState::Idle => None,
        }
    }

    /// リモートで計測中のエントリーを引き継ぐ。経過時間はエントリーの開始時刻から数える。
    pub fn adopt(&mut self, entry: &TimeEntry) -> bool {
        if !entry.is_running() {
            return false;
        }

        self.sessions += 1;
        self.revision += 1;
        self.state = SessionState::Running {
            start: entry.start,
            remote: Some(RemoteEntry {
                id: entry.id,
                workspace_id: entry.workspace_id,
            }),
            description: entry.label().to_string(),
            session: self.sessions,
        };
        info!("Resumed time entry {} started at {}", entry.id, entry.start);
        true
    }

    /// 開始処理で得たリモートのエントリーを計測中のセッションに結び付ける。
    ///
    /// 応答が届く前に一時停止されていた場合や別のセッションが始まっていた場合は、
    /// 取り残されたエントリーを止めるための`StopJob`を返す。
    pub fn attach_remote(&mut self, session: u64, entry: Option<TimeEntry>) -> Option<StopJob> {
        let entry = entry?;
        let remote = RemoteEntry {
            id: entry.id,
            workspace_id: entry.workspace_id,
        };

        match &mut self.state {
            SessionState::Running {
                remote: slot @ None,
                session: current,
                ..
            } if *current == session => {
                debug!("Attached remote entry {}", remote.id);
                *slot = Some(remote);
                None
            }
            _ => {
                warn!("Remote entry {} no longer matches the local session", remote.id);
                Some(StopJob { entry: remote })
            }
        }
    }

    /// 計測開始からの経過時間を返す。
    pub fn elapsed(&self, now: DateTime<Utc>) -> Option<Duration> {
        match &self.state {
            SessionState::Running { start, .. } => Some((now - *start).max(Duration::zero())),
            SessionState::Idle => None,
        }
    }

    /// 表示用の経過時間を返す。計測していない場合は`00:00`。
    pub fn display(&self, now: DateTime<Utc>) -> String {
        self.elapsed(now)
            .map(format_elapsed)
            .unwrap_or_else(|| IDLE_DISPLAY.to_string())
    }
}

/// 経過時間を1時間以上なら`H:MM:SS`、それ未満なら`MM:SS`で表す。
pub fn format_elapsed(elapsed: Duration) -> String {
    let total = elapsed.num_seconds().max(0);
    let (hours, minutes, seconds) = (total / 3600, total % 3600 / 60, total % 60);

    if hours >= 1 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

/// リモートでタイムエントリーを開始し、作成されたエントリーを読み直して返す。
///
/// 失敗した場合はログに残して`None`を返す。
pub async fn start_remote<T>(toggl: &T, job: &StartJob) -> Option<TimeEntry>
where
    T: TogglRepository + ?Sized,
{
    if let Err(e) = toggl
        .start_entry(&job.description, job.workspace_id, job.project_id)
        .await
    {
        warn!("Failed to start time entry '{}': {}", job.description, e);
        return None;
    }

    match toggl.current_entry().await {
        Ok(Some(entry)) if entry.is_running() => Some(entry),
        Ok(_) => {
            let e = SyncError::Inconsistent("no running entry after start".to_string());
            warn!("Failed to capture started time entry: {}", e);
            None
        }
        Err(e) => {
            warn!("Failed to capture started time entry: {}", e);
            None
        }
    }
}

/// リモートでタイムエントリーを停止する。失敗はログに残すだけで呼び出し側には返さない。
pub async fn stop_remote<T>(toggl: &T, job: &StopJob) -> bool
where
    T: TogglRepository + ?Sized,
{
    match toggl.stop_entry(job.entry.id, job.entry.workspace_id).await {
        Ok(()) => true,
        Err(e) => {
            warn!("Failed to stop time entry {}: {}", job.entry.id, e);
            false
        }
    }
}
