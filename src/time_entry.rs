use chrono::{DateTime, Utc};

/// タスク名のないエントリーの表示名。
pub const NO_DESCRIPTION: &str = "No Description";

/// Togglのタイムエントリー。
#[derive(Clone, Debug, PartialEq)]
pub struct TimeEntry {
    pub id: i64,
    pub workspace_id: i64,
    pub description: String,
    pub start: DateTime<Utc>,
    /// 負の値は計測中であることを表す。絶対値は経過時間ではない。
    pub duration: i64,
}

impl TimeEntry {
    /// 計測中のエントリーかどうかを返す。
    pub fn is_running(&self) -> bool {
        self.duration < 0
    }

    /// 表示用のタスク名を返す。タスク名がなければ`No Description`。
    pub fn label(&self) -> &str {
        if self.description.is_empty() {
            NO_DESCRIPTION
        } else {
            &self.description
        }
    }
}

/// Togglのプロジェクト。
#[derive(Clone, Debug, PartialEq)]
pub struct Project {
    pub id: i64,
    pub name: String,
}
