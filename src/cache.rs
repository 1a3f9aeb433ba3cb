use chrono::{DateTime, Duration, Utc};

use crate::task::Task;

/// キャッシュの有効期間(分)。
const TTL_MINUTES: i64 = 15;

/// 直近に取得したタスク一覧を保持するキャッシュ。
///
/// 1回分の取得結果と取得時刻をまとめて保持し、部分的に更新することはない。
#[derive(Debug, Default)]
pub struct TaskCache {
    entry: Option<(Vec<Task>, DateTime<Utc>)>,
}

impl TaskCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 有効期間内で空でなければキャッシュしたタスク一覧を返す。
    pub fn get(&self, now: DateTime<Utc>) -> Option<&[Task]> {
        match &self.entry {
            Some((tasks, fetched_at))
                if !tasks.is_empty() && now < *fetched_at + Duration::minutes(TTL_MINUTES) =>
            {
                Some(tasks.as_slice())
            }
            _ => None,
        }
    }

    /// 取得結果と取得時刻をまとめて置き換える。
    pub fn put(&mut self, tasks: Vec<Task>, now: DateTime<Utc>) {
        self.entry = Some((tasks, now));
    }

    /// 次の`get`が必ず`None`を返すようにする。
    pub fn invalidate(&mut self) {
        self.entry = None;
    }
}
