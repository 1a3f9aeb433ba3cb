use chrono::{DateTime, Duration, Local, NaiveDate, NaiveTime, TimeZone, Utc};

/// タスクの期限。
#[derive(Clone, Debug, PartialEq)]
pub enum DueDate {
    /// 日付のみの期限。
    Date(NaiveDate),
    /// 時刻まで指定された期限。
    At(DateTime<Utc>),
}

impl DueDate {
    /// ClickUpのエポックミリ秒から期限を作る。
    ///
    /// 日付のみの場合はLocalタイムゾーンでの日付として扱う。
    pub fn from_millis(millis: i64, has_time: bool) -> Option<Self> {
        let at = DateTime::<Utc>::from_timestamp_millis(millis)?;
        if has_time {
            Some(Self::At(at))
        } else {
            Some(Self::Date(at.with_timezone(&Local).date_naive()))
        }
    }

    /// 期限をエポックミリ秒で返す。日付のみの場合はLocalタイムゾーンでのその日の始まり。
    pub fn millis(&self) -> Option<i64> {
        match self {
            Self::Date(date) => local_midnight(*date).map(|dt| dt.timestamp_millis()),
            Self::At(at) => Some(at.timestamp_millis()),
        }
    }
}

/// タスクリストから取得したタスク。取得後は変更しない。
#[derive(Clone, Debug, PartialEq)]
pub struct Task {
    pub id: String,
    pub name: String,
    pub due: Option<DueDate>,
}

/// 期限で絞り込むための範囲。`start_ms <= due < end_ms + 1`を満たす期限が対象になる。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DueWindow {
    pub start_ms: i64,
    pub end_ms: i64,
}

impl DueWindow {
    /// Localタイムゾーンで指定された日の00:00:00から翌日の00:00:00直前までの範囲を返す。
    pub fn for_day(date: NaiveDate) -> Option<Self> {
        let start = local_midnight(date)?;
        let next = local_midnight(date.succ_opt()?)?;
        let end = next - Duration::milliseconds(1);

        Some(Self {
            start_ms: start.timestamp_millis(),
            end_ms: end.timestamp_millis(),
        })
    }

    /// 期限(エポックミリ秒)が範囲に含まれるかを返す。
    pub fn contains(&self, due_ms: i64) -> bool {
        self.start_ms <= due_ms && due_ms < self.end_ms + 1
    }

    /// タスクを範囲で絞り込む時に残すかどうかを返す。期限のないタスクは残す。
    pub fn admits(&self, task: &Task) -> bool {
        task.due
            .as_ref()
            .and_then(DueDate::millis)
            .map_or(true, |due_ms| self.contains(due_ms))
    }

    /// APIに渡す`due_date_gt`と`due_date_lt`の値を返す。どちらも境界を含まない。
    pub fn query_bounds(&self) -> (i64, i64) {
        (self.start_ms - 1, self.end_ms + 1)
    }
}

/// Localタイムゾーンでの日付の始まりをUTCで返す。
fn local_midnight(date: NaiveDate) -> Option<DateTime<Utc>> {
    Local
        .from_local_datetime(&date.and_time(NaiveTime::MIN))
        .earliest()
        .map(|dt| dt.to_utc())
}
