use chrono::NaiveDate;
use log::info;

/// 日付の変化を検出する。
#[derive(Debug)]
pub struct DayRollover {
    last_seen: NaiveDate,
}

impl DayRollover {
    pub fn new(today: NaiveDate) -> Self {
        Self { last_seen: today }
    }

    /// 最後に確認した日付を返す。
    pub fn today(&self) -> NaiveDate {
        self.last_seen
    }

    /// 前回から日付が変わっていれば`true`を返し、記録する日付を更新する。
    pub fn observe(&mut self, today: NaiveDate) -> bool {
        if today == self.last_seen {
            return false;
        }

        info!("Date changed: {} -> {}", self.last_seen, today);
        self.last_seen = today;
        true
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::DayRollover;

    #[test]
    fn test_observe_same_day() {
        let today = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let mut rollover = DayRollover::new(today);

        assert!(!rollover.observe(today));
    }

    /// 日付が変わった最初の1回だけ検出する。
    #[test]
    fn test_observe_rollover_once() {
        let yesterday = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let today = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let mut rollover = DayRollover::new(yesterday);

        assert!(rollover.observe(today));
        assert_eq!(rollover.today(), today);
        assert!(!rollover.observe(today));
        assert!(!rollover.observe(today));
    }
}
