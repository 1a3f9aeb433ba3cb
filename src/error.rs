use reqwest::StatusCode;
use thiserror::Error;

/// 外部APIとの同期で発生するエラー。
///
/// 呼び出し側はこのエラーを伝播させず、ログに残した上で空の結果として扱う。
#[derive(Debug, Error)]
pub enum SyncError {
    /// 通信自体に失敗した(タイムアウトを含む)。
    #[error("transport error: {0}")]
    Transport(String),
    /// 成功以外のステータスが返された。
    #[error("unexpected status: {0}")]
    Status(StatusCode),
    /// レスポンスを解釈できなかった。
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    /// ローカルとリモートの状態が食い違っている。
    #[error("inconsistent state: {0}")]
    Inconsistent(String),
}

impl SyncError {
    /// reqwestのエラーを種類ごとに振り分ける。
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::MalformedResponse(err.to_string())
        } else if let Some(status) = err.status() {
            Self::Status(status)
        } else {
            Self::Transport(err.to_string())
        }
    }
}
