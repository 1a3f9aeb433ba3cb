use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, info};
use serde::Deserialize;

/// 既定の設定ファイル名。
const SETTINGS_FILE: &str = "appsettings.json";

/// Togglの設定。
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct TogglSettings {
    pub api_token: Option<String>,
}

/// ClickUpの設定。
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct ClickUpSettings {
    pub api_token: Option<String>,
    pub list_id: Option<String>,
}

/// アプリケーションの設定。
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct Settings {
    #[serde(default)]
    pub toggl: TogglSettings,
    #[serde(default, rename = "ClickUp")]
    pub clickup: ClickUpSettings,
}

impl Settings {
    /// 設定ファイルを読み込み、環境変数で上書きする。
    ///
    /// パスが指定されていない場合は設定ディレクトリの`focushud/appsettings.json`を探し、
    /// 存在しなければ空の設定から始める。
    ///
    /// # Arguments
    ///
    /// * `path` - 設定ファイルのパス
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let settings = match path {
            Some(path) => Self::from_file(path)?,
            None => match default_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => {
                    debug!("No settings file found, using environment only");
                    Self::default()
                }
            },
        };

        Ok(settings.with_overrides(|key| std::env::var(key).ok()))
    }

    fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings: {}", path.display()))?;
        info!("Loaded settings from {}", path.display());

        Self::from_json(&text)
            .with_context(|| format!("Failed to parse settings: {}", path.display()))
    }

    /// JSON文字列から設定を読み込む。
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("Invalid settings json")
    }

    /// 空でない値が得られた項目を上書きする。
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(token) = lookup("TOGGL_API_TOKEN") {
            self.toggl.api_token = Some(token);
        }
        if let Some(token) = lookup("CLICKUP_API_TOKEN") {
            self.clickup.api_token = Some(token);
        }
        if let Some(list_id) = lookup("CLICKUP_LIST_ID") {
            self.clickup.list_id = Some(list_id);
        }

        self
    }

    /// Togglのトークンを返す。空文字は未設定として扱う。
    pub fn toggl_token(&self) -> Option<&str> {
        non_empty(&self.toggl.api_token)
    }

    /// ClickUpのトークンとリストIDを返す。どちらかが欠けていれば`None`。
    pub fn clickup(&self) -> Option<(&str, &str)> {
        Some((
            non_empty(&self.clickup.api_token)?,
            non_empty(&self.clickup.list_id)?,
        ))
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|value| !value.trim().is_empty())
}

fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("focushud").join(SETTINGS_FILE))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use rstest::rstest;

    use super::Settings;

    const FULL: &str = r#"{
        "Toggl": {"ApiToken": "toggl-token"},
        "ClickUp": {"ApiToken": "pk_clickup", "ListId": "901"}
    }"#;

    #[test]
    fn test_from_json() {
        let settings = Settings::from_json(FULL).unwrap();

        assert_eq!(settings.toggl_token(), Some("toggl-token"));
        assert_eq!(settings.clickup(), Some(("pk_clickup", "901")));
    }

    #[rstest]
    #[case::empty_object("{}")]
    #[case::empty_token(r#"{"Toggl": {"ApiToken": ""}}"#)]
    #[case::missing_list(r#"{"ClickUp": {"ApiToken": "pk"}}"#)]
    fn test_from_json_partial(#[case] json: &str) {
        let settings = Settings::from_json(json).unwrap();

        assert_eq!(settings.toggl_token(), None);
        assert_eq!(settings.clickup(), None);
    }

    #[test]
    fn test_from_json_invalid() {
        assert!(Settings::from_json("{\"Toggl\": ").is_err());
    }

    /// 環境変数の値は空でなければ設定ファイルより優先する。
    #[test]
    fn test_with_overrides() {
        let env = HashMap::from([
            ("TOGGL_API_TOKEN", "env-token"),
            ("CLICKUP_API_TOKEN", " "),
            ("CLICKUP_LIST_ID", "777"),
        ]);

        let settings = Settings::from_json(FULL)
            .unwrap()
            .with_overrides(|key| env.get(key).map(|value| value.to_string()));

        assert_eq!(settings.toggl_token(), Some("env-token"));
        assert_eq!(settings.clickup(), Some(("pk_clickup", "777")));
    }
}
