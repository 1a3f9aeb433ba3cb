use std::io::Write;

use anyhow::{Context, Result};
use chrono::Local;

use crate::reconcile::Reconciliation;
use crate::task::{DueDate, Task};
use crate::time_entry::Project;

/// Consoleにタスクやタイマーを表示するためのtrait。
pub trait ConsolePresenter {
    /// タスク一覧を表示する。
    ///
    /// # Arguments
    ///
    /// * `tasks` - 表示するタスク
    fn show_tasks(&mut self, tasks: &[Task]) -> Result<()>;

    /// 照合の結果と経過時間を表示する。
    fn show_status(&mut self, reconciliation: &Reconciliation, display: &str) -> Result<()>;

    /// プロジェクト一覧を表示する。
    fn show_projects(&mut self, projects: &[Project]) -> Result<()>;

    /// HUDの1行を上書き表示する。
    fn show_line(&mut self, line: &str) -> Result<()>;

    /// 通知を1行表示する。
    fn show_notice(&mut self, notice: &str) -> Result<()>;
}

/// Markdownのlist形式で表示する。
pub struct ConsoleMarkdownList<'a, W: Write> {
    writer: &'a mut W,
}

impl<'a, W: Write> ConsoleMarkdownList<'a, W> {
    /// 新しい`ConsoleMarkdownList`を返す。
    pub fn new(writer: &'a mut W) -> Self {
        Self { writer }
    }
}

impl<'a, W: Write> ConsolePresenter for ConsoleMarkdownList<'a, W> {
    // タスクを番号付きのlist形式で表示する。番号は`s <n>`での選択に使う。
    fn show_tasks(&mut self, tasks: &[Task]) -> Result<()> {
        if tasks.is_empty() {
            writeln!(self.writer, "No active tasks").context("Failed to write tasks")?;
            return Ok(());
        }

        for (index, task) in tasks.iter().enumerate() {
            writeln!(
                self.writer,
                "{}. {}{}",
                index + 1,
                task.name,
                format_due(task.due.as_ref())
            )
            .with_context(|| format!("Failed to write task: {:?}", task))?;
        }

        Ok(())
    }

    fn show_status(&mut self, reconciliation: &Reconciliation, display: &str) -> Result<()> {
        let line = match reconciliation {
            Reconciliation::Offline => format!("- offline: {}", display),
            Reconciliation::Resumed { description } => {
                format!("- running {}: {}", display, description)
            }
            Reconciliation::KeptLocal => format!("- running {} (local)", display),
            Reconciliation::Idle { candidate } => format!(
                "- idle {}: {}",
                display,
                candidate
                    .as_ref()
                    .map(|task| task.name.as_str())
                    .unwrap_or("No active tasks")
            ),
        };

        writeln!(self.writer, "{}", line).context("Failed to write status")
    }

    fn show_projects(&mut self, projects: &[Project]) -> Result<()> {
        for project in projects {
            writeln!(self.writer, "  - [{}] {}", project.id, project.name)
                .with_context(|| format!("Failed to write project: {:?}", project))?;
        }

        Ok(())
    }

    fn show_line(&mut self, line: &str) -> Result<()> {
        write!(self.writer, "\r\x1b[2K{}", line).context("Failed to write hud line")?;
        self.writer.flush().context("Failed to flush hud line")
    }

    fn show_notice(&mut self, notice: &str) -> Result<()> {
        writeln!(self.writer, "\r\x1b[2K{}", notice).context("Failed to write notice")
    }
}

/// 期限を表示用の文字列にする。
fn format_due(due: Option<&DueDate>) -> String {
    match due {
        Some(DueDate::Date(date)) => format!(" (due {})", date),
        Some(DueDate::At(at)) => format!(
            " (due {})",
            at.with_timezone(&Local).format("%Y-%m-%d %H:%M")
        ),
        None => String::new(),
    }
}
