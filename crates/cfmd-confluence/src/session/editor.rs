//! External editor collaborator.

use std::path::Path;
use std::process::Command;

use tracing::info;

use crate::error::ConfluenceError;

/// Editors probed on `PATH` when nothing is configured.
const FALLBACK_EDITORS: &[&str] = &["vim", "nano", "vi", "notepad"];

/// How the editor process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorExit {
    Success,
    /// Non-zero exit, with the code when the platform reports one.
    Failed(Option<i32>),
}

/// Interactive editor granted exclusive access to the scratch file.
pub trait Editor {
    /// Open `path` and block until the editor terminates.
    fn edit(&self, path: &Path) -> Result<EditorExit, ConfluenceError>;
}

/// Editor launched as a child process with the file path appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandEditor {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandEditor {
    /// Resolve the editor: `configured`, then `$VISUAL`, then `$EDITOR`,
    /// then the first of vim, nano, vi, notepad on `PATH`.
    pub fn resolve(configured: Option<&str>) -> Result<Self, ConfluenceError> {
        Self::resolve_with(
            configured,
            |name| std::env::var(name).ok(),
            |program| which::which(program).is_ok(),
        )
    }

    fn resolve_with(
        configured: Option<&str>,
        env: impl Fn(&str) -> Option<String>,
        exists: impl Fn(&str) -> bool,
    ) -> Result<Self, ConfluenceError> {
        let candidates = [
            configured.map(str::to_owned),
            env("VISUAL"),
            env("EDITOR"),
        ];

        for command in candidates.into_iter().flatten() {
            if let Some(editor) = Self::parse(&command)
                && exists(&editor.program)
            {
                return Ok(editor);
            }
        }

        FALLBACK_EDITORS
            .iter()
            .find(|program| exists(program))
            .map(|program| Self {
                program: (*program).to_owned(),
                args: Vec::new(),
            })
            .ok_or_else(|| {
                ConfluenceError::Editor(
                    "no editor found; set settings.editor, $VISUAL or $EDITOR".to_owned(),
                )
            })
    }

    /// Split a command line on whitespace into program and arguments.
    fn parse(command: &str) -> Option<Self> {
        let mut parts = command.split_whitespace().map(str::to_owned);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
        })
    }
}

impl Editor for CommandEditor {
    fn edit(&self, path: &Path) -> Result<EditorExit, ConfluenceError> {
        info!("Opening {} in {}", path.display(), self.program);
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .status()
            .map_err(|e| ConfluenceError::Editor(format!("failed to start {}: {e}", self.program)))?;

        if status.success() {
            Ok(EditorExit::Success)
        } else {
            Ok(EditorExit::Failed(status.code()))
        }
    }
}
