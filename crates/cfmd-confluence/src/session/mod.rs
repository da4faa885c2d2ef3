//! Interactive edit session.
//!
//! `Fetched → Editing → {Unmodified | Modified} → {Uploaded | Abandoned}`.
//! The scratch file's modification time is the dirty signal; the editor's
//! exit status is checked first unless the session ignores it. The scratch
//! file is released on every exit path.

mod document;
mod editor;
mod scratch;

use cfmd_convert::to_markdown_preserving_macros;
use tracing::{info, warn};

pub use editor::{CommandEditor, Editor, EditorExit};
pub use scratch::{ModificationMarker, ScratchFile};

use crate::error::{StepContext, SyncError, SyncStep};
use crate::store::VersionedPageStore;
use crate::transport::Transport;
use crate::types::Page;

/// Why a session ended without a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbandonReason {
    /// Scratch file left untouched.
    Unmodified,
    /// Editor exited with a non-zero status.
    EditorFailed(Option<i32>),
}

/// Result of an edit session.
#[derive(Debug)]
pub enum EditOutcome {
    Uploaded {
        /// Page as returned by the server after the write.
        page: Page,
        /// Version the edit was based on.
        previous_version: u32,
    },
    Abandoned(AbandonReason),
}

/// State owned by a session between fetch and its terminal state.
#[derive(Debug)]
pub struct EditSessionState {
    /// Page as fetched, including the version the write is based on.
    pub original: Page,
    pub scratch: ScratchFile,
    pub original_marker: ModificationMarker,
}

/// Fetch, edit, dirty-check, convert and write one page.
pub struct EditSession<'a, T> {
    store: VersionedPageStore<'a, T>,
    editor: &'a dyn Editor,
    respect_exit_status: bool,
}

impl<'a, T: Transport> EditSession<'a, T> {
    pub fn new(store: VersionedPageStore<'a, T>, editor: &'a dyn Editor) -> Self {
        Self {
            store,
            editor,
            respect_exit_status: true,
        }
    }

    /// Decide on the modification time alone, even if the editor failed.
    #[must_use]
    pub fn ignore_exit_status(mut self, ignore: bool) -> Self {
        self.respect_exit_status = !ignore;
        self
    }

    /// Run the session for `page_id`.
    ///
    /// # Errors
    ///
    /// Returns a [`SyncError`] naming the failed step. A
    /// [`VersionConflict`](crate::ConfluenceError::VersionConflict) while
    /// writing ends the session; nothing is retried or merged.
    pub fn run(&self, page_id: &str) -> Result<EditOutcome, SyncError> {
        let state = self.fetch(page_id)?;

        let exit = self
            .editor
            .edit(state.scratch.path())
            .step(SyncStep::EditingContent)?;
        if let EditorExit::Failed(code) = exit
            && self.respect_exit_status
        {
            info!("Editor exited with {:?}, abandoning edit of page {}", code, page_id);
            return Ok(EditOutcome::Abandoned(AbandonReason::EditorFailed(code)));
        }

        let marker = state.scratch.marker().step(SyncStep::EditingContent)?;
        if marker == state.original_marker {
            info!("No changes to page {}", page_id);
            return Ok(EditOutcome::Abandoned(AbandonReason::Unmodified));
        }

        let content = state.scratch.read().step(SyncStep::EditingContent)?;
        let edited = document::parse(&content).step(SyncStep::ConvertingContent)?;
        let title = edited.title.as_deref().unwrap_or(&state.original.title);
        let previous_version = state.original.version.number;

        let page = self
            .store
            .write(page_id, &edited.body, previous_version, title)
            .step(SyncStep::WritingPage)?;

        if let Err(e) = state.scratch.release() {
            warn!("{}: {}", e, e.source);
        }
        Ok(EditOutcome::Uploaded {
            page,
            previous_version,
        })
    }

    fn fetch(&self, page_id: &str) -> Result<EditSessionState, SyncError> {
        let original = self.store.read(page_id).step(SyncStep::ReadingPage)?;
        let (markdown, macros) = to_markdown_preserving_macros(original.storage_value())
            .step(SyncStep::ConvertingContent)?;
        if !macros.is_empty() {
            info!("Preserving {} macros on page {}", macros.len(), page_id);
        }

        let scratch = ScratchFile::create(&document::render(&original, &markdown, &macros))
            .step(SyncStep::EditingContent)?;
        let original_marker = scratch.marker().step(SyncStep::EditingContent)?;

        Ok(EditSessionState {
            original,
            scratch,
            original_marker,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::fs::{self, OpenOptions};
    use std::path::{Path, PathBuf};
    use std::time::Duration;

    use super::*;
    use crate::client::ConfluenceClient;
    use crate::error::ConfluenceError;
    use crate::mock::MockServer;
    use crate::transport::Method;
    use pretty_assertions::assert_eq;

    /// Editor that runs a closure over the scratch file content.
    struct ScriptedEditor<F> {
        rewrite: F,
        exit: EditorExit,
        touch: bool,
        seen: RefCell<Vec<PathBuf>>,
    }

    impl<F: Fn(&str) -> String> ScriptedEditor<F> {
        fn new(rewrite: F) -> Self {
            Self {
                rewrite,
                exit: EditorExit::Success,
                touch: true,
                seen: RefCell::new(Vec::new()),
            }
        }

        fn exiting(mut self, exit: EditorExit) -> Self {
            self.exit = exit;
            self
        }

        fn untouched(mut self) -> Self {
            self.touch = false;
            self
        }

        fn last_path(&self) -> PathBuf {
            self.seen.borrow().last().cloned().unwrap()
        }
    }

    impl<F: Fn(&str) -> String> Editor for ScriptedEditor<F> {
        fn edit(&self, path: &Path) -> Result<EditorExit, ConfluenceError> {
            self.seen.borrow_mut().push(path.to_path_buf());
            if self.touch {
                let before = fs::metadata(path)?.modified()?;
                let content = fs::read_to_string(path)?;
                fs::write(path, (self.rewrite)(&content))?;
                OpenOptions::new()
                    .write(true)
                    .open(path)?
                    .set_modified(before + Duration::from_secs(2))?;
            }
            Ok(self.exit)
        }
    }

    fn server_at_version(body: &str, version: u32) -> (MockServer, String) {
        let server = MockServer::new().with_space("DOCS", "Docs");
        let id = server.insert_page("DOCS", "Intro", body, None);
        server.set_version(&id, version);
        (server, id)
    }

    #[test]
    fn test_modified_edit_writes_next_version() {
        let (server, id) = server_at_version("<p>Hello world</p>", 3);
        let client = ConfluenceClient::new(&server, "https://wiki");
        let editor = ScriptedEditor::new(|c: &str| c.replace("world", "there"));

        let outcome = EditSession::new(VersionedPageStore::new(&client), &editor)
            .run(&id)
            .unwrap();

        match outcome {
            EditOutcome::Uploaded {
                page,
                previous_version,
            } => {
                assert_eq!(previous_version, 3);
                assert_eq!(page.version.number, 4);
            }
            EditOutcome::Abandoned(reason) => panic!("abandoned: {reason:?}"),
        }
        let puts = server.requests_with(Method::Put);
        assert_eq!(puts.len(), 1);
        let sent = puts[0].body.as_ref().unwrap();
        assert_eq!(sent["version"]["number"], 4);
        assert_eq!(sent["title"], "Intro");
        assert_eq!(server.page(&id).unwrap().body, "<p>Hello there</p>");
        assert!(!editor.last_path().exists());
    }

    #[test]
    fn test_unmodified_edit_performs_no_write() {
        let (server, id) = server_at_version("<p>Hello</p>", 3);
        let client = ConfluenceClient::new(&server, "https://wiki");
        let editor = ScriptedEditor::new(str::to_owned).untouched();

        let outcome = EditSession::new(VersionedPageStore::new(&client), &editor)
            .run(&id)
            .unwrap();

        assert!(matches!(
            outcome,
            EditOutcome::Abandoned(AbandonReason::Unmodified)
        ));
        assert!(server.requests_with(Method::Put).is_empty());
        assert!(!editor.last_path().exists());
    }

    #[test]
    fn test_failed_editor_abandons_by_default() {
        let (server, id) = server_at_version("<p>Hello</p>", 1);
        let client = ConfluenceClient::new(&server, "https://wiki");
        let editor = ScriptedEditor::new(|c: &str| c.replace("Hello", "Bye"))
            .exiting(EditorExit::Failed(Some(1)));

        let outcome = EditSession::new(VersionedPageStore::new(&client), &editor)
            .run(&id)
            .unwrap();

        assert!(matches!(
            outcome,
            EditOutcome::Abandoned(AbandonReason::EditorFailed(Some(1)))
        ));
        assert!(server.requests_with(Method::Put).is_empty());
        assert!(!editor.last_path().exists());
    }

    #[test]
    fn test_ignoring_exit_status_uses_timestamp_only() {
        let (server, id) = server_at_version("<p>Hello</p>", 1);
        let client = ConfluenceClient::new(&server, "https://wiki");
        let editor = ScriptedEditor::new(|c: &str| c.replace("Hello", "Bye"))
            .exiting(EditorExit::Failed(Some(1)));

        let outcome = EditSession::new(VersionedPageStore::new(&client), &editor)
            .ignore_exit_status(true)
            .run(&id)
            .unwrap();

        assert!(matches!(outcome, EditOutcome::Uploaded { .. }));
        assert_eq!(server.page(&id).unwrap().body, "<p>Bye</p>");
    }

    #[test]
    fn test_concurrent_update_is_conflict() {
        let (server, id) = server_at_version("<p>Hello</p>", 3);
        let client = ConfluenceClient::new(&server, "https://wiki");
        let editor = ScriptedEditor::new(|c: &str| {
            server.set_version(&id, 4);
            c.replace("Hello", "Mine")
        });

        let error = EditSession::new(VersionedPageStore::new(&client), &editor)
            .run(&id)
            .unwrap_err();

        assert_eq!(error.step, SyncStep::WritingPage);
        assert!(matches!(
            error.source,
            ConfluenceError::VersionConflict {
                expected: 3,
                actual: Some(4),
                ..
            }
        ));
        let stored = server.page(&id).unwrap();
        assert_eq!(stored.version, 4);
        assert_eq!(stored.body, "<p>Hello</p>");
        assert!(!editor.last_path().exists());
    }

    #[test]
    fn test_corrupt_macro_block_fails_conversion() {
        let (server, id) = server_at_version("<p>Hello</p>", 1);
        let client = ConfluenceClient::new(&server, "https://wiki");
        let editor = ScriptedEditor::new(|c: &str| {
            format!("{c}\n<!-- CONFLUENCE_MACROS_START\n!!!\nCONFLUENCE_MACROS_END -->\n")
        });

        let error = EditSession::new(VersionedPageStore::new(&client), &editor)
            .run(&id)
            .unwrap_err();

        assert_eq!(error.step, SyncStep::ConvertingContent);
        assert!(matches!(error.source, ConfluenceError::ConversionFailed(_)));
        assert!(server.requests_with(Method::Put).is_empty());
        assert!(!editor.last_path().exists());
    }

    #[test]
    fn test_macros_survive_edit() {
        let body = r#"<p>Hello</p><ac:structured-macro ac:name="toc" />"#;
        let (server, id) = server_at_version(body, 2);
        let client = ConfluenceClient::new(&server, "https://wiki");
        let editor = ScriptedEditor::new(|c: &str| c.replace("Hello", "Hi"));

        EditSession::new(VersionedPageStore::new(&client), &editor)
            .run(&id)
            .unwrap();

        assert_eq!(
            server.page(&id).unwrap().body,
            r#"<p>Hi</p><ac:structured-macro ac:name="toc" />"#
        );
    }

    #[test]
    fn test_title_edit_is_sent() {
        let (server, id) = server_at_version("<p>Hello</p>", 1);
        let client = ConfluenceClient::new(&server, "https://wiki");
        let editor = ScriptedEditor::new(|c: &str| c.replace("# Intro", "# Introduction"));

        EditSession::new(VersionedPageStore::new(&client), &editor)
            .run(&id)
            .unwrap();

        assert_eq!(server.page(&id).unwrap().title, "Introduction");
    }

    #[test]
    fn test_missing_page_fails_before_editing() {
        let server = MockServer::new();
        let client = ConfluenceClient::new(&server, "https://wiki");
        let editor = ScriptedEditor::new(str::to_owned);

        let error = EditSession::new(VersionedPageStore::new(&client), &editor)
            .run("42")
            .unwrap_err();

        assert_eq!(error.step, SyncStep::ReadingPage);
        assert!(matches!(error.source, ConfluenceError::NotFound { .. }));
        assert!(editor.seen.borrow().is_empty());
    }

    #[test]
    fn test_scratch_document_shows_page_header() {
        let (server, id) = server_at_version("<p>Hello</p>", 7);
        let client = ConfluenceClient::new(&server, "https://wiki");
        let seen = RefCell::new(String::new());
        let editor = ScriptedEditor::new(|c: &str| {
            seen.replace(c.to_owned());
            c.to_owned()
        });

        EditSession::new(VersionedPageStore::new(&client), &editor)
            .run(&id)
            .unwrap();

        let content = seen.borrow().clone();
        assert!(content.starts_with("# Intro\n"));
        assert!(content.contains(&format!("<!-- Page ID: {id}, Version: 7 -->")));
        assert!(content.ends_with("Hello\n"));
    }
}
