//! Document host interface.
//!
//! DESIGN
//! ======
//! The editing host is an external collaborator. The orchestrator pulls
//! document state through [`DocumentHost`] and receives edits as typed
//! [`HostEvent`]s over an mpsc channel it subscribes to once at start.
//! [`FileHost`] backs the binary with a markup file and a style file on disk,
//! watched with `notify` so edits arrive as events instead of being polled.

use std::collections::BTreeSet;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError};

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use regex::Regex;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Read side of the editing host.
pub trait DocumentHost: Send + Sync {
    /// Current document markup.
    fn markup(&self) -> String;
    /// Current document style sheet.
    fn style_sheet(&self) -> String;
    /// Number of top-level components.
    fn component_count(&self) -> usize;
    /// Full serialized editor state, including asset payloads.
    fn serialized_state(&self) -> Value;
}

// =============================================================================
// EVENTS
// =============================================================================

/// Minimal description of the component an event concerns. Every field may be
/// missing when the host hands over a half-built object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComponentRef {
    pub id: Option<String>,
    pub component_type: Option<String>,
    pub tag_name: Option<String>,
    pub classes: Vec<String>,
    pub parent_id: Option<String>,
}

impl ComponentRef {
    pub fn new(id: impl Into<String>, component_type: impl Into<String>) -> Self {
        Self { id: Some(id.into()), component_type: Some(component_type.into()), ..Self::default() }
    }

    #[must_use]
    pub fn with_tag(mut self, tag_name: impl Into<String>) -> Self {
        self.tag_name = Some(tag_name.into());
        self
    }

    /// True when the host handed over no component information at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        let blank = |field: &Option<String>| field.as_deref().is_none_or(str::is_empty);
        blank(&self.id)
            && blank(&self.component_type)
            && blank(&self.tag_name)
            && blank(&self.parent_id)
            && self.classes.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    ComponentAdded(ComponentRef),
    ComponentRemoved(ComponentRef),
    ComponentUpdated(ComponentRef),
    ComponentSelected(ComponentRef),
    StyleChanged {
        target: ComponentRef,
        property: String,
        value: Option<String>,
        previous_value: Option<String>,
    },
}

impl HostEvent {
    /// Whether the event edits the document. Selection does not.
    #[must_use]
    pub fn is_edit(&self) -> bool {
        !matches!(self, Self::ComponentSelected(_))
    }

    #[must_use]
    pub fn component(&self) -> &ComponentRef {
        match self {
            Self::ComponentAdded(c)
            | Self::ComponentRemoved(c)
            | Self::ComponentUpdated(c)
            | Self::ComponentSelected(c) => c,
            Self::StyleChanged { target, .. } => target,
        }
    }
}

// =============================================================================
// FILE HOST
// =============================================================================

static OPENING_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[A-Za-z][^>]*>").expect("valid regex"));

#[derive(Debug, Default, PartialEq)]
struct Contents {
    markup: String,
    style: String,
    project: Option<Value>,
}

/// A document made of a markup file, a style file, and an optional project
/// JSON file. Reads serve the last loaded contents; [`FileHost::watch`]
/// keeps them current.
pub struct FileHost {
    markup_path: PathBuf,
    style_path: PathBuf,
    project_path: Option<PathBuf>,
    contents: Mutex<Contents>,
}

impl FileHost {
    /// Read all files once. Unreadable files load as empty.
    pub async fn load(markup_path: PathBuf, style_path: PathBuf, project_path: Option<PathBuf>) -> Self {
        let contents = Contents {
            markup: read_or_empty(&markup_path).await,
            style: read_or_empty(&style_path).await,
            project: read_project(project_path.as_deref()).await,
        };
        Self { markup_path, style_path, project_path, contents: Mutex::new(contents) }
    }

    /// Re-read the files and return one event per file whose content changed.
    pub async fn refresh(&self) -> Vec<HostEvent> {
        let markup = read_or_empty(&self.markup_path).await;
        let style = read_or_empty(&self.style_path).await;
        let project = read_project(self.project_path.as_deref()).await;

        let mut contents = self.lock();
        let mut events = Vec::new();
        if contents.markup != markup {
            events.push(HostEvent::ComponentUpdated(document_ref()));
            contents.markup = markup;
        }
        if contents.style != style {
            events.push(HostEvent::StyleChanged {
                target: document_ref(),
                property: "stylesheet".into(),
                value: None,
                previous_value: None,
            });
            contents.style = style;
        }
        if contents.project != project {
            events.push(HostEvent::ComponentUpdated(ComponentRef::new("project", "project")));
            contents.project = project;
        }
        events
    }

    /// Watch the files' directories and forward content changes to `events`.
    ///
    /// # Errors
    ///
    /// Returns the watcher error if the platform watch cannot be set up.
    pub fn watch(self: &Arc<Self>, events: mpsc::Sender<HostEvent>) -> Result<FileWatch, notify::Error> {
        // Capacity 1: one pending refresh covers any burst of file events.
        let (changed_tx, mut changed_rx) = mpsc::channel::<()>(1);
        let names = self.file_names();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let touches_document = matches!(
                        event.kind,
                        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
                    ) && event
                        .paths
                        .iter()
                        .any(|p| p.file_name().is_some_and(|n| names.iter().any(|w| w == n)));
                    if touches_document {
                        let _ = changed_tx.try_send(());
                    }
                }
                Err(e) => warn!(error = %e, "host: file watch error"),
            },
            Config::default(),
        )?;
        for dir in self.directories() {
            watcher.watch(&dir, RecursiveMode::NonRecursive)?;
            info!(dir = %dir.display(), "host: watching");
        }

        let host = Arc::clone(self);
        let task = tokio::spawn(async move {
            while changed_rx.recv().await.is_some() {
                for event in host.refresh().await {
                    if events.send(event).await.is_err() {
                        return;
                    }
                }
            }
        });
        Ok(FileWatch { _watcher: watcher, task })
    }

    fn paths(&self) -> impl Iterator<Item = &Path> {
        [self.markup_path.as_path(), self.style_path.as_path()]
            .into_iter()
            .chain(self.project_path.as_deref())
    }

    fn file_names(&self) -> Vec<OsString> {
        self.paths().filter_map(Path::file_name).map(OsStr::to_os_string).collect()
    }

    fn directories(&self) -> BTreeSet<PathBuf> {
        self.paths()
            .map(|p| match p.parent() {
                Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
                _ => PathBuf::from("."),
            })
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, Contents> {
        self.contents.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Keeps a [`FileHost`] watch alive; dropping it stops forwarding.
pub struct FileWatch {
    _watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

impl Drop for FileWatch {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn document_ref() -> ComponentRef {
    ComponentRef::new("document", "wrapper").with_tag("body")
}

async fn read_or_empty(path: &Path) -> String {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "host: file unreadable, treating as empty");
            String::new()
        }
    }
}

async fn read_project(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = read_or_empty(path).await;
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "host: project file is not valid JSON");
            None
        }
    }
}

impl DocumentHost for FileHost {
    fn markup(&self) -> String {
        self.lock().markup.clone()
    }

    fn style_sheet(&self) -> String {
        self.lock().style.clone()
    }

    fn component_count(&self) -> usize {
        OPENING_TAG.find_iter(&self.lock().markup).count()
    }

    fn serialized_state(&self) -> Value {
        let contents = self.lock();
        contents.project.clone().unwrap_or_else(|| {
            serde_json::json!({
                "pages": [{ "markup": contents.markup }],
                "styles": contents.style,
                "assets": [],
            })
        })
    }
}

#[cfg(test)]
#[path = "host_test.rs"]
mod tests;
