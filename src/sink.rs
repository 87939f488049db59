//! Output collaborators of the sync engine.
//!
//! A sink receives finished data and draws it. From the engine's point of
//! view sinks are stateless beyond "last value wins": every dataset handed to
//! a `VisualizationSink` fully replaces the one before it.

use crate::error::SyncError;
use crate::models::{Dataset, Suggestion};
use chrono::Local;
use std::io::Write;
use std::sync::{Arc, Mutex};

/// Receives complete datasets for drawing.
pub trait VisualizationSink: Send + Sync {
    fn render(&self, dataset: Arc<Dataset>);
}

/// Receives autocomplete entries for the dropdown. An empty list clears it.
pub trait SuggestionSink: Send + Sync {
    fn show(&self, suggestions: Vec<Suggestion>);
}

/// Surfaces non-fatal failures to the user.
pub trait Notifier: Send + Sync {
    fn notify(&self, error: &SyncError);
}

// ============================================================================
// In-memory sinks
// ============================================================================

/// Keeps the currently displayed dataset and how many times it was replaced.
#[derive(Debug, Default)]
pub struct DatasetSlot {
    inner: Mutex<SlotState>,
}

#[derive(Debug, Default)]
struct SlotState {
    current: Option<Arc<Dataset>>,
    renders: usize,
}

impl DatasetSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<Arc<Dataset>> {
        self.lock().current.clone()
    }

    pub fn render_count(&self) -> usize {
        self.lock().renders
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SlotState> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl VisualizationSink for DatasetSlot {
    fn render(&self, dataset: Arc<Dataset>) {
        let mut state = self.lock();
        state.current = Some(dataset);
        state.renders += 1;
    }
}

/// Keeps every suggestion list shown, newest last.
#[derive(Debug, Default)]
pub struct SuggestionLog {
    shown: Mutex<Vec<Vec<Suggestion>>>,
}

impl SuggestionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> Vec<Vec<Suggestion>> {
        self.shown.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn latest(&self) -> Option<Vec<Suggestion>> {
        self.history().pop()
    }
}

impl SuggestionSink for SuggestionLog {
    fn show(&self, suggestions: Vec<Suggestion>) {
        self.shown
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(suggestions);
    }
}

/// Collects notification messages.
#[derive(Debug, Default)]
pub struct NotificationLog {
    messages: Mutex<Vec<String>>,
}

impl NotificationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

impl Notifier for NotificationLog {
    fn notify(&self, error: &SyncError) {
        self.messages
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(error.to_string());
    }
}

// ============================================================================
// Console
// ============================================================================

/// Prints every update as a timestamped text block. Used by `explore`.
pub struct ConsoleSink<W: Write + Send> {
    out: Mutex<W>,
}

impl ConsoleSink<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> ConsoleSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(|p| p.into_inner())
    }

    fn emit(&self, text: &str) {
        let stamp = Local::now().format("%H:%M:%S%.3f");
        let mut out = self.out.lock().unwrap_or_else(|p| p.into_inner());
        // A closed stdout is not worth failing the engine over
        let _ = writeln!(out, "[{}] {}", stamp, text);
        let _ = out.flush();
    }
}

/// Render a dataset as one header line plus one line per link.
pub fn format_dataset(dataset: &Dataset) -> String {
    let stats = dataset.stats();
    let mut text = format!(
        "graph: {} nodes, {} links, {} groups",
        stats.total_nodes, stats.total_links, stats.group_count
    );
    for link in &dataset.links {
        let label = |id: &str| {
            dataset
                .node(id)
                .map(|n| n.display_label().to_string())
                .unwrap_or_else(|| id.to_string())
        };
        text.push_str(&format!(
            "\n  {} --{}--> {}",
            label(&link.source),
            link.predicate.as_deref().unwrap_or(""),
            label(&link.target)
        ));
    }
    text
}

impl<W: Write + Send> VisualizationSink for ConsoleSink<W> {
    fn render(&self, dataset: Arc<Dataset>) {
        self.emit(&format_dataset(&dataset));
    }
}

impl<W: Write + Send> SuggestionSink for ConsoleSink<W> {
    fn show(&self, suggestions: Vec<Suggestion>) {
        if suggestions.is_empty() {
            self.emit("suggestions: (none)");
            return;
        }
        let values: Vec<String> = suggestions
            .iter()
            .map(|s| match &s.lang {
                Some(lang) => format!("{} ({})", s.value, lang),
                None => s.value.clone(),
            })
            .collect();
        self.emit(&format!("suggestions: {}", values.join(", ")));
    }
}

impl<W: Write + Send> Notifier for ConsoleSink<W> {
    fn notify(&self, error: &SyncError) {
        self.emit(&format!("error: {}", error));
    }
}
