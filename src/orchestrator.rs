//! Sync orchestrator: input events in, consistent visualization updates out.
//!
//! Data flows one way:
//!
//! ```text
//! input event -> query model -> debounce -> sequenced fetch -> (if current) sink
//! ```
//!
//! Keyword edits and structured-filter edits are debounced on separate
//! timers but feed the same search sequence, so whichever fetch was issued
//! last is the one that ends up on screen. Suggestions run as an independent
//! instance of the same machine with their own timer, their own sequence,
//! and their own sink.
//!
//! Per channel the observable state is `Idle`, `PendingFetch` (the newest
//! request has not come back yet) or `Applying` (a current result is being
//! handed to its sink). Errors end the one fetch that hit them and the
//! channel returns to `Idle`; nothing is retried automatically.

use crate::config::Config;
use crate::debounce::Debouncer;
use crate::error::SyncError;
use crate::models::{Channel, QueryField};
use crate::query::{QueryModel, QueryParams, QueryState};
use crate::sequencer::{RequestSequencer, RequestToken};
use crate::session::{bearer_headers, SessionGate};
use crate::sink::{Notifier, SuggestionSink, VisualizationSink};
use crate::source::DataSource;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

#[cfg(test)]
#[path = "orchestrator_test.rs"]
mod orchestrator_test;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    PendingFetch,
    Applying,
}

/// A change coming from one of the input widgets or the session provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    /// Free-text search box.
    Keyword(String),
    /// Structured filter box (subject, predicate, object).
    Field(QueryField, String),
    /// Include or exclude a structured position from keyword matching.
    SetActive(QueryField, bool),
    /// New session token, or `None` on logout.
    Session(Option<String>),
    /// Manual retry of the current query.
    Refresh,
}

/// Debounce timers. Keyword and filter edits share the search sequence but
/// never delay each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Trigger {
    Keyword,
    Filters,
    Suggest,
}

/// The engine's output collaborators.
#[derive(Clone)]
pub struct Sinks {
    pub visualization: Arc<dyn VisualizationSink>,
    pub suggestions: Arc<dyn SuggestionSink>,
    pub notifier: Arc<dyn Notifier>,
}

#[derive(Debug, Default)]
struct ChannelStatus {
    /// Highest token whose outcome was applied or reported.
    settled: u64,
    applying: bool,
}

/// Query and session that produced the most recent search.
type SearchKey = (QueryParams, Option<String>);

struct Inner {
    config: Config,
    model: Mutex<QueryModel>,
    debouncer: Debouncer<Trigger>,
    sequencer: RequestSequencer,
    session: SessionGate,
    source: Arc<dyn DataSource>,
    sinks: Sinks,
    status: [Mutex<ChannelStatus>; Channel::ALL.len()],
    /// Held while checking currency and handing a result to a sink, so a
    /// result that passed the check cannot land after a newer one.
    apply_lock: [Mutex<()>; Channel::ALL.len()],
    last_search: Mutex<Option<SearchKey>>,
    closed: AtomicBool,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ============================================================================
// Engine
// ============================================================================

/// Handle to a running sync engine. Cloning shares the same engine.
#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<Inner>,
}

impl SyncEngine {
    /// Build an engine in the `Idle` state with the query model pre-seeded
    /// from `config.default_keyword`.
    pub fn new(
        config: Config,
        source: Arc<dyn DataSource>,
        sinks: Sinks,
        token: Option<String>,
    ) -> Self {
        let model = QueryModel::with_keyword(config.default_keyword.as_deref())
            .with_min_keyword_chars(config.min_keyword_chars);
        Self {
            inner: Arc::new(Inner {
                config,
                model: Mutex::new(model),
                debouncer: Debouncer::new(),
                sequencer: RequestSequencer::new(),
                session: SessionGate::new(token),
                source,
                sinks,
                status: Default::default(),
                apply_lock: Default::default(),
                last_search: Mutex::new(None),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Kick off the initial load with the pre-seeded state.
    pub fn start(&self) {
        self.spawn_search(true);
    }

    /// Dispatch one input event.
    pub fn handle(&self, event: InputEvent) {
        match event {
            InputEvent::Keyword(text) => self.set_keyword(&text),
            InputEvent::Field(field, value) => self.set_field(field, &value),
            InputEvent::SetActive(field, active) => self.set_field_active(field, active),
            InputEvent::Session(token) => self.set_token(token),
            InputEvent::Refresh => self.refresh(),
        }
    }

    /// Apply events one at a time until the sender side closes, then shut down.
    pub async fn run(&self, mut events: mpsc::Receiver<InputEvent>) {
        while let Some(event) = events.recv().await {
            if self.is_closed() {
                break;
            }
            self.handle(event);
        }
        self.shutdown();
    }

    /// Keywords are matched case-insensitively and stored lowercased.
    pub fn set_keyword(&self, text: &str) {
        if self.is_closed() {
            return;
        }
        let keyword = {
            let mut model = lock(&self.inner.model);
            model.set(QueryField::Keyword, &text.to_lowercase());
            model.keyword().to_string()
        };

        let inner = &self.inner;
        if keyword.is_empty() {
            // Cleared box: reload the unfiltered view right away
            self.schedule_search(Trigger::Keyword, Duration::ZERO);
            self.clear_suggestions();
        } else if keyword.chars().count() < inner.config.min_keyword_chars {
            // Too short to search; keep showing the last results. The model
            // leaves it out of the params, so filter edits do not send it.
            inner.debouncer.cancel(Trigger::Keyword);
            self.clear_suggestions();
        } else {
            self.schedule_search(Trigger::Keyword, inner.config.debounce_delay);
            self.schedule_suggest(keyword);
        }
    }

    /// Update one field. Keyword edits also drive autocomplete.
    pub fn set_field(&self, field: QueryField, value: &str) {
        if field == QueryField::Keyword {
            self.set_keyword(value);
        } else if !self.is_closed() {
            lock(&self.inner.model).set(field, value);
            self.schedule_search(Trigger::Filters, self.inner.config.debounce_delay);
        }
    }

    pub fn set_field_active(&self, field: QueryField, active: bool) {
        if self.is_closed() {
            return;
        }
        let changed = lock(&self.inner.model).set_active(field, active);
        if changed {
            self.schedule_search(Trigger::Filters, self.inner.config.debounce_delay);
        }
    }

    /// Store or clear the session token and repaint through the current
    /// filters. Always re-syncs, even when the token did not change.
    pub fn set_token(&self, token: Option<String>) {
        if self.is_closed() {
            return;
        }
        let changed = self.inner.session.set_token(token);
        tracing::debug!(changed, authenticated = self.inner.session.is_authenticated(), "session updated");
        self.spawn_search(true);
    }

    /// Re-issue the current query without waiting for the debounce delay.
    pub fn refresh(&self) {
        if self.is_closed() {
            return;
        }
        self.spawn_search(true);
    }

    /// Apply every token the session provider publishes until it goes away,
    /// starting with the one it already holds.
    pub fn follow_session(&self, mut tokens: watch::Receiver<Option<String>>) -> JoinHandle<()> {
        let engine = self.clone();
        tokio::spawn(async move {
            let current = tokens.borrow_and_update().clone();
            if current != engine.inner.session.token() {
                engine.set_token(current);
            }
            while tokens.changed().await.is_ok() {
                if engine.is_closed() {
                    break;
                }
                let token = tokens.borrow_and_update().clone();
                engine.set_token(token);
            }
        })
    }

    /// Stop accepting input and cancel pending timers. Fetches already in
    /// flight finish but their results are dropped.
    pub fn shutdown(&self) {
        if !self.inner.closed.swap(true, Ordering::SeqCst) {
            self.inner.debouncer.cancel_all();
            tracing::debug!("sync engine shut down");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    pub fn state(&self, channel: Channel) -> SyncState {
        let status = lock(&self.inner.status[channel.index()]);
        if status.applying {
            SyncState::Applying
        } else if self.inner.sequencer.latest(channel) > status.settled {
            SyncState::PendingFetch
        } else {
            SyncState::Idle
        }
    }

    pub fn query_state(&self) -> QueryState {
        lock(&self.inner.model).state().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.session.is_authenticated()
    }

    // ------------------------------------------------------------------------
    // Scheduling
    // ------------------------------------------------------------------------

    fn schedule_search(&self, trigger: Trigger, delay: Duration) {
        let inner = Arc::clone(&self.inner);
        self.inner
            .debouncer
            .schedule(trigger, delay, async move { inner.search(false).await });
    }

    fn spawn_search(&self, forced: bool) {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move { inner.search(forced).await });
    }

    fn schedule_suggest(&self, prefix: String) {
        let inner = Arc::clone(&self.inner);
        self.inner.debouncer.schedule(
            Trigger::Suggest,
            self.inner.config.suggest_delay,
            async move { inner.suggest(prefix).await },
        );
    }

    /// Empty the dropdown and make any suggestion still in flight stale.
    fn clear_suggestions(&self) {
        let inner = &self.inner;
        inner.debouncer.cancel(Trigger::Suggest);
        let token = inner.sequencer.issue(Channel::Suggest);
        inner.apply(token, |sinks| sinks.suggestions.show(Vec::new()));
    }
}

// ============================================================================
// Fetch cycle
// ============================================================================

impl Inner {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// `Idle -> PendingFetch -> Applying -> Idle` for one search.
    async fn search(&self, forced: bool) {
        if self.is_closed() {
            return;
        }

        // Snapshot and token issue happen under one lock, so a later snapshot
        // always gets the higher token.
        let (params, headers, key, token) = {
            let mut last = lock(&self.last_search);
            let params = lock(&self.model).to_query_params();
            let auth = self.session.token();
            let headers = bearer_headers(auth.as_deref());
            let key: SearchKey = (params.clone(), auth);
            if !forced && last.as_ref() == Some(&key) {
                tracing::debug!(?params, "query unchanged; skipping fetch");
                return;
            }
            *last = Some(key.clone());
            let token = self.sequencer.issue(Channel::Search);
            (params, headers, key, token)
        };
        tracing::debug!(%token, ?params, "search issued");

        let result = match self.source.search(&params, &headers).await {
            Ok(dataset) => dataset.validate().map(|_| dataset),
            Err(err) => Err(err),
        };

        match result {
            Ok(dataset) => {
                let dataset = Arc::new(dataset);
                self.apply(token, |sinks| {
                    tracing::debug!(%token, nodes = dataset.nodes.len(), links = dataset.links.len(), "applying dataset");
                    sinks.visualization.render(Arc::clone(&dataset));
                });
            }
            Err(err) => {
                let reported = self.apply(token, |sinks| report(sinks, &err, Channel::Search));
                if reported {
                    // Let the next identical query try again
                    let mut last = lock(&self.last_search);
                    if last.as_ref() == Some(&key) {
                        *last = None;
                    }
                }
            }
        }
    }

    async fn suggest(&self, prefix: String) {
        if self.is_closed() {
            return;
        }
        let headers = self.session.headers();
        let token = self.sequencer.issue(Channel::Suggest);
        tracing::debug!(%token, prefix = %prefix, "suggest issued");

        match self.source.suggest(&prefix, &headers).await {
            Ok(list) => {
                self.apply(token, |sinks| sinks.suggestions.show(list));
            }
            Err(err) => {
                self.apply(token, |sinks| report(sinks, &err, Channel::Suggest));
            }
        }
    }

    /// Hand a completed result to its sink if `token` is still the newest on
    /// its channel. Stale results are dropped quietly. Returns whether
    /// `deliver` ran.
    fn apply<F>(&self, token: RequestToken, deliver: F) -> bool
    where
        F: FnOnce(&Sinks),
    {
        let channel = token.channel();
        let _guard = lock(&self.apply_lock[channel.index()]);

        if self.is_closed() || !self.sequencer.is_current(&token) {
            tracing::debug!(%token, latest = self.sequencer.latest(channel), "discarding stale response");
            return false;
        }

        lock(&self.status[channel.index()]).applying = true;
        deliver(&self.sinks);
        let mut status = lock(&self.status[channel.index()]);
        status.applying = false;
        status.settled = status.settled.max(token.seq());
        true
    }
}

fn report(sinks: &Sinks, err: &SyncError, channel: Channel) {
    if err.is_integrity() {
        tracing::warn!(%channel, error = %err, "rejected malformed dataset");
    } else {
        tracing::warn!(%channel, error = %err, "fetch failed");
    }
    sinks.notifier.notify(err);
}
