//! graphsync - keeps a graph visualization in step with a set of search inputs.
//!
//! Edits to the keyword box, the structured (subject, predicate, object)
//! filters and the session token are debounced, turned into queries against a
//! data source, and the newest complete dataset is handed to a visualization
//! sink. Responses that arrive out of order never overwrite newer ones.
//!
//! - `models`: graph dataset, suggestions, query fields and channels
//! - `query`: query model and its wire parameters
//! - `debounce`: per-channel trailing-edge timers
//! - `sequencer`: request tokens, newest wins
//! - `session`: bearer token storage and header decoration
//! - `source`: data source contract with HTTP and static-file implementations
//! - `sink`: visualization, suggestion and notification outputs
//! - `orchestrator`: the sync engine tying it all together
//! - `filter`: reference query semantics used by the file source and server
//! - `server`: reference graph API

pub mod config;
pub mod debounce;
pub mod error;
pub mod filter;
pub mod models;
pub mod orchestrator;
pub mod query;
pub mod sequencer;
pub mod server;
pub mod session;
pub mod sink;
pub mod source;
pub mod url_validator;

pub use config::Config;
pub use error::SyncError;
pub use models::{Channel, Dataset, GraphLink, GraphNode, QueryField, Suggestion};
pub use orchestrator::{InputEvent, Sinks, SyncEngine, SyncState};
pub use query::{QueryModel, QueryParams, QueryState};
pub use source::{DataSource, FileDataSource, HttpDataSource};
