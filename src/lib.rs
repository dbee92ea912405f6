//! # Change Monitor
//!
//! Periodically re-checks HTTP endpoints and git repositories and raises an
//! alert when something meaningful changed.
//!
//! Endpoints are fetched, run through an external extractor selected by
//! profile, normalized, and diffed against the last cycle. Repositories are
//! pulled, and the patch between the old and new HEAD is filtered down to
//! the files an operator watches.
//!
//! ## Architecture
//!
//! ```text
//!                ┌───────────┐
//!                │ Scheduler │  one task per (bucket, pipeline)
//!                └─────┬─────┘
//!          ┌───────────┴────────────┐
//!          ▼                        ▼
//!   ┌─────────────┐         ┌──────────────┐
//!   │  Endpoints  │         │ Repositories │
//!   │ fetch+extr. │         │  pull+patch  │
//!   └──────┬──────┘         └──────┬───────┘
//!          ▼                       ▼
//!    normalize+diff         watched chunks
//!          └──────────┬────────────┘
//!                     ▼
//!             Store  +  Notifier
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! cmon init
//! cmon endpoint add https://example.com --profile html --selector "main a"
//! cmon repo add https://github.com/acme/widgets --watch '["README.md"]'
//! cmon serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Error kinds |
//! | [`models`] | Endpoints, repositories, diffs |
//! | [`normalize`] | Extractor output normalization |
//! | [`patch`] | Watched-file chunk extraction from patches |
//! | [`textdiff`] | Unified diffs of endpoint content |
//! | [`fetch`] | HTTP fetcher |
//! | [`extract`] | Content extractors |
//! | [`git`] | Git transport |
//! | [`notify`] | Alert delivery |
//! | [`lock`] | Per-subject locking, shared across `cmon` processes |
//! | [`endpoints`] | Endpoint pipeline |
//! | [`repositories`] | Repository pipeline |
//! | [`scheduler`] | Interval scheduler |
//! | [`store`] | Storage trait and backends |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`manage`] | Registry management |
//! | [`app`] | Dependency wiring |

pub mod app;
pub mod config;
pub mod db;
pub mod endpoints;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod git;
pub mod lock;
pub mod manage;
pub mod migrate;
pub mod models;
pub mod normalize;
pub mod notify;
pub mod patch;
pub mod repositories;
pub mod scheduler;
pub mod store;
pub mod textdiff;
