//! mgit - discover, clone and fetch every repository you have access to
//!
//! mgit lists the repositories visible to your remote accounts, drops
//! duplicates, decides from your configured locations where each one belongs
//! and clones what is missing. It can also walk those locations and fetch
//! every clone it finds.
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading and locations
//! - [`discovery`]: Source trait, fan-in and deduplication
//! - [`github`]: GitHub source
//! - [`paging`]: Cursor-based pagination
//! - [`matcher`]: Location matching
//! - [`scanner`]: Local clone discovery
//! - [`git`]: `git` executable adapter
//! - [`sync`]: Clone/fetch executor and workflow driver

pub mod config;
pub mod discovery;
pub mod git;
pub mod github;
pub mod matcher;
pub mod paging;
pub mod scanner;
pub mod sync;

pub use config::{Config, Location};
pub use discovery::{
    deduplicate, Deduplicator, MultiSource, RemoteRepo, RemoteSource, RepoSink,
};
pub use git::{GitClient, Vcs};
pub use github::GitHubSource;
pub use matcher::{wants, LocationMatcher};
pub use scanner::LocalRepo;
pub use sync::{SyncEngine, SyncExecutor, SyncResult, SyncSummary};
