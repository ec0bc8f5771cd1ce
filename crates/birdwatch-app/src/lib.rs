//! Client-side plumbing for Birdwatch: the remote service seam, state
//! reconcilers, the snapshot poll loop and the operator front-ends.

use std::sync::{Mutex, MutexGuard, PoisonError};

use birdwatch_core::EditError;

pub mod command;
pub mod config;
pub mod environment;
pub mod orchestrator;
pub mod remote;
pub mod settings;
pub mod slot;
pub mod sync;
pub mod terminal;

pub use command::{
    CommandReceiver, CommandSender, CommandSubmit, OperatorCommand, create_command_bus,
    make_command_submit, spawn_command_loop,
};
pub use config::{ConfigReconciler, ConfigState};
pub use environment::{EnvironmentReconciler, EnvironmentState};
pub use orchestrator::{DashboardView, EventEntry, EventKind, MountReport, Orchestrator};
pub use remote::{HttpRemote, RemoteError, RemoteService};
pub use settings::ClientSettings;
pub use slot::{PushStatus, Reconciled};
pub use sync::{StateSync, SyncView};

/// Failure of an operator action.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OperatorError {
    /// Input was rejected before anything was stored.
    #[error(transparent)]
    Edit(#[from] EditError),
    /// The service call failed. Local edits made before it are kept.
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error("no zone selected")]
    NoZoneSelected,
}

/// Every lock in this crate guards plain data that stays consistent even if a
/// holder panicked, so poisoning is ignored.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
