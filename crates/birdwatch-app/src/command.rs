use std::sync::Arc;

use birdwatch_core::{ConfigField, FactorField};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::orchestrator::Orchestrator;
use crate::remote::RemoteService;

/// An operator action, executed one at a time by the command task.
#[derive(Debug, Clone, PartialEq)]
pub enum OperatorCommand {
    Start,
    Stop,
    Resync,
    SaveRun,
    LoadRun,
    SetConfig { field: ConfigField, value: i64 },
    /// Offset a config field from its current local value.
    AdjustConfig { field: ConfigField, delta: i64 },
    SetTimeStep(i64),
    AdjustTimeStep(i64),
    EditFactor { field: FactorField, value: f64 },
    EditZone { id: i64, field: FactorField, value: f64 },
    /// Offset a field of the selected zone, clamped to the field's domain.
    AdjustSelectedZone { field: FactorField, delta: f64 },
    SelectZone(i64),
    SelectNextZone,
    SubmitEnvironment,
}

pub type CommandSender = mpsc::Sender<OperatorCommand>;
pub type CommandReceiver = mpsc::Receiver<OperatorCommand>;
pub type CommandSubmit = Arc<dyn Fn(OperatorCommand) -> bool + Send + Sync>;

pub fn create_command_bus(capacity: usize) -> (CommandSender, CommandReceiver) {
    mpsc::channel(capacity.max(1))
}

/// Non-blocking submit handle, callable from the terminal thread.
pub fn make_command_submit(sender: CommandSender) -> CommandSubmit {
    Arc::new(
        move |command: OperatorCommand| match sender.try_send(command) {
            Ok(()) => true,
            Err(TrySendError::Full(cmd)) => {
                warn!(?cmd, "operator command queue full; dropping command");
                false
            }
            Err(TrySendError::Closed(cmd)) => {
                warn!(?cmd, "operator command queue closed");
                false
            }
        },
    )
}

/// Drain `receiver` on a task, awaiting each command before taking the next.
pub fn spawn_command_loop<R: RemoteService>(
    orchestrator: Orchestrator<R>,
    mut receiver: CommandReceiver,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(command) = receiver.recv().await {
            debug!(?command, "executing operator command");
            // Outcomes land in the orchestrator's event log.
            let _ = orchestrator.execute(command).await;
        }
        debug!("operator command loop finished");
    })
}
