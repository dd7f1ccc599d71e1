use std::collections::HashMap;
use std::time::Duration;

use printdash_core::{PrinterCommand, ParseCommandError};
use reqwest::StatusCode;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::CommandsConfig;
use crate::sources::printer::{JOB_PATH, PRINTHEAD_PATH};
use crate::sources::PrinterClient;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("bad printer")]
    UnknownPrinter(String),
    #[error("bad action")]
    BadCommand(#[from] ParseCommandError),
    #[error("printer unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("printer rejected command with status {0}")]
    Rejected(StatusCode),
}

/// Forwards user actions to the matching printer controller.
///
/// Independent of the aggregation loop: it shares nothing with it but the
/// immutable printer address book.
#[derive(Clone)]
pub struct CommandGateway {
    printers: HashMap<String, PrinterClient>,
    jog_speed: u32,
    timeout: Duration,
}

impl CommandGateway {
    pub fn new(printers: impl IntoIterator<Item = PrinterClient>, cfg: &CommandsConfig) -> Self {
        Self {
            printers: printers
                .into_iter()
                .map(|p| (p.name().to_string(), p))
                .collect(),
            jog_speed: cfg.jog_speed,
            timeout: cfg.timeout(),
        }
    }

    pub fn knows(&self, printer: &str) -> bool {
        self.printers.contains_key(printer)
    }

    /// Sends exactly one upstream request for `command`.
    pub async fn execute(&self, printer: &str, command: &PrinterCommand) -> Result<(), CommandError> {
        let client = self
            .printers
            .get(printer)
            .ok_or_else(|| CommandError::UnknownPrinter(printer.to_string()))?;

        let (path, body) = self.upstream_request(command);
        let status = client
            .post_command(path, &body, self.timeout)
            .await
            .inspect_err(|e| warn!(printer, action = command.action_name(), error = %e, "command not delivered"))?;

        let accepted = if command.is_head_command() {
            status == StatusCode::NO_CONTENT
        } else {
            status.is_success()
        };
        if !accepted {
            warn!(printer, action = command.action_name(), %status, "command rejected");
            return Err(CommandError::Rejected(status));
        }

        info!(printer, action = command.action_name(), body = %body, "command forwarded");
        Ok(())
    }

    /// Upstream path and JSON body for a command.
    pub fn upstream_request(&self, command: &PrinterCommand) -> (&'static str, Value) {
        match command {
            PrinterCommand::Pause => (JOB_PATH, json!({ "command": "pause", "action": "pause" })),
            PrinterCommand::Resume => (JOB_PATH, json!({ "command": "pause", "action": "resume" })),
            PrinterCommand::Cancel => (JOB_PATH, json!({ "command": "cancel" })),
            PrinterCommand::Jog { x, y, z } => (
                PRINTHEAD_PATH,
                json!({ "command": "jog", "x": x, "y": y, "z": z, "speed": self.jog_speed }),
            ),
            PrinterCommand::Home { axes } => {
                (PRINTHEAD_PATH, json!({ "command": "home", "axes": axes }))
            }
        }
    }
}
