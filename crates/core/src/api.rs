//! Wire shapes for the subscriber channel and the control endpoints.

use serde::{Deserialize, Serialize};

use crate::model::{Axis, CombinedPayload, PrinterCommand};
use crate::now_ms;

/// Event name carried by every broadcast frame.
pub const UPDATE_EVENT: &str = "update";

/// Broadcast frame pushed to subscribers once per tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateEvent<D = CombinedPayload> {
    /// Always [`UPDATE_EVENT`].
    pub event: String,
    /// Unix epoch milliseconds when the frame was built.
    pub sent_at_ms: i64,
    /// The combined payload.
    pub data: D,
}

impl<'a> UpdateEvent<&'a CombinedPayload> {
    /// Wraps a payload into an `update` frame stamped with the current time.
    pub fn update(data: &'a CombinedPayload) -> Self {
        Self {
            event: UPDATE_EVENT.to_string(),
            sent_at_ms: now_ms(),
            data,
        }
    }
}

/// Result of a control request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlResponse {
    /// True when the printer accepted the command.
    pub ok: bool,
    /// Failure reason, absent on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ControlResponse {
    /// Success response.
    pub fn ok() -> Self {
        Self { ok: true, error: None }
    }

    /// Failure response carrying `error`.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(error.into()),
        }
    }
}

/// Jog request body: `{"axes": {"x": 10, "y": 0, "z": 0}}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JogRequest {
    /// Requested deltas.
    #[serde(default)]
    pub axes: JogAxes,
}

/// Per-axis jog deltas; missing axes do not move.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct JogAxes {
    /// X delta in mm.
    #[serde(default)]
    pub x: f64,
    /// Y delta in mm.
    #[serde(default)]
    pub y: f64,
    /// Z delta in mm.
    #[serde(default)]
    pub z: f64,
}

impl From<JogRequest> for PrinterCommand {
    fn from(req: JogRequest) -> Self {
        PrinterCommand::Jog {
            x: req.axes.x,
            y: req.axes.y,
            z: req.axes.z,
        }
    }
}

/// Home request body: `{"axes": ["x", "y"]}`. Omitted or empty axes home everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HomeRequest {
    /// Axes to home.
    #[serde(default)]
    pub axes: Option<Vec<Axis>>,
}

impl From<HomeRequest> for PrinterCommand {
    fn from(req: HomeRequest) -> Self {
        match req.axes {
            Some(axes) if !axes.is_empty() => PrinterCommand::Home { axes },
            _ => PrinterCommand::home_all(),
        }
    }
}
