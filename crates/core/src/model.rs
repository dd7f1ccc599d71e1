//! Snapshots, payload layout and printer commands.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// A single field value inside a [`Snapshot`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    /// Boolean flag.
    Bool(bool),
    /// Integral number.
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// Free text.
    Text(String),
}

impl Scalar {
    /// Numeric view of the value, if it is a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Int(i) => Some(*i as f64),
            Scalar::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Text view of the value, if it is text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Scalar::Bool(v)
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Int(v)
    }
}

impl From<u64> for Scalar {
    fn from(v: u64) -> Self {
        match i64::try_from(v) {
            Ok(i) => Scalar::Int(i),
            Err(_) => Scalar::Float(v as f64),
        }
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Float(v)
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Scalar::Text(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Text(v.to_string())
    }
}

/// Normalized point-in-time state of one data source.
///
/// Keys are flat field names. Nested upstream documents are flattened with
/// [`Snapshot::from_json`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot(BTreeMap<String, Scalar>);

impl Snapshot {
    /// Empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// The `{ "error": true }` marker used when a source has nothing to offer.
    pub fn error_marker() -> Self {
        Self::new().with("error", true)
    }

    /// True when this snapshot is exactly the error marker.
    pub fn is_error_marker(&self) -> bool {
        self.0.len() == 1 && self.get("error") == Some(&Scalar::Bool(true))
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.insert(key, value);
        self
    }

    /// Sets `key` to `value`, replacing any previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Scalar>) {
        self.0.insert(key.into(), value.into());
    }

    /// Looks up a field.
    pub fn get(&self, key: &str) -> Option<&Scalar> {
        self.0.get(key)
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when the snapshot has no fields.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Flattens an arbitrary JSON document.
    ///
    /// Object members are joined with `.`, array elements use their index,
    /// and `null` members are dropped. A bare scalar lands under `value`.
    pub fn from_json(value: &Value) -> Self {
        let mut fields = BTreeMap::new();
        flatten_into(&mut fields, "", value);
        Self(fields)
    }
}

fn flatten_into(out: &mut BTreeMap<String, Scalar>, prefix: &str, value: &Value) {
    let leaf_key = || {
        if prefix.is_empty() {
            "value".to_string()
        } else {
            prefix.to_string()
        }
    };

    match value {
        Value::Null => {}
        Value::Bool(b) => {
            out.insert(leaf_key(), Scalar::Bool(*b));
        }
        Value::Number(n) => {
            let scalar = match n.as_i64() {
                Some(i) => Scalar::Int(i),
                None => Scalar::Float(n.as_f64().unwrap_or(f64::NAN)),
            };
            out.insert(leaf_key(), scalar);
        }
        Value::String(s) => {
            out.insert(leaf_key(), Scalar::Text(s.clone()));
        }
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                flatten_into(out, &join_key(prefix, &index.to_string()), item);
            }
        }
        Value::Object(members) => {
            for (key, member) in members {
                flatten_into(out, &join_key(prefix, key), member);
            }
        }
    }
}

fn join_key(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

/// Name of one entry in the [`CombinedPayload`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceKey(String);

impl SourceKey {
    /// Key of the weather entry.
    pub const WEATHER: &'static str = "weather";
    /// Key of the host metrics entry.
    pub const SYSTEM: &'static str = "system";

    /// Machine state of the named printer, e.g. `minimus_printer`.
    pub fn printer_state(printer: &str) -> Self {
        Self(format!("{printer}_printer"))
    }

    /// Job state of the named printer, e.g. `minimus_job`.
    pub fn printer_job(printer: &str) -> Self {
        Self(format!("{printer}_job"))
    }

    /// The weather entry.
    pub fn weather() -> Self {
        Self(Self::WEATHER.to_string())
    }

    /// The host metrics entry.
    pub fn system() -> Self {
        Self(Self::SYSTEM.to_string())
    }

    /// Key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Every key produced for a given set of printer names, in payload order.
    pub fn layout<'a>(printers: impl IntoIterator<Item = &'a str>) -> Vec<SourceKey> {
        let mut keys = Vec::new();
        for name in printers {
            keys.push(Self::printer_state(name));
            keys.push(Self::printer_job(name));
        }
        keys.push(Self::weather());
        keys.push(Self::system());
        keys
    }
}

impl fmt::Display for SourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Merged snapshots of every configured source for one tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CombinedPayload(BTreeMap<String, Snapshot>);

impl CombinedPayload {
    /// Builds a payload holding exactly the keys in `layout`.
    ///
    /// Entries whose key is not part of the layout are discarded. Layout keys
    /// without an entry get [`Snapshot::error_marker`].
    pub fn assemble<I>(layout: &[SourceKey], entries: I) -> Self
    where
        I: IntoIterator<Item = (SourceKey, Snapshot)>,
    {
        let mut provided: BTreeMap<SourceKey, Snapshot> = entries.into_iter().collect();
        let merged = layout
            .iter()
            .map(|key| {
                let snapshot = provided.remove(key).unwrap_or_else(Snapshot::error_marker);
                (key.as_str().to_string(), snapshot)
            })
            .collect();
        Self(merged)
    }

    /// Snapshot stored under `key`.
    pub fn get(&self, key: &str) -> Option<&Snapshot> {
        self.0.get(key)
    }

    /// True if `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Source names present in the payload.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Number of sources.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when no sources are present.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Printhead axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    /// X axis.
    X,
    /// Y axis.
    Y,
    /// Z axis.
    Z,
}

impl Axis {
    /// All three axes.
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];
}

/// A user action forwarded to one printer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum PrinterCommand {
    /// Pause the running job.
    Pause,
    /// Resume a paused job.
    Resume,
    /// Cancel the running job.
    Cancel,
    /// Relative printhead move, in millimetres.
    Jog {
        /// X delta.
        x: f64,
        /// Y delta.
        y: f64,
        /// Z delta.
        z: f64,
    },
    /// Home the given axes.
    Home {
        /// Axes to home.
        axes: Vec<Axis>,
    },
}

impl PrinterCommand {
    /// Parses a job action name (`pause`, `resume`, `cancel`).
    pub fn from_action(action: &str) -> Result<Self, ParseCommandError> {
        match action {
            "pause" => Ok(Self::Pause),
            "resume" => Ok(Self::Resume),
            "cancel" => Ok(Self::Cancel),
            other => Err(ParseCommandError::UnknownAction(other.to_string())),
        }
    }

    /// Home on every axis.
    pub fn home_all() -> Self {
        Self::Home {
            axes: Axis::ALL.to_vec(),
        }
    }

    /// Short name used in logs.
    pub fn action_name(&self) -> &'static str {
        match self {
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Cancel => "cancel",
            Self::Jog { .. } => "jog",
            Self::Home { .. } => "home",
        }
    }

    /// True for commands addressed to the printhead rather than the job.
    pub fn is_head_command(&self) -> bool {
        matches!(self, Self::Jog { .. } | Self::Home { .. })
    }
}

/// Failure to interpret a user-supplied command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseCommandError {
    /// Action name is not one of the job actions.
    #[error("bad action: {0}")]
    UnknownAction(String),
}
