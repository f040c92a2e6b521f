//! The KBase workspace object store, seen through the two calls this
//! service needs.
//!
//! [`ObjectStore`] is the seam: [`client::WorkspaceClient`] talks JSON-RPC
//! to a real deployment, [`memory::MemoryWorkspace`] keeps objects in a map
//! for tests and dry runs.

pub mod client;
pub mod memory;

use async_trait::async_trait;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Errors surfaced by an [`ObjectStore`].
#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error("request to workspace failed: {}", display_chain(.0))]
    Transport(#[from] reqwest::Error),

    #[error("workspace returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// A JSON-RPC error object. `trace` is the server-side stack trace, if sent.
    #[error("{name}: {message}{}", .trace.as_deref().map(|t| format!("\n{t}")).unwrap_or_default())]
    Server {
        name: String,
        code: i64,
        message: String,
        trace: Option<String>,
    },

    #[error("malformed workspace response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("workspace returned no {0}")]
    Empty(&'static str),

    #[error("object {0} not found")]
    NotFound(String),
}

/// `err` followed by each cause in its source chain that its message does
/// not already spell out. reqwest keeps the interesting part (connection
/// refused, DNS failure) in the causes.
pub fn display_chain(err: &dyn std::error::Error) -> String {
    let mut text = err.to_string();
    let mut cause = err.source();
    while let Some(inner) = cause {
        let part = inner.to_string();
        if !text.contains(&part) {
            text.push_str(": ");
            text.push_str(&part);
        }
        cause = inner.source();
    }
    text
}

/// Addresses one object by `ws/obj[/ver]` reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectSpecification {
    #[serde(rename = "ref")]
    pub reference: String,
}

impl ObjectSpecification {
    pub fn by_ref(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
        }
    }
}

/// One element of a `get_objects` result. Only `data` is read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectData {
    pub data: Value,
}

/// An object handed to `save_objects`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectSaveData {
    #[serde(rename = "type")]
    pub object_type: String,
    pub data: Value,
    pub name: String,
    pub meta: Map<String, Value>,
    /// Integer boolean on the wire.
    pub hidden: u8,
    pub provenance: Vec<ProvenanceAction>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveObjectsParams {
    pub workspace: String,
    pub objects: Vec<ObjectSaveData>,
}

/// One provenance action. Only `input_ws_objects` is interpreted; every
/// other key the caller supplied is carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceAction {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub input_ws_objects: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Appends `reference` to the first action's inputs, creating an empty
/// action when the chain is empty.
pub fn record_input(mut provenance: Vec<ProvenanceAction>, reference: &str) -> Vec<ProvenanceAction> {
    if provenance.is_empty() {
        provenance.push(ProvenanceAction::default());
    }
    provenance[0].input_ws_objects.push(reference.to_string());
    provenance
}

/// The workspace `object_info` tuple:
/// `[objid, name, type, save_date, version, saved_by, wsid, workspace, chsum, size, meta]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectInfo {
    pub object_id: i64,
    pub name: String,
    pub object_type: String,
    pub save_date: String,
    pub version: i64,
    pub saved_by: String,
    pub workspace_id: i64,
    pub workspace: String,
    pub checksum: String,
    pub size: i64,
    pub meta: Option<Map<String, Value>>,
}

impl ObjectInfo {
    /// `wsid/objid/version`, the permanent reference to this version.
    pub fn reference(&self) -> String {
        format!("{}/{}/{}", self.workspace_id, self.object_id, self.version)
    }
}

type InfoTuple = (
    i64,
    String,
    String,
    String,
    i64,
    String,
    i64,
    String,
    String,
    i64,
    Option<Map<String, Value>>,
);

impl<'de> Deserialize<'de> for ObjectInfo {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let values = Vec::<Value>::deserialize(deserializer)?;
        if values.len() < 10 {
            return Err(de::Error::invalid_length(
                values.len(),
                &"an object_info tuple of 11 elements",
            ));
        }
        let mut values = values;
        values.resize(11, Value::Null);
        let tuple: InfoTuple =
            serde_json::from_value(Value::Array(values)).map_err(de::Error::custom)?;
        Ok(Self {
            object_id: tuple.0,
            name: tuple.1,
            object_type: tuple.2,
            save_date: tuple.3,
            version: tuple.4,
            saved_by: tuple.5,
            workspace_id: tuple.6,
            workspace: tuple.7,
            checksum: tuple.8,
            size: tuple.9,
            meta: tuple.10,
        })
    }
}

impl Serialize for ObjectInfo {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (
            self.object_id,
            &self.name,
            &self.object_type,
            &self.save_date,
            self.version,
            &self.saved_by,
            self.workspace_id,
            &self.workspace,
            &self.checksum,
            self.size,
            &self.meta,
        )
            .serialize(serializer)
    }
}

/// The object store operations the pipeline depends on.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get_objects(
        &self,
        objects: &[ObjectSpecification],
    ) -> Result<Vec<ObjectData>, WorkspaceError>;

    async fn save_objects(
        &self,
        params: &SaveObjectsParams,
    ) -> Result<Vec<ObjectInfo>, WorkspaceError>;
}
