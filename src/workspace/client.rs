use async_trait::async_trait;
use rand::RngExt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::{
    ObjectData, ObjectInfo, ObjectSpecification, ObjectStore, SaveObjectsParams, WorkspaceError,
};

const RPC_VERSION: &str = "1.1";
const SERVICE: &str = "Workspace";

/// JSON-RPC 1.1 client for a KBase workspace service.
pub struct WorkspaceClient {
    url: String,
    token: Option<String>,
    http: reqwest::Client,
}

impl WorkspaceClient {
    pub fn new(url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            url: url.into(),
            token: token.filter(|t| !t.is_empty()),
            http: reqwest::Client::new(),
        }
    }

    /// Call `Workspace.<method>` with positional `params` and return the
    /// first element of the `result` array.
    async fn call<P, R>(&self, method: &str, params: P) -> Result<R, WorkspaceError>
    where
        P: Serialize + Send,
        R: DeserializeOwned,
    {
        let id = rand::rng().random::<u64>().to_string();
        let method = format!("{SERVICE}.{method}");
        let body = RpcRequest {
            version: RPC_VERSION,
            method: &method,
            params: [params],
            id: &id,
        };
        debug!(url = %self.url, %method, %id, "workspace call");

        let mut req = self.http.post(&self.url).json(&body);
        if let Some(token) = &self.token {
            req = req.header("authorization", token);
        }
        let resp = req.send().await?;
        let status = resp.status();
        let text = resp.text().await?;

        // KBase servers report JSON-RPC errors with HTTP 500 and a JSON body.
        let parsed: RpcResponse = match serde_json::from_str(&text) {
            Ok(parsed) => parsed,
            Err(_) if !status.is_success() => {
                return Err(WorkspaceError::Http {
                    status: status.as_u16(),
                    body: text,
                });
            }
            Err(e) => return Err(e.into()),
        };

        if let Some(error) = parsed.error {
            return Err(WorkspaceError::Server {
                name: error.name,
                code: error.code,
                message: error.message,
                trace: error.error,
            });
        }
        if !status.is_success() {
            return Err(WorkspaceError::Http {
                status: status.as_u16(),
                body: text,
            });
        }

        let first = parsed
            .result
            .and_then(|result| match result {
                Value::Array(mut items) if !items.is_empty() => Some(items.swap_remove(0)),
                _ => None,
            })
            .ok_or(WorkspaceError::Empty("result"))?;
        Ok(serde_json::from_value(first)?)
    }
}

#[async_trait]
impl ObjectStore for WorkspaceClient {
    async fn get_objects(
        &self,
        objects: &[ObjectSpecification],
    ) -> Result<Vec<ObjectData>, WorkspaceError> {
        self.call("get_objects", objects).await
    }

    async fn save_objects(
        &self,
        params: &SaveObjectsParams,
    ) -> Result<Vec<ObjectInfo>, WorkspaceError> {
        self.call("save_objects", params).await
    }
}

// --- wire types ---

#[derive(Serialize)]
struct RpcRequest<'a, P> {
    version: &'a str,
    method: &'a str,
    params: [P; 1],
    id: &'a str,
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Deserialize)]
struct RpcError {
    #[serde(default)]
    name: String,
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
    /// Server-side stack trace.
    #[serde(default)]
    error: Option<String>,
}
