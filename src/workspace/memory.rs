use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{
    ObjectData, ObjectInfo, ObjectSaveData, ObjectSpecification, ObjectStore, SaveObjectsParams,
    WorkspaceError,
};

/// A workspace held in memory. Objects are keyed by `workspace/name`;
/// every save creates a new version.
pub struct MemoryWorkspace {
    state: Mutex<State>,
    get_calls: AtomicUsize,
    save_calls: AtomicUsize,
}

#[derive(Default)]
struct State {
    workspace_ids: HashMap<String, i64>,
    objects: HashMap<String, Stored>,
    next_object_id: i64,
    fail_saves: Option<String>,
}

struct Stored {
    info: ObjectInfo,
    save: ObjectSaveData,
}

impl Default for MemoryWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryWorkspace {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                next_object_id: 1,
                ..State::default()
            }),
            get_calls: AtomicUsize::new(0),
            save_calls: AtomicUsize::new(0),
        }
    }

    /// Store raw object data under `workspace/name`, as another tool would.
    pub fn insert(&self, workspace: &str, name: &str, object_type: &str, data: Value) -> ObjectInfo {
        let mut state = self.state.lock().unwrap();
        state.put(
            workspace,
            ObjectSaveData {
                object_type: object_type.to_string(),
                data,
                name: name.to_string(),
                meta: Default::default(),
                hidden: 0,
                provenance: Vec::new(),
            },
        )
    }

    /// Make every following `save_objects` call fail with `message`.
    pub fn fail_saves(&self, message: &str) {
        self.state.lock().unwrap().fail_saves = Some(message.to_string());
    }

    /// The last saved form of `workspace/name`, including provenance.
    pub fn saved(&self, workspace: &str, name: &str) -> Option<ObjectSaveData> {
        let state = self.state.lock().unwrap();
        state
            .objects
            .get(&format!("{workspace}/{name}"))
            .map(|stored| stored.save.clone())
    }

    /// Number of objects currently held in `workspace`.
    pub fn object_count(&self, workspace: &str) -> usize {
        let state = self.state.lock().unwrap();
        state
            .objects
            .values()
            .filter(|stored| stored.info.workspace == workspace)
            .count()
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn save_calls(&self) -> usize {
        self.save_calls.load(Ordering::SeqCst)
    }
}

impl State {
    fn workspace_id(&mut self, workspace: &str) -> i64 {
        let next = self.workspace_ids.len() as i64 + 1;
        *self.workspace_ids.entry(workspace.to_string()).or_insert(next)
    }

    fn put(&mut self, workspace: &str, save: ObjectSaveData) -> ObjectInfo {
        let workspace_id = self.workspace_id(workspace);
        let key = format!("{workspace}/{}", save.name);
        let (object_id, version) = match self.objects.get(&key) {
            Some(existing) => (existing.info.object_id, existing.info.version + 1),
            None => {
                let id = self.next_object_id;
                self.next_object_id += 1;
                (id, 1)
            }
        };
        let info = ObjectInfo {
            object_id,
            name: save.name.clone(),
            object_type: save.object_type.clone(),
            save_date: String::new(),
            version,
            saved_by: String::new(),
            workspace_id,
            workspace: workspace.to_string(),
            checksum: String::new(),
            size: save.data.to_string().len() as i64,
            meta: Some(save.meta.clone()),
        };
        self.objects.insert(
            key,
            Stored {
                info: info.clone(),
                save,
            },
        );
        info
    }

    /// Resolve `ws/name`, `wsid/objid` or either with a trailing `/ver`.
    fn resolve(&self, reference: &str) -> Option<&Stored> {
        let mut parts = reference.splitn(3, '/');
        let (ws, obj) = (parts.next()?, parts.next()?);
        self.objects.values().find(|stored| {
            let ws_match =
                stored.info.workspace == ws || stored.info.workspace_id.to_string() == ws;
            let obj_match =
                stored.info.name == obj || stored.info.object_id.to_string() == obj;
            ws_match && obj_match
        })
    }
}

#[async_trait]
impl ObjectStore for MemoryWorkspace {
    async fn get_objects(
        &self,
        objects: &[ObjectSpecification],
    ) -> Result<Vec<ObjectData>, WorkspaceError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().unwrap();
        objects
            .iter()
            .map(|spec| {
                state
                    .resolve(&spec.reference)
                    .map(|stored| ObjectData {
                        data: stored.save.data.clone(),
                    })
                    .ok_or_else(|| WorkspaceError::NotFound(spec.reference.clone()))
            })
            .collect()
    }

    async fn save_objects(
        &self,
        params: &SaveObjectsParams,
    ) -> Result<Vec<ObjectInfo>, WorkspaceError> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        if let Some(message) = &state.fail_saves {
            return Err(WorkspaceError::Server {
                name: "JSONRPCError".to_string(),
                code: -32500,
                message: message.clone(),
                trace: None,
            });
        }
        Ok(params
            .objects
            .iter()
            .map(|save| state.put(&params.workspace, save.clone()))
            .collect())
    }
}
