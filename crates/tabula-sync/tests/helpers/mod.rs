//! Shared fixtures for sync integration tests: an in-memory drive with call
//! counters and failure injection, plus store and note builders.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use tabula_core::{
    BodyNode, CredentialStore, DriveObject, Error, Note, RemoteDrive, Result, TokenResponse,
};
use tabula_db::Database;
use tabula_sync::{SyncConfig, SyncEngine};

pub struct MockObject {
    pub container_id: String,
    pub name: String,
    pub content: Vec<u8>,
    pub modified_ms: i64,
}

#[derive(Default)]
struct MockState {
    containers: Vec<DriveObject>,
    objects: HashMap<String, MockObject>,
    next_id: u64,
    clock_ms: i64,
    list_container_calls: usize,
    list_object_calls: usize,
    create_object_calls: usize,
    update_object_calls: usize,
    get_content_calls: usize,
    list_object_failures: usize,
    fail_creates: bool,
}

/// In-memory [`RemoteDrive`] with deterministic ids and modification times.
pub struct MockDrive {
    state: Mutex<MockState>,
    latency: Option<Duration>,
}

impl MockDrive {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            latency: None,
        }
    }

    /// Every drive call sleeps first, guaranteeing overlap in lock tests.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            latency: Some(latency),
        }
    }

    async fn pause(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    pub fn seed_container(&self, id: &str, name: &str) {
        let mut state = self.state.lock().unwrap();
        state.containers.push(DriveObject {
            id: id.to_string(),
            name: name.to_string(),
            modified_time: None,
        });
    }

    pub fn seed_object(
        &self,
        container_id: &str,
        name: &str,
        content: &[u8],
        modified_ms: i64,
    ) -> String {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = format!("obj-{}", state.next_id);
        state.objects.insert(
            id.clone(),
            MockObject {
                container_id: container_id.to_string(),
                name: name.to_string(),
                content: content.to_vec(),
                modified_ms,
            },
        );
        id
    }

    pub fn object_count(&self) -> usize {
        self.state.lock().unwrap().objects.len()
    }

    pub fn container_count(&self) -> usize {
        self.state.lock().unwrap().containers.len()
    }

    pub fn object_names(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .objects
            .values()
            .map(|o| o.name.clone())
            .collect()
    }

    pub fn content_by_name(&self, name: &str) -> Option<Vec<u8>> {
        self.state
            .lock()
            .unwrap()
            .objects
            .values()
            .find(|o| o.name == name)
            .map(|o| o.content.clone())
    }

    pub fn list_container_calls(&self) -> usize {
        self.state.lock().unwrap().list_container_calls
    }

    pub fn list_object_calls(&self) -> usize {
        self.state.lock().unwrap().list_object_calls
    }

    pub fn create_object_calls(&self) -> usize {
        self.state.lock().unwrap().create_object_calls
    }

    pub fn update_object_calls(&self) -> usize {
        self.state.lock().unwrap().update_object_calls
    }

    pub fn get_content_calls(&self) -> usize {
        self.state.lock().unwrap().get_content_calls
    }

    /// The next `count` object listings fail with a transient error.
    pub fn push_list_object_failures(&self, count: usize) {
        self.state.lock().unwrap().list_object_failures += count;
    }

    /// Make every object creation fail with a transient error.
    pub fn fail_creates(&self, enabled: bool) {
        self.state.lock().unwrap().fail_creates = enabled;
    }

    pub fn clear_containers(&self) {
        self.state.lock().unwrap().containers.clear();
    }
}

#[async_trait]
impl RemoteDrive for MockDrive {
    async fn list_containers(&self, name: &str) -> Result<Vec<DriveObject>> {
        self.pause().await;
        let mut state = self.state.lock().unwrap();
        state.list_container_calls += 1;
        Ok(state
            .containers
            .iter()
            .filter(|c| c.name == name)
            .cloned()
            .collect())
    }

    async fn create_container(&self, name: &str) -> Result<DriveObject> {
        self.pause().await;
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let container = DriveObject {
            id: format!("container-{}", state.next_id),
            name: name.to_string(),
            modified_time: None,
        };
        state.containers.push(container.clone());
        Ok(container)
    }

    async fn list_objects(&self, container_id: &str) -> Result<Vec<DriveObject>> {
        self.pause().await;
        let mut state = self.state.lock().unwrap();
        state.list_object_calls += 1;
        if state.list_object_failures > 0 {
            state.list_object_failures -= 1;
            return Err(Error::TransientNetwork("injected listing failure".into()));
        }
        Ok(state
            .objects
            .iter()
            .filter(|(_, o)| o.container_id == container_id)
            .map(|(id, o)| DriveObject {
                id: id.clone(),
                name: o.name.clone(),
                modified_time: Utc.timestamp_millis_opt(o.modified_ms).single(),
            })
            .collect())
    }

    async fn create_object(
        &self,
        container_id: &str,
        name: &str,
        content: &[u8],
    ) -> Result<DriveObject> {
        self.pause().await;
        let mut state = self.state.lock().unwrap();
        state.create_object_calls += 1;
        if state.fail_creates {
            return Err(Error::TransientNetwork("injected create failure".into()));
        }
        state.next_id += 1;
        state.clock_ms += 1;
        let id = format!("obj-{}", state.next_id);
        let modified_ms = state.clock_ms;
        state.objects.insert(
            id.clone(),
            MockObject {
                container_id: container_id.to_string(),
                name: name.to_string(),
                content: content.to_vec(),
                modified_ms,
            },
        );
        Ok(DriveObject {
            id,
            name: name.to_string(),
            modified_time: Utc.timestamp_millis_opt(modified_ms).single(),
        })
    }

    async fn update_object(
        &self,
        object_id: &str,
        name: &str,
        content: &[u8],
    ) -> Result<DriveObject> {
        self.pause().await;
        let mut state = self.state.lock().unwrap();
        state.update_object_calls += 1;
        state.clock_ms += 1;
        let clock_ms = state.clock_ms;
        let object = state
            .objects
            .get_mut(object_id)
            .ok_or_else(|| Error::NotFound(format!("object {object_id}")))?;
        object.name = name.to_string();
        object.content = content.to_vec();
        object.modified_ms = clock_ms;
        Ok(DriveObject {
            id: object_id.to_string(),
            name: name.to_string(),
            modified_time: Utc.timestamp_millis_opt(clock_ms).single(),
        })
    }

    async fn get_object_content(&self, object_id: &str) -> Result<Vec<u8>> {
        self.pause().await;
        let mut state = self.state.lock().unwrap();
        state.get_content_calls += 1;
        state
            .objects
            .get(object_id)
            .map(|o| o.content.clone())
            .ok_or_else(|| Error::NotFound(format!("object {object_id}")))
    }

    async fn delete_object(&self, object_id: &str) -> Result<()> {
        self.pause().await;
        self.state.lock().unwrap().objects.remove(object_id);
        Ok(())
    }
}

/// An in-memory store with a long-lived credential already saved.
pub async fn signed_in_db() -> Database {
    let db = Database::connect_in_memory()
        .await
        .expect("in-memory store should open");
    db.credentials
        .save(TokenResponse {
            access_token: "test-token".to_string(),
            expires_in: 3_600,
            scope: "drive.file".to_string(),
            token_type: "Bearer".to_string(),
        })
        .await
        .expect("credential save should succeed");
    db
}

pub fn note_at(id: &str, title: &str, updated_ms: i64) -> Note {
    Note {
        id: id.to_string(),
        title: title.to_string(),
        body: vec![BodyNode::text(title)],
        created_at: Utc.timestamp_millis_opt(updated_ms - 1000).unwrap(),
        updated_at: Utc.timestamp_millis_opt(updated_ms).unwrap(),
    }
}

/// Engine with the throttle disabled, for tests that sync repeatedly.
pub fn unthrottled_engine(db: Database, drive: Arc<MockDrive>) -> SyncEngine {
    let credentials: Arc<dyn CredentialStore> = Arc::new(db.credentials.clone());
    let config = SyncConfig {
        min_sync_interval: Duration::ZERO,
        ..SyncConfig::default()
    };
    SyncEngine::with_config(db, drive, credentials, config)
}

/// Engine with the default (armed) throttle.
pub fn throttled_engine(db: Database, drive: Arc<MockDrive>) -> SyncEngine {
    let credentials: Arc<dyn CredentialStore> = Arc::new(db.credentials.clone());
    SyncEngine::with_config(db, drive, credentials, SyncConfig::default())
}
