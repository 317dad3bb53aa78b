//! Remote container resolution and the time-boxed object-name map.
//!
//! The resolver owns two caches: the container id and the map from local
//! note id to remote object id, rebuilt from a remote listing. Both expire
//! after a TTL; the object map is additionally dropped when the container
//! id changes or explicitly after any remote mutation. The caches are
//! mutated only by whoever holds the resolver, so there is no locking here.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use tabula_core::{parse_object_name, DriveObject, Error, RemoteDrive, Result};

struct CachedContainer {
    id: String,
    fetched_at: Instant,
}

struct CachedObjectMap {
    map: HashMap<String, String>,
    container_id: String,
    fetched_at: Instant,
}

/// Locates (or creates) the remote container and maintains the short-lived
/// note-id to remote-object-id mapping.
pub struct ContainerResolver {
    drive: Arc<dyn RemoteDrive>,
    container_name: String,
    ttl: Duration,
    container: Option<CachedContainer>,
    objects: Option<CachedObjectMap>,
}

impl ContainerResolver {
    pub fn new(drive: Arc<dyn RemoteDrive>, container_name: String, ttl: Duration) -> Self {
        Self {
            drive,
            container_name,
            ttl,
            container: None,
            objects: None,
        }
    }

    /// Resolve the container by exact name match. Does NOT auto-create:
    /// returns `NotFound` so the caller decides whether to create.
    pub async fn resolve_container(&mut self) -> Result<String> {
        if let Some(cached) = &self.container {
            if cached.fetched_at.elapsed() < self.ttl {
                return Ok(cached.id.clone());
            }
        }

        let containers = self.drive.list_containers(&self.container_name).await?;
        let found = containers.into_iter().next().ok_or_else(|| {
            Error::NotFound(format!("remote container '{}'", self.container_name))
        })?;

        // A different container id than last resolved means the object map
        // no longer describes reality.
        let changed = self
            .objects
            .as_ref()
            .is_some_and(|cached| cached.container_id != found.id);
        if changed {
            debug!(
                subsystem = "sync",
                component = "resolver",
                container_id = %found.id,
                "Container id changed, dropping object map"
            );
            self.objects = None;
        }

        self.container = Some(CachedContainer {
            id: found.id.clone(),
            fetched_at: Instant::now(),
        });
        Ok(found.id)
    }

    /// Create the container and seed an empty, fresh object map.
    pub async fn create_container(&mut self) -> Result<String> {
        let created = self.drive.create_container(&self.container_name).await?;
        let now = Instant::now();
        self.container = Some(CachedContainer {
            id: created.id.clone(),
            fetched_at: now,
        });
        self.objects = Some(CachedObjectMap {
            map: HashMap::new(),
            container_id: created.id.clone(),
            fetched_at: now,
        });
        Ok(created.id)
    }

    /// The mapping from local note id to remote object id, served from
    /// cache within the TTL and rebuilt from one paginated listing call
    /// otherwise.
    pub async fn object_map(&mut self, container_id: &str) -> Result<HashMap<String, String>> {
        if let Some(cached) = &self.objects {
            if cached.container_id == container_id && cached.fetched_at.elapsed() < self.ttl {
                return Ok(cached.map.clone());
            }
        }

        let objects = self.drive.list_objects(container_id).await?;
        let map = build_object_map(objects);
        debug!(
            subsystem = "sync",
            component = "resolver",
            container_id = %container_id,
            result_count = map.len(),
            "Rebuilt remote object map"
        );
        self.objects = Some(CachedObjectMap {
            map: map.clone(),
            container_id: container_id.to_string(),
            fetched_at: Instant::now(),
        });
        Ok(map)
    }

    /// Drop both caches immediately. Called after any remote mutation.
    pub fn invalidate(&mut self) {
        self.container = None;
        self.objects = None;
    }
}

/// Parse a remote listing into the local-id map. Unparseable names are
/// skipped and logged. Two objects claiming the same local id (a race
/// between two processes creating the file) are resolved deterministically
/// by most recent modification time, then object id; the loser is treated
/// as orphaned for later cleanup, never merged.
fn build_object_map(objects: Vec<DriveObject>) -> HashMap<String, String> {
    let mut winners: HashMap<String, DriveObject> = HashMap::new();
    for object in objects {
        let Some(local_id) = parse_object_name(&object.name) else {
            warn!(
                subsystem = "sync",
                component = "resolver",
                object_id = %object.id,
                name = %object.name,
                "Skipping remote object with unparseable name"
            );
            continue;
        };
        let replace = match winners.get(&local_id) {
            None => true,
            Some(current) => {
                let wins = newer_than(&object, current);
                let orphan_id = if wins { &current.id } else { &object.id };
                warn!(
                    subsystem = "sync",
                    component = "resolver",
                    note_id = %local_id,
                    object_id = %orphan_id,
                    "Duplicate remote object for note, treating as orphaned"
                );
                wins
            }
        };
        if replace {
            winners.insert(local_id, object);
        }
    }
    winners
        .into_iter()
        .map(|(local_id, object)| (local_id, object.id))
        .collect()
}

fn newer_than(a: &DriveObject, b: &DriveObject) -> bool {
    (&a.modified_time, &a.id) > (&b.modified_time, &b.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn object(id: &str, name: &str, modified_ms: Option<i64>) -> DriveObject {
        DriveObject {
            id: id.to_string(),
            name: name.to_string(),
            modified_time: modified_ms
                .map(|ms| chrono::Utc.timestamp_millis_opt(ms).unwrap()),
        }
    }

    #[test]
    fn map_skips_unparseable_names() {
        let map = build_object_map(vec![
            object("r1", "Title--a.json", Some(1)),
            object("r2", "garbage.txt", Some(2)),
        ]);
        assert_eq!(map.len(), 1);
        assert_eq!(map["a"], "r1");
    }

    #[test]
    fn map_parses_legacy_names() {
        let map = build_object_map(vec![object("r1", "tabula-note-a.json", None)]);
        assert_eq!(map["a"], "r1");
    }

    #[test]
    fn duplicate_ids_resolve_to_most_recently_modified() {
        let map = build_object_map(vec![
            object("r-old", "Title--a.json", Some(1_000)),
            object("r-new", "Title--a.json", Some(2_000)),
        ]);
        assert_eq!(map.len(), 1);
        assert_eq!(map["a"], "r-new");

        // Order of the listing does not change the winner.
        let map = build_object_map(vec![
            object("r-new", "Title--a.json", Some(2_000)),
            object("r-old", "Title--a.json", Some(1_000)),
        ]);
        assert_eq!(map["a"], "r-new");
    }

    #[test]
    fn duplicate_tie_breaks_on_object_id() {
        let map = build_object_map(vec![
            object("r-a", "Title--a.json", Some(1_000)),
            object("r-b", "Title--a.json", Some(1_000)),
        ]);
        assert_eq!(map["a"], "r-b");
    }
}
