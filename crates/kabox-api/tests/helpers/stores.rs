//! In-memory storage and database doubles.

use async_trait::async_trait;
use kabox_core::{sanitize_filename, FileRecord, NewFileRecord};
use kabox_db::{DbError, DbResult, RecordStore};
use kabox_storage::{ObjectStore, ObjectUpload, StorageError, StorageResult, StoredObject};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::io::AsyncReadExt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBehavior {
    Accept,
    /// Accept but return no URL, like a provider API that omits it.
    AcceptWithoutUrl,
    Fail,
}

pub struct MemoryObjectStore {
    name: &'static str,
    behavior: StoreBehavior,
    objects: Mutex<HashMap<String, Vec<u8>>>,
    puts: Mutex<usize>,
    received_names: Mutex<Vec<String>>,
    deletes: Mutex<Vec<String>>,
}

impl MemoryObjectStore {
    pub fn new(name: &'static str, behavior: StoreBehavior) -> Arc<Self> {
        Arc::new(Self {
            name,
            behavior,
            objects: Mutex::new(HashMap::new()),
            puts: Mutex::new(0),
            received_names: Mutex::new(Vec::new()),
            deletes: Mutex::new(Vec::new()),
        })
    }

    pub fn put_count(&self) -> usize {
        *self.puts.lock().unwrap()
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn object(&self, file_id: &str, file_name: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(&format!("{}_{}", file_id, sanitize_filename(file_name)))
            .cloned()
    }

    /// `file_name` of every upload handed to this store, failed attempts included.
    pub fn received_names(&self) -> Vec<String> {
        self.received_names.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deletes.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    fn name(&self) -> &str {
        self.name
    }

    async fn put(&self, object: &ObjectUpload) -> StorageResult<StoredObject> {
        *self.puts.lock().unwrap() += 1;
        self.received_names
            .lock()
            .unwrap()
            .push(object.file_name.clone());
        if self.behavior == StoreBehavior::Fail {
            return Err(StorageError::UploadFailed(format!("{} is down", self.name)));
        }

        let mut data = Vec::new();
        object.reader().await?.read_to_end(&mut data).await?;
        let key = object.object_key();
        self.objects.lock().unwrap().insert(key.clone(), data);

        let url = match self.behavior {
            StoreBehavior::Accept => Some(self.public_url(&object.file_id, &object.file_name)),
            _ => None,
        };
        Ok(StoredObject {
            provider: self.name.to_string(),
            url,
            object_key: key,
        })
    }

    fn public_url(&self, file_id: &str, file_name: &str) -> String {
        format!(
            "https://{}.test/kabox/{}_{}",
            self.name,
            file_id,
            sanitize_filename(file_name)
        )
    }

    async fn delete(&self, file_id: &str, file_name: &str) -> StorageResult<()> {
        let key = format!("{}_{}", file_id, sanitize_filename(file_name));
        self.deletes.lock().unwrap().push(key.clone());
        match self.objects.lock().unwrap().remove(&key) {
            Some(_) => Ok(()),
            None => Err(StorageError::NotFound(key)),
        }
    }
}

pub struct MemoryRecordStore {
    name: &'static str,
    failing: bool,
    rows: Mutex<HashMap<String, FileRecord>>,
    lookups: Mutex<usize>,
}

impl MemoryRecordStore {
    fn build(name: &'static str, failing: bool) -> Arc<Self> {
        Arc::new(Self {
            name,
            failing,
            rows: Mutex::new(HashMap::new()),
            lookups: Mutex::new(0),
        })
    }

    pub fn healthy(name: &'static str) -> Arc<Self> {
        Self::build(name, false)
    }

    pub fn failing(name: &'static str) -> Arc<Self> {
        Self::build(name, true)
    }

    pub fn seed(&self, record: FileRecord) {
        self.rows.lock().unwrap().insert(record.id.clone(), record);
    }

    pub fn row_count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn lookups(&self) -> usize {
        *self.lookups.lock().unwrap()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    fn name(&self) -> &str {
        self.name
    }

    async fn initialize(&self) -> DbResult<()> {
        Ok(())
    }

    async fn insert(&self, record: &NewFileRecord) -> DbResult<()> {
        if self.failing {
            return Err(DbError::Query(format!("{} rejected insert", self.name)));
        }
        self.rows.lock().unwrap().insert(
            record.id.clone(),
            record.clone().into_record(Some(chrono::Utc::now())),
        );
        Ok(())
    }

    async fn get_by_key(&self, id: &str) -> DbResult<Option<FileRecord>> {
        *self.lookups.lock().unwrap() += 1;
        if self.failing {
            return Err(DbError::Query(format!("{} unreachable", self.name)));
        }
        Ok(self.rows.lock().unwrap().get(id).cloned())
    }

    async fn delete(&self, id: &str) -> DbResult<bool> {
        if self.failing {
            return Err(DbError::Query(format!("{} unreachable", self.name)));
        }
        Ok(self.rows.lock().unwrap().remove(id).is_some())
    }
}
