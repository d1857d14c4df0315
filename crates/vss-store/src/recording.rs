//! CSV recorder decorator — grounded on `VssDatabase_Record.cpp`, which
//! wraps `setSignal`/`getSignal` to also append a record before delegating
//! to the real database. Reshaped from inheritance into wrapper composition:
//! `RecordingTree<T>` holds any `TreeBackend` and forwards every call,
//! logging only around `set_signal`.

use std::fs::OpenOptions;
use std::path::Path as FsPath;
use std::sync::Mutex;

use serde_json::Value as Json;
use vss_store_core::TreeBackend;
use vss_types::{Attribute, Path, RuntimeValue, VssError};

/// Wraps a [`TreeBackend`] and appends a `timestamp,path,attribute,value`
/// row to a CSV file for every successful `set_signal`.
pub struct RecordingTree<T: TreeBackend> {
    inner: T,
    writer: Mutex<csv::Writer<std::fs::File>>,
}

impl<T: TreeBackend> RecordingTree<T> {
    /// Wrap `inner`, appending records to `csv_path` (created if absent).
    pub fn new(inner: T, csv_path: &FsPath) -> Result<Self, VssError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(csv_path)
            .map_err(|e| VssError::Generic(format!("cannot open record file: {e}")))?;
        let writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        Ok(Self {
            inner,
            writer: Mutex::new(writer),
        })
    }

    fn record(&self, path: &str, attribute: Attribute, value: &Json, timestamp_ms: i64) {
        let mut writer = self.writer.lock().expect("record writer lock poisoned");
        if let Err(e) = writer.write_record(&[
            timestamp_ms.to_string(),
            path.to_owned(),
            attribute.as_str().to_owned(),
            value.to_string(),
        ]) {
            tracing::warn!(error = %e, "failed to append recorder row");
            return;
        }
        let _ = writer.flush();
    }
}

impl<T: TreeBackend> TreeBackend for RecordingTree<T> {
    fn init(&self, tree: Json) -> Result<(), VssError> {
        self.inner.init(tree)
    }

    fn apply_overlay(&self, overlay: Json) -> Result<(), VssError> {
        self.inner.apply_overlay(overlay)
    }

    fn path_exists(&self, path: &Path) -> bool {
        self.inner.path_exists(path)
    }

    fn path_is_writable(&self, path: &Path, attribute: Attribute) -> bool {
        self.inner.path_is_writable(path, attribute)
    }

    fn path_is_attributable(&self, path: &Path, attribute: Attribute) -> bool {
        self.inner.path_is_attributable(path, attribute)
    }

    fn get_leaf_paths(&self, path: &Path) -> Vec<Path> {
        self.inner.get_leaf_paths(path)
    }

    fn get_metadata(&self, path: &Path) -> Result<Json, VssError> {
        self.inner.get_metadata(path)
    }

    fn update_metadata(&self, path: &Path, metadata: Json) -> Result<(), VssError> {
        self.inner.update_metadata(path, metadata)
    }

    fn set_signal(&self, path: &Path, attribute: Attribute, data: Json) -> Result<RuntimeValue, VssError> {
        let value = self.inner.set_signal(path, attribute, data)?;
        self.record(&path.to_string(), attribute, &value.data, value.timestamp_ms);
        Ok(value)
    }

    fn get_signal(&self, path: &Path, attribute: Attribute, as_string: bool) -> Result<RuntimeValue, VssError> {
        self.inner.get_signal(path, attribute, as_string)
    }
}
