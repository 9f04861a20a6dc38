//! 永続キーバリューストア。
//!
//! ## バージョニング方針
//!
//! - `SAVE_VERSION`: 現在のドキュメント形式バージョン。フィールド追加時にインクリメントする。
//! - `MIN_COMPATIBLE_VERSION`: 読み込める最小バージョン。
//!   既存フィールドの削除や意味変更など破壊的変更を行った場合のみインクリメントする。
//!
//! `MIN_COMPATIBLE_VERSION` 以上のドキュメントは不足フィールドをデフォルト値で補完して読み込む。
//! それより古いものは [`StoreError::IncompatibleVersion`] で拒否する。

use std::collections::{BTreeMap, BTreeSet};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::StoreError;

/// [`JsonFileStore::flush`] が書き込むフォーマットバージョン。
pub const SAVE_VERSION: u32 = 1;

/// [`JsonFileStore::open`] が受け付ける最小バージョン。
pub const MIN_COMPATIBLE_VERSION: u32 = 1;

/// 1 つのキーに入る型付きの値。
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum StoredValue {
    Int(i32),
    Long(i64),
    Float(f32),
    Text(String),
    TextSet(BTreeSet<String>),
}

impl StoredValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            StoredValue::Int(_) => "int",
            StoredValue::Long(_) => "long",
            StoredValue::Float(_) => "float",
            StoredValue::Text(_) => "text",
            StoredValue::TextSet(_) => "text set",
        }
    }
}

fn mismatch(key: &str, expected: &'static str, found: &StoredValue) -> StoreError {
    StoreError::TypeMismatch {
        key: key.to_string(),
        expected,
        found: found.type_name(),
    }
}

/// 文字列・数値を型付きで持つキーバリューストア。
///
/// getter はキーが無ければ `Ok(None)`、別の型が入っていれば [`StoreError::TypeMismatch`] を返す。
/// `int` は `long` として読み出してもよい。
pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> Option<&StoredValue>;
    fn put(&mut self, key: &str, value: StoredValue);
    fn remove(&mut self, key: &str);
    fn keys(&self) -> Vec<String>;

    /// ここまでの書き込みを永続化する。
    fn flush(&mut self) -> Result<(), StoreError> {
        Ok(())
    }

    fn get_i32(&self, key: &str) -> Result<Option<i32>, StoreError> {
        match self.get(key) {
            None => Ok(None),
            Some(StoredValue::Int(v)) => Ok(Some(*v)),
            Some(other) => Err(mismatch(key, "int", other)),
        }
    }

    fn get_i64(&self, key: &str) -> Result<Option<i64>, StoreError> {
        match self.get(key) {
            None => Ok(None),
            Some(StoredValue::Long(v)) => Ok(Some(*v)),
            Some(StoredValue::Int(v)) => Ok(Some(*v as i64)),
            Some(other) => Err(mismatch(key, "long", other)),
        }
    }

    fn get_f32(&self, key: &str) -> Result<Option<f32>, StoreError> {
        match self.get(key) {
            None => Ok(None),
            Some(StoredValue::Float(v)) => Ok(Some(*v)),
            Some(other) => Err(mismatch(key, "float", other)),
        }
    }

    fn get_string(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self.get(key) {
            None => Ok(None),
            Some(StoredValue::Text(v)) => Ok(Some(v.clone())),
            Some(other) => Err(mismatch(key, "text", other)),
        }
    }

    fn get_string_set(&self, key: &str) -> Result<Option<BTreeSet<String>>, StoreError> {
        match self.get(key) {
            None => Ok(None),
            Some(StoredValue::TextSet(v)) => Ok(Some(v.clone())),
            Some(other) => Err(mismatch(key, "text set", other)),
        }
    }

    fn put_i32(&mut self, key: &str, value: i32) {
        self.put(key, StoredValue::Int(value));
    }

    fn put_i64(&mut self, key: &str, value: i64) {
        self.put(key, StoredValue::Long(value));
    }

    fn put_f32(&mut self, key: &str, value: f32) {
        self.put(key, StoredValue::Float(value));
    }

    fn put_string(&mut self, key: &str, value: &str) {
        self.put(key, StoredValue::Text(value.to_string()));
    }

    fn put_string_set(&mut self, key: &str, value: BTreeSet<String>) {
        self.put(key, StoredValue::TextSet(value));
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MemoryStore {
    entries: BTreeMap<String, StoredValue>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<&StoredValue> {
        self.entries.get(key)
    }

    fn put(&mut self, key: &str, value: StoredValue) {
        self.entries.insert(key.to_string(), value);
    }

    fn remove(&mut self, key: &str) {
        self.entries.remove(key);
    }

    fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }
}

/// ディスク上のドキュメント。
#[derive(Serialize, Deserialize)]
struct SaveDocument {
    version: u32,
    #[serde(default)]
    entries: BTreeMap<String, StoredValue>,
}

/// JSON ファイルを裏に持つ [`MemoryStore`]。
/// 書き込みは [`KeyValueStore::flush`] でファイル全体を書き直すまでメモリ上に留まる。
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    memory: MemoryStore,
}

impl JsonFileStore {
    /// `path` のストアを開く。ファイルが無ければ空のストアになる。
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let json = match std::fs::read_to_string(&path) {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "no save file, starting empty");
                return Ok(Self {
                    path,
                    memory: MemoryStore::new(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        let doc: SaveDocument = serde_json::from_str(&json)?;
        if doc.version < MIN_COMPATIBLE_VERSION {
            return Err(StoreError::IncompatibleVersion {
                found: doc.version,
                min: MIN_COMPATIBLE_VERSION,
            });
        }
        if doc.version < SAVE_VERSION {
            info!(
                saved = doc.version,
                current = SAVE_VERSION,
                "migrating save document"
            );
        }
        Ok(Self {
            path,
            memory: MemoryStore {
                entries: doc.entries,
            },
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<&StoredValue> {
        self.memory.get(key)
    }

    fn put(&mut self, key: &str, value: StoredValue) {
        self.memory.put(key, value);
    }

    fn remove(&mut self, key: &str) {
        self.memory.remove(key);
    }

    fn keys(&self) -> Vec<String> {
        self.memory.keys()
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        let doc = SaveDocument {
            version: SAVE_VERSION,
            entries: self.memory.entries.clone(),
        };
        let json = serde_json::to_string_pretty(&doc)?;
        std::fs::write(&self.path, json)?;
        debug!(path = %self.path.display(), entries = self.memory.len(), "save file written");
        Ok(())
    }
}
