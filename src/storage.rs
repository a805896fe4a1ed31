//! キー・バリュー保存領域
//!
//! 設定とスキャン一覧はすべて文字列スロットとして保存する。
//! - FileStore: 1スロット = 1ファイル（一時ファイル + rename で置換）
//! - MemoryStore: テスト用のインメモリ実装

use crate::error::{NutriSnapError, Result};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

pub const KEY_API_KEY: &str = "nutrisnap_api_key";
pub const KEY_DIETARY_PREFS: &str = "nutrisnap_dietary_prefs";
pub const KEY_ALLERGIES: &str = "nutrisnap_allergies";
pub const KEY_SAFETY_MODE: &str = "nutrisnap_safety_mode";
pub const KEY_SELECTED_MEAL: &str = "nutrisnap_selected_meal";
pub const KEY_SAVED_SCANS: &str = "saved_scans";

/// 永続スロット
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// ディレクトリ配下のファイルで各スロットを保持
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| {
            NutriSnapError::Persistence(format!("{}: {}", dir.display(), e))
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn slot_path(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
        if !valid {
            return Err(NutriSnapError::Persistence(format!("invalid slot key: {:?}", key)));
        }
        Ok(self.dir.join(key))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.slot_path(key)?;
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(NutriSnapError::Persistence(format!("{}: {}", path.display(), e))),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.slot_path(key)?;
        let tmp_path = self.dir.join(format!(".{}.tmp", key));

        fs::write(&tmp_path, value)
            .and_then(|_| fs::rename(&tmp_path, &path))
            .map_err(|e| {
                let _ = fs::remove_file(&tmp_path);
                NutriSnapError::Persistence(format!("{}: {}", path.display(), e))
            })
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.slot_path(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(NutriSnapError::Persistence(format!("{}: {}", path.display(), e))),
        }
    }
}

/// インメモリ実装（テスト・一時利用向け）
#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: Mutex<HashMap<String, String>>,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// true の間、set/remove はすべて PersistenceError になる
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// true の間、get はすべて PersistenceError になる
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_writable(&self, key: &str) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(NutriSnapError::Persistence(format!("write rejected for slot {}", key)));
        }
        Ok(())
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(NutriSnapError::Persistence(format!("read rejected for slot {}", key)));
        }
        Ok(self.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.check_writable(key)?;
        self.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.check_writable(key)?;
        self.lock().remove(key);
        Ok(())
    }
}
