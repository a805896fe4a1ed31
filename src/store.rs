//! 保存スキャンストア
//!
//! 保存済みスキャンを1つのスロットにJSON配列として保持する。
//! 件数上限を超えたら、ピン留めされていない最も古いスキャンから削除する。
//! すべてピン留めなら、ピン状態に関係なく最も古いものを削除する。

use crate::error::{NutriSnapError, Result};
use crate::storage::{KeyValueStore, KEY_SAVED_SCANS};
use chrono::Utc;
use nutrisnap_common::SavedScan;
use rand::Rng;
use std::sync::Arc;

/// 保存件数の上限
pub const MAX_SAVED_SCANS: usize = 10;

const ID_SUFFIX_LEN: usize = 9;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// スキャンID生成（エポックミリ秒 + ランダムな英数字9文字）
pub fn new_scan_id() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..ID_SUFFIX_LEN)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    format!("{}{}", Utc::now().timestamp_millis(), suffix)
}

pub struct ScanStore {
    kv: Arc<dyn KeyValueStore>,
    /// 新しい順
    scans: Vec<SavedScan>,
}

impl ScanStore {
    /// スロットから読み込んだストアを作成
    pub fn load(kv: Arc<dyn KeyValueStore>) -> Self {
        let mut store = Self {
            kv,
            scans: Vec::new(),
        };
        store.reload();
        store
    }

    /// スロットを読み直してキャッシュを置き換える
    ///
    /// 読み込み失敗・破損データは空として扱う（呼び出し側には失敗を返さない）
    pub fn reload(&mut self) -> &[SavedScan] {
        self.scans = self.read_slot().unwrap_or_else(|e| {
            tracing::warn!("failed to read saved scans: {}", e);
            Vec::new()
        });
        &self.scans
    }

    /// 書き込み前の読み直し。読み込みに失敗したらキャッシュは変えずにエラーを返す
    pub fn try_reload(&mut self) -> Result<&[SavedScan]> {
        self.scans = self.read_slot()?;
        Ok(&self.scans)
    }

    /// スロットの内容（新しい順）。破損データは空
    fn read_slot(&self) -> Result<Vec<SavedScan>> {
        let Some(raw) = self.kv.get(KEY_SAVED_SCANS)? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str::<Vec<SavedScan>>(&raw) {
            Ok(mut scans) => {
                scans.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
                Ok(scans)
            }
            Err(e) => {
                tracing::warn!("saved scans are corrupt, starting empty: {}", e);
                Ok(Vec::new())
            }
        }
    }

    /// スキャンを先頭に追加し、上限を超えた分を削除して保存
    ///
    /// 追加したスキャン自体は削除対象にしない
    pub fn save(&mut self, scan: SavedScan) -> Result<()> {
        let mut updated = Vec::with_capacity(self.scans.len() + 1);
        updated.push(scan);
        updated.extend(self.scans.iter().cloned());

        while updated.len() > MAX_SAVED_SCANS {
            let Some(index) = eviction_index(&updated[1..]) else {
                break;
            };
            let evicted = updated.remove(index + 1);
            tracing::info!(id = %evicted.id, pinned = evicted.pinned, "evicted saved scan");
        }

        self.commit(updated)
    }

    /// 削除。該当IDが無ければ何もしない（false）
    pub fn delete(&mut self, id: &str) -> Result<bool> {
        let updated: Vec<SavedScan> = self
            .scans
            .iter()
            .filter(|scan| scan.id != id)
            .cloned()
            .collect();
        let found = updated.len() != self.scans.len();
        self.commit(updated)?;
        Ok(found)
    }

    /// レストラン名の変更（前後の空白は除去、空文字はクリア扱い）
    pub fn rename(&mut self, id: &str, name: &str) -> Result<bool> {
        let name = name.trim().to_string();
        let mut found = false;
        let updated = self
            .scans
            .iter()
            .cloned()
            .map(|mut scan| {
                if scan.id == id {
                    scan.restaurant_name = Some(name.clone());
                    found = true;
                }
                scan
            })
            .collect();
        self.commit(updated)?;
        Ok(found)
    }

    /// ピン留めの切り替え。変更後の状態を返す（該当なしは None）
    pub fn toggle_pin(&mut self, id: &str) -> Result<Option<bool>> {
        let mut new_state = None;
        let updated = self
            .scans
            .iter()
            .cloned()
            .map(|mut scan| {
                if scan.id == id {
                    scan.pinned = !scan.pinned;
                    new_state = Some(scan.pinned);
                }
                scan
            })
            .collect();
        self.commit(updated)?;
        Ok(new_state)
    }

    pub fn get(&self, id: &str) -> Option<&SavedScan> {
        self.scans.iter().find(|scan| scan.id == id)
    }

    pub fn scans(&self) -> &[SavedScan] {
        &self.scans
    }

    pub fn len(&self) -> usize {
        self.scans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scans.is_empty()
    }

    pub fn pinned_count(&self) -> usize {
        self.scans.iter().filter(|scan| scan.pinned).count()
    }

    /// 永続化に成功した場合のみキャッシュを更新
    fn commit(&mut self, updated: Vec<SavedScan>) -> Result<()> {
        let json = serde_json::to_string(&updated)
            .map_err(|e| NutriSnapError::Persistence(format!("serialize saved scans: {}", e)))?;

        if let Err(e) = self.kv.set(KEY_SAVED_SCANS, &json) {
            tracing::error!("failed to persist saved scans: {}", e);
            return Err(e);
        }

        self.scans = updated;
        Ok(())
    }
}

/// 削除対象: ピン留めされていない最古 → なければ全体の最古
fn eviction_index(scans: &[SavedScan]) -> Option<usize> {
    oldest_index(scans.iter().enumerate().filter(|(_, scan)| !scan.pinned))
        .or_else(|| oldest_index(scans.iter().enumerate()))
}

/// タイムスタンプ最古のインデックス（同時刻は並び順で先のもの）
fn oldest_index<'a>(scans: impl Iterator<Item = (usize, &'a SavedScan)>) -> Option<usize> {
    let mut oldest: Option<(usize, &'a SavedScan)> = None;
    for (index, scan) in scans {
        match oldest {
            Some((_, current)) if current.timestamp <= scan.timestamp => {}
            _ => oldest = Some((index, scan)),
        }
    }
    oldest.map(|(index, _)| index)
}
