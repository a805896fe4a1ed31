//! アプリケーション状態
//!
//! ユーザー設定（変更のたびに即保存）と、解析・保存の一時状態を保持する。
//! 解析パイプラインとスキャンストアを呼び出すのは `run_analysis` と
//! `save_current_scan` のみ。

use crate::analyzer::{AnalysisStage, Analyzer, Artifact};
use crate::error::{NutriSnapError, Result};
use crate::storage::{
    KeyValueStore, KEY_ALLERGIES, KEY_API_KEY, KEY_DIETARY_PREFS, KEY_SAFETY_MODE,
    KEY_SELECTED_MEAL,
};
use crate::store::{new_scan_id, ScanStore};
use chrono::Utc;
use nutrisnap_common::{
    normalize_ids, AnalysisResult, PreferenceSnapshot, SavedScan, UserPreferences,
    DEFAULT_MEAL_TYPE,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// 直近のリクエスト状態
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestStatus {
    Idle,
    Analyzing,
    Error(String),
}

#[derive(Default)]
struct Session {
    artifact: Option<Artifact>,
    last_result: Option<AnalysisResult>,
    last_error: Option<String>,
}

/// 実行中フラグ。drop でフラグを下ろす（成功・失敗・future破棄のいずれでも）
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct Coordinator {
    kv: Arc<dyn KeyValueStore>,
    analyzer: Analyzer,
    prefs: Mutex<UserPreferences>,
    api_key_override: Option<String>,
    session: Mutex<Session>,
    store: Mutex<ScanStore>,
    analyzing: AtomicBool,
    saving: AtomicBool,
}

impl Coordinator {
    /// 保存領域から設定とスキャン一覧を読み込んで作成
    pub fn load(kv: Arc<dyn KeyValueStore>, analyzer: Analyzer) -> Self {
        let prefs = load_preferences(kv.as_ref());
        let store = ScanStore::load(kv.clone());
        tracing::debug!(
            allergies = prefs.allergies.len(),
            diet = prefs.dietary_prefs.len(),
            saved_scans = store.len(),
            "loaded state"
        );

        Self {
            kv,
            analyzer,
            prefs: Mutex::new(prefs),
            api_key_override: None,
            session: Mutex::new(Session::default()),
            store: Mutex::new(store),
            analyzing: AtomicBool::new(false),
            saving: AtomicBool::new(false),
        }
    }

    /// 保存済みAPIキーが空のときに使うキー（環境変数など）
    pub fn with_api_key_override(mut self, api_key: Option<String>) -> Self {
        self.api_key_override = api_key.filter(|key| !key.trim().is_empty());
        self
    }

    // --- ユーザー設定 ---

    pub fn preferences(&self) -> UserPreferences {
        self.lock_prefs().clone()
    }

    pub fn snapshot(&self) -> PreferenceSnapshot {
        self.lock_prefs().snapshot()
    }

    /// 解析に使うAPIキー（保存済みが優先）
    pub fn api_key(&self) -> Option<String> {
        let prefs = self.lock_prefs();
        if prefs.has_credential() {
            Some(prefs.api_key.trim().to_string())
        } else {
            self.api_key_override.clone()
        }
    }

    pub fn set_api_key(&self, api_key: &str) -> Result<()> {
        let api_key = api_key.trim().to_string();
        if api_key.is_empty() {
            self.kv.remove(KEY_API_KEY)?;
        } else {
            self.kv.set(KEY_API_KEY, &api_key)?;
        }
        self.lock_prefs().api_key = api_key;
        Ok(())
    }

    pub fn set_dietary_prefs(&self, ids: &[String]) -> Result<()> {
        let ids = normalize_ids(ids);
        self.kv.set(KEY_DIETARY_PREFS, &serde_json::to_string(&ids)?)?;
        self.lock_prefs().dietary_prefs = ids;
        Ok(())
    }

    pub fn set_allergies(&self, ids: &[String]) -> Result<()> {
        let ids = normalize_ids(ids);
        self.kv.set(KEY_ALLERGIES, &serde_json::to_string(&ids)?)?;
        self.lock_prefs().allergies = ids;
        Ok(())
    }

    /// アレルギーの追加/解除。変更後に選択されていれば true
    pub fn toggle_allergy(&self, id: &str) -> Result<bool> {
        let mut prefs = self.preferences();
        prefs.toggle_allergy(id);
        self.set_allergies(&prefs.allergies)?;
        Ok(prefs.allergies.iter().any(|x| x == id.trim()))
    }

    /// 食事制限の追加/解除。変更後に選択されていれば true
    pub fn toggle_diet(&self, id: &str) -> Result<bool> {
        let mut prefs = self.preferences();
        prefs.toggle_diet(id);
        self.set_dietary_prefs(&prefs.dietary_prefs)?;
        Ok(prefs.dietary_prefs.iter().any(|x| x == id.trim()))
    }

    pub fn set_safety_mode(&self, enabled: bool) -> Result<()> {
        self.kv.set(KEY_SAFETY_MODE, &serde_json::to_string(&enabled)?)?;
        self.lock_prefs().safety_mode = enabled;
        Ok(())
    }

    pub fn set_meal_type(&self, meal_type: &str) -> Result<()> {
        let meal_type = match meal_type.trim() {
            "" => DEFAULT_MEAL_TYPE.to_string(),
            other => other.to_string(),
        };
        self.kv.set(KEY_SELECTED_MEAL, &meal_type)?;
        self.lock_prefs().meal_type = meal_type;
        Ok(())
    }

    // --- 解析 ---

    /// 解析対象を選択（前回の解析結果は破棄）
    pub fn select_artifact(&self, artifact: Artifact) {
        let mut session = self.lock_session();
        tracing::debug!(file = %artifact.file_name, mime = %artifact.mime_type, "artifact selected");
        session.artifact = Some(artifact);
        session.last_result = None;
        session.last_error = None;
    }

    pub fn selected_artifact(&self) -> Option<Artifact> {
        self.lock_session().artifact.clone()
    }

    pub async fn run_analysis(&self) -> Result<AnalysisResult> {
        self.run_analysis_with_progress(&mut |_| {}).await
    }

    /// 選択中のファイルを解析
    ///
    /// ファイル未選択・APIキー未設定・解析中の場合は通信せずにエラーを返す。
    /// 失敗しても前回の解析結果は残す。
    pub async fn run_analysis_with_progress(
        &self,
        on_stage: &mut (dyn FnMut(AnalysisStage) + Send),
    ) -> Result<AnalysisResult> {
        let artifact = self
            .selected_artifact()
            .ok_or(NutriSnapError::NoArtifactSelected)?;
        let api_key = self.api_key().ok_or(NutriSnapError::MissingApiKey)?;
        let _in_flight =
            InFlight::acquire(&self.analyzing).ok_or(NutriSnapError::AnalysisInProgress)?;

        let prefs = self.snapshot();
        self.lock_session().last_error = None;

        let result = self
            .analyzer
            .analyze_with_progress(&artifact, &api_key, &prefs, on_stage)
            .await;

        let mut session = self.lock_session();
        match &result {
            Ok(analysis) => session.last_result = Some(analysis.clone()),
            Err(e) => session.last_error = Some(e.to_string()),
        }
        result
    }

    pub fn last_result(&self) -> Option<AnalysisResult> {
        self.lock_session().last_result.clone()
    }

    pub fn last_error(&self) -> Option<String> {
        self.lock_session().last_error.clone()
    }

    pub fn is_analyzing(&self) -> bool {
        self.analyzing.load(Ordering::Acquire)
    }

    pub fn is_saving(&self) -> bool {
        self.saving.load(Ordering::Acquire)
    }

    pub fn status(&self) -> RequestStatus {
        if self.is_analyzing() {
            return RequestStatus::Analyzing;
        }
        match self.last_error() {
            Some(message) => RequestStatus::Error(message),
            None => RequestStatus::Idle,
        }
    }

    // --- 保存スキャン ---

    /// 現在の解析結果を保存
    ///
    /// 保存に失敗しても解析結果はそのまま残る。
    /// 保存前の読み直しに失敗した場合は書き込まない。
    pub fn save_current_scan(&self, restaurant_name: Option<&str>) -> Result<SavedScan> {
        let (artifact, analysis) = {
            let session = self.lock_session();
            (session.artifact.clone(), session.last_result.clone())
        };
        let (artifact, analysis) = match (artifact, analysis) {
            (Some(artifact), Some(analysis)) => (artifact, analysis),
            _ => return Err(NutriSnapError::NoAnalysis),
        };
        let _in_flight = InFlight::acquire(&self.saving).ok_or(NutriSnapError::SaveInProgress)?;

        let scan = SavedScan {
            id: new_scan_id(),
            artifact_data: artifact.data_url(),
            analysis,
            restaurant_name: restaurant_name
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string),
            timestamp: Utc::now(),
            user_prefs: self.snapshot(),
            pinned: false,
        };

        let mut store = self.lock_store();
        store.try_reload()?;
        store.save(scan.clone())?;
        tracing::info!(id = %scan.id, total = store.len(), "scan saved");
        Ok(scan)
    }

    pub fn saved_scans(&self) -> Vec<SavedScan> {
        self.lock_store().scans().to_vec()
    }

    pub fn get_scan(&self, id: &str) -> Option<SavedScan> {
        self.lock_store().get(id).cloned()
    }

    pub fn reload_scans(&self) -> Vec<SavedScan> {
        self.lock_store().reload().to_vec()
    }

    pub fn delete_scan(&self, id: &str) -> Result<bool> {
        self.lock_store().delete(id)
    }

    pub fn rename_scan(&self, id: &str, name: &str) -> Result<bool> {
        self.lock_store().rename(id, name)
    }

    pub fn toggle_pin(&self, id: &str) -> Result<Option<bool>> {
        self.lock_store().toggle_pin(id)
    }

    fn lock_prefs(&self) -> MutexGuard<'_, UserPreferences> {
        self.prefs.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_store(&self) -> MutexGuard<'_, ScanStore> {
        self.store.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// 保存領域から設定を読み込む（欠損・破損した値は既定値）
fn load_preferences(kv: &dyn KeyValueStore) -> UserPreferences {
    let read = |key: &str| match kv.get(key) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(key, "failed to read preference: {}", e);
            None
        }
    };
    let read_list = |key: &str| -> Vec<String> {
        read(key)
            .and_then(|raw| serde_json::from_str::<Vec<String>>(&raw).ok())
            .map(normalize_ids)
            .unwrap_or_default()
    };

    UserPreferences {
        api_key: read(KEY_API_KEY).unwrap_or_default().trim().to_string(),
        dietary_prefs: read_list(KEY_DIETARY_PREFS),
        allergies: read_list(KEY_ALLERGIES),
        safety_mode: read(KEY_SAFETY_MODE)
            .and_then(|raw| serde_json::from_str::<bool>(&raw).ok())
            .unwrap_or(false),
        meal_type: read(KEY_SELECTED_MEAL)
            .map(|raw| raw.trim().to_string())
            .filter(|meal| !meal.is_empty())
            .unwrap_or_else(|| DEFAULT_MEAL_TYPE.to_string()),
    }
}
