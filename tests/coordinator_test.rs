//! アプリケーション状態テスト
//!
//! ローカルでの拒否（通信なし）・設定の即時保存・実行中ガード・保存処理を検証

use httpmock::prelude::*;
use nutrisnap::analyzer::{Analyzer, Artifact};
use nutrisnap::config::Config;
use nutrisnap::coordinator::{Coordinator, RequestStatus};
use nutrisnap::error::NutriSnapError;
use nutrisnap::storage::{
    KeyValueStore, MemoryStore, KEY_ALLERGIES, KEY_API_KEY, KEY_DIETARY_PREFS, KEY_SAFETY_MODE,
    KEY_SAVED_SCANS, KEY_SELECTED_MEAL,
};
use nutrisnap::store::MAX_SAVED_SCANS;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const COMPLETIONS: &str = "/v1/chat/completions";
const VALID_ANALYSIS: &str = r#"{"recommendations":[{"dish":"Grilled Chicken","reason":"Lean protein","rank":9}],"flaggedItems":[{"dish":"Satay","warning":"Contains peanuts","allergens":["peanuts"],"reason":"Peanut sauce"}],"generalNotes":"Ask staff"}"#;

fn analyzer_for(server: &MockServer) -> Analyzer {
    Analyzer::from_config(&Config {
        api_base_url: server.url("/v1"),
        ..Config::default()
    })
}

fn coordinator(server: &MockServer, kv: Arc<MemoryStore>) -> Coordinator {
    Coordinator::load(kv, analyzer_for(server))
}

fn image() -> Artifact {
    Artifact::from_bytes("menu.jpg", "image/jpeg", b"fake jpeg".to_vec()).unwrap()
}

fn ok_body() -> serde_json::Value {
    json!({"choices": [{"message": {"role": "assistant", "content": VALID_ANALYSIS}}]})
}

/// ファイル未選択なら通信しない
#[tokio::test]
async fn test_run_without_artifact_is_rejected_locally() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST).path(COMPLETIONS);
        then.status(200).json_body(ok_body());
    });
    let kv = Arc::new(MemoryStore::new());
    let c = coordinator(&server, kv);
    c.set_api_key("sk-test").unwrap();

    let result = c.run_analysis().await;
    assert!(matches!(result, Err(NutriSnapError::NoArtifactSelected)));
    assert_eq!(mock.calls(), 0);
}

/// APIキー未設定なら通信しない
#[tokio::test]
async fn test_run_without_api_key_is_rejected_locally() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST).path(COMPLETIONS);
        then.status(200).json_body(ok_body());
    });
    let c = coordinator(&server, Arc::new(MemoryStore::new()));
    c.select_artifact(image());

    let result = c.run_analysis().await;
    assert!(matches!(result, Err(NutriSnapError::MissingApiKey)));
    assert_eq!(mock.calls(), 0);
    assert!(!c.is_analyzing());
}

/// 環境変数のキーは保存済みキーが空のときだけ使う
#[tokio::test]
async fn test_api_key_override() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path(COMPLETIONS)
            .header("authorization", "Bearer sk-from-env");
        then.status(200).json_body(ok_body());
    });
    let c = coordinator(&server, Arc::new(MemoryStore::new()))
        .with_api_key_override(Some("sk-from-env".into()));
    c.select_artifact(image());

    c.run_analysis().await.expect("解析失敗");
    assert_eq!(mock.calls(), 1);

    c.set_api_key("sk-stored").unwrap();
    assert_eq!(c.api_key().as_deref(), Some("sk-stored"));
}

/// 解析成功で結果を保持し、状態は Idle に戻る
#[tokio::test]
async fn test_run_analysis_success() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path(COMPLETIONS);
        then.status(200).json_body(ok_body());
    });
    let c = coordinator(&server, Arc::new(MemoryStore::new()));
    c.set_api_key("sk-test").unwrap();
    c.select_artifact(image());

    let result = c.run_analysis().await.expect("解析失敗");
    assert_eq!(result.recommendations[0].dish, "Grilled Chicken");
    assert!(result.mentions_allergen("peanuts"));
    assert_eq!(c.last_result(), Some(result));
    assert_eq!(c.status(), RequestStatus::Idle);
    assert!(!c.is_analyzing());
}

/// 失敗時はエラーを記録し、フラグは下りる
#[tokio::test]
async fn test_run_analysis_failure_resets_flag() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path(COMPLETIONS);
        then.status(401);
    });
    let c = coordinator(&server, Arc::new(MemoryStore::new()));
    c.set_api_key("sk-bad").unwrap();
    c.select_artifact(image());

    let result = c.run_analysis().await;
    assert!(matches!(result, Err(NutriSnapError::InvalidCredential)));
    assert!(!c.is_analyzing());
    assert!(c.last_result().is_none());
    assert!(matches!(c.status(), RequestStatus::Error(msg) if msg.contains("Invalid API key")));
}

/// 解析中の2回目の呼び出しは通信せずに拒否
#[tokio::test]
async fn test_concurrent_analysis_is_rejected() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST).path(COMPLETIONS);
        then.status(200)
            .delay(Duration::from_millis(300))
            .json_body(ok_body());
    });
    let c = coordinator(&server, Arc::new(MemoryStore::new()));
    c.set_api_key("sk-test").unwrap();
    c.select_artifact(image());

    let (first, second) = tokio::join!(c.run_analysis(), c.run_analysis());

    assert!(first.is_ok());
    assert!(matches!(second, Err(NutriSnapError::AnalysisInProgress)));
    assert_eq!(mock.calls(), 1);

    // 完了後は再実行できる
    assert!(c.run_analysis().await.is_ok());
    assert_eq!(mock.calls(), 2);
}

/// 実行中の future を破棄してもフラグは下りる
#[tokio::test]
async fn test_dropped_analysis_clears_flag() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path(COMPLETIONS);
        then.status(200)
            .delay(Duration::from_secs(5))
            .json_body(ok_body());
    });
    let c = coordinator(&server, Arc::new(MemoryStore::new()));
    c.set_api_key("sk-test").unwrap();
    c.select_artifact(image());

    let timed_out = tokio::time::timeout(Duration::from_millis(100), c.run_analysis()).await;
    assert!(timed_out.is_err());
    assert!(!c.is_analyzing());
    assert_eq!(c.status(), RequestStatus::Idle);
}

/// 設定は変更のたびに保存され、再読み込みで復元される
#[tokio::test]
async fn test_preferences_write_through() {
    let server = MockServer::start();
    let kv = Arc::new(MemoryStore::new());
    let c = coordinator(&server, kv.clone());

    c.set_api_key("  sk-test  ").unwrap();
    assert!(c.toggle_allergy("nuts").unwrap());
    assert!(c.toggle_allergy("dairy").unwrap());
    assert!(!c.toggle_allergy("nuts").unwrap());
    assert!(c.toggle_diet("vegan").unwrap());
    c.set_safety_mode(true).unwrap();
    c.set_meal_type("brunch").unwrap();

    assert_eq!(kv.get(KEY_API_KEY).unwrap().as_deref(), Some("sk-test"));
    assert_eq!(kv.get(KEY_ALLERGIES).unwrap().as_deref(), Some(r#"["dairy"]"#));
    assert_eq!(kv.get(KEY_DIETARY_PREFS).unwrap().as_deref(), Some(r#"["vegan"]"#));
    assert_eq!(kv.get(KEY_SAFETY_MODE).unwrap().as_deref(), Some("true"));
    assert_eq!(kv.get(KEY_SELECTED_MEAL).unwrap().as_deref(), Some("brunch"));

    let reloaded = coordinator(&server, kv.clone()).preferences();
    assert_eq!(reloaded, c.preferences());
    assert_eq!(reloaded.allergies, vec!["dairy"]);
    assert_eq!(reloaded.meal_type, "brunch");

    c.set_api_key("").unwrap();
    assert_eq!(kv.get(KEY_API_KEY).unwrap(), None);
    assert!(c.api_key().is_none());
}

/// 保存失敗した設定はメモリ上も変更しない
#[tokio::test]
async fn test_failed_preference_write_keeps_state() {
    let server = MockServer::start();
    let kv = Arc::new(MemoryStore::new());
    let c = coordinator(&server, kv.clone());

    kv.set_fail_writes(true);
    assert!(c.set_safety_mode(true).is_err());
    assert!(c.toggle_allergy("eggs").is_err());

    let prefs = c.preferences();
    assert!(!prefs.safety_mode);
    assert!(prefs.allergies.is_empty());
}

/// 解析結果がなければ保存しない
#[tokio::test]
async fn test_save_without_analysis_is_rejected() {
    let server = MockServer::start();
    let kv = Arc::new(MemoryStore::new());
    let c = coordinator(&server, kv.clone());
    c.select_artifact(image());

    let result = c.save_current_scan(Some("Cafe"));
    assert!(matches!(result, Err(NutriSnapError::NoAnalysis)));
    assert!(c.saved_scans().is_empty());
    assert!(kv.is_empty());
}

/// 保存内容（Data URL・レストラン名・設定スナップショット）
#[tokio::test]
async fn test_save_current_scan() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path(COMPLETIONS);
        then.status(200).json_body(ok_body());
    });
    let kv = Arc::new(MemoryStore::new());
    let c = coordinator(&server, kv.clone());
    c.set_api_key("sk-test").unwrap();
    c.set_allergies(&["peanuts".to_string()]).unwrap();
    c.set_safety_mode(true).unwrap();
    c.select_artifact(image());
    let analysis = c.run_analysis().await.expect("解析失敗");

    let scan = c.save_current_scan(Some("  Thai Garden  ")).expect("保存失敗");
    assert_eq!(scan.restaurant_name.as_deref(), Some("Thai Garden"));
    assert!(scan.artifact_data.starts_with("data:image/jpeg;base64,"));
    assert_eq!(scan.analysis, analysis);
    assert_eq!(scan.user_prefs.allergies, vec!["peanuts"]);
    assert!(scan.user_prefs.safety_mode);
    assert!(!scan.pinned);

    // 再読み込みしても同じ内容
    let reloaded = coordinator(&server, kv.clone());
    assert_eq!(reloaded.get_scan(&scan.id), Some(scan.clone()));

    // 空白のみの名前は未設定扱い
    let unnamed = c.save_current_scan(Some("   ")).unwrap();
    assert_eq!(unnamed.restaurant_name, None);
    assert_eq!(c.saved_scans().len(), 2);

    // 保存したスナップショットにAPIキーは含まれない
    let raw = kv.get("saved_scans").unwrap().unwrap();
    assert!(!raw.contains("sk-test"));
}

/// 保存に失敗しても解析結果は残る
#[tokio::test]
async fn test_failed_save_keeps_result() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path(COMPLETIONS);
        then.status(200).json_body(ok_body());
    });
    let kv = Arc::new(MemoryStore::new());
    let c = coordinator(&server, kv.clone());
    c.set_api_key("sk-test").unwrap();
    c.select_artifact(image());
    c.run_analysis().await.expect("解析失敗");

    kv.set_fail_writes(true);
    let result = c.save_current_scan(None);
    assert!(matches!(result, Err(NutriSnapError::Persistence(_))));
    assert!(c.last_result().is_some());
    assert!(c.saved_scans().is_empty());
    assert!(!c.is_saving());

    kv.set_fail_writes(false);
    assert!(c.save_current_scan(None).is_ok());
}

/// スキャン操作（名前変更・ピン留め・削除）
#[tokio::test]
async fn test_scan_management() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path(COMPLETIONS);
        then.status(200).json_body(ok_body());
    });
    let c = coordinator(&server, Arc::new(MemoryStore::new()));
    c.set_api_key("sk-test").unwrap();
    c.select_artifact(image());
    c.run_analysis().await.unwrap();
    let scan = c.save_current_scan(None).unwrap();

    assert!(c.rename_scan(&scan.id, "Noodle Bar").unwrap());
    assert_eq!(c.get_scan(&scan.id).unwrap().display_name(), "Noodle Bar");
    assert_eq!(c.toggle_pin(&scan.id).unwrap(), Some(true));
    assert!(!c.rename_scan("missing", "x").unwrap());
    assert!(c.delete_scan(&scan.id).unwrap());
    assert!(c.saved_scans().is_empty());
}

/// 保存前の読み直しに失敗したら書き込まず、既存のスキャンを残す
#[tokio::test]
async fn test_save_with_unreadable_slot_keeps_existing_scans() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path(COMPLETIONS);
        then.status(200).json_body(ok_body());
    });
    let kv = Arc::new(MemoryStore::new());
    let c = coordinator(&server, kv.clone());
    c.set_api_key("sk-test").unwrap();
    c.select_artifact(image());
    c.run_analysis().await.expect("解析失敗");

    let mut kept = Vec::new();
    for name in ["keep0", "keep1", "keep2"] {
        let scan = c.save_current_scan(Some(name)).expect("保存失敗");
        assert_eq!(c.toggle_pin(&scan.id).unwrap(), Some(true));
        kept.push(scan.id);
    }
    let before = kv.get(KEY_SAVED_SCANS).unwrap();

    kv.set_fail_reads(true);
    let result = c.save_current_scan(None);
    kv.set_fail_reads(false);

    assert!(matches!(result, Err(NutriSnapError::Persistence(_))));
    assert!(!c.is_saving());
    assert_eq!(kv.get(KEY_SAVED_SCANS).unwrap(), before);

    let reloaded = coordinator(&server, kv.clone());
    let ids: Vec<String> = reloaded.saved_scans().iter().map(|s| s.id.clone()).collect();
    assert_eq!(ids.len(), 3);
    for id in &kept {
        assert!(ids.contains(id));
    }
    assert_eq!(c.saved_scans().len(), 3);
}

/// すべてピン留めでも新しいスキャンは保存され、最古が削除される
#[tokio::test]
async fn test_save_onto_full_pinned_store_keeps_new_scan() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path(COMPLETIONS);
        then.status(200).json_body(ok_body());
    });
    let kv = Arc::new(MemoryStore::new());
    let c = coordinator(&server, kv.clone());
    c.set_api_key("sk-test").unwrap();
    c.select_artifact(image());
    c.run_analysis().await.expect("解析失敗");

    let mut pinned = Vec::new();
    for i in 0..MAX_SAVED_SCANS {
        let scan = c.save_current_scan(Some(&format!("Pinned {}", i))).expect("保存失敗");
        c.toggle_pin(&scan.id).unwrap();
        pinned.push(scan);
        std::thread::sleep(Duration::from_millis(2));
    }

    let incoming = c.save_current_scan(Some("Incoming")).expect("保存失敗");

    let scans = c.saved_scans();
    assert_eq!(scans.len(), MAX_SAVED_SCANS);
    assert_eq!(scans[0].id, incoming.id);
    assert!(c.get_scan(&pinned[0].id).is_none(), "oldest pinned scan should be evicted");
    assert!(c.get_scan(&pinned[1].id).is_some());
}
