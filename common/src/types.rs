//! 解析結果・保存スキャンの型定義
//!
//! CLIとストレージで共有される型:
//! - AnalysisResult: AIが返すメニュー解析結果
//! - PreferenceSnapshot: 保存時点のユーザー設定（APIキーは含めない）
//! - UserPreferences: 現在のユーザー設定
//! - SavedScan: 保存済みスキャン

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// 食事タイプの既定値
pub const DEFAULT_MEAL_TYPE: &str = "any";

/// 選択肢（ID と表示名）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionEntry {
    pub id: &'static str,
    pub label: &'static str,
}

const fn entry(id: &'static str, label: &'static str) -> OptionEntry {
    OptionEntry { id, label }
}

/// 食事タイプ
pub const MEAL_OPTIONS: &[OptionEntry] = &[
    entry("any", "Any Meal"),
    entry("breakfast", "Breakfast"),
    entry("brunch", "Brunch"),
    entry("lunch", "Lunch"),
    entry("dinner", "Dinner"),
    entry("snack", "Snack/Appetizer"),
    entry("dessert", "Dessert"),
];

/// 食事制限
pub const DIETARY_OPTIONS: &[OptionEntry] = &[
    entry("vegan", "Vegan"),
    entry("vegetarian", "Vegetarian"),
    entry("keto", "Keto"),
    entry("gluten-free", "Gluten-Free"),
    entry("dairy-free", "Dairy-Free"),
    entry("low-carb", "Low-Carb"),
    entry("low-sodium", "Low-Sodium"),
    entry("high-protein", "High-Protein"),
    entry("low-calorie", "Low-Calorie"),
];

/// アレルギー
pub const ALLERGY_OPTIONS: &[OptionEntry] = &[
    entry("pork", "Pork"),
    entry("beef", "Beef"),
    entry("nuts", "Tree Nuts"),
    entry("peanuts", "Peanuts"),
    entry("dairy", "Dairy/Milk"),
    entry("eggs", "Eggs"),
    entry("shellfish", "Shellfish"),
    entry("fish", "Fish"),
    entry("soy", "Soy"),
    entry("wheat", "Wheat/Gluten"),
    entry("sesame", "Sesame"),
];

pub fn is_known_meal_type(id: &str) -> bool {
    MEAL_OPTIONS.iter().any(|o| o.id == id)
}

pub fn is_known_diet(id: &str) -> bool {
    DIETARY_OPTIONS.iter().any(|o| o.id == id)
}

pub fn is_known_allergy(id: &str) -> bool {
    ALLERGY_OPTIONS.iter().any(|o| o.id == id)
}

/// IDから表示名を引く（未知のIDはそのまま返す）
pub fn option_label<'a>(options: &[OptionEntry], id: &'a str) -> &'a str {
    options
        .iter()
        .find(|o| o.id == id)
        .map(|o| o.label)
        .unwrap_or(id)
}

/// おすすめ料理
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    #[serde(default)]
    pub dish: String,

    #[serde(default)]
    pub reason: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modification: Option<String>,

    #[serde(
        default,
        deserialize_with = "deserialize_nutrition",
        skip_serializing_if = "Option::is_none"
    )]
    pub nutrition: Option<BTreeMap<String, String>>,

    /// 1〜10（10が最適）
    #[serde(default = "min_rank", deserialize_with = "deserialize_rank")]
    pub rank: u8,
}

/// 注意が必要な料理
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlaggedItem {
    #[serde(default)]
    pub dish: String,

    #[serde(default)]
    pub warning: String,

    #[serde(default)]
    pub allergens: Vec<String>,

    #[serde(default)]
    pub reason: String,
}

/// AIメニュー解析結果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub recommendations: Vec<Recommendation>,

    #[serde(default)]
    pub flagged_items: Vec<FlaggedItem>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub general_notes: Option<String>,
}

impl AnalysisResult {
    pub fn is_empty(&self) -> bool {
        self.recommendations.is_empty() && self.flagged_items.is_empty()
    }

    /// 最高ランクのおすすめ（同順位は先勝ち）
    pub fn top_recommendation(&self) -> Option<&Recommendation> {
        let mut best: Option<&Recommendation> = None;
        for rec in &self.recommendations {
            if best.map_or(true, |b| rec.rank > b.rank) {
                best = Some(rec);
            }
        }
        best
    }

    /// 指定アレルゲンを含む注意項目があるか
    pub fn mentions_allergen(&self, allergen: &str) -> bool {
        self.flagged_items.iter().any(|item| {
            item.allergens
                .iter()
                .any(|a| a.eq_ignore_ascii_case(allergen))
        })
    }
}

/// 保存時点のユーザー設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferenceSnapshot {
    #[serde(default)]
    pub allergies: Vec<String>,

    #[serde(default)]
    pub diet: Vec<String>,

    #[serde(default)]
    pub safety_mode: bool,

    #[serde(default = "default_meal_type")]
    pub meal_type: String,
}

impl Default for PreferenceSnapshot {
    fn default() -> Self {
        Self {
            allergies: Vec::new(),
            diet: Vec::new(),
            safety_mode: false,
            meal_type: default_meal_type(),
        }
    }
}

/// ユーザー設定
#[derive(Debug, Clone, PartialEq)]
pub struct UserPreferences {
    pub api_key: String,
    pub dietary_prefs: Vec<String>,
    pub allergies: Vec<String>,
    pub safety_mode: bool,
    pub meal_type: String,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            dietary_prefs: Vec::new(),
            allergies: Vec::new(),
            safety_mode: false,
            meal_type: default_meal_type(),
        }
    }
}

impl UserPreferences {
    pub fn has_credential(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    /// 解析・保存用のスナップショット（APIキーは除外）
    pub fn snapshot(&self) -> PreferenceSnapshot {
        PreferenceSnapshot {
            allergies: self.allergies.clone(),
            diet: self.dietary_prefs.clone(),
            safety_mode: self.safety_mode,
            meal_type: self.meal_type.clone(),
        }
    }

    /// アレルギーの追加/解除。変更があれば true
    pub fn toggle_allergy(&mut self, id: &str) -> bool {
        toggle_in(&mut self.allergies, id)
    }

    /// 食事制限の追加/解除。変更があれば true
    pub fn toggle_diet(&mut self, id: &str) -> bool {
        toggle_in(&mut self.dietary_prefs, id)
    }
}

/// 識別子リストを正規化（空要素除去・重複除去、初出順を維持）
pub fn normalize_ids<I, S>(ids: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for id in ids {
        let id = id.as_ref().trim();
        if id.is_empty() || out.iter().any(|x| x == id) {
            continue;
        }
        out.push(id.to_string());
    }
    out
}

fn toggle_in(list: &mut Vec<String>, id: &str) -> bool {
    let id = id.trim();
    if id.is_empty() {
        return false;
    }
    if let Some(pos) = list.iter().position(|x| x == id) {
        list.remove(pos);
    } else {
        list.push(id.to_string());
    }
    true
}

/// 保存済みスキャン
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedScan {
    pub id: String,

    /// 表示用のData URL（画像またはPDF）
    #[serde(rename = "imageData")]
    pub artifact_data: String,

    pub analysis: AnalysisResult,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restaurant_name: Option<String>,

    pub timestamp: DateTime<Utc>,

    #[serde(default)]
    pub user_prefs: PreferenceSnapshot,

    #[serde(rename = "isPinned", default)]
    pub pinned: bool,
}

impl SavedScan {
    /// 一覧表示用のタイトル
    pub fn display_name(&self) -> &str {
        match self.restaurant_name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => "Untitled scan",
        }
    }
}

fn default_meal_type() -> String {
    DEFAULT_MEAL_TYPE.to_string()
}

fn min_rank() -> u8 {
    1
}

/// 栄養情報: 数値・真偽値は文字列化、nullは除外、オブジェクト以外は無視
fn deserialize_nutrition<'de, D>(deserializer: D) -> Result<Option<BTreeMap<String, String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    let map = match raw {
        Some(Value::Object(map)) => map,
        _ => return Ok(None),
    };

    let nutrition = map
        .into_iter()
        .filter_map(|(key, value)| match value {
            Value::Null => None,
            Value::String(s) => Some((key, s)),
            other => Some((key, other.to_string())),
        })
        .collect();
    Ok(Some(nutrition))
}

/// ランク: 四捨五入して1〜10に丸める
fn deserialize_rank<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    let value = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(value
        .filter(|v| v.is_finite())
        .map(|v| v.round().clamp(1.0, 10.0) as u8)
        .unwrap_or_else(min_rank))
}
