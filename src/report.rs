//! 解析結果・保存スキャンのテキスト表示

use nutrisnap_common::{
    option_label, AnalysisResult, PreferenceSnapshot, SavedScan, UserPreferences, ALLERGY_OPTIONS,
    DIETARY_OPTIONS, DISCLAIMER, MEAL_OPTIONS,
};
use std::fmt::Write as _;

/// 解析結果を表示用テキストに整形
pub fn render_analysis(analysis: &AnalysisResult) -> String {
    let mut out = String::new();

    if analysis.recommendations.is_empty() {
        out.push_str("No recommendations.\n");
    } else {
        out.push_str("Recommended dishes\n");
        for rec in &analysis.recommendations {
            let _ = writeln!(out, "  [{}/10] {}", rec.rank, rec.dish);
            if !rec.reason.is_empty() {
                let _ = writeln!(out, "         {}", rec.reason);
            }
            if let Some(modification) = rec.modification.as_deref().filter(|m| !m.is_empty()) {
                let _ = writeln!(out, "         Ask for: {}", modification);
            }
            if let Some(nutrition) = rec.nutrition.as_ref().filter(|n| !n.is_empty()) {
                let facts: Vec<String> = nutrition
                    .iter()
                    .map(|(key, value)| format!("{} {}", key, value))
                    .collect();
                let _ = writeln!(out, "         {}", facts.join(" | "));
            }
        }
    }

    if !analysis.flagged_items.is_empty() {
        out.push_str("\nFlagged dishes\n");
        for item in &analysis.flagged_items {
            let _ = writeln!(out, "  ! {}: {}", item.dish, item.warning);
            if !item.allergens.is_empty() {
                let _ = writeln!(out, "    Allergens: {}", item.allergens.join(", "));
            }
            if !item.reason.is_empty() {
                let _ = writeln!(out, "    {}", item.reason);
            }
        }
    }

    if let Some(notes) = analysis.general_notes.as_deref().filter(|n| !n.is_empty()) {
        let _ = writeln!(out, "\nNotes: {}", notes);
    }

    let _ = write!(out, "\n{}\n", DISCLAIMER);
    out
}

/// 保存スキャン一覧の1行表示
pub fn render_scan_line(scan: &SavedScan) -> String {
    let pin = if scan.pinned { "*" } else { " " };
    format!(
        "{} {}  {}  {}  ({} recommendations, {} flagged)",
        pin,
        scan.id,
        scan.timestamp.format("%Y-%m-%d %H:%M"),
        scan.display_name(),
        scan.analysis.recommendations.len(),
        scan.analysis.flagged_items.len(),
    )
}

/// 保存スキャンの詳細表示
pub fn render_scan(scan: &SavedScan) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}{}", scan.display_name(), if scan.pinned { " (pinned)" } else { "" });
    let _ = writeln!(out, "Saved: {}", scan.timestamp.to_rfc3339());
    let _ = writeln!(out, "{}", render_snapshot(&scan.user_prefs));
    out.push('\n');
    out.push_str(&render_analysis(&scan.analysis));
    out
}

pub fn render_snapshot(prefs: &PreferenceSnapshot) -> String {
    format!(
        "Meal: {}  Diet: {}  Allergies: {}  Safety mode: {}",
        option_label(MEAL_OPTIONS, &prefs.meal_type),
        labels(DIETARY_OPTIONS, &prefs.diet),
        labels(ALLERGY_OPTIONS, &prefs.allergies),
        if prefs.safety_mode { "on" } else { "off" },
    )
}

/// 現在の設定（APIキーは伏せ字）
pub fn render_preferences(prefs: &UserPreferences) -> String {
    format!(
        "API key: {}\n{}",
        mask_api_key(&prefs.api_key),
        render_snapshot(&prefs.snapshot())
    )
}

/// APIキーの伏せ字表示（末尾4文字のみ）
pub fn mask_api_key(api_key: &str) -> String {
    let chars: Vec<char> = api_key.trim().chars().collect();
    if chars.is_empty() {
        return "(not set)".to_string();
    }
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{}", tail)
}

/// 一覧にないIDへの注意書き（既知なら None）。未知のIDもそのまま使う
pub fn unknown_option_notice(
    what: &str,
    id: &str,
    is_known: fn(&str) -> bool,
    options: &[nutrisnap_common::OptionEntry],
) -> Option<String> {
    if is_known(id) {
        return None;
    }
    let ids: Vec<&str> = options.iter().map(|o| o.id).collect();
    Some(format!(
        "Unknown {} \"{}\" will be used as-is (known: {})",
        what,
        id,
        ids.join(", ")
    ))
}

fn labels(options: &[nutrisnap_common::OptionEntry], ids: &[String]) -> String {
    if ids.is_empty() {
        return "none".to_string();
    }
    ids.iter()
        .map(|id| option_label(options, id))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use nutrisnap_common::{FlaggedItem, Recommendation};

    fn sample() -> AnalysisResult {
        AnalysisResult {
            recommendations: vec![Recommendation {
                dish: "Grilled Salmon".into(),
                reason: "High protein".into(),
                modification: Some("Dressing on the side".into()),
                nutrition: None,
                rank: 9,
            }],
            flagged_items: vec![FlaggedItem {
                dish: "Pad Thai".into(),
                warning: "Contains peanuts".into(),
                allergens: vec!["peanuts".into()],
                reason: "Peanut sauce".into(),
            }],
            general_notes: Some("Ask about fryer oil".into()),
        }
    }

    #[test]
    fn test_render_analysis() {
        let text = render_analysis(&sample());
        assert!(text.contains("[9/10] Grilled Salmon"));
        assert!(text.contains("Ask for: Dressing on the side"));
        assert!(text.contains("! Pad Thai: Contains peanuts"));
        assert!(text.contains("Allergens: peanuts"));
        assert!(text.contains("Notes: Ask about fryer oil"));
        assert!(text.contains(DISCLAIMER));
    }

    #[test]
    fn test_render_empty_analysis() {
        let text = render_analysis(&AnalysisResult::default());
        assert!(text.starts_with("No recommendations."));
        assert!(!text.contains("Flagged dishes"));
    }

    #[test]
    fn test_render_snapshot_labels() {
        let prefs = PreferenceSnapshot {
            allergies: vec!["nuts".into(), "custom".into()],
            diet: vec![],
            safety_mode: true,
            meal_type: "lunch".into(),
        };
        let text = render_snapshot(&prefs);
        assert!(text.contains("Meal: Lunch"));
        assert!(text.contains("Diet: none"));
        assert!(text.contains("Allergies: Tree Nuts, custom"));
        assert!(text.contains("Safety mode: on"));
    }

    #[test]
    fn test_mask_api_key() {
        assert_eq!(mask_api_key(""), "(not set)");
        assert_eq!(mask_api_key("short"), "*****");
        assert_eq!(mask_api_key("sk-abcdefghijkl"), "****ijkl");
    }

    #[test]
    fn test_unknown_option_notice() {
        use nutrisnap_common::{is_known_allergy, is_known_meal_type};

        assert_eq!(unknown_option_notice("allergy", "nuts", is_known_allergy, ALLERGY_OPTIONS), None);
        let notice = unknown_option_notice("allergy", "kiwi", is_known_allergy, ALLERGY_OPTIONS)
            .expect("未知のIDで注意書きなし");
        assert!(notice.contains("kiwi"));
        assert!(notice.contains("nuts"));
        assert!(notice.contains("as-is"));

        assert!(unknown_option_notice("meal type", "supper", is_known_meal_type, MEAL_OPTIONS).is_some());
    }
}
