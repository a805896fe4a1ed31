//! プロンプト生成モジュール
//!
//! 画像解析・PDFテキスト解析で共有されるプロンプト生成ロジック。
//! 入力が同じなら常にバイト単位で同じ文字列を返す（副作用なし）。

/// 未指定時の表示
const NONE_SPECIFIED: &str = "None specified";

/// 免責文（generalNotesに必ず含めさせる）
pub const DISCLAIMER: &str = "This analysis is for informational purposes only. Always verify ingredients with restaurant staff if you have severe allergies or medical conditions. We are not responsible for any adverse reactions.";

/// メニュー解析プロンプト生成
///
/// # Arguments
/// * `dietary_prefs` - 食事制限ID
/// * `allergies` - アレルギーID
/// * `safety_mode` - セーフティモード
/// * `meal_type` - 食事タイプ（"any", "lunch" など）
///
/// # Returns
/// 解析用のプロンプト文字列
pub fn build_analysis_prompt(
    dietary_prefs: &[String],
    allergies: &[String],
    safety_mode: bool,
    meal_type: &str,
) -> String {
    let has_allergens = !allergies.is_empty();

    let diet_list = join_or_none(dietary_prefs);
    let allergy_list = join_or_none(allergies);
    let safety_status = if safety_mode {
        "ENABLED - Extra cautious analysis"
    } else {
        "DISABLED"
    };

    let flagged_instructions = if has_allergens {
        format!(
            "
- Flag items containing: {allergy_list}
- Include cross-contamination warnings for shared preparation areas
- Mark items as \"AVOID\" if they contain user's allergens
"
        )
    } else {
        "
- Since no allergies were specified, focus on flagging extremely unhealthy items instead of allergen concerns
- Flag items that are excessively high in calories, sodium, sugar, or unhealthy fats
- Flag heavily processed foods, items with excessive additives, or anything that poses general health risks
- Items should only be flagged if they are genuinely problematic from a health perspective
"
        .to_string()
    };

    let warning_hint = if has_allergens {
        "Specific allergen or cross-contamination warning"
    } else {
        "Specific health concern (high sodium, excessive calories, etc.)"
    };

    let safety_section = if safety_mode {
        "\nSAFETY MODE ACTIVATED: Be extra cautious. When in doubt, err on the side of caution and recommend asking restaurant staff about ingredients and preparation methods.\n"
    } else {
        ""
    };

    let disclaimer = DISCLAIMER;

    format!(
        r#"You are NutriSnap, an AI nutritionist specializing in menu analysis for people with dietary restrictions. Analyze this {meal_type} menu and provide personalized recommendations.

User Profile:
- Meal Type: {meal_type}
- Dietary Preferences: {diet_list}
- Known Allergies: {allergy_list}
- Safety Mode: {safety_status}

For {meal_type}, prioritize main dishes and entrees. Only recommend side dishes if they can serve as a complete meal or if main options are very limited.

CRITICAL INSTRUCTIONS FOR FLAGGED ITEMS:
{flagged_instructions}

Your response must be a valid JSON object with this exact structure:
{{
  "recommendations": [
    {{
      "dish": "Exact dish name from menu",
      "reason": "Why this is a good choice for {meal_type} considering user's needs",
      "modification": "Optional suggestion to make it safer/healthier",
      "nutrition": {{
        "calories": "estimated range",
        "protein": "estimated amount",
        "fiber": "estimated amount",
        "key_nutrients": "main vitamins/minerals"
      }},
      "rank": number from 1-10 (10 being perfect match)
    }}
  ],
  "flaggedItems": [
    {{
      "dish": "Exact dish name",
      "warning": "{warning_hint}",
      "allergens": ["list of relevant allergens if any"],
      "reason": "Detailed explanation of why to avoid"
    }}
  ],
  "generalNotes": "Brief safety advice and dining tips"
}}

{safety_section}

DISCLAIMER: Add this note to generalNotes: "{disclaimer}"

Provide 3-7 recommendations ranked by safety and nutritional value for {meal_type}. Focus on dishes that align with the user's dietary needs and meal timing."#
    )
}

/// PDF用: 抽出したメニューテキストをプロンプト末尾に付加
pub fn build_pdf_prompt(prompt: &str, menu_text: &str) -> String {
    format!("{prompt}\n\nMenu Text:\n{menu_text}")
}

fn join_or_none(items: &[String]) -> String {
    if items.is_empty() {
        NONE_SPECIFIED.to_string()
    } else {
        items.join(", ")
    }
}
