//! NutriSnap Common Library
//!
//! CLIと将来のフロントエンドで共有される型とユーティリティ

pub mod types;
pub mod error;
pub mod parser;
pub mod prompts;

pub use types::{
    AnalysisResult, FlaggedItem, OptionEntry, PreferenceSnapshot, Recommendation, SavedScan,
    UserPreferences, ALLERGY_OPTIONS, DEFAULT_MEAL_TYPE, DIETARY_OPTIONS, MEAL_OPTIONS,
    is_known_allergy, is_known_diet, is_known_meal_type, normalize_ids, option_label,
};
pub use error::{Error, Result};
pub use parser::{parse_analysis_response, strip_code_fence};
pub use prompts::{build_analysis_prompt, build_pdf_prompt, DISCLAIMER};
