use thiserror::Error;

#[derive(Error, Debug)]
pub enum NutriSnapError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("OpenAI API key required. Set it with `nutrisnap config --set-api-key YOUR_KEY` or OPENAI_API_KEY")]
    MissingApiKey,

    #[error("No menu uploaded. Select an image or PDF of a menu to analyze")]
    NoArtifactSelected,

    #[error("Nothing to save. Analyze a menu first before saving")]
    NoAnalysis,

    #[error("An analysis is already in progress")]
    AnalysisInProgress,

    #[error("A save is already in progress")]
    SaveInProgress,

    // --- Analysis pipeline ---
    #[error("Invalid API key. Please check your OpenAI API key and try again")]
    InvalidCredential,

    #[error("API rate limit exceeded. Please try again in a moment")]
    RateLimited,

    #[error("Image is too large. Please try a smaller image")]
    PayloadTooLarge,

    #[error("Analysis failed: {status} {status_text}")]
    Dispatch { status: u16, status_text: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Could not extract text from PDF: {0}")]
    Extraction(String),

    #[error("Menu analysis failed due to invalid JSON format: {0}")]
    Format(String),

    #[error("Unsupported file type: {0}. Use an image (JPG, PNG, GIF, WebP) or PDF")]
    UnsupportedArtifact(String),

    #[error("File too large: {size} bytes (limit {limit} bytes)")]
    ArtifactTooLarge { size: u64, limit: u64 },

    // --- Scan Store ---
    #[error("Storage error: {0}")]
    Persistence(String),

    #[error("Saved scan not found: {0}")]
    NotFound(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl NutriSnapError {
    /// 時間をおいて再実行すれば成功しうるエラーか
    pub fn is_retryable(&self) -> bool {
        match self {
            NutriSnapError::RateLimited | NutriSnapError::Http(_) => true,
            NutriSnapError::Dispatch { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<nutrisnap_common::Error> for NutriSnapError {
    fn from(err: nutrisnap_common::Error) -> Self {
        match err {
            // 解析結果のフォーマットエラーはパイプラインのエラーとして扱う
            nutrisnap_common::Error::Format(msg) => NutriSnapError::Format(msg),
        }
    }
}

pub type Result<T> = std::result::Result<T, NutriSnapError>;
