//! OpenAI互換チャット補完API連携
//!
//! PDF: プロンプト + 抽出テキストを1つの文字列として送信
//! 画像: テキスト + 画像Data URL の2要素配列として送信

use crate::config::Config;
use crate::error::{NutriSnapError, Result};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

/// 画像解析の詳細度
const IMAGE_DETAIL: &str = "high";

/// 送信内容（PDFはテキストのみ、画像はマルチモーダル）
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    Text(String),
    Multimodal { prompt: String, data_url: String },
}

impl Dispatch {
    fn to_content(&self) -> MessageContent {
        match self {
            Dispatch::Text(text) => MessageContent::Text(text.clone()),
            Dispatch::Multimodal { prompt, data_url } => MessageContent::Parts(vec![
                ContentPart::Text {
                    text: prompt.clone(),
                },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: data_url.clone(),
                        detail: IMAGE_DETAIL.to_string(),
                    },
                },
            ]),
        }
    }

    fn is_multimodal(&self) -> bool {
        matches!(self, Dispatch::Multimodal { .. })
    }
}

/// チャット補完リクエスト
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: MessageContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
    detail: String,
}

/// チャット補完レスポンス
#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAiClient {
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: config.completions_url(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }

    fn build_request(&self, dispatch: &Dispatch) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![Message {
                role: "user",
                content: dispatch.to_content(),
            }],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }

    /// 補完を実行し、最初の選択肢のテキストを返す
    ///
    /// リトライはしない（失敗時は呼び出し側で再実行する）
    pub async fn complete(&self, api_key: &str, dispatch: &Dispatch) -> Result<String> {
        let multimodal = dispatch.is_multimodal();
        let request = self.build_request(dispatch);

        let response = self
            .http
            .post(&self.url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        tracing::debug!(status = status.as_u16(), multimodal, "completion response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), "OpenAI API error: {}", body);
            return Err(status_error(status, multimodal));
        }

        let payload: ChatResponse = response
            .json()
            .await
            .map_err(|e| NutriSnapError::Format(format!("invalid response from OpenAI API: {}", e)))?;

        payload
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .map(|message| message.content.unwrap_or_default().trim().to_string())
            .ok_or_else(|| NutriSnapError::Format("invalid response from OpenAI API".into()))
    }
}

/// HTTPステータスをエラーに変換（413は画像送信時のみ専用エラー）
pub fn status_error(status: StatusCode, multimodal: bool) -> NutriSnapError {
    match status.as_u16() {
        401 => NutriSnapError::InvalidCredential,
        429 => NutriSnapError::RateLimited,
        413 if multimodal => NutriSnapError::PayloadTooLarge,
        code => NutriSnapError::Dispatch {
            status: code,
            status_text: status.canonical_reason().unwrap_or("").to_string(),
        },
    }
}
