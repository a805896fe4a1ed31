//! メニュー解析パイプライン
//!
//! Extracting（PDFのみ）→ PromptBuilding → Dispatching → Validating → Done / Failed
//! 各呼び出しは独立しており、失敗時に途中結果は残さない。

pub mod artifact;
pub mod openai;
pub mod pdf;

pub use artifact::{Artifact, ArtifactKind, MAX_ARTIFACT_BYTES};
pub use openai::{Dispatch, OpenAiClient};
pub use pdf::{PdfTextExtractor, TextExtractor};

use crate::config::Config;
use crate::error::Result;
use nutrisnap_common::{
    build_analysis_prompt, build_pdf_prompt, parse_analysis_response, AnalysisResult,
    PreferenceSnapshot,
};
use std::fmt;
use std::sync::Arc;

/// 解析の進行段階
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisStage {
    Extracting,
    PromptBuilding,
    Dispatching,
    Validating,
    Done,
    Failed,
}

impl fmt::Display for AnalysisStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AnalysisStage::Extracting => "Extracting menu text",
            AnalysisStage::PromptBuilding => "Building prompt",
            AnalysisStage::Dispatching => "Waiting for analysis",
            AnalysisStage::Validating => "Validating response",
            AnalysisStage::Done => "Done",
            AnalysisStage::Failed => "Failed",
        };
        f.write_str(label)
    }
}

#[derive(Clone)]
pub struct Analyzer {
    client: OpenAiClient,
    extractor: Arc<dyn TextExtractor>,
}

impl Analyzer {
    pub fn new(client: OpenAiClient, extractor: Arc<dyn TextExtractor>) -> Self {
        Self { client, extractor }
    }

    /// 設定から作成（PDF抽出は pdf-extract）
    pub fn from_config(config: &Config) -> Self {
        Self::new(OpenAiClient::new(config), Arc::new(PdfTextExtractor))
    }

    pub async fn analyze(
        &self,
        artifact: &Artifact,
        api_key: &str,
        prefs: &PreferenceSnapshot,
    ) -> Result<AnalysisResult> {
        self.analyze_with_progress(artifact, api_key, prefs, &mut |_| {})
            .await
    }

    /// 段階ごとに `on_stage` を呼び出しながら解析
    pub async fn analyze_with_progress(
        &self,
        artifact: &Artifact,
        api_key: &str,
        prefs: &PreferenceSnapshot,
        on_stage: &mut (dyn FnMut(AnalysisStage) + Send),
    ) -> Result<AnalysisResult> {
        let result = self.run_stages(artifact, api_key, prefs, on_stage).await;
        match &result {
            Ok(analysis) => {
                tracing::info!(
                    recommendations = analysis.recommendations.len(),
                    flagged = analysis.flagged_items.len(),
                    "analysis complete"
                );
                on_stage(AnalysisStage::Done);
            }
            Err(e) => {
                tracing::warn!(file = %artifact.file_name, "analysis failed: {}", e);
                on_stage(AnalysisStage::Failed);
            }
        }
        result
    }

    async fn run_stages(
        &self,
        artifact: &Artifact,
        api_key: &str,
        prefs: &PreferenceSnapshot,
        on_stage: &mut (dyn FnMut(AnalysisStage) + Send),
    ) -> Result<AnalysisResult> {
        let kind = artifact.kind()?;
        tracing::debug!(file = %artifact.file_name, ?kind, bytes = artifact.size(), "start analysis");

        let menu_text = match kind {
            ArtifactKind::Pdf => {
                enter(on_stage, AnalysisStage::Extracting);
                Some(pdf::extract_menu_text(self.extractor.clone(), artifact.bytes.clone()).await?)
            }
            ArtifactKind::Image => None,
        };

        enter(on_stage, AnalysisStage::PromptBuilding);
        let prompt = build_analysis_prompt(
            &prefs.diet,
            &prefs.allergies,
            prefs.safety_mode,
            &prefs.meal_type,
        );
        let dispatch = match menu_text {
            Some(text) => Dispatch::Text(build_pdf_prompt(&prompt, &text)),
            None => Dispatch::Multimodal {
                prompt,
                data_url: artifact.data_url(),
            },
        };

        enter(on_stage, AnalysisStage::Dispatching);
        let completion = self.client.complete(api_key, &dispatch).await?;

        enter(on_stage, AnalysisStage::Validating);
        Ok(parse_analysis_response(&completion)?)
    }
}

fn enter(on_stage: &mut (dyn FnMut(AnalysisStage) + Send), stage: AnalysisStage) {
    tracing::debug!(%stage, "analysis stage");
    on_stage(stage);
}
