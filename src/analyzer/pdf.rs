//! PDFテキスト抽出
//!
//! 抽出処理そのものは外部ライブラリ（pdf-extract）に任せ、
//! ここではページ結合と失敗時の扱いだけを決める。

use crate::error::{NutriSnapError, Result};
use std::sync::Arc;

/// PDFからページ単位のテキストを取り出す
pub trait TextExtractor: Send + Sync {
    fn extract_pages(&self, pdf: &[u8]) -> std::result::Result<Vec<String>, String>;
}

/// pdf-extract による実装
///
/// 文書全体を1ページ分のテキストとして返す（改ページは改行として残る）
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfTextExtractor;

impl TextExtractor for PdfTextExtractor {
    fn extract_pages(&self, pdf: &[u8]) -> std::result::Result<Vec<String>, String> {
        pdf_extract::extract_text_from_mem(pdf)
            .map(|text| vec![text])
            .map_err(|e| e.to_string())
    }
}

/// メニューテキストを抽出
///
/// ページ順に半角スペース1つで連結する。
/// 抽出失敗（パニック含む）または空文字なら ExtractionError。
pub async fn extract_menu_text(extractor: Arc<dyn TextExtractor>, pdf: Vec<u8>) -> Result<String> {
    // pdf-extract は不正なPDFでパニックすることがあるため blocking プールで実行
    let pages = tokio::task::spawn_blocking(move || extractor.extract_pages(&pdf))
        .await
        .map_err(|e| NutriSnapError::Extraction(format!("extractor aborted: {}", e)))?
        .map_err(NutriSnapError::Extraction)?;

    let text = join_pages(&pages);
    if text.is_empty() {
        return Err(NutriSnapError::Extraction(
            "the PDF contains no readable text".into(),
        ));
    }

    tracing::debug!(pages = pages.len(), chars = text.len(), "extracted PDF text");
    Ok(text)
}

fn join_pages(pages: &[String]) -> String {
    pages.join(" ").trim().to_string()
}
