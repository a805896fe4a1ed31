//! 解析対象ファイル（メニュー画像・PDF）

use crate::error::{NutriSnapError, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::path::Path;

/// アップロード可能な最大サイズ（10 MiB）
pub const MAX_ARTIFACT_BYTES: u64 = 10 * 1024 * 1024;

pub const MIME_PDF: &str = "application/pdf";

const IMAGE_MIME_TYPES: &[&str] = &["image/jpeg", "image/jpg", "image/png", "image/gif", "image/webp"];

/// 解析経路の種別
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Image,
    Pdf,
}

#[derive(Debug, Clone)]
pub struct Artifact {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl Artifact {
    /// ファイルから読み込み（MIMEは拡張子、なければ内容から判定）
    pub fn from_path(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(NutriSnapError::FileNotFound(path.display().to_string()));
        }

        let size = std::fs::metadata(path)?.len();
        check_size(size)?;

        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let mime_type = path
            .extension()
            .and_then(|ext| mime_from_extension(&ext.to_string_lossy()))
            .or_else(|| sniff_mime(&bytes))
            .ok_or_else(|| NutriSnapError::UnsupportedArtifact(file_name.clone()))?;

        Self::from_bytes(file_name, mime_type, bytes)
    }

    /// バイト列から作成（MIMEタイプとサイズを検証）
    pub fn from_bytes(
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Result<Self> {
        let artifact = Self {
            file_name: file_name.into(),
            mime_type: mime_type.into().to_ascii_lowercase(),
            bytes,
        };
        check_size(artifact.bytes.len() as u64)?;
        artifact.kind()?;
        Ok(artifact)
    }

    /// MIMEタイプから解析経路を決定
    pub fn kind(&self) -> Result<ArtifactKind> {
        if self.mime_type == MIME_PDF {
            Ok(ArtifactKind::Pdf)
        } else if IMAGE_MIME_TYPES.contains(&self.mime_type.as_str()) {
            Ok(ArtifactKind::Image)
        } else {
            Err(NutriSnapError::UnsupportedArtifact(self.mime_type.clone()))
        }
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// "data:<mime>;base64,..." 形式のData URL
    pub fn data_url(&self) -> String {
        let mime = if self.mime_type == "image/jpg" {
            "image/jpeg"
        } else {
            self.mime_type.as_str()
        };
        format!("data:{};base64,{}", mime, STANDARD.encode(&self.bytes))
    }
}

fn check_size(size: u64) -> Result<()> {
    if size > MAX_ARTIFACT_BYTES {
        return Err(NutriSnapError::ArtifactTooLarge {
            size,
            limit: MAX_ARTIFACT_BYTES,
        });
    }
    Ok(())
}

fn mime_from_extension(ext: &str) -> Option<&'static str> {
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "pdf" => Some(MIME_PDF),
        _ => None,
    }
}

/// 内容からMIMEタイプを推定
fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(b"%PDF-") {
        return Some(MIME_PDF);
    }
    match image::guess_format(bytes).ok()? {
        image::ImageFormat::Jpeg => Some("image/jpeg"),
        image::ImageFormat::Png => Some("image/png"),
        image::ImageFormat::Gif => Some("image/gif"),
        image::ImageFormat::WebP => Some("image/webp"),
        _ => None,
    }
}
