//! エラー型定義

use thiserror::Error;

/// 共通エラー型
#[derive(Error, Debug)]
pub enum Error {
    /// 解析レスポンスが構造化データとして不正
    #[error("Format error: {0}")]
    Format(String),
}

/// Result型エイリアス
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_format() {
        let error = Error::Format("missing recommendations".to_string());
        assert_eq!(format!("{}", error), "Format error: missing recommendations");
    }
}
