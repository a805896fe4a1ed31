use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "nutrisnap")]
#[command(about = "Menu photo/PDF nutrition and allergen analysis", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// メニュー画像/PDFを解析
    Analyze {
        /// 画像（JPG/PNG/GIF/WebP）またはPDFのパス
        #[arg(required = true)]
        file: PathBuf,

        /// 食事タイプ（設定にも保存される）
        #[arg(short, long)]
        meal: Option<String>,

        /// 解析結果を保存
        #[arg(short, long)]
        save: bool,

        /// 保存時のレストラン名
        #[arg(short, long, requires = "save")]
        name: Option<String>,

        /// JSONで出力
        #[arg(long)]
        json: bool,
    },

    /// 食事制限・アレルギー・セーフティモードの設定
    Prefs {
        /// アレルギーの追加/解除（複数指定可）
        #[arg(short, long)]
        allergy: Vec<String>,

        /// 食事制限の追加/解除（複数指定可）
        #[arg(short, long)]
        diet: Vec<String>,

        /// アレルギーをすべて解除
        #[arg(long)]
        clear_allergies: bool,

        /// 食事制限をすべて解除
        #[arg(long)]
        clear_diet: bool,

        /// セーフティモード (on/off)
        #[arg(long)]
        safety_mode: Option<Toggle>,

        /// 既定の食事タイプ
        #[arg(short, long)]
        meal: Option<String>,

        /// 現在の設定を表示
        #[arg(long)]
        show: bool,
    },

    /// APIキーと設定ファイル
    Config {
        /// APIキーを保存
        #[arg(long, conflicts_with_all = ["prompt_api_key", "clear_api_key"])]
        set_api_key: Option<String>,

        /// APIキーを入力プロンプトから保存（非表示入力）
        #[arg(long, conflicts_with = "clear_api_key")]
        prompt_api_key: bool,

        /// APIキーを削除
        #[arg(long)]
        clear_api_key: bool,

        /// 現在の設定を表示
        #[arg(long)]
        show: bool,
    },

    /// 保存済みスキャン
    Scans {
        #[command(subcommand)]
        action: ScanAction,
    },
}

#[derive(Subcommand)]
pub enum ScanAction {
    /// 一覧（新しい順）
    List,

    /// 詳細表示
    Show {
        id: String,

        /// JSONで出力
        #[arg(long)]
        json: bool,
    },

    /// 削除
    Delete {
        id: String,

        /// 確認なしで削除
        #[arg(short, long)]
        yes: bool,
    },

    /// レストラン名を変更（空文字でクリア）
    Rename { id: String, name: String },

    /// ピン留めの切り替え
    Pin { id: String },
}

/// on/off スイッチ
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Toggle {
    On,
    Off,
}

impl Toggle {
    pub fn enabled(self) -> bool {
        self == Toggle::On
    }
}

impl std::str::FromStr for Toggle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "on" | "true" | "yes" | "1" => Ok(Toggle::On),
            "off" | "false" | "no" | "0" => Ok(Toggle::Off),
            _ => Err(format!("Unknown value: {}. Use on or off", s)),
        }
    }
}
