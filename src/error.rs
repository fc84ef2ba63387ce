//! # Error モジュール
//!
//! 可視化パイプライン全体で使うエラー型です。
//!
//! 構造的な問題（ファイルや必須カラムの欠落）だけがエラーになります。
//! データ内容の欠落（HITが0件、Time列がない等）はエラーではなく、
//! 空集合として描画・報告されます。

use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum VizError {
    #[error("入力ファイルが見つかりません: {0}")]
    FileNotFound(PathBuf),

    #[error("必須カラム '{column}' が{table}テーブルにありません: {path}")]
    MissingColumn {
        table: &'static str,
        column: &'static str,
        path: String,
    },

    #[error("{path} の {line} 行目: カラム '{column}' の値 '{value}' を数値として解析できません")]
    InvalidValue {
        path: String,
        line: u64,
        column: &'static str,
        value: String,
    },

    #[error("CSV解析エラー {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("ファイル読み込みエラー {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("テレメトリファイル (sim_telemetry_*.csv) が見つかりません: {0}")]
    NoTelemetryFiles(PathBuf),

    #[error("未対応のプラットフォームです: {0} (--logs-dir またはファイルを直接指定してください)")]
    UnsupportedPlatform(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("描画エラー: {0}")]
    Render(String),
}
