//! テレメトリ可視化 (Telemetry Visualization)
//!
//! 迎撃シミュレーションのテレメトリ（エージェントごとの位置の時系列）と
//! イベントログ（撃墜・迎撃失敗・出現）を読み込み、3Dシーンの描画と
//! テキストの集計レポートを作成します。

pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod normalizer;
pub mod pipeline;
pub mod sampler;
pub mod scene;
pub mod source;
pub mod summary;
