//! # Pipeline モジュール
//!
//! テレメトリ可視化の中核となる処理パイプラインを提供します。
//!
//! 1回の実行で、テーブルの読み込みから集計・シーン構成までを
//! 単一スレッドで順番に実行します。並行処理や共有状態はなく、
//! 各実行は読み込んだテーブルの専用コピーに対して動作します。
//!
//! ## 処理順序
//!
//! 1. **テーブル読み込み**: `TableSource` からテレメトリとイベントを取得
//! 2. **イベント正規化**: イベント種別の大文字化・前後空白除去
//! 3. **集計**: 正規化済みイベントの全行から統計を計算
//! 4. **間引き**: エージェントごとの軌跡を固定幅で間引き
//! 5. **シーン構成**: 間引き済み軌跡と正規化済みイベントから3Dシーンを作成
//!
//! 構造的なエラー（ファイルやカラムの欠落）が起きた場合は途中の結果を
//! 返さずに失敗します。
//!
//! ## 使用例
//!
//! ```rust,no_run
//! use telemviz::config::VisualizationConfig;
//! use telemviz::pipeline::VisualizationPipeline;
//! use telemviz::source::CsvFileSource;
//!
//! let source = CsvFileSource::new("sim_telemetry_1.csv", "sim_events_1.csv");
//! let pipeline = VisualizationPipeline::new(VisualizationConfig::default(), 1);
//! let output = pipeline.run(&source)?;
//! println!("{}", output.summary);
//! # Ok::<(), telemviz::error::VizError>(())
//! ```

use tracing::{debug, info};

use crate::config::VisualizationConfig;
use crate::error::VizError;
use crate::models::{group_by_key, TableSource, TelemetryTable};
use crate::normalizer::normalize_events;
use crate::sampler::{sample_trajectories, sampled_row_count};
use crate::scene::{build_scene, Scene};
use crate::summary::{summarize, EventSummary};

/// 入力データの統計（ログ出力用）
#[derive(Debug, Clone, PartialEq)]
pub struct InputStats {
    pub telemetry_rows: usize,
    pub event_rows: usize,
    /// エージェント種別ごとのエージェント数（初出順）
    pub agents_by_type: Vec<(String, usize)>,
    pub sampled_rows: usize,
}

impl InputStats {
    pub fn agent_count(&self) -> usize {
        self.agents_by_type.iter().map(|(_, n)| n).sum()
    }
}

/// パイプラインの実行結果
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub summary: EventSummary,
    pub scene: Scene,
    pub stats: InputStats,
}

pub struct VisualizationPipeline {
    pub config: VisualizationConfig,
    pub verbose_level: u8,
}

impl VisualizationPipeline {
    pub fn new(config: VisualizationConfig, verbose_level: u8) -> Self {
        Self {
            config,
            verbose_level,
        }
    }

    /// パイプラインを実行
    pub fn run(&self, source: &dyn TableSource) -> Result<PipelineOutput, VizError> {
        info!("=== 可視化パイプライン開始: {} ===", source.describe());

        let telemetry = source.load_telemetry()?;
        let raw_events = source.load_events()?;

        let events = normalize_events(&raw_events);
        let summary = summarize(&events);

        let trajectories = sample_trajectories(&telemetry, self.config.sampling.stride);
        let scene = build_scene(&trajectories, &events, &self.config.style);

        let stats = InputStats {
            telemetry_rows: telemetry.len(),
            event_rows: events.len(),
            agents_by_type: agents_by_type(&telemetry),
            sampled_rows: sampled_row_count(&trajectories),
        };

        if self.verbose_level > 0 {
            info!("入力データ:");
            info!("  テレメトリ: {}行", stats.telemetry_rows);
            info!("  イベント: {}行", stats.event_rows);
            info!("  エージェント: {}機", stats.agent_count());
            for (agent_type, count) in &stats.agents_by_type {
                info!("    {}: {}機", agent_type, count);
            }
        }
        if self.verbose_level > 1 {
            debug!(
                "間引き: {}行 → {}行 (幅 {})",
                stats.telemetry_rows, stats.sampled_rows, self.config.sampling.stride
            );
            debug!(
                "シーン: 軌跡 {}本, マーカー {}個, 凡例 {}件",
                scene.trajectories.len(),
                scene.markers.len(),
                scene.legend.len()
            );
        }

        info!("=== 可視化パイプライン完了 ===");

        Ok(PipelineOutput {
            summary,
            scene,
            stats,
        })
    }
}

/// エージェント種別ごとのエージェント数（各エージェントの最初の行の種別で数える）
fn agents_by_type(telemetry: &TelemetryTable) -> Vec<(String, usize)> {
    let first_rows: Vec<_> = group_by_key(&telemetry.rows, |row| row.agent_id.clone())
        .into_iter()
        .filter_map(|(_, rows)| rows.first().copied())
        .collect();

    group_by_key(&first_rows, |row| row.agent_type.clone())
        .into_iter()
        .map(|(agent_type, agents)| (agent_type, agents.len()))
        .collect()
}
