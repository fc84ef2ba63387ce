//! # Config モジュール
//!
//! 可視化の設定（間引き幅、エージェント種別ごとの色、イベントマーカー、
//! 視点、出力サイズ）をYAMLファイルから読み込みます。
//!
//! 色やマーカーの対応表は固定のグローバル表ではなく設定構造体として
//! レンダラーに渡されるため、新しいエージェント種別やイベント種別は
//! 設定の追加だけで扱えます。設定ファイルを指定しない場合は
//! `VisualizationConfig::default()` が従来の固定表を提供します。
//!
//! ```yaml
//! sampling:
//!   stride: 10
//! style:
//!   agent_styles:
//!     default_color: black
//!     classes:
//!       - { agent_type: T, color: red }
//!       - { agent_type: M, color: blue }
//!   event_markers:
//!     - { kind: HIT, shape: circle, color: green, label: Hit }
//!     - { kind: MISS, shape: cross, color: red, label: Miss }
//! output:
//!   width: 1400
//!   height: 1000
//! ```

use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{
    Rgb, EVENT_HIT, EVENT_MISS, EVENT_NEW_INTERCEPTOR, EVENT_NEW_THREAT,
};
use crate::normalizer::normalize_kind;
use crate::sampler::DEFAULT_STRIDE;

/// 間引き設定
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// 間引き幅k（各エージェントのk行ごとに1行を残す）
    pub stride: NonZeroUsize,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            stride: DEFAULT_STRIDE,
        }
    }
}

/// エージェント種別ごとの描画スタイル
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AgentStyle {
    pub agent_type: String,
    pub color: Rgb,
    /// 凡例ラベル（省略時は "Agent Type: <種別>"）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// エージェント種別 → 描画スタイルの対応表
///
/// 表にない種別は `default_color` で描画されます（エラーにはしません）。
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AgentStyleTable {
    pub default_color: Rgb,
    pub classes: Vec<AgentStyle>,
}

impl Default for AgentStyleTable {
    fn default() -> Self {
        Self {
            default_color: Rgb::BLACK,
            classes: vec![
                AgentStyle {
                    agent_type: "T".to_string(),
                    color: Rgb::RED,
                    label: None,
                },
                AgentStyle {
                    agent_type: "M".to_string(),
                    color: Rgb::BLUE,
                    label: None,
                },
            ],
        }
    }
}

impl AgentStyleTable {
    fn find(&self, agent_type: &str) -> Option<&AgentStyle> {
        self.classes.iter().find(|s| s.agent_type == agent_type)
    }

    /// 種別に対応する色（未登録ならデフォルト色）
    pub fn color_for(&self, agent_type: &str) -> Rgb {
        self.find(agent_type)
            .map(|s| s.color)
            .unwrap_or(self.default_color)
    }

    /// 種別に対応する凡例ラベル
    pub fn label_for(&self, agent_type: &str) -> String {
        self.find(agent_type)
            .and_then(|s| s.label.clone())
            .unwrap_or_else(|| format!("Agent Type: {}", agent_type))
    }
}

/// マーカー形状
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerShape {
    #[serde(alias = "o")]
    Circle,
    #[serde(alias = "x")]
    Cross,
    #[serde(alias = "^")]
    Triangle,
    #[serde(alias = "s")]
    Square,
}

/// イベント種別ごとのマーカー
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EventMarkerStyle {
    /// 正規化済みイベント種別（読み込み時に正規化されます）
    pub kind: String,
    pub shape: MarkerShape,
    pub color: Rgb,
    pub label: String,
}

/// イベント種別 → マーカーの対応表
///
/// 表にない種別のイベントは描画されません（エラーにはしません）。
/// 描画順はこの表の並び順です。
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct EventMarkerTable {
    pub markers: Vec<EventMarkerStyle>,
}

impl Default for EventMarkerTable {
    fn default() -> Self {
        let marker = |kind: &str, shape, color, label: &str| EventMarkerStyle {
            kind: kind.to_string(),
            shape,
            color,
            label: label.to_string(),
        };
        Self {
            markers: vec![
                marker(EVENT_HIT, MarkerShape::Circle, Rgb::GREEN, "Hit"),
                marker(EVENT_MISS, MarkerShape::Cross, Rgb::RED, "Miss"),
                marker(EVENT_NEW_THREAT, MarkerShape::Triangle, Rgb::ORANGE, "New Threat"),
                marker(EVENT_NEW_INTERCEPTOR, MarkerShape::Square, Rgb::BLUE, "New Interceptor"),
            ],
        }
    }
}

impl EventMarkerTable {
    /// 正規化済み種別に完全一致するマーカーを検索
    pub fn lookup(&self, kind: &str) -> Option<&EventMarkerStyle> {
        self.markers.iter().find(|m| m.kind == kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = &EventMarkerStyle> {
        self.markers.iter()
    }

    fn normalize_kinds(&mut self) {
        for marker in &mut self.markers {
            marker.kind = normalize_kind(&marker.kind);
        }
    }
}

/// 軌跡の線スタイル（多数の軌跡が重なっても読める控えめな表示）
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TrajectoryStyle {
    /// 線幅（ピクセル）
    pub line_width: u32,
    /// 不透明度 [0, 1]
    pub opacity: f64,
}

impl Default for TrajectoryStyle {
    fn default() -> Self {
        Self {
            line_width: 1,
            opacity: 0.5,
        }
    }
}

/// 視点（仰角・方位角、度）
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ViewAngle {
    pub elevation_deg: f64,
    pub azimuth_deg: f64,
}

impl Default for ViewAngle {
    fn default() -> Self {
        Self {
            elevation_deg: 20.0,
            azimuth_deg: 45.0,
        }
    }
}

/// 地面基準面のスタイル
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct GroundPlaneStyle {
    pub color: Rgb,
    pub opacity: f64,
}

impl Default for GroundPlaneStyle {
    fn default() -> Self {
        Self {
            color: Rgb::GREEN,
            opacity: 0.2,
        }
    }
}

/// シーン描画スタイル
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StyleConfig {
    pub title: String,
    pub agent_styles: AgentStyleTable,
    pub event_markers: EventMarkerTable,
    pub trajectory: TrajectoryStyle,
    /// マーカーの大きさ（ピクセル）
    pub marker_size: u32,
    pub view: ViewAngle,
    pub ground_plane: GroundPlaneStyle,
    /// 描画範囲の余白（各軸の幅に対する割合）
    pub axis_padding: f64,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            title: "Agents Trajectories and Events (X: Right, Z: Forward, Y: Up)".to_string(),
            agent_styles: AgentStyleTable::default(),
            event_markers: EventMarkerTable::default(),
            trajectory: TrajectoryStyle::default(),
            marker_size: 6,
            view: ViewAngle::default(),
            ground_plane: GroundPlaneStyle::default(),
            axis_padding: 0.05,
        }
    }
}

/// 出力画像設定
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            width: 1400,
            height: 1000,
        }
    }
}

/// 完全な可視化設定
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct VisualizationConfig {
    pub sampling: SamplingConfig,
    pub style: StyleConfig,
    pub output: OutputConfig,
}

impl VisualizationConfig {
    /// YAMLファイルから設定を読み込み
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        // ファイル存在チェック
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;

        Self::from_yaml_str(&contents).map_err(|e| match e {
            ConfigError::ParseError(_, err) => ConfigError::ParseError(path.display().to_string(), err),
            other => other,
        })
    }

    /// YAML文字列から設定を読み込み（正規化と検証を含む）
    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        let mut config: VisualizationConfig = serde_yaml::from_str(contents)
            .map_err(|e| ConfigError::ParseError("<inline>".to_string(), e))?;

        config.style.event_markers.normalize_kinds();
        config.validate()?;

        Ok(config)
    }

    /// 設定の基本的な検証
    pub fn validate(&self) -> Result<(), ConfigError> {
        let style = &self.style;

        if !(0.0..=1.0).contains(&style.trajectory.opacity) {
            return Err(ConfigError::ValidationError(format!(
                "trajectory.opacity must be within [0, 1]: {}",
                style.trajectory.opacity
            )));
        }
        if !(0.0..=1.0).contains(&style.ground_plane.opacity) {
            return Err(ConfigError::ValidationError(format!(
                "ground_plane.opacity must be within [0, 1]: {}",
                style.ground_plane.opacity
            )));
        }
        if style.trajectory.line_width == 0 {
            return Err(ConfigError::ValidationError("trajectory.line_width must be positive".to_string()));
        }
        if !(style.axis_padding.is_finite() && style.axis_padding >= 0.0) {
            return Err(ConfigError::ValidationError(format!(
                "axis_padding must be a non-negative number: {}",
                style.axis_padding
            )));
        }
        if !(-90.0..=90.0).contains(&style.view.elevation_deg) || !style.view.azimuth_deg.is_finite() {
            return Err(ConfigError::ValidationError("Invalid view angle".to_string()));
        }
        if self.output.width == 0 || self.output.height == 0 {
            return Err(ConfigError::ValidationError("output size must be positive".to_string()));
        }

        // 対応表の重複チェック
        for (i, marker) in style.event_markers.markers.iter().enumerate() {
            if marker.kind.is_empty() {
                return Err(ConfigError::ValidationError("event marker kind must not be empty".to_string()));
            }
            if style.event_markers.markers[..i].iter().any(|m| m.kind == marker.kind) {
                return Err(ConfigError::ValidationError(format!(
                    "Duplicate event marker kind: {}",
                    marker.kind
                )));
            }
        }
        for (i, class) in style.agent_styles.classes.iter().enumerate() {
            if style.agent_styles.classes[..i].iter().any(|c| c.agent_type == class.agent_type) {
                return Err(ConfigError::ValidationError(format!(
                    "Duplicate agent style: {}",
                    class.agent_type
                )));
            }
        }

        Ok(())
    }

    /// 設定の概要を表示
    pub fn print_summary(&self) {
        println!("=== 可視化設定 ===");
        println!("間引き幅: {}行ごと", self.sampling.stride);
        println!("出力サイズ: {}x{}", self.output.width, self.output.height);
        println!(
            "視点: 仰角 {:.1}度, 方位角 {:.1}度",
            self.style.view.elevation_deg, self.style.view.azimuth_deg
        );
        println!();

        println!("=== エージェント種別 ===");
        for class in &self.style.agent_styles.classes {
            println!(
                "  {}: {} ({})",
                class.agent_type,
                class.color,
                self.style.agent_styles.label_for(&class.agent_type)
            );
        }
        println!("  その他: {}", self.style.agent_styles.default_color);
        println!();

        println!("=== イベントマーカー ===");
        for marker in self.style.event_markers.iter() {
            println!("  {}: {:?} {} ({})", marker.kind, marker.shape, marker.color, marker.label);
        }
    }
}

/// 設定読み込みエラー
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("設定ファイルが見つかりません: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("ファイル読み込みエラー {}: {}", .0.display(), .1)]
    IoError(PathBuf, #[source] std::io::Error),

    #[error("YAML解析エラー {0}: {1}")]
    ParseError(String, #[source] serde_yaml::Error),

    #[error("設定検証エラー: {0}")]
    ValidationError(String),
}
