//! # Scene モジュール
//!
//! 間引き済み軌跡と正規化済みイベントから3Dシーンを構成し、描画します。
//!
//! シーンの構成（`build_scene`）と描画（`draw_scene`）は分離されています。
//! `Scene` はバックエンドに依存しない描画可能な成果物で、
//! plottersの任意のバックエンド（SVG、PNG）へ描画できます。
//!
//! ## レイアウト規則
//!
//! - 軸の対応は固定: 水平軸1 = X、水平軸2 = Z、鉛直軸 = Y
//! - 軌跡はエージェント種別の色で、細く半透明の折れ線として描画
//! - イベントはマーカー表にある種別だけを描画し、それ以外は黙って無視
//! - 地面基準面（鉛直 = 0）は描画済み要素の範囲から計算
//! - 凡例は同一ラベルを1件にまとめる

use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::ops::Range;
use std::path::Path;

use plotters::coord::Shift;
use plotters::prelude::*;
use tracing::debug;

use crate::config::{MarkerShape, StyleConfig, ViewAngle};
use crate::error::VizError;
use crate::models::{group_by_key, Bounds3D, EventRow, EventTable, PlotPoint, Rgb};
use crate::sampler::SampledTrajectory;

/// 1エージェント分の軌跡（描画座標系）
#[derive(Debug, Clone, PartialEq)]
pub struct TrajectoryLine {
    pub agent_id: String,
    pub agent_type: String,
    pub color: Rgb,
    pub label: String,
    pub points: Vec<PlotPoint>,
}

impl TrajectoryLine {
    /// 有限な点が連続する区間ごとに分割（非有限の点で線を切る）
    pub fn finite_runs(&self) -> Vec<&[PlotPoint]> {
        self.points
            .split(|p| !p.is_finite())
            .filter(|run| !run.is_empty())
            .collect()
    }
}

/// イベントマーカー1個
#[derive(Debug, Clone, PartialEq)]
pub struct EventMarker {
    pub kind: String,
    pub shape: MarkerShape,
    pub color: Rgb,
    pub label: String,
    pub position: PlotPoint,
}

/// 鉛直 = 0 の地面基準面
#[derive(Debug, Clone, PartialEq)]
pub struct GroundPlane {
    pub horizontal: Range<f64>,
    pub depth: Range<f64>,
    pub color: Rgb,
    pub opacity: f64,
}

/// 凡例の記号
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LegendGlyph {
    Line,
    Marker(MarkerShape),
}

#[derive(Debug, Clone, PartialEq)]
pub struct LegendEntry {
    pub label: String,
    pub color: Rgb,
    pub glyph: LegendGlyph,
}

/// 描画可能な3Dシーン
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub title: String,
    pub trajectories: Vec<TrajectoryLine>,
    pub markers: Vec<EventMarker>,
    /// 描画範囲（余白込み、鉛直範囲は0を含む）
    pub axes: Bounds3D,
    pub ground_plane: GroundPlane,
    /// 重複を除いた凡例
    pub legend: Vec<LegendEntry>,
    pub view: ViewAngle,
    pub line_width: u32,
    pub line_opacity: f64,
    pub marker_size: u32,
}

impl Scene {
    pub fn is_empty(&self) -> bool {
        self.trajectories.is_empty() && self.markers.is_empty()
    }
}

/// シーンを構成
///
/// 入力は読み取るだけで変更しません。どちらかの入力が空でもエラーにはならず、
/// 軌跡やマーカーのないシーンになります。
pub fn build_scene(trajectories: &[SampledTrajectory], events: &EventTable, style: &StyleConfig) -> Scene {
    let lines: Vec<TrajectoryLine> = trajectories
        .iter()
        .filter(|t| !t.rows.is_empty())
        .map(|t| TrajectoryLine {
            agent_id: t.agent_id.clone(),
            agent_type: t.agent_type.clone(),
            color: style.agent_styles.color_for(&t.agent_type),
            label: style.agent_styles.label_for(&t.agent_type),
            points: t.rows.iter().map(|row| row.position.to_plot()).collect(),
        })
        .collect();

    // マーカー表の並び順で描画する
    let by_kind: HashMap<String, Vec<&EventRow>> =
        group_by_key(&events.rows, |row| row.event.clone()).into_iter().collect();
    let mut markers = Vec::new();
    for marker_style in style.event_markers.iter() {
        let Some(rows) = by_kind.get(&marker_style.kind) else {
            continue;
        };
        markers.extend(
            rows.iter()
                .map(|row| row.position.to_plot())
                .filter(PlotPoint::is_finite)
                .map(|position| EventMarker {
                    kind: marker_style.kind.clone(),
                    shape: marker_style.shape,
                    color: marker_style.color,
                    label: marker_style.label.clone(),
                    position,
                }),
        );
    }
    let unmapped = events
        .rows
        .iter()
        .filter(|row| style.event_markers.lookup(&row.event).is_none())
        .count();
    debug!(
        "イベントマーカー: {}件描画, {}件は対応表にないため省略, {}件は座標が欠損",
        markers.len(),
        unmapped,
        events.len().saturating_sub(markers.len() + unmapped)
    );

    let drawn_points = lines
        .iter()
        .flat_map(|l| l.points.iter())
        .chain(markers.iter().map(|m| &m.position));
    let axes = match Bounds3D::from_points(drawn_points) {
        Some(bounds) => bounds.padded(style.axis_padding).including_ground(),
        None => Bounds3D::unit(),
    };

    let ground_plane = GroundPlane {
        horizontal: axes.horizontal.clone(),
        depth: axes.depth.clone(),
        color: style.ground_plane.color,
        opacity: style.ground_plane.opacity,
    };

    let legend = build_legend(&lines, &markers);

    Scene {
        title: style.title.clone(),
        trajectories: lines,
        markers,
        axes,
        ground_plane,
        legend,
        view: style.view,
        line_width: style.trajectory.line_width,
        line_opacity: style.trajectory.opacity,
        marker_size: style.marker_size,
    }
}

fn build_legend(lines: &[TrajectoryLine], markers: &[EventMarker]) -> Vec<LegendEntry> {
    let mut seen = HashSet::new();
    let mut legend = Vec::new();

    for line in lines {
        if seen.insert(line.label.clone()) {
            legend.push(LegendEntry {
                label: line.label.clone(),
                color: line.color,
                glyph: LegendGlyph::Line,
            });
        }
    }
    for marker in markers {
        if seen.insert(marker.label.clone()) {
            legend.push(LegendEntry {
                label: marker.label.clone(),
                color: marker.color,
                glyph: LegendGlyph::Marker(marker.shape),
            });
        }
    }

    legend
}

fn to_rgb(color: Rgb) -> RGBColor {
    RGBColor(color.0, color.1, color.2)
}

/// シーンを任意のplottersバックエンドへ描画
pub fn draw_scene<DB>(scene: &Scene, root: &DrawingArea<DB, Shift>) -> Result<(), Box<dyn Error>>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    root.fill(&WHITE)?;

    let axes = &scene.axes;
    let mut chart = ChartBuilder::on(root)
        .caption(&scene.title, ("sans-serif", 24))
        .margin(20)
        .build_cartesian_3d(axes.horizontal.clone(), axes.vertical.clone(), axes.depth.clone())?;

    let view = scene.view;
    chart.with_projection(|mut pb| {
        pb.pitch = view.elevation_deg.to_radians();
        pb.yaw = view.azimuth_deg.to_radians();
        pb.scale = 0.8;
        pb.into_matrix()
    });

    chart
        .configure_axes()
        .light_grid_style(BLACK.mix(0.15))
        .max_light_lines(3)
        .draw()?;

    // 地面基準面
    let plane = &scene.ground_plane;
    chart.draw_series(std::iter::once(Polygon::new(
        vec![
            (plane.horizontal.start, 0.0, plane.depth.start),
            (plane.horizontal.end, 0.0, plane.depth.start),
            (plane.horizontal.end, 0.0, plane.depth.end),
            (plane.horizontal.start, 0.0, plane.depth.end),
        ],
        to_rgb(plane.color).mix(plane.opacity).filled(),
    )))?;

    // 凡例は同一ラベルにつき最初の系列にだけ付ける
    let mut labeled: HashSet<&str> = HashSet::new();

    for line in &scene.trajectories {
        let color = to_rgb(line.color);
        let style = color.mix(scene.line_opacity).stroke_width(scene.line_width);
        for run in line.finite_runs() {
            let anno = chart.draw_series(LineSeries::new(
                run.iter().map(PlotPoint::as_chart_coord),
                style,
            ))?;
            if labeled.insert(line.label.as_str()) {
                anno.label(line.label.as_str())
                    .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
            }
        }
    }

    let size = scene.marker_size as i32;
    for (_, group) in group_by_key(&scene.markers, |m| m.kind.clone()) {
        let Some(first) = group.first() else {
            continue;
        };
        let color = to_rgb(first.color);
        let coords: Vec<(f64, f64, f64)> = group.iter().map(|m| m.position.as_chart_coord()).collect();

        let anno = match first.shape {
            MarkerShape::Circle => {
                chart.draw_series(coords.iter().map(|c| Circle::new(*c, size, color.filled())))?
            }
            MarkerShape::Cross => {
                chart.draw_series(coords.iter().map(|c| Cross::new(*c, size, color.stroke_width(2))))?
            }
            MarkerShape::Triangle => chart.draw_series(
                coords.iter().map(|c| TriangleMarker::new(*c, size, color.filled())),
            )?,
            MarkerShape::Square => chart.draw_series(coords.iter().map(|c| {
                EmptyElement::at(*c) + Rectangle::new([(-size, -size), (size, size)], color.filled())
            }))?,
        };

        if labeled.insert(first.label.as_str()) {
            anno.label(first.label.as_str());
            match first.shape {
                MarkerShape::Circle => {
                    anno.legend(move |(x, y)| Circle::new((x + 10, y), 5, color.filled()));
                }
                MarkerShape::Cross => {
                    anno.legend(move |(x, y)| Cross::new((x + 10, y), 5, color.stroke_width(2)));
                }
                MarkerShape::Triangle => {
                    anno.legend(move |(x, y)| TriangleMarker::new((x + 10, y), 5, color.filled()));
                }
                MarkerShape::Square => {
                    anno.legend(move |(x, y)| Rectangle::new([(x + 5, y - 5), (x + 15, y + 5)], color.filled()));
                }
            }
        }
    }

    if !labeled.is_empty() {
        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperLeft)
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()?;
    }

    root.present()?;
    Ok(())
}

/// シーンを画像ファイルに出力（拡張子 .png はPNG、それ以外はSVG）
pub fn render_to_file(scene: &Scene, path: &Path, size: (u32, u32)) -> Result<(), VizError> {
    let is_png = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("png"));

    let result = if is_png {
        let root = BitMapBackend::new(path, size).into_drawing_area();
        draw_scene(scene, &root)
    } else {
        let root = SVGBackend::new(path, size).into_drawing_area();
        draw_scene(scene, &root)
    };

    result.map_err(|e| VizError::Render(format!("{}: {}", path.display(), e)))
}

/// シーンをSVG文字列として出力
pub fn render_to_svg_string(scene: &Scene, size: (u32, u32)) -> Result<String, VizError> {
    let mut buffer = String::new();
    {
        let root = SVGBackend::with_string(&mut buffer, size).into_drawing_area();
        draw_scene(scene, &root).map_err(|e| VizError::Render(e.to_string()))?;
    }
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Position3D, TelemetryRow, EVENT_HIT};

    fn trajectory(id: &str, agent_type: &str, points: &[(f64, f64, f64)]) -> SampledTrajectory {
        SampledTrajectory {
            agent_id: id.to_string(),
            agent_type: agent_type.to_string(),
            rows: points
                .iter()
                .map(|(x, y, z)| TelemetryRow::new(id, agent_type, Position3D::new(*x, *y, *z)))
                .collect(),
        }
    }

    fn events(rows: &[(&str, (f64, f64, f64))]) -> EventTable {
        EventTable::new(
            rows.iter()
                .map(|(kind, (x, y, z))| EventRow::new(*kind, Position3D::new(*x, *y, *z), None))
                .collect(),
            false,
        )
    }

    #[test]
    fn test_axis_mapping_is_shared_by_lines_and_markers() {
        let trajectories = vec![trajectory("1", "T", &[(1.0, 2.0, 3.0)])];
        let events = events(&[(EVENT_HIT, (1.0, 2.0, 3.0))]);
        let scene = build_scene(&trajectories, &events, &StyleConfig::default());

        let line_point = scene.trajectories[0].points[0];
        let marker_point = scene.markers[0].position;
        assert_eq!(line_point, marker_point);
        assert_eq!(line_point.horizontal, 1.0);
        assert_eq!(line_point.depth, 3.0);
        assert_eq!(line_point.vertical, 2.0);
    }

    #[test]
    fn test_colors_and_fallback() {
        let trajectories = vec![
            trajectory("1", "T", &[(0.0, 0.0, 0.0)]),
            trajectory("2", "M", &[(0.0, 0.0, 0.0)]),
            trajectory("3", "DRONE", &[(0.0, 0.0, 0.0)]),
        ];
        let scene = build_scene(&trajectories, &EventTable::default(), &StyleConfig::default());
        let colors: Vec<Rgb> = scene.trajectories.iter().map(|t| t.color).collect();
        assert_eq!(colors, vec![Rgb::RED, Rgb::BLUE, Rgb::BLACK]);
    }

    #[test]
    fn test_unknown_event_kinds_are_skipped() {
        let events = events(&[
            ("EXPLOSION", (0.0, 0.0, 0.0)),
            ("HIT", (1.0, 1.0, 1.0)),
            ("hit", (2.0, 2.0, 2.0)),
            ("", (3.0, 3.0, 3.0)),
            ("NEW_INTERCEPTOR", (4.0, 4.0, 4.0)),
        ]);
        let scene = build_scene(&[], &events, &StyleConfig::default());

        let kinds: Vec<&str> = scene.markers.iter().map(|m| m.kind.as_str()).collect();
        assert_eq!(kinds, vec!["HIT", "NEW_INTERCEPTOR"]);
        assert_eq!(scene.markers[1].shape, MarkerShape::Square);
        assert_eq!(scene.markers[1].label, "New Interceptor");
    }

    #[test]
    fn test_markers_follow_table_order() {
        let events = events(&[
            ("NEW_THREAT", (0.0, 0.0, 0.0)),
            ("MISS", (1.0, 0.0, 0.0)),
            ("HIT", (2.0, 0.0, 0.0)),
            ("MISS", (3.0, 0.0, 0.0)),
        ]);
        let scene = build_scene(&[], &events, &StyleConfig::default());
        let kinds: Vec<&str> = scene.markers.iter().map(|m| m.kind.as_str()).collect();
        assert_eq!(kinds, vec!["HIT", "MISS", "MISS", "NEW_THREAT"]);
    }

    #[test]
    fn test_legend_is_deduplicated() {
        let trajectories = vec![
            trajectory("1", "T", &[(0.0, 0.0, 0.0)]),
            trajectory("2", "T", &[(1.0, 0.0, 0.0)]),
            trajectory("3", "M", &[(2.0, 0.0, 0.0)]),
            trajectory("4", "T", &[(3.0, 0.0, 0.0)]),
        ];
        let events = events(&[("HIT", (0.0, 0.0, 0.0)), ("HIT", (1.0, 0.0, 0.0))]);
        let scene = build_scene(&trajectories, &events, &StyleConfig::default());

        let labels: Vec<&str> = scene.legend.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["Agent Type: T", "Agent Type: M", "Hit"]);
        assert_eq!(scene.legend[2].glyph, LegendGlyph::Marker(MarkerShape::Circle));
    }

    #[test]
    fn test_ground_plane_spans_rendered_extent() {
        let trajectories = vec![trajectory("1", "T", &[(0.0, 100.0, 0.0), (100.0, 200.0, 50.0)])];
        let events = events(&[("MISS", (-100.0, 50.0, 150.0)), ("IGNORED", (9999.0, 0.0, 9999.0))]);
        let mut style = StyleConfig::default();
        style.axis_padding = 0.0;
        let scene = build_scene(&trajectories, &events, &style);

        assert_eq!(scene.axes.horizontal, -100.0..100.0);
        assert_eq!(scene.axes.depth, 0.0..150.0);
        // 鉛直範囲は地面（0）を含む
        assert_eq!(scene.axes.vertical, 0.0..200.0);
        assert_eq!(scene.ground_plane.horizontal, scene.axes.horizontal);
        assert_eq!(scene.ground_plane.depth, scene.axes.depth);
    }

    #[test]
    fn test_empty_inputs_give_empty_scene() {
        let scene = build_scene(&[], &EventTable::default(), &StyleConfig::default());
        assert!(scene.is_empty());
        assert!(scene.legend.is_empty());
        assert_eq!(scene.axes, Bounds3D::unit());
        assert_eq!(scene.ground_plane.horizontal, -1.0..1.0);
    }

    #[test]
    fn test_inputs_are_not_modified() {
        let trajectories = vec![trajectory("1", "T", &[(0.0, 1.0, 2.0)])];
        let events = events(&[("HIT", (0.0, 0.0, 0.0))]);
        let trajectories_before = trajectories.clone();
        let events_before = events.clone();

        let _ = build_scene(&trajectories, &events, &StyleConfig::default());
        assert_eq!(trajectories, trajectories_before);
        assert_eq!(events, events_before);
    }

    #[test]
    fn test_render_to_svg_string() {
        let trajectories = vec![
            trajectory("1", "T", &[(0.0, 100.0, 0.0), (10.0, 120.0, 50.0)]),
            trajectory("2", "M", &[(5.0, 0.0, 5.0)]),
        ];
        let events = events(&[
            ("HIT", (10.0, 120.0, 50.0)),
            ("MISS", (0.0, 10.0, 0.0)),
            ("NEW_THREAT", (0.0, 100.0, 0.0)),
            ("NEW_INTERCEPTOR", (5.0, 0.0, 5.0)),
        ]);
        let scene = build_scene(&trajectories, &events, &StyleConfig::default());
        let svg = render_to_svg_string(&scene, (800, 600)).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("Agents Trajectories and Events"));
    }

    #[test]
    fn test_missing_coordinates_split_lines_and_drop_markers() {
        let trajectories = vec![trajectory(
            "1",
            "T",
            &[(0.0, 0.0, 0.0), (f64::NAN, 1.0, 1.0), (2.0, 2.0, 2.0), (3.0, 3.0, 3.0)],
        )];
        let events = events(&[(EVENT_HIT, (f64::INFINITY, 0.0, 0.0)), (EVENT_HIT, (1.0, 1.0, 1.0))]);
        let scene = build_scene(&trajectories, &events, &StyleConfig::default());

        let runs = scene.trajectories[0].finite_runs();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].len(), 1);
        assert_eq!(runs[1].len(), 2);
        assert_eq!(scene.markers.len(), 1);
        assert_eq!(scene.markers[0].position.horizontal, 1.0);
        assert!(scene.axes.horizontal.start.is_finite());
    }

    /// `stroke` 属性が一致するpolylineごとの頂点数
    fn polyline_vertex_counts(svg: &str, stroke: &str) -> Vec<usize> {
        svg.split("<polyline")
            .skip(1)
            .map(|element| &element[..element.find("/>").unwrap_or(element.len())])
            .filter(|element| element.contains(stroke))
            .filter_map(|element| {
                let start = element.find("points=\"")? + "points=\"".len();
                let end = start + element[start..].find('"')?;
                Some(element[start..end].split_whitespace().count())
            })
            .collect()
    }

    #[test]
    fn test_render_breaks_line_at_missing_coordinate() {
        let trajectories = vec![trajectory(
            "1",
            "T",
            &[
                (0.0, 100.0, 0.0),
                (10.0, 110.0, 10.0),
                (20.0, 120.0, 20.0),
                (f64::NAN, 130.0, 30.0),
                (40.0, 140.0, 40.0),
                (50.0, 150.0, 50.0),
                (60.0, 160.0, 60.0),
            ],
        )];
        let mut style = StyleConfig::default();
        style.agent_styles.default_color = Rgb(255, 0, 0);
        let scene = build_scene(&trajectories, &EventTable::default(), &style);
        let svg = render_to_svg_string(&scene, (800, 600)).unwrap();

        assert!(!svg.contains("NaN"));
        let counts = polyline_vertex_counts(&svg, "stroke=\"#FF0000\"");
        // 3点ずつの2本に分かれる（凡例の線は2点）
        assert_eq!(counts.iter().filter(|n| **n == 3).count(), 2);
        assert!(counts.iter().all(|n| *n <= 3));
    }

    #[test]
    fn test_render_to_png_file() {
        let trajectories = vec![trajectory("1", "T", &[(0.0, 100.0, 0.0), (10.0, 120.0, 50.0)])];
        let events = events(&[(EVENT_HIT, (10.0, 120.0, 50.0))]);
        let scene = build_scene(&trajectories, &events, &StyleConfig::default());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene.png");
        render_to_file(&scene, &path, (640, 480)).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(&[0x89, b'P', b'N', b'G']));
    }

    #[test]
    fn test_view_and_line_style_come_from_config() {
        let scene = build_scene(&[], &EventTable::default(), &StyleConfig::default());
        assert_eq!(scene.view.elevation_deg, 20.0);
        assert_eq!(scene.view.azimuth_deg, 45.0);
        assert_eq!(scene.line_width, 1);
        assert_eq!(scene.line_opacity, 0.5);
    }
}
