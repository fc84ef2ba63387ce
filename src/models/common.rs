use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::ops::Range;

use serde::{Deserialize, Serialize};

/// 3次元位置を表す構造体（シミュレーション座標系）
///
/// Yが鉛直上向き、Xが左右、Zが前方です。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position3D {
    pub x: f64, // m (lateral)
    pub y: f64, // m (up)
    pub z: f64, // m (forward)
}

impl Position3D {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// 描画座標系へ変換
    ///
    /// 水平軸1 = X、水平軸2 = Z、鉛直軸 = Y の固定マッピングです。
    /// 軌跡とイベントマーカーは必ずこの変換を通します。
    pub fn to_plot(&self) -> PlotPoint {
        PlotPoint {
            horizontal: self.x,
            depth: self.z,
            vertical: self.y,
        }
    }
}

/// 描画座標系の点
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlotPoint {
    /// 水平軸1（AgentX / PositionX）
    pub horizontal: f64,
    /// 水平軸2（AgentZ / PositionZ）
    pub depth: f64,
    /// 鉛直軸（AgentY / PositionY）
    pub vertical: f64,
}

impl PlotPoint {
    /// plottersの3D座標 (x, y, z) に変換（plottersはyが上向き）
    pub fn as_chart_coord(&self) -> (f64, f64, f64) {
        (self.horizontal, self.vertical, self.depth)
    }

    /// 3軸とも有限値か（空欄の座標はNaNとして読み込まれる）
    pub fn is_finite(&self) -> bool {
        self.horizontal.is_finite() && self.depth.is_finite() && self.vertical.is_finite()
    }
}

/// 描画済み要素の外接範囲
#[derive(Debug, Clone, PartialEq)]
pub struct Bounds3D {
    pub horizontal: Range<f64>,
    pub depth: Range<f64>,
    pub vertical: Range<f64>,
}

impl Bounds3D {
    /// 点列から外接範囲を計算。非有限値は無視し、点がなければNone
    pub fn from_points<'a, I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a PlotPoint>,
    {
        let mut bounds: Option<Bounds3D> = None;
        for p in points {
            if !p.is_finite() {
                continue;
            }
            match bounds.as_mut() {
                None => {
                    bounds = Some(Bounds3D {
                        horizontal: p.horizontal..p.horizontal,
                        depth: p.depth..p.depth,
                        vertical: p.vertical..p.vertical,
                    });
                }
                Some(b) => {
                    extend(&mut b.horizontal, p.horizontal);
                    extend(&mut b.depth, p.depth);
                    extend(&mut b.vertical, p.vertical);
                }
            }
        }
        bounds
    }

    /// 各軸を `fraction` の割合だけ広げた範囲（幅ゼロの軸は±1m）
    pub fn padded(&self, fraction: f64) -> Self {
        Self {
            horizontal: pad(&self.horizontal, fraction),
            depth: pad(&self.depth, fraction),
            vertical: pad(&self.vertical, fraction),
        }
    }

    /// 鉛直範囲が0を含むように拡張（地面基準面を視野に入れるため）
    pub fn including_ground(mut self) -> Self {
        extend(&mut self.vertical, 0.0);
        self
    }

    /// 何も描画しない場合の単位範囲
    pub fn unit() -> Self {
        Self {
            horizontal: -1.0..1.0,
            depth: -1.0..1.0,
            vertical: -1.0..1.0,
        }
    }
}

fn extend(range: &mut Range<f64>, value: f64) {
    range.start = range.start.min(value);
    range.end = range.end.max(value);
}

fn pad(range: &Range<f64>, fraction: f64) -> Range<f64> {
    let width = range.end - range.start;
    if width <= f64::EPSILON {
        return (range.start - 1.0)..(range.end + 1.0);
    }
    let margin = width * fraction;
    (range.start - margin)..(range.end + margin)
}

/// RGB色
///
/// 設定ファイルでは色名（`red`など）または `#rrggbb` で記述します。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const BLACK: Rgb = Rgb(0, 0, 0);
    pub const RED: Rgb = Rgb(255, 0, 0);
    pub const BLUE: Rgb = Rgb(0, 0, 255);
    pub const GREEN: Rgb = Rgb(0, 128, 0);
    pub const ORANGE: Rgb = Rgb(255, 165, 0);

    /// 色名または16進表記を解析
    pub fn parse(s: &str) -> Result<Self, String> {
        let s = s.trim();
        if let Some(hex) = s.strip_prefix('#') {
            if hex.len() != 6 || !hex.is_ascii() {
                return Err(format!("無効な色指定: {}", s));
            }
            let channel = |i: usize| {
                u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| format!("無効な色指定: {}", s))
            };
            return Ok(Rgb(channel(0)?, channel(2)?, channel(4)?));
        }

        match s.to_lowercase().as_str() {
            "black" | "k" => Ok(Rgb::BLACK),
            "white" | "w" => Ok(Rgb(255, 255, 255)),
            "red" | "r" => Ok(Rgb::RED),
            "blue" | "b" => Ok(Rgb::BLUE),
            "green" | "g" => Ok(Rgb::GREEN),
            "orange" => Ok(Rgb::ORANGE),
            "gray" | "grey" => Ok(Rgb(128, 128, 128)),
            "purple" => Ok(Rgb(128, 0, 128)),
            "cyan" | "c" => Ok(Rgb(0, 255, 255)),
            "magenta" | "m" => Ok(Rgb(255, 0, 255)),
            "yellow" | "y" => Ok(Rgb(255, 255, 0)),
            "brown" => Ok(Rgb(165, 42, 42)),
            _ => Err(format!("無効な色指定: {}", s)),
        }
    }
}

impl TryFrom<String> for Rgb {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Rgb::parse(&value)
    }
}

impl From<Rgb> for String {
    fn from(value: Rgb) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

/// キーごとのグループ化（初出順）
///
/// キーの初出順に並んだ `(キー, 行の参照列)` を返します。
/// 各グループ内の行順は入力順のまま保持され、計算量は行数に線形です。
pub fn group_by_key<'a, T, K, F>(rows: &'a [T], key: F) -> Vec<(K, Vec<&'a T>)>
where
    K: Eq + Hash + Clone,
    F: Fn(&T) -> K,
{
    let mut index: HashMap<K, usize> = HashMap::new();
    let mut groups: Vec<(K, Vec<&'a T>)> = Vec::new();

    for row in rows {
        let k = key(row);
        match index.get(&k) {
            Some(&i) => groups[i].1.push(row),
            None => {
                index.insert(k.clone(), groups.len());
                groups.push((k, vec![row]));
            }
        }
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plot_axis_mapping() {
        let p = Position3D::new(1.0, 2.0, 3.0).to_plot();
        assert_eq!(p.horizontal, 1.0);
        assert_eq!(p.depth, 3.0);
        assert_eq!(p.vertical, 2.0);
        assert_eq!(p.as_chart_coord(), (1.0, 2.0, 3.0));
    }

    #[test]
    fn test_bounds_and_padding() {
        let points = vec![
            Position3D::new(0.0, 10.0, 0.0).to_plot(),
            Position3D::new(100.0, 20.0, 50.0).to_plot(),
            Position3D::new(f64::NAN, 0.0, 0.0).to_plot(),
        ];
        let b = Bounds3D::from_points(&points).unwrap();
        assert_eq!(b.horizontal, 0.0..100.0);
        assert_eq!(b.depth, 0.0..50.0);
        assert_eq!(b.vertical, 10.0..20.0);

        let padded = b.padded(0.1).including_ground();
        assert_eq!(padded.horizontal, -10.0..110.0);
        assert_eq!(padded.vertical.start, 0.0);
        assert_eq!(padded.vertical.end, 21.0);

        assert!(Bounds3D::from_points(&Vec::<PlotPoint>::new()).is_none());
    }

    #[test]
    fn test_degenerate_range_is_widened() {
        let points = vec![Position3D::new(5.0, 5.0, 5.0).to_plot()];
        let b = Bounds3D::from_points(&points).unwrap().padded(0.05);
        assert_eq!(b.horizontal, 4.0..6.0);
    }

    #[test]
    fn test_rgb_parse() {
        assert_eq!(Rgb::parse("red"), Ok(Rgb::RED));
        assert_eq!(Rgb::parse("Blue"), Ok(Rgb::BLUE));
        assert_eq!(Rgb::parse("#10ff00"), Ok(Rgb(16, 255, 0)));
        assert!(Rgb::parse("#12").is_err());
        assert!(Rgb::parse("chartreuse-ish").is_err());
        assert_eq!(Rgb(255, 165, 0).to_string(), "#ffa500");
    }

    #[test]
    fn test_group_by_key_first_seen_order() {
        let rows = vec![("b", 1), ("a", 2), ("b", 3), ("c", 4), ("a", 5)];
        let groups = group_by_key(&rows, |r| r.0);
        let keys: Vec<&str> = groups.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec!["b", "a", "c"]);
        let b_values: Vec<i32> = groups[0].1.iter().map(|r| r.1).collect();
        assert_eq!(b_values, vec![1, 3]);
    }
}
