//! # Source モジュール
//!
//! テーブルの供給元（`TableSource` の実装）と、最新ログの探索を提供します。
//!
//! - `CsvFileSource`: 2つのCSVファイルからテーブルを読み込む
//! - `InMemorySource`: 固定のテーブルを返す（テスト用、読み込みごとに複製）
//! - `LatestRunResolver`: ログディレクトリから最新の実行結果を探す
//!
//! 必須カラムがない場合は `VizError::MissingColumn` で失敗し、
//! カラム名の推測は行いません。余分なカラムは無視します。

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use csv::{Reader, ReaderBuilder, StringRecord};
use tracing::{debug, info};

use crate::error::VizError;
use crate::models::{EventRow, EventTable, Position3D, TableSource, TelemetryRow, TelemetryTable};

const TELEMETRY_PREFIX: &str = "sim_telemetry_";
const EVENTS_PREFIX: &str = "sim_events_";

/// CSVヘッダーからカラム位置を引く
struct ColumnIndex<'a> {
    headers: &'a StringRecord,
    table: &'static str,
    origin: &'a str,
}

impl<'a> ColumnIndex<'a> {
    fn optional(&self, column: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == column)
    }

    fn required(&self, column: &'static str) -> Result<usize, VizError> {
        self.optional(column).ok_or_else(|| VizError::MissingColumn {
            table: self.table,
            column,
            path: self.origin.to_string(),
        })
    }
}

/// 1レコード分のフィールドアクセス
struct Fields<'a> {
    record: &'a StringRecord,
    origin: &'a str,
}

impl<'a> Fields<'a> {
    fn text(&self, index: usize) -> &'a str {
        self.record.get(index).unwrap_or("")
    }

    /// 数値として解析。空セルはNone
    fn number(&self, index: usize, column: &'static str) -> Result<Option<f64>, VizError> {
        let value = self.text(index).trim();
        if value.is_empty() {
            return Ok(None);
        }
        value.parse::<f64>().map(Some).map_err(|_| VizError::InvalidValue {
            path: self.origin.to_string(),
            line: self.record.position().map(|p| p.line()).unwrap_or(0),
            column,
            value: value.to_string(),
        })
    }

    /// 座標値。空セルは欠損値（NaN）として扱い、描画範囲の計算から除外される
    fn coordinate(&self, index: usize, column: &'static str) -> Result<f64, VizError> {
        Ok(self.number(index, column)?.unwrap_or(f64::NAN))
    }
}

fn csv_error(origin: &str, source: csv::Error) -> VizError {
    VizError::Csv {
        path: origin.to_string(),
        source,
    }
}

fn open_csv(path: &Path) -> Result<Reader<File>, VizError> {
    if !path.exists() {
        return Err(VizError::FileNotFound(path.to_path_buf()));
    }
    ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|e| csv_error(&path.display().to_string(), e))
}

/// テレメトリCSVを読み込み
///
/// 必須カラム: AgentID, AgentType, AgentX, AgentY, AgentZ
pub fn read_telemetry<R: Read>(mut reader: Reader<R>, origin: &str) -> Result<TelemetryTable, VizError> {
    let headers = reader.headers().map_err(|e| csv_error(origin, e))?.clone();
    let columns = ColumnIndex {
        headers: &headers,
        table: "テレメトリ",
        origin,
    };
    let id = columns.required("AgentID")?;
    let agent_type = columns.required("AgentType")?;
    let x = columns.required("AgentX")?;
    let y = columns.required("AgentY")?;
    let z = columns.required("AgentZ")?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| csv_error(origin, e))?;
        let fields = Fields {
            record: &record,
            origin,
        };
        rows.push(TelemetryRow::new(
            fields.text(id),
            fields.text(agent_type),
            Position3D::new(
                fields.coordinate(x, "AgentX")?,
                fields.coordinate(y, "AgentY")?,
                fields.coordinate(z, "AgentZ")?,
            ),
        ));
    }

    Ok(TelemetryTable::new(rows))
}

/// イベントCSVを読み込み
///
/// 必須カラム: Event, PositionX, PositionY, PositionZ（Timeは任意）
pub fn read_events<R: Read>(mut reader: Reader<R>, origin: &str) -> Result<EventTable, VizError> {
    let headers = reader.headers().map_err(|e| csv_error(origin, e))?.clone();
    let columns = ColumnIndex {
        headers: &headers,
        table: "イベント",
        origin,
    };
    let event = columns.required("Event")?;
    let x = columns.required("PositionX")?;
    let y = columns.required("PositionY")?;
    let z = columns.required("PositionZ")?;
    let time = columns.optional("Time");

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| csv_error(origin, e))?;
        let fields = Fields {
            record: &record,
            origin,
        };
        let timestamp = match time {
            Some(index) => fields.number(index, "Time")?,
            None => None,
        };
        rows.push(EventRow::new(
            fields.text(event),
            Position3D::new(
                fields.coordinate(x, "PositionX")?,
                fields.coordinate(y, "PositionY")?,
                fields.coordinate(z, "PositionZ")?,
            ),
            timestamp,
        ));
    }

    Ok(EventTable::new(rows, time.is_some()))
}

/// 2つのCSVファイルを供給元とするテーブルソース
#[derive(Debug, Clone, PartialEq)]
pub struct CsvFileSource {
    pub telemetry_path: PathBuf,
    pub event_path: PathBuf,
}

impl CsvFileSource {
    pub fn new(telemetry_path: impl Into<PathBuf>, event_path: impl Into<PathBuf>) -> Self {
        Self {
            telemetry_path: telemetry_path.into(),
            event_path: event_path.into(),
        }
    }
}

impl TableSource for CsvFileSource {
    fn load_telemetry(&self) -> Result<TelemetryTable, VizError> {
        let origin = self.telemetry_path.display().to_string();
        let table = read_telemetry(open_csv(&self.telemetry_path)?, &origin)?;
        info!("テレメトリ読み込み完了: {} ({}行)", origin, table.len());
        Ok(table)
    }

    fn load_events(&self) -> Result<EventTable, VizError> {
        let origin = self.event_path.display().to_string();
        let table = read_events(open_csv(&self.event_path)?, &origin)?;
        info!(
            "イベント読み込み完了: {} ({}行, Time列: {})",
            origin,
            table.len(),
            if table.has_time { "あり" } else { "なし" }
        );
        Ok(table)
    }

    fn describe(&self) -> String {
        format!(
            "telemetry={}, events={}",
            self.telemetry_path.display(),
            self.event_path.display()
        )
    }
}

/// メモリ上の固定テーブルを返すテーブルソース
///
/// 読み込みのたびに複製を返すため、呼び出し側が元のテーブルを変更することはありません。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InMemorySource {
    pub telemetry: TelemetryTable,
    pub events: EventTable,
}

impl InMemorySource {
    pub fn new(telemetry: TelemetryTable, events: EventTable) -> Self {
        Self { telemetry, events }
    }
}

impl TableSource for InMemorySource {
    fn load_telemetry(&self) -> Result<TelemetryTable, VizError> {
        Ok(self.telemetry.clone())
    }

    fn load_events(&self) -> Result<EventTable, VizError> {
        Ok(self.events.clone())
    }

    fn describe(&self) -> String {
        format!(
            "in-memory (telemetry {}行, events {}行)",
            self.telemetry.len(),
            self.events.len()
        )
    }
}

/// プラットフォーム既定のログディレクトリ
///
/// - Windows: `%USERPROFILE%\AppData\LocalLow\BAMLAB\micromissiles\Telemetry\Logs`
/// - macOS: `~/Library/Application Support/BAMLAB/micromissiles/Telemetry/Logs`
///
/// その他のプラットフォームでは `VizError::UnsupportedPlatform` を返します。
pub fn default_logs_directory() -> Result<PathBuf, VizError> {
    let (home_var, relative): (&str, &[&str]) = if cfg!(target_os = "windows") {
        ("USERPROFILE", &["AppData", "LocalLow"])
    } else if cfg!(target_os = "macos") {
        ("HOME", &["Library", "Application Support"])
    } else {
        return Err(VizError::UnsupportedPlatform(std::env::consts::OS.to_string()));
    };

    let home = std::env::var_os(home_var).ok_or_else(|| {
        VizError::UnsupportedPlatform(format!("{} (環境変数 {} が未設定)", std::env::consts::OS, home_var))
    })?;

    let mut dir = PathBuf::from(home);
    for part in relative.iter().chain(["BAMLAB", "micromissiles", "Telemetry", "Logs"].iter()) {
        dir.push(part);
    }
    Ok(dir)
}

/// テレメトリファイル名（sim_telemetry_*.csv）かどうか
fn is_telemetry_file(path: &Path) -> bool {
    path.is_file()
        && path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(TELEMETRY_PREFIX) && n.ends_with(".csv"))
}

/// テレメトリファイルに対応するイベントファイルのパス
pub fn event_path_for(telemetry_path: &Path) -> Option<PathBuf> {
    let name = telemetry_path.file_name()?.to_str()?;
    if !name.starts_with(TELEMETRY_PREFIX) {
        return None;
    }
    Some(telemetry_path.with_file_name(name.replacen(TELEMETRY_PREFIX, EVENTS_PREFIX, 1)))
}

/// ディレクトリ内で条件に合う最新（更新時刻が最大）のエントリ
///
/// 更新時刻が同じ場合はパス名の大きい方を選びます。
fn newest_entry<F>(dir: &Path, filter: F) -> Result<Option<PathBuf>, VizError>
where
    F: Fn(&Path) -> bool,
{
    if !dir.exists() {
        return Err(VizError::FileNotFound(dir.to_path_buf()));
    }

    let mut newest: Option<(SystemTime, PathBuf)> = None;
    for entry in fs::read_dir(dir).map_err(|e| VizError::Io(dir.to_path_buf(), e))? {
        let entry = entry.map_err(|e| VizError::Io(dir.to_path_buf(), e))?;
        let path = entry.path();
        if !filter(&path) {
            continue;
        }
        let modified = entry
            .metadata()
            .and_then(|m| m.modified())
            .map_err(|e| VizError::Io(path.clone(), e))?;

        let candidate = (modified, path);
        if newest.as_ref().is_none_or(|current| candidate > *current) {
            newest = Some(candidate);
        }
    }

    Ok(newest.map(|(_, path)| path))
}

/// ログディレクトリから最新の実行結果を探す
///
/// ログディレクトリ直下の最新のサブディレクトリ（1回の実行）から、最新の
/// `sim_telemetry_*.csv` を選び、対応する `sim_events_*.csv` を組み合わせます。
#[derive(Debug, Clone)]
pub struct LatestRunResolver {
    pub logs_dir: PathBuf,
}

impl LatestRunResolver {
    pub fn new(logs_dir: impl Into<PathBuf>) -> Self {
        Self {
            logs_dir: logs_dir.into(),
        }
    }

    /// プラットフォーム既定のログディレクトリを使う
    pub fn from_platform_default() -> Result<Self, VizError> {
        Ok(Self::new(default_logs_directory()?))
    }

    pub fn resolve(&self) -> Result<CsvFileSource, VizError> {
        let run_dir = newest_entry(&self.logs_dir, |p| p.is_dir())?
            .ok_or_else(|| VizError::NoTelemetryFiles(self.logs_dir.clone()))?;
        debug!("最新の実行ディレクトリ: {}", run_dir.display());

        let telemetry_path = newest_entry(&run_dir, is_telemetry_file)?
            .ok_or_else(|| VizError::NoTelemetryFiles(run_dir.clone()))?;
        let event_path = event_path_for(&telemetry_path)
            .ok_or_else(|| VizError::NoTelemetryFiles(run_dir.clone()))?;

        if !event_path.exists() {
            return Err(VizError::FileNotFound(event_path));
        }

        info!("最新のテレメトリファイルを使用: {}", telemetry_path.display());
        Ok(CsvFileSource::new(telemetry_path, event_path))
    }
}
