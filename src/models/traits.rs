use crate::error::VizError;
use crate::models::{event::EventTable, telemetry::TelemetryTable};

/// テーブル供給元のインターフェース
///
/// パイプラインはこのtraitを通してのみテーブルを受け取り、
/// ファイルシステムには直接触れません。
pub trait TableSource {
    /// テレメトリテーブルの読み込み
    fn load_telemetry(&self) -> Result<TelemetryTable, VizError>;

    /// イベントテーブルの読み込み
    fn load_events(&self) -> Result<EventTable, VizError>;

    /// ログ表示用の説明
    fn describe(&self) -> String;
}
