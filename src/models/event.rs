use crate::models::common::Position3D;

/// 正規化済みイベント種別: 撃墜
pub const EVENT_HIT: &str = "HIT";
/// 正規化済みイベント種別: 迎撃失敗
pub const EVENT_MISS: &str = "MISS";
/// 正規化済みイベント種別: 脅威出現
pub const EVENT_NEW_THREAT: &str = "NEW_THREAT";
/// 正規化済みイベント種別: 迎撃機発射
pub const EVENT_NEW_INTERCEPTOR: &str = "NEW_INTERCEPTOR";

/// イベント行
///
/// 撃墜・迎撃失敗・出現などの離散的な出来事1件です。
#[derive(Debug, Clone, PartialEq)]
pub struct EventRow {
    /// イベント種別（Event）。正規化前は大文字小文字・前後空白が混在しうる
    pub event: String,
    /// 発生位置（PositionX, PositionY, PositionZ）
    pub position: Position3D,
    /// 発生時刻（Time、秒）。列がない、またはセルが空の場合はNone
    pub time: Option<f64>,
}

impl EventRow {
    pub fn new(event: impl Into<String>, position: Position3D, time: Option<f64>) -> Self {
        Self {
            event: event.into(),
            position,
            time,
        }
    }
}

/// イベントテーブル（読み取り専用スナップショット）
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventTable {
    pub rows: Vec<EventRow>,
    /// Time列が存在するかどうか
    pub has_time: bool,
}

impl EventTable {
    pub fn new(rows: Vec<EventRow>, has_time: bool) -> Self {
        Self { rows, has_time }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
