// 基本的なデータ型とユーティリティ
pub mod common;

// テーブル供給元のインターフェース（trait）定義
pub mod traits;

// 入力テーブルのモデル
pub mod telemetry;
pub mod event;

// 便利な re-export
pub use common::*;
pub use traits::*;
pub use telemetry::{TelemetryRow, TelemetryTable};
pub use event::{
    EventRow, EventTable, EVENT_HIT, EVENT_MISS, EVENT_NEW_INTERCEPTOR, EVENT_NEW_THREAT,
};
