//! イベント種別の正規化
//!
//! `"hit "`, `"Hit"`, `"HIT"` を同一の `"HIT"` に揃え、以降の照合を
//! 完全一致の文字列比較で行えるようにします。

use tracing::debug;

use crate::models::{group_by_key, EventTable};

/// イベント種別文字列を正規化（前後空白除去・大文字化）
pub fn normalize_kind(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// イベントテーブルを正規化した新しいテーブルを返す
///
/// 行数・行順・他カラムは変更しません。入力テーブルは変更されません。
/// 冪等であり、正規化済みテーブルに再適用しても結果は同じです。
pub fn normalize_events(events: &EventTable) -> EventTable {
    let rows = events
        .rows
        .iter()
        .map(|row| {
            let mut row = row.clone();
            row.event = normalize_kind(&row.event);
            row
        })
        .collect();

    let normalized = EventTable::new(rows, events.has_time);
    debug!("検出されたイベント種別: {:?}", unique_kinds(&normalized));
    normalized
}

/// 出現するイベント種別の一覧（初出順）
pub fn unique_kinds(events: &EventTable) -> Vec<String> {
    group_by_key(&events.rows, |row| row.event.clone())
        .into_iter()
        .map(|(kind, _)| kind)
        .collect()
}
