//! # Summary モジュール
//!
//! 正規化済みイベントテーブルから集計値を計算し、テキストとして出力します。
//!
//! 出力順序:
//!
//! 1. イベント総数
//! 2. 種別ごとの件数（多い順、同数は初出順）
//! 3. 全イベントの時間幅（最小・最大時刻つき、小数2桁）
//! 4. HITの最初と最後の時刻（なければ「記録なし」と明示）
//! 5. MISSの最初と最後の時刻（同上）
//!
//! Time列がない場合、3〜5は「時刻データなし」の通知に置き換わります。
//! 集計は常に間引き前の全行に対して行います。

use std::fmt;

use crate::models::{group_by_key, EventRow, EventTable, EVENT_HIT, EVENT_MISS};

/// 時刻の範囲（秒）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeSpan {
    pub start: f64,
    pub end: f64,
}

impl TimeSpan {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// 時刻つきの行から範囲を計算。時刻が1件もなければNone
    fn from_rows<'a, I>(rows: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a EventRow>,
    {
        rows.into_iter()
            .filter_map(|row| row.time)
            .filter(|t| !t.is_nan())
            .fold(None, |span: Option<TimeSpan>, t| match span {
                None => Some(TimeSpan { start: t, end: t }),
                Some(s) => Some(TimeSpan {
                    start: s.start.min(t),
                    end: s.end.max(t),
                }),
            })
    }
}

/// 特定種別の発生時刻の集計結果
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KindTiming {
    /// 該当する行がない
    NoneRecorded,
    /// 行はあるが時刻つきの行がない
    Untimed(usize),
    /// 最初と最後の発生時刻
    Span(TimeSpan),
}

impl KindTiming {
    fn of_kind(events: &EventTable, kind: &str) -> Self {
        let rows: Vec<&EventRow> = events.rows.iter().filter(|r| r.event == kind).collect();
        if rows.is_empty() {
            return KindTiming::NoneRecorded;
        }
        match TimeSpan::from_rows(rows.iter().copied()) {
            Some(span) => KindTiming::Span(span),
            None => KindTiming::Untimed(rows.len()),
        }
    }
}

/// 時刻に関する集計（Time列がある場合のみ）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingSummary {
    /// 全イベントの時刻範囲（時刻つきの行がなければNone）
    pub overall: Option<TimeSpan>,
    pub hits: KindTiming,
    pub misses: KindTiming,
}

/// イベント集計結果
#[derive(Debug, Clone, PartialEq)]
pub struct EventSummary {
    /// イベント総数（行数）
    pub total: usize,
    /// 種別ごとの件数（多い順、同数は初出順）
    pub counts: Vec<(String, usize)>,
    /// Time列がない場合はNone
    pub timing: Option<TimingSummary>,
}

impl EventSummary {
    /// 指定種別の件数（出現しなければ0）
    pub fn count_of(&self, kind: &str) -> usize {
        self.counts
            .iter()
            .find(|(k, _)| k == kind)
            .map(|(_, c)| *c)
            .unwrap_or(0)
    }
}

/// 正規化済みイベントテーブルを集計
///
/// 種別が空文字の行は総数には数えますが、種別ごとの件数には含めません。
/// 空白だけの種別も正規化で空文字になるため、同じ扱いになります
/// （`  : n` のような空の見出し行は出力しません）。
pub fn summarize(events: &EventTable) -> EventSummary {
    let mut counts: Vec<(String, usize)> = group_by_key(&events.rows, |row| row.event.clone())
        .into_iter()
        .filter(|(kind, _)| !kind.is_empty())
        .map(|(kind, rows)| (kind, rows.len()))
        .collect();
    // 安定ソートなので同数の種別は初出順のまま
    counts.sort_by(|a, b| b.1.cmp(&a.1));

    let timing = events.has_time.then(|| TimingSummary {
        overall: TimeSpan::from_rows(&events.rows),
        hits: KindTiming::of_kind(events, EVENT_HIT),
        misses: KindTiming::of_kind(events, EVENT_MISS),
    });

    EventSummary {
        total: events.len(),
        counts,
        timing,
    }
}

fn write_kind_timing(
    f: &mut fmt::Formatter<'_>,
    timing: &KindTiming,
    singular: &str,
    plural: &str,
) -> fmt::Result {
    match timing {
        KindTiming::NoneRecorded => writeln!(f, "No {} recorded.", plural),
        KindTiming::Untimed(_) => {
            let mut heading = plural.to_string();
            if let Some(first) = heading.get_mut(0..1) {
                first.make_ascii_uppercase();
            }
            writeln!(f, "{} recorded without timestamps.", heading)
        }
        KindTiming::Span(span) => writeln!(
            f,
            "First {} at {:.2} seconds, last {} at {:.2} seconds",
            singular, span.start, singular, span.end
        ),
    }
}

impl fmt::Display for EventSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total number of events: {}", self.total)?;

        writeln!(f)?;
        writeln!(f, "Event Counts:")?;
        for (kind, count) in &self.counts {
            writeln!(f, "  {}: {}", kind, count)?;
        }

        writeln!(f)?;
        match &self.timing {
            None => {
                writeln!(f, "Time data unavailable: 'Time' column not found in event data.")?;
            }
            Some(timing) => {
                match timing.overall {
                    Some(span) => writeln!(
                        f,
                        "Total duration of events: {:.2} seconds (from {:.2} to {:.2})",
                        span.duration(),
                        span.start,
                        span.end
                    )?,
                    None => writeln!(f, "Total duration of events: unavailable (no timestamped events)")?,
                }

                writeln!(f)?;
                write_kind_timing(f, &timing.hits, "hit", "hits")?;
                write_kind_timing(f, &timing.misses, "miss", "misses")?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Position3D;
    use crate::normalizer::normalize_events;

    fn event(kind: &str, time: Option<f64>) -> EventRow {
        EventRow::new(kind, Position3D::new(0.0, 0.0, 0.0), time)
    }

    #[test]
    fn test_untimed_events() {
        let raw = EventTable::new(
            vec![event(" hit", None), event("MISS ", None), event("Hit", None)],
            false,
        );
        let summary = summarize(&normalize_events(&raw));

        assert_eq!(summary.total, 3);
        assert_eq!(
            summary.counts,
            vec![("HIT".to_string(), 2), ("MISS".to_string(), 1)]
        );
        assert!(summary.timing.is_none());

        let text = summary.to_string();
        assert!(text.contains("Total number of events: 3"));
        assert!(text.contains("  HIT: 2"));
        assert!(text.contains("  MISS: 1"));
        assert!(text.contains("Time data unavailable"));
        assert!(!text.contains("Total duration"));
    }

    #[test]
    fn test_timed_hits_and_misses() {
        let events = EventTable::new(
            vec![
                event("HIT", Some(5.0)),
                event("MISS", Some(8.0)),
                event("HIT", Some(12.5)),
            ],
            true,
        );
        let summary = summarize(&events);

        let timing = summary.timing.unwrap();
        let overall = timing.overall.unwrap();
        assert_eq!(overall.duration(), 7.5);
        assert_eq!(timing.hits, KindTiming::Span(TimeSpan { start: 5.0, end: 12.5 }));
        assert_eq!(timing.misses, KindTiming::Span(TimeSpan { start: 8.0, end: 8.0 }));

        let text = summary.to_string();
        assert!(text.contains("Total duration of events: 7.50 seconds (from 5.00 to 12.50)"));
        assert!(text.contains("First hit at 5.00 seconds, last hit at 12.50 seconds"));
        assert!(text.contains("First miss at 8.00 seconds, last miss at 8.00 seconds"));
    }

    #[test]
    fn test_empty_table() {
        let summary = summarize(&EventTable::new(Vec::new(), true));
        assert_eq!(summary.total, 0);
        assert!(summary.counts.is_empty());

        let text = summary.to_string();
        assert!(text.contains("Total number of events: 0"));
        assert!(text.contains("No hits recorded."));
        assert!(text.contains("No misses recorded."));
        assert!(text.contains("unavailable (no timestamped events)"));
    }

    #[test]
    fn test_empty_table_without_time_column() {
        let summary = summarize(&EventTable::default());
        assert_eq!(summary.total, 0);
        assert!(summary.to_string().contains("Time data unavailable"));
    }

    #[test]
    fn test_ties_keep_first_seen_order() {
        let events = EventTable::new(
            vec![
                event("NEW_THREAT", None),
                event("MISS", None),
                event("HIT", None),
                event("HIT", None),
                event("MISS", None),
                event("NEW_THREAT", None),
                event("NEW_INTERCEPTOR", None),
                event("NEW_INTERCEPTOR", None),
                event("NEW_INTERCEPTOR", None),
            ],
            false,
        );
        let kinds: Vec<String> = summarize(&events).counts.into_iter().map(|(k, _)| k).collect();
        assert_eq!(kinds, vec!["NEW_INTERCEPTOR", "NEW_THREAT", "MISS", "HIT"]);
    }

    #[test]
    fn test_total_matches_row_count() {
        for n in 0..20 {
            let rows = (0..n).map(|i| event(if i % 3 == 0 { "HIT" } else { "" }, None)).collect();
            let events = EventTable::new(rows, false);
            let summary = summarize(&events);
            assert_eq!(summary.total, events.len());
            // 空の種別は件数一覧に出ない
            assert!(summary.counts.iter().all(|(k, _)| !k.is_empty()));
        }
    }

    #[test]
    fn test_whitespace_only_kind_is_counted_in_total_only() {
        let raw = EventTable::new(vec![event("   ", None), event(" hit", None), event("HIT", None)], false);
        let summary = summarize(&crate::normalizer::normalize_events(&raw));
        assert_eq!(summary.total, 3);
        assert_eq!(summary.counts, vec![("HIT".to_string(), 2)]);
        assert!(!summary.to_string().contains("  : "));
    }

    #[test]
    fn test_missing_timestamps_are_skipped() {
        let events = EventTable::new(
            vec![
                event("HIT", None),
                event("NEW_THREAT", Some(2.0)),
                event("MISS", Some(f64::NAN)),
                event("NEW_THREAT", Some(9.0)),
            ],
            true,
        );
        let summary = summarize(&events);
        let timing = summary.timing.unwrap();
        assert_eq!(timing.overall, Some(TimeSpan { start: 2.0, end: 9.0 }));
        assert_eq!(timing.hits, KindTiming::Untimed(1));
        assert_eq!(timing.misses, KindTiming::Untimed(1));

        let text = summary.to_string();
        assert!(text.contains("Hits recorded without timestamps."));
        assert!(text.contains("Misses recorded without timestamps."));
        assert_eq!(summary.count_of("NEW_THREAT"), 2);
        assert_eq!(summary.count_of("EXPLOSION"), 0);
    }
}
