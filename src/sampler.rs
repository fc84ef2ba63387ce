//! 軌跡の間引き
//!
//! テレメトリ行をAgentIDごとにグループ化し、各エージェントの行列から
//! 固定幅kごとに1行（位置 0, k, 2k, …）を残します。描画専用の
//! 決定的な間引きであり、集計（summary）には使いません。

use std::num::NonZeroUsize;

use tracing::debug;

use crate::models::{group_by_key, TelemetryRow, TelemetryTable};

/// 既定の間引き幅
pub const DEFAULT_STRIDE: NonZeroUsize = match NonZeroUsize::new(10) {
    Some(stride) => stride,
    None => panic!("stride must be non-zero"),
};

/// 1エージェント分の間引き済み軌跡
#[derive(Debug, Clone, PartialEq)]
pub struct SampledTrajectory {
    pub agent_id: String,
    /// エージェント種別（そのエージェントの最初の行の値）
    pub agent_type: String,
    /// 間引き後の行（元の順序を保持）
    pub rows: Vec<TelemetryRow>,
}

/// テレメトリを間引いてエージェントごとの軌跡を作成
///
/// エージェントは初出順に並びます。各エージェントの出力行数は ⌈n/k⌉ で、
/// 行があるエージェントは必ず先頭行を含みます。行のないエージェントは
/// 出力に現れません。
pub fn sample_trajectories(table: &TelemetryTable, stride: NonZeroUsize) -> Vec<SampledTrajectory> {
    group_by_key(&table.rows, |row| row.agent_id.clone())
        .into_iter()
        .filter_map(|(agent_id, rows)| {
            let agent_type = rows.first()?.agent_type.clone();
            let sampled: Vec<TelemetryRow> = rows
                .iter()
                .step_by(stride.get())
                .map(|row| (*row).clone())
                .collect();

            debug!(
                "エージェント {} ({}): {}行 → {}行",
                agent_id,
                agent_type,
                rows.len(),
                sampled.len()
            );

            Some(SampledTrajectory {
                agent_id,
                agent_type,
                rows: sampled,
            })
        })
        .collect()
}

/// 間引き後の総行数
pub fn sampled_row_count(trajectories: &[SampledTrajectory]) -> usize {
    trajectories.iter().map(|t| t.rows.len()).sum()
}
