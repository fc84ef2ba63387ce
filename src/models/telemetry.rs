use crate::models::common::Position3D;

/// テレメトリ行
///
/// 1エージェントの1タイムステップ分の位置サンプルです。
/// 同一 `agent_id` の行は記録順（時系列順）に並んでいる前提で、再ソートはしません。
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryRow {
    /// エージェントの一意識別子（AgentID）
    pub agent_id: String,
    /// エージェント種別タグ（AgentType、"T" = 脅威、"M" = 迎撃機 など）
    pub agent_type: String,
    /// エージェント位置（AgentX, AgentY, AgentZ）
    pub position: Position3D,
}

impl TelemetryRow {
    pub fn new(agent_id: impl Into<String>, agent_type: impl Into<String>, position: Position3D) -> Self {
        Self {
            agent_id: agent_id.into(),
            agent_type: agent_type.into(),
            position,
        }
    }
}

/// テレメトリテーブル（読み取り専用スナップショット）
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetryTable {
    pub rows: Vec<TelemetryRow>,
}

impl TelemetryTable {
    pub fn new(rows: Vec<TelemetryRow>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
