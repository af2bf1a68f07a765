//! 单条映射的运行期状态

use crate::models::register_map::RegisterSyncMapping;

/// 一条寄存器映射的同步暂存区
///
/// 保存两侧上一次观测到的镜像：PLC侧按线路原始值存放，
/// Modbus侧按Modbus客户端呈现的字存放。只由所属同步器修改。
pub struct SyncArea {
    mapping: RegisterSyncMapping,
    last_plc: Vec<u16>,
    last_mb: Vec<u16>,
}

impl SyncArea {
    pub fn new(mapping: RegisterSyncMapping) -> Self {
        let count = mapping.count as usize;
        Self {
            mapping,
            last_plc: vec![0; count],
            last_mb: vec![0; count],
        }
    }

    pub fn mapping(&self) -> &RegisterSyncMapping {
        &self.mapping
    }

    pub fn last_plc(&self) -> &[u16] {
        &self.last_plc
    }

    pub fn last_mb(&self) -> &[u16] {
        &self.last_mb
    }

    /// 用本轮读到的镜像替换快照
    pub fn snapshot(&mut self, plc: Vec<u16>, mb: Vec<u16>) {
        debug_assert_eq!(plc.len(), self.mapping.count as usize);
        debug_assert_eq!(mb.len(), self.mapping.count as usize);
        self.last_plc = plc;
        self.last_mb = mb;
    }

    #[cfg(test)]
    pub(crate) fn set_snapshots(&mut self, last_plc: Vec<u16>, last_mb: Vec<u16>) {
        self.last_plc = last_plc;
        self.last_mb = last_mb;
    }
}
