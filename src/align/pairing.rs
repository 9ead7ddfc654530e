//! 配对端插入片段统计的协作者接口。
//!
//! 估计与配对救援由外部协作者实现；本模块声明接口形状并返回
//! 全部失败的统计，使驱动在无估计时仍能输出配对字段。

use log::debug;

use super::extend::AlnReg;
use super::MemOpt;

/// 一种读段取向（FF/FR/RF/RR）上的插入片段分布
#[derive(Debug, Clone, Copy, Default)]
pub struct PairStat {
    pub low: i64,
    pub high: i64,
    pub avg: f64,
    pub std: f64,
    /// 该取向上数据不足，统计不可用
    pub failed: bool,
}

/// 对一批读段的区域向量推断四种取向的插入片段分布。
pub fn infer_insert_sizes(_opt: &MemOpt, _l_pac: u64, regs: &[Vec<AlnReg>]) -> [PairStat; 4] {
    debug!(
        "insert-size estimation unavailable; {} region vectors left unpaired",
        regs.len()
    );
    [PairStat {
        failed: true,
        ..PairStat::default()
    }; 4]
}
