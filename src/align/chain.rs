//! 种子链构建与过滤。
//!
//! 链按锚点位置（首种子 `rbeg`）组织在有序映射中，每个新种子先对
//! 前驱链做「包含测试 + 合并测试」，失败才开新链。提取时按键序遍历，
//! 保证下游过滤的平局顺序稳定。

use std::cmp::Reverse;
use std::collections::BTreeMap;

use log::trace;

use super::smem::SmemIterator;
use super::MemOpt;
use crate::index::fm::FmIndex;

/// 精确匹配种子。`rbeg` 为打包参考坐标（>= l_pac 即反链）。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemSeed {
    pub rbeg: i64,
    pub qbeg: i32,
    pub len: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemChain {
    /// 锚点：首种子的 rbeg
    pub pos: i64,
    pub seeds: Vec<MemSeed>,
}

impl MemChain {
    fn new(seed: MemSeed) -> Self {
        Self {
            pos: seed.rbeg,
            seeds: vec![seed],
        }
    }

    /// 链覆盖的查询区间 [beg, end)
    pub fn query_span(&self) -> (i32, i32) {
        let first = &self.seeds[0];
        let last = self.seeds.last().unwrap();
        (first.qbeg, last.qbeg + last.len)
    }

    /// 包含测试 + 合并测试。被链的包围盒完全包含的种子直接吸收；
    /// 与末种子共线且间隙受限的种子追加；否则返回 false。
    fn try_merge(&mut self, opt: &MemOpt, p: &MemSeed) -> bool {
        let first = self.seeds[0];
        let last = *self.seeds.last().unwrap();
        let qend = i64::from(last.qbeg + last.len);
        let rend = last.rbeg + i64::from(last.len);

        if i64::from(p.qbeg) >= i64::from(first.qbeg)
            && i64::from(p.qbeg + p.len) <= qend
            && p.rbeg >= first.rbeg
            && p.rbeg + i64::from(p.len) <= rend
        {
            return true;
        }

        let x = i64::from(p.qbeg - last.qbeg);
        let y = p.rbeg - last.rbeg;
        if y >= 0
            && (x - y).abs() <= i64::from(opt.w)
            && x - i64::from(last.len) < i64::from(opt.max_chain_gap)
            && y - i64::from(last.len) < i64::from(opt.max_chain_gap)
        {
            self.seeds.push(*p);
            return true;
        }
        false
    }
}

/// 由 SMEM 批次构建种子链。过短或过于重复的区间在展开前被丢弃。
pub fn build_chains(opt: &MemOpt, fm: &FmIndex, itr: &mut SmemIterator) -> Vec<MemChain> {
    let mut tree: BTreeMap<(i64, u32), MemChain> = BTreeMap::new();
    let mut n_chn: u32 = 0;

    while let Some(batch) = itr.next_batch(opt.max_seed_len as usize, opt.min_intv) {
        for p in batch {
            let slen = p.qlen();
            if (slen as i32) < opt.min_seed_len || p.s > opt.max_occ {
                continue;
            }
            for t in 0..p.s {
                let seed = MemSeed {
                    rbeg: fm.sa(p.k + t) as i64,
                    qbeg: p.qbeg() as i32,
                    len: slen as i32,
                };
                let merged = tree
                    .range_mut(..=(seed.rbeg, u32::MAX))
                    .next_back()
                    .map_or(false, |(_, c)| c.try_merge(opt, &seed));
                if !merged {
                    tree.insert((seed.rbeg, n_chn), MemChain::new(seed));
                    n_chn += 1;
                }
            }
        }
    }
    tree.into_values().collect()
}

/// 链权重：查询轴与参考轴种子覆盖（区间并集）的较小者。
/// 参考轴一趟中 `end` 沿查询坐标推进，与既有行为保持一致。
pub fn chain_weight(c: &MemChain) -> i32 {
    let mut cov_q = 0i64;
    let mut end = 0i64;
    for s in &c.seeds {
        let (b, e) = (i64::from(s.qbeg), i64::from(s.qbeg + s.len));
        if b >= end {
            cov_q += i64::from(s.len);
        } else if e > end {
            cov_q += e - end;
        }
        end = end.max(e);
    }

    let mut cov_r = 0i64;
    let mut end = 0i64;
    for s in &c.seeds {
        let (b, e) = (s.rbeg, s.rbeg + i64::from(s.len));
        if b >= end {
            cov_r += i64::from(s.len);
        } else if e > end {
            cov_r += e - end;
        }
        end = end.max(i64::from(s.qbeg + s.len));
    }

    cov_q.min(cov_r).min((1 << 30) - 1) as i32
}

/// 按权重降序筛选链：与已接受链在查询轴上显著重叠、且权重不及其
/// `chain_drop_ratio` 倍（差距超过 `2 * min_seed_len`）的候选被丢弃。
pub fn filter_chains(opt: &MemOpt, chains: Vec<MemChain>) -> Vec<MemChain> {
    if chains.is_empty() {
        return chains;
    }
    let mut scored: Vec<(i32, MemChain)> = chains
        .into_iter()
        .map(|c| (chain_weight(&c), c))
        .collect();
    scored.sort_by_key(|(w, _)| Reverse(*w));

    let mut kept: Vec<(i32, MemChain)> = Vec::with_capacity(scored.len());
    for (w, c) in scored {
        let (beg, end) = c.query_span();
        let mut dropped = false;
        for (wj, cj) in &kept {
            let (bj, ej) = cj.query_span();
            let b_max = beg.max(bj);
            let e_min = end.min(ej);
            if e_min <= b_max {
                continue;
            }
            let min_l = (end - beg).min(ej - bj);
            if f64::from(e_min - b_max) >= f64::from(min_l) * f64::from(opt.mask_level)
                && (f64::from(w) < f64::from(*wj) * f64::from(opt.chain_drop_ratio)
                    && wj - w >= opt.min_seed_len * 2)
            {
                dropped = true;
                break;
            }
        }
        if dropped {
            trace!(
                "drop chain at pos={} weight={} (dominated on query span)",
                c.pos,
                w
            );
        } else {
            kept.push((w, c));
        }
    }
    kept.into_iter().map(|(_, c)| c).collect()
}
