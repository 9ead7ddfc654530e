//! 2-bit 压缩参考序列与 contig 元信息。
//!
//! 仅存储正链；概念上参考全长为 `2 * l_pac`，`[l_pac, 2*l_pac)` 为整条
//! 正链的反向互补，按需即时计算。模糊碱基（N）在压缩时被确定性伪随机
//! 碱基替换，其区段记录在 `ambs` 中以便统计。

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::io::SeqRecord;
use crate::util::dna;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contig {
    pub name: String,
    /// 正链上的起始偏移
    pub offset: u64,
    pub len: u64,
}

/// 正链上的一段模糊碱基区间
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AmbRun {
    pub offset: u64,
    pub len: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PackedRef {
    pub l_pac: u64,
    pac: Vec<u8>,
    pub contigs: Vec<Contig>,
    pub ambs: Vec<AmbRun>,
}

impl PackedRef {
    /// 由 FASTA 记录拼接压缩参考。记录按出现顺序连续排布，无分隔符。
    pub fn from_records(records: &[SeqRecord]) -> Result<Self> {
        let total: u64 = records.iter().map(|r| r.seq.len() as u64).sum();
        if total == 0 {
            bail!("reference contains no bases");
        }

        let mut packed = Self {
            l_pac: 0,
            pac: vec![0u8; (total as usize + 3) / 4],
            contigs: Vec::with_capacity(records.len()),
            ambs: Vec::new(),
        };

        // 与参考实现一致的确定性替换序列
        let mut lcg: u32 = 11;
        for rec in records {
            let offset = packed.l_pac;
            for &b in &rec.seq {
                let mut code = dna::encode_base(b);
                if code > 3 {
                    lcg = lcg.wrapping_mul(1_103_515_245).wrapping_add(12_345);
                    code = ((lcg >> 16) % 4) as u8;
                    match packed.ambs.last_mut() {
                        Some(run) if run.offset + run.len == packed.l_pac => run.len += 1,
                        _ => packed.ambs.push(AmbRun {
                            offset: packed.l_pac,
                            len: 1,
                        }),
                    }
                }
                let pos = packed.l_pac as usize;
                packed.pac[pos >> 2] |= code << ((pos & 3) << 1);
                packed.l_pac += 1;
            }
            packed.contigs.push(Contig {
                name: rec.name.clone(),
                offset,
                len: rec.seq.len() as u64,
            });
        }
        Ok(packed)
    }

    #[inline]
    fn fwd_base(&self, pos: u64) -> u8 {
        (self.pac[(pos >> 2) as usize] >> ((pos & 3) << 1)) & 3
    }

    /// 取 `[0, 2*l_pac)` 坐标下的碱基编码
    #[inline]
    pub fn base(&self, pos: u64) -> u8 {
        if pos < self.l_pac {
            self.fwd_base(pos)
        } else {
            3 - self.fwd_base(2 * self.l_pac - 1 - pos)
        }
    }

    /// 取 `[beg, end)` 的碱基编码切片，返回 (序列, 实际长度)。
    /// 区间被裁剪到 `[0, 2*l_pac)`；跨越正反链接缝时返回空序列。
    pub fn get_seq(&self, beg: i64, end: i64) -> (Vec<u8>, i64) {
        let l2 = (2 * self.l_pac) as i64;
        let (beg, end) = if beg <= end { (beg, end) } else { (end, beg) };
        let beg = beg.max(0);
        let end = end.min(l2);
        if beg >= end || (beg < self.l_pac as i64 && (self.l_pac as i64) < end) {
            return (Vec::new(), 0);
        }
        let seq: Vec<u8> = (beg..end).map(|p| self.base(p as u64)).collect();
        let len = seq.len() as i64;
        (seq, len)
    }

    /// 将打包坐标映射为 (正链坐标, 是否反链)。
    /// 反链位置映射到其在正链上的镜像位置。
    pub fn depos(&self, pos: i64) -> (i64, bool) {
        let is_rev = pos >= self.l_pac as i64;
        if is_rev {
            ((2 * self.l_pac) as i64 - 1 - pos, true)
        } else {
            (pos, false)
        }
    }

    /// 正链坐标 -> contig 下标（二分查找）
    pub fn pos_to_contig(&self, pos: i64) -> Option<usize> {
        if pos < 0 || pos >= self.l_pac as i64 {
            return None;
        }
        let pos = pos as u64;
        let mut lo = 0usize;
        let mut hi = self.contigs.len();
        while lo < hi {
            let mid = (lo + hi) / 2;
            let c = &self.contigs[mid];
            if pos < c.offset {
                hi = mid;
            } else if pos >= c.offset + c.len {
                lo = mid + 1;
            } else {
                return Some(mid);
            }
        }
        None
    }

    /// 统计正链区间 `[pos, pos+len)` 内的模糊碱基个数，并返回所在 contig。
    pub fn cnt_ambi(&self, pos: i64, len: i64) -> (i64, Option<usize>) {
        let rid = self.pos_to_contig(pos);
        let (beg, end) = (pos.max(0) as u64, (pos + len).max(0) as u64);
        let start = self
            .ambs
            .partition_point(|run| run.offset + run.len <= beg);
        let mut n = 0i64;
        for run in &self.ambs[start..] {
            if run.offset >= end {
                break;
            }
            let ovl = (run.offset + run.len).min(end) - run.offset.max(beg);
            n += ovl as i64;
        }
        (n, rid)
    }

    /// 构建 FM 索引文本：正链 + 反向互补 + 哨兵，字符域 {0:$, 1..=4:ACGT}。
    pub fn fm_text(&self) -> Vec<u8> {
        let l = self.l_pac as usize;
        let mut text = Vec::with_capacity(2 * l + 1);
        for i in 0..l {
            text.push(self.fwd_base(i as u64) + 1);
        }
        for i in 0..l {
            text.push(4 - self.fwd_base((l - 1 - i) as u64));
        }
        text.push(0);
        text
    }
}
