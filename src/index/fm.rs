//! FMD 风格 FM 索引。
//!
//! 文本为「正链 + 反向互补 + 哨兵」（见 [`crate::index::pac::PackedRef::fm_text`]），
//! 因此单个 BWT 同时服务双链：每个模式区间携带其反向互补模式的区间，
//! 向前延伸等价于在互补侧向后延伸。
//!
//! - 字符域 {0:$, 1:A, 2:C, 3:G, 4:T}，互补为 `5 - c`。
//! - Occ 采用定长分块采样 + 块内顺扫（便于后续替换为压缩结构）。
//! - 保存完整 SA（MVP），方便从区间直接取位置；后续可替换为稀疏采样。

use serde::{Deserialize, Serialize};

/// 索引字符域大小（哨兵 + ACGT）
pub const SIGMA: usize = 5;

/// 双向 SA 区间：`k` 为模式区间起点，`l` 为其反向互补模式的区间起点，
/// `s` 为区间大小。`info` 打包匹配到的查询区间：`(qbeg << 32) | qend`。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BiInterval {
    pub k: u64,
    pub l: u64,
    pub s: u64,
    pub info: u64,
}

impl BiInterval {
    #[inline]
    pub fn qbeg(&self) -> usize {
        (self.info >> 32) as usize
    }

    #[inline]
    pub fn qend(&self) -> usize {
        (self.info & 0xffff_ffff) as usize
    }

    #[inline]
    pub fn qlen(&self) -> usize {
        self.qend() - self.qbeg()
    }
}

/// SMEM 搜索的复用缓冲，避免逐读段反复分配
#[derive(Debug, Default)]
pub struct SmemScratch {
    prev: Vec<BiInterval>,
    curr: Vec<BiInterval>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FmIndex {
    block: u32,
    /// c[i] = 文本中字符 < i 的累计数量；c[SIGMA] = 文本长度
    c: [u64; SIGMA + 1],
    bwt: Vec<u8>,
    /// 分块 Occ 采样，行优先展平：occ[block_id * SIGMA + ch]
    occ: Vec<u64>,
    /// 完整 SA
    sa: Vec<u64>,
}

impl FmIndex {
    pub fn build(bwt: Vec<u8>, sa: Vec<u64>, block: usize) -> Self {
        assert!(block > 0);
        let n = bwt.len();

        let mut freq = [0u64; SIGMA];
        for &ch in &bwt {
            freq[ch as usize] += 1;
        }
        let mut c = [0u64; SIGMA + 1];
        for i in 0..SIGMA {
            c[i + 1] = c[i] + freq[i];
        }

        let num_blocks = (n + block - 1) / block;
        let mut occ = vec![0u64; num_blocks * SIGMA];
        let mut running = [0u64; SIGMA];
        for bi in 0..num_blocks {
            occ[bi * SIGMA..(bi + 1) * SIGMA].copy_from_slice(&running);
            for &ch in &bwt[bi * block..((bi + 1) * block).min(n)] {
                running[ch as usize] += 1;
            }
        }

        Self {
            block: block as u32,
            c,
            bwt,
            occ,
            sa,
        }
    }

    /// 文本长度（含哨兵）
    #[inline]
    pub fn len(&self) -> u64 {
        self.bwt.len() as u64
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bwt.is_empty()
    }

    /// SA 查询：区间中第 `i` 行对应的文本位置
    #[inline]
    pub fn sa(&self, i: u64) -> u64 {
        self.sa[i as usize]
    }

    /// `BWT[0..pos)` 内各字符的出现次数
    fn occ_all(&self, pos: u64) -> [u64; SIGMA] {
        let mut cnt = [0u64; SIGMA];
        if pos == 0 {
            return cnt;
        }
        let block = u64::from(self.block);
        let bi = ((pos - 1) / block) as usize;
        cnt.copy_from_slice(&self.occ[bi * SIGMA..(bi + 1) * SIGMA]);
        for &ch in &self.bwt[bi * self.block as usize..pos as usize] {
            cnt[ch as usize] += 1;
        }
        cnt
    }

    /// 单碱基（编码 0..=3）的初始双向区间
    pub fn base_interval(&self, base: u8) -> BiInterval {
        debug_assert!(base < 4);
        let ch = (base + 1) as usize;
        BiInterval {
            k: self.c[ch],
            l: self.c[SIGMA - ch],
            s: self.c[ch + 1] - self.c[ch],
            info: 0,
        }
    }

    /// 向后延伸（模式前插一个碱基），一次性返回四个碱基的结果区间。
    /// `k`/`s` 由 rank 直接给出；`l` 按反向互补侧的分组次序
    /// （$ 组在前，随后 T、G、C、A）累加得到。
    pub fn extend_back(&self, ik: &BiInterval) -> [BiInterval; 4] {
        let tk = self.occ_all(ik.k);
        let tl = self.occ_all(ik.k + ik.s);
        let mut sizes = [0u64; SIGMA];
        for ch in 0..SIGMA {
            sizes[ch] = tl[ch] - tk[ch];
        }

        let mut ok = [BiInterval::default(); 4];
        for ch in 1..SIGMA {
            ok[ch - 1].k = self.c[ch] + tk[ch];
            ok[ch - 1].s = sizes[ch];
        }
        let mut acc = ik.l + sizes[0];
        for ch in (1..SIGMA).rev() {
            ok[ch - 1].l = acc;
            acc += sizes[ch];
        }
        ok
    }

    /// 向前延伸（模式后接一个碱基）：交换 k/l 后在互补侧向后延伸
    pub fn extend_fore(&self, ik: &BiInterval) -> [BiInterval; 4] {
        let flipped = BiInterval {
            k: ik.l,
            l: ik.k,
            s: ik.s,
            info: 0,
        };
        let ok = self.extend_back(&flipped);
        let mut out = [BiInterval::default(); 4];
        for base in 0..4usize {
            let o = &ok[3 - base];
            out[base] = BiInterval {
                k: o.l,
                l: o.k,
                s: o.s,
                info: 0,
            };
        }
        out
    }

    /// 精确匹配搜索，`pat` 为编码 0..=3 的碱基序列。
    /// 返回 SA 区间 (起点, 大小)。
    pub fn backward_search(&self, pat: &[u8]) -> Option<(u64, u64)> {
        let &last = pat.last()?;
        if last > 3 {
            return None;
        }
        let mut ik = self.base_interval(last);
        for &b in pat[..pat.len() - 1].iter().rev() {
            if b > 3 || ik.s == 0 {
                return None;
            }
            ik = self.extend_back(&ik)[b as usize];
        }
        if ik.s == 0 {
            None
        } else {
            Some((ik.k, ik.s))
        }
    }

    /// 以查询位置 `x` 为锚点的超级最大精确匹配搜索。
    ///
    /// 正向先延伸到底，区间每次收缩时记录一个候选；随后自 `x-1` 逐位
    /// 向后延伸，延伸失败（或区间缩到 `min_intv` 以下）的候选即为包含
    /// `x` 的 SMEM。匹配长度最多 `max_len`。写入 `mems`（按 qbeg 升序），
    /// 返回游标的下一位置（最长正向匹配的终点）。
    ///
    /// 调用方保证 `q[x] <= 3`。
    pub fn smem1(
        &self,
        q: &[u8],
        x: usize,
        min_intv: u64,
        max_len: usize,
        mems: &mut Vec<BiInterval>,
        scratch: &mut SmemScratch,
    ) -> usize {
        mems.clear();
        let len = q.len();
        debug_assert!(x < len && q[x] <= 3);
        let min_intv = min_intv.max(1);

        let SmemScratch { prev, curr } = scratch;
        prev.clear();
        curr.clear();

        let mut ik = self.base_interval(q[x]);
        if ik.s == 0 {
            return x + 1;
        }
        ik.info = (x as u64) + 1;

        // 正向延伸
        let mut i = x + 1;
        loop {
            if i == len || i - x >= max_len || q[i] > 3 {
                curr.push(ik);
                break;
            }
            let next = self.extend_fore(&ik)[q[i] as usize];
            if next.s != ik.s {
                curr.push(ik);
                if next.s < min_intv {
                    break;
                }
            }
            ik = next;
            ik.info = (i as u64) + 1;
            i += 1;
        }
        // 倒序后最长匹配在前
        curr.reverse();
        let ret = (curr[0].info & 0xffff_ffff) as usize;
        std::mem::swap(prev, curr);

        // 反向延伸
        let mut i = x as i64 - 1;
        loop {
            let c: i64 = if i < 0 {
                -1
            } else if q[i as usize] <= 3 {
                i64::from(q[i as usize])
            } else {
                -1
            };
            curr.clear();
            for p in prev.iter() {
                let next = if c >= 0 {
                    Some(self.extend_back(p)[c as usize])
                } else {
                    None
                };
                match next {
                    Some(o) if o.s >= min_intv => {
                        if curr.last().map_or(true, |t| t.s != o.s) {
                            let mut o = o;
                            o.info = p.info;
                            curr.push(o);
                        }
                    }
                    _ => {
                        // 该候选无法继续向左，若是本轮首个失败者则为 SMEM
                        if curr.is_empty()
                            && (mems.is_empty()
                                || ((i + 1) as u64) < mems.last().unwrap().info >> 32)
                        {
                            let mut m = *p;
                            m.info |= ((i + 1) as u64) << 32;
                            mems.push(m);
                        }
                    }
                }
            }
            if curr.is_empty() {
                break;
            }
            std::mem::swap(prev, curr);
            i -= 1;
        }
        mems.reverse();
        ret
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{bwt::build_bwt, pac::PackedRef, sa::build_sa};
    use crate::io::SeqRecord;
    use crate::util::dna;

    fn build_fm(seq: &[u8]) -> FmIndex {
        let rec = SeqRecord {
            name: "chr1".to_string(),
            comment: None,
            seq: seq.to_vec(),
            qual: None,
        };
        let p = PackedRef::from_records(&[rec]).unwrap();
        let text = p.fm_text();
        let sa = build_sa(&text);
        let bwt = build_bwt(&text, &sa);
        FmIndex::build(bwt, sa, 16)
    }

    fn occurrences(fm: &FmIndex, pat: &[u8]) -> Vec<u64> {
        match fm.backward_search(&dna::encode_seq(pat)) {
            Some((k, s)) => {
                let mut v: Vec<u64> = (0..s).map(|i| fm.sa(k + i)).collect();
                v.sort_unstable();
                v
            }
            None => Vec::new(),
        }
    }

    #[test]
    fn backward_search_finds_forward_hits() {
        let fm = build_fm(b"ACGTACGTTT");
        // "ACGT" 出现在正链 0、4
        let hits = occurrences(&fm, b"ACGT");
        assert!(hits.contains(&0));
        assert!(hits.contains(&4));
    }

    #[test]
    fn backward_search_finds_reverse_hits() {
        let fm = build_fm(b"AAAACCC");
        // "GGGT" 是 "ACCC" 的反向互补，应落在反链半区（位置 >= 7）
        let hits = occurrences(&fm, b"GGGT");
        assert_eq!(hits.len(), 1);
        assert!(hits[0] >= 7);
    }

    #[test]
    fn backward_search_absent_pattern() {
        let fm = build_fm(b"AAAAAA");
        assert!(fm.backward_search(&dna::encode_seq(b"AC")).is_none());
        assert!(fm.backward_search(&dna::encode_seq(b"AN")).is_none());
    }

    #[test]
    fn fore_and_back_extension_agree() {
        let fm = build_fm(b"ACGTAGGCTA");
        // 区间对 "CG"：先向后由 "G" 前插 "C"，与先 "C" 再向前接 "G" 一致
        let g = fm.base_interval(dna::encode_base(b'G'));
        let back = fm.extend_back(&g)[dna::encode_base(b'C') as usize];
        let c = fm.base_interval(dna::encode_base(b'C'));
        let fore = fm.extend_fore(&c)[dna::encode_base(b'G') as usize];
        assert_eq!(back.k, fore.k);
        assert_eq!(back.l, fore.l);
        assert_eq!(back.s, fore.s);
        assert!(back.s > 0);
    }

    #[test]
    fn smem1_full_length_match() {
        let reference = b"GATTACAGATTACACCGGTT";
        let fm = build_fm(reference);
        let q = dna::encode_seq(b"CCGGTT");
        let mut mems = Vec::new();
        let mut scratch = SmemScratch::default();
        let ret = fm.smem1(&q, 0, 1, 64, &mut mems, &mut scratch);
        assert_eq!(ret, q.len());
        assert!(mems.iter().any(|m| m.qbeg() == 0 && m.qend() == q.len()));
    }

    #[test]
    fn smem1_emits_overlapping_mems_around_anchor() {
        // 读段在中点换源：前半匹配一处，后半匹配另一处
        let fm = build_fm(b"AAAACCCCGGGGTTTTAGCT");
        let q = dna::encode_seq(b"CCGG");
        let mut mems = Vec::new();
        let mut scratch = SmemScratch::default();
        fm.smem1(&q, 1, 1, 64, &mut mems, &mut scratch);
        // 所有返回的 SMEM 都必须覆盖锚点位置 1
        for m in &mems {
            assert!(m.qbeg() <= 1 && m.qend() > 1);
        }
        assert!(!mems.is_empty());
    }

    #[test]
    fn smem1_respects_max_len() {
        let fm = build_fm(b"ACGTACGTACGTACGTACGT");
        let q = dna::encode_seq(b"ACGTACGTACGT");
        let mut mems = Vec::new();
        let mut scratch = SmemScratch::default();
        let ret = fm.smem1(&q, 0, 1, 4, &mut mems, &mut scratch);
        assert_eq!(ret, 4);
        assert!(mems.iter().all(|m| m.qlen() <= 4));
    }

    #[test]
    fn smem1_interval_size_matches_occurrence_count() {
        let fm = build_fm(b"ACGACGACGACG");
        let q = dna::encode_seq(b"ACG");
        let mut mems = Vec::new();
        let mut scratch = SmemScratch::default();
        fm.smem1(&q, 0, 1, 64, &mut mems, &mut scratch);
        let m = mems
            .iter()
            .find(|m| m.qbeg() == 0 && m.qend() == 3)
            .expect("3bp SMEM");
        // 正链 4 次出现；反向互补 "CGT" 也在反链半区出现 3 次，
        // 但 "ACG" 自身的区间计数只统计其正向出现
        assert!(m.s >= 4);
    }
}
