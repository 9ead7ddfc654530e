//! 链 -> 比对区域：两侧带状延伸、区域排序去重、主/次标记与近似 MAPQ。

use log::trace;

use super::chain::MemChain;
use super::ksw::{self, KswBuffer};
use super::MemOpt;
use crate::index::pac::PackedRef;

pub const MEM_MAPQ_COEF: f64 = 30.0;

/// 局部比对区域。`[qb, qe)` 为查询区间，`[rb, re)` 为打包参考区间。
/// `secondary = -1` 表示主比对，否则为支配它的主比对下标。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlnReg {
    pub rb: i64,
    pub re: i64,
    pub qb: i32,
    pub qe: i32,
    pub score: i32,
    /// 查询区间显著重叠的次优区域得分
    pub sub: i32,
    /// 链内次优得分（仅配对救援路径填充）
    pub csub: i32,
    /// 与次优得分近平的区域个数
    pub sub_n: i32,
    /// 落在区域内的链种子覆盖的查询碱基数
    pub seedcov: i32,
    pub secondary: i32,
}

impl AlnReg {
    fn qlen(&self) -> i32 {
        self.qe - self.qb
    }
}

/// 延伸的最大间隙跨度：得分预算 `qlen*a` 内可负担的间隙长度上界
pub fn cal_max_gap(opt: &MemOpt, qlen: i32) -> i64 {
    let l = (i64::from(qlen) * i64::from(opt.a) - i64::from(opt.q)) / i64::from(opt.r) + 1;
    l.max(1)
}

fn seed_in_region(t: &super::chain::MemSeed, a: &AlnReg) -> bool {
    t.qbeg >= a.qb
        && t.qbeg + t.len <= a.qe
        && t.rbeg >= a.rb
        && t.rbeg + i64::from(t.len) <= a.re
}

/// 把一条链延伸为零个或多个比对区域，追加到 `regs`。
///
/// 先为整条链取一次参考窗口（各种子按最大间隙界外扩），窗口跨越
/// 正反链接缝时收缩到首种子一侧；取片不足额（撞上参考边界）则放弃
/// 整条链。随后自首种子起做左右延伸，产生区域后跳过其内部的冗余种子。
pub fn extend_chain(
    opt: &MemOpt,
    mat: &[i8; 25],
    refseq: &PackedRef,
    query: &[u8],
    chain: &MemChain,
    buf: &mut KswBuffer,
    regs: &mut Vec<AlnReg>,
) {
    if chain.seeds.is_empty() {
        return;
    }
    let l_query = query.len() as i32;
    let l_pac = refseq.l_pac as i64;

    let mut rmax0 = i64::MAX;
    let mut rmax1 = 0i64;
    for s in &chain.seeds {
        let b = s.rbeg - (i64::from(s.qbeg) + cal_max_gap(opt, s.qbeg));
        let right = l_query - s.qbeg - s.len;
        let e = s.rbeg + i64::from(s.len) + i64::from(right) + cal_max_gap(opt, right);
        rmax0 = rmax0.min(b);
        rmax1 = rmax1.max(e);
    }
    rmax0 = rmax0.max(0);
    rmax1 = rmax1.min(2 * l_pac);
    if rmax0 < l_pac && l_pac < rmax1 {
        // 窗口跨接缝：收缩到首种子所在的半区
        if chain.seeds[0].rbeg < l_pac {
            rmax1 = l_pac;
        } else {
            rmax0 = l_pac;
        }
    }
    // 种子本身越出窗口（如跨接缝的匹配）时整链放弃
    if chain
        .seeds
        .iter()
        .any(|s| s.rbeg < rmax0 || s.rbeg + i64::from(s.len) > rmax1)
    {
        return;
    }
    let (rseq, rlen) = refseq.get_seq(rmax0, rmax1);
    if rlen != rmax1 - rmax0 {
        return;
    }

    let n = chain.seeds.len();
    let mut i = 0usize;
    while i < n {
        let s = chain.seeds[i];
        let mut a = AlnReg {
            secondary: -1,
            ..AlnReg::default()
        };

        if s.qbeg > 0 {
            // 左延伸：查询前缀与参考前缀各自反转
            let qs: Vec<u8> = query[..s.qbeg as usize].iter().rev().copied().collect();
            let tlen = (s.rbeg - rmax0) as usize;
            let ts: Vec<u8> = rseq[..tlen].iter().rev().copied().collect();
            let r = ksw::extend(&qs, &ts, mat, opt.q, opt.r, opt.w, s.len * opt.a, buf);
            a.score = r.score;
            a.qb = s.qbeg - r.qle as i32;
            a.rb = s.rbeg - r.tle as i64;
        } else {
            a.score = s.len * opt.a;
            a.qb = 0;
            a.rb = s.rbeg;
        }

        let qe0 = s.qbeg + s.len;
        if qe0 < l_query {
            let toff = (s.rbeg + i64::from(s.len) - rmax0) as usize;
            let r = ksw::extend(
                &query[qe0 as usize..],
                &rseq[toff..],
                mat,
                opt.q,
                opt.r,
                opt.w,
                a.score,
                buf,
            );
            a.score = r.score;
            a.qe = qe0 + r.qle as i32;
            a.re = s.rbeg + i64::from(s.len) + r.tle as i64;
        } else {
            a.qe = l_query;
            a.re = s.rbeg + i64::from(s.len);
        }

        a.seedcov = chain
            .seeds
            .iter()
            .filter(|t| seed_in_region(t, &a))
            .map(|t| t.len)
            .sum();

        trace!(
            "region from seed (qbeg={}, rbeg={}): q=[{},{}) r=[{},{}) score={}",
            s.qbeg, s.rbeg, a.qb, a.qe, a.rb, a.re, a.score
        );
        if a.score > 0 && a.qb < a.qe && a.rb < a.re {
            regs.push(a.clone());
        }

        // 跳过与前种子深度重叠且已被区域覆盖的冗余种子
        let mut j = i + 1;
        while j < n {
            let prev = chain.seeds[j - 1];
            let t = chain.seeds[j];
            let q_ovl =
                i64::from((prev.qbeg + prev.len).min(t.qbeg + t.len) - prev.qbeg.max(t.qbeg));
            let r_ovl = (prev.rbeg + i64::from(prev.len)).min(t.rbeg + i64::from(t.len))
                - prev.rbeg.max(t.rbeg);
            if q_ovl >= 7 && r_ovl >= 7 && seed_in_region(&t, &a) {
                j += 1;
            } else {
                break;
            }
        }
        i = j;
    }
}

/// 按 (得分降序, rb 升序, qb 升序) 排序，折叠键完全相同的相邻区域。
pub fn sort_and_dedup(regs: &mut Vec<AlnReg>) {
    regs.sort_by(|x, y| {
        y.score
            .cmp(&x.score)
            .then(x.rb.cmp(&y.rb))
            .then(x.qb.cmp(&y.qb))
    });
    for i in 1..regs.len() {
        if regs[i].score == regs[i - 1].score
            && regs[i].rb == regs[i - 1].rb
            && regs[i].qb == regs[i - 1].qb
        {
            regs[i].qe = regs[i].qb;
        }
    }
    regs.retain(|a| a.qe > a.qb);
}

/// 主/次标记：自高分起维护主比对集合，查询区间被某主比对显著覆盖的
/// 区域标为其次级，并回填该主比对的次优得分与近平计数。
pub fn mark_primary(opt: &MemOpt, regs: &mut [AlnReg]) {
    if regs.is_empty() {
        return;
    }
    for a in regs.iter_mut() {
        a.sub = 0;
        a.sub_n = 0;
        a.secondary = -1;
    }
    let near = (opt.a + opt.b).max(opt.q + opt.r);
    let mut primaries: Vec<usize> = vec![0];
    for i in 1..regs.len() {
        let mut dominator: Option<usize> = None;
        for &j in &primaries {
            let b_max = regs[i].qb.max(regs[j].qb);
            let e_min = regs[i].qe.min(regs[j].qe);
            if e_min <= b_max {
                continue;
            }
            let min_l = regs[i].qlen().min(regs[j].qlen());
            if f64::from(e_min - b_max) >= f64::from(min_l) * f64::from(opt.mask_level) {
                dominator = Some(j);
                break;
            }
        }
        match dominator {
            Some(j) => {
                regs[i].secondary = j as i32;
                if regs[j].sub == 0 {
                    regs[j].sub = regs[i].score;
                }
                if regs[j].score - regs[i].score <= near {
                    regs[j].sub_n += 1;
                }
            }
            None => primaries.push(i),
        }
    }
}

/// 近似 MAPQ：由主/次得分差、种子覆盖与一致度推出的 phred 值，截断到 [0, 60]。
pub fn approx_mapq(opt: &MemOpt, a: &AlnReg) -> i32 {
    let mut sub = if a.sub > 0 {
        a.sub
    } else {
        opt.min_seed_len * opt.a
    };
    sub = sub.max(a.csub);
    if sub >= a.score {
        return 0;
    }
    let l = f64::from(a.qlen()).max((a.re - a.rb) as f64);
    let mut mapq = (MEM_MAPQ_COEF * (1.0 - f64::from(sub) / f64::from(a.score))
        * f64::from(a.seedcov).ln()
        + 0.499) as i32;
    let identity =
        1.0 - (l * f64::from(opt.a) - f64::from(a.score)) / (f64::from(opt.a + opt.b) * l);
    if identity < 0.95 {
        mapq = (f64::from(mapq) * identity * identity + 0.499) as i32;
    }
    if a.sub_n > 0 {
        mapq -= (4.343 * f64::from(a.sub_n).ln() + 0.499) as i32;
    }
    mapq.clamp(0, 60)
}
