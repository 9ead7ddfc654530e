//! CIGAR 生成与 SAM 记录格式化。

use std::fmt::Write as _;

use super::extend::AlnReg;
use super::ksw;
use super::{MemOpt, MEM_F_HARDCLIP};
use crate::index::pac::PackedRef;
use crate::io::SeqRecord;
use crate::util::dna;

pub type Cigar = Vec<(usize, char)>;

pub const SAM_F_PAIRED: u16 = 0x1;
pub const SAM_F_UNMAPPED: u16 = 0x4;
pub const SAM_F_MUNMAP: u16 = 0x8;
pub const SAM_F_REVERSE: u16 = 0x10;
pub const SAM_F_MREVERSE: u16 = 0x20;
pub const SAM_F_READ1: u16 = 0x40;
pub const SAM_F_READ2: u16 = 0x80;
pub const SAM_F_SECONDARY: u16 = 0x100;

/// 输出向的比对条目（正链 contig 坐标 + 无端部剪切的 CIGAR）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemAln {
    /// contig 内 0-based 起点；未比对为 -1
    pub pos: i64,
    /// contig 下标；未比对为 -1
    pub rid: i32,
    pub is_rev: bool,
    pub cigar: Cigar,
    pub qb: i32,
    pub qe: i32,
    pub mapq: i32,
    pub score: i32,
    pub sub: i32,
    pub nm: u32,
    pub flag: u16,
}

impl MemAln {
    pub fn unmapped() -> Self {
        Self {
            pos: -1,
            rid: -1,
            ..Self::default()
        }
    }

    pub fn is_mapped(&self) -> bool {
        self.rid >= 0
    }

    /// CIGAR 消耗的参考长度
    pub fn ref_len(&self) -> i64 {
        self.cigar
            .iter()
            .filter(|(_, op)| matches!(op, 'M' | 'D'))
            .map(|(len, _)| *len as i64)
            .sum()
    }
}

/// 区域内全局重比对得到规范 CIGAR。
///
/// 区间跨越正反链接缝或参考取片不足额时放弃。反链区域（`rb >= l_pac`）
/// 先反转查询与参考再比对，使 indel 在正链视角左对齐；产出的 CIGAR
/// 即为正链方向。
pub fn gen_cigar(
    opt: &MemOpt,
    mat: &[i8; 25],
    refseq: &PackedRef,
    query: &[u8],
    rb: i64,
    re: i64,
) -> Option<(i32, Cigar, u32)> {
    let l_pac = refseq.l_pac as i64;
    if query.is_empty() || rb >= re || (rb < l_pac && l_pac < re) {
        return None;
    }
    let (mut rseq, rlen) = refseq.get_seq(rb, re);
    if rlen != re - rb {
        return None;
    }
    let mut qbuf = query.to_vec();
    if rb >= l_pac {
        qbuf.reverse();
        rseq.reverse();
    }
    let band = {
        let wv = ((query.len() as i64 * i64::from(opt.a) - i64::from(opt.q)) / i64::from(opt.r)
            + 1)
        .max(1);
        (wv.min(i64::from(opt.w)) + (rlen - query.len() as i64).abs()) as i32
    };
    ksw::global(&qbuf, &rseq, mat, opt.q, opt.r, band)
}

/// 区域 -> 输出条目：CIGAR、正链坐标、contig 归属。失败则降级为未比对。
pub fn reg2aln(
    opt: &MemOpt,
    mat: &[i8; 25],
    refseq: &PackedRef,
    query: &[u8],
    reg: &AlnReg,
) -> MemAln {
    let mut a = MemAln {
        pos: -1,
        rid: -1,
        qb: reg.qb,
        qe: reg.qe,
        score: reg.score,
        sub: reg.sub.max(reg.csub),
        ..MemAln::default()
    };
    let l_pac = refseq.l_pac as i64;
    let qslice = &query[reg.qb as usize..reg.qe as usize];
    if let Some((score, cigar, nm)) = gen_cigar(opt, mat, refseq, qslice, reg.rb, reg.re) {
        if !cigar.is_empty() {
            // 反链区域取 re-1 的镜像，得到正链视角的最左端
            let pick = if reg.rb < l_pac { reg.rb } else { reg.re - 1 };
            let (fpos, is_rev) = refseq.depos(pick);
            let (_n_ambi, rid) = refseq.cnt_ambi(fpos, reg.re - reg.rb);
            if let Some(rid) = rid {
                a.pos = fpos - refseq.contigs[rid].offset as i64;
                a.rid = rid as i32;
                a.is_rev = is_rev;
                if is_rev {
                    a.flag |= SAM_F_REVERSE;
                }
                a.cigar = cigar;
                a.score = score;
                a.nm = nm;
            }
        }
    }
    a
}

fn cigar_push(cigar: &mut String, len: i32, op: char) {
    if len > 0 {
        let _ = write!(cigar, "{}{}", len, op);
    }
}

/// 产出一行 SAM 记录（含换行）。`aln` 为本读段的比对（未比对传
/// [`MemAln::unmapped`]），`mate` 为配对读段的主比对。
pub fn aln2sam(
    opt: &MemOpt,
    refseq: &PackedRef,
    rec: &SeqRecord,
    aln: &MemAln,
    mate: Option<&MemAln>,
    extra_flag: u16,
    out: &mut String,
) {
    let l_seq = rec.seq.len() as i32;
    let mut flag = aln.flag | extra_flag;
    if !aln.is_mapped() {
        flag |= SAM_F_UNMAPPED;
    }
    if let Some(m) = mate {
        flag |= SAM_F_PAIRED;
        if !m.is_mapped() {
            flag |= SAM_F_MUNMAP;
        } else if m.is_rev {
            flag |= SAM_F_MREVERSE;
        }
    }

    // 未比对读段继承已比对配对的坐标
    let coord = if aln.is_mapped() {
        Some((aln.rid, aln.pos))
    } else {
        mate.filter(|m| m.is_mapped()).map(|m| (m.rid, m.pos))
    };

    out.push_str(&rec.name);
    let _ = write!(out, "\t{}", flag);
    match coord {
        Some((rid, pos)) => {
            let _ = write!(
                out,
                "\t{}\t{}\t{}",
                refseq.contigs[rid as usize].name,
                pos + 1,
                aln.mapq
            );
        }
        None => out.push_str("\t*\t0\t0"),
    }

    // CIGAR：端部剪切由 [qb, qe) 与输出方向决定
    let is_hard = opt.flag & MEM_F_HARDCLIP != 0;
    let (clip5, clip3) = if aln.is_rev {
        (l_seq - aln.qe, aln.qb)
    } else {
        (aln.qb, l_seq - aln.qe)
    };
    out.push('\t');
    if aln.is_mapped() {
        let clip_op = if is_hard { 'H' } else { 'S' };
        let mut cg = String::new();
        cigar_push(&mut cg, clip5, clip_op);
        for &(len, op) in &aln.cigar {
            cigar_push(&mut cg, len as i32, op);
        }
        cigar_push(&mut cg, clip3, clip_op);
        out.push_str(&cg);
    } else {
        out.push('*');
    }

    // RNEXT / PNEXT / TLEN
    match mate.filter(|m| m.is_mapped()) {
        Some(m) => {
            if aln.is_mapped() && m.rid != aln.rid {
                let _ = write!(out, "\t{}\t{}\t0", refseq.contigs[m.rid as usize].name, m.pos + 1);
            } else {
                let tlen = if aln.is_mapped() && m.rid == aln.rid {
                    let (b0, e0) = (aln.pos, aln.pos + aln.ref_len());
                    let (b1, e1) = (m.pos, m.pos + m.ref_len());
                    if (b0, e0) <= (b1, e1) {
                        e0.max(e1) - b0
                    } else {
                        -(e0.max(e1) - b1)
                    }
                } else {
                    0
                };
                let _ = write!(out, "\t=\t{}\t{}", m.pos + 1, tlen);
            }
        }
        None => out.push_str("\t*\t0\t0"),
    }

    // SEQ / QUAL：输出正链方向；硬剪切时去掉被剪切碱基
    let mut seq = if aln.is_rev {
        dna::revcomp(&rec.seq)
    } else {
        rec.seq.clone()
    };
    let mut qual = rec.qual.clone().map(|q| {
        if aln.is_rev {
            q.into_iter().rev().collect()
        } else {
            q
        }
    });
    if aln.is_mapped() && is_hard {
        let (lo, hi) = (clip5 as usize, (l_seq - clip3) as usize);
        seq = seq[lo..hi].to_vec();
        qual = qual.map(|q| q[lo..hi].to_vec());
    }
    out.push('\t');
    out.push_str(&String::from_utf8_lossy(&seq));
    out.push('\t');
    match &qual {
        Some(q) => out.push_str(&String::from_utf8_lossy(q)),
        None => out.push('*'),
    }

    if aln.is_mapped() {
        let _ = write!(
            out,
            "\tAS:i:{}\tXS:i:{}\tNM:i:{}",
            aln.score, aln.sub, aln.nm
        );
    }
    out.push('\n');
}
