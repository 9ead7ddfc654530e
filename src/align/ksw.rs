//! 带状仿射间隙比对内核。
//!
//! 两个入口：
//! - [`extend`]：自种子端点出发的单侧延伸，带初始分，不设零下限，
//!   返回最优单元格的得分与消耗长度（滚动单行缓冲）。
//! - [`global`]：区域内全局重比对，完整回溯产出 CIGAR。
//!
//! 间隙代价模型：长度 `l` 的间隙计 `q + (l-1)*r`。

pub const NEG_INF: i32 = i32::MIN / 4;

/// 5x5 打分矩阵（A,C,G,T,N）：对角 `a`，非对角 `-b`，N 行列为 0。
pub fn fill_scmat(a: i32, b: i32) -> [i8; 25] {
    let mut mat = [0i8; 25];
    for i in 0..4 {
        for j in 0..4 {
            mat[i * 5 + j] = if i == j { a as i8 } else { -b as i8 };
        }
    }
    mat
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtendResult {
    pub score: i32,
    /// 消耗的查询长度
    pub qle: usize,
    /// 消耗的目标（参考）长度
    pub tle: usize,
}

/// DP 行缓冲，跨调用复用以减少分配
#[derive(Debug, Default)]
pub struct KswBuffer {
    h: Vec<i32>,
    e: Vec<i32>,
}

impl KswBuffer {
    pub fn new() -> Self {
        Self::default()
    }
}

/// 带状仿射延伸。`h0` 为进入 (0,0) 的初始分；得分可以下探（无零下限），
/// 返回全程最优单元格。`(qle, tle) = (0, 0)` 表示延伸无增益。
pub fn extend(
    query: &[u8],
    target: &[u8],
    mat: &[i8; 25],
    q_gap: i32,
    r_gap: i32,
    w: i32,
    h0: i32,
    buf: &mut KswBuffer,
) -> ExtendResult {
    let m = query.len();
    let n = target.len();
    let mut best = ExtendResult {
        score: h0,
        qle: 0,
        tle: 0,
    };
    if m == 0 || n == 0 {
        return best;
    }

    let h = &mut buf.h;
    let e = &mut buf.e;
    h.clear();
    e.clear();
    h.resize(n + 1, NEG_INF);
    e.resize(n + 1, NEG_INF);

    h[0] = h0;
    for j in 1..=n {
        let v = h0 - q_gap - (j as i32 - 1) * r_gap;
        if v < 0 {
            break;
        }
        h[j] = v;
    }

    let w = w.max(1) as i64;
    for i in 1..=m {
        let jlo = ((i as i64 - w).max(1)) as usize;
        let jhi = ((i as i64 + w).min(n as i64)) as usize;
        if jlo > jhi {
            break;
        }

        let qi = query[i - 1] as usize;
        // 左边界列：纯查询间隙
        let left_col = h0 - q_gap - (i as i32 - 1) * r_gap;
        let mut diag = h[jlo - 1];
        h[jlo - 1] = if jlo == 1 { left_col } else { NEG_INF };
        let mut f = NEG_INF;

        for j in jlo..=jhi {
            let e_new = (h[j] - q_gap).max(e[j] - r_gap);
            e[j] = e_new;
            f = (h[j - 1] - q_gap).max(f - r_gap);
            let sc = i32::from(mat[qi * 5 + target[j - 1] as usize]);
            let h_new = (diag + sc).max(e_new).max(f);
            diag = h[j];
            h[j] = h_new;
            if h_new > best.score {
                best = ExtendResult {
                    score: h_new,
                    qle: i,
                    tle: j,
                };
            }
        }
        // 带右移后暴露的单元格来自更早的行，作废之
        if jhi < n {
            h[jhi + 1] = NEG_INF;
            e[jhi + 1] = NEG_INF;
        }
    }
    best
}

/// 带状仿射全局比对。返回 (得分, CIGAR, 编辑距离)；
/// 带宽不足以抵达右下角时返回 `None`。
pub fn global(
    query: &[u8],
    target: &[u8],
    mat: &[i8; 25],
    q_gap: i32,
    r_gap: i32,
    w: i32,
) -> Option<(i32, Vec<(usize, char)>, u32)> {
    let m = query.len();
    let n = target.len();
    if m == 0 || n == 0 {
        return None;
    }

    let w = w.max(1) as i64;
    let cols = n + 1;
    let mut h = vec![NEG_INF; (m + 1) * cols];
    let mut e = vec![NEG_INF; (m + 1) * cols];
    let mut f = vec![NEG_INF; (m + 1) * cols];

    h[0] = 0;
    for j in 1..=n.min(w as usize) {
        h[j] = -q_gap - (j as i32 - 1) * r_gap;
    }
    for i in 1..=m.min(w as usize) {
        h[i * cols] = -q_gap - (i as i32 - 1) * r_gap;
    }

    for i in 1..=m {
        let jlo = ((i as i64 - w).max(1)) as usize;
        let jhi = ((i as i64 + w).min(n as i64)) as usize;
        if jlo > jhi {
            continue;
        }
        let qi = query[i - 1] as usize;
        for j in jlo..=jhi {
            let idx = i * cols + j;
            let up = idx - cols;
            let left = idx - 1;
            e[idx] = (h[up] - q_gap).max(e[up] - r_gap);
            f[idx] = (h[left] - q_gap).max(f[left] - r_gap);
            let sc = i32::from(mat[qi * 5 + target[j - 1] as usize]);
            h[idx] = (h[up - 1] + sc).max(e[idx]).max(f[idx]);
        }
    }

    let score = h[m * cols + n];
    if score <= NEG_INF / 2 {
        return None;
    }

    // 回溯：H/E/F 三态，间隙延续沿状态矩阵判断
    #[derive(Clone, Copy, PartialEq)]
    enum St {
        H,
        E,
        F,
    }
    let mut ops: Vec<char> = Vec::with_capacity(m + n);
    let (mut i, mut j) = (m, n);
    let mut st = St::H;
    while i > 0 || j > 0 {
        if i == 0 {
            ops.push('D');
            j -= 1;
            continue;
        }
        if j == 0 {
            ops.push('I');
            i -= 1;
            continue;
        }
        let idx = i * cols + j;
        match st {
            St::H => {
                let sc = i32::from(mat[query[i - 1] as usize * 5 + target[j - 1] as usize]);
                if h[idx] == h[idx - cols - 1] + sc {
                    ops.push('M');
                    i -= 1;
                    j -= 1;
                } else if h[idx] == e[idx] {
                    st = St::E;
                } else {
                    st = St::F;
                }
            }
            St::E => {
                ops.push('I');
                st = if e[idx] == e[idx - cols] - r_gap {
                    St::E
                } else {
                    St::H
                };
                i -= 1;
            }
            St::F => {
                ops.push('D');
                st = if f[idx] == f[idx - 1] - r_gap {
                    St::F
                } else {
                    St::H
                };
                j -= 1;
            }
        }
    }
    ops.reverse();

    // 编辑距离：错配 + 间隙碱基
    let mut nm = 0u32;
    let (mut qi, mut tj) = (0usize, 0usize);
    for &op in &ops {
        match op {
            'M' => {
                if query[qi] != target[tj] {
                    nm += 1;
                }
                qi += 1;
                tj += 1;
            }
            'I' => {
                nm += 1;
                qi += 1;
            }
            'D' => {
                nm += 1;
                tj += 1;
            }
            _ => {}
        }
    }

    let mut cigar: Vec<(usize, char)> = Vec::new();
    for op in ops {
        match cigar.last_mut() {
            Some((len, last)) if *last == op => *len += 1,
            _ => cigar.push((1, op)),
        }
    }
    Some((score, cigar, nm))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::dna;

    fn mat() -> [i8; 25] {
        fill_scmat(1, 4)
    }

    #[test]
    fn scmat_layout() {
        let m = mat();
        assert_eq!(m[0], 1);
        assert_eq!(m[6], 1);
        assert_eq!(m[1], -4);
        for i in 0..5 {
            assert_eq!(m[4 * 5 + i], 0);
            assert_eq!(m[i * 5 + 4], 0);
        }
    }

    #[test]
    fn extend_exact_match() {
        let q = dna::encode_seq(b"ACGTACGTAC");
        let r = extend(&q, &q, &mat(), 6, 1, 100, 10, &mut KswBuffer::new());
        assert_eq!(r.score, 20);
        assert_eq!(r.qle, 10);
        assert_eq!(r.tle, 10);
    }

    #[test]
    fn extend_stops_at_profitable_prefix() {
        // 前 6bp 匹配，其后全错配：延伸应停在第 6 列
        let q = dna::encode_seq(b"ACGTACTTTT");
        let t = dna::encode_seq(b"ACGTACAAAA");
        let r = extend(&q, &t, &mat(), 6, 1, 100, 5, &mut KswBuffer::new());
        assert_eq!(r.score, 11);
        assert_eq!(r.qle, 6);
        assert_eq!(r.tle, 6);
    }

    #[test]
    fn extend_empty_inputs_return_initial() {
        let q = dna::encode_seq(b"ACGT");
        let r = extend(&q, &[], &mat(), 6, 1, 100, 7, &mut KswBuffer::new());
        assert_eq!(r, ExtendResult { score: 7, qle: 0, tle: 0 });
        let r = extend(&[], &q, &mat(), 6, 1, 100, 7, &mut KswBuffer::new());
        assert_eq!(r.score, 7);
    }

    #[test]
    fn extend_crosses_single_mismatch() {
        // 错配后仍有足够匹配收益，延伸应穿过错配
        let q = dna::encode_seq(b"AAAATAAAAAAA");
        let t = dna::encode_seq(b"AAAACAAAAAAA");
        let r = extend(&q, &t, &mat(), 6, 1, 100, 4, &mut KswBuffer::new());
        assert_eq!(r.score, 4 + 11 - 4);
        assert_eq!(r.qle, 12);
    }

    #[test]
    fn global_exact_match() {
        let q = dna::encode_seq(b"ACGT");
        let (score, cigar, nm) = global(&q, &q, &mat(), 6, 1, 8).unwrap();
        assert_eq!(score, 4);
        assert_eq!(cigar, vec![(4, 'M')]);
        assert_eq!(nm, 0);
    }

    #[test]
    fn global_single_mismatch() {
        let q = dna::encode_seq(b"AGGT");
        let t = dna::encode_seq(b"ACGT");
        let (score, cigar, nm) = global(&q, &t, &mat(), 6, 1, 8).unwrap();
        assert_eq!(score, 3 - 4);
        assert_eq!(cigar, vec![(4, 'M')]);
        assert_eq!(nm, 1);
    }

    #[test]
    fn global_single_insertion() {
        let q = dna::encode_seq(b"ACGGT");
        let t = dna::encode_seq(b"ACGT");
        let (score, cigar, nm) = global(&q, &t, &mat(), 6, 1, 8).unwrap();
        assert_eq!(score, 4 - 6);
        assert_eq!(cigar, vec![(2, 'M'), (1, 'I'), (2, 'M')]);
        assert_eq!(nm, 1);
    }

    #[test]
    fn global_single_deletion() {
        let q = dna::encode_seq(b"ACGT");
        let t = dna::encode_seq(b"ACGGT");
        let (score, cigar, nm) = global(&q, &t, &mat(), 6, 1, 8).unwrap();
        assert_eq!(score, 4 - 6);
        assert_eq!(cigar, vec![(2, 'M'), (1, 'D'), (2, 'M')]);
        assert_eq!(nm, 1);
    }

    #[test]
    fn global_band_too_narrow() {
        let q = dna::encode_seq(b"ACGTACGT");
        let t = dna::encode_seq(b"AC");
        assert!(global(&q, &t, &mat(), 6, 1, 1).is_none());
    }

    #[test]
    fn global_gap_cost_model() {
        // 长度 3 的缺失：q + 2r = 8
        let q = dna::encode_seq(b"AAAATTTT");
        let t = dna::encode_seq(b"AAAACGCTTTT");
        let (score, cigar, _) = global(&q, &t, &mat(), 6, 1, 16).unwrap();
        assert_eq!(score, 8 - 6 - 2);
        assert_eq!(cigar, vec![(4, 'M'), (3, 'D'), (4, 'M')]);
    }
}
