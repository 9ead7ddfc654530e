//! 后缀数组构建（倍增法，O(n log n) 排序）。

/// 输入为数值化文本（0 为哨兵，1..=4 为碱基），返回后缀数组。
/// 文本末尾应恰有一个哨兵；中间不再出现 0。
pub fn build_sa(text: &[u8]) -> Vec<u64> {
    let n = text.len();
    if n == 0 {
        return Vec::new();
    }

    let mut sa: Vec<usize> = (0..n).collect();
    let mut rank: Vec<u64> = text.iter().map(|&b| u64::from(b)).collect();
    let mut next_rank: Vec<u64> = vec![0; n];

    let mut k = 1usize;
    while k < n {
        // (rank[i], rank[i+k]+1) 作为排序键，越界记 0（比任何实际名次小）
        let key = |i: usize| {
            let hi = rank[i];
            let lo = if i + k < n { rank[i + k] + 1 } else { 0 };
            (hi, lo)
        };

        sa.sort_unstable_by_key(|&i| key(i));

        next_rank[sa[0]] = 0;
        for t in 1..n {
            let (a, b) = (sa[t - 1], sa[t]);
            next_rank[b] = next_rank[a] + u64::from(key(a) != key(b));
        }

        rank.copy_from_slice(&next_rank);
        if rank[sa[n - 1]] as usize == n - 1 {
            break;
        }
        k <<= 1;
    }

    sa.into_iter().map(|i| i as u64).collect()
}
