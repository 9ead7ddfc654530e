//! SMEM 迭代器：按游标推进，惰性产出覆盖各查询位置的超级最大精确匹配。

use crate::index::fm::{BiInterval, FmIndex, SmemScratch};

/// 每次 [`next_batch`](SmemIterator::next_batch) 调用推进一次游标，
/// 返回该锚点处发现的全部 SMEM 区间（可能为空批，迭代继续）。
/// 游标处的模糊碱基被跳过。内部缓冲跨读段复用。
pub struct SmemIterator<'i> {
    fm: &'i FmIndex,
    query: Vec<u8>,
    cursor: usize,
    mems: Vec<BiInterval>,
    scratch: SmemScratch,
}

impl<'i> SmemIterator<'i> {
    pub fn new(fm: &'i FmIndex) -> Self {
        Self {
            fm,
            query: Vec::new(),
            cursor: 0,
            mems: Vec::new(),
            scratch: SmemScratch::default(),
        }
    }

    /// 绑定新的查询序列（编码 0..=3，4 为模糊碱基），游标复位
    pub fn set_query(&mut self, seq: &[u8]) {
        self.query.clear();
        self.query.extend_from_slice(seq);
        self.cursor = 0;
    }

    /// 推进游标并返回新发现的区间批；查询耗尽时返回 `None`。
    pub fn next_batch(&mut self, max_len: usize, min_intv: u64) -> Option<&[BiInterval]> {
        if self.cursor >= self.query.len() {
            return None;
        }
        if self.query[self.cursor] > 3 {
            self.cursor += 1;
            self.mems.clear();
            return Some(&self.mems);
        }
        self.cursor = self.fm.smem1(
            &self.query,
            self.cursor,
            min_intv,
            max_len,
            &mut self.mems,
            &mut self.scratch,
        );
        Some(&self.mems)
    }
}
