//! # bwamem-rust
//!
//! BWA-MEM 风格的 Rust 版短读段比对器。
//!
//! 本 crate 实现了基于 FMD 索引的核心比对流水线：
//!
//! - **索引构建**：从 FASTA 参考序列构建 2-bit 压缩参考与 FMD 索引
//!   （正链 + 反向互补共用一个 BWT，天然支持双链搜索）
//! - **SMEM 播种**：游标式超级最大精确匹配迭代器
//! - **链构建与过滤**：有序映射上的前驱查询 + 覆盖权重筛选
//! - **带状延伸**：种子两侧仿射间隙延伸得到局部比对区域
//! - **输出**：区域去重与主次标记、全局重比对产出 CIGAR、
//!   近似 MAPQ 与 SAM 记录格式化
//!
//! ## 快速示例
//!
//! ```rust,no_run
//! use bwamem_rust::align::{process_batch, MemOpt};
//! use bwamem_rust::index::MemIndex;
//! use bwamem_rust::io::SeqRecord;
//!
//! let reference = SeqRecord {
//!     name: "chr1".to_string(),
//!     comment: None,
//!     seq: b"ACGTACGTAGCTGATCGTAGCTAGCTAGCTGATCGTAG".to_vec(),
//!     qual: None,
//! };
//! let idx = MemIndex::from_records(&[reference], 512).unwrap();
//!
//! let read = SeqRecord {
//!     name: "r1".to_string(),
//!     comment: None,
//!     seq: b"GCTGATCGTAGCTAGCTAGC".to_vec(),
//!     qual: None,
//! };
//! let opt = MemOpt { min_seed_len: 10, min_intv: 1, ..MemOpt::default() };
//! for sam in process_batch(&opt, &idx, &[read]) {
//!     print!("{}", sam);
//! }
//! ```
//!
//! ## 模块说明
//!
//! - [`io`] — FASTA / FASTQ 文件解析
//! - [`index`] — 压缩参考与 FMD 索引构建
//! - [`align`] — 比对流水线（SMEM、链、延伸、CIGAR、SAM）
//! - [`util`] — DNA 编码 / 反向互补等工具函数

pub mod align;
pub mod index;
pub mod io;
pub mod util;
