pub mod bwt;
pub mod fm;
pub mod pac;
pub mod sa;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::io::SeqRecord;

/// 默认 Occ 采样块大小
pub const DEFAULT_OCC_BLOCK: usize = 512;

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct IndexMeta {
    pub reference_file: Option<String>,
    pub build_args: Option<String>,
    pub build_timestamp: Option<String>,
}

/// 比对所需的全部只读数据：FM 索引 + 压缩参考 + 构建元信息。
/// 批处理期间被所有工作线程共享。
#[derive(Debug, Serialize, Deserialize)]
pub struct MemIndex {
    pub fm: fm::FmIndex,
    pub refseq: pac::PackedRef,
    pub meta: IndexMeta,
}

impl MemIndex {
    /// 由 FASTA 记录构建索引：压缩参考 -> FMD 文本 -> SA -> BWT -> FM。
    pub fn from_records(records: &[SeqRecord], occ_block: usize) -> Result<Self> {
        let refseq = pac::PackedRef::from_records(records)?;
        Ok(Self::from_packed(refseq, occ_block))
    }

    pub fn from_packed(refseq: pac::PackedRef, occ_block: usize) -> Self {
        let text = refseq.fm_text();
        let sa = sa::build_sa(&text);
        let bwt = bwt::build_bwt(&text, &sa);
        Self {
            fm: fm::FmIndex::build(bwt, sa, occ_block),
            refseq,
            meta: IndexMeta::default(),
        }
    }

    pub fn set_meta(&mut self, meta: IndexMeta) {
        self.meta = meta;
    }

    pub fn save_to_file(&self, path: &str) -> Result<()> {
        let mut f = std::fs::File::create(path)?;
        bincode::serialize_into(&mut f, self)?;
        Ok(())
    }

    pub fn load_from_file(path: &str) -> Result<Self> {
        let f = std::fs::File::open(path)?;
        let idx: Self = bincode::deserialize_from(std::io::BufReader::new(f))?;
        Ok(idx)
    }
}
