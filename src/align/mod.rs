pub mod chain;
pub mod extend;
pub mod ksw;
pub mod pairing;
pub mod sam;
pub mod smem;

use anyhow::Result;
use std::io::Write;

use log::{debug, info};
use rayon::prelude::*;

use crate::index::MemIndex;
use crate::io::fastq::FastqReader;
use crate::io::SeqRecord;
use crate::util::dna;

pub use chain::{build_chains, chain_weight, filter_chains, MemChain, MemSeed};
pub use extend::{approx_mapq, cal_max_gap, extend_chain, mark_primary, sort_and_dedup, AlnReg};
pub use ksw::{fill_scmat, KswBuffer};
pub use sam::{aln2sam, gen_cigar, reg2aln, MemAln};
pub use smem::SmemIterator;

/// 配对端模式
pub const MEM_F_PE: u32 = 0x1;
/// 端部剪切输出为硬剪切
pub const MEM_F_HARDCLIP: u32 = 0x2;

/// 流水线全部参数；单结构体贯穿各阶段。
#[derive(Clone, Copy, Debug)]
pub struct MemOpt {
    /// 匹配得分
    pub a: i32,
    /// 错配罚分
    pub b: i32,
    /// 间隙开启罚分（计入首个间隙碱基）
    pub q: i32,
    /// 间隙延伸罚分
    pub r: i32,
    /// 延伸带宽，亦为链对角漂移上限
    pub w: i32,
    pub min_seed_len: i32,
    /// 传给 SMEM 迭代器的匹配长度上限
    pub max_seed_len: i32,
    /// SA 区间大小下限
    pub min_intv: u64,
    /// 超过此出现次数的 SMEM 被跳过
    pub max_occ: u64,
    pub max_chain_gap: i32,
    /// 显著重叠的判定比例
    pub mask_level: f32,
    pub chain_drop_ratio: f32,
    /// 预留：自适应重播种
    pub split_factor: f32,
    pub n_threads: usize,
    pub flag: u32,
    /// 单批碱基数
    pub chunk_size: usize,
    /// 配对端：未配对的罚分
    pub pen_unpaired: i32,
}

impl Default for MemOpt {
    fn default() -> Self {
        Self {
            a: 1,
            b: 4,
            q: 6,
            r: 1,
            w: 100,
            min_seed_len: 19,
            max_seed_len: 32,
            min_intv: 10,
            max_occ: 10_000,
            max_chain_gap: 10_000,
            mask_level: 0.50,
            chain_drop_ratio: 0.50,
            split_factor: 1.5,
            n_threads: 1,
            flag: 0,
            chunk_size: 10_000_000,
            pen_unpaired: 9,
        }
    }
}

impl MemOpt {
    pub fn scmat(&self) -> [i8; 25] {
        fill_scmat(self.a, self.b)
    }
}

/// 第一趟单读段流水线：SMEM -> 链 -> 过滤 -> 延伸 -> 去重 -> 主次标记。
pub fn align_read_regions(
    opt: &MemOpt,
    mat: &[i8; 25],
    idx: &MemIndex,
    itr: &mut SmemIterator,
    codes: &[u8],
    buf: &mut KswBuffer,
) -> Vec<AlnReg> {
    if (codes.len() as i32) < opt.min_seed_len {
        return Vec::new();
    }
    itr.set_query(codes);
    let chains = filter_chains(opt, build_chains(opt, &idx.fm, itr));
    let mut regs: Vec<AlnReg> = Vec::new();
    for c in &chains {
        extend_chain(opt, mat, &idx.refseq, codes, c, buf, &mut regs);
    }
    sort_and_dedup(&mut regs);
    mark_primary(opt, &mut regs);
    debug!(
        "{} chain(s) -> {} region(s) for {}bp read",
        chains.len(),
        regs.len(),
        codes.len()
    );
    regs
}

/// 第二趟：每个存活区域生成 CIGAR 与 MAPQ；失败的区域静默丢弃。
pub fn regs_to_alns(
    opt: &MemOpt,
    mat: &[i8; 25],
    idx: &MemIndex,
    codes: &[u8],
    regs: &[AlnReg],
) -> Vec<MemAln> {
    let mut alns = Vec::new();
    for reg in regs {
        let mut h = reg2aln(opt, mat, &idx.refseq, codes, reg);
        if !h.is_mapped() {
            continue;
        }
        if reg.secondary >= 0 {
            h.flag |= sam::SAM_F_SECONDARY;
            h.mapq = 0;
        } else {
            h.mapq = approx_mapq(opt, reg);
        }
        alns.push(h);
    }
    alns
}

fn emit_read_sam(
    opt: &MemOpt,
    idx: &MemIndex,
    rec: &SeqRecord,
    alns: &[MemAln],
    mate: Option<&MemAln>,
    extra_flag: u16,
    out: &mut String,
) {
    if alns.is_empty() {
        aln2sam(opt, &idx.refseq, rec, &MemAln::unmapped(), mate, extra_flag, out);
    } else {
        for a in alns {
            aln2sam(opt, &idx.refseq, rec, a, mate, extra_flag, out);
        }
    }
}

fn primary_of(alns: &[MemAln]) -> MemAln {
    alns.iter()
        .find(|a| a.flag & sam::SAM_F_SECONDARY == 0)
        .cloned()
        .unwrap_or_else(MemAln::unmapped)
}

/// 对一批读段跑完整的两趟流水线，按输入序返回各读段的 SAM 文本。
///
/// 第一趟并行产出区域向量；配对端模式下在两趟之间调用插入片段
/// 统计协作者；第二趟并行格式化，配对的两条读段始终同组处理。
pub fn process_batch(opt: &MemOpt, idx: &MemIndex, batch: &[SeqRecord]) -> Vec<String> {
    let mat = opt.scmat();

    let all_regs: Vec<Vec<AlnReg>> = batch
        .par_iter()
        .map_init(
            || (SmemIterator::new(&idx.fm), KswBuffer::new()),
            |(itr, buf), rec| {
                let codes = dna::encode_seq(&rec.seq);
                align_read_regions(opt, &mat, idx, itr, &codes, buf)
            },
        )
        .collect();

    if opt.flag & MEM_F_PE != 0 {
        let _pes = pairing::infer_insert_sizes(opt, idx.refseq.l_pac, &all_regs);
        batch
            .par_chunks(2)
            .zip(all_regs.par_chunks(2))
            .map(|(recs, regs)| {
                let alns: Vec<Vec<MemAln>> = recs
                    .iter()
                    .zip(regs)
                    .map(|(rec, rg)| {
                        let codes = dna::encode_seq(&rec.seq);
                        regs_to_alns(opt, &mat, idx, &codes, rg)
                    })
                    .collect();
                let mut out = String::new();
                for (i, rec) in recs.iter().enumerate() {
                    if recs.len() == 2 {
                        let mate = primary_of(&alns[1 - i]);
                        let extra = if i == 0 {
                            sam::SAM_F_READ1
                        } else {
                            sam::SAM_F_READ2
                        };
                        emit_read_sam(opt, idx, rec, &alns[i], Some(&mate), extra, &mut out);
                    } else {
                        emit_read_sam(opt, idx, rec, &alns[i], None, 0, &mut out);
                    }
                }
                out
            })
            .collect()
    } else {
        batch
            .par_iter()
            .zip(all_regs.par_iter())
            .map(|(rec, regs)| {
                let codes = dna::encode_seq(&rec.seq);
                let alns = regs_to_alns(opt, &mat, idx, &codes, regs);
                let mut out = String::new();
                emit_read_sam(opt, idx, rec, &alns, None, 0, &mut out);
                out
            })
            .collect()
    }
}

/// 读取 FASTQ 并按批比对，SAM 写入 `out_path`（缺省为标准输出）。
pub fn align_fastq_with_opt(
    index_path: &str,
    fastq_path: &str,
    out_path: Option<&str>,
    opt: MemOpt,
) -> Result<()> {
    info!("loading index from {}", index_path);
    let idx = MemIndex::load_from_file(index_path)?;

    let fq = std::fs::File::open(fastq_path)?;
    let mut reader = FastqReader::new(std::io::BufReader::new(fq));

    let mut out: Box<dyn Write> = match out_path {
        Some(p) => Box::new(std::io::BufWriter::new(std::fs::File::create(p)?)),
        None => Box::new(std::io::BufWriter::new(std::io::stdout())),
    };

    // SAM header
    writeln!(out, "@HD\tVN:1.6\tSO:unsorted")?;
    for c in &idx.refseq.contigs {
        writeln!(out, "@SQ\tSN:{}\tLN:{}", c.name, c.len)?;
    }
    writeln!(
        out,
        "@PG\tID:bwamem-rust\tPN:bwamem-rust\tVN:{}",
        env!("CARGO_PKG_VERSION")
    )?;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(opt.n_threads)
        .build()
        .unwrap_or_else(|_| rayon::ThreadPoolBuilder::new().build().unwrap());

    // 配对端模式下保证批内读段成对
    let step = if opt.flag & MEM_F_PE != 0 { 2 } else { 1 };
    let mut n_done = 0usize;
    let mut eof = false;
    while !eof {
        let mut batch: Vec<SeqRecord> = Vec::new();
        let mut bases = 0usize;
        loop {
            match reader.next_record()? {
                Some(rec) => {
                    bases += rec.len();
                    batch.push(rec);
                }
                None => {
                    eof = true;
                    break;
                }
            }
            if bases >= opt.chunk_size && batch.len() % step == 0 {
                break;
            }
        }
        if batch.is_empty() {
            break;
        }
        info!("processing {} reads ({} bp)", batch.len(), bases);
        let lines = pool.install(|| process_batch(&opt, &idx, &batch));
        for l in &lines {
            out.write_all(l.as_bytes())?;
        }
        n_done += batch.len();
    }
    info!("done, {} reads aligned", n_done);
    Ok(())
}
