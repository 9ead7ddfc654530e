use anyhow::Result;
use clap::{Parser, Subcommand};
use log::info;

mod align;
mod index;
mod io;
mod util;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[command(name = "bwamem-rust", author, version, about = "BWA-MEM style short-read aligner in Rust", arg_required_else_help = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build the FMD index from a reference FASTA
    Index {
        /// Reference FASTA file
        reference: String,
        /// Output prefix for the index file
        #[arg(short, long, default_value = "ref")]
        output: String,
    },
    /// Align reads (FASTQ) against a prebuilt index
    Align {
        /// Path to the index (.fm)
        #[arg(short = 'i', long = "index")]
        index: String,
        /// Reads FASTQ file (interleaved pairs with --paired)
        reads: String,
        /// Output SAM path (stdout if omitted)
        #[arg(short, long)]
        out: Option<String>,
        #[arg(long = "match", default_value_t = 1)]
        match_score: i32,
        #[arg(long = "mismatch", default_value_t = 4)]
        mismatch_penalty: i32,
        #[arg(long = "gap-open", default_value_t = 6)]
        gap_open: i32,
        #[arg(long = "gap-ext", default_value_t = 1)]
        gap_extend: i32,
        #[arg(long = "band-width", default_value_t = 100)]
        band_width: i32,
        #[arg(long = "min-seed-len", default_value_t = 19)]
        min_seed_len: i32,
        #[arg(long = "max-seed-len", default_value_t = 32)]
        max_seed_len: i32,
        #[arg(long = "min-intv", default_value_t = 10)]
        min_intv: u64,
        #[arg(long = "max-occ", default_value_t = 10_000)]
        max_occ: u64,
        #[arg(long = "max-chain-gap", default_value_t = 10_000)]
        max_chain_gap: i32,
        #[arg(long = "mask-level", default_value_t = 0.50)]
        mask_level: f32,
        #[arg(long = "chain-drop-ratio", default_value_t = 0.50)]
        chain_drop_ratio: f32,
        #[arg(long = "split-factor", default_value_t = 1.5)]
        split_factor: f32,
        #[arg(long = "pen-unpaired", default_value_t = 9)]
        pen_unpaired: i32,
        #[arg(short = 't', long = "threads", default_value_t = 1)]
        threads: usize,
        #[arg(long = "chunk-size", default_value_t = 10_000_000)]
        chunk_size: usize,
        /// Treat input as interleaved paired-end reads
        #[arg(short = 'p', long = "paired", default_value_t = false)]
        paired: bool,
        /// Emit hard clips instead of soft clips
        #[arg(long = "hard-clip", default_value_t = false)]
        hard_clip: bool,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Index { reference, output } => run_index(&reference, &output),
        Commands::Align {
            index,
            reads,
            out,
            match_score,
            mismatch_penalty,
            gap_open,
            gap_extend,
            band_width,
            min_seed_len,
            max_seed_len,
            min_intv,
            max_occ,
            max_chain_gap,
            mask_level,
            chain_drop_ratio,
            split_factor,
            pen_unpaired,
            threads,
            chunk_size,
            paired,
            hard_clip,
        } => {
            let mut flag = 0u32;
            if paired {
                flag |= align::MEM_F_PE;
            }
            if hard_clip {
                flag |= align::MEM_F_HARDCLIP;
            }
            let opt = align::MemOpt {
                a: match_score,
                b: mismatch_penalty,
                q: gap_open,
                r: gap_extend,
                w: band_width,
                min_seed_len,
                max_seed_len,
                min_intv,
                max_occ,
                max_chain_gap,
                mask_level,
                chain_drop_ratio,
                split_factor,
                pen_unpaired,
                n_threads: threads,
                flag,
                chunk_size,
            };
            align::align_fastq_with_opt(&index, &reads, out.as_deref(), opt)
        }
    }
}

fn run_index(reference: &str, output: &str) -> Result<()> {
    let fh = std::fs::File::open(reference)
        .map_err(|e| anyhow::anyhow!("cannot open reference FASTA '{}': {}", reference, e))?;
    let mut reader = io::fasta::FastaReader::new(std::io::BufReader::new(fh));

    let mut records = Vec::new();
    while let Some(rec) = reader.next_record()? {
        records.push(rec);
    }
    if records.is_empty() {
        anyhow::bail!("FASTA file '{}' contains no sequences", reference);
    }
    let total_len: usize = records.iter().map(io::SeqRecord::len).sum();
    if total_len == 0 {
        anyhow::bail!("FASTA file '{}' contains only empty sequences", reference);
    }
    info!(
        "reference: {} ({} sequences, {} bp)",
        reference,
        records.len(),
        total_len
    );

    let mut idx = index::MemIndex::from_records(&records, index::DEFAULT_OCC_BLOCK)?;
    idx.set_meta(index::IndexMeta {
        reference_file: Some(reference.to_string()),
        build_args: Some(std::env::args().collect::<Vec<_>>().join(" ")),
        build_timestamp: Some(chrono::Utc::now().to_rfc3339()),
    });

    let out_path = format!("{}.fm", output);
    idx.save_to_file(&out_path)
        .map_err(|e| anyhow::anyhow!("cannot write index to '{}': {}", out_path, e))?;
    info!("FMD index saved: {}", out_path);
    Ok(())
}
