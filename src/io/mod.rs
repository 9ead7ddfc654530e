pub mod fasta;
pub mod fastq;

/// 统一的序列记录：FASTA 记录无质量值（`qual = None`），FASTQ 记录有。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeqRecord {
    pub name: String,
    pub comment: Option<String>,
    pub seq: Vec<u8>,
    pub qual: Option<Vec<u8>>,
}

impl SeqRecord {
    pub fn len(&self) -> usize {
        self.seq.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seq.is_empty()
    }
}

/// 拆分 FASTA/FASTQ 头部行为 (name, comment)
fn split_header(header: &str) -> (String, Option<String>) {
    let mut parts = header.splitn(2, char::is_whitespace);
    let name = parts.next().unwrap_or("").to_string();
    let comment = parts
        .next()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    (name, comment)
}
