use anyhow::{anyhow, Result};
use std::io::BufRead;

use super::{split_header, SeqRecord};

/// 逐条读取四行制 FASTQ 记录（不支持折行序列）。
pub struct FastqReader<R: BufRead> {
    reader: R,
    buf: String,
    done: bool,
}

impl<R: BufRead> FastqReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: String::new(),
            done: false,
        }
    }

    fn read_line(&mut self) -> Result<bool> {
        self.buf.clear();
        Ok(self.reader.read_line(&mut self.buf)? != 0)
    }

    pub fn next_record(&mut self) -> Result<Option<SeqRecord>> {
        if self.done {
            return Ok(None);
        }

        // 头部行，以 '@' 开始
        if !self.read_line()? {
            self.done = true;
            return Ok(None);
        }
        let header = self
            .buf
            .strip_prefix('@')
            .ok_or_else(|| anyhow!("FASTQ header not starting with '@'"))?
            .trim_end()
            .to_string();
        let (name, comment) = split_header(&header);

        // 序列行
        if !self.read_line()? {
            return Err(anyhow!("unexpected EOF after header of '{}'", name));
        }
        let seq = self.buf.trim_end().as_bytes().to_vec();

        // '+' 分隔行
        if !self.read_line()? || !self.buf.starts_with('+') {
            return Err(anyhow!("missing '+' line in record '{}'", name));
        }

        // 质量行
        if !self.read_line()? {
            return Err(anyhow!("missing quality line in record '{}'", name));
        }
        let qual = self.buf.trim_end().as_bytes().to_vec();
        if qual.len() != seq.len() {
            return Err(anyhow!("seq/qual length mismatch in record '{}'", name));
        }

        Ok(Some(SeqRecord {
            name,
            comment,
            seq,
            qual: Some(qual),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parse_simple_fastq() {
        let data = b"@r1 pair/1\nACGT\n+\nIIII\n@r2\nTTGA\n+r2\nJJJJ\n";
        let mut r = FastqReader::new(Cursor::new(&data[..]));

        let r1 = r.next_record().unwrap().unwrap();
        assert_eq!(r1.name, "r1");
        assert_eq!(r1.comment.as_deref(), Some("pair/1"));
        assert_eq!(r1.seq, b"ACGT");
        assert_eq!(r1.qual.as_deref(), Some(&b"IIII"[..]));

        let r2 = r.next_record().unwrap().unwrap();
        assert_eq!(r2.name, "r2");
        assert_eq!(r2.qual.as_deref(), Some(&b"JJJJ"[..]));

        assert!(r.next_record().unwrap().is_none());
    }

    #[test]
    fn reject_bad_header() {
        let data = b"r1\nACGT\n+\nIIII\n";
        let mut r = FastqReader::new(Cursor::new(&data[..]));
        assert!(r.next_record().is_err());
    }

    #[test]
    fn reject_length_mismatch() {
        let data = b"@r1\nACGT\n+\nIII\n";
        let mut r = FastqReader::new(Cursor::new(&data[..]));
        assert!(r.next_record().is_err());
    }
}
