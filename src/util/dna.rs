//! DNA 碱基编码工具。
//!
//! 读段与参考序列统一编码为 2-bit 数值：{0:A, 1:C, 2:G, 3:T}，4 表示
//! 模糊碱基（N 及其他 IUPAC 符号）。互补运算在编码域内即 `3 - code`。

/// 模糊碱基编码
pub const AMBIG: u8 = 4;

#[inline]
pub fn encode_base(b: u8) -> u8 {
    match b.to_ascii_uppercase() {
        b'A' => 0,
        b'C' => 1,
        b'G' => 2,
        b'T' | b'U' => 3,
        _ => AMBIG,
    }
}

#[inline]
pub fn decode_base(code: u8) -> u8 {
    match code {
        0 => b'A',
        1 => b'C',
        2 => b'G',
        3 => b'T',
        _ => b'N',
    }
}

/// 将 ASCII 序列编码为数值序列
pub fn encode_seq(seq: &[u8]) -> Vec<u8> {
    seq.iter().map(|&b| encode_base(b)).collect()
}

/// 编码域内互补：A<->T, C<->G，模糊碱基保持不变
#[inline]
pub fn comp_code(code: u8) -> u8 {
    if code < 4 {
        3 - code
    } else {
        AMBIG
    }
}

#[inline]
pub fn complement(base: u8) -> u8 {
    match base.to_ascii_uppercase() {
        b'A' => b'T',
        b'C' => b'G',
        b'G' => b'C',
        b'T' | b'U' => b'A',
        _ => b'N',
    }
}

pub fn revcomp(seq: &[u8]) -> Vec<u8> {
    seq.iter().rev().map(|&b| complement(b)).collect()
}
