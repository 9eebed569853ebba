//! NAL 单元分帧.
//!
//! # Annex B 格式
//!
//! 使用起始码分隔 NAL 单元:
//! - 3 字节起始码: `00 00 01`
//! - 4 字节起始码: `00 00 00 01`
//!
//! # 长度前缀格式
//!
//! MP4 (avcC / hvcC / vvcC) 中使用 1~4 字节大端长度前缀:
//! ```text
//! [length: N bytes BE] [NAL data: length bytes]
//! ```

use log::warn;
use nalyzer_core::{NalError, NalResult};

/// 从字节流中切出的单个 NAL 单元 (借用输入, 不含起始码或长度前缀)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NalChunk<'a> {
    /// NAL 数据在输入中的字节偏移
    pub offset: usize,
    pub data: &'a [u8],
}

/// 从 Annex B 字节流中分割出所有 NAL 单元
///
/// 起始码之前的数据被丢弃, 每个单元末尾的 0 字节 (trailing_zero_8bits) 被去除.
pub fn split_annex_b(data: &[u8]) -> Vec<NalChunk<'_>> {
    let offsets = find_start_codes(data);
    let mut units = Vec::with_capacity(offsets.len());

    for (i, &start) in offsets.iter().enumerate() {
        let end = offsets.get(i + 1).copied().unwrap_or(data.len());
        let nal_start = skip_start_code(data, start);
        if nal_start >= end {
            continue;
        }

        let mut nal_end = end;
        while nal_end > nal_start && data[nal_end - 1] == 0x00 {
            nal_end -= 1;
        }
        if nal_end > nal_start {
            units.push(NalChunk {
                offset: nal_start,
                data: &data[nal_start..nal_end],
            });
        }
    }

    units
}

/// 从长度前缀数据中提取 NAL 单元
///
/// `length_size` 取 1~4 (来自 lengthSizeMinusOne + 1). 末尾不完整的单元被丢弃.
pub fn split_length_prefixed(data: &[u8], length_size: usize) -> NalResult<Vec<NalChunk<'_>>> {
    if !(1..=4).contains(&length_size) {
        return Err(NalError::InvalidArgument(format!(
            "长度前缀字节数必须为 1~4, 实际 {length_size}"
        )));
    }

    let mut units = Vec::new();
    let mut pos = 0;
    while pos + length_size <= data.len() {
        let nal_len = data[pos..pos + length_size]
            .iter()
            .fold(0usize, |acc, &b| (acc << 8) | usize::from(b));
        pos += length_size;

        let Some(end) = pos.checked_add(nal_len).filter(|&end| end <= data.len()) else {
            warn!(
                "长度前缀 NAL 单元不完整: 偏移 {pos}, 声明 {nal_len} 字节, 剩余 {} 字节",
                data.len() - pos
            );
            break;
        };
        if nal_len > 0 {
            units.push(NalChunk {
                offset: pos,
                data: &data[pos..end],
            });
        }
        pos = end;
    }

    Ok(units)
}

/// 查找所有起始码的位置
fn find_start_codes(data: &[u8]) -> Vec<usize> {
    let mut positions = Vec::new();
    let mut i = 0;

    while i + 2 < data.len() {
        if data[i] == 0x00 && data[i + 1] == 0x00 {
            if data[i + 2] == 0x01 {
                positions.push(i);
                i += 3;
                continue;
            } else if i + 3 < data.len() && data[i + 2] == 0x00 && data[i + 3] == 0x01 {
                positions.push(i);
                i += 4;
                continue;
            }
        }
        i += 1;
    }

    positions
}

/// 跳过起始码, 返回 NAL 数据的起始位置
fn skip_start_code(data: &[u8], pos: usize) -> usize {
    if data[pos..].starts_with(&[0x00, 0x00, 0x00, 0x01]) {
        pos + 4
    } else if data[pos..].starts_with(&[0x00, 0x00, 0x01]) {
        pos + 3
    } else {
        pos
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_mixed_start_codes() {
        let data = [
            0x00, 0x00, 0x00, 0x01, 0x67, 0xAA, // 4 字节起始码
            0x00, 0x00, 0x01, 0x68, 0xBB, 0x00, // 3 字节起始码 + trailing zero
            0x00, 0x00, 0x01, 0x65,
        ];
        let units = split_annex_b(&data);
        assert_eq!(units.len(), 3);
        assert_eq!(units[0].data, &[0x67, 0xAA]);
        assert_eq!(units[0].offset, 4);
        assert_eq!(units[1].data, &[0x68, 0xBB]);
        assert_eq!(units[2].data, &[0x65]);
        assert_eq!(units[2].offset, 15);
    }

    #[test]
    fn test_split_without_start_code() {
        assert!(split_annex_b(&[0x67, 0x42, 0x00]).is_empty());
        assert!(split_annex_b(&[]).is_empty());
        // 只有起始码
        assert!(split_annex_b(&[0x00, 0x00, 0x01]).is_empty());
    }

    #[test]
    fn test_split_length_prefixed() {
        let data = [0x00, 0x02, 0x40, 0x01, 0x00, 0x01, 0x46, 0x00, 0x09, 0x01];
        let units = split_length_prefixed(&data, 2).unwrap();
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].data, &[0x40, 0x01]);
        assert_eq!(units[1].data, &[0x46]);
        assert_eq!(units[1].offset, 6);
    }

    #[test]
    fn test_length_prefixed_rejects_bad_size() {
        assert!(split_length_prefixed(&[0x00], 0).is_err());
        assert!(split_length_prefixed(&[0x00], 5).is_err());
    }
}
