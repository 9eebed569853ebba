//! NAL 单元载荷与 RBSP 之间的转换.
//!
//! 编码器在 NAL 载荷中每遇到 `00 00 0x` (x <= 3) 就插入一个
//! emulation_prevention_three_byte (0x03). 解析语法前需要先将其移除.

use std::borrow::Cow;

/// 移除 emulation prevention 字节后的 RBSP
#[derive(Debug, Clone)]
pub struct Rbsp<'a> {
    /// RBSP 数据 (无需移除时直接借用输入)
    pub data: Cow<'a, [u8]>,
    /// 被移除的 0x03 字节数
    pub removed: usize,
}

/// 移除 emulation prevention 字节 (`00 00 03` 中的 `03`)
///
/// 输入中不存在转义时不分配内存.
pub fn remove_emulation_prevention(data: &[u8]) -> Rbsp<'_> {
    let Some(first) = find_escape(data) else {
        return Rbsp {
            data: Cow::Borrowed(data),
            removed: 0,
        };
    };

    let mut out = Vec::with_capacity(data.len());
    out.extend_from_slice(&data[..first]);
    let mut removed = 1;
    let mut zeros = 0usize;
    for &byte in &data[first + 1..] {
        if zeros >= 2 && byte == 0x03 {
            removed += 1;
            zeros = 0;
            continue;
        }
        zeros = if byte == 0 { zeros + 1 } else { 0 };
        out.push(byte);
    }

    Rbsp {
        data: Cow::Owned(out),
        removed,
    }
}

/// 查找第一个 emulation prevention 字节的位置
fn find_escape(data: &[u8]) -> Option<usize> {
    let mut zeros = 0usize;
    for (i, &byte) in data.iter().enumerate() {
        if zeros >= 2 && byte == 0x03 {
            return Some(i);
        }
        zeros = if byte == 0 { zeros + 1 } else { 0 };
    }
    None
}
