//! 语法元素的取值与描述符.

use std::fmt;

use bytes::Bytes;

/// 解码后的语法元素取值
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// 无符号整数: u(n), ue(v)
    Unsigned(u64),
    /// 有符号整数: se(v)
    Signed(i64),
    /// 1 位标志
    Flag(bool),
    /// 未解析的原始数据 (扩展数据, 不支持的载荷)
    Bytes(Bytes),
}

impl FieldValue {
    /// 按无符号整数读取 (标志视为 0/1)
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Unsigned(v) => Some(*v),
            Self::Flag(f) => Some(u64::from(*f)),
            Self::Signed(v) => u64::try_from(*v).ok(),
            Self::Bytes(_) => None,
        }
    }

    /// 按有符号整数读取
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Signed(v) => Some(*v),
            Self::Unsigned(v) => i64::try_from(*v).ok(),
            Self::Flag(f) => Some(i64::from(*f)),
            Self::Bytes(_) => None,
        }
    }

    /// 按标志读取
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Flag(f) => Some(*f),
            Self::Unsigned(v) => Some(*v != 0),
            _ => None,
        }
    }

    /// 按原始数据读取
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Self::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unsigned(v) => write!(f, "{v}"),
            Self::Signed(v) => write!(f, "{v}"),
            Self::Flag(v) => write!(f, "{}", u8::from(*v)),
            Self::Bytes(b) => {
                const PREVIEW: usize = 16;
                for (i, byte) in b.iter().take(PREVIEW).enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{byte:02X}")?;
                }
                if b.len() > PREVIEW {
                    write!(f, " ...")?;
                }
                write!(f, " ({} 字节)", b.len())
            }
        }
    }
}

/// 语法描述符, 与标准语法表中的 Descriptor 列对应
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Descriptor {
    /// u(n): n 位无符号整数
    U(u32),
    /// f(n): n 位固定模式
    F(u32),
    /// ue(v): 无符号 Exp-Golomb
    Ue,
    /// se(v): 有符号 Exp-Golomb
    Se,
    /// 未解析的原始位串
    Opaque,
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::U(n) => write!(f, "u({n})"),
            Self::F(n) => write!(f, "f({n})"),
            Self::Ue => f.write_str("ue(v)"),
            Self::Se => f.write_str("se(v)"),
            Self::Opaque => f.write_str("b(v)"),
        }
    }
}
