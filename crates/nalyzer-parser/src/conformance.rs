//! 一致性警告.
//!
//! 分析工具需要处理任意 (可能不合规) 的码流, 因此保留字段取值不符、
//! 停止位错误等问题只记录为警告, 解析继续进行.

use std::fmt;

/// 警告等级
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// 提示: 码流合法, 但分析器未展开其内容
    Info,
    /// 警告: 码流违反标准约束
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => f.write_str("提示"),
            Self::Warning => f.write_str("警告"),
        }
    }
}

/// 一致性问题种类
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConformanceIssue {
    /// 保留字段或固定模式字段不等于标准规定的值
    ReservedFieldMismatch { expected: u64, actual: u64 },
    /// rbsp_stop_one_bit 不为 1, 或对齐位不为 0
    InvalidTrailingBit { actual: u64 },
    /// 扩展标志置位, 但扩展数据未被解析
    UnsupportedExtension { bits: usize },
    /// 字段取值超出语义范围
    ValueOutOfRange { value: i64, min: i64, max: i64 },
    /// 引用的参数集尚未出现
    MissingReference { id: u64 },
}

impl ConformanceIssue {
    /// 警告等级
    pub fn severity(&self) -> Severity {
        match self {
            Self::UnsupportedExtension { .. } => Severity::Info,
            _ => Severity::Warning,
        }
    }

    /// 问题种类名称
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ReservedFieldMismatch { .. } => "ReservedFieldMismatch",
            Self::InvalidTrailingBit { .. } => "InvalidTrailingBit",
            Self::UnsupportedExtension { .. } => "UnsupportedExtension",
            Self::ValueOutOfRange { .. } => "ValueOutOfRange",
            Self::MissingReference { .. } => "MissingReference",
        }
    }
}

impl fmt::Display for ConformanceIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReservedFieldMismatch { expected, actual } => {
                write!(f, "保留字段取值 {actual}, 应为 {expected}")
            }
            Self::InvalidTrailingBit { actual } => {
                write!(f, "尾部比特取值 {actual:#b} 不合法")
            }
            Self::UnsupportedExtension { bits } => {
                write!(f, "未解析的扩展数据 {bits} 位")
            }
            Self::ValueOutOfRange { value, min, max } => {
                write!(f, "取值 {value} 超出范围 [{min}, {max}]")
            }
            Self::MissingReference { id } => {
                write!(f, "引用的参数集 id={id} 不存在")
            }
        }
    }
}

/// 附着在某个字段上的一致性警告
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConformanceWarning {
    /// 相关字段名称
    pub field: String,
    pub issue: ConformanceIssue,
    /// 相关字段在字段日志中的下标
    pub log_index: Option<usize>,
}

impl ConformanceWarning {
    pub fn severity(&self) -> Severity {
        self.issue.severity()
    }
}

impl fmt::Display for ConformanceWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity(), self.field, self.issue)
    }
}
