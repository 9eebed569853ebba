//! 统一错误类型定义.
//!
//! 只包含 "硬失败": 比特读取无法继续时才会产生.
//! 保留字段取值不符等一致性问题不是错误, 由解析层以警告形式记录.

use thiserror::Error;

/// Exp-Golomb 前导零的上限, 超过即视为码字损坏
pub const MAX_GOLOMB_LEADING_ZEROS: u32 = 31;

/// nalyzer 统一错误类型
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NalError {
    /// 剩余数据不足以完成读取
    #[error("数据不足: 需要 {requested} 位, 剩余 {available} 位")]
    OutOfData { requested: usize, available: usize },

    /// Exp-Golomb 码字前导零过长
    #[error("Exp-Golomb 码字异常: 前导零 {leading_zeros} 位")]
    MalformedCode { leading_zeros: u32 },

    /// 无效参数 (调用方违反接口约定)
    #[error("无效参数: {0}")]
    InvalidArgument(String),

    /// 无效数据 (结构上无法继续解析)
    #[error("无效数据: {0}")]
    InvalidData(String),
}

impl NalError {
    /// 是否为数据耗尽
    pub fn is_out_of_data(&self) -> bool {
        matches!(self, Self::OutOfData { .. })
    }
}

/// nalyzer 统一 Result 类型
pub type NalResult<T> = Result<T, NalError>;
