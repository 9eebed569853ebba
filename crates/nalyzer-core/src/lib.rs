//! # nalyzer-core
//!
//! nalyzer 码流分析核心库, 提供比特级读取、Exp-Golomb 解码、
//! RBSP 转换以及统一错误类型.

pub mod bitreader;
pub mod bitwriter;
pub mod error;
pub mod rational;
pub mod rbsp;

// 重导出常用类型
pub use bitreader::BitReader;
pub use bitwriter::BitWriter;
pub use error::{NalError, NalResult};
pub use rational::Rational;
pub use rbsp::{Rbsp, remove_emulation_prevention};
