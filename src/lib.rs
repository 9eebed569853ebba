//! # nalyzer
//!
//! 纯 Rust 实现的 H.264/H.265/H.266 NAL 码流语法分析器.
//!
//! 逐字段解析 NAL 单元, 记录每个语法元素的位偏移、描述符、取值与含义,
//! 并对违反标准约束的取值给出一致性警告.
//!
//! # 快速开始
//!
//! ```rust
//! use nalyzer::parser::{NalParser, Standard};
//!
//! let mut parser = NalParser::new(Standard::Vvc);
//! // DCI: 一个 Main 10 PTL
//! let nal = parser.parse_nal(&[0x00, 0x69, 0x00, 0x02, 0x33, 0x80, 0x00, 0x40]);
//! assert!(nal.warnings.is_empty());
//! for entry in nal.log.iter() {
//!     println!("{:>4} {} = {}", entry.bit_offset, entry.name, entry.value);
//! }
//! ```
//!
//! # Crate 结构
//!
//! | Crate | 功能 |
//! |-------|------|
//! | `nalyzer-core` | 比特读取、Exp-Golomb、RBSP 转换、错误类型 |
//! | `nalyzer-parser` | 语法元素模型、各标准语法、NAL 分发器 |

/// 核心类型与工具
pub use nalyzer_core as core;

/// 语法解析
pub use nalyzer_parser as parser;
