//! # nalyzer-parser
//!
//! 多标准 NAL 单元语法解析器, 逐字段记录位置、描述符与取值.
//!
//! ## 支持的标准
//!
//! - **H.264/AVC**: SPS (含 VUI/HRD)、SPS 扩展、PPS、AUD、EOS、EOB、填充数据
//! - **H.265/HEVC**: VPS、SPS、PPS (含 range 扩展)、AUD、EOS、EOB、填充数据
//! - **H.266/VVC**: OPI、DCI (含 GCI)、SPS/PPS 前部、AUD、EOS、EOB、填充数据
//!
//! 其余 NAL 类型作为不透明载荷记录.
//!
//! ## 使用示例
//!
//! ```rust
//! use nalyzer_parser::{NalParser, ParseStatus, Standard};
//!
//! let mut parser = NalParser::new(Standard::Hevc);
//! // HEVC AUD: pic_type = 0
//! let nal = parser.parse_nal(&[0x46, 0x01, 0x10]);
//! assert_eq!(nal.status, ParseStatus::Complete);
//! assert_eq!(nal.type_name(), "AUD");
//! ```

pub mod annexb;
pub mod avc;
pub mod common;
pub mod conformance;
pub mod context;
pub mod dispatcher;
pub mod grammar;
pub mod hevc;
pub mod standard;
pub mod syntax;
pub mod vvc;

// 重导出常用类型
pub use annexb::{NalChunk, split_annex_b, split_length_prefixed};
pub use conformance::{ConformanceIssue, ConformanceWarning, Severity};
pub use context::{StreamContext, VideoProperties};
pub use dispatcher::{NalParser, ParseStats, ParseStatus, ParsedNal, ParserConfig};
pub use grammar::{Entry, Grammar};
pub use standard::{NalHeader, Standard};
pub use syntax::{
    Descriptor, FieldEntry, FieldLog, FieldValue, Opts, ParseFailure, SyntaxNode, SyntaxReader,
};
