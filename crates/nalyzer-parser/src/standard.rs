//! 编码标准选择与通用 NAL 头部信息.

use std::fmt;
use std::str::FromStr;

use nalyzer_core::NalError;

use crate::avc::AvcNalUnitType;
use crate::hevc::HevcNalUnitType;
use crate::vvc::VvcNalUnitType;

/// 视频编码标准
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Standard {
    /// H.264 / AVC
    Avc,
    /// H.265 / HEVC
    Hevc,
    /// H.266 / VVC
    Vvc,
}

impl Standard {
    pub const ALL: [Standard; 3] = [Standard::Avc, Standard::Hevc, Standard::Vvc];

    /// 标准简称
    pub fn name(self) -> &'static str {
        match self {
            Self::Avc => "AVC",
            Self::Hevc => "HEVC",
            Self::Vvc => "VVC",
        }
    }

    /// NAL 头部字节数 (不含 AVC 的 SVC/MVC 扩展头)
    pub fn header_len(self) -> usize {
        match self {
            Self::Avc => 1,
            Self::Hevc | Self::Vvc => 2,
        }
    }

    /// NAL 单元类型名称
    pub fn nal_type_name(self, nal_unit_type: u8) -> &'static str {
        match self {
            Self::Avc => AvcNalUnitType::from_type_id(nal_unit_type).name(),
            Self::Hevc => HevcNalUnitType::from_type_id(nal_unit_type).name(),
            Self::Vvc => VvcNalUnitType::from_type_id(nal_unit_type).name(),
        }
    }

    /// 根据常见文件扩展名推断标准
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "264" | "h264" | "avc" | "jsv" => Some(Self::Avc),
            "265" | "h265" | "hevc" => Some(Self::Hevc),
            "266" | "h266" | "vvc" | "bit" => Some(Self::Vvc),
            _ => None,
        }
    }
}

impl fmt::Display for Standard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Standard {
    type Err = NalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "avc" | "h264" | "h.264" | "264" => Ok(Self::Avc),
            "hevc" | "h265" | "h.265" | "265" => Ok(Self::Hevc),
            "vvc" | "h266" | "h.266" | "266" => Ok(Self::Vvc),
            other => Err(NalError::InvalidArgument(format!(
                "未知的编码标准: {other}"
            ))),
        }
    }
}

/// 解析后的 NAL 头部
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NalHeader {
    pub standard: Standard,
    pub nal_unit_type: u8,
    /// 仅 AVC 有 nal_ref_idc
    pub nal_ref_idc: Option<u8>,
    /// nuh_layer_id (AVC 恒为 0)
    pub layer_id: u8,
    /// nuh_temporal_id_plus1 (AVC 恒为 1)
    pub temporal_id_plus1: u8,
    /// 头部字节数 (含扩展头)
    pub header_bytes: usize,
}

impl NalHeader {
    /// NAL 单元类型名称
    pub fn type_name(&self) -> &'static str {
        self.standard.nal_type_name(self.nal_unit_type)
    }

    /// TemporalId
    pub fn temporal_id(&self) -> u8 {
        self.temporal_id_plus1.saturating_sub(1)
    }
}
