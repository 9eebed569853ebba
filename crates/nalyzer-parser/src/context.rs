//! 流级解析上下文与派生视频属性.
//!
//! 上下文保存已解析的参考结构 (参数集、能力描述), 供后续 NAL 单元引用.
//! 只有在一次解析完整成功后才会更新, 已交给调用方的结构通过 `Arc`
//! 共享且不再修改, 新结构以替换键值的方式写入.

use nalyzer_core::Rational;

use crate::avc::{Avc, AvcContext};
use crate::grammar::Grammar;
use crate::hevc::{Hevc, HevcContext};
use crate::standard::Standard;
use crate::vvc::{Vvc, VvcContext};

/// 从参数集派生的视频属性, 供显示/播放层查询
#[derive(Debug, Clone, PartialEq)]
pub struct VideoProperties {
    pub standard: Standard,
    pub profile_idc: u32,
    pub profile_name: Option<&'static str>,
    /// HEVC/VVC 的 general_tier_flag
    pub tier_flag: Option<bool>,
    pub level_idc: u32,
    /// 裁剪后的显示宽度
    pub width: Option<u32>,
    /// 裁剪后的显示高度
    pub height: Option<u32>,
    /// 编码宽度 (裁剪前)
    pub coded_width: Option<u32>,
    /// 编码高度 (裁剪前)
    pub coded_height: Option<u32>,
    pub chroma_format_idc: Option<u32>,
    pub bit_depth_luma: Option<u32>,
    pub bit_depth_chroma: Option<u32>,
    pub frame_rate: Option<Rational>,
    pub sample_aspect_ratio: Option<Rational>,
}

impl VideoProperties {
    pub(crate) fn new(standard: Standard, profile_idc: u32, level_idc: u32) -> Self {
        Self {
            standard,
            profile_idc,
            profile_name: None,
            tier_flag: None,
            level_idc,
            width: None,
            height: None,
            coded_width: None,
            coded_height: None,
            chroma_format_idc: None,
            bit_depth_luma: None,
            bit_depth_chroma: None,
            frame_rate: None,
            sample_aspect_ratio: None,
        }
    }

    /// 级别的常用写法, 如 "4.1"
    pub fn level_name(&self) -> String {
        match self.standard {
            Standard::Avc => format!("{}.{}", self.level_idc / 10, self.level_idc % 10),
            Standard::Hevc => {
                let major = self.level_idc / 30;
                let minor = (self.level_idc % 30) / 3;
                format!("{major}.{minor}")
            }
            Standard::Vvc => {
                let major = self.level_idc / 16;
                let minor = (self.level_idc % 16) / 3;
                format!("{major}.{minor}")
            }
        }
    }

    /// 色度格式名称
    pub fn chroma_format_name(&self) -> Option<&'static str> {
        self.chroma_format_idc
            .and_then(|idc| CHROMA_FORMAT_NAMES.get(idc as usize).copied())
    }
}

/// chroma_format_idc 名称
pub const CHROMA_FORMAT_NAMES: &[&str] = &["4:0:0", "4:2:0", "4:2:2", "4:4:4"];

/// 单个流的解析上下文 (按当前标准区分)
#[derive(Debug, Clone)]
pub enum StreamContext {
    Avc(AvcContext),
    Hevc(HevcContext),
    Vvc(VvcContext),
}

impl StreamContext {
    pub fn new(standard: Standard) -> Self {
        match standard {
            Standard::Avc => Self::Avc(AvcContext::default()),
            Standard::Hevc => Self::Hevc(HevcContext::default()),
            Standard::Vvc => Self::Vvc(VvcContext::default()),
        }
    }

    pub fn standard(&self) -> Standard {
        match self {
            Self::Avc(_) => Standard::Avc,
            Self::Hevc(_) => Standard::Hevc,
            Self::Vvc(_) => Standard::Vvc,
        }
    }

    /// 派生视频属性
    pub fn video_properties(&self) -> Option<VideoProperties> {
        match self {
            Self::Avc(ctx) => Avc::video_properties(ctx),
            Self::Hevc(ctx) => Hevc::video_properties(ctx),
            Self::Vvc(ctx) => Vvc::video_properties(ctx),
        }
    }

    pub fn as_avc(&self) -> Option<&AvcContext> {
        match self {
            Self::Avc(ctx) => Some(ctx),
            _ => None,
        }
    }

    pub fn as_hevc(&self) -> Option<&HevcContext> {
        match self {
            Self::Hevc(ctx) => Some(ctx),
            _ => None,
        }
    }

    pub fn as_vvc(&self) -> Option<&VvcContext> {
        match self {
            Self::Vvc(ctx) => Some(ctx),
            _ => None,
        }
    }
}
