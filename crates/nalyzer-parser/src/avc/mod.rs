//! H.264/AVC 语法.
//!
//! 支持的 RBSP:
//! - SPS / SPS 扩展 / PPS
//! - AUD、序列结束、码流结束、填充数据
//!
//! 其余类型 (切片、SEI 等) 由分发器作为不透明载荷记录.

pub mod misc;
pub mod nal;
pub mod pps;
pub mod sps;
pub mod vui;

use std::collections::BTreeMap;
use std::sync::Arc;

use nalyzer_core::NalResult;

pub use nal::AvcNalUnitType;
pub use pps::AvcPps;
pub use sps::{AvcSps, ConstraintFlags, CropWindow};
pub use vui::{AvcHrd, AvcVui, TimingInfo};

use crate::context::VideoProperties;
use crate::grammar::{Entry, Grammar, ParseFn};
use crate::standard::{NalHeader, Standard};
use crate::syntax::SyntaxReader;

/// H.264 语法实现
#[derive(Debug, Clone, Copy, Default)]
pub struct Avc;

/// H.264 解析上下文: 按 ID 保存的 SPS/PPS
#[derive(Debug, Clone, Default)]
pub struct AvcContext {
    sps: BTreeMap<u32, Arc<AvcSps>>,
    pps: BTreeMap<u32, Arc<AvcPps>>,
    last_sps_id: Option<u32>,
}

impl AvcContext {
    pub fn sps(&self, id: u32) -> Option<&Arc<AvcSps>> {
        self.sps.get(&id)
    }

    pub fn pps(&self, id: u32) -> Option<&Arc<AvcPps>> {
        self.pps.get(&id)
    }

    /// 最近一次提交的 SPS
    pub fn last_sps(&self) -> Option<&Arc<AvcSps>> {
        self.last_sps_id.and_then(|id| self.sps.get(&id))
    }

    pub fn sps_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.sps.keys().copied()
    }

    pub fn pps_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.pps.keys().copied()
    }
}

/// 解析成功后写回上下文的参数集
#[derive(Debug, Clone)]
pub enum AvcUpdate {
    Sps(AvcSps),
    Pps(AvcPps),
}

fn sps_entry(r: &mut SyntaxReader<'_>, _ctx: &AvcContext) -> NalResult<Option<AvcUpdate>> {
    sps::parse_sps(r).map(|sps| Some(AvcUpdate::Sps(sps)))
}

fn pps_entry(r: &mut SyntaxReader<'_>, ctx: &AvcContext) -> NalResult<Option<AvcUpdate>> {
    pps::parse_pps(r, ctx).map(|pps| Some(AvcUpdate::Pps(pps)))
}

fn aud_entry(r: &mut SyntaxReader<'_>, _ctx: &AvcContext) -> NalResult<Option<AvcUpdate>> {
    misc::parse_aud(r).map(|_| None)
}

fn empty_entry(r: &mut SyntaxReader<'_>, _ctx: &AvcContext) -> NalResult<Option<AvcUpdate>> {
    misc::parse_empty(r).map(|_| None)
}

fn filler_entry(r: &mut SyntaxReader<'_>, _ctx: &AvcContext) -> NalResult<Option<AvcUpdate>> {
    misc::parse_filler_data(r).map(|_| None)
}

fn sps_extension_entry(
    r: &mut SyntaxReader<'_>,
    _ctx: &AvcContext,
) -> NalResult<Option<AvcUpdate>> {
    misc::parse_sps_extension(r).map(|_| None)
}

impl Grammar for Avc {
    const STANDARD: Standard = Standard::Avc;

    type Context = AvcContext;
    type Update = AvcUpdate;

    fn parse_header(r: &mut SyntaxReader<'_>) -> NalResult<NalHeader> {
        nal::parse_header(r)
    }

    fn entry(nal_unit_type: u8) -> Option<Entry<AvcContext, AvcUpdate>> {
        let (name, parse): (&'static str, ParseFn<AvcContext, AvcUpdate>) =
            match AvcNalUnitType::from_type_id(nal_unit_type) {
                AvcNalUnitType::Sps => ("seq_parameter_set_rbsp", sps_entry),
                AvcNalUnitType::Pps => ("pic_parameter_set_rbsp", pps_entry),
                AvcNalUnitType::Aud => ("access_unit_delimiter_rbsp", aud_entry),
                AvcNalUnitType::EndOfSequence => ("end_of_seq_rbsp", empty_entry),
                AvcNalUnitType::EndOfStream => ("end_of_stream_rbsp", empty_entry),
                AvcNalUnitType::FillerData => ("filler_data_rbsp", filler_entry),
                AvcNalUnitType::SpsExtension => {
                    ("seq_parameter_set_extension_rbsp", sps_extension_entry)
                }
                _ => return None,
            };
        Some(Entry { name, parse })
    }

    fn commit(ctx: &mut AvcContext, update: AvcUpdate) {
        match update {
            AvcUpdate::Sps(sps) => {
                ctx.last_sps_id = Some(sps.sps_id);
                ctx.sps.insert(sps.sps_id, Arc::new(sps));
            }
            AvcUpdate::Pps(pps) => {
                ctx.pps.insert(pps.pps_id, Arc::new(pps));
            }
        }
    }

    fn video_properties(ctx: &AvcContext) -> Option<VideoProperties> {
        let sps = ctx.last_sps()?;
        let mut props = VideoProperties::new(
            Standard::Avc,
            u32::from(sps.profile_idc),
            u32::from(sps.level_idc),
        );
        props.profile_name = sps.profile_name();
        props.width = sps.width();
        props.height = sps.height();
        props.coded_width = sps.coded_width();
        props.coded_height = sps.coded_height();
        props.chroma_format_idc = Some(sps.chroma_format_idc);
        props.bit_depth_luma = Some(sps.bit_depth_luma);
        props.bit_depth_chroma = Some(sps.bit_depth_chroma);
        props.frame_rate = sps.frame_rate();
        props.sample_aspect_ratio = sps.sample_aspect_ratio();
        Some(props)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_table() {
        assert_eq!(Avc::entry(7).map(|e| e.name), Some("seq_parameter_set_rbsp"));
        assert_eq!(Avc::entry(13).map(|e| e.name), Some("seq_parameter_set_extension_rbsp"));
        assert!(Avc::entry(5).is_none());
        assert!(Avc::entry(6).is_none());
    }

    #[test]
    fn test_empty_context_has_no_properties() {
        assert!(Avc::video_properties(&AvcContext::default()).is_none());
    }
}
