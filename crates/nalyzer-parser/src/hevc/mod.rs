//! H.265/HEVC 语法.
//!
//! 支持的 RBSP:
//! - VPS / SPS / PPS (含 range 扩展)
//! - AUD、序列结束、码流结束、填充数据
//!
//! 切片与 SEI 由分发器作为不透明载荷记录.

pub mod hrd;
pub mod misc;
pub mod nal;
pub mod pps;
pub mod ptl;
pub mod rps;
pub mod scaling;
pub mod sps;
pub mod vps;
pub mod vui;

use std::collections::BTreeMap;
use std::sync::Arc;

use nalyzer_core::NalResult;

pub use hrd::HevcHrd;
pub use nal::HevcNalUnitType;
pub use pps::{HevcPps, TileLayout};
pub use ptl::{HevcPtl, ProfileInfo};
pub use rps::ShortTermRps;
pub use sps::HevcSps;
pub use vps::{HevcVps, SubLayerOrdering};
pub use vui::{DisplayWindow, HevcTiming, HevcVui};

use crate::avc::misc::{parse_empty, parse_filler_data};
use crate::context::VideoProperties;
use crate::grammar::{Entry, Grammar, ParseFn};
use crate::standard::{NalHeader, Standard};
use crate::syntax::SyntaxReader;

/// H.265 语法实现
#[derive(Debug, Clone, Copy, Default)]
pub struct Hevc;

/// H.265 解析上下文: 按 ID 保存的 VPS/SPS/PPS
#[derive(Debug, Clone, Default)]
pub struct HevcContext {
    vps: BTreeMap<u32, Arc<HevcVps>>,
    sps: BTreeMap<u32, Arc<HevcSps>>,
    pps: BTreeMap<u32, Arc<HevcPps>>,
    last_sps_id: Option<u32>,
}

impl HevcContext {
    pub fn vps(&self, id: u32) -> Option<&Arc<HevcVps>> {
        self.vps.get(&id)
    }

    pub fn sps(&self, id: u32) -> Option<&Arc<HevcSps>> {
        self.sps.get(&id)
    }

    pub fn pps(&self, id: u32) -> Option<&Arc<HevcPps>> {
        self.pps.get(&id)
    }

    /// 最近一次提交的 SPS
    pub fn last_sps(&self) -> Option<&Arc<HevcSps>> {
        self.last_sps_id.and_then(|id| self.sps.get(&id))
    }

    pub fn vps_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.vps.keys().copied()
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
pub enum HevcUpdate {
    Vps(HevcVps),
    Sps(HevcSps),
    Pps(HevcPps),
}

fn vps_entry(r: &mut SyntaxReader<'_>, _ctx: &HevcContext) -> NalResult<Option<HevcUpdate>> {
    vps::parse_vps(r).map(|vps| Some(HevcUpdate::Vps(vps)))
}

fn sps_entry(r: &mut SyntaxReader<'_>, _ctx: &HevcContext) -> NalResult<Option<HevcUpdate>> {
    sps::parse_sps(r).map(|sps| Some(HevcUpdate::Sps(sps)))
}

fn pps_entry(r: &mut SyntaxReader<'_>, ctx: &HevcContext) -> NalResult<Option<HevcUpdate>> {
    pps::parse_pps(r, ctx).map(|pps| Some(HevcUpdate::Pps(pps)))
}

fn aud_entry(r: &mut SyntaxReader<'_>, _ctx: &HevcContext) -> NalResult<Option<HevcUpdate>> {
    misc::parse_aud(r).map(|_| None)
}

fn empty_entry(r: &mut SyntaxReader<'_>, _ctx: &HevcContext) -> NalResult<Option<HevcUpdate>> {
    parse_empty(r).map(|_| None)
}

fn filler_entry(r: &mut SyntaxReader<'_>, _ctx: &HevcContext) -> NalResult<Option<HevcUpdate>> {
    parse_filler_data(r).map(|_| None)
}

impl Grammar for Hevc {
    const STANDARD: Standard = Standard::Hevc;

    type Context = HevcContext;
    type Update = HevcUpdate;

    fn parse_header(r: &mut SyntaxReader<'_>) -> NalResult<NalHeader> {
        nal::parse_header(r)
    }

    fn entry(nal_unit_type: u8) -> Option<Entry<HevcContext, HevcUpdate>> {
        let (name, parse): (&'static str, ParseFn<HevcContext, HevcUpdate>) =
            match HevcNalUnitType::from_type_id(nal_unit_type) {
                HevcNalUnitType::Vps => ("video_parameter_set_rbsp", vps_entry),
                HevcNalUnitType::Sps => ("seq_parameter_set_rbsp", sps_entry),
                HevcNalUnitType::Pps => ("pic_parameter_set_rbsp", pps_entry),
                HevcNalUnitType::Aud => ("access_unit_delimiter_rbsp", aud_entry),
                HevcNalUnitType::Eos => ("end_of_seq_rbsp", empty_entry),
                HevcNalUnitType::Eob => ("end_of_bitstream_rbsp", empty_entry),
                HevcNalUnitType::FillerData => ("filler_data_rbsp", filler_entry),
                _ => return None,
            };
        Some(Entry { name, parse })
    }

    fn commit(ctx: &mut HevcContext, update: HevcUpdate) {
        match update {
            HevcUpdate::Vps(vps) => {
                ctx.vps.insert(u32::from(vps.vps_id), Arc::new(vps));
            }
            HevcUpdate::Sps(sps) => {
                ctx.last_sps_id = Some(sps.sps_id);
                ctx.sps.insert(sps.sps_id, Arc::new(sps));
            }
            HevcUpdate::Pps(pps) => {
                ctx.pps.insert(pps.pps_id, Arc::new(pps));
            }
        }
    }

    fn video_properties(ctx: &HevcContext) -> Option<VideoProperties> {
        let sps = ctx.last_sps()?;
        let mut props = VideoProperties::new(
            Standard::Hevc,
            sps.profile_idc(),
            u32::from(sps.ptl.general_level_idc),
        );
        props.profile_name = sps.profile_name();
        props.tier_flag = sps.ptl.general.map(|p| p.tier_flag);
        props.width = sps.width();
        props.height = sps.height();
        props.coded_width = Some(sps.pic_width);
        props.coded_height = Some(sps.pic_height);
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
    use nalyzer_core::BitWriter;

    fn parse_and_commit(ctx: &mut HevcContext, nal_unit_type: u8, data: &[u8]) {
        let entry = Hevc::entry(nal_unit_type).unwrap();
        let mut r = SyntaxReader::new(data, entry.name);
        let update = (entry.parse)(&mut r, ctx).unwrap();
        assert!(r.finish().is_complete());
        if let Some(update) = update {
            Hevc::commit(ctx, update);
        }
    }

    #[test]
    fn test_dispatch_table() {
        assert_eq!(Hevc::entry(32).map(|e| e.name), Some("video_parameter_set_rbsp"));
        assert_eq!(Hevc::entry(37).map(|e| e.name), Some("end_of_bitstream_rbsp"));
        assert!(Hevc::entry(1).is_none());
        assert!(Hevc::entry(39).is_none());
    }

    #[test]
    fn test_parameter_sets_feed_properties() {
        let mut ctx = HevcContext::default();
        let mut bw = BitWriter::new();
        vps::write_minimal_vps(&mut bw);
        parse_and_commit(&mut ctx, 32, &bw.finish());
        let mut bw = BitWriter::new();
        sps::write_1080p_sps(&mut bw);
        parse_and_commit(&mut ctx, 33, &bw.finish());

        // SPS 已存在, PPS 不再产生 MissingReference
        let mut bw = BitWriter::new();
        pps::write_minimal_pps(&mut bw);
        let data = bw.finish();
        let mut r = SyntaxReader::new(&data, "pic_parameter_set_rbsp");
        let update = pps_entry(&mut r, &ctx).unwrap();
        assert!(r.finish().warnings.is_empty());
        Hevc::commit(&mut ctx, update.unwrap());

        assert_eq!(ctx.vps_ids().collect::<Vec<_>>(), vec![0]);
        assert_eq!(ctx.pps(0).map(|p| p.init_qp), Some(22));
        let props = Hevc::video_properties(&ctx).unwrap();
        assert_eq!(props.profile_name, Some("Main"));
        assert_eq!(props.tier_flag, Some(false));
        assert_eq!(props.level_name(), "4.1");
        assert_eq!((props.width, props.height), (Some(1920), Some(1080)));
        assert_eq!(props.coded_height, Some(1088));
        assert_eq!(props.chroma_format_name(), Some("4:2:0"));
    }
}
