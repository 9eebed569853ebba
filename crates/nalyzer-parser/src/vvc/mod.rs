//! H.266/VVC 语法.
//!
//! 支持的 RBSP:
//! - OPI、DCI
//! - SPS 与 PPS 的前部 (尺寸、色度、位深等), 其余语法整段记录
//! - AUD、序列结束、码流结束、填充数据
//!
//! VPS、APS、图像头、切片与 SEI 由分发器作为不透明载荷记录.

pub mod dci;
pub mod misc;
pub mod nal;
pub mod opi;
pub mod pps;
pub mod ptl;
pub mod sps;

use std::collections::BTreeMap;
use std::sync::Arc;

use nalyzer_core::NalResult;

pub use dci::VvcDci;
pub use misc::VvcAud;
pub use nal::VvcNalUnitType;
pub use opi::VvcOpi;
pub use pps::{ScalingWindow, VvcPps};
pub use ptl::{GeneralConstraints, VvcPtl};
pub use sps::{ConformanceWindow, DpbParams, SubpicInfo, VvcSps};

use crate::avc::misc::{parse_empty, parse_filler_data};
use crate::context::VideoProperties;
use crate::grammar::{Entry, Grammar, ParseFn};
use crate::standard::{NalHeader, Standard};
use crate::syntax::SyntaxReader;

/// H.266 语法实现
#[derive(Debug, Clone, Copy, Default)]
pub struct Vvc;

/// H.266 解析上下文: 最近的 DCI 与 OPI, 按 ID 保存的 SPS/PPS
///
/// DCI/OPI 没有 ID, 每个码流最多各一个有效实例, 新实例直接替换旧实例.
#[derive(Debug, Clone, Default)]
pub struct VvcContext {
    dci: Option<Arc<VvcDci>>,
    opi: Option<Arc<VvcOpi>>,
    sps: BTreeMap<u32, Arc<VvcSps>>,
    pps: BTreeMap<u32, Arc<VvcPps>>,
    last_sps_id: Option<u32>,
}

impl VvcContext {
    pub fn sps(&self, id: u32) -> Option<&Arc<VvcSps>> {
        self.sps.get(&id)
    }

    pub fn pps(&self, id: u32) -> Option<&Arc<VvcPps>> {
        self.pps.get(&id)
    }

    /// 最近一次提交的 SPS
    pub fn last_sps(&self) -> Option<&Arc<VvcSps>> {
        self.last_sps_id.and_then(|id| self.sps.get(&id))
    }

    pub fn sps_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.sps.keys().copied()
    }

    pub fn pps_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.pps.keys().copied()
    }

    pub fn dci(&self) -> Option<&Arc<VvcDci>> {
        self.dci.as_ref()
    }

    pub fn opi(&self) -> Option<&Arc<VvcOpi>> {
        self.opi.as_ref()
    }
}

/// 解析成功后写回上下文的结构
#[derive(Debug, Clone)]
pub enum VvcUpdate {
    Dci(VvcDci),
    Opi(VvcOpi),
    Sps(VvcSps),
    Pps(VvcPps),
}

fn opi_entry(r: &mut SyntaxReader<'_>, _ctx: &VvcContext) -> NalResult<Option<VvcUpdate>> {
    opi::parse_opi(r).map(|opi| Some(VvcUpdate::Opi(opi)))
}

fn dci_entry(r: &mut SyntaxReader<'_>, _ctx: &VvcContext) -> NalResult<Option<VvcUpdate>> {
    dci::parse_dci(r).map(|dci| Some(VvcUpdate::Dci(dci)))
}

fn sps_entry(r: &mut SyntaxReader<'_>, _ctx: &VvcContext) -> NalResult<Option<VvcUpdate>> {
    sps::parse_sps(r).map(|sps| Some(VvcUpdate::Sps(sps)))
}

fn pps_entry(r: &mut SyntaxReader<'_>, ctx: &VvcContext) -> NalResult<Option<VvcUpdate>> {
    pps::parse_pps(r, ctx).map(|pps| Some(VvcUpdate::Pps(pps)))
}

fn aud_entry(r: &mut SyntaxReader<'_>, _ctx: &VvcContext) -> NalResult<Option<VvcUpdate>> {
    misc::parse_aud(r).map(|_| None)
}

fn empty_entry(r: &mut SyntaxReader<'_>, _ctx: &VvcContext) -> NalResult<Option<VvcUpdate>> {
    parse_empty(r).map(|_| None)
}

fn filler_entry(r: &mut SyntaxReader<'_>, _ctx: &VvcContext) -> NalResult<Option<VvcUpdate>> {
    parse_filler_data(r).map(|_| None)
}

impl Grammar for Vvc {
    const STANDARD: Standard = Standard::Vvc;

    type Context = VvcContext;
    type Update = VvcUpdate;

    fn parse_header(r: &mut SyntaxReader<'_>) -> NalResult<NalHeader> {
        nal::parse_header(r)
    }

    fn entry(nal_unit_type: u8) -> Option<Entry<VvcContext, VvcUpdate>> {
        let (name, parse): (&'static str, ParseFn<VvcContext, VvcUpdate>) =
            match VvcNalUnitType::from_type_id(nal_unit_type) {
                VvcNalUnitType::Opi => ("operating_point_information_rbsp", opi_entry),
                VvcNalUnitType::Dci => ("decoding_capability_information_rbsp", dci_entry),
                VvcNalUnitType::Sps => ("seq_parameter_set_rbsp", sps_entry),
                VvcNalUnitType::Pps => ("pic_parameter_set_rbsp", pps_entry),
                VvcNalUnitType::Aud => ("access_unit_delimiter_rbsp", aud_entry),
                VvcNalUnitType::Eos => ("end_of_seq_rbsp", empty_entry),
                VvcNalUnitType::Eob => ("end_of_bitstream_rbsp", empty_entry),
                VvcNalUnitType::FillerData => ("filler_data_rbsp", filler_entry),
                _ => return None,
            };
        Some(Entry { name, parse })
    }

    fn commit(ctx: &mut VvcContext, update: VvcUpdate) {
        match update {
            VvcUpdate::Dci(dci) => ctx.dci = Some(Arc::new(dci)),
            VvcUpdate::Opi(opi) => ctx.opi = Some(Arc::new(opi)),
            VvcUpdate::Sps(sps) => {
                ctx.last_sps_id = Some(sps.sps_id);
                ctx.sps.insert(sps.sps_id, Arc::new(sps));
            }
            VvcUpdate::Pps(pps) => {
                ctx.pps.insert(pps.pps_id, Arc::new(pps));
            }
        }
    }

    /// 尺寸、色度与位深取自最近的 SPS; SPS 不带 PTL 时 profile 取自 DCI.
    /// 帧率与宽高比位于 VUI 中, 不提供.
    fn video_properties(ctx: &VvcContext) -> Option<VideoProperties> {
        let dci_ptl = ctx
            .dci
            .as_ref()
            .and_then(|dci| dci.ptls.iter().find(|p| p.general_profile_idc.is_some()));
        let sps = ctx.last_sps();
        let general = sps.and_then(|s| s.ptl.as_ref()).or(dci_ptl);
        if sps.is_none() && general.is_none() {
            return None;
        }

        let profile_idc = general
            .and_then(|p| p.general_profile_idc)
            .map_or(0, u32::from);
        let level_idc = general.map_or(0, |p| u32::from(p.general_level_idc));
        let mut props = VideoProperties::new(Standard::Vvc, profile_idc, level_idc);
        props.profile_name = ptl::profile_name(profile_idc);
        props.tier_flag = general.and_then(|p| p.general_tier_flag);
        if let Some(sps) = sps {
            props.width = sps.width();
            props.height = sps.height();
            props.coded_width = Some(sps.pic_width_max);
            props.coded_height = Some(sps.pic_height_max);
            props.chroma_format_idc = Some(sps.chroma_format_idc);
            props.bit_depth_luma = Some(sps.bit_depth);
            props.bit_depth_chroma = Some(sps.bit_depth);
        }
        Some(props)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_table() {
        assert_eq!(Vvc::entry(13).map(|e| e.name), Some("decoding_capability_information_rbsp"));
        assert_eq!(Vvc::entry(12).map(|e| e.name), Some("operating_point_information_rbsp"));
        assert_eq!(Vvc::entry(15).map(|e| e.name), Some("seq_parameter_set_rbsp"));
        assert!(Vvc::entry(14).is_none());
        assert!(Vvc::entry(0).is_none());
    }

    #[test]
    fn test_dci_feeds_properties() {
        let data = [0x00, 0x02, 0x33, 0x80, 0x00, 0x40];
        let entry = Vvc::entry(13).unwrap();
        let mut r = SyntaxReader::new(&data, entry.name);
        let mut ctx = VvcContext::default();
        let update = (entry.parse)(&mut r, &ctx).unwrap().unwrap();
        Vvc::commit(&mut ctx, update);

        let props = Vvc::video_properties(&ctx).unwrap();
        assert_eq!(props.profile_name, Some("Main 10"));
        assert_eq!(props.level_name(), "3.1");
        assert_eq!(props.tier_flag, Some(false));
        assert!(props.width.is_none());
    }

    #[test]
    fn test_sps_feeds_properties() {
        let mut bw = nalyzer_core::BitWriter::new();
        sps::write_main10_sps(&mut bw);
        let data = bw.finish();
        let entry = Vvc::entry(15).unwrap();
        let mut r = SyntaxReader::new(&data, entry.name);
        let mut ctx = VvcContext::default();
        assert!(Vvc::video_properties(&ctx).is_none());
        let update = (entry.parse)(&mut r, &ctx).unwrap().unwrap();
        Vvc::commit(&mut ctx, update);

        assert_eq!(ctx.sps_ids().collect::<Vec<_>>(), vec![0]);
        let props = Vvc::video_properties(&ctx).unwrap();
        assert_eq!(props.profile_name, Some("Main 10"));
        assert_eq!(props.level_name(), "3.1");
        assert_eq!((props.width, props.height), (Some(1920), Some(1080)));
        assert_eq!(props.coded_height, Some(1088));
        assert_eq!(props.chroma_format_name(), Some("4:2:0"));
        assert_eq!(props.bit_depth_luma, Some(10));
        assert!(props.frame_rate.is_none());
    }
}
