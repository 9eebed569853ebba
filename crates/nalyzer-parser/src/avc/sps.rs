//! H.264 SPS (Sequence Parameter Set) 解析.
//!
//! SPS 包含编码视频序列的全局参数, 包括:
//! - Profile / Level (编码规格)
//! - 图像宽度和高度 (以宏块为单位, 需要 cropping 调整)
//! - 色度格式与位深
//! - 帧率信息 (通过 VUI timing_info)

use bitflags::bitflags;
use nalyzer_core::{NalResult, Rational};

use super::vui::{AvcVui, parse_vui};
use crate::common::chroma_format_opts;
use crate::syntax::{Opts, SyntaxReader};

bitflags! {
    /// constraint_set0..5_flag
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ConstraintFlags: u8 {
        const SET0 = 1 << 7;
        const SET1 = 1 << 6;
        const SET2 = 1 << 5;
        const SET3 = 1 << 4;
        const SET4 = 1 << 3;
        const SET5 = 1 << 2;
    }
}

/// 裁剪窗口 (以裁剪单位计)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CropWindow {
    pub left: u32,
    pub right: u32,
    pub top: u32,
    pub bottom: u32,
}

/// SPS 解析结果
#[derive(Debug, Clone, PartialEq)]
pub struct AvcSps {
    /// profile_idc (编码规格, 如 66=Baseline, 77=Main, 100=High)
    pub profile_idc: u8,
    pub constraint_flags: ConstraintFlags,
    /// level_idc (编码级别, 如 30=3.0, 41=4.1)
    pub level_idc: u8,
    pub sps_id: u32,
    /// 色度格式 (0=单色, 1=4:2:0, 2=4:2:2, 3=4:4:4)
    pub chroma_format_idc: u32,
    pub separate_colour_plane_flag: bool,
    pub bit_depth_luma: u32,
    pub bit_depth_chroma: u32,
    /// log2(max_frame_num)
    pub log2_max_frame_num: u32,
    /// 图像顺序计数类型 (0, 1, 2)
    pub poc_type: u32,
    /// 仅 poc_type==0 时有效
    pub log2_max_poc_lsb: u32,
    pub max_num_ref_frames: u32,
    pub pic_width_in_mbs: u32,
    pub pic_height_in_map_units: u32,
    /// 是否为帧编码 (非场编码)
    pub frame_mbs_only: bool,
    pub crop: CropWindow,
    pub vui: Option<AvcVui>,
}

/// 是否带 chroma_format_idc 等扩展字段的 profile
pub fn is_high_profile(profile_idc: u8) -> bool {
    matches!(
        profile_idc,
        100 | 110 | 122 | 244 | 44 | 83 | 86 | 118 | 128 | 138 | 139 | 134 | 135
    )
}

/// profile_idc 名称
pub fn profile_name(profile_idc: u32) -> Option<&'static str> {
    let name = match profile_idc {
        66 => "Baseline",
        77 => "Main",
        88 => "Extended",
        100 => "High",
        110 => "High 10",
        122 => "High 4:2:2",
        244 => "High 4:4:4 Predictive",
        44 => "CAVLC 4:4:4 Intra",
        83 => "Scalable Baseline",
        86 => "Scalable High",
        118 => "Multiview High",
        128 => "Stereo High",
        138 => "Multiview Depth High",
        139 => "Enhanced Multiview Depth High",
        134 => "MFC High",
        135 => "MFC Depth High",
        _ => return None,
    };
    Some(name)
}

fn profile_meaning(v: u64) -> Option<String> {
    profile_name(v as u32).map(str::to_string)
}

fn level_meaning(v: u64) -> Option<String> {
    Some(format!("{}.{}", v / 10, v % 10))
}

const POC_TYPE_NAMES: &[&str] = &["显式 LSB", "增量周期", "与解码顺序一致"];

impl AvcSps {
    /// ChromaArrayType
    pub fn chroma_array_type(&self) -> u32 {
        if self.separate_colour_plane_flag {
            0
        } else {
            self.chroma_format_idc
        }
    }

    /// (CropUnitX, CropUnitY)
    pub fn crop_units(&self) -> (u32, u32) {
        let frame_factor = if self.frame_mbs_only { 1 } else { 2 };
        match self.chroma_array_type() {
            0 => (1, frame_factor),
            1 => (2, 2 * frame_factor),
            2 => (2, frame_factor),
            _ => (1, frame_factor),
        }
    }

    /// 编码宽度 (像素, 裁剪前)
    pub fn coded_width(&self) -> Option<u32> {
        self.pic_width_in_mbs.checked_mul(16)
    }

    /// 编码高度 (像素, 裁剪前)
    pub fn coded_height(&self) -> Option<u32> {
        let frame_factor = if self.frame_mbs_only { 1 } else { 2 };
        self.pic_height_in_map_units
            .checked_mul(frame_factor)?
            .checked_mul(16)
    }

    /// 裁剪后的宽度, 裁剪量非法时返回 `None`
    pub fn width(&self) -> Option<u32> {
        let (unit_x, _) = self.crop_units();
        let crop = self
            .crop
            .left
            .checked_add(self.crop.right)?
            .checked_mul(unit_x)?;
        self.coded_width()?.checked_sub(crop).filter(|w| *w > 0)
    }

    /// 裁剪后的高度, 裁剪量非法时返回 `None`
    pub fn height(&self) -> Option<u32> {
        let (_, unit_y) = self.crop_units();
        let crop = self
            .crop
            .top
            .checked_add(self.crop.bottom)?
            .checked_mul(unit_y)?;
        self.coded_height()?.checked_sub(crop).filter(|h| *h > 0)
    }

    /// 帧率 (VUI timing_info)
    pub fn frame_rate(&self) -> Option<Rational> {
        self.vui.as_ref()?.timing?.frame_rate()
    }

    pub fn sample_aspect_ratio(&self) -> Option<Rational> {
        self.vui.as_ref()?.sample_aspect_ratio
    }

    pub fn profile_name(&self) -> Option<&'static str> {
        profile_name(u32::from(self.profile_idc))
    }
}

/// seq_parameter_set_rbsp()
pub fn parse_sps(r: &mut SyntaxReader<'_>) -> NalResult<AvcSps> {
    let profile_idc = r.read_bits_with("profile_idc", 8, Opts::lookup(profile_meaning))? as u8;
    let mut constraint_flags = ConstraintFlags::empty();
    for (i, flag) in ConstraintFlags::all().iter().enumerate() {
        if r.read_flag(&format!("constraint_set{i}_flag"))? {
            constraint_flags |= flag;
        }
    }
    r.read_reserved("reserved_zero_2bits", 2, 0)?;
    let level_idc = r.read_bits_with("level_idc", 8, Opts::lookup(level_meaning))? as u8;
    let sps_id = r.read_ue_with("seq_parameter_set_id", Opts::range(0, 31))?;

    let mut sps = AvcSps {
        profile_idc,
        constraint_flags,
        level_idc,
        sps_id,
        chroma_format_idc: 1,
        separate_colour_plane_flag: false,
        bit_depth_luma: 8,
        bit_depth_chroma: 8,
        log2_max_frame_num: 4,
        poc_type: 0,
        log2_max_poc_lsb: 0,
        max_num_ref_frames: 0,
        pic_width_in_mbs: 0,
        pic_height_in_map_units: 0,
        frame_mbs_only: true,
        crop: CropWindow::default(),
        vui: None,
    };

    if is_high_profile(profile_idc) {
        sps.chroma_format_idc = r.read_ue_with("chroma_format_idc", chroma_format_opts())?;
        if sps.chroma_format_idc == 3 {
            sps.separate_colour_plane_flag = r.read_flag("separate_colour_plane_flag")?;
        }
        sps.bit_depth_luma = r
            .read_ue_with("bit_depth_luma_minus8", Opts::range(0, 6))?
            .saturating_add(8);
        sps.bit_depth_chroma = r
            .read_ue_with("bit_depth_chroma_minus8", Opts::range(0, 6))?
            .saturating_add(8);
        r.read_flag("qpprime_y_zero_transform_bypass_flag")?;
        if r.read_flag("seq_scaling_matrix_present_flag")? {
            let list_count = if sps.chroma_format_idc != 3 { 8 } else { 12 };
            scaling_matrix(r, "seq_scaling_list_present_flag", list_count)?;
        }
    }

    sps.log2_max_frame_num = r
        .read_ue_with("log2_max_frame_num_minus4", Opts::range(0, 12))?
        .saturating_add(4);
    sps.poc_type = r.read_ue_with(
        "pic_order_cnt_type",
        Opts::table(POC_TYPE_NAMES).with_range(0, 2),
    )?;
    match sps.poc_type {
        0 => {
            sps.log2_max_poc_lsb = r
                .read_ue_with("log2_max_pic_order_cnt_lsb_minus4", Opts::range(0, 12))?
                .saturating_add(4);
        }
        1 => {
            r.read_flag("delta_pic_order_always_zero_flag")?;
            r.read_se("offset_for_non_ref_pic")?;
            r.read_se("offset_for_top_to_bottom_field")?;
            let cycle =
                r.read_ue_with("num_ref_frames_in_pic_order_cnt_cycle", Opts::range(0, 255))?;
            for i in 0..cycle {
                r.read_se(&format!("offset_for_ref_frame[{i}]"))?;
            }
        }
        _ => {}
    }

    sps.max_num_ref_frames = r.read_ue("max_num_ref_frames")?;
    r.read_flag("gaps_in_frame_num_value_allowed_flag")?;
    sps.pic_width_in_mbs = r.read_ue("pic_width_in_mbs_minus1")?.saturating_add(1);
    sps.pic_height_in_map_units = r.read_ue("pic_height_in_map_units_minus1")?.saturating_add(1);
    sps.frame_mbs_only = r.read_flag("frame_mbs_only_flag")?;
    if !sps.frame_mbs_only {
        r.read_flag("mb_adaptive_frame_field_flag")?;
    }
    r.read_flag("direct_8x8_inference_flag")?;

    if r.read_flag("frame_cropping_flag")? {
        sps.crop = CropWindow {
            left: r.read_ue("frame_crop_left_offset")?,
            right: r.read_ue("frame_crop_right_offset")?,
            top: r.read_ue("frame_crop_top_offset")?,
            bottom: r.read_ue("frame_crop_bottom_offset")?,
        };
    }

    if r.read_flag("vui_parameters_present_flag")? {
        sps.vui = Some(r.structure("vui_parameters", parse_vui)?);
    }
    r.rbsp_trailing_bits()?;
    Ok(sps)
}

/// 量化矩阵: `count` 个 present 标志, 置位的列表后跟 scaling_list()
///
/// 前 6 个为 4x4 列表, 其余为 8x8 列表. SPS 与 PPS 共用.
pub(crate) fn scaling_matrix(
    r: &mut SyntaxReader<'_>,
    flag_name: &str,
    count: usize,
) -> NalResult<()> {
    for i in 0..count {
        if r.read_flag(&format!("{flag_name}[{i}]"))? {
            let size = if i < 6 { 16 } else { 64 };
            r.structure(format!("scaling_list[{i}]"), |r| scaling_list(r, size))?;
        }
    }
    Ok(())
}

/// scaling_list(): 返回 useDefaultScalingMatrixFlag
fn scaling_list(r: &mut SyntaxReader<'_>, size: usize) -> NalResult<bool> {
    let mut last_scale = 8i64;
    let mut next_scale = 8i64;
    let mut use_default = false;
    for j in 0..size {
        if next_scale != 0 {
            let delta_scale = r.read_se_with("delta_scale", Opts::range(-128, 127))?;
            next_scale = (last_scale + i64::from(delta_scale) + 256).rem_euclid(256);
            use_default = j == 0 && next_scale == 0;
        }
        if next_scale != 0 {
            last_scale = next_scale;
        }
    }
    Ok(use_default)
}
