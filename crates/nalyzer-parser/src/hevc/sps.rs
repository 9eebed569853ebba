//! H.265/HEVC SPS (Sequence Parameter Set) 解析.
//!
//! HEVC SPS 包含:
//! - VPS 引用与 profile_tier_level
//! - 图像尺寸 (亮度采样) 与一致性裁剪窗口
//! - 色度格式与位深
//! - 编码块、变换块尺寸
//! - 短期/长期参考图像集
//! - VUI 与 range/multilayer 扩展

use nalyzer_core::{NalResult, Rational};

use super::ptl::{HevcPtl, parse_ptl, profile_name};
use super::rps::{ShortTermRps, parse_st_rps};
use super::scaling::parse_scaling_list_data;
use super::vps::{SubLayerOrdering, sub_layer_ordering_info};
use super::vui::{DisplayWindow, HevcVui, parse_vui};
use crate::common::chroma_format_opts;
use crate::syntax::{Opts, SyntaxReader};

/// SPS 解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HevcSps {
    pub vps_id: u8,
    pub max_sub_layers: u32,
    pub temporal_id_nesting_flag: bool,
    pub ptl: HevcPtl,
    pub sps_id: u32,
    /// 色度格式 (0=单色, 1=4:2:0, 2=4:2:2, 3=4:4:4)
    pub chroma_format_idc: u32,
    pub separate_colour_plane_flag: bool,
    /// 亮度采样宽度 (裁剪前)
    pub pic_width: u32,
    /// 亮度采样高度 (裁剪前)
    pub pic_height: u32,
    /// 一致性裁剪窗口 (以色度采样单位计)
    pub conf_win: DisplayWindow,
    pub bit_depth_luma: u32,
    pub bit_depth_chroma: u32,
    pub log2_max_poc_lsb: u32,
    pub sub_layer_ordering: Vec<SubLayerOrdering>,
    pub log2_min_cb_size: u32,
    pub log2_ctb_size: u32,
    pub scaling_list_enabled_flag: bool,
    pub amp_enabled_flag: bool,
    pub sample_adaptive_offset_enabled_flag: bool,
    pub pcm_enabled_flag: bool,
    pub short_term_rps: Vec<ShortTermRps>,
    pub long_term_ref_pics_present_flag: bool,
    pub num_long_term_ref_pics_sps: u32,
    pub temporal_mvp_enabled_flag: bool,
    pub strong_intra_smoothing_enabled_flag: bool,
    pub vui: Option<HevcVui>,
    pub range_extension_flag: bool,
}

impl HevcSps {
    /// ChromaArrayType
    pub fn chroma_array_type(&self) -> u32 {
        if self.separate_colour_plane_flag {
            0
        } else {
            self.chroma_format_idc
        }
    }

    /// (SubWidthC, SubHeightC)
    pub fn chroma_subsampling(&self) -> (u32, u32) {
        match self.chroma_array_type() {
            1 => (2, 2),
            2 => (2, 1),
            _ => (1, 1),
        }
    }

    /// 裁剪后的宽度
    pub fn width(&self) -> Option<u32> {
        let (sub_w, _) = self.chroma_subsampling();
        let crop = self
            .conf_win
            .left
            .checked_add(self.conf_win.right)?
            .checked_mul(sub_w)?;
        self.pic_width.checked_sub(crop).filter(|w| *w > 0)
    }

    /// 裁剪后的高度
    pub fn height(&self) -> Option<u32> {
        let (_, sub_h) = self.chroma_subsampling();
        let crop = self
            .conf_win
            .top
            .checked_add(self.conf_win.bottom)?
            .checked_mul(sub_h)?;
        self.pic_height.checked_sub(crop).filter(|h| *h > 0)
    }

    pub fn frame_rate(&self) -> Option<Rational> {
        self.vui.as_ref()?.timing?.frame_rate()
    }

    pub fn sample_aspect_ratio(&self) -> Option<Rational> {
        self.vui.as_ref()?.sample_aspect_ratio
    }

    pub fn profile_idc(&self) -> u32 {
        self.ptl.general.map_or(0, |p| u32::from(p.profile_idc))
    }

    pub fn profile_name(&self) -> Option<&'static str> {
        profile_name(self.profile_idc())
    }
}

/// seq_parameter_set_rbsp()
pub fn parse_sps(r: &mut SyntaxReader<'_>) -> NalResult<HevcSps> {
    let vps_id = r.read_bits("sps_video_parameter_set_id", 4)? as u8;
    let max_sub_layers_minus1 =
        r.read_bits_with("sps_max_sub_layers_minus1", 3, Opts::range(0, 6))?;
    let temporal_id_nesting_flag = r.read_flag("sps_temporal_id_nesting_flag")?;
    let ptl = r.structure("profile_tier_level", |r| {
        parse_ptl(r, true, max_sub_layers_minus1)
    })?;
    let sps_id = r.read_ue_with("sps_seq_parameter_set_id", Opts::range(0, 15))?;

    let chroma_format_idc = r.read_ue_with("chroma_format_idc", chroma_format_opts())?;
    let separate_colour_plane_flag =
        chroma_format_idc == 3 && r.read_flag("separate_colour_plane_flag")?;
    let pic_width = r.read_ue("pic_width_in_luma_samples")?;
    let pic_height = r.read_ue("pic_height_in_luma_samples")?;
    let mut conf_win = DisplayWindow::default();
    if r.read_flag("conformance_window_flag")? {
        conf_win = DisplayWindow {
            left: r.read_ue("conf_win_left_offset")?,
            right: r.read_ue("conf_win_right_offset")?,
            top: r.read_ue("conf_win_top_offset")?,
            bottom: r.read_ue("conf_win_bottom_offset")?,
        };
    }
    let bit_depth_luma = r
        .read_ue_with("bit_depth_luma_minus8", Opts::range(0, 8))?
        .saturating_add(8);
    let bit_depth_chroma = r
        .read_ue_with("bit_depth_chroma_minus8", Opts::range(0, 8))?
        .saturating_add(8);
    let log2_max_poc_lsb =
        r.read_ue_with("log2_max_pic_order_cnt_lsb_minus4", Opts::range(0, 12))?.saturating_add(4);
    let sub_layer_ordering = sub_layer_ordering_info(r, "sps", max_sub_layers_minus1)?;

    let log2_min_cb_size = r.read_ue("log2_min_luma_coding_block_size_minus3")?.saturating_add(3);
    let log2_ctb_size =
        log2_min_cb_size.saturating_add(r.read_ue("log2_diff_max_min_luma_coding_block_size")?);
    r.read_ue("log2_min_luma_transform_block_size_minus2")?;
    r.read_ue("log2_diff_max_min_luma_transform_block_size")?;
    r.read_ue("max_transform_hierarchy_depth_inter")?;
    r.read_ue("max_transform_hierarchy_depth_intra")?;

    let scaling_list_enabled_flag = r.read_flag("scaling_list_enabled_flag")?;
    if scaling_list_enabled_flag && r.read_flag("sps_scaling_list_data_present_flag")? {
        r.structure("scaling_list_data", parse_scaling_list_data)?;
    }
    let amp_enabled_flag = r.read_flag("amp_enabled_flag")?;
    let sample_adaptive_offset_enabled_flag = r.read_flag("sample_adaptive_offset_enabled_flag")?;
    let pcm_enabled_flag = r.read_flag("pcm_enabled_flag")?;
    if pcm_enabled_flag {
        r.read_bits("pcm_sample_bit_depth_luma_minus1", 4)?;
        r.read_bits("pcm_sample_bit_depth_chroma_minus1", 4)?;
        r.read_ue("log2_min_pcm_luma_coding_block_size_minus3")?;
        r.read_ue("log2_diff_max_min_pcm_luma_coding_block_size")?;
        r.read_flag("pcm_loop_filter_disabled_flag")?;
    }

    let num_sets = r.read_ue_with("num_short_term_ref_pic_sets", Opts::range(0, 64))? as usize;
    let mut short_term_rps = Vec::new();
    for i in 0..num_sets {
        let rps = r.structure(format!("st_ref_pic_set[{i}]"), |r| {
            parse_st_rps(r, i, num_sets, &short_term_rps)
        })?;
        short_term_rps.push(rps);
    }

    let long_term_ref_pics_present_flag = r.read_flag("long_term_ref_pics_present_flag")?;
    let mut num_long_term_ref_pics_sps = 0;
    if long_term_ref_pics_present_flag {
        num_long_term_ref_pics_sps =
            r.read_ue_with("num_long_term_ref_pics_sps", Opts::range(0, 32))?;
        if log2_max_poc_lsb > 32 {
            return Err(r.invalid(
                "lt_ref_pic_poc_lsb_sps",
                format!("POC LSB 位数过大: {log2_max_poc_lsb}"),
            ));
        }
        for i in 0..num_long_term_ref_pics_sps {
            r.read_bits(&format!("lt_ref_pic_poc_lsb_sps[{i}]"), log2_max_poc_lsb)?;
            r.read_flag(&format!("used_by_curr_pic_lt_sps_flag[{i}]"))?;
        }
    }
    let temporal_mvp_enabled_flag = r.read_flag("sps_temporal_mvp_enabled_flag")?;
    let strong_intra_smoothing_enabled_flag = r.read_flag("strong_intra_smoothing_enabled_flag")?;

    let mut vui = None;
    if r.read_flag("vui_parameters_present_flag")? {
        vui = Some(r.structure("vui_parameters", |r| parse_vui(r, max_sub_layers_minus1))?);
    }

    let mut range_extension_flag = false;
    if r.read_flag("sps_extension_present_flag")? {
        range_extension_flag = r.read_flag("sps_range_extension_flag")?;
        let multilayer = r.read_flag("sps_multilayer_extension_flag")?;
        let ext_3d = r.read_flag("sps_3d_extension_flag")?;
        let scc = r.read_flag("sps_scc_extension_flag")?;
        let ext_4bits = r.read_bits("sps_extension_4bits", 4)?;
        if range_extension_flag {
            r.structure("sps_range_extension", range_extension)?;
        }
        if multilayer {
            r.structure("sps_multilayer_extension", |r| {
                r.read_flag("inter_view_mv_vert_constraint_flag")
            })?;
        }
        if ext_3d || scc || ext_4bits != 0 {
            r.read_extension_data("sps_extension_data_flag")?;
        }
    }
    r.rbsp_trailing_bits()?;

    Ok(HevcSps {
        vps_id,
        max_sub_layers: max_sub_layers_minus1 + 1,
        temporal_id_nesting_flag,
        ptl,
        sps_id,
        chroma_format_idc,
        separate_colour_plane_flag,
        pic_width,
        pic_height,
        conf_win,
        bit_depth_luma,
        bit_depth_chroma,
        log2_max_poc_lsb,
        sub_layer_ordering,
        log2_min_cb_size,
        log2_ctb_size,
        scaling_list_enabled_flag,
        amp_enabled_flag,
        sample_adaptive_offset_enabled_flag,
        pcm_enabled_flag,
        short_term_rps,
        long_term_ref_pics_present_flag,
        num_long_term_ref_pics_sps,
        temporal_mvp_enabled_flag,
        strong_intra_smoothing_enabled_flag,
        vui,
        range_extension_flag,
    })
}

/// sps_range_extension()
fn range_extension(r: &mut SyntaxReader<'_>) -> NalResult<()> {
    for name in [
        "transform_skip_rotation_enabled_flag",
        "transform_skip_context_enabled_flag",
        "implicit_rdpcm_enabled_flag",
        "explicit_rdpcm_enabled_flag",
        "extended_precision_processing_flag",
        "intra_smoothing_disabled_flag",
        "high_precision_offsets_enabled_flag",
        "persistent_rice_adaptation_enabled_flag",
        "cabac_bypass_alignment_enabled_flag",
    ] {
        r.read_flag(name)?;
    }
    Ok(())
}

/// 测试用: 1920x1080 Main profile SPS, 两个短期 RPS (第二个为帧间预测)
#[cfg(test)]
pub(crate) fn write_1080p_sps(bw: &mut nalyzer_core::BitWriter) {
    write_1080p_sps_fields(bw);
    bw.write_flag(false); // sps_extension_present_flag
    bw.write_rbsp_trailing_bits();
}

/// sps_extension_present_flag 之前的全部字段
#[cfg(test)]
fn write_1080p_sps_fields(bw: &mut nalyzer_core::BitWriter) {
    bw.write_bits(0, 4);
    bw.write_bits(0, 3);
    bw.write_flag(true);
    super::ptl::write_main_ptl(bw);
    bw.write_ue(0); // sps_id
    bw.write_ue(1); // 4:2:0
    bw.write_ue(1920);
    bw.write_ue(1088);
    bw.write_flag(true); // conformance_window_flag
    bw.write_ue(0);
    bw.write_ue(0);
    bw.write_ue(0);
    bw.write_ue(4); // 4 * 2 = 8 行
    bw.write_ue(0);
    bw.write_ue(0);
    bw.write_ue(4); // log2_max_poc_lsb = 8
    bw.write_flag(true);
    bw.write_ue(4);
    bw.write_ue(2);
    bw.write_ue(0);
    bw.write_ue(0); // min cb 8
    bw.write_ue(3); // ctb 64
    bw.write_ue(0);
    bw.write_ue(3);
    bw.write_ue(1);
    bw.write_ue(1);
    bw.write_flag(false); // scaling_list_enabled_flag
    bw.write_flag(true); // amp
    bw.write_flag(true); // sao
    bw.write_flag(false); // pcm
    bw.write_ue(2); // num_short_term_ref_pic_sets
    // st_ref_pic_set(0): {-1}
    bw.write_ue(1);
    bw.write_ue(0);
    bw.write_ue(0);
    bw.write_flag(true);
    // st_ref_pic_set(1): 由 (0) 预测, deltaRps = -1
    bw.write_flag(true);
    bw.write_flag(true);
    bw.write_ue(0);
    bw.write_flag(true);
    bw.write_flag(true);
    bw.write_flag(false); // long_term_ref_pics_present_flag
    bw.write_flag(true); // temporal_mvp
    bw.write_flag(true); // strong_intra_smoothing
    bw.write_flag(false); // vui
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalyzer_core::BitWriter;

    #[test]
    fn test_parse_1080p_sps() {
        let mut bw = BitWriter::new();
        write_1080p_sps(&mut bw);
        let data = bw.finish();

        let mut r = SyntaxReader::new(&data, "seq_parameter_set_rbsp");
        let sps = parse_sps(&mut r).unwrap();
        assert_eq!(sps.profile_name(), Some("Main"));
        assert_eq!(sps.width(), Some(1920));
        assert_eq!(sps.height(), Some(1080));
        assert_eq!(sps.log2_ctb_size, 6);
        assert_eq!(sps.short_term_rps.len(), 2);
        assert_eq!(sps.short_term_rps[1].delta_poc_s0, vec![-1, -2]);

        let out = r.finish();
        assert!(out.is_complete());
        assert!(out.warnings.is_empty());
        assert_eq!(out.log.len(), out.node.field_count());
        assert!(out.node.child("st_ref_pic_set[1]").is_some());
    }

    #[test]
    fn test_unknown_extension_is_opaque() {
        let mut bw = BitWriter::new();
        write_1080p_sps_fields(&mut bw);
        bw.write_flag(true); // sps_extension_present_flag
        bw.write_flag(true); // sps_range_extension_flag
        bw.write_flag(false);
        bw.write_flag(false);
        bw.write_flag(true); // sps_scc_extension_flag
        bw.write_bits(0, 4);
        bw.write_bits(0b1_0000_0000, 9); // range extension
        bw.write_bits(0b1011, 4);
        bw.write_rbsp_trailing_bits();
        let data = bw.finish();

        let mut r = SyntaxReader::new(&data, "seq_parameter_set_rbsp");
        let sps = parse_sps(&mut r).unwrap();
        assert!(sps.range_extension_flag);
        let out = r.finish();
        assert!(out.is_complete());
        let range = out.node.child("sps_range_extension").unwrap();
        assert_eq!(range.flag("transform_skip_rotation_enabled_flag"), Some(true));
        assert_eq!(out.warnings.len(), 1);
        assert_eq!(out.warnings[0].issue.kind(), "UnsupportedExtension");
        assert_eq!(out.log.find("sps_extension_data_flag").map(|e| e.bit_len), Some(4));
    }
}
