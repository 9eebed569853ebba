//! HEVC vui_parameters() (附录 E.2.1).

use nalyzer_core::{NalResult, Rational};

use super::hrd::{HevcHrd, parse_hrd};
use crate::common::{self, VideoSignal};
use crate::syntax::{Opts, SyntaxReader};

/// 默认显示窗口 (以色度采样单位计)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DisplayWindow {
    pub left: u32,
    pub right: u32,
    pub top: u32,
    pub bottom: u32,
}

/// VUI / VPS 的时间信息
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HevcTiming {
    pub num_units_in_tick: u32,
    pub time_scale: u32,
    pub num_ticks_poc_diff_one: Option<u32>,
}

impl HevcTiming {
    /// 帧率 = time_scale / num_units_in_tick
    pub fn frame_rate(&self) -> Option<Rational> {
        Rational::from_timing(self.time_scale, self.num_units_in_tick, 1)
    }
}

/// VUI 参数摘要
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HevcVui {
    pub sample_aspect_ratio: Option<Rational>,
    pub video_signal: Option<VideoSignal>,
    pub field_seq_flag: bool,
    pub default_display_window: Option<DisplayWindow>,
    pub timing: Option<HevcTiming>,
    pub hrd: Option<HevcHrd>,
}

/// vui_parameters(), `max_sub_layers_minus1` 来自 SPS
pub fn parse_vui(r: &mut SyntaxReader<'_>, max_sub_layers_minus1: u32) -> NalResult<HevcVui> {
    let mut vui = HevcVui {
        sample_aspect_ratio: common::aspect_ratio_info(r)?,
        ..HevcVui::default()
    };
    common::overscan_info(r)?;
    vui.video_signal = common::video_signal_type(r)?;
    common::chroma_loc_info(r)?;

    r.read_flag("neutral_chroma_indication_flag")?;
    vui.field_seq_flag = r.read_flag("field_seq_flag")?;
    r.read_flag("frame_field_info_present_flag")?;
    if r.read_flag("default_display_window_flag")? {
        vui.default_display_window = Some(DisplayWindow {
            left: r.read_ue("def_disp_win_left_offset")?,
            right: r.read_ue("def_disp_win_right_offset")?,
            top: r.read_ue("def_disp_win_top_offset")?,
            bottom: r.read_ue("def_disp_win_bottom_offset")?,
        });
    }

    if r.read_flag("vui_timing_info_present_flag")? {
        vui.timing = Some(timing_info(r, "vui")?);
        if r.read_flag("vui_hrd_parameters_present_flag")? {
            vui.hrd = Some(r.structure("hrd_parameters", |r| {
                parse_hrd(r, true, max_sub_layers_minus1)
            })?);
        }
    }

    if r.read_flag("bitstream_restriction_flag")? {
        r.read_flag("tiles_fixed_structure_flag")?;
        r.read_flag("motion_vectors_over_pic_boundaries_flag")?;
        r.read_flag("restricted_ref_pic_lists_flag")?;
        r.read_ue_with("min_spatial_segmentation_idc", Opts::range(0, 4095))?;
        r.read_ue_with("max_bytes_per_pic_denom", Opts::range(0, 16))?;
        r.read_ue_with("max_bits_per_min_cu_denom", Opts::range(0, 16))?;
        r.read_ue_with("log2_max_mv_length_horizontal", Opts::range(0, 15))?;
        r.read_ue_with("log2_max_mv_length_vertical", Opts::range(0, 15))?;
    }
    Ok(vui)
}

/// {prefix}_num_units_in_tick .. {prefix}_num_ticks_poc_diff_one_minus1
///
/// VPS 与 VUI 的字段前缀不同 (`vps_` / `vui_`).
pub(crate) fn timing_info(r: &mut SyntaxReader<'_>, prefix: &str) -> NalResult<HevcTiming> {
    let num_units_in_tick = r.read_bits(&format!("{prefix}_num_units_in_tick"), 32)?;
    let time_scale = r.read_bits(&format!("{prefix}_time_scale"), 32)?;
    let mut num_ticks_poc_diff_one = None;
    if r.read_flag(&format!("{prefix}_poc_proportional_to_timing_flag"))? {
        let minus1 = r.read_ue(&format!("{prefix}_num_ticks_poc_diff_one_minus1"))?;
        num_ticks_poc_diff_one = Some(minus1.saturating_add(1));
    }
    Ok(HevcTiming {
        num_units_in_tick,
        time_scale,
        num_ticks_poc_diff_one,
    })
}
