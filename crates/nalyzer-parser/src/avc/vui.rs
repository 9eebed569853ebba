//! H.264 VUI 与 HRD 参数 (附录 E).

use nalyzer_core::{NalResult, Rational};

use crate::common::{self, VideoSignal};
use crate::syntax::{Opts, SyntaxReader};

/// VUI 中的时间信息
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingInfo {
    pub num_units_in_tick: u32,
    pub time_scale: u32,
    pub fixed_frame_rate_flag: bool,
}

impl TimingInfo {
    /// 帧率 = time_scale / (2 * num_units_in_tick)
    pub fn frame_rate(&self) -> Option<Rational> {
        Rational::from_timing(self.time_scale, self.num_units_in_tick, 2)
    }
}

/// HRD 参数摘要
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvcHrd {
    pub bit_rate_scale: u32,
    pub cpb_size_scale: u32,
    /// 每个 CPB 的 (码率, CPB 大小, 是否 CBR), 单位为 bit/s 与 bit
    pub cpb: Vec<(u64, u64, bool)>,
}

/// VUI 参数摘要
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AvcVui {
    pub sample_aspect_ratio: Option<Rational>,
    pub video_signal: Option<VideoSignal>,
    pub timing: Option<TimingInfo>,
    pub nal_hrd: Option<AvcHrd>,
    pub vcl_hrd: Option<AvcHrd>,
    pub pic_struct_present_flag: bool,
    pub max_num_reorder_frames: Option<u32>,
    pub max_dec_frame_buffering: Option<u32>,
}

/// vui_parameters()
pub fn parse_vui(r: &mut SyntaxReader<'_>) -> NalResult<AvcVui> {
    let mut vui = AvcVui {
        sample_aspect_ratio: common::aspect_ratio_info(r)?,
        ..AvcVui::default()
    };
    common::overscan_info(r)?;
    vui.video_signal = common::video_signal_type(r)?;
    common::chroma_loc_info(r)?;

    if r.read_flag("timing_info_present_flag")? {
        let num_units_in_tick = r.read_bits("num_units_in_tick", 32)?;
        let time_scale = r.read_bits("time_scale", 32)?;
        let fixed_frame_rate_flag = r.read_flag("fixed_frame_rate_flag")?;
        vui.timing = Some(TimingInfo {
            num_units_in_tick,
            time_scale,
            fixed_frame_rate_flag,
        });
    }

    if r.read_flag("nal_hrd_parameters_present_flag")? {
        vui.nal_hrd = Some(r.structure("nal_hrd_parameters", parse_hrd)?);
    }
    if r.read_flag("vcl_hrd_parameters_present_flag")? {
        vui.vcl_hrd = Some(r.structure("vcl_hrd_parameters", parse_hrd)?);
    }
    if vui.nal_hrd.is_some() || vui.vcl_hrd.is_some() {
        r.read_flag("low_delay_hrd_flag")?;
    }
    vui.pic_struct_present_flag = r.read_flag("pic_struct_present_flag")?;

    if r.read_flag("bitstream_restriction_flag")? {
        r.read_flag("motion_vectors_over_pic_boundaries_flag")?;
        r.read_ue_with("max_bytes_per_pic_denom", Opts::range(0, 16))?;
        r.read_ue_with("max_bits_per_mb_denom", Opts::range(0, 16))?;
        r.read_ue_with("log2_max_mv_length_horizontal", Opts::range(0, 15))?;
        r.read_ue_with("log2_max_mv_length_vertical", Opts::range(0, 15))?;
        vui.max_num_reorder_frames = Some(r.read_ue("max_num_reorder_frames")?);
        vui.max_dec_frame_buffering = Some(r.read_ue("max_dec_frame_buffering")?);
    }
    Ok(vui)
}

/// hrd_parameters()
pub fn parse_hrd(r: &mut SyntaxReader<'_>) -> NalResult<AvcHrd> {
    let cpb_cnt_minus1 = r.read_ue_with("cpb_cnt_minus1", Opts::range(0, 31))?;
    let bit_rate_scale = r.read_bits("bit_rate_scale", 4)?;
    let cpb_size_scale = r.read_bits("cpb_size_scale", 4)?;
    let mut cpb = Vec::new();
    for i in 0..=cpb_cnt_minus1 {
        let bit_rate_value_minus1 = r.read_ue(&format!("bit_rate_value_minus1[{i}]"))?;
        let cpb_size_value_minus1 = r.read_ue(&format!("cpb_size_value_minus1[{i}]"))?;
        let cbr_flag = r.read_flag(&format!("cbr_flag[{i}]"))?;
        let bit_rate = (u64::from(bit_rate_value_minus1) + 1) << (6 + bit_rate_scale);
        let cpb_size = (u64::from(cpb_size_value_minus1) + 1) << (4 + cpb_size_scale);
        cpb.push((bit_rate, cpb_size, cbr_flag));
    }
    r.read_bits("initial_cpb_removal_delay_length_minus1", 5)?;
    r.read_bits("cpb_removal_delay_length_minus1", 5)?;
    r.read_bits("dpb_output_delay_length_minus1", 5)?;
    r.read_bits("time_offset_length", 5)?;
    Ok(AvcHrd {
        bit_rate_scale,
        cpb_size_scale,
        cpb,
    })
}
