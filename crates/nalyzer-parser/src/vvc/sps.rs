//! H.266/VVC SPS (Sequence Parameter Set) 解析.
//!
//! 逐字段展开到 dpb_parameters() 为止:
//! - 参数集引用、子层数、色度格式与 CTU 尺寸
//! - profile_tier_level
//! - 最大图像尺寸、一致性裁剪窗口与子图像布局
//! - 位深、POC、图像头/切片头额外位
//!
//! 从 sps_log2_min_luma_coding_block_size_minus2 开始的编码工具、参考图像列表、
//! VUI 与扩展整段记录为 `sps_remaining_data`.

use nalyzer_core::NalResult;

use super::ptl::{VvcPtl, parse_ptl, profile_name};
use crate::common::chroma_format_opts;
use crate::syntax::{Opts, SyntaxReader};

/// 单帧最多的子图像数 (MaxSlicesPerAu 的上限)
const MAX_SUBPICS: u32 = 600;

/// 一致性裁剪窗口 (以色度采样单位计)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConformanceWindow {
    pub left: u32,
    pub right: u32,
    pub top: u32,
    pub bottom: u32,
}

impl ConformanceWindow {
    pub(crate) fn parse(r: &mut SyntaxReader<'_>, prefix: &str) -> NalResult<Self> {
        Ok(Self {
            left: r.read_ue(&format!("{prefix}_conf_win_left_offset"))?,
            right: r.read_ue(&format!("{prefix}_conf_win_right_offset"))?,
            top: r.read_ue(&format!("{prefix}_conf_win_top_offset"))?,
            bottom: r.read_ue(&format!("{prefix}_conf_win_bottom_offset"))?,
        })
    }

    /// 按色度子采样裁剪后的尺寸, 窗口不小于图像时为 `None`
    pub fn apply(
        &self,
        width: u32,
        height: u32,
        chroma_format_idc: u32,
    ) -> (Option<u32>, Option<u32>) {
        let (sub_w, sub_h) = chroma_subsampling(chroma_format_idc);
        let crop = |size: u32, a: u32, b: u32, unit: u32| {
            let cut = a.checked_add(b)?.checked_mul(unit)?;
            size.checked_sub(cut).filter(|v| *v > 0)
        };
        (
            crop(width, self.left, self.right, sub_w),
            crop(height, self.top, self.bottom, sub_h),
        )
    }
}

/// (SubWidthC, SubHeightC)
pub fn chroma_subsampling(chroma_format_idc: u32) -> (u32, u32) {
    match chroma_format_idc {
        1 => (2, 2),
        2 => (2, 1),
        _ => (1, 1),
    }
}

/// 子图像布局
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SubpicInfo {
    pub num_subpics: u32,
    pub independent_subpics_flag: bool,
    pub same_size_flag: bool,
    /// sps_subpic_id_len_minus1 + 1
    pub id_len: u32,
    /// SPS 中显式给出的子图像 ID
    pub ids: Vec<u32>,
}

/// dpb_parameters() 中单个子层的取值
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DpbParams {
    /// dpb_max_dec_pic_buffering_minus1 + 1
    pub max_dec_pic_buffering: u32,
    pub max_num_reorder_pics: u32,
    pub max_latency_increase_plus1: u32,
}

/// SPS 解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VvcSps {
    pub sps_id: u32,
    pub vps_id: u32,
    /// sps_max_sublayers_minus1 + 1
    pub max_sublayers: u32,
    pub chroma_format_idc: u32,
    /// CtbLog2SizeY
    pub log2_ctu_size: u32,
    /// sps_ptl_dpb_hrd_params_present_flag 为 0 时为 `None`
    pub ptl: Option<VvcPtl>,
    pub gdr_enabled_flag: bool,
    pub ref_pic_resampling_enabled_flag: bool,
    pub res_change_in_clvs_allowed_flag: bool,
    /// 亮度采样宽度上限 (裁剪前)
    pub pic_width_max: u32,
    /// 亮度采样高度上限 (裁剪前)
    pub pic_height_max: u32,
    pub conf_win: ConformanceWindow,
    pub subpics: Option<SubpicInfo>,
    pub bit_depth: u32,
    pub entropy_coding_sync_enabled_flag: bool,
    pub entry_point_offsets_present_flag: bool,
    pub log2_max_poc_lsb: u32,
    /// sps_poc_msb_cycle_len_minus1 + 1
    pub poc_msb_cycle_len: Option<u32>,
    pub num_extra_ph_bytes: u32,
    pub num_extra_sh_bytes: u32,
    /// 按子层排列, 未单独给出的子层不出现
    pub dpb: Vec<DpbParams>,
}

impl VvcSps {
    pub fn ctu_size(&self) -> u32 {
        1 << self.log2_ctu_size
    }

    pub fn profile_idc(&self) -> Option<u32> {
        self.ptl
            .as_ref()
            .and_then(|p| p.general_profile_idc)
            .map(u32::from)
    }

    pub fn profile_name(&self) -> Option<&'static str> {
        self.profile_idc().and_then(profile_name)
    }

    /// 裁剪后的宽度
    pub fn width(&self) -> Option<u32> {
        self.conf_win
            .apply(self.pic_width_max, self.pic_height_max, self.chroma_format_idc)
            .0
    }

    /// 裁剪后的高度
    pub fn height(&self) -> Option<u32> {
        self.conf_win
            .apply(self.pic_width_max, self.pic_height_max, self.chroma_format_idc)
            .1
    }
}

/// Ceil(Log2(v))
fn ceil_log2(v: u32) -> u32 {
    if v <= 1 { 0 } else { u32::BITS - (v - 1).leading_zeros() }
}

/// seq_parameter_set_rbsp()
pub fn parse_sps(r: &mut SyntaxReader<'_>) -> NalResult<VvcSps> {
    let sps_id = r.read_bits("sps_seq_parameter_set_id", 4)?;
    let vps_id = r.read_bits("sps_video_parameter_set_id", 4)?;
    let max_sublayers_minus1 =
        r.read_bits_with("sps_max_sublayers_minus1", 3, Opts::range(0, 6))?;
    let chroma_format_idc = r.read_bits_with("sps_chroma_format_idc", 2, chroma_format_opts())?;
    let log2_ctu_size = r.read_bits_with("sps_log2_ctu_size_minus5", 2, Opts::range(0, 2))? + 5;
    let ptl_dpb_hrd_present = r.read_flag("sps_ptl_dpb_hrd_params_present_flag")?;
    let ptl = if ptl_dpb_hrd_present {
        Some(r.structure("profile_tier_level", |r| parse_ptl(r, true, max_sublayers_minus1))?)
    } else {
        None
    };

    let gdr_enabled_flag = r.read_flag("sps_gdr_enabled_flag")?;
    let ref_pic_resampling_enabled_flag = r.read_flag("sps_ref_pic_resampling_enabled_flag")?;
    let mut res_change_in_clvs_allowed_flag = false;
    if ref_pic_resampling_enabled_flag {
        res_change_in_clvs_allowed_flag = r.read_flag("sps_res_change_in_clvs_allowed_flag")?;
    }

    let pic_width_max = r.read_ue("sps_pic_width_max_in_luma_samples")?;
    let pic_height_max = r.read_ue("sps_pic_height_max_in_luma_samples")?;
    let mut conf_win = ConformanceWindow::default();
    if r.read_flag("sps_conformance_window_flag")? {
        conf_win = ConformanceWindow::parse(r, "sps")?;
    }

    let mut subpics = None;
    if r.read_flag("sps_subpic_info_present_flag")? {
        let layout = SubpicLayout {
            log2_ctu_size,
            pic_width_max,
            pic_height_max,
        };
        subpics = Some(r.structure("subpic_info", |r| subpic_info(r, &layout))?);
    }

    let bit_depth = r
        .read_ue_with("sps_bitdepth_minus8", Opts::range(0, 8))?
        .saturating_add(8);
    let entropy_coding_sync_enabled_flag = r.read_flag("sps_entropy_coding_sync_enabled_flag")?;
    let entry_point_offsets_present_flag = r.read_flag("sps_entry_point_offsets_present_flag")?;
    let log2_max_poc_lsb_minus4 =
        r.read_bits_with("sps_log2_max_pic_order_cnt_lsb_minus4", 4, Opts::range(0, 12))?;
    let mut poc_msb_cycle_len = None;
    if r.read_flag("sps_poc_msb_cycle_flag")? {
        let max = 32 - i64::from(log2_max_poc_lsb_minus4) - 5;
        let len = r.read_ue_with("sps_poc_msb_cycle_len_minus1", Opts::range(0, max))?;
        poc_msb_cycle_len = Some(len.saturating_add(1));
    }

    let num_extra_ph_bytes = r.read_bits_with("sps_num_extra_ph_bytes", 2, Opts::range(0, 2))?;
    for i in 0..num_extra_ph_bytes * 8 {
        r.read_flag(&format!("sps_extra_ph_bit_present_flag[{i}]"))?;
    }
    let num_extra_sh_bytes = r.read_bits_with("sps_num_extra_sh_bytes", 2, Opts::range(0, 2))?;
    for i in 0..num_extra_sh_bytes * 8 {
        r.read_flag(&format!("sps_extra_sh_bit_present_flag[{i}]"))?;
    }

    let mut dpb = Vec::new();
    if ptl_dpb_hrd_present {
        let mut sublayer_dpb_params = false;
        if max_sublayers_minus1 > 0 {
            sublayer_dpb_params = r.read_flag("sps_sublayer_dpb_params_flag")?;
        }
        dpb = r.structure("dpb_parameters", |r| {
            dpb_parameters(r, max_sublayers_minus1, sublayer_dpb_params)
        })?;
    }

    r.read_remaining_data("sps_remaining_data")?;
    r.rbsp_trailing_bits()?;

    Ok(VvcSps {
        sps_id,
        vps_id,
        max_sublayers: max_sublayers_minus1 + 1,
        chroma_format_idc,
        log2_ctu_size,
        ptl,
        gdr_enabled_flag,
        ref_pic_resampling_enabled_flag,
        res_change_in_clvs_allowed_flag,
        pic_width_max,
        pic_height_max,
        conf_win,
        subpics,
        bit_depth,
        entropy_coding_sync_enabled_flag,
        entry_point_offsets_present_flag,
        log2_max_poc_lsb: log2_max_poc_lsb_minus4 + 4,
        poc_msb_cycle_len,
        num_extra_ph_bytes,
        num_extra_sh_bytes,
        dpb,
    })
}

struct SubpicLayout {
    log2_ctu_size: u32,
    pic_width_max: u32,
    pic_height_max: u32,
}

impl SubpicLayout {
    /// 图像宽/高方向的 CTU 数
    fn ctus(&self, size: u32) -> u32 {
        let ctu = 1u32 << self.log2_ctu_size;
        size.saturating_add(ctu - 1) >> self.log2_ctu_size
    }
}

/// SPS 中 sps_subpic_info_present_flag 之后的子图像语法
fn subpic_info(r: &mut SyntaxReader<'_>, layout: &SubpicLayout) -> NalResult<SubpicInfo> {
    let num_subpics_minus1 = r.read_ue("sps_num_subpics_minus1")?;
    if num_subpics_minus1 >= MAX_SUBPICS {
        return Err(r.invalid(
            "sps_num_subpics_minus1",
            format!(
                "子图像数 {} 超过上限 {MAX_SUBPICS}",
                u64::from(num_subpics_minus1) + 1
            ),
        ));
    }
    let mut info = SubpicInfo {
        num_subpics: num_subpics_minus1 + 1,
        independent_subpics_flag: true,
        ..SubpicInfo::default()
    };
    if num_subpics_minus1 > 0 {
        info.independent_subpics_flag = r.read_flag("sps_independent_subpics_flag")?;
        info.same_size_flag = r.read_flag("sps_subpic_same_size_flag")?;

        let ctb = 1u32 << layout.log2_ctu_size;
        let x_bits = ceil_log2(layout.ctus(layout.pic_width_max));
        let y_bits = ceil_log2(layout.ctus(layout.pic_height_max));
        let wide = layout.pic_width_max > ctb;
        let tall = layout.pic_height_max > ctb;
        for i in 0..=num_subpics_minus1 {
            if !info.same_size_flag || i == 0 {
                if i > 0 && wide {
                    r.read_bits(&format!("sps_subpic_ctu_top_left_x[{i}]"), x_bits)?;
                }
                if i > 0 && tall {
                    r.read_bits(&format!("sps_subpic_ctu_top_left_y[{i}]"), y_bits)?;
                }
                if i < num_subpics_minus1 && wide {
                    r.read_bits(&format!("sps_subpic_width_minus1[{i}]"), x_bits)?;
                }
                if i < num_subpics_minus1 && tall {
                    r.read_bits(&format!("sps_subpic_height_minus1[{i}]"), y_bits)?;
                }
            }
            if !info.independent_subpics_flag {
                r.read_flag(&format!("sps_subpic_treated_as_pic_flag[{i}]"))?;
                r.read_flag(&format!("sps_loop_filter_across_subpic_enabled_flag[{i}]"))?;
            }
        }
    }

    info.id_len = r
        .read_ue_with("sps_subpic_id_len_minus1", Opts::range(0, 15))?
        .saturating_add(1);
    if r.read_flag("sps_subpic_id_mapping_explicitly_signalled_flag")?
        && r.read_flag("sps_subpic_id_mapping_present_flag")?
    {
        // 超出范围时已有警告, 按 16 位读取避免越界位宽
        let len = info.id_len.min(16);
        for i in 0..info.num_subpics {
            info.ids.push(r.read_bits(&format!("sps_subpic_id[{i}]"), len)?);
        }
    }
    Ok(info)
}

/// dpb_parameters(MaxSubLayersMinus1, subLayerInfoFlag)
fn dpb_parameters(
    r: &mut SyntaxReader<'_>,
    max_sublayers_minus1: u32,
    sublayer_info: bool,
) -> NalResult<Vec<DpbParams>> {
    let first = if sublayer_info { 0 } else { max_sublayers_minus1 };
    let mut params = Vec::new();
    for i in first..=max_sublayers_minus1 {
        let buffering_minus1 = r.read_ue(&format!("dpb_max_dec_pic_buffering_minus1[{i}]"))?;
        let max_num_reorder_pics = r.read_ue_with(
            &format!("dpb_max_num_reorder_pics[{i}]"),
            Opts::range(0, i64::from(buffering_minus1)),
        )?;
        let max_latency_increase_plus1 =
            r.read_ue(&format!("dpb_max_latency_increase_plus1[{i}]"))?;
        params.push(DpbParams {
            max_dec_pic_buffering: buffering_minus1.saturating_add(1),
            max_num_reorder_pics,
            max_latency_increase_plus1,
        });
    }
    Ok(params)
}

/// 测试用: 1920x1080 (编码 1088), 4:2:0, 10 bit, CTU 128, Main 10 level 3.1
#[cfg(test)]
pub(crate) fn write_main10_sps(bw: &mut nalyzer_core::BitWriter) {
    bw.write_bits(0, 4); // sps_seq_parameter_set_id
    bw.write_bits(0, 4); // sps_video_parameter_set_id
    bw.write_bits(0, 3); // sps_max_sublayers_minus1
    bw.write_bits(1, 2); // sps_chroma_format_idc
    bw.write_bits(2, 2); // sps_log2_ctu_size_minus5
    bw.write_flag(true); // sps_ptl_dpb_hrd_params_present_flag
    super::ptl::write_main10_ptl(bw);
    bw.write_flag(false); // sps_gdr_enabled_flag
    bw.write_flag(false); // sps_ref_pic_resampling_enabled_flag
    bw.write_ue(1920);
    bw.write_ue(1088);
    bw.write_flag(true); // sps_conformance_window_flag
    bw.write_ue(0);
    bw.write_ue(0);
    bw.write_ue(0);
    bw.write_ue(4);
    bw.write_flag(false); // sps_subpic_info_present_flag
    bw.write_ue(2); // sps_bitdepth_minus8
    bw.write_flag(false);
    bw.write_flag(true); // sps_entry_point_offsets_present_flag
    bw.write_bits(4, 4); // sps_log2_max_pic_order_cnt_lsb_minus4
    bw.write_flag(false); // sps_poc_msb_cycle_flag
    bw.write_bits(0, 2);
    bw.write_bits(0, 2);
    // dpb_parameters
    bw.write_ue(5);
    bw.write_ue(2);
    bw.write_ue(0);
    // 编码工具部分
    bw.write_ue(0); // sps_log2_min_luma_coding_block_size_minus2
    bw.write_flag(true);
    bw.write_bits(0b0110, 4);
    bw.write_rbsp_trailing_bits();
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalyzer_core::BitWriter;

    #[test]
    fn test_main10_sps() {
        let mut bw = BitWriter::new();
        write_main10_sps(&mut bw);
        let data = bw.finish();

        let mut r = SyntaxReader::new(&data, "seq_parameter_set_rbsp");
        let sps = parse_sps(&mut r).unwrap();
        assert_eq!(sps.chroma_format_idc, 1);
        assert_eq!(sps.ctu_size(), 128);
        assert_eq!(sps.bit_depth, 10);
        assert_eq!(sps.log2_max_poc_lsb, 8);
        assert_eq!(sps.profile_name(), Some("Main 10"));
        assert_eq!((sps.pic_width_max, sps.pic_height_max), (1920, 1088));
        assert_eq!(sps.width(), Some(1920));
        assert_eq!(sps.height(), Some(1080));
        assert_eq!(
            sps.dpb,
            vec![DpbParams {
                max_dec_pic_buffering: 6,
                max_num_reorder_pics: 2,
                max_latency_increase_plus1: 0,
            }]
        );

        let out = r.finish();
        assert!(out.is_complete());
        assert!(out.warnings.is_empty(), "{:?}", out.warnings);
        assert!(out.node.child("profile_tier_level").is_some());
        assert!(out.node.child("dpb_parameters").is_some());
        // 1 + 1 + 4 = 6 位不透明数据
        let rest = out.log.find("sps_remaining_data").unwrap();
        assert_eq!(rest.bit_len, 6);
        assert_eq!(rest.value.as_bytes().map(|b| &b[..]), Some(&[0b1101_1000][..]));
        assert_eq!(rest.meaning.as_deref(), Some("后续语法未展开"));
    }

    #[test]
    fn test_subpic_layout() {
        let mut bw = BitWriter::new();
        bw.write_bits(3, 4);
        bw.write_bits(1, 4);
        bw.write_bits(0, 3);
        bw.write_bits(1, 2);
        bw.write_bits(2, 2); // CTU 128
        bw.write_flag(false); // 无 PTL/DPB
        bw.write_flag(false);
        bw.write_flag(false);
        bw.write_ue(1920);
        bw.write_ue(1080);
        bw.write_flag(false);
        bw.write_flag(true); // sps_subpic_info_present_flag
        bw.write_ue(1); // 两个子图像
        bw.write_flag(true); // sps_independent_subpics_flag
        bw.write_flag(false); // sps_subpic_same_size_flag
        // 15 x 9 个 CTU, 坐标与尺寸都占 4 位
        bw.write_bits(7, 4); // sps_subpic_width_minus1[0]
        bw.write_bits(8, 4); // sps_subpic_height_minus1[0]
        bw.write_bits(8, 4); // sps_subpic_ctu_top_left_x[1]
        bw.write_bits(0, 4); // sps_subpic_ctu_top_left_y[1]
        bw.write_ue(7); // sps_subpic_id_len_minus1
        bw.write_flag(true);
        bw.write_flag(true);
        bw.write_bits(10, 8);
        bw.write_bits(20, 8);
        bw.write_ue(0); // sps_bitdepth_minus8
        bw.write_flag(false);
        bw.write_flag(false);
        bw.write_bits(0, 4);
        bw.write_flag(false);
        bw.write_bits(0, 2);
        bw.write_bits(0, 2);
        bw.write_ue(0);
        bw.write_rbsp_trailing_bits();
        let data = bw.finish();

        let mut r = SyntaxReader::new(&data, "seq_parameter_set_rbsp");
        let sps = parse_sps(&mut r).unwrap();
        assert_eq!((sps.sps_id, sps.vps_id), (3, 1));
        assert!(sps.ptl.is_none());
        assert!(sps.dpb.is_empty());
        let subpics = sps.subpics.as_ref().unwrap();
        assert_eq!(subpics.num_subpics, 2);
        assert_eq!(subpics.id_len, 8);
        assert_eq!(subpics.ids, vec![10, 20]);

        let out = r.finish();
        assert!(out.is_complete());
        assert!(out.warnings.is_empty(), "{:?}", out.warnings);
        let subpic = out.node.child("subpic_info").unwrap();
        assert_eq!(subpic.field_u64("sps_subpic_ctu_top_left_x[1]"), Some(8));
        assert!(subpic.field("sps_subpic_width_minus1[1]").is_none());
        assert_eq!(out.log.find("sps_subpic_height_minus1[0]").map(|e| e.bit_len), Some(4));
    }

    #[test]
    fn test_sublayer_dpb_parameters() {
        let mut bw = BitWriter::new();
        dpb_entry(&mut bw, 2, 1, 0);
        dpb_entry(&mut bw, 4, 5, 0); // reorder 超过 buffering - 1
        let data = bw.finish();

        let mut r = SyntaxReader::new(&data, "dpb_parameters");
        let dpb = dpb_parameters(&mut r, 1, true).unwrap();
        assert_eq!(dpb.len(), 2);
        assert_eq!(dpb[1].max_dec_pic_buffering, 5);
        let out = r.finish();
        assert_eq!(out.warnings.len(), 1);
        assert_eq!(out.warnings[0].field, "dpb_max_num_reorder_pics[1]");
    }

    fn dpb_entry(bw: &mut BitWriter, buffering_minus1: u32, reorder: u32, latency: u32) {
        bw.write_ue(buffering_minus1);
        bw.write_ue(reorder);
        bw.write_ue(latency);
    }

    #[test]
    fn test_too_many_subpics_fails() {
        let mut bw = BitWriter::new();
        bw.write_ue(MAX_SUBPICS);
        bw.write_rbsp_trailing_bits();
        let data = bw.finish();

        let layout = SubpicLayout {
            log2_ctu_size: 7,
            pic_width_max: 1920,
            pic_height_max: 1080,
        };
        let mut r = SyntaxReader::new(&data, "subpic_info");
        let err = subpic_info(&mut r, &layout).unwrap_err();
        assert!(matches!(err, nalyzer_core::NalError::InvalidData(_)));
        assert_eq!(r.finish().failure.unwrap().field, "sps_num_subpics_minus1");
    }

    #[test]
    fn test_ceil_log2() {
        assert_eq!(ceil_log2(1), 0);
        assert_eq!(ceil_log2(2), 1);
        assert_eq!(ceil_log2(9), 4);
        assert_eq!(ceil_log2(16), 4);
        assert_eq!(ceil_log2(17), 5);
    }
}
