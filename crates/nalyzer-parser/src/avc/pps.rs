//! H.264 PPS (Picture Parameter Set) 解析.

use nalyzer_core::NalResult;

use super::AvcContext;
use super::sps::scaling_matrix;
use crate::conformance::ConformanceIssue;
use crate::syntax::{Opts, SyntaxReader};

/// PPS 解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvcPps {
    pub pps_id: u32,
    pub sps_id: u32,
    /// true 为 CABAC, false 为 CAVLC
    pub entropy_coding_mode_flag: bool,
    pub bottom_field_pic_order_in_frame_present_flag: bool,
    pub num_slice_groups: u32,
    pub num_ref_idx_l0_default_active: u32,
    pub num_ref_idx_l1_default_active: u32,
    pub weighted_pred_flag: bool,
    pub weighted_bipred_idc: u32,
    /// 26 + pic_init_qp_minus26
    pub pic_init_qp: i32,
    pub chroma_qp_index_offset: i32,
    pub deblocking_filter_control_present_flag: bool,
    pub constrained_intra_pred_flag: bool,
    pub redundant_pic_cnt_present_flag: bool,
    pub transform_8x8_mode_flag: bool,
    /// 未出现时等于 chroma_qp_index_offset
    pub second_chroma_qp_index_offset: i32,
}

const ENTROPY_NAMES: &[&str] = &["CAVLC", "CABAC"];

const SLICE_GROUP_MAP_TYPE_NAMES: &[&str] = &[
    "交错",
    "分散",
    "前景与剩余",
    "盒形扩展",
    "光栅扫描",
    "擦除",
    "显式",
];

/// pic_parameter_set_rbsp()
///
/// 8x8 量化矩阵的数量取决于所引用 SPS 的 chroma_format_idc,
/// SPS 缺失时按 4:2:0 处理并产生 MissingReference 警告.
pub fn parse_pps(r: &mut SyntaxReader<'_>, ctx: &AvcContext) -> NalResult<AvcPps> {
    let pps_id = r.read_ue_with("pic_parameter_set_id", Opts::range(0, 255))?;
    let sps_id = r.read_ue_with("seq_parameter_set_id", Opts::range(0, 31))?;
    let chroma_format_idc = match ctx.sps(sps_id) {
        Some(sps) => sps.chroma_format_idc,
        None => {
            r.warn(
                "seq_parameter_set_id",
                ConformanceIssue::MissingReference {
                    id: u64::from(sps_id),
                },
            );
            1
        }
    };

    let entropy_coding_mode_flag =
        r.read_flag_with("entropy_coding_mode_flag", Opts::table(ENTROPY_NAMES))?;
    let bottom_field_pic_order_in_frame_present_flag =
        r.read_flag("bottom_field_pic_order_in_frame_present_flag")?;
    let num_slice_groups = r
        .read_ue_with("num_slice_groups_minus1", Opts::range(0, 7))?
        .saturating_add(1);
    if num_slice_groups > 1 {
        r.structure("slice_group_map", |r| slice_group_map(r, num_slice_groups))?;
    }

    let num_ref_idx_l0_default_active = r
        .read_ue_with("num_ref_idx_l0_default_active_minus1", Opts::range(0, 31))?
        .saturating_add(1);
    let num_ref_idx_l1_default_active = r
        .read_ue_with("num_ref_idx_l1_default_active_minus1", Opts::range(0, 31))?
        .saturating_add(1);
    let weighted_pred_flag = r.read_flag("weighted_pred_flag")?;
    let weighted_bipred_idc = r.read_bits_with("weighted_bipred_idc", 2, Opts::range(0, 2))?;
    let pic_init_qp = r
        .read_se_with("pic_init_qp_minus26", Opts::range(-26, 25))?
        .saturating_add(26);
    r.read_se_with("pic_init_qs_minus26", Opts::range(-26, 25))?;
    let chroma_qp_index_offset = r.read_se_with("chroma_qp_index_offset", Opts::range(-12, 12))?;
    let deblocking_filter_control_present_flag =
        r.read_flag("deblocking_filter_control_present_flag")?;
    let constrained_intra_pred_flag = r.read_flag("constrained_intra_pred_flag")?;
    let redundant_pic_cnt_present_flag = r.read_flag("redundant_pic_cnt_present_flag")?;

    let mut transform_8x8_mode_flag = false;
    let mut second_chroma_qp_index_offset = chroma_qp_index_offset;
    if r.more_rbsp_data() {
        transform_8x8_mode_flag = r.read_flag("transform_8x8_mode_flag")?;
        if r.read_flag("pic_scaling_matrix_present_flag")? {
            let per_8x8 = if chroma_format_idc != 3 { 2 } else { 6 };
            let count = 6 + if transform_8x8_mode_flag { per_8x8 } else { 0 };
            scaling_matrix(r, "pic_scaling_list_present_flag", count)?;
        }
        second_chroma_qp_index_offset =
            r.read_se_with("second_chroma_qp_index_offset", Opts::range(-12, 12))?;
    }
    r.rbsp_trailing_bits()?;

    Ok(AvcPps {
        pps_id,
        sps_id,
        entropy_coding_mode_flag,
        bottom_field_pic_order_in_frame_present_flag,
        num_slice_groups,
        num_ref_idx_l0_default_active,
        num_ref_idx_l1_default_active,
        weighted_pred_flag,
        weighted_bipred_idc,
        pic_init_qp,
        chroma_qp_index_offset,
        deblocking_filter_control_present_flag,
        constrained_intra_pred_flag,
        redundant_pic_cnt_present_flag,
        transform_8x8_mode_flag,
        second_chroma_qp_index_offset,
    })
}

/// slice_group_map_type 及其参数 (FMO)
fn slice_group_map(r: &mut SyntaxReader<'_>, num_slice_groups: u32) -> NalResult<()> {
    let map_type = r.read_ue_with(
        "slice_group_map_type",
        Opts::table(SLICE_GROUP_MAP_TYPE_NAMES).with_range(0, 6),
    )?;
    match map_type {
        0 => {
            for i in 0..num_slice_groups {
                r.read_ue(&format!("run_length_minus1[{i}]"))?;
            }
        }
        2 => {
            for i in 0..num_slice_groups - 1 {
                r.read_ue(&format!("top_left[{i}]"))?;
                r.read_ue(&format!("bottom_right[{i}]"))?;
            }
        }
        3..=5 => {
            r.read_flag("slice_group_change_direction_flag")?;
            r.read_ue("slice_group_change_rate_minus1")?;
        }
        6 => {
            let pic_size_in_map_units = r.read_ue("pic_size_in_map_units_minus1")?;
            // Ceil(Log2(num_slice_groups_minus1 + 1))
            let bits = u32::BITS - (num_slice_groups - 1).leading_zeros();
            for i in 0..=pic_size_in_map_units {
                if bits == 0 {
                    break;
                }
                r.read_bits(&format!("slice_group_id[{i}]"), bits)?;
            }
        }
        _ => {}
    }
    Ok(())
}
