//! H.265/HEVC PPS (Picture Parameter Set) 解析.
//!
//! init_qp_minus26 的下限依赖所引用 SPS 的亮度位深 (-(26 + QpBdOffsetY)),
//! SPS 缺失时按 8 bit 处理.

use nalyzer_core::NalResult;

use super::HevcContext;
use super::scaling::parse_scaling_list_data;
use crate::conformance::ConformanceIssue;
use crate::syntax::{Opts, SyntaxReader};

/// Tile 划分
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileLayout {
    pub columns: u32,
    pub rows: u32,
    pub uniform_spacing_flag: bool,
    /// 非均匀划分时各列宽度 (CTB 数, 最后一列除外)
    pub column_widths: Vec<u32>,
    /// 非均匀划分时各行高度 (CTB 数, 最后一行除外)
    pub row_heights: Vec<u32>,
    pub loop_filter_across_tiles_enabled_flag: bool,
}

/// PPS 解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HevcPps {
    pub pps_id: u32,
    pub sps_id: u32,
    pub dependent_slice_segments_enabled_flag: bool,
    pub output_flag_present_flag: bool,
    pub num_extra_slice_header_bits: u32,
    pub sign_data_hiding_enabled_flag: bool,
    pub cabac_init_present_flag: bool,
    pub num_ref_idx_l0_default_active: u32,
    pub num_ref_idx_l1_default_active: u32,
    /// 26 + init_qp_minus26
    pub init_qp: i32,
    pub constrained_intra_pred_flag: bool,
    pub transform_skip_enabled_flag: bool,
    pub cu_qp_delta_enabled_flag: bool,
    pub diff_cu_qp_delta_depth: u32,
    pub cb_qp_offset: i32,
    pub cr_qp_offset: i32,
    pub slice_chroma_qp_offsets_present_flag: bool,
    pub weighted_pred_flag: bool,
    pub weighted_bipred_flag: bool,
    pub transquant_bypass_enabled_flag: bool,
    pub tiles: Option<TileLayout>,
    pub entropy_coding_sync_enabled_flag: bool,
    pub loop_filter_across_slices_enabled_flag: bool,
    pub deblocking_filter_control_present_flag: bool,
    pub deblocking_filter_override_enabled_flag: bool,
    pub deblocking_filter_disabled_flag: bool,
    pub beta_offset_div2: i32,
    pub tc_offset_div2: i32,
    pub scaling_list_data_present_flag: bool,
    pub lists_modification_present_flag: bool,
    /// log2_parallel_merge_level_minus2 + 2
    pub log2_parallel_merge_level: u32,
    pub slice_segment_header_extension_present_flag: bool,
    pub range_extension_flag: bool,
}

/// pic_parameter_set_rbsp()
pub fn parse_pps(r: &mut SyntaxReader<'_>, ctx: &HevcContext) -> NalResult<HevcPps> {
    let pps_id = r.read_ue_with("pps_pic_parameter_set_id", Opts::range(0, 63))?;
    let sps_id = r.read_ue_with("pps_seq_parameter_set_id", Opts::range(0, 15))?;
    let bit_depth_luma = match ctx.sps(sps_id) {
        Some(sps) => sps.bit_depth_luma,
        None => {
            r.warn(
                "pps_seq_parameter_set_id",
                ConformanceIssue::MissingReference {
                    id: u64::from(sps_id),
                },
            );
            8
        }
    };
    let qp_bd_offset = 6 * i64::from(bit_depth_luma.saturating_sub(8));

    let dependent_slice_segments_enabled_flag =
        r.read_flag("dependent_slice_segments_enabled_flag")?;
    let output_flag_present_flag = r.read_flag("output_flag_present_flag")?;
    let num_extra_slice_header_bits = r.read_bits("num_extra_slice_header_bits", 3)?;
    let sign_data_hiding_enabled_flag = r.read_flag("sign_data_hiding_enabled_flag")?;
    let cabac_init_present_flag = r.read_flag("cabac_init_present_flag")?;
    let num_ref_idx_l0_default_active = r
        .read_ue_with("num_ref_idx_l0_default_active_minus1", Opts::range(0, 14))?
        .saturating_add(1);
    let num_ref_idx_l1_default_active = r
        .read_ue_with("num_ref_idx_l1_default_active_minus1", Opts::range(0, 14))?
        .saturating_add(1);
    let init_qp = r
        .read_se_with("init_qp_minus26", Opts::range(-(26 + qp_bd_offset), 25))?
        .saturating_add(26);
    let constrained_intra_pred_flag = r.read_flag("constrained_intra_pred_flag")?;
    let transform_skip_enabled_flag = r.read_flag("transform_skip_enabled_flag")?;
    let cu_qp_delta_enabled_flag = r.read_flag("cu_qp_delta_enabled_flag")?;
    let mut diff_cu_qp_delta_depth = 0;
    if cu_qp_delta_enabled_flag {
        diff_cu_qp_delta_depth = r.read_ue("diff_cu_qp_delta_depth")?;
    }
    let cb_qp_offset = r.read_se_with("pps_cb_qp_offset", Opts::range(-12, 12))?;
    let cr_qp_offset = r.read_se_with("pps_cr_qp_offset", Opts::range(-12, 12))?;
    let slice_chroma_qp_offsets_present_flag =
        r.read_flag("pps_slice_chroma_qp_offsets_present_flag")?;
    let weighted_pred_flag = r.read_flag("weighted_pred_flag")?;
    let weighted_bipred_flag = r.read_flag("weighted_bipred_flag")?;
    let transquant_bypass_enabled_flag = r.read_flag("transquant_bypass_enabled_flag")?;
    let tiles_enabled_flag = r.read_flag("tiles_enabled_flag")?;
    let entropy_coding_sync_enabled_flag = r.read_flag("entropy_coding_sync_enabled_flag")?;

    let mut tiles = None;
    if tiles_enabled_flag {
        tiles = Some(tile_layout(r)?);
    }

    let loop_filter_across_slices_enabled_flag =
        r.read_flag("pps_loop_filter_across_slices_enabled_flag")?;
    let deblocking_filter_control_present_flag =
        r.read_flag("deblocking_filter_control_present_flag")?;
    let mut deblocking_filter_override_enabled_flag = false;
    let mut deblocking_filter_disabled_flag = false;
    let mut beta_offset_div2 = 0;
    let mut tc_offset_div2 = 0;
    if deblocking_filter_control_present_flag {
        deblocking_filter_override_enabled_flag =
            r.read_flag("deblocking_filter_override_enabled_flag")?;
        deblocking_filter_disabled_flag = r.read_flag("pps_deblocking_filter_disabled_flag")?;
        if !deblocking_filter_disabled_flag {
            beta_offset_div2 = r.read_se_with("pps_beta_offset_div2", Opts::range(-6, 6))?;
            tc_offset_div2 = r.read_se_with("pps_tc_offset_div2", Opts::range(-6, 6))?;
        }
    }

    let scaling_list_data_present_flag = r.read_flag("pps_scaling_list_data_present_flag")?;
    if scaling_list_data_present_flag {
        r.structure("scaling_list_data", parse_scaling_list_data)?;
    }
    let lists_modification_present_flag = r.read_flag("lists_modification_present_flag")?;
    let log2_parallel_merge_level = r
        .read_ue("log2_parallel_merge_level_minus2")?
        .saturating_add(2);
    let slice_segment_header_extension_present_flag =
        r.read_flag("slice_segment_header_extension_present_flag")?;

    let mut range_extension_flag = false;
    if r.read_flag("pps_extension_present_flag")? {
        range_extension_flag = r.read_flag("pps_range_extension_flag")?;
        let multilayer = r.read_flag("pps_multilayer_extension_flag")?;
        let ext_3d = r.read_flag("pps_3d_extension_flag")?;
        let scc = r.read_flag("pps_scc_extension_flag")?;
        let ext_4bits = r.read_bits("pps_extension_4bits", 4)?;
        if range_extension_flag {
            r.structure("pps_range_extension", |r| {
                range_extension(r, transform_skip_enabled_flag)
            })?;
        }
        if multilayer || ext_3d || scc || ext_4bits != 0 {
            r.read_extension_data("pps_extension_data_flag")?;
        }
    }
    r.rbsp_trailing_bits()?;

    Ok(HevcPps {
        pps_id,
        sps_id,
        dependent_slice_segments_enabled_flag,
        output_flag_present_flag,
        num_extra_slice_header_bits,
        sign_data_hiding_enabled_flag,
        cabac_init_present_flag,
        num_ref_idx_l0_default_active,
        num_ref_idx_l1_default_active,
        init_qp,
        constrained_intra_pred_flag,
        transform_skip_enabled_flag,
        cu_qp_delta_enabled_flag,
        diff_cu_qp_delta_depth,
        cb_qp_offset,
        cr_qp_offset,
        slice_chroma_qp_offsets_present_flag,
        weighted_pred_flag,
        weighted_bipred_flag,
        transquant_bypass_enabled_flag,
        tiles,
        entropy_coding_sync_enabled_flag,
        loop_filter_across_slices_enabled_flag,
        deblocking_filter_control_present_flag,
        deblocking_filter_override_enabled_flag,
        deblocking_filter_disabled_flag,
        beta_offset_div2,
        tc_offset_div2,
        scaling_list_data_present_flag,
        lists_modification_present_flag,
        log2_parallel_merge_level,
        slice_segment_header_extension_present_flag,
        range_extension_flag,
    })
}

/// tiles_enabled_flag 之后的 tile 行列参数
fn tile_layout(r: &mut SyntaxReader<'_>) -> NalResult<TileLayout> {
    let columns_minus1 = r.read_ue("num_tile_columns_minus1")?;
    let rows_minus1 = r.read_ue("num_tile_rows_minus1")?;
    let uniform_spacing_flag = r.read_flag("uniform_spacing_flag")?;
    let mut column_widths = Vec::new();
    let mut row_heights = Vec::new();
    if !uniform_spacing_flag {
        for i in 0..columns_minus1 {
            let w = r.read_ue(&format!("column_width_minus1[{i}]"))?;
            column_widths.push(w.saturating_add(1));
        }
        for i in 0..rows_minus1 {
            let h = r.read_ue(&format!("row_height_minus1[{i}]"))?;
            row_heights.push(h.saturating_add(1));
        }
    }
    let loop_filter_across_tiles_enabled_flag =
        r.read_flag("loop_filter_across_tiles_enabled_flag")?;
    Ok(TileLayout {
        columns: columns_minus1.saturating_add(1),
        rows: rows_minus1.saturating_add(1),
        uniform_spacing_flag,
        column_widths,
        row_heights,
        loop_filter_across_tiles_enabled_flag,
    })
}

/// pps_range_extension()
fn range_extension(r: &mut SyntaxReader<'_>, transform_skip_enabled: bool) -> NalResult<()> {
    if transform_skip_enabled {
        r.read_ue("log2_max_transform_skip_block_size_minus2")?;
    }
    r.read_flag("cross_component_prediction_enabled_flag")?;
    if r.read_flag("chroma_qp_offset_list_enabled_flag")? {
        r.read_ue("diff_cu_chroma_qp_offset_depth")?;
        let len_minus1 =
            r.read_ue_with("chroma_qp_offset_list_len_minus1", Opts::range(0, 5))?;
        for i in 0..=len_minus1 {
            r.read_se_with(&format!("cb_qp_offset_list[{i}]"), Opts::range(-12, 12))?;
            r.read_se_with(&format!("cr_qp_offset_list[{i}]"), Opts::range(-12, 12))?;
        }
    }
    r.read_ue("log2_sao_offset_scale_luma")?;
    r.read_ue("log2_sao_offset_scale_chroma")?;
    Ok(())
}

/// 测试用: pps_id 0 引用 sps_id 0, 无 tile, 开启去块滤波控制
#[cfg(test)]
pub(crate) fn write_minimal_pps(bw: &mut nalyzer_core::BitWriter) {
    write_pps_fields(bw);
    bw.write_flag(false); // pps_extension_present_flag
    bw.write_rbsp_trailing_bits();
}

/// pps_extension_present_flag 之前的全部字段
#[cfg(test)]
fn write_pps_fields(bw: &mut nalyzer_core::BitWriter) {
    bw.write_ue(0);
    bw.write_ue(0);
    bw.write_flag(false);
    bw.write_flag(false);
    bw.write_bits(0, 3);
    bw.write_flag(true); // sign_data_hiding
    bw.write_flag(false);
    bw.write_ue(2); // num_ref_idx_l0_default_active_minus1
    bw.write_ue(0);
    bw.write_se(-4); // init_qp 22
    bw.write_flag(false);
    bw.write_flag(true); // transform_skip_enabled_flag
    bw.write_flag(true); // cu_qp_delta_enabled_flag
    bw.write_ue(1);
    bw.write_se(1);
    bw.write_se(-1);
    bw.write_flag(false);
    bw.write_flag(false);
    bw.write_flag(false);
    bw.write_flag(false);
    bw.write_flag(false); // tiles_enabled_flag
    bw.write_flag(true); // entropy_coding_sync
    bw.write_flag(true);
    bw.write_flag(true); // deblocking_filter_control_present_flag
    bw.write_flag(false);
    bw.write_flag(false);
    bw.write_se(2);
    bw.write_se(-2);
    bw.write_flag(false); // pps_scaling_list_data_present_flag
    bw.write_flag(false);
    bw.write_ue(0);
    bw.write_flag(false);
}
