//! VVC profile_tier_level() 与 general_constraints_info() 语法.

use nalyzer_core::NalResult;

use crate::syntax::{Opts, SyntaxReader};

/// general_constraints_info() 摘要
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GeneralConstraints {
    pub present_flag: bool,
    pub intra_only_constraint_flag: bool,
    pub one_au_only_constraint_flag: bool,
    /// 16 - gci_sixteen_minus_max_bitdepth_constraint_idc
    pub max_bitdepth: u32,
    /// 3 - gci_three_minus_max_chroma_format_constraint_idc
    pub max_chroma_format_idc: u32,
    pub num_additional_bits: u32,
}

/// profile_tier_level() 解析结果
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VvcPtl {
    /// profileTierPresentFlag 为 0 时为 `None`
    pub general_profile_idc: Option<u8>,
    pub general_tier_flag: Option<bool>,
    pub general_level_idc: u8,
    pub frame_only_constraint_flag: bool,
    pub multilayer_enabled_flag: bool,
    pub constraints: Option<GeneralConstraints>,
    /// 各子层的 level (未出现的按上一层推断), 下标为子层号
    pub sublayer_level_idc: Vec<u8>,
    pub sub_profile_idc: Vec<u32>,
}

/// general_profile_idc 名称
pub fn profile_name(profile_idc: u32) -> Option<&'static str> {
    let name = match profile_idc {
        1 => "Main 10",
        2 => "Main 12",
        10 => "Main 12 Intra",
        17 => "Multilayer Main 10",
        33 => "Main 10 4:4:4",
        34 => "Main 12 4:4:4",
        35 => "Main 16 4:4:4",
        42 => "Main 12 4:4:4 Intra",
        43 => "Main 16 4:4:4 Intra",
        49 => "Multilayer Main 10 4:4:4",
        65 => "Main 10 Still Picture",
        66 => "Main 12 Still Picture",
        97 => "Main 10 4:4:4 Still Picture",
        98 => "Main 12 4:4:4 Still Picture",
        99 => "Main 16 4:4:4 Still Picture",
        _ => return None,
    };
    Some(name)
}

fn profile_meaning(v: u64) -> Option<String> {
    profile_name(v as u32).map(str::to_string)
}

fn level_meaning(v: u64) -> Option<String> {
    Some(format!("{}.{}", v / 16, (v % 16) / 3))
}

const TIER_NAMES: &[&str] = &["Main", "High"];

/// gci_present_flag 之后、gci_num_additional_bits 之前的 71 位
const GCI_FIELDS: &[(&str, u32)] = &[
    ("gci_intra_only_constraint_flag", 1),
    ("gci_all_layers_independent_constraint_flag", 1),
    ("gci_one_au_only_constraint_flag", 1),
    ("gci_sixteen_minus_max_bitdepth_constraint_idc", 4),
    ("gci_three_minus_max_chroma_format_constraint_idc", 2),
    ("gci_no_mixed_nalu_types_in_pic_constraint_flag", 1),
    ("gci_no_trail_constraint_flag", 1),
    ("gci_no_stsa_constraint_flag", 1),
    ("gci_no_rasl_constraint_flag", 1),
    ("gci_no_radl_constraint_flag", 1),
    ("gci_no_idr_constraint_flag", 1),
    ("gci_no_cra_constraint_flag", 1),
    ("gci_no_gdr_constraint_flag", 1),
    ("gci_no_aps_constraint_flag", 1),
    ("gci_no_idr_rpl_constraint_flag", 1),
    ("gci_one_tile_per_pic_constraint_flag", 1),
    ("gci_pic_header_in_slice_header_constraint_flag", 1),
    ("gci_one_slice_per_pic_constraint_flag", 1),
    ("gci_no_rectangular_slice_constraint_flag", 1),
    ("gci_one_slice_per_subpic_constraint_flag", 1),
    ("gci_no_subpic_info_constraint_flag", 1),
    ("gci_three_minus_max_log2_ctu_size_constraint_idc", 2),
    ("gci_no_partition_constraints_override_constraint_flag", 1),
    ("gci_no_mtt_constraint_flag", 1),
    ("gci_no_qtbtt_dual_tree_intra_constraint_flag", 1),
    ("gci_no_palette_constraint_flag", 1),
    ("gci_no_ibc_constraint_flag", 1),
    ("gci_no_isp_constraint_flag", 1),
    ("gci_no_mrl_constraint_flag", 1),
    ("gci_no_mip_constraint_flag", 1),
    ("gci_no_cclm_constraint_flag", 1),
    ("gci_no_ref_pic_resampling_constraint_flag", 1),
    ("gci_no_res_change_in_clvs_constraint_flag", 1),
    ("gci_no_weighted_prediction_constraint_flag", 1),
    ("gci_no_ref_wraparound_constraint_flag", 1),
    ("gci_no_temporal_mvp_constraint_flag", 1),
    ("gci_no_sbtmvp_constraint_flag", 1),
    ("gci_no_amvr_constraint_flag", 1),
    ("gci_no_bdof_constraint_flag", 1),
    ("gci_no_smvd_constraint_flag", 1),
    ("gci_no_dmvr_constraint_flag", 1),
    ("gci_no_mmvd_constraint_flag", 1),
    ("gci_no_affine_motion_constraint_flag", 1),
    ("gci_no_prof_constraint_flag", 1),
    ("gci_no_bcw_constraint_flag", 1),
    ("gci_no_ciip_constraint_flag", 1),
    ("gci_no_gpm_constraint_flag", 1),
    ("gci_no_luma_transform_size_64_constraint_flag", 1),
    ("gci_no_transform_skip_constraint_flag", 1),
    ("gci_no_bdpcm_constraint_flag", 1),
    ("gci_no_mts_constraint_flag", 1),
    ("gci_no_lfnst_constraint_flag", 1),
    ("gci_no_joint_cbcr_constraint_flag", 1),
    ("gci_no_sbt_constraint_flag", 1),
    ("gci_no_act_constraint_flag", 1),
    ("gci_no_explicit_scaling_list_constraint_flag", 1),
    ("gci_no_dep_quant_constraint_flag", 1),
    ("gci_no_sign_data_hiding_constraint_flag", 1),
    ("gci_no_cu_qp_delta_constraint_flag", 1),
    ("gci_no_chroma_qp_offset_constraint_flag", 1),
    ("gci_no_sao_constraint_flag", 1),
    ("gci_no_alf_constraint_flag", 1),
    ("gci_no_ccalf_constraint_flag", 1),
    ("gci_no_lmcs_constraint_flag", 1),
    ("gci_no_ladf_constraint_flag", 1),
    ("gci_no_virtual_boundaries_constraint_flag", 1),
];

/// gci_num_additional_bits > 5 时出现的 6 个标志
const GCI_ADDITIONAL_FLAGS: &[&str] = &[
    "gci_all_rap_pictures_constraint_flag",
    "gci_no_extended_precision_processing_constraint_flag",
    "gci_no_ts_residual_coding_rice_constraint_flag",
    "gci_no_rrc_rice_extension_constraint_flag",
    "gci_no_persistent_rice_adaptation_constraint_flag",
    "gci_no_reverse_last_sig_coeff_constraint_flag",
];

/// profile_tier_level(profileTierPresentFlag, MaxNumSubLayersMinus1)
pub fn parse_ptl(
    r: &mut SyntaxReader<'_>,
    profile_tier_present: bool,
    max_sub_layers_minus1: u32,
) -> NalResult<VvcPtl> {
    let mut ptl = VvcPtl::default();
    if profile_tier_present {
        ptl.general_profile_idc = Some(r.read_bits_with(
            "general_profile_idc",
            7,
            Opts::lookup(profile_meaning),
        )? as u8);
        ptl.general_tier_flag =
            Some(r.read_flag_with("general_tier_flag", Opts::table(TIER_NAMES))?);
    }
    ptl.general_level_idc =
        r.read_bits_with("general_level_idc", 8, Opts::lookup(level_meaning))? as u8;
    ptl.frame_only_constraint_flag = r.read_flag("ptl_frame_only_constraint_flag")?;
    ptl.multilayer_enabled_flag = r.read_flag("ptl_multilayer_enabled_flag")?;
    if profile_tier_present {
        ptl.constraints = Some(r.structure("general_constraints_info", general_constraints_info)?);
    }

    let max = max_sub_layers_minus1 as usize;
    let mut present = vec![false; max];
    for i in (0..max).rev() {
        present[i] = r.read_flag(&format!("ptl_sublayer_level_present_flag[{i}]"))?;
    }
    r.byte_align("ptl_reserved_zero_bit")?;

    // 未出现的子层 level 等于上一子层, 最高子层等于 general_level_idc
    let mut levels = vec![ptl.general_level_idc; max + 1];
    for i in (0..max).rev() {
        levels[i] = if present[i] {
            let name = format!("sublayer_level_idc[{i}]");
            r.read_bits_with(&name, 8, Opts::lookup(level_meaning))? as u8
        } else {
            levels[i + 1]
        };
    }
    ptl.sublayer_level_idc = levels;

    if profile_tier_present {
        let num_sub_profiles = r.read_bits("ptl_num_sub_profiles", 8)?;
        for i in 0..num_sub_profiles {
            let idc = r.read_bits(&format!("general_sub_profile_idc[{i}]"), 32)?;
            ptl.sub_profile_idc.push(idc);
        }
    }
    Ok(ptl)
}

/// general_constraints_info()
fn general_constraints_info(r: &mut SyntaxReader<'_>) -> NalResult<GeneralConstraints> {
    let mut gci = GeneralConstraints {
        present_flag: r.read_flag("gci_present_flag")?,
        max_bitdepth: 16,
        max_chroma_format_idc: 3,
        ..GeneralConstraints::default()
    };
    if gci.present_flag {
        for &(name, bits) in GCI_FIELDS {
            let v = r.read_bits(name, bits)?;
            match name {
                "gci_intra_only_constraint_flag" => gci.intra_only_constraint_flag = v == 1,
                "gci_one_au_only_constraint_flag" => gci.one_au_only_constraint_flag = v == 1,
                "gci_sixteen_minus_max_bitdepth_constraint_idc" => {
                    gci.max_bitdepth = 16u32.saturating_sub(v);
                }
                "gci_three_minus_max_chroma_format_constraint_idc" => {
                    gci.max_chroma_format_idc = 3u32.saturating_sub(v);
                }
                _ => {}
            }
        }
        gci.num_additional_bits = r.read_bits("gci_num_additional_bits", 8)?;
        let mut used = 0;
        if gci.num_additional_bits > 5 {
            for name in GCI_ADDITIONAL_FLAGS {
                r.read_flag(name)?;
            }
            used = GCI_ADDITIONAL_FLAGS.len() as u32;
        }
        for i in 0..gci.num_additional_bits - used {
            r.read_flag(&format!("gci_reserved_bit[{i}]"))?;
        }
    }
    r.byte_align("gci_alignment_zero_bit")?;
    Ok(gci)
}

/// 测试用: Main 10, Main tier, level 3.1, 无 GCI, 无子层
#[cfg(test)]
pub(crate) fn write_main10_ptl(bw: &mut nalyzer_core::BitWriter) {
    bw.write_bits(1, 7);
    bw.write_flag(false);
    bw.write_bits(51, 8);
    bw.write_flag(true); // ptl_frame_only_constraint_flag
    bw.write_flag(false);
    bw.write_flag(false); // gci_present_flag
    bw.write_bits(0, 5); // gci_alignment_zero_bit
    bw.write_bits(0, 8); // ptl_num_sub_profiles
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalyzer_core::BitWriter;

    #[test]
    fn test_minimal_ptl() {
        let mut bw = BitWriter::new();
        write_main10_ptl(&mut bw);
        let data = bw.finish();
        assert_eq!(data, [0x02, 0x33, 0x80, 0x00]);

        let mut r = SyntaxReader::new(&data, "profile_tier_level");
        let ptl = parse_ptl(&mut r, true, 0).unwrap();
        assert_eq!(ptl.general_profile_idc, Some(1));
        assert_eq!(ptl.general_tier_flag, Some(false));
        assert_eq!(ptl.sublayer_level_idc, vec![51]);
        assert!(ptl.frame_only_constraint_flag);
        assert_eq!(ptl.constraints.map(|c| c.present_flag), Some(false));

        let out = r.finish();
        assert!(out.is_complete());
        assert!(out.warnings.is_empty());
        assert_eq!(
            out.log.find("general_profile_idc").and_then(|e| e.meaning.as_deref()),
            Some("Main 10")
        );
        assert_eq!(
            out.log.find("general_level_idc").and_then(|e| e.meaning.as_deref()),
            Some("3.1")
        );
        assert_eq!(out.log.find("gci_alignment_zero_bit").map(|e| e.bit_len), Some(5));
    }

    #[test]
    fn test_constraints_present() {
        let mut bw = BitWriter::new();
        bw.write_flag(true); // gci_present_flag
        bw.write_flag(true); // intra only
        bw.write_flag(false);
        bw.write_flag(false);
        bw.write_bits(6, 4); // 最大 10 bit
        bw.write_bits(2, 2); // 最大 4:2:0
        bw.write_bits_u64(0, 62);
        bw.write_bits(8, 8); // 6 个已定义标志加 2 个保留位
        bw.write_bits(0, 8);
        // 1 + 71 + 8 + 8 = 88 位, 已对齐
        let data = bw.finish();
        assert_eq!(data.len(), 11);

        let mut r = SyntaxReader::new(&data, "general_constraints_info");
        let gci = general_constraints_info(&mut r).unwrap();
        assert!(gci.intra_only_constraint_flag);
        assert_eq!(gci.max_bitdepth, 10);
        assert_eq!(gci.max_chroma_format_idc, 1);
        assert_eq!(gci.num_additional_bits, 8);

        let out = r.finish();
        assert!(out.is_complete());
        assert!(out.log.find("gci_no_reverse_last_sig_coeff_constraint_flag").is_some());
        assert!(out.log.find("gci_reserved_bit[1]").is_some());
        assert!(out.log.find("gci_alignment_zero_bit").is_none());
    }

    #[test]
    fn test_sublayer_levels_inferred() {
        let mut bw = BitWriter::new();
        bw.write_bits(51, 8); // general_level_idc
        bw.write_flag(false);
        bw.write_flag(false);
        // 子层 1、0 的 present 标志
        bw.write_flag(false);
        bw.write_flag(true);
        bw.write_bits(0, 4); // ptl_reserved_zero_bit
        bw.write_bits(32, 8); // sublayer_level_idc[0]
        let data = bw.finish();

        let mut r = SyntaxReader::new(&data, "profile_tier_level");
        let ptl = parse_ptl(&mut r, false, 2).unwrap();
        assert_eq!(ptl.sublayer_level_idc, vec![32, 51, 51]);
        assert!(ptl.general_profile_idc.is_none());
        let out = r.finish();
        assert!(out.is_complete());
        assert!(out.log.find("ptl_sublayer_level_present_flag[1]").is_some());
        assert!(out.log.find("sublayer_level_idc[1]").is_none());
    }
}
