//! HEVC hrd_parameters() 语法 (附录 E.2.2).

use nalyzer_core::NalResult;

use crate::syntax::{Opts, SyntaxReader};

/// HRD 参数摘要
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HevcHrd {
    pub nal_hrd_parameters_present_flag: bool,
    pub vcl_hrd_parameters_present_flag: bool,
    pub sub_pic_hrd_params_present_flag: bool,
    /// 每个子层的 CPB 数量 (cpb_cnt_minus1 + 1)
    pub cpb_count: Vec<u32>,
}

/// hrd_parameters(commonInfPresentFlag, maxNumSubLayersMinus1)
pub fn parse_hrd(
    r: &mut SyntaxReader<'_>,
    common_inf_present: bool,
    max_sub_layers_minus1: u32,
) -> NalResult<HevcHrd> {
    let mut hrd = HevcHrd::default();
    if common_inf_present {
        hrd.nal_hrd_parameters_present_flag = r.read_flag("nal_hrd_parameters_present_flag")?;
        hrd.vcl_hrd_parameters_present_flag = r.read_flag("vcl_hrd_parameters_present_flag")?;
        if hrd.nal_hrd_parameters_present_flag || hrd.vcl_hrd_parameters_present_flag {
            hrd.sub_pic_hrd_params_present_flag =
                r.read_flag("sub_pic_hrd_params_present_flag")?;
            if hrd.sub_pic_hrd_params_present_flag {
                r.read_bits("tick_divisor_minus2", 8)?;
                r.read_bits("du_cpb_removal_delay_increment_length_minus1", 5)?;
                r.read_flag("sub_pic_cpb_params_in_pic_timing_sei_flag")?;
                r.read_bits("dpb_output_delay_du_length_minus1", 5)?;
            }
            r.read_bits("bit_rate_scale", 4)?;
            r.read_bits("cpb_size_scale", 4)?;
            if hrd.sub_pic_hrd_params_present_flag {
                r.read_bits("cpb_size_du_scale", 4)?;
            }
            r.read_bits("initial_cpb_removal_delay_length_minus1", 5)?;
            r.read_bits("au_cpb_removal_delay_length_minus1", 5)?;
            r.read_bits("dpb_output_delay_length_minus1", 5)?;
        }
    }

    for i in 0..=max_sub_layers_minus1 {
        let fixed_pic_rate_general = r.read_flag(&format!("fixed_pic_rate_general_flag[{i}]"))?;
        // general 置位时 within_cvs 推断为 1
        let fixed_pic_rate_within_cvs = if fixed_pic_rate_general {
            true
        } else {
            r.read_flag(&format!("fixed_pic_rate_within_cvs_flag[{i}]"))?
        };
        let mut low_delay = false;
        if fixed_pic_rate_within_cvs {
            r.read_ue_with(
                &format!("elemental_duration_in_tc_minus1[{i}]"),
                Opts::range(0, 2047),
            )?;
        } else {
            low_delay = r.read_flag(&format!("low_delay_hrd_flag[{i}]"))?;
        }
        let cpb_cnt = if low_delay {
            1
        } else {
            r.read_ue_with(&format!("cpb_cnt_minus1[{i}]"), Opts::range(0, 31))?.saturating_add(1)
        };
        hrd.cpb_count.push(cpb_cnt);

        if hrd.nal_hrd_parameters_present_flag {
            r.structure(format!("nal_sub_layer_hrd_parameters[{i}]"), |r| {
                sub_layer_hrd(r, cpb_cnt, hrd.sub_pic_hrd_params_present_flag)
            })?;
        }
        if hrd.vcl_hrd_parameters_present_flag {
            r.structure(format!("vcl_sub_layer_hrd_parameters[{i}]"), |r| {
                sub_layer_hrd(r, cpb_cnt, hrd.sub_pic_hrd_params_present_flag)
            })?;
        }
    }
    Ok(hrd)
}

/// sub_layer_hrd_parameters(subLayerId)
fn sub_layer_hrd(r: &mut SyntaxReader<'_>, cpb_cnt: u32, sub_pic: bool) -> NalResult<()> {
    for i in 0..cpb_cnt {
        r.read_ue(&format!("bit_rate_value_minus1[{i}]"))?;
        r.read_ue(&format!("cpb_size_value_minus1[{i}]"))?;
        if sub_pic {
            r.read_ue(&format!("cpb_size_du_value_minus1[{i}]"))?;
            r.read_ue(&format!("bit_rate_du_value_minus1[{i}]"))?;
        }
        r.read_flag(&format!("cbr_flag[{i}]"))?;
    }
    Ok(())
}
