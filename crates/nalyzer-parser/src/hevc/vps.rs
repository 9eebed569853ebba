//! HEVC VPS (Video Parameter Set) 解析.

use nalyzer_core::NalResult;

use super::hrd::parse_hrd;
use super::ptl::{HevcPtl, parse_ptl};
use super::vui::{HevcTiming, timing_info};
use crate::syntax::{Opts, SyntaxReader};

/// 子层的 DPB 与重排序参数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SubLayerOrdering {
    pub max_dec_pic_buffering: u32,
    pub max_num_reorder_pics: u32,
    pub max_latency_increase_plus1: u32,
}

/// VPS 解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HevcVps {
    pub vps_id: u8,
    pub base_layer_internal_flag: bool,
    pub base_layer_available_flag: bool,
    pub max_layers: u32,
    pub max_sub_layers: u32,
    pub temporal_id_nesting_flag: bool,
    pub ptl: HevcPtl,
    pub sub_layer_ordering: Vec<SubLayerOrdering>,
    pub max_layer_id: u32,
    pub num_layer_sets: u32,
    pub timing: Option<HevcTiming>,
    pub num_hrd_parameters: u32,
}

/// {prefix}_sub_layer_ordering_info_present_flag 及各子层参数
///
/// 标志为 0 时只给出最高子层的参数, 其余子层与之相同.
pub(crate) fn sub_layer_ordering_info(
    r: &mut SyntaxReader<'_>,
    prefix: &str,
    max_sub_layers_minus1: u32,
) -> NalResult<Vec<SubLayerOrdering>> {
    let present = r.read_flag(&format!("{prefix}_sub_layer_ordering_info_present_flag"))?;
    let first = if present { 0 } else { max_sub_layers_minus1 };
    let mut ordering = Vec::new();
    for i in first..=max_sub_layers_minus1 {
        let buffering = r.read_ue_with(
            &format!("{prefix}_max_dec_pic_buffering_minus1[{i}]"),
            Opts::range(0, 15),
        )?;
        let reorder = r.read_ue_with(
            &format!("{prefix}_max_num_reorder_pics[{i}]"),
            Opts::range(0, i64::from(buffering)),
        )?;
        let latency = r.read_ue(&format!("{prefix}_max_latency_increase_plus1[{i}]"))?;
        ordering.push(SubLayerOrdering {
            max_dec_pic_buffering: buffering.saturating_add(1),
            max_num_reorder_pics: reorder,
            max_latency_increase_plus1: latency,
        });
    }
    Ok(ordering)
}

/// video_parameter_set_rbsp()
pub fn parse_vps(r: &mut SyntaxReader<'_>) -> NalResult<HevcVps> {
    let vps_id = r.read_bits("vps_video_parameter_set_id", 4)? as u8;
    let base_layer_internal_flag = r.read_flag("vps_base_layer_internal_flag")?;
    let base_layer_available_flag = r.read_flag("vps_base_layer_available_flag")?;
    let max_layers = r.read_bits("vps_max_layers_minus1", 6)? + 1;
    let max_sub_layers_minus1 = r.read_bits_with("vps_max_sub_layers_minus1", 3, Opts::range(0, 6))?;
    let temporal_id_nesting_flag = r.read_flag("vps_temporal_id_nesting_flag")?;
    r.read_reserved("vps_reserved_0xffff_16bits", 16, 0xFFFF)?;

    let ptl = r.structure("profile_tier_level", |r| {
        parse_ptl(r, true, max_sub_layers_minus1)
    })?;
    let sub_layer_ordering = sub_layer_ordering_info(r, "vps", max_sub_layers_minus1)?;

    let max_layer_id = r.read_bits("vps_max_layer_id", 6)?;
    let num_layer_sets_minus1 = r.read_ue_with("vps_num_layer_sets_minus1", Opts::range(0, 1023))?;
    for i in 1..=num_layer_sets_minus1 {
        for j in 0..=max_layer_id {
            r.read_flag(&format!("layer_id_included_flag[{i}][{j}]"))?;
        }
    }

    let mut timing = None;
    let mut num_hrd_parameters = 0;
    if r.read_flag("vps_timing_info_present_flag")? {
        timing = Some(timing_info(r, "vps")?);
        num_hrd_parameters = r.read_ue_with(
            "vps_num_hrd_parameters",
            Opts::range(0, i64::from(num_layer_sets_minus1) + 1),
        )?;
        for i in 0..num_hrd_parameters {
            r.read_ue(&format!("hrd_layer_set_idx[{i}]"))?;
            let cprms_present = i == 0 || r.read_flag(&format!("cprms_present_flag[{i}]"))?;
            r.structure(format!("hrd_parameters[{i}]"), |r| {
                parse_hrd(r, cprms_present, max_sub_layers_minus1)
            })?;
        }
    }

    if r.read_flag("vps_extension_flag")? {
        r.read_extension_data("vps_extension_data_flag")?;
    }
    r.rbsp_trailing_bits()?;

    Ok(HevcVps {
        vps_id,
        base_layer_internal_flag,
        base_layer_available_flag,
        max_layers,
        max_sub_layers: max_sub_layers_minus1 + 1,
        temporal_id_nesting_flag,
        ptl,
        sub_layer_ordering,
        max_layer_id,
        num_layer_sets: num_layer_sets_minus1.saturating_add(1),
        timing,
        num_hrd_parameters,
    })
}

#[cfg(test)]
pub(crate) fn write_minimal_vps(bw: &mut nalyzer_core::BitWriter) {
    bw.write_bits(0, 4);
    bw.write_flag(true);
    bw.write_flag(true);
    bw.write_bits(0, 6);
    bw.write_bits(0, 3);
    bw.write_flag(true);
    bw.write_bits(0xFFFF, 16);
    super::ptl::write_main_ptl(bw);
    bw.write_flag(true); // vps_sub_layer_ordering_info_present_flag
    bw.write_ue(4);
    bw.write_ue(2);
    bw.write_ue(0);
    bw.write_bits(0, 6); // vps_max_layer_id
    bw.write_ue(0); // vps_num_layer_sets_minus1
    bw.write_flag(false); // vps_timing_info_present_flag
    bw.write_flag(false); // vps_extension_flag
    bw.write_rbsp_trailing_bits();
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalyzer_core::BitWriter;

    #[test]
    fn test_minimal_vps() {
        let mut bw = BitWriter::new();
        write_minimal_vps(&mut bw);
        let data = bw.finish();

        let mut r = SyntaxReader::new(&data, "video_parameter_set_rbsp");
        let vps = parse_vps(&mut r).unwrap();
        assert_eq!(vps.max_sub_layers, 1);
        assert_eq!(vps.ptl.general.map(|p| p.profile_idc), Some(1));
        assert_eq!(vps.sub_layer_ordering[0].max_dec_pic_buffering, 5);
        let out = r.finish();
        assert!(out.is_complete());
        assert!(out.warnings.is_empty());
        assert_eq!(out.log.len(), out.node.field_count());
    }

    #[test]
    fn test_reserved_0xffff_mismatch_warns() {
        let mut bw = BitWriter::new();
        write_minimal_vps(&mut bw);
        let mut data = bw.finish();
        // vps_reserved_0xffff_16bits 位于第 2、3 字节
        data[2] = 0x00;
        let mut r = SyntaxReader::new(&data, "video_parameter_set_rbsp");
        parse_vps(&mut r).unwrap();
        let out = r.finish();
        assert_eq!(out.warnings.len(), 1);
        assert_eq!(out.warnings[0].field, "vps_reserved_0xffff_16bits");
    }

    #[test]
    fn test_sub_layer_ordering_single_entry() {
        let mut bw = BitWriter::new();
        bw.write_flag(false);
        bw.write_ue(3);
        bw.write_ue(5); // 大于 max_dec_pic_buffering_minus1
        bw.write_ue(0);
        let data = bw.finish();
        let mut r = SyntaxReader::new(&data, "test");
        let ordering = sub_layer_ordering_info(&mut r, "sps", 2).unwrap();
        assert_eq!(ordering.len(), 1);
        let out = r.finish();
        assert!(out.log.find("sps_max_dec_pic_buffering_minus1[2]").is_some());
        assert_eq!(out.warnings.len(), 1);
    }
}
