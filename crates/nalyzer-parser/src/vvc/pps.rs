//! H.266/VVC PPS (Picture Parameter Set) 解析.
//!
//! 展开到 pps_subpic_id_mapping_present_flag 为止; 图像划分、量化、去块等后续语法
//! 记录为 `pps_remaining_data`.
//!
//! 图像尺寸不得超过所引用 SPS 的最大尺寸. 尺寸与 SPS 相同且未给出一致性窗口时,
//! 窗口沿用 SPS 的取值.

use nalyzer_core::NalResult;

use super::VvcContext;
use super::sps::ConformanceWindow;
use crate::conformance::ConformanceIssue;
use crate::syntax::{Opts, SyntaxReader};

/// 缩放窗口偏移 (以色度采样单位计, 可为负)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScalingWindow {
    pub left: i32,
    pub right: i32,
    pub top: i32,
    pub bottom: i32,
}

/// PPS 解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VvcPps {
    pub pps_id: u32,
    pub sps_id: u32,
    pub mixed_nalu_types_in_pic_flag: bool,
    pub pic_width: u32,
    pub pic_height: u32,
    pub conf_win: ConformanceWindow,
    pub scaling_win: Option<ScalingWindow>,
    pub output_flag_present_flag: bool,
    pub no_pic_partition_flag: bool,
    pub subpic_id_mapping_present_flag: bool,
}

/// pic_parameter_set_rbsp()
pub fn parse_pps(r: &mut SyntaxReader<'_>, ctx: &VvcContext) -> NalResult<VvcPps> {
    let pps_id = r.read_bits("pps_pic_parameter_set_id", 6)?;
    let sps_id = r.read_bits("pps_seq_parameter_set_id", 4)?;
    let sps = ctx.sps(sps_id);
    if sps.is_none() {
        r.warn(
            "pps_seq_parameter_set_id",
            ConformanceIssue::MissingReference {
                id: u64::from(sps_id),
            },
        );
    }
    let mixed_nalu_types_in_pic_flag = r.read_flag("pps_mixed_nalu_types_in_pic_flag")?;

    let max = |v: Option<u32>| v.map_or(i64::from(u32::MAX), i64::from);
    let pic_width = r.read_ue_with(
        "pps_pic_width_in_luma_samples",
        Opts::range(1, max(sps.map(|s| s.pic_width_max))),
    )?;
    let pic_height = r.read_ue_with(
        "pps_pic_height_in_luma_samples",
        Opts::range(1, max(sps.map(|s| s.pic_height_max))),
    )?;

    let conf_win = if r.read_flag("pps_conformance_window_flag")? {
        ConformanceWindow::parse(r, "pps")?
    } else {
        sps.filter(|s| s.pic_width_max == pic_width && s.pic_height_max == pic_height)
            .map(|s| s.conf_win)
            .unwrap_or_default()
    };

    let mut scaling_win = None;
    if r.read_flag("pps_scaling_window_explicit_signalling_flag")? {
        scaling_win = Some(ScalingWindow {
            left: r.read_se("pps_scaling_win_left_offset")?,
            right: r.read_se("pps_scaling_win_right_offset")?,
            top: r.read_se("pps_scaling_win_top_offset")?,
            bottom: r.read_se("pps_scaling_win_bottom_offset")?,
        });
    }
    let output_flag_present_flag = r.read_flag("pps_output_flag_present_flag")?;
    let no_pic_partition_flag = r.read_flag("pps_no_pic_partition_flag")?;
    let subpic_id_mapping_present_flag = r.read_flag("pps_subpic_id_mapping_present_flag")?;

    r.read_remaining_data("pps_remaining_data")?;
    r.rbsp_trailing_bits()?;

    Ok(VvcPps {
        pps_id,
        sps_id,
        mixed_nalu_types_in_pic_flag,
        pic_width,
        pic_height,
        conf_win,
        scaling_win,
        output_flag_present_flag,
        no_pic_partition_flag,
        subpic_id_mapping_present_flag,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::Grammar;
    use crate::vvc::{Vvc, VvcUpdate, sps};
    use nalyzer_core::BitWriter;

    fn write_pps_head(bw: &mut BitWriter, sps_id: u32, width: u32, height: u32) {
        bw.write_bits(2, 6);
        bw.write_bits(sps_id, 4);
        bw.write_flag(false);
        bw.write_ue(width);
        bw.write_ue(height);
        bw.write_flag(false); // pps_conformance_window_flag
    }

    fn context_with_sps() -> VvcContext {
        let mut bw = BitWriter::new();
        sps::write_main10_sps(&mut bw);
        let data = bw.finish();
        let mut r = SyntaxReader::new(&data, "seq_parameter_set_rbsp");
        let sps = sps::parse_sps(&mut r).unwrap();
        let mut ctx = VvcContext::default();
        Vvc::commit(&mut ctx, VvcUpdate::Sps(sps));
        ctx
    }

    #[test]
    fn test_window_inherited_from_sps() {
        let mut bw = BitWriter::new();
        write_pps_head(&mut bw, 0, 1920, 1088);
        bw.write_flag(true); // 缩放窗口
        bw.write_se(0);
        bw.write_se(0);
        bw.write_se(-2);
        bw.write_se(4);
        bw.write_flag(false);
        bw.write_flag(true); // pps_no_pic_partition_flag
        bw.write_flag(false);
        bw.write_bits(0b101, 3);
        bw.write_rbsp_trailing_bits();
        let data = bw.finish();

        let ctx = context_with_sps();
        let mut r = SyntaxReader::new(&data, "pic_parameter_set_rbsp");
        let pps = parse_pps(&mut r, &ctx).unwrap();
        assert_eq!(pps.pps_id, 2);
        assert_eq!(pps.conf_win.bottom, 4);
        assert_eq!(pps.scaling_win.map(|w| (w.top, w.bottom)), Some((-2, 4)));
        assert!(pps.no_pic_partition_flag);

        let out = r.finish();
        assert!(out.is_complete());
        assert!(out.warnings.is_empty(), "{:?}", out.warnings);
        assert_eq!(out.log.find("pps_remaining_data").map(|e| e.bit_len), Some(3));
    }

    #[test]
    fn test_missing_sps_and_oversized_picture() {
        let mut bw = BitWriter::new();
        write_pps_head(&mut bw, 5, 3840, 1088);
        bw.write_flag(false);
        bw.write_flag(false);
        bw.write_flag(false);
        bw.write_flag(false);
        bw.write_rbsp_trailing_bits();
        let data = bw.finish();

        // SPS 5 不存在: 只有引用警告
        let mut r = SyntaxReader::new(&data, "pic_parameter_set_rbsp");
        let pps = parse_pps(&mut r, &VvcContext::default()).unwrap();
        assert_eq!(pps.conf_win, ConformanceWindow::default());
        let out = r.finish();
        let kinds: Vec<&str> = out.warnings.iter().map(|w| w.issue.kind()).collect();
        assert_eq!(kinds, vec!["MissingReference"]);

        // 引用 SPS 0 时宽度超出上限
        let mut bw = BitWriter::new();
        write_pps_head(&mut bw, 0, 3840, 1088);
        bw.write_bits(0, 4);
        bw.write_rbsp_trailing_bits();
        let data = bw.finish();
        let mut r = SyntaxReader::new(&data, "pic_parameter_set_rbsp");
        let pps = parse_pps(&mut r, &context_with_sps()).unwrap();
        assert_eq!(pps.conf_win, ConformanceWindow::default());
        let out = r.finish();
        assert_eq!(out.warnings.len(), 1);
        assert_eq!(out.warnings[0].field, "pps_pic_width_in_luma_samples");
        assert!(out.log.find("pps_remaining_data").is_some());
    }
}
