//! HEVC scaling_list_data() (7.3.4).

use nalyzer_core::NalResult;

use crate::syntax::{Opts, SyntaxReader};

const SIZE_NAMES: &[&str] = &["4x4", "8x8", "16x16", "32x32"];

/// scaling_list_data()
pub fn parse_scaling_list_data(r: &mut SyntaxReader<'_>) -> NalResult<()> {
    for size_id in 0..4usize {
        let step = if size_id == 3 { 3 } else { 1 };
        for matrix_id in (0..6usize).step_by(step) {
            let name = format!("scaling_list[{}][{matrix_id}]", SIZE_NAMES[size_id]);
            r.structure(name, |r| scaling_list(r, size_id, matrix_id))?;
        }
    }
    Ok(())
}

fn scaling_list(r: &mut SyntaxReader<'_>, size_id: usize, matrix_id: usize) -> NalResult<()> {
    if !r.read_flag("scaling_list_pred_mode_flag")? {
        // 引用的矩阵: 0 表示默认矩阵
        let max = if size_id == 3 { matrix_id / 3 } else { matrix_id };
        r.read_ue_with(
            "scaling_list_pred_matrix_id_delta",
            Opts::range(0, max as i64),
        )?;
        return Ok(());
    }
    let coef_num = 64.min(1usize << (4 + (size_id << 1)));
    if size_id > 1 {
        r.read_se_with("scaling_list_dc_coef_minus8", Opts::range(-7, 247))?;
    }
    for i in 0..coef_num {
        r.read_se_with(&format!("scaling_list_delta_coef[{i}]"), Opts::range(-128, 127))?;
    }
    Ok(())
}
