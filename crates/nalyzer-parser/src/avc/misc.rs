//! H.264 的小型 NAL 单元: AUD、序列/码流结束、填充数据、SPS 扩展.

use nalyzer_core::NalResult;

use crate::syntax::{Opts, SyntaxReader};

const PRIMARY_PIC_TYPE_NAMES: &[&str] = &[
    "I",
    "I, P",
    "I, P, B",
    "SI",
    "SI, SP",
    "I, SI",
    "I, SI, P, SP",
    "I, SI, P, SP, B",
];

const AUX_FORMAT_NAMES: &[&str] = &["无辅助图像", "Alpha", "Alpha (预乘)", "未指定"];

/// access_unit_delimiter_rbsp()
pub fn parse_aud(r: &mut SyntaxReader<'_>) -> NalResult<u32> {
    let primary_pic_type =
        r.read_bits_with("primary_pic_type", 3, Opts::table(PRIMARY_PIC_TYPE_NAMES))?;
    r.rbsp_trailing_bits()?;
    Ok(primary_pic_type)
}

/// end_of_seq_rbsp() / end_of_stream_rbsp(): 空 RBSP
pub fn parse_empty(_r: &mut SyntaxReader<'_>) -> NalResult<()> {
    Ok(())
}

/// filler_data_rbsp(): 返回 0xFF 字节数
///
/// 各标准的填充数据语法相同.
pub fn parse_filler_data(r: &mut SyntaxReader<'_>) -> NalResult<usize> {
    let mut count = 0;
    while r.bits_left() >= 8 && r.peek_bits(8)? == 0xFF {
        r.read_fixed_pattern("ff_byte", 8, 0xFF)?;
        count += 1;
    }
    r.rbsp_trailing_bits()?;
    Ok(count)
}

/// seq_parameter_set_extension_rbsp()
pub fn parse_sps_extension(r: &mut SyntaxReader<'_>) -> NalResult<u32> {
    let sps_id = r.read_ue_with("seq_parameter_set_id", Opts::range(0, 31))?;
    let aux_format_idc = r.read_ue_with(
        "aux_format_idc",
        Opts::table(AUX_FORMAT_NAMES).with_range(0, 3),
    )?;
    if aux_format_idc != 0 {
        let bit_depth_aux_minus8 = r.read_ue_with("bit_depth_aux_minus8", Opts::range(0, 4))?;
        r.read_flag("alpha_incr_flag")?;
        // u(v), v = bit_depth_aux_minus8 + 9
        let bits = bit_depth_aux_minus8.saturating_add(9);
        if bits > 32 {
            return Err(r.invalid(
                "bit_depth_aux_minus8",
                format!("alpha 取值位数过大: {bits}"),
            ));
        }
        r.read_bits("alpha_opaque_value", bits)?;
        r.read_bits("alpha_transparent_value", bits)?;
    }
    r.read_flag("additional_extension_flag")?;
    r.rbsp_trailing_bits()?;
    Ok(sps_id)
}
