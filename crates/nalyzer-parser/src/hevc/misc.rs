//! HEVC 访问单元分隔符.

use nalyzer_core::NalResult;

use crate::syntax::{Opts, SyntaxReader};

const PIC_TYPE_NAMES: &[&str] = &["I", "P, I", "B, P, I"];

/// access_unit_delimiter_rbsp()
pub fn parse_aud(r: &mut SyntaxReader<'_>) -> NalResult<u32> {
    let pic_type = r.read_bits_with("pic_type", 3, Opts::table(PIC_TYPE_NAMES).with_range(0, 2))?;
    r.rbsp_trailing_bits()?;
    Ok(pic_type)
}
