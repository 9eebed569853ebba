//! VVC 访问单元分隔符.

use nalyzer_core::NalResult;

use crate::syntax::{Opts, SyntaxReader};

const PIC_TYPE_NAMES: &[&str] = &["I", "P, I", "B, P, I"];

/// AUD 解析结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VvcAud {
    /// 访问单元是否仅含 IRAP 或 GDR 图像
    pub irap_or_gdr_flag: bool,
    pub pic_type: u32,
}

/// access_unit_delimiter_rbsp()
pub fn parse_aud(r: &mut SyntaxReader<'_>) -> NalResult<VvcAud> {
    let irap_or_gdr_flag = r.read_flag("aud_irap_or_gdr_flag")?;
    let pic_type =
        r.read_bits_with("aud_pic_type", 3, Opts::table(PIC_TYPE_NAMES).with_range(0, 2))?;
    r.rbsp_trailing_bits()?;
    Ok(VvcAud {
        irap_or_gdr_flag,
        pic_type,
    })
}
