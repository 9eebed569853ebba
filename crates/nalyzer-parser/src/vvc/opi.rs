//! VVC OPI (Operating Point Information) 解析.

use nalyzer_core::NalResult;

use crate::syntax::{Opts, SyntaxReader};

/// OPI 解析结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VvcOpi {
    /// 目标输出层集合索引
    pub ols_idx: Option<u32>,
    /// 最高 TemporalId + 1
    pub htid_plus1: Option<u32>,
    pub extension_flag: bool,
}

/// operating_point_information_rbsp()
pub fn parse_opi(r: &mut SyntaxReader<'_>) -> NalResult<VvcOpi> {
    let ols_info_present = r.read_flag("opi_ols_info_present_flag")?;
    let htid_info_present = r.read_flag("opi_htid_info_present_flag")?;
    let mut opi = VvcOpi::default();
    if ols_info_present {
        opi.ols_idx = Some(r.read_ue_with("opi_ols_idx", Opts::range(0, 256))?);
    }
    if htid_info_present {
        opi.htid_plus1 = Some(r.read_bits_with("opi_htid_plus1", 3, Opts::range(0, 7))?);
    }
    opi.extension_flag = r.read_flag("opi_extension_flag")?;
    if opi.extension_flag {
        r.read_extension_data("opi_extension_data_flag")?;
    }
    r.rbsp_trailing_bits()?;
    Ok(opi)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalyzer_core::BitWriter;

    #[test]
    fn test_opi_with_both_fields() {
        let mut bw = BitWriter::new();
        bw.write_flag(true);
        bw.write_flag(true);
        bw.write_ue(3);
        bw.write_bits(2, 3);
        bw.write_flag(false);
        bw.write_rbsp_trailing_bits();
        let data = bw.finish();

        let mut r = SyntaxReader::new(&data, "operating_point_information_rbsp");
        let opi = parse_opi(&mut r).unwrap();
        assert_eq!(opi.ols_idx, Some(3));
        assert_eq!(opi.htid_plus1, Some(2));
        let out = r.finish();
        assert!(out.is_complete());
        assert!(out.warnings.is_empty());
        assert_eq!(out.log.find("opi_htid_plus1").map(|e| e.bit_len), Some(3));
    }

    #[test]
    fn test_opi_without_info() {
        // 两个 present 标志为 0, 扩展标志 0, 停止位
        let data = [0b0001_0000];
        let mut r = SyntaxReader::new(&data, "operating_point_information_rbsp");
        let opi = parse_opi(&mut r).unwrap();
        assert_eq!(opi, VvcOpi::default());
        let out = r.finish();
        assert!(out.is_complete());
        assert_eq!(out.log.len(), 5);
    }
}
