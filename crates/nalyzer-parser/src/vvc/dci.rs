//! VVC DCI (Decoding Capability Information) 解析.
//!
//! DCI 给出整个码流解码所需的能力上限, 由若干 profile_tier_level 组成.

use nalyzer_core::NalResult;

use super::ptl::{VvcPtl, parse_ptl};
use crate::syntax::{Opts, SyntaxReader};

/// DCI 解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VvcDci {
    pub ptls: Vec<VvcPtl>,
    pub extension_flag: bool,
}

/// decoding_capability_information_rbsp()
pub fn parse_dci(r: &mut SyntaxReader<'_>) -> NalResult<VvcDci> {
    r.read_reserved("dci_reserved_zero_4bits", 4, 0)?;
    // 15 保留
    let num_ptls_minus1 = r.read_bits_with("dci_num_ptls_minus1", 4, Opts::range(0, 14))?;
    let mut ptls = Vec::new();
    for i in 0..=num_ptls_minus1 {
        let ptl = r.structure(format!("profile_tier_level[{i}]"), |r| parse_ptl(r, true, 0))?;
        ptls.push(ptl);
    }
    let extension_flag = r.read_flag("dci_extension_flag")?;
    if extension_flag {
        r.read_extension_data("dci_extension_data_flag")?;
    }
    r.rbsp_trailing_bits()?;
    Ok(VvcDci {
        ptls,
        extension_flag,
    })
}
