//! HEVC profile_tier_level() 语法.
//!
//! general 与 sub_layer 两级使用相同的 profile 字段布局, 字段名前缀不同,
//! 子层字段名带 `[i]` 下标.

use nalyzer_core::NalResult;

use crate::syntax::{Opts, SyntaxReader};

/// profile 信息 (general 或某个子层)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProfileInfo {
    pub profile_space: u8,
    pub tier_flag: bool,
    pub profile_idc: u8,
    /// profile_compatibility_flag[j], 第 j 个标志位于 bit (31 - j)
    pub compatibility_flags: u32,
    pub progressive_source_flag: bool,
    pub interlaced_source_flag: bool,
    pub non_packed_constraint_flag: bool,
    pub frame_only_constraint_flag: bool,
}

impl ProfileInfo {
    /// profile_compatibility_flag[j]
    pub fn is_compatible(&self, j: u32) -> bool {
        j < 32 && self.compatibility_flags & (1 << (31 - j)) != 0
    }

    /// profile_idc 等于 `idc`, 或兼容标志 `idc` 置位
    fn matches_any(&self, idcs: &[u8]) -> bool {
        idcs.iter()
            .any(|&idc| self.profile_idc == idc || self.is_compatible(u32::from(idc)))
    }
}

/// profile_tier_level() 解析结果
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HevcPtl {
    /// profile_present_flag 为 0 时为 `None`
    pub general: Option<ProfileInfo>,
    pub general_level_idc: u8,
    /// 每个子层的 (profile, level), 未出现的为 `None`
    pub sub_layers: Vec<(Option<ProfileInfo>, Option<u8>)>,
}

/// general_profile_idc 名称
pub fn profile_name(profile_idc: u32) -> Option<&'static str> {
    let name = match profile_idc {
        1 => "Main",
        2 => "Main 10",
        3 => "Main Still Picture",
        4 => "Format Range Extensions",
        5 => "High Throughput",
        6 => "Multiview Main",
        7 => "Scalable Main",
        8 => "3D Main",
        9 => "Screen Content Coding",
        10 => "Scalable Format Range Extensions",
        11 => "High Throughput Screen Content Coding",
        _ => return None,
    };
    Some(name)
}

fn profile_meaning(v: u64) -> Option<String> {
    profile_name(v as u32).map(str::to_string)
}

fn level_meaning(v: u64) -> Option<String> {
    Some(format!("{}.{}", v / 30, (v % 30) / 3))
}

const TIER_NAMES: &[&str] = &["Main", "High"];

/// 带子层下标的字段名
fn indexed(prefix: &str, name: &str, index: Option<usize>) -> String {
    match index {
        Some(i) => format!("{prefix}_{name}[{i}]"),
        None => format!("{prefix}_{name}"),
    }
}

/// profile_tier_level(profilePresentFlag, maxNumSubLayersMinus1)
pub fn parse_ptl(
    r: &mut SyntaxReader<'_>,
    profile_present: bool,
    max_sub_layers_minus1: u32,
) -> NalResult<HevcPtl> {
    let mut ptl = HevcPtl::default();
    if profile_present {
        ptl.general = Some(profile_block(r, "general", None)?);
    }
    ptl.general_level_idc =
        r.read_bits_with("general_level_idc", 8, Opts::lookup(level_meaning))? as u8;

    let max = max_sub_layers_minus1 as usize;
    let mut present = Vec::new();
    for i in 0..max {
        let profile = r.read_flag(&format!("sub_layer_profile_present_flag[{i}]"))?;
        let level = r.read_flag(&format!("sub_layer_level_present_flag[{i}]"))?;
        present.push((profile, level));
    }
    if max > 0 {
        for i in max..8 {
            r.read_reserved(&format!("reserved_zero_2bits[{i}]"), 2, 0)?;
        }
    }
    for (i, (profile_flag, level_flag)) in present.into_iter().enumerate() {
        let profile = if profile_flag {
            Some(profile_block(r, "sub_layer", Some(i))?)
        } else {
            None
        };
        let level = if level_flag {
            let name = format!("sub_layer_level_idc[{i}]");
            Some(r.read_bits_with(&name, 8, Opts::lookup(level_meaning))? as u8)
        } else {
            None
        };
        ptl.sub_layers.push((profile, level));
    }
    Ok(ptl)
}

/// profile_space 到 inbld_flag 的 88 位
fn profile_block(
    r: &mut SyntaxReader<'_>,
    prefix: &str,
    index: Option<usize>,
) -> NalResult<ProfileInfo> {
    let mut info = ProfileInfo {
        profile_space: r.read_bits(&indexed(prefix, "profile_space", index), 2)? as u8,
        tier_flag: r.read_flag_with(&indexed(prefix, "tier_flag", index), Opts::table(TIER_NAMES))?,
        profile_idc: r.read_bits_with(
            &indexed(prefix, "profile_idc", index),
            5,
            Opts::lookup(profile_meaning),
        )? as u8,
        ..ProfileInfo::default()
    };
    for j in 0..32 {
        let name = match index {
            Some(i) => format!("{prefix}_profile_compatibility_flag[{i}][{j}]"),
            None => format!("{prefix}_profile_compatibility_flag[{j}]"),
        };
        if r.read_flag(&name)? {
            info.compatibility_flags |= 1 << (31 - j);
        }
    }
    info.progressive_source_flag = r.read_flag(&indexed(prefix, "progressive_source_flag", index))?;
    info.interlaced_source_flag = r.read_flag(&indexed(prefix, "interlaced_source_flag", index))?;
    info.non_packed_constraint_flag =
        r.read_flag(&indexed(prefix, "non_packed_constraint_flag", index))?;
    info.frame_only_constraint_flag =
        r.read_flag(&indexed(prefix, "frame_only_constraint_flag", index))?;

    // 43 位的 profile 相关约束
    if info.matches_any(&[4, 5, 6, 7, 8, 9, 10, 11]) {
        for flag in [
            "max_12bit_constraint_flag",
            "max_10bit_constraint_flag",
            "max_8bit_constraint_flag",
            "max_422chroma_constraint_flag",
            "max_420chroma_constraint_flag",
            "max_monochrome_constraint_flag",
            "intra_constraint_flag",
            "one_picture_only_constraint_flag",
            "lower_bit_rate_constraint_flag",
        ] {
            r.read_flag(&indexed(prefix, flag, index))?;
        }
        if info.matches_any(&[5, 9, 10, 11]) {
            r.read_flag(&indexed(prefix, "max_14bit_constraint_flag", index))?;
            r.read_reserved(&indexed(prefix, "reserved_zero_33bits", index), 33, 0)?;
        } else {
            r.read_reserved(&indexed(prefix, "reserved_zero_34bits", index), 34, 0)?;
        }
    } else if info.matches_any(&[2]) {
        r.read_reserved(&indexed(prefix, "reserved_zero_7bits", index), 7, 0)?;
        r.read_flag(&indexed(prefix, "one_picture_only_constraint_flag", index))?;
        r.read_reserved(&indexed(prefix, "reserved_zero_35bits", index), 35, 0)?;
    } else {
        r.read_reserved(&indexed(prefix, "reserved_zero_43bits", index), 43, 0)?;
    }

    if info.matches_any(&[1, 2, 3, 4, 5, 9, 11]) {
        r.read_flag(&indexed(prefix, "inbld_flag", index))?;
    } else {
        r.read_reserved(&indexed(prefix, "reserved_zero_bit", index), 1, 0)?;
    }
    Ok(info)
}

/// 测试用: Main profile, Main tier, level 4.1, 无子层
#[cfg(test)]
pub(crate) fn write_main_ptl(bw: &mut nalyzer_core::BitWriter) {
    bw.write_bits(0, 2);
    bw.write_flag(false);
    bw.write_bits(1, 5);
    bw.write_bits(0x6000_0000, 32); // compatibility[1], [2]
    bw.write_flag(true);
    bw.write_flag(false);
    bw.write_flag(false);
    bw.write_flag(true);
    bw.write_bits_u64(0, 43);
    bw.write_flag(false); // inbld_flag
    bw.write_bits(123, 8);
}
