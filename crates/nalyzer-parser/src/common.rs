//! AVC 与 HEVC 共用的 VUI 语法片段和取值表.

use nalyzer_core::{NalResult, Rational};

use crate::context::CHROMA_FORMAT_NAMES;
use crate::syntax::{Opts, SyntaxReader};

/// aspect_ratio_idc 为该值时显式给出 sar_width/sar_height
pub const EXTENDED_SAR: u32 = 255;

/// 预定义 SAR 表 (下标为 aspect_ratio_idc, 0 表示未指定)
pub const SAR_TABLE: [(u32, u32); 17] = [
    (0, 0),
    (1, 1),
    (12, 11),
    (10, 11),
    (16, 11),
    (40, 33),
    (24, 11),
    (20, 11),
    (32, 11),
    (80, 33),
    (18, 11),
    (15, 11),
    (64, 33),
    (160, 99),
    (4, 3),
    (3, 2),
    (2, 1),
];

const VIDEO_FORMAT_NAMES: &[&str] = &[
    "Component",
    "PAL",
    "NTSC",
    "SECAM",
    "MAC",
    "Unspecified",
];

fn aspect_ratio_meaning(idc: u64) -> Option<String> {
    match idc {
        0 => Some("未指定".to_string()),
        255 => Some("Extended_SAR".to_string()),
        _ => SAR_TABLE
            .get(usize::try_from(idc).ok()?)
            .map(|(w, h)| format!("{w}:{h}")),
    }
}

fn colour_primaries_meaning(v: u64) -> Option<String> {
    let name = match v {
        1 => "BT.709",
        2 => "Unspecified",
        4 => "BT.470M",
        5 => "BT.470BG",
        6 => "SMPTE 170M",
        7 => "SMPTE 240M",
        8 => "Generic film",
        9 => "BT.2020",
        10 => "SMPTE ST 428-1",
        11 => "SMPTE RP 431-2 (DCI-P3)",
        12 => "SMPTE EG 432-1 (Display P3)",
        22 => "EBU Tech 3213-E",
        _ => return None,
    };
    Some(name.to_string())
}

fn transfer_characteristics_meaning(v: u64) -> Option<String> {
    let name = match v {
        1 => "BT.709",
        2 => "Unspecified",
        4 => "Gamma 2.2",
        5 => "Gamma 2.8",
        6 => "SMPTE 170M",
        7 => "SMPTE 240M",
        8 => "Linear",
        9 => "Log 100:1",
        10 => "Log 316:1",
        11 => "IEC 61966-2-4",
        12 => "BT.1361",
        13 => "sRGB",
        14 => "BT.2020 10 bit",
        15 => "BT.2020 12 bit",
        16 => "SMPTE ST 2084 (PQ)",
        17 => "SMPTE ST 428-1",
        18 => "ARIB STD-B67 (HLG)",
        _ => return None,
    };
    Some(name.to_string())
}

fn matrix_coefficients_meaning(v: u64) -> Option<String> {
    let name = match v {
        0 => "Identity (RGB)",
        1 => "BT.709",
        2 => "Unspecified",
        4 => "FCC",
        5 => "BT.470BG",
        6 => "SMPTE 170M",
        7 => "SMPTE 240M",
        8 => "YCgCo",
        9 => "BT.2020 非恒定亮度",
        10 => "BT.2020 恒定亮度",
        11 => "SMPTE ST 2085",
        12 => "色度导出非恒定亮度",
        13 => "色度导出恒定亮度",
        14 => "ICtCp",
        _ => return None,
    };
    Some(name.to_string())
}

/// chroma_format_idc 的读取选项
pub(crate) const fn chroma_format_opts() -> Opts<'static> {
    Opts::table(CHROMA_FORMAT_NAMES).with_range(0, 3)
}

/// 视频信号类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoSignal {
    pub video_format: u32,
    pub full_range: bool,
    pub colour_primaries: Option<u32>,
    pub transfer_characteristics: Option<u32>,
    pub matrix_coefficients: Option<u32>,
}

/// aspect_ratio_info_present_flag 及其内容, 返回 SAR
pub(crate) fn aspect_ratio_info(r: &mut SyntaxReader<'_>) -> NalResult<Option<Rational>> {
    if !r.read_flag("aspect_ratio_info_present_flag")? {
        return Ok(None);
    }
    let idc = r.read_bits_with("aspect_ratio_idc", 8, Opts::lookup(aspect_ratio_meaning))?;
    if idc == EXTENDED_SAR {
        let w = r.read_bits("sar_width", 16)?;
        let h = r.read_bits("sar_height", 16)?;
        return Ok((h != 0).then(|| Rational::new(w, h)));
    }
    Ok(SAR_TABLE
        .get(idc as usize)
        .filter(|(_, h)| *h != 0)
        .map(|&(w, h)| Rational::new(w, h)))
}

/// overscan_info_present_flag 及 overscan_appropriate_flag
pub(crate) fn overscan_info(r: &mut SyntaxReader<'_>) -> NalResult<()> {
    if r.read_flag("overscan_info_present_flag")? {
        r.read_flag("overscan_appropriate_flag")?;
    }
    Ok(())
}

/// video_signal_type_present_flag 及其内容
pub(crate) fn video_signal_type(r: &mut SyntaxReader<'_>) -> NalResult<Option<VideoSignal>> {
    if !r.read_flag("video_signal_type_present_flag")? {
        return Ok(None);
    }
    let video_format = r.read_bits_with("video_format", 3, Opts::table(VIDEO_FORMAT_NAMES))?;
    let full_range = r.read_flag("video_full_range_flag")?;
    let mut signal = VideoSignal {
        video_format,
        full_range,
        colour_primaries: None,
        transfer_characteristics: None,
        matrix_coefficients: None,
    };
    if r.read_flag("colour_description_present_flag")? {
        signal.colour_primaries = Some(r.read_bits_with(
            "colour_primaries",
            8,
            Opts::lookup(colour_primaries_meaning),
        )?);
        signal.transfer_characteristics = Some(r.read_bits_with(
            "transfer_characteristics",
            8,
            Opts::lookup(transfer_characteristics_meaning),
        )?);
        signal.matrix_coefficients = Some(r.read_bits_with(
            "matrix_coefficients",
            8,
            Opts::lookup(matrix_coefficients_meaning),
        )?);
    }
    Ok(Some(signal))
}

/// chroma_loc_info_present_flag 及两个色度采样位置
pub(crate) fn chroma_loc_info(r: &mut SyntaxReader<'_>) -> NalResult<()> {
    if r.read_flag("chroma_loc_info_present_flag")? {
        r.read_ue_with("chroma_sample_loc_type_top_field", Opts::range(0, 5))?;
        r.read_ue_with("chroma_sample_loc_type_bottom_field", Opts::range(0, 5))?;
    }
    Ok(())
}
