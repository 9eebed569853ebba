//! H.264 NAL 单元类型与头部.
//!
//! # NAL 头部 (1 字节)
//! ```text
//! ┌───────────────────────────────────────┐
//! │ forbidden(1) | ref_idc(2) | type(5)   │
//! └───────────────────────────────────────┘
//! ```
//!
//! 类型 14/20 附带 3 字节 SVC 或 MVC 扩展头, 类型 21 可附带 3D-AVC 扩展头.

use nalyzer_core::NalResult;

use crate::standard::{NalHeader, Standard};
use crate::syntax::{Opts, SyntaxReader};

/// NAL 单元类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AvcNalUnitType {
    /// 非 IDR 图像切片
    Slice,
    /// 数据分区 A
    SliceDpa,
    /// 数据分区 B
    SliceDpb,
    /// 数据分区 C
    SliceDpc,
    /// IDR 图像切片
    SliceIdr,
    Sei,
    Sps,
    Pps,
    Aud,
    EndOfSequence,
    EndOfStream,
    FillerData,
    SpsExtension,
    /// 前缀 NAL (SVC/MVC)
    PrefixNal,
    SubsetSps,
    /// 深度参数集 (3D-AVC)
    Dps,
    /// 辅助图像切片
    SliceAux,
    /// SVC/MVC 切片扩展
    SliceExtension,
    /// 3D-AVC 深度视图切片扩展
    SliceExtensionDepth,
    /// 保留或未指定
    Unknown(u8),
}

impl AvcNalUnitType {
    /// 从 NAL 类型编号创建
    pub fn from_type_id(type_id: u8) -> Self {
        match type_id {
            1 => Self::Slice,
            2 => Self::SliceDpa,
            3 => Self::SliceDpb,
            4 => Self::SliceDpc,
            5 => Self::SliceIdr,
            6 => Self::Sei,
            7 => Self::Sps,
            8 => Self::Pps,
            9 => Self::Aud,
            10 => Self::EndOfSequence,
            11 => Self::EndOfStream,
            12 => Self::FillerData,
            13 => Self::SpsExtension,
            14 => Self::PrefixNal,
            15 => Self::SubsetSps,
            16 => Self::Dps,
            19 => Self::SliceAux,
            20 => Self::SliceExtension,
            21 => Self::SliceExtensionDepth,
            _ => Self::Unknown(type_id),
        }
    }

    /// 获取类型编号
    pub fn type_id(&self) -> u8 {
        match self {
            Self::Slice => 1,
            Self::SliceDpa => 2,
            Self::SliceDpb => 3,
            Self::SliceDpc => 4,
            Self::SliceIdr => 5,
            Self::Sei => 6,
            Self::Sps => 7,
            Self::Pps => 8,
            Self::Aud => 9,
            Self::EndOfSequence => 10,
            Self::EndOfStream => 11,
            Self::FillerData => 12,
            Self::SpsExtension => 13,
            Self::PrefixNal => 14,
            Self::SubsetSps => 15,
            Self::Dps => 16,
            Self::SliceAux => 19,
            Self::SliceExtension => 20,
            Self::SliceExtensionDepth => 21,
            Self::Unknown(id) => *id,
        }
    }

    /// 类型名称
    pub fn name(&self) -> &'static str {
        match self {
            Self::Slice => "CODED_SLICE_NON_IDR",
            Self::SliceDpa => "CODED_SLICE_DATA_PARTITION_A",
            Self::SliceDpb => "CODED_SLICE_DATA_PARTITION_B",
            Self::SliceDpc => "CODED_SLICE_DATA_PARTITION_C",
            Self::SliceIdr => "CODED_SLICE_IDR",
            Self::Sei => "SEI",
            Self::Sps => "SPS",
            Self::Pps => "PPS",
            Self::Aud => "AUD",
            Self::EndOfSequence => "END_OF_SEQUENCE",
            Self::EndOfStream => "END_OF_STREAM",
            Self::FillerData => "FILLER_DATA",
            Self::SpsExtension => "SPS_EXTENSION",
            Self::PrefixNal => "PREFIX_NAL",
            Self::SubsetSps => "SUBSET_SPS",
            Self::Dps => "DPS",
            Self::SliceAux => "CODED_SLICE_AUX",
            Self::SliceExtension => "CODED_SLICE_EXTENSION",
            Self::SliceExtensionDepth => "CODED_SLICE_EXTENSION_DEPTH",
            Self::Unknown(0) => "UNSPECIFIED",
            Self::Unknown(id) if *id >= 24 => "UNSPECIFIED",
            Self::Unknown(_) => "RESERVED",
        }
    }

    /// 是否为 VCL NAL
    pub fn is_vcl(&self) -> bool {
        matches!(
            self,
            Self::Slice | Self::SliceDpa | Self::SliceDpb | Self::SliceDpc | Self::SliceIdr
        )
    }

    /// 是否带 3 字节头部扩展
    pub fn has_header_extension(&self) -> bool {
        matches!(
            self,
            Self::PrefixNal | Self::SliceExtension | Self::SliceExtensionDepth
        )
    }
}

fn nal_unit_type_meaning(v: u64) -> Option<String> {
    Some(AvcNalUnitType::from_type_id(v as u8).name().to_string())
}

/// 解析 nal_unit_header (含 SVC/MVC/3D-AVC 扩展头)
pub fn parse_header(r: &mut SyntaxReader<'_>) -> NalResult<NalHeader> {
    r.read_fixed_pattern("forbidden_zero_bit", 1, 0)?;
    let nal_ref_idc = r.read_bits("nal_ref_idc", 2)? as u8;
    let nal_unit_type =
        r.read_bits_with("nal_unit_type", 5, Opts::lookup(nal_unit_type_meaning))? as u8;
    let nal_type = AvcNalUnitType::from_type_id(nal_unit_type);

    let mut header_bytes = 1;
    if nal_type.has_header_extension() {
        let extension_flag = if nal_type == AvcNalUnitType::SliceExtensionDepth {
            r.read_flag("avc_3d_extension_flag")?
        } else {
            r.read_flag("svc_extension_flag")?
        };
        match (nal_type, extension_flag) {
            (AvcNalUnitType::SliceExtensionDepth, true) => {
                r.structure("nal_unit_header_3davc_extension", parse_3davc_extension)?;
                header_bytes += 2;
            }
            (_, true) => {
                r.structure("nal_unit_header_svc_extension", parse_svc_extension)?;
                header_bytes += 3;
            }
            (_, false) => {
                r.structure("nal_unit_header_mvc_extension", parse_mvc_extension)?;
                header_bytes += 3;
            }
        }
    }

    Ok(NalHeader {
        standard: Standard::Avc,
        nal_unit_type,
        nal_ref_idc: Some(nal_ref_idc),
        layer_id: 0,
        temporal_id_plus1: 1,
        header_bytes,
    })
}

fn parse_svc_extension(r: &mut SyntaxReader<'_>) -> NalResult<()> {
    r.read_flag("idr_flag")?;
    r.read_bits("priority_id", 6)?;
    r.read_flag("no_inter_layer_pred_flag")?;
    r.read_bits("dependency_id", 3)?;
    r.read_bits("quality_id", 4)?;
    r.read_bits("temporal_id", 3)?;
    r.read_flag("use_ref_base_pic_flag")?;
    r.read_flag("discardable_flag")?;
    r.read_flag("output_flag")?;
    r.read_reserved("reserved_three_2bits", 2, 3)?;
    Ok(())
}

fn parse_mvc_extension(r: &mut SyntaxReader<'_>) -> NalResult<()> {
    r.read_flag("non_idr_flag")?;
    r.read_bits("priority_id", 6)?;
    r.read_bits("view_id", 10)?;
    r.read_bits("temporal_id", 3)?;
    r.read_flag("anchor_pic_flag")?;
    r.read_flag("inter_view_flag")?;
    r.read_reserved("reserved_one_bit", 1, 1)?;
    Ok(())
}

fn parse_3davc_extension(r: &mut SyntaxReader<'_>) -> NalResult<()> {
    r.read_bits("view_idx", 8)?;
    r.read_flag("depth_flag")?;
    r.read_flag("non_idr_flag")?;
    r.read_bits("temporal_id", 3)?;
    r.read_flag("anchor_pic_flag")?;
    r.read_flag("inter_view_flag")?;
    Ok(())
}
