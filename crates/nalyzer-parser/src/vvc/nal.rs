//! H.266/VVC NAL 单元类型与头部.
//!
//! VVC NAL 头部为 2 字节:
//! - forbidden_zero_bit (1 bit)
//! - nuh_reserved_zero_bit (1 bit)
//! - nuh_layer_id (6 bits)
//! - nal_unit_type (5 bits)
//! - nuh_temporal_id_plus1 (3 bits)

use nalyzer_core::NalResult;

use crate::standard::{NalHeader, Standard};
use crate::syntax::{Opts, SyntaxReader};

/// VVC NAL 单元类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VvcNalUnitType {
    Trail,
    /// STSA (Step-wise Temporal Sub-layer Access)
    Stsa,
    Radl,
    Rasl,
    IdrWRadl,
    IdrNLp,
    /// CRA (Clean Random Access)
    Cra,
    /// GDR (Gradual Decoding Refresh)
    Gdr,
    /// OPI (Operating Point Information)
    Opi,
    /// DCI (Decoding Capability Information)
    Dci,
    Vps,
    Sps,
    Pps,
    PrefixAps,
    SuffixAps,
    /// PH (Picture Header)
    Ph,
    Aud,
    Eos,
    Eob,
    PrefixSei,
    SuffixSei,
    FillerData,
    /// 保留或未指定
    Unknown(u8),
}

impl VvcNalUnitType {
    /// 从类型编号创建
    pub fn from_type_id(id: u8) -> Self {
        match id {
            0 => Self::Trail,
            1 => Self::Stsa,
            2 => Self::Radl,
            3 => Self::Rasl,
            7 => Self::IdrWRadl,
            8 => Self::IdrNLp,
            9 => Self::Cra,
            10 => Self::Gdr,
            12 => Self::Opi,
            13 => Self::Dci,
            14 => Self::Vps,
            15 => Self::Sps,
            16 => Self::Pps,
            17 => Self::PrefixAps,
            18 => Self::SuffixAps,
            19 => Self::Ph,
            20 => Self::Aud,
            21 => Self::Eos,
            22 => Self::Eob,
            23 => Self::PrefixSei,
            24 => Self::SuffixSei,
            25 => Self::FillerData,
            _ => Self::Unknown(id),
        }
    }

    /// 获取类型编号
    pub fn type_id(&self) -> u8 {
        match self {
            Self::Trail => 0,
            Self::Stsa => 1,
            Self::Radl => 2,
            Self::Rasl => 3,
            Self::IdrWRadl => 7,
            Self::IdrNLp => 8,
            Self::Cra => 9,
            Self::Gdr => 10,
            Self::Opi => 12,
            Self::Dci => 13,
            Self::Vps => 14,
            Self::Sps => 15,
            Self::Pps => 16,
            Self::PrefixAps => 17,
            Self::SuffixAps => 18,
            Self::Ph => 19,
            Self::Aud => 20,
            Self::Eos => 21,
            Self::Eob => 22,
            Self::PrefixSei => 23,
            Self::SuffixSei => 24,
            Self::FillerData => 25,
            Self::Unknown(id) => *id,
        }
    }

    /// 类型名称
    pub fn name(&self) -> &'static str {
        match self {
            Self::Trail => "TRAIL",
            Self::Stsa => "STSA",
            Self::Radl => "RADL",
            Self::Rasl => "RASL",
            Self::IdrWRadl => "IDR_W_RADL",
            Self::IdrNLp => "IDR_N_LP",
            Self::Cra => "CRA",
            Self::Gdr => "GDR",
            Self::Opi => "OPI",
            Self::Dci => "DCI",
            Self::Vps => "VPS",
            Self::Sps => "SPS",
            Self::Pps => "PPS",
            Self::PrefixAps => "PREFIX_APS",
            Self::SuffixAps => "SUFFIX_APS",
            Self::Ph => "PH",
            Self::Aud => "AUD",
            Self::Eos => "EOS",
            Self::Eob => "EOB",
            Self::PrefixSei => "PREFIX_SEI",
            Self::SuffixSei => "SUFFIX_SEI",
            Self::FillerData => "FD",
            Self::Unknown(id) if *id >= 28 => "UNSPECIFIED",
            Self::Unknown(_) => "RESERVED",
        }
    }

    /// 是否为 VCL NAL (0..=11)
    pub fn is_vcl(&self) -> bool {
        self.type_id() < 12
    }

    /// 是否为 IRAP NAL
    pub fn is_irap(&self) -> bool {
        matches!(self.type_id(), 7..=9)
    }
}

fn nal_unit_type_meaning(v: u64) -> Option<String> {
    Some(VvcNalUnitType::from_type_id(v as u8).name().to_string())
}

/// nal_unit_header()
pub fn parse_header(r: &mut SyntaxReader<'_>) -> NalResult<NalHeader> {
    r.read_fixed_pattern("forbidden_zero_bit", 1, 0)?;
    r.read_reserved("nuh_reserved_zero_bit", 1, 0)?;
    let layer_id = r.read_bits_with("nuh_layer_id", 6, Opts::range(0, 55))? as u8;
    let nal_unit_type =
        r.read_bits_with("nal_unit_type", 5, Opts::lookup(nal_unit_type_meaning))? as u8;
    let temporal_id_plus1 = r.read_bits_with("nuh_temporal_id_plus1", 3, Opts::range(1, 7))? as u8;
    Ok(NalHeader {
        standard: Standard::Vvc,
        nal_unit_type,
        nal_ref_idc: None,
        layer_id,
        temporal_id_plus1,
        header_bytes: 2,
    })
}
