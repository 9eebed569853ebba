//! H.265/HEVC NAL 单元类型与头部.
//!
//! HEVC NAL 头部为 2 字节 (比 H.264 多一字节):
//! - forbidden_zero_bit (1 bit)
//! - nal_unit_type (6 bits)
//! - nuh_layer_id (6 bits)
//! - nuh_temporal_id_plus1 (3 bits)

use nalyzer_core::NalResult;

use crate::standard::{NalHeader, Standard};
use crate::syntax::{Opts, SyntaxReader};

/// HEVC NAL 单元类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HevcNalUnitType {
    /// TRAIL_N (非参考尾随图像)
    TrailN,
    /// TRAIL_R (参考尾随图像)
    TrailR,
    TsaN,
    TsaR,
    StsaN,
    StsaR,
    RadlN,
    RadlR,
    RaslN,
    RaslR,
    /// BLA_W_LP (Broken Link Access)
    BlaWLp,
    BlaWRadl,
    BlaNLp,
    /// IDR_W_RADL (Instantaneous Decoding Refresh)
    IdrWRadl,
    IdrNLp,
    /// CRA_NUT (Clean Random Access)
    Cra,
    Vps,
    Sps,
    Pps,
    Aud,
    /// EOS (End of Sequence)
    Eos,
    /// EOB (End of Bitstream)
    Eob,
    FillerData,
    PrefixSei,
    SuffixSei,
    /// 保留或未指定
    Unknown(u8),
}

impl HevcNalUnitType {
    /// 从类型编号创建
    pub fn from_type_id(id: u8) -> Self {
        match id {
            0 => Self::TrailN,
            1 => Self::TrailR,
            2 => Self::TsaN,
            3 => Self::TsaR,
            4 => Self::StsaN,
            5 => Self::StsaR,
            6 => Self::RadlN,
            7 => Self::RadlR,
            8 => Self::RaslN,
            9 => Self::RaslR,
            16 => Self::BlaWLp,
            17 => Self::BlaWRadl,
            18 => Self::BlaNLp,
            19 => Self::IdrWRadl,
            20 => Self::IdrNLp,
            21 => Self::Cra,
            32 => Self::Vps,
            33 => Self::Sps,
            34 => Self::Pps,
            35 => Self::Aud,
            36 => Self::Eos,
            37 => Self::Eob,
            38 => Self::FillerData,
            39 => Self::PrefixSei,
            40 => Self::SuffixSei,
            _ => Self::Unknown(id),
        }
    }

    /// 获取类型编号
    pub fn type_id(&self) -> u8 {
        match self {
            Self::TrailN => 0,
            Self::TrailR => 1,
            Self::TsaN => 2,
            Self::TsaR => 3,
            Self::StsaN => 4,
            Self::StsaR => 5,
            Self::RadlN => 6,
            Self::RadlR => 7,
            Self::RaslN => 8,
            Self::RaslR => 9,
            Self::BlaWLp => 16,
            Self::BlaWRadl => 17,
            Self::BlaNLp => 18,
            Self::IdrWRadl => 19,
            Self::IdrNLp => 20,
            Self::Cra => 21,
            Self::Vps => 32,
            Self::Sps => 33,
            Self::Pps => 34,
            Self::Aud => 35,
            Self::Eos => 36,
            Self::Eob => 37,
            Self::FillerData => 38,
            Self::PrefixSei => 39,
            Self::SuffixSei => 40,
            Self::Unknown(id) => *id,
        }
    }

    /// 类型名称 (标准中的助记符)
    pub fn name(&self) -> &'static str {
        match self {
            Self::TrailN => "TRAIL_N",
            Self::TrailR => "TRAIL_R",
            Self::TsaN => "TSA_N",
            Self::TsaR => "TSA_R",
            Self::StsaN => "STSA_N",
            Self::StsaR => "STSA_R",
            Self::RadlN => "RADL_N",
            Self::RadlR => "RADL_R",
            Self::RaslN => "RASL_N",
            Self::RaslR => "RASL_R",
            Self::BlaWLp => "BLA_W_LP",
            Self::BlaWRadl => "BLA_W_RADL",
            Self::BlaNLp => "BLA_N_LP",
            Self::IdrWRadl => "IDR_W_RADL",
            Self::IdrNLp => "IDR_N_LP",
            Self::Cra => "CRA_NUT",
            Self::Vps => "VPS",
            Self::Sps => "SPS",
            Self::Pps => "PPS",
            Self::Aud => "AUD",
            Self::Eos => "EOS",
            Self::Eob => "EOB",
            Self::FillerData => "FD",
            Self::PrefixSei => "PREFIX_SEI",
            Self::SuffixSei => "SUFFIX_SEI",
            Self::Unknown(id) if *id >= 48 => "UNSPECIFIED",
            Self::Unknown(_) => "RESERVED",
        }
    }

    /// 是否为 VCL (Video Coding Layer) NAL
    pub fn is_vcl(&self) -> bool {
        self.type_id() < 32
    }

    /// 是否为 IRAP (Intra Random Access Point) NAL
    pub fn is_irap(&self) -> bool {
        matches!(self.type_id(), 16..=23)
    }

    /// 是否为 IDR NAL
    pub fn is_idr(&self) -> bool {
        matches!(self, Self::IdrWRadl | Self::IdrNLp)
    }
}

fn nal_unit_type_meaning(v: u64) -> Option<String> {
    Some(HevcNalUnitType::from_type_id(v as u8).name().to_string())
}

/// nal_unit_header()
pub fn parse_header(r: &mut SyntaxReader<'_>) -> NalResult<NalHeader> {
    r.read_fixed_pattern("forbidden_zero_bit", 1, 0)?;
    let nal_unit_type =
        r.read_bits_with("nal_unit_type", 6, Opts::lookup(nal_unit_type_meaning))? as u8;
    let layer_id = r.read_bits_with("nuh_layer_id", 6, Opts::range(0, 62))? as u8;
    let temporal_id_plus1 = r.read_bits_with("nuh_temporal_id_plus1", 3, Opts::range(1, 7))? as u8;
    Ok(NalHeader {
        standard: Standard::Hevc,
        nal_unit_type,
        nal_ref_idc: None,
        layer_id,
        temporal_id_plus1,
        header_bytes: 2,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nal_type_from_id() {
        assert_eq!(HevcNalUnitType::from_type_id(32), HevcNalUnitType::Vps);
        assert_eq!(HevcNalUnitType::from_type_id(19), HevcNalUnitType::IdrWRadl);
        assert_eq!(HevcNalUnitType::from_type_id(99), HevcNalUnitType::Unknown(99));
        for id in 0..64u8 {
            assert_eq!(HevcNalUnitType::from_type_id(id).type_id(), id);
        }
    }

    #[test]
    fn test_nal_type_properties() {
        assert!(HevcNalUnitType::TrailR.is_vcl());
        assert!(!HevcNalUnitType::Vps.is_vcl());
        assert!(HevcNalUnitType::IdrWRadl.is_irap());
        assert!(HevcNalUnitType::IdrWRadl.is_idr());
        assert!(HevcNalUnitType::Cra.is_irap());
        assert!(!HevcNalUnitType::Cra.is_idr());
    }

    #[test]
    fn test_parse_header() {
        // VPS: type=32, layer=0, tid_plus1=1
        let data = [0x40, 0x01];
        let mut r = SyntaxReader::new(&data, "nal_unit_header");
        let header = parse_header(&mut r).unwrap();
        assert_eq!(header.nal_unit_type, 32);
        assert_eq!(header.layer_id, 0);
        assert_eq!(header.temporal_id(), 0);
        let out = r.finish();
        assert_eq!(out.log.len(), 4);
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn test_zero_temporal_id_plus1_warns() {
        let data = [0x40, 0x00];
        let mut r = SyntaxReader::new(&data, "nal_unit_header");
        parse_header(&mut r).unwrap();
        let out = r.finish();
        assert_eq!(out.warnings.len(), 1);
        assert_eq!(out.warnings[0].field, "nuh_temporal_id_plus1");
    }
}
