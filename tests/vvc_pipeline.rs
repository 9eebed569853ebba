//! H.266 码流解析集成测试

use nalyzer::core::BitWriter;
use nalyzer::parser::{ConformanceIssue, NalParser, ParseStatus, Severity, Standard};

/// DCI: 一个 Main 10 PTL (level 3.1)
const DCI: [u8; 8] = [0x00, 0x69, 0x00, 0x02, 0x33, 0x80, 0x00, 0x40];

/// SPS: 同一 PTL, 1920x1088 裁剪为 1080, 4:2:0, 10 bit, CTU 128, 编码工具部分 6 位
const SPS: [u8; 19] = [
    0x00, 0x79, 0x00, 0x0D, 0x02, 0x33, 0x80, 0x00, 0x00, 0x0F, 0x02, 0x00, 0x44, 0x1F, 0x29,
    0xA8, 0x03, 0x3E, 0xD0,
];

/// PPS 0 -> SPS 0, 与 SPS 同尺寸, 不带一致性窗口
const PPS: [u8; 10] = [0x00, 0x81, 0x00, 0x00, 0x07, 0x81, 0x00, 0x22, 0x08, 0xAC];

fn build_stream() -> Vec<u8> {
    let units: [&[u8]; 8] = [
        // OPI: 无 ols/htid 信息
        &[0x00, 0x61, 0x10],
        &DCI,
        // AUD: irap_or_gdr, pic_type = 0
        &[0x00, 0xA1, 0x88],
        &SPS,
        &PPS,
        // 填充数据: 两个 0xFF
        &[0x00, 0xC9, 0xFF, 0xFF, 0x80],
        &[0x00, 0xA9],
        &[0x00, 0xB1],
    ];
    let mut data = Vec::new();
    for unit in units {
        data.extend_from_slice(&[0x00, 0x00, 0x01]);
        data.extend_from_slice(unit);
    }
    data
}

#[test]
fn test_annex_b_stream_parse() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut parser = NalParser::new(Standard::Vvc);
    let nals = parser.parse_annex_b(&build_stream());

    let types: Vec<&str> = nals.iter().map(|n| n.type_name()).collect();
    assert_eq!(types, vec!["OPI", "DCI", "AUD", "SPS", "PPS", "FD", "EOS", "EOB"]);
    for nal in &nals {
        assert_eq!(nal.status, ParseStatus::Complete, "{}", nal.type_name());
        assert!(nal.warnings.is_empty(), "{}: {:?}", nal.type_name(), nal.warnings);
    }

    let filler = nals[5].rbsp().unwrap();
    assert_eq!(filler.fields().filter(|f| f.name == "ff_byte").count(), 2);
    assert_eq!(nals[6].rbsp_name, Some("end_of_seq_rbsp"));
    assert_eq!(nals[6].rbsp().map(|n| n.field_count()), Some(0));

    let ctx = parser.context().as_vvc().unwrap();
    assert!(ctx.dci().is_some());
    assert_eq!(ctx.opi().map(|o| o.ols_idx), Some(None));
    assert_eq!(ctx.pps(0).map(|p| p.conf_win.bottom), Some(4));
}

#[test]
fn test_sps_properties() {
    let mut parser = NalParser::new(Standard::Vvc);
    let nal = parser.parse_nal(&SPS);
    assert_eq!(nal.status, ParseStatus::Complete);
    assert!(nal.warnings.is_empty(), "{:?}", nal.warnings);

    let sps = nal.rbsp().unwrap();
    assert_eq!(sps.name(), "seq_parameter_set_rbsp");
    assert_eq!(sps.field_u64("sps_pic_width_max_in_luma_samples"), Some(1920));
    assert!(sps.child("profile_tier_level").is_some());
    let rest = nal.log.find("sps_remaining_data").unwrap();
    assert_eq!(rest.bit_len, 6);

    let props = parser.video_properties().unwrap();
    assert_eq!(props.profile_name, Some("Main 10"));
    assert_eq!((props.width, props.height), (Some(1920), Some(1080)));
    assert_eq!(props.chroma_format_name(), Some("4:2:0"));
    assert_eq!(props.bit_depth_luma, Some(10));
    assert!(parser.status().contains("1920x1080"));
}

#[test]
fn test_truncated_sps_is_not_committed() {
    let mut parser = NalParser::new(Standard::Vvc);
    let nal = parser.parse_nal(&SPS[..10]);
    assert_eq!(nal.status, ParseStatus::Incomplete);
    assert!(nal.failure.as_ref().unwrap().error.is_out_of_data());
    assert!(parser.context().as_vvc().unwrap().last_sps().is_none());
    assert!(parser.video_properties().is_none());

    // PPS 引用缺失的 SPS, 仍然完整解析
    let nal = parser.parse_nal(&PPS);
    assert_eq!(nal.status, ParseStatus::Complete);
    let kinds: Vec<&str> = nal.warnings.iter().map(|w| w.issue.kind()).collect();
    assert_eq!(kinds, vec!["MissingReference"]);
}

#[test]
fn test_dci_end_to_end() {
    let mut parser = NalParser::new(Standard::Vvc);
    let nal = parser.parse_nal(&DCI);
    assert_eq!(nal.status, ParseStatus::Complete);
    assert!(nal.warnings.is_empty());

    let dci = nal.rbsp().unwrap();
    assert_eq!(dci.name(), "decoding_capability_information_rbsp");
    assert_eq!(dci.children().count(), 1);
    assert!(dci.child("profile_tier_level[0]").is_some());

    // 头部 5 个字段之后的 RBSP 占 48 位
    let header = nal.node.child("nal_unit_header").unwrap();
    assert_eq!(header.field_count(), 5);
    assert_eq!(nal.log.total_bits(), 64);
    assert_eq!(nal.log.last().map(|e| e.name.as_str()), Some("rbsp_alignment_zero_bit"));

    let props = parser.video_properties().unwrap();
    assert_eq!(props.profile_name, Some("Main 10"));
    assert_eq!(props.level_name(), "3.1");
}

#[test]
fn test_truncated_dci_is_incomplete() {
    let mut parser = NalParser::new(Standard::Vvc);
    let nal = parser.parse_nal(&DCI[..DCI.len() - 1]);

    assert_eq!(nal.status, ParseStatus::Incomplete);
    assert!(nal.node.is_incomplete());
    let failure = nal.failure.as_ref().unwrap();
    assert!(failure.error.is_out_of_data());
    assert_eq!(failure.field, "dci_extension_flag");
    assert_eq!(failure.bit_offset, nal.log.total_bits());
    assert!(parser.context().as_vvc().unwrap().dci().is_none());
}

#[test]
fn test_header_range_warnings() {
    let mut parser = NalParser::new(Standard::Vvc);
    // nuh_layer_id = 63, nuh_temporal_id_plus1 = 0
    let nal = parser.parse_nal(&[0x3F, 0xA0, 0x88]);
    assert_eq!(nal.status, ParseStatus::Complete);
    let fields: Vec<&str> = nal.warnings.iter().map(|w| w.field.as_str()).collect();
    assert_eq!(fields, vec!["nuh_layer_id", "nuh_temporal_id_plus1"]);
    assert!(matches!(
        nal.warnings[0].issue,
        ConformanceIssue::ValueOutOfRange { value: 63, .. }
    ));
}

#[test]
fn test_opi_extension_is_info() {
    let mut bw = BitWriter::new();
    bw.write_bits(0x0061, 16);
    bw.write_flag(true);
    bw.write_flag(false);
    bw.write_ue(0);
    bw.write_flag(true); // opi_extension_flag
    bw.write_bits(0b101, 3);
    bw.write_rbsp_trailing_bits();

    let mut parser = NalParser::new(Standard::Vvc);
    let nal = parser.parse_nal(&bw.finish());
    assert_eq!(nal.status, ParseStatus::Complete);
    assert_eq!(nal.warnings.len(), 1);
    assert_eq!(nal.warnings[0].severity(), Severity::Info);
    assert_eq!(nal.warnings[0].field, "opi_extension_data_flag");
    let opi = parser.context().as_vvc().unwrap().opi().unwrap();
    assert_eq!(opi.ols_idx, Some(0));
    assert!(opi.extension_flag);
}
