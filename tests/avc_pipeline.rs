//! H.264 码流解析集成测试

use nalyzer::core::{BitWriter, Rational};
use nalyzer::parser::{ConformanceIssue, NalParser, ParseStatus, Standard};

// ============================================================
// 码流构造
// ============================================================

/// 插入 emulation prevention 字节
fn escape(rbsp: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(rbsp.len() + 8);
    let mut zeros = 0;
    for &b in rbsp {
        if zeros >= 2 && b <= 3 {
            out.push(0x03);
            zeros = 0;
        }
        out.push(b);
        zeros = if b == 0 { zeros + 1 } else { 0 };
    }
    out
}

/// 1920x1080 High profile level 4.0 SPS, VUI 含 SAR 1:1 与 25 fps
fn build_sps() -> Vec<u8> {
    let mut bw = BitWriter::new();
    bw.write_bits(0x67, 8);
    bw.write_bits(100, 8);
    bw.write_bits(0, 8);
    bw.write_bits(40, 8);
    bw.write_ue(0);
    bw.write_ue(1); // 4:2:0
    bw.write_ue(0);
    bw.write_ue(0);
    bw.write_flag(false);
    bw.write_flag(false);
    bw.write_ue(0);
    bw.write_ue(0);
    bw.write_ue(2);
    bw.write_ue(4);
    bw.write_flag(false);
    bw.write_ue(119);
    bw.write_ue(67);
    bw.write_flag(true);
    bw.write_flag(true);
    bw.write_flag(true); // frame_cropping_flag
    bw.write_ue(0);
    bw.write_ue(0);
    bw.write_ue(0);
    bw.write_ue(4);
    bw.write_flag(true); // vui_parameters_present_flag
    bw.write_flag(true); // aspect_ratio_info_present_flag
    bw.write_bits(1, 8);
    bw.write_flag(false); // overscan
    bw.write_flag(true); // video_signal_type_present_flag
    bw.write_bits(5, 3);
    bw.write_flag(false);
    bw.write_flag(true);
    bw.write_bits(1, 8);
    bw.write_bits(1, 8);
    bw.write_bits(1, 8);
    bw.write_flag(false); // chroma_loc
    bw.write_flag(true); // timing_info_present_flag
    bw.write_bits(1, 32);
    bw.write_bits(50, 32);
    bw.write_flag(true);
    bw.write_flag(false); // nal_hrd
    bw.write_flag(false); // vcl_hrd
    bw.write_flag(false); // pic_struct_present_flag
    bw.write_flag(false); // bitstream_restriction_flag
    bw.write_rbsp_trailing_bits();
    escape(&bw.finish())
}

/// CABAC PPS, 开启 8x8 变换
fn build_pps(sps_id: u32) -> Vec<u8> {
    let mut bw = BitWriter::new();
    bw.write_bits(0x68, 8);
    bw.write_ue(0);
    bw.write_ue(sps_id);
    bw.write_flag(true); // CABAC
    bw.write_flag(false);
    bw.write_ue(0);
    bw.write_ue(2);
    bw.write_ue(0);
    bw.write_flag(true);
    bw.write_bits(2, 2);
    bw.write_se(-3);
    bw.write_se(0);
    bw.write_se(-2);
    bw.write_flag(true);
    bw.write_flag(false);
    bw.write_flag(false);
    bw.write_flag(true); // transform_8x8_mode_flag
    bw.write_flag(false);
    bw.write_se(-2);
    bw.write_rbsp_trailing_bits();
    escape(&bw.finish())
}

fn build_stream() -> Vec<u8> {
    let mut data = Vec::new();
    // AUD: primary_pic_type = 0
    data.extend_from_slice(&[0x00, 0x00, 0x00, 0x01, 0x09, 0x10]);
    data.extend_from_slice(&[0x00, 0x00, 0x00, 0x01]);
    data.extend(build_sps());
    data.extend_from_slice(&[0x00, 0x00, 0x01]);
    data.extend(build_pps(0));
    // SEI 与 IDR 切片不展开
    data.extend_from_slice(&[0x00, 0x00, 0x01, 0x06, 0x05, 0x01, 0xAA, 0x80]);
    data.extend_from_slice(&[0x00, 0x00, 0x01, 0x65, 0x88, 0x84, 0x00, 0x33, 0xFF]);
    data
}

// ============================================================
// 测试
// ============================================================

#[test]
fn test_annex_b_stream_parse() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut parser = NalParser::new(Standard::Avc);
    let nals = parser.parse_annex_b(&build_stream());

    let types: Vec<&str> = nals.iter().map(|n| n.type_name()).collect();
    assert_eq!(types, vec!["AUD", "SPS", "PPS", "SEI", "CODED_SLICE_IDR"]);
    let statuses: Vec<ParseStatus> = nals.iter().map(|n| n.status).collect();
    assert_eq!(
        statuses,
        vec![
            ParseStatus::Complete,
            ParseStatus::Complete,
            ParseStatus::Complete,
            ParseStatus::Opaque,
            ParseStatus::Opaque,
        ]
    );
    for nal in &nals {
        assert!(nal.warnings.is_empty(), "{}: {:?}", nal.type_name(), nal.warnings);
    }

    let sps = &nals[1];
    assert_eq!(sps.rbsp_name, Some("seq_parameter_set_rbsp"));
    let rbsp = sps.rbsp().unwrap();
    assert_eq!(rbsp.field_u64("profile_idc"), Some(100));
    assert!(rbsp.child("vui_parameters").is_some());
    assert!(sps.emulation_prevention_bytes > 0);

    let pps = nals[2].rbsp().unwrap();
    assert_eq!(pps.flag("transform_8x8_mode_flag"), Some(true));
    assert_eq!(
        nals[2]
            .log
            .find("pic_init_qp_minus26")
            .map(|e| e.value.as_i64()),
        Some(Some(-3))
    );
}

#[test]
fn test_video_properties_from_sps() {
    let mut parser = NalParser::new(Standard::Avc);
    parser.parse_annex_b(&build_stream());

    let props = parser.video_properties().unwrap();
    assert_eq!(props.profile_name, Some("High"));
    assert_eq!(props.level_name(), "4.0");
    assert_eq!((props.width, props.height), (Some(1920), Some(1080)));
    assert_eq!((props.coded_width, props.coded_height), (Some(1920), Some(1088)));
    assert_eq!(props.chroma_format_name(), Some("4:2:0"));
    assert_eq!(props.bit_depth_luma, Some(8));
    assert_eq!(props.frame_rate, Some(Rational::new(25, 1)));
    assert_eq!(props.sample_aspect_ratio, Some(Rational::new(1, 1)));

    let status = parser.status();
    assert!(status.contains("High level 4.0"));
    assert!(status.contains("1920x1080"));
}

#[test]
fn test_pps_with_unknown_sps_warns() {
    let mut parser = NalParser::new(Standard::Avc);
    parser.parse_nal(&build_sps());
    let nal = parser.parse_nal(&build_pps(3));

    assert_eq!(nal.status, ParseStatus::Complete);
    assert_eq!(nal.warnings.len(), 1);
    assert_eq!(nal.warnings[0].field, "seq_parameter_set_id");
    assert_eq!(nal.warnings[0].issue, ConformanceIssue::MissingReference { id: 3 });
}

#[test]
fn test_truncated_sps_keeps_context() {
    let mut parser = NalParser::new(Standard::Avc);
    let sps = build_sps();
    let nal = parser.parse_nal(&sps[..sps.len() - 1]);

    assert_eq!(nal.status, ParseStatus::Incomplete);
    assert!(nal.node.is_incomplete());
    assert!(nal.failure.as_ref().unwrap().error.is_out_of_data());
    assert!(!nal.log.is_empty());
    assert!(parser.video_properties().is_none());
    assert_eq!(parser.stats().incomplete, 1);
}

#[test]
fn test_field_log_is_contiguous() {
    let mut parser = NalParser::new(Standard::Avc);
    for nal in parser.parse_annex_b(&build_stream()) {
        let mut next = 0;
        for entry in nal.log.iter() {
            assert_eq!(entry.bit_offset, next, "{}: {}", nal.type_name(), entry.name);
            next += entry.bit_len;
        }
        assert_eq!(nal.log.len(), nal.node.field_count());
        assert_eq!(nal.log.total_bits(), (nal.size - nal.emulation_prevention_bytes) * 8);
    }
}

#[test]
fn test_length_prefixed_input() {
    let mut data = Vec::new();
    for nal in [build_sps(), build_pps(0)] {
        data.extend_from_slice(&(nal.len() as u32).to_be_bytes());
        data.extend(nal);
    }
    let mut parser = NalParser::new(Standard::Avc);
    let nals = parser.parse_length_prefixed(&data, 4).unwrap();
    assert_eq!(nals.len(), 2);
    assert!(nals.iter().all(|n| n.status == ParseStatus::Complete));
    assert!(parser.parse_length_prefixed(&data, 0).is_err());
}
