//! NAL 分发器.
//!
//! 解析流程:
//! 1. 按配置移除 emulation prevention 字节
//! 2. 在 `nal_unit_header` 结构中解析 NAL 头部
//! 3. 按 (标准, nal_unit_type) 查找 RBSP 解析函数, 在以 RBSP 名称命名的结构中解析
//! 4. 不支持的类型记录为不透明的 `payload_data`
//! 5. 解析完整成功时, 将参考结构提交到流上下文
//!
//! 任何输入都不会导致分发器返回错误: 读取失败体现在结果的
//! [`ParseStatus::Incomplete`] 与 [`ParseFailure`] 中.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt::Write as _;

use log::{debug, warn};
use nalyzer_core::{NalResult, Rbsp, remove_emulation_prevention};

use crate::annexb::{split_annex_b, split_length_prefixed};
use crate::avc::Avc;
use crate::conformance::ConformanceWarning;
use crate::context::{StreamContext, VideoProperties};
use crate::grammar::Grammar;
use crate::hevc::Hevc;
use crate::standard::{NalHeader, Standard};
use crate::syntax::{FieldLog, ParseFailure, SyntaxNode, SyntaxReader};
use crate::vvc::Vvc;

/// 不支持的 NAL 类型的载荷字段名
pub const PAYLOAD_FIELD: &str = "payload_data";

/// 分发器配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserConfig {
    /// 解析前移除 `00 00 03` 中的 0x03
    pub strip_emulation_prevention: bool,
    /// 不支持的类型保留完整载荷; 关闭时只记录字节数
    pub keep_opaque_payload: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            strip_emulation_prevention: true,
            keep_opaque_payload: true,
        }
    }
}

/// 单个 NAL 单元的解析结果状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParseStatus {
    /// RBSP 完整解析
    Complete,
    /// 类型不支持, 载荷作为不透明数据记录
    Opaque,
    /// 读取失败, 语法树不完整
    Incomplete,
}

impl ParseStatus {
    pub fn name(self) -> &'static str {
        match self {
            Self::Complete => "完整",
            Self::Opaque => "不透明",
            Self::Incomplete => "不完整",
        }
    }
}

/// 单个 NAL 单元的解析结果
#[derive(Debug, Clone)]
pub struct ParsedNal {
    /// 头部解析失败时为 `None`
    pub header: Option<NalHeader>,
    /// RBSP 语法结构名称, 不支持的类型为 `None`
    pub rbsp_name: Option<&'static str>,
    pub status: ParseStatus,
    /// 根节点 `nal_unit`
    pub node: SyntaxNode,
    pub log: FieldLog,
    pub warnings: Vec<ConformanceWarning>,
    pub failure: Option<ParseFailure>,
    /// NAL 单元字节数 (移除 emulation prevention 之前)
    pub size: usize,
    /// 被移除的 emulation prevention 字节数
    pub emulation_prevention_bytes: usize,
}

impl ParsedNal {
    pub fn is_complete(&self) -> bool {
        self.status != ParseStatus::Incomplete
    }

    /// NAL 类型名称, 头部解析失败时为 "?"
    pub fn type_name(&self) -> &'static str {
        self.header.as_ref().map_or("?", NalHeader::type_name)
    }

    /// RBSP 结构节点
    pub fn rbsp(&self) -> Option<&SyntaxNode> {
        self.node.child(self.rbsp_name?)
    }
}

/// 聚合统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseStats {
    pub nal_units: u64,
    pub complete: u64,
    pub opaque: u64,
    pub incomplete: u64,
    pub warnings: u64,
    pub bytes: u64,
    pub emulation_prevention_bytes: u64,
    /// 各 nal_unit_type 出现次数
    pub by_type: BTreeMap<u8, u64>,
}

impl ParseStats {
    fn record(&mut self, nal: &ParsedNal) {
        self.nal_units += 1;
        match nal.status {
            ParseStatus::Complete => self.complete += 1,
            ParseStatus::Opaque => self.opaque += 1,
            ParseStatus::Incomplete => self.incomplete += 1,
        }
        self.warnings += nal.warnings.len() as u64;
        self.bytes += nal.size as u64;
        self.emulation_prevention_bytes += nal.emulation_prevention_bytes as u64;
        if let Some(header) = &nal.header {
            *self.by_type.entry(header.nal_unit_type).or_default() += 1;
        }
    }
}

/// 最近一次解析的摘要
#[derive(Debug, Clone)]
struct LastNal {
    nal_unit_type: Option<u8>,
    type_name: &'static str,
    status: ParseStatus,
    fields: usize,
    warnings: usize,
    failure: Option<String>,
}

/// NAL 分发器, 持有单个码流的解析上下文
///
/// 不同码流使用各自的 `NalParser`, 可在不同线程中并行.
#[derive(Debug)]
pub struct NalParser {
    config: ParserConfig,
    context: StreamContext,
    stats: ParseStats,
    last: Option<LastNal>,
}

impl NalParser {
    pub fn new(standard: Standard) -> Self {
        Self::with_config(standard, ParserConfig::default())
    }

    pub fn with_config(standard: Standard, config: ParserConfig) -> Self {
        Self {
            config,
            context: StreamContext::new(standard),
            stats: ParseStats::default(),
            last: None,
        }
    }

    pub fn standard(&self) -> Standard {
        self.context.standard()
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// 解析单个 NAL 单元 (不含起始码)
    pub fn parse_nal(&mut self, data: &[u8]) -> ParsedNal {
        let parsed = match &mut self.context {
            StreamContext::Avc(ctx) => parse_unit::<Avc>(ctx, &self.config, data),
            StreamContext::Hevc(ctx) => parse_unit::<Hevc>(ctx, &self.config, data),
            StreamContext::Vvc(ctx) => parse_unit::<Vvc>(ctx, &self.config, data),
        };
        self.stats.record(&parsed);
        self.last = Some(LastNal {
            nal_unit_type: parsed.header.map(|h| h.nal_unit_type),
            type_name: parsed.type_name(),
            status: parsed.status,
            fields: parsed.log.len(),
            warnings: parsed.warnings.len(),
            failure: parsed.failure.as_ref().map(ToString::to_string),
        });
        parsed
    }

    /// 解析 Annex B 字节流中的全部 NAL 单元
    pub fn parse_annex_b(&mut self, data: &[u8]) -> Vec<ParsedNal> {
        split_annex_b(data)
            .into_iter()
            .map(|unit| self.parse_nal(unit.data))
            .collect()
    }

    /// 解析长度前缀格式的全部 NAL 单元
    pub fn parse_length_prefixed(
        &mut self,
        data: &[u8],
        length_size: usize,
    ) -> NalResult<Vec<ParsedNal>> {
        let units = split_length_prefixed(data, length_size)?;
        Ok(units
            .into_iter()
            .map(|unit| self.parse_nal(unit.data))
            .collect())
    }

    /// 从上下文派生的视频属性
    pub fn video_properties(&self) -> Option<VideoProperties> {
        self.context.video_properties()
    }

    pub fn context(&self) -> &StreamContext {
        &self.context
    }

    pub fn stats(&self) -> &ParseStats {
        &self.stats
    }

    /// 纯文本状态摘要: 统计、最近一次解析与视频属性
    pub fn status(&self) -> String {
        let s = &self.stats;
        let mut out = String::new();
        let _ = writeln!(out, "标准: {}", self.standard());
        let _ = writeln!(
            out,
            "NAL 单元: {} (完整 {}, 不透明 {}, 不完整 {}), {} 字节",
            s.nal_units, s.complete, s.opaque, s.incomplete, s.bytes
        );
        let _ = writeln!(out, "警告: {}", s.warnings);
        if let Some(last) = &self.last {
            let nal_type = last
                .nal_unit_type
                .map_or_else(|| "?".to_string(), |t| t.to_string());
            let _ = write!(
                out,
                "最近: {} ({}) {}, 字段 {} 个, 警告 {} 个",
                last.type_name,
                nal_type,
                last.status.name(),
                last.fields,
                last.warnings
            );
            if let Some(failure) = &last.failure {
                let _ = write!(out, ", {failure}");
            }
            out.push('\n');
        }
        if let Some(props) = self.video_properties() {
            let _ = writeln!(out, "视频: {}", describe_properties(&props));
        }
        out
    }

    /// 清空上下文与统计
    pub fn reset(&mut self) {
        self.context = StreamContext::new(self.standard());
        self.stats = ParseStats::default();
        self.last = None;
    }
}

/// 视频属性的单行描述
pub fn describe_properties(props: &VideoProperties) -> String {
    let mut parts = Vec::new();
    let profile = props
        .profile_name
        .map_or_else(|| format!("profile {}", props.profile_idc), str::to_string);
    let tier = match props.tier_flag {
        Some(true) => "@High",
        Some(false) => "@Main",
        None => "",
    };
    parts.push(format!("{profile} level {}{tier}", props.level_name()));
    if let (Some(w), Some(h)) = (props.width, props.height) {
        parts.push(format!("{w}x{h}"));
    }
    if let Some(chroma) = props.chroma_format_name() {
        parts.push(chroma.to_string());
    }
    if let Some(depth) = props.bit_depth_luma {
        parts.push(format!("{depth} bit"));
    }
    if let Some(fps) = props.frame_rate {
        parts.push(format!("{fps} fps"));
    }
    if let Some(sar) = props.sample_aspect_ratio {
        parts.push(format!("SAR {sar}"));
    }
    parts.join(", ")
}

/// 按标准 `G` 解析单个 NAL 单元
fn parse_unit<G: Grammar>(ctx: &mut G::Context, config: &ParserConfig, data: &[u8]) -> ParsedNal {
    let rbsp = if config.strip_emulation_prevention {
        remove_emulation_prevention(data)
    } else {
        Rbsp {
            data: Cow::Borrowed(data),
            removed: 0,
        }
    };
    let mut r = SyntaxReader::new(&rbsp.data, "nal_unit");

    let header = r.structure("nal_unit_header", G::parse_header).ok();
    let mut rbsp_name = None;
    let mut update = None;
    let status = match header {
        None => ParseStatus::Incomplete,
        Some(header) => match G::entry(header.nal_unit_type) {
            Some(entry) => {
                debug!(
                    "{} NAL {} ({}) -> {}",
                    G::STANDARD,
                    header.type_name(),
                    header.nal_unit_type,
                    entry.name
                );
                rbsp_name = Some(entry.name);
                match r.structure(entry.name, |r| (entry.parse)(r, ctx)) {
                    Ok(u) => {
                        update = u;
                        ParseStatus::Complete
                    }
                    Err(_) => ParseStatus::Incomplete,
                }
            }
            None => {
                debug!(
                    "{} NAL {} ({}) 不支持, 按不透明载荷处理",
                    G::STANDARD,
                    header.type_name(),
                    header.nal_unit_type
                );
                let payload = if config.keep_opaque_payload {
                    r.read_opaque_payload(PAYLOAD_FIELD).map(|_| ())
                } else {
                    r.skip_opaque_payload(PAYLOAD_FIELD).map(|_| ())
                };
                match payload {
                    Ok(()) => ParseStatus::Opaque,
                    Err(_) => ParseStatus::Incomplete,
                }
            }
        },
    };

    let output = r.finish();
    if let Some(failure) = &output.failure {
        warn!("{} NAL 解析中断: {failure}", G::STANDARD);
    }
    if status == ParseStatus::Complete && output.is_complete() {
        if let Some(update) = update {
            G::commit(ctx, update);
        }
    }

    ParsedNal {
        header,
        rbsp_name,
        status,
        node: output.node,
        log: output.log,
        warnings: output.warnings,
        failure: output.failure,
        size: data.len(),
        emulation_prevention_bytes: rbsp.removed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalyzer_core::BitWriter;

    fn hevc_aud() -> Vec<u8> {
        // 头部 type=35, tid_plus1=1; pic_type=0
        vec![0x46, 0x01, 0x10]
    }

    #[test]
    fn test_supported_type_is_complete() {
        let mut parser = NalParser::new(Standard::Hevc);
        let nal = parser.parse_nal(&hevc_aud());
        assert_eq!(nal.status, ParseStatus::Complete);
        assert_eq!(nal.type_name(), "AUD");
        assert_eq!(nal.rbsp_name, Some("access_unit_delimiter_rbsp"));
        assert!(nal.node.child("nal_unit_header").is_some());
        assert_eq!(nal.rbsp().and_then(|n| n.field_u64("pic_type")), Some(0));
        assert!(nal.warnings.is_empty());
    }

    #[test]
    fn test_unknown_type_is_opaque() {
        let mut parser = NalParser::new(Standard::Hevc);
        // TRAIL_R 切片
        let nal = parser.parse_nal(&[0x02, 0x01, 0xAF, 0x12, 0x34]);
        assert_eq!(nal.status, ParseStatus::Opaque);
        assert!(nal.failure.is_none());
        let payload = nal.node.field(PAYLOAD_FIELD).and_then(|v| v.as_bytes()).unwrap();
        assert_eq!(payload.as_ref(), &[0xAF, 0x12, 0x34]);
        assert_eq!(nal.log.len(), 5);
    }

    #[test]
    fn test_opaque_payload_can_be_skipped() {
        let config = ParserConfig {
            keep_opaque_payload: false,
            ..ParserConfig::default()
        };
        let mut parser = NalParser::with_config(Standard::Avc, config);
        let nal = parser.parse_nal(&[0x65, 0x88, 0x84, 0x00]);
        assert_eq!(nal.status, ParseStatus::Opaque);
        assert_eq!(nal.node.field_u64(PAYLOAD_FIELD), Some(3));
    }

    #[test]
    fn test_empty_nal_is_incomplete() {
        let mut parser = NalParser::new(Standard::Vvc);
        let nal = parser.parse_nal(&[]);
        assert_eq!(nal.status, ParseStatus::Incomplete);
        assert!(nal.header.is_none());
        assert_eq!(nal.type_name(), "?");
        assert!(nal.failure.unwrap().error.is_out_of_data());
    }

    #[test]
    fn test_truncated_unit_leaves_context_unchanged() {
        let mut parser = NalParser::new(Standard::Vvc);
        let dci = [0x00, 0x69, 0x00, 0x02, 0x33, 0x80, 0x00, 0x40];
        let nal = parser.parse_nal(&dci[..dci.len() - 1]);
        assert_eq!(nal.status, ParseStatus::Incomplete);
        assert!(nal.node.is_incomplete());
        assert!(parser.video_properties().is_none());

        let nal = parser.parse_nal(&dci);
        assert_eq!(nal.status, ParseStatus::Complete);
        assert!(parser.video_properties().is_some());
    }

    #[test]
    fn test_emulation_prevention_removed() {
        // SEI 载荷中含转义序列
        let mut parser = NalParser::new(Standard::Avc);
        let nal = parser.parse_nal(&[0x06, 0x00, 0x00, 0x03, 0x01, 0x80]);
        assert_eq!(nal.emulation_prevention_bytes, 1);
        let payload = nal.node.field(PAYLOAD_FIELD).and_then(|v| v.as_bytes()).unwrap();
        assert_eq!(payload.as_ref(), &[0x00, 0x00, 0x01, 0x80]);

        let mut raw = NalParser::with_config(
            Standard::Avc,
            ParserConfig {
                strip_emulation_prevention: false,
                ..ParserConfig::default()
            },
        );
        let nal = raw.parse_nal(&[0x06, 0x00, 0x00, 0x03, 0x01, 0x80]);
        assert_eq!(nal.emulation_prevention_bytes, 0);
        let payload = nal.node.field(PAYLOAD_FIELD).and_then(|v| v.as_bytes()).unwrap();
        assert_eq!(payload.len(), 5);
    }

    #[test]
    fn test_annex_b_stats_and_status() {
        let mut stream = vec![0x00, 0x00, 0x00, 0x01];
        stream.extend(hevc_aud());
        stream.extend([0x00, 0x00, 0x01, 0x02, 0x01, 0xAF]);
        let mut parser = NalParser::new(Standard::Hevc);
        let nals = parser.parse_annex_b(&stream);
        assert_eq!(nals.len(), 2);

        let stats = parser.stats();
        assert_eq!(stats.nal_units, 2);
        assert_eq!((stats.complete, stats.opaque, stats.incomplete), (1, 1, 0));
        assert_eq!(stats.by_type.get(&35), Some(&1));
        assert_eq!(stats.bytes, 6);

        let status = parser.status();
        assert!(status.contains("标准: HEVC"));
        assert!(status.contains("NAL 单元: 2"));
        assert!(status.contains("最近: TRAIL_R (1) 不透明"));

        parser.reset();
        assert_eq!(parser.stats(), &ParseStats::default());
        assert!(!parser.status().contains("最近"));
    }

    #[test]
    fn test_pps_sees_committed_sps() {
        let mut bw = BitWriter::new();
        bw.write_bits(0x67, 8);
        bw.write_bits(66, 8); // Baseline
        bw.write_bits(0, 8);
        bw.write_bits(30, 8);
        bw.write_ue(0);
        bw.write_ue(0); // log2_max_frame_num_minus4
        bw.write_ue(2); // poc_type 2
        bw.write_ue(1);
        bw.write_flag(false);
        bw.write_ue(21); // 352
        bw.write_ue(17); // 288
        bw.write_flag(true);
        bw.write_flag(true);
        bw.write_flag(false);
        bw.write_flag(false);
        bw.write_rbsp_trailing_bits();
        let sps = bw.finish();

        let mut bw = BitWriter::new();
        bw.write_bits(0x68, 8);
        bw.write_ue(0);
        bw.write_ue(0);
        bw.write_flag(false);
        bw.write_flag(false);
        bw.write_ue(0);
        bw.write_ue(0);
        bw.write_ue(0);
        bw.write_flag(false);
        bw.write_bits(0, 2);
        bw.write_se(0);
        bw.write_se(0);
        bw.write_se(0);
        bw.write_flag(true);
        bw.write_flag(false);
        bw.write_flag(false);
        bw.write_rbsp_trailing_bits();
        let pps = bw.finish();

        let mut parser = NalParser::new(Standard::Avc);
        assert_eq!(parser.parse_nal(&sps).status, ParseStatus::Complete);
        let nal = parser.parse_nal(&pps);
        assert_eq!(nal.status, ParseStatus::Complete);
        assert!(nal.warnings.is_empty());

        let props = parser.video_properties().unwrap();
        assert_eq!((props.width, props.height), (Some(352), Some(288)));
        assert_eq!(props.profile_name, Some("Baseline"));
        let ctx = parser.context().as_avc().unwrap();
        assert_eq!(ctx.pps_ids().collect::<Vec<_>>(), vec![0]);
    }
}
