//! 探测报告: JSON 结构与文本输出.

use std::fmt::Write as _;

use nalyzer_parser::syntax::NodeItem;
use nalyzer_parser::{
    FieldLog, FieldValue, NalParser, ParseStats, ParsedNal, SyntaxNode, VideoProperties,
};
use serde::Serialize;
use serde_json::{Value, json};

/// 单个文件的探测结果
#[derive(Debug, Serialize)]
pub struct FileReport {
    pub file: String,
    pub standard: String,
    /// "annexb" 或 "length-prefixed"
    pub framing: String,
    pub nal_units: Vec<NalReport>,
    pub stats: StatsReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<VideoReport>,
    /// 解析器状态摘要
    #[serde(skip)]
    pub status: String,
}

/// 单个 NAL 单元
#[derive(Debug, Serialize)]
pub struct NalReport {
    pub index: usize,
    pub offset: usize,
    pub size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nal_unit_type: Option<u8>,
    pub type_name: String,
    pub status: String,
    pub field_count: usize,
    pub bits: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<WarningReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    /// 语法树, 仅在 --show-fields 时输出
    #[serde(skip_serializing_if = "Option::is_none")]
    pub syntax: Option<Value>,
    /// 字段日志的文本形式, 仅用于文本输出
    #[serde(skip)]
    pub field_lines: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct WarningReport {
    pub severity: String,
    pub kind: String,
    pub field: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_index: Option<usize>,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct StatsReport {
    pub nal_units: u64,
    pub complete: u64,
    pub opaque: u64,
    pub incomplete: u64,
    pub warnings: u64,
    pub bytes: u64,
    pub emulation_prevention_bytes: u64,
}

impl From<&ParseStats> for StatsReport {
    fn from(s: &ParseStats) -> Self {
        Self {
            nal_units: s.nal_units,
            complete: s.complete,
            opaque: s.opaque,
            incomplete: s.incomplete,
            warnings: s.warnings,
            bytes: s.bytes,
            emulation_prevention_bytes: s.emulation_prevention_bytes,
        }
    }
}

/// 视频属性
#[derive(Debug, Serialize)]
pub struct VideoReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    pub profile_idc: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,
    pub level: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coded_width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coded_height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chroma_format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bit_depth_luma: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bit_depth_chroma: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_rate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_aspect_ratio: Option<String>,
}

impl From<&VideoProperties> for VideoReport {
    fn from(p: &VideoProperties) -> Self {
        Self {
            profile: p.profile_name.map(str::to_string),
            profile_idc: p.profile_idc,
            tier: p
                .tier_flag
                .map(|high| if high { "High" } else { "Main" }.to_string()),
            level: p.level_name(),
            width: p.width,
            height: p.height,
            coded_width: p.coded_width,
            coded_height: p.coded_height,
            chroma_format: p.chroma_format_name().map(str::to_string),
            bit_depth_luma: p.bit_depth_luma,
            bit_depth_chroma: p.bit_depth_chroma,
            frame_rate: p.frame_rate.map(|r| r.to_string()),
            sample_aspect_ratio: p.sample_aspect_ratio.map(|r| r.to_string()),
        }
    }
}

impl NalReport {
    pub fn new(index: usize, offset: usize, nal: &ParsedNal, show_fields: bool) -> Self {
        let warnings = nal
            .warnings
            .iter()
            .map(|w| WarningReport {
                severity: w.severity().to_string(),
                kind: w.issue.kind().to_string(),
                field: w.field.clone(),
                log_index: w.log_index,
                message: w.issue.to_string(),
            })
            .collect();
        Self {
            index,
            offset,
            size: nal.size,
            nal_unit_type: nal.header.map(|h| h.nal_unit_type),
            type_name: nal.type_name().to_string(),
            status: nal.status.name().to_string(),
            field_count: nal.log.len(),
            bits: nal.log.total_bits(),
            warnings,
            failure: nal.failure.as_ref().map(ToString::to_string),
            syntax: show_fields.then(|| node_to_json(&nal.node, &nal.log)),
            field_lines: if show_fields {
                field_lines(&nal.log)
            } else {
                Vec::new()
            },
        }
    }
}

impl FileReport {
    pub fn new(file: String, framing: &str, nal_units: Vec<NalReport>, parser: &NalParser) -> Self {
        Self {
            file,
            standard: parser.standard().to_string(),
            framing: framing.to_string(),
            nal_units,
            stats: StatsReport::from(parser.stats()),
            video: parser.video_properties().as_ref().map(VideoReport::from),
            status: parser.status(),
        }
    }

    /// 文本形式
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "文件: {} ({}, {})", self.file, self.standard, self.framing);
        for nal in &self.nal_units {
            let nal_type = nal
                .nal_unit_type
                .map_or_else(|| "?".to_string(), |t| t.to_string());
            let _ = writeln!(
                out,
                "#{:<4} @{:<8} {:<14} type={:<3} {:>6} 字节 {:>5} 位 {}",
                nal.index, nal.offset, nal.type_name, nal_type, nal.size, nal.bits, nal.status
            );
            for line in &nal.field_lines {
                let _ = writeln!(out, "    {line}");
            }
            for w in &nal.warnings {
                let _ = writeln!(out, "    [{}] {}: {}", w.severity, w.field, w.message);
            }
            if let Some(failure) = &nal.failure {
                let _ = writeln!(out, "    {failure}");
            }
        }
        out.push_str(&self.status);
        out
    }
}

/// 字段日志逐行格式化: 位偏移、缩进名称、描述符、取值与含义
fn field_lines(log: &FieldLog) -> Vec<String> {
    log.iter()
        .map(|e| {
            let indent = "  ".repeat(e.depth);
            let mut line = format!(
                "{:>6} {indent}{} {} = {}",
                e.bit_offset, e.name, e.descriptor, e.value
            );
            if let Some(meaning) = &e.meaning {
                let _ = write!(line, " ({meaning})");
            }
            line
        })
        .collect()
}

/// 语法树转换为 JSON
pub fn node_to_json(node: &SyntaxNode, log: &FieldLog) -> Value {
    let items: Vec<Value> = node
        .items()
        .iter()
        .map(|item| match item {
            NodeItem::Field(field) => {
                let mut obj = json!({
                    "name": field.name,
                    "value": value_to_json(&field.value),
                });
                if let Some(entry) = log.get(field.log_index) {
                    obj["descriptor"] = json!(entry.descriptor.to_string());
                    obj["bit_offset"] = json!(entry.bit_offset);
                    obj["bits"] = json!(entry.bit_len);
                    if let Some(meaning) = &entry.meaning {
                        obj["meaning"] = json!(meaning);
                    }
                }
                obj
            }
            NodeItem::Child(child) => node_to_json(child, log),
        })
        .collect();
    let mut obj = json!({
        "name": node.name(),
        "items": items,
    });
    if node.is_incomplete() {
        obj["incomplete"] = json!(true);
    }
    obj
}

fn value_to_json(value: &FieldValue) -> Value {
    match value {
        FieldValue::Unsigned(v) => json!(v),
        FieldValue::Signed(v) => json!(v),
        FieldValue::Flag(v) => json!(v),
        FieldValue::Bytes(_) => json!(value.to_string()),
    }
}
