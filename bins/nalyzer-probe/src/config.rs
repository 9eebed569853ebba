//! 探测配置.
//!
//! 配置文件为 JSON, 所有字段可省略; 命令行参数优先于配置文件.
//!
//! ```json
//! {
//!   "standard": "hevc",
//!   "length_size": 4,
//!   "strip_emulation_prevention": true,
//!   "keep_opaque_payload": false,
//!   "show_fields": true,
//!   "log": { "directory": "logs", "file_prefix": "nalyzer-probe" }
//! }
//! ```

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use nalyzer_parser::{ParserConfig, Standard};
use serde::{Deserialize, Serialize};

/// 日志输出配置
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LogConfig {
    pub directory: String,
    pub file_prefix: String,
    /// 文件日志过滤规则 (EnvFilter 语法), 为空时由 -v 决定
    pub level: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            directory: "logs".to_string(),
            file_prefix: "nalyzer-probe".to_string(),
            level: None,
        }
    }
}

/// 探测配置
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// 编码标准; 为空时按文件扩展名推断
    pub standard: Option<String>,
    /// 长度前缀字节数; 为空时按 Annex B 处理
    pub length_size: Option<usize>,
    pub strip_emulation_prevention: bool,
    pub keep_opaque_payload: bool,
    pub show_fields: bool,
    pub log: LogConfig,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        let parser = ParserConfig::default();
        Self {
            standard: None,
            length_size: None,
            strip_emulation_prevention: parser.strip_emulation_prevention,
            keep_opaque_payload: parser.keep_opaque_payload,
            show_fields: false,
            log: LogConfig::default(),
        }
    }
}

impl ProbeConfig {
    /// 从 JSON 文件加载
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("读取配置文件失败, path={}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("解析配置文件失败, path={}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// 校验取值
    pub fn validate(&self) -> Result<()> {
        if let Some(size) = self.length_size {
            if !(1..=4).contains(&size) {
                bail!("length_size 必须为 1~4, 实际 {size}");
            }
        }
        if let Some(name) = &self.standard {
            name.parse::<Standard>()
                .with_context(|| format!("配置中的编码标准无效: {name}"))?;
        }
        Ok(())
    }

    /// 解析器配置
    pub fn parser_config(&self) -> ParserConfig {
        ParserConfig {
            strip_emulation_prevention: self.strip_emulation_prevention,
            keep_opaque_payload: self.keep_opaque_payload,
        }
    }

    /// 确定文件使用的编码标准: 显式指定 > 扩展名
    pub fn standard_for(&self, path: &Path) -> Result<Standard> {
        if let Some(name) = &self.standard {
            return Ok(name.parse::<Standard>()?);
        }
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Standard::from_extension)
            .with_context(|| format!("无法从扩展名推断编码标准, 请使用 --standard: {}", path.display()))
    }
}
