//! nalyzer-probe - NAL 码流探测工具
//!
//! 逐个 NAL 单元解析 H.264/H.265/H.266 裸码流, 打印语法字段、一致性警告与视频属性.

mod config;
mod logging;
mod report;

use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{debug, error, info};
use rayon::prelude::*;

use nalyzer_parser::{NalParser, split_annex_b, split_length_prefixed};

use config::ProbeConfig;
use report::{FileReport, NalReport};

/// nalyzer 码流探测工具
#[derive(Parser, Debug)]
#[command(name = "nalyzer-probe", version, about = "H.264/H.265/H.266 NAL 语法探测工具")]
struct Cli {
    /// 输入文件 (Annex B 或长度前缀格式)
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// 编码标准 (avc/hevc/vvc), 缺省时按扩展名推断
    #[arg(short, long)]
    standard: Option<String>,

    /// 输入为长度前缀格式, 取值为前缀字节数 (1~4)
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=4))]
    length_size: Option<u8>,

    /// 打印每个字段
    #[arg(long)]
    show_fields: bool,

    /// 输出 JSON 格式
    #[arg(long)]
    json: bool,

    /// 保留 emulation prevention 字节 (00 00 03)
    #[arg(long)]
    keep_emulation_prevention: bool,

    /// JSON 配置文件
    #[arg(long)]
    config: Option<PathBuf>,

    /// 静默模式 (控制台只输出错误)
    #[arg(short, long)]
    quiet: bool,

    /// 日志级别 (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    /// 合并配置文件与命令行参数, 命令行优先
    fn resolve_config(&self) -> Result<ProbeConfig> {
        let mut config = match &self.config {
            Some(path) => ProbeConfig::load(path)?,
            None => ProbeConfig::default(),
        };
        if let Some(standard) = &self.standard {
            config.standard = Some(standard.clone());
        }
        if let Some(size) = self.length_size {
            config.length_size = Some(usize::from(size));
        }
        if self.show_fields {
            config.show_fields = true;
        }
        if self.keep_emulation_prevention {
            config.strip_emulation_prevention = false;
        }
        config.validate()?;
        Ok(config)
    }
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(&cli) {
        eprintln!("错误: {e:#}");
        process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = cli.resolve_config()?;
    logging::init(&config.log, cli.verbose, cli.quiet)?;
    info!("nalyzer-probe {} 启动, 输入 {} 个文件", env!("CARGO_PKG_VERSION"), cli.inputs.len());

    // 每个文件使用独立的解析器
    let results: Vec<(&PathBuf, Result<FileReport>)> = cli
        .inputs
        .par_iter()
        .map(|path| (path, probe_file(path, &config)))
        .collect();

    let mut reports = Vec::new();
    let mut failed = 0usize;
    for (path, result) in results {
        match result {
            Ok(report) => reports.push(report),
            Err(e) => {
                error!("处理 {} 失败: {e:#}", path.display());
                eprintln!("错误: {}: {e:#}", path.display());
                failed += 1;
            }
        }
    }

    if cli.json {
        let text = serde_json::to_string_pretty(&reports).context("序列化 JSON 报告失败")?;
        println!("{text}");
    } else {
        for report in &reports {
            println!("{}", report.to_text());
        }
    }

    if failed > 0 {
        bail!("{failed} 个文件处理失败");
    }
    Ok(())
}

/// 解析单个文件
fn probe_file(path: &Path, config: &ProbeConfig) -> Result<FileReport> {
    let standard = config.standard_for(path)?;
    let data =
        std::fs::read(path).with_context(|| format!("无法打开文件 '{}'", path.display()))?;
    debug!("{}: {} 字节, 标准 {standard}", path.display(), data.len());

    let mut parser = NalParser::with_config(standard, config.parser_config());
    let (framing, chunks) = match config.length_size {
        Some(size) => ("length-prefixed", split_length_prefixed(&data, size)?),
        None => ("annexb", split_annex_b(&data)),
    };
    if chunks.is_empty() {
        bail!("未找到 NAL 单元");
    }

    let nal_units = chunks
        .iter()
        .enumerate()
        .map(|(index, chunk)| {
            let nal = parser.parse_nal(chunk.data);
            NalReport::new(index, chunk.offset, &nal, config.show_fields)
        })
        .collect();

    let file = path.display().to_string();
    info!("{file}: 解析 {} 个 NAL 单元", parser.stats().nal_units);
    Ok(FileReport::new(file, framing, nal_units, &parser))
}
