//! 带日志的语法读取器.
//!
//! [`SyntaxReader`] 把 [`BitReader`]、[`TreeBuilder`] 与 [`FieldLog`] 组合在一起:
//! 每次具名读取先写日志, 再把值挂到当前语法节点上, 最后做一致性检查.
//! 读取失败时记录失败位置, 由 [`SyntaxReader::finish`] 生成标记为不完整的语法树.

use std::fmt;

use bytes::Bytes;
use log::debug;
use nalyzer_core::{BitReader, NalError, NalResult};

use super::log::{FieldEntry, FieldLog};
use super::node::{Field, SyntaxNode, TreeBuilder};
use super::value::{Descriptor, FieldValue};
use crate::conformance::{ConformanceIssue, ConformanceWarning};

/// 字段的语义说明来源
#[derive(Debug, Clone, Copy, Default)]
pub enum Meaning<'m> {
    #[default]
    None,
    /// 固定文本
    Text(&'m str),
    /// 以取值为下标的名称表
    Table(&'m [&'m str]),
    /// 按取值计算的说明
    Lookup(fn(u64) -> Option<String>),
}

impl Meaning<'_> {
    fn describe(&self, value: &FieldValue) -> Option<String> {
        match self {
            Self::None => None,
            Self::Text(text) => Some((*text).to_string()),
            Self::Table(table) => {
                let index = usize::try_from(value.as_u64()?).ok()?;
                table.get(index).map(|s| (*s).to_string())
            }
            Self::Lookup(f) => f(value.as_u64()?),
        }
    }
}

/// 具名读取的附加选项: 语义说明与一致性检查
#[derive(Debug, Clone, Copy, Default)]
pub struct Opts<'m> {
    pub meaning: Meaning<'m>,
    /// 合法取值范围 (闭区间)
    pub range: Option<(i64, i64)>,
    /// 标准规定的固定值
    pub expected: Option<u64>,
}

impl<'m> Opts<'m> {
    pub const fn none() -> Self {
        Self {
            meaning: Meaning::None,
            range: None,
            expected: None,
        }
    }

    pub const fn text(text: &'m str) -> Self {
        Self {
            meaning: Meaning::Text(text),
            ..Self::none()
        }
    }

    pub const fn table(table: &'m [&'m str]) -> Self {
        Self {
            meaning: Meaning::Table(table),
            ..Self::none()
        }
    }

    pub const fn lookup(f: fn(u64) -> Option<String>) -> Self {
        Self {
            meaning: Meaning::Lookup(f),
            ..Self::none()
        }
    }

    pub const fn range(min: i64, max: i64) -> Self {
        Self::none().with_range(min, max)
    }

    pub const fn expect(value: u64) -> Self {
        Self {
            expected: Some(value),
            ..Self::none()
        }
    }

    pub const fn with_range(mut self, min: i64, max: i64) -> Self {
        self.range = Some((min, max));
        self
    }
}

/// 解析中断信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseFailure {
    pub error: NalError,
    /// 读取失败的字段
    pub field: String,
    /// 失败时的位偏移
    pub bit_offset: usize,
}

impl fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "读取 {} 失败 (位偏移 {}): {}",
            self.field, self.bit_offset, self.error
        )
    }
}

/// 一次解析的全部产物
#[derive(Debug, Clone)]
pub struct ParseOutput {
    pub node: SyntaxNode,
    pub log: FieldLog,
    pub warnings: Vec<ConformanceWarning>,
    /// 解析中断时的失败信息
    pub failure: Option<ParseFailure>,
}

impl ParseOutput {
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }
}

/// 带日志的语法读取器
#[derive(Debug)]
pub struct SyntaxReader<'a> {
    bits: BitReader<'a>,
    tree: TreeBuilder,
    log: FieldLog,
    warnings: Vec<ConformanceWarning>,
    failure: Option<ParseFailure>,
}

impl<'a> SyntaxReader<'a> {
    /// 在 RBSP 上创建读取器, 字段挂在名为 `root_name` 的根节点下
    pub fn new(data: &'a [u8], root_name: &str) -> Self {
        Self {
            bits: BitReader::new(data),
            tree: TreeBuilder::new(root_name),
            log: FieldLog::new(),
            warnings: Vec::new(),
            failure: None,
        }
    }

    // ============================================================
    // 位置查询
    // ============================================================

    /// 已读取的位数
    pub fn position(&self) -> usize {
        self.bits.bits_read()
    }

    pub fn bits_left(&self) -> usize {
        self.bits.bits_left()
    }

    pub fn is_byte_aligned(&self) -> bool {
        self.bits.is_byte_aligned()
    }

    pub fn more_rbsp_data(&self) -> bool {
        self.bits.more_rbsp_data()
    }

    /// 窥视后续位 (不记录日志)
    pub fn peek_bits(&self, n: u32) -> NalResult<u32> {
        self.bits.peek_bits(n)
    }

    /// 已产生的警告
    pub fn warnings(&self) -> &[ConformanceWarning] {
        &self.warnings
    }

    // ============================================================
    // 结构嵌套
    // ============================================================

    /// 开始子结构
    pub fn begin(&mut self, name: impl Into<String>) {
        self.tree.begin(name);
    }

    /// 结束子结构
    pub fn end(&mut self) {
        self.tree.end();
    }

    /// 在名为 `name` 的子结构中执行 `f`
    ///
    /// `f` 失败时结构保持打开, [`finish`](Self::finish) 会将其标记为不完整.
    pub fn structure<T>(
        &mut self,
        name: impl Into<String>,
        f: impl FnOnce(&mut Self) -> NalResult<T>,
    ) -> NalResult<T> {
        self.tree.begin(name);
        let value = f(self)?;
        self.tree.end();
        Ok(value)
    }

    // ============================================================
    // 具名读取
    // ============================================================

    /// u(n), n <= 32
    pub fn read_bits(&mut self, name: &str, n: u32) -> NalResult<u32> {
        self.read_bits_with(name, n, Opts::none())
    }

    pub fn read_bits_with(&mut self, name: &str, n: u32, opts: Opts<'_>) -> NalResult<u32> {
        let value = self.read_fixed(name, n, Descriptor::U(n), &opts)?;
        Ok(value as u32)
    }

    /// u(n), n <= 64
    pub fn read_bits_u64(&mut self, name: &str, n: u32) -> NalResult<u64> {
        self.read_fixed(name, n, Descriptor::U(n), &Opts::none())
    }

    /// u(1) 标志
    pub fn read_flag(&mut self, name: &str) -> NalResult<bool> {
        self.read_flag_with(name, Opts::none())
    }

    pub fn read_flag_with(&mut self, name: &str, opts: Opts<'_>) -> NalResult<bool> {
        let offset = self.position();
        let bit = self.bits.read_bit().map_err(|e| self.fail(name, e))?;
        let value = FieldValue::Flag(bit == 1);
        self.record(name, Descriptor::U(1), offset, Some(u64::from(bit)), value, &opts);
        Ok(bit == 1)
    }

    /// ue(v)
    pub fn read_ue(&mut self, name: &str) -> NalResult<u32> {
        self.read_ue_with(name, Opts::none())
    }

    pub fn read_ue_with(&mut self, name: &str, opts: Opts<'_>) -> NalResult<u32> {
        let offset = self.position();
        let value = self.bits.read_ue().map_err(|e| self.fail(name, e))?;
        let raw = self.raw_since(offset);
        let field_value = FieldValue::Unsigned(u64::from(value));
        self.record(name, Descriptor::Ue, offset, raw, field_value, &opts);
        Ok(value)
    }

    /// se(v)
    pub fn read_se(&mut self, name: &str) -> NalResult<i32> {
        self.read_se_with(name, Opts::none())
    }

    pub fn read_se_with(&mut self, name: &str, opts: Opts<'_>) -> NalResult<i32> {
        let offset = self.position();
        let value = self.bits.read_se().map_err(|e| self.fail(name, e))?;
        let raw = self.raw_since(offset);
        let field_value = FieldValue::Signed(i64::from(value));
        self.record(name, Descriptor::Se, offset, raw, field_value, &opts);
        Ok(value)
    }

    /// 保留字段: 读取 n 位, 不等于 `expected` 时产生 ReservedFieldMismatch
    pub fn read_reserved(&mut self, name: &str, n: u32, expected: u64) -> NalResult<u64> {
        self.read_fixed(name, n, Descriptor::U(n), &Opts::expect(expected))
    }

    /// 固定模式字段 f(n), 如 forbidden_zero_bit
    pub fn read_fixed_pattern(&mut self, name: &str, n: u32, expected: u64) -> NalResult<u64> {
        self.read_fixed(name, n, Descriptor::F(n), &Opts::expect(expected))
    }

    fn read_fixed(
        &mut self,
        name: &str,
        n: u32,
        descriptor: Descriptor,
        opts: &Opts<'_>,
    ) -> NalResult<u64> {
        let offset = self.position();
        let value = self.bits.read_bits_u64(n).map_err(|e| self.fail(name, e))?;
        let field_value = match descriptor {
            Descriptor::U(1) | Descriptor::F(1) if opts.expected.is_none() => {
                FieldValue::Flag(value == 1)
            }
            _ => FieldValue::Unsigned(value),
        };
        self.record(name, descriptor, offset, Some(value), field_value, opts);
        Ok(value)
    }

    // ============================================================
    // 对齐与尾部
    // ============================================================

    /// 对齐到字节边界, 跳过的位作为一个对齐字段记录 (应全为 0)
    ///
    /// 已对齐时不读取也不记录, 因此连续调用是幂等的.
    pub fn byte_align(&mut self, name: &str) -> NalResult<()> {
        if self.is_byte_aligned() {
            return Ok(());
        }
        let n = 8 - (self.position() % 8) as u32;
        self.read_fixed(name, n, Descriptor::F(n), &Opts::expect(0))?;
        Ok(())
    }

    /// rbsp_trailing_bits(): 停止位 1 加对齐零位
    ///
    /// 取值错误只产生 InvalidTrailingBit 警告.
    pub fn rbsp_trailing_bits(&mut self) -> NalResult<()> {
        let stop = self.read_fixed("rbsp_stop_one_bit", 1, Descriptor::F(1), &Opts::none())?;
        if stop != 1 {
            self.warn_at_last(
                "rbsp_stop_one_bit",
                ConformanceIssue::InvalidTrailingBit { actual: stop },
            );
        }
        if !self.is_byte_aligned() {
            let n = 8 - (self.position() % 8) as u32;
            let zeros =
                self.read_fixed("rbsp_alignment_zero_bit", n, Descriptor::F(n), &Opts::none())?;
            if zeros != 0 {
                self.warn_at_last(
                    "rbsp_alignment_zero_bit",
                    ConformanceIssue::InvalidTrailingBit { actual: zeros },
                );
            }
        }
        Ok(())
    }

    /// 读取未解析的扩展数据, 直到 rbsp_trailing_bits 之前
    ///
    /// 整段记录为一个不透明字段, 并产生 UnsupportedExtension 提示.
    pub fn read_extension_data(&mut self, name: &str) -> NalResult<()> {
        let count = self.capture_until_trailing(name, &Opts::none())?;
        self.warn_at_last(name, ConformanceIssue::UnsupportedExtension { bits: count });
        Ok(())
    }

    /// 读取未展开的后续语法, 直到 rbsp_trailing_bits 之前
    ///
    /// 与 `read_extension_data` 相同地整段记录, 不产生提示.
    pub fn read_remaining_data(&mut self, name: &str) -> NalResult<usize> {
        self.capture_until_trailing(name, &Opts::text("后续语法未展开"))
    }

    fn capture_until_trailing(&mut self, name: &str, opts: &Opts<'_>) -> NalResult<usize> {
        let offset = self.position();
        let mut packed = Vec::new();
        let mut count = 0usize;
        while self.bits.more_rbsp_data() {
            let bit = self.bits.read_bit().map_err(|e| self.fail(name, e))?;
            if count % 8 == 0 {
                packed.push(0u8);
            }
            if bit == 1 {
                if let Some(last) = packed.last_mut() {
                    *last |= 0x80 >> (count % 8);
                }
            }
            count += 1;
        }
        let raw = self.raw_since(offset);
        let value = FieldValue::Bytes(Bytes::from(packed));
        self.record(name, Descriptor::Opaque, offset, raw, value, opts);
        Ok(count)
    }

    /// 读取从当前字节到缓冲区末尾的全部数据, 作为不透明字段
    pub fn read_opaque_payload(&mut self, name: &str) -> NalResult<Bytes> {
        self.byte_align("alignment_bits")?;
        let offset = self.position();
        let n = self.bits.bits_left() / 8;
        let data = self.bits.read_bytes(n).map_err(|e| self.fail(name, e))?;
        let payload = Bytes::copy_from_slice(data);
        let raw = self.raw_since(offset);
        let value = FieldValue::Bytes(payload.clone());
        self.record(name, Descriptor::Opaque, offset, raw, value, &Opts::none());
        Ok(payload)
    }

    /// 跳过从当前字节到缓冲区末尾的数据, 只记录字节数
    pub fn skip_opaque_payload(&mut self, name: &str) -> NalResult<usize> {
        self.byte_align("alignment_bits")?;
        let offset = self.position();
        let n = self.bits.bits_left() / 8;
        self.bits.read_bytes(n).map_err(|e| self.fail(name, e))?;
        let value = FieldValue::Unsigned(n as u64);
        let opts = Opts::text("载荷未保留, 取值为字节数");
        self.record(name, Descriptor::Opaque, offset, None, value, &opts);
        Ok(n)
    }

    // ============================================================
    // 警告与失败
    // ============================================================

    /// 对最近记录的字段附加一致性警告
    pub fn warn(&mut self, field: &str, issue: ConformanceIssue) {
        self.warn_at_last(field, issue);
    }

    /// 以无效数据中断解析, 返回应向上传播的错误
    pub fn invalid(&mut self, field: &str, message: impl Into<String>) -> NalError {
        self.fail(field, NalError::InvalidData(message.into()))
    }

    fn warn_at_last(&mut self, field: &str, issue: ConformanceIssue) {
        let log_index = self.log.len().checked_sub(1);
        self.push_warning(field, issue, log_index);
    }

    fn push_warning(&mut self, field: &str, issue: ConformanceIssue, log_index: Option<usize>) {
        debug!("一致性问题: {field}: {issue}");
        self.warnings.push(ConformanceWarning {
            field: field.to_string(),
            issue,
            log_index,
        });
    }

    fn fail(&mut self, field: &str, error: NalError) -> NalError {
        if self.failure.is_none() {
            debug!(
                "解析中断: {field} (位偏移 {}): {error}",
                self.bits.bits_read()
            );
            self.failure = Some(ParseFailure {
                error: error.clone(),
                field: field.to_string(),
                bit_offset: self.bits.bits_read(),
            });
        }
        error
    }

    // ============================================================
    // 记录
    // ============================================================

    fn raw_since(&self, offset: usize) -> Option<u64> {
        let len = self.position() - offset;
        if len > 64 {
            return None;
        }
        let mut br = BitReader::new(self.bits.data());
        br.skip_bits(offset).ok()?;
        br.read_bits_u64(len as u32).ok()
    }

    fn record(
        &mut self,
        name: &str,
        descriptor: Descriptor,
        bit_offset: usize,
        raw: Option<u64>,
        value: FieldValue,
        opts: &Opts<'_>,
    ) {
        let entry = FieldEntry {
            name: name.to_string(),
            descriptor,
            bit_offset,
            bit_len: self.position() - bit_offset,
            raw,
            value: value.clone(),
            meaning: opts.meaning.describe(&value),
            depth: self.tree.depth(),
        };
        let log_index = self.log.push(entry);

        if let Some(expected) = opts.expected {
            let actual = value.as_u64().unwrap_or_default();
            if actual != expected {
                let issue = ConformanceIssue::ReservedFieldMismatch { expected, actual };
                self.push_warning(name, issue, Some(log_index));
            }
        }
        if let (Some((min, max)), Some(v)) = (opts.range, value.as_i64()) {
            if v < min || v > max {
                let issue = ConformanceIssue::ValueOutOfRange { value: v, min, max };
                self.push_warning(name, issue, Some(log_index));
            }
        }

        self.tree.push_field(Field {
            name: name.to_string(),
            value,
            log_index,
        });
    }

    /// 结束解析, 返回语法树、日志与警告
    ///
    /// 若解析中断, 所有未结束的结构被关闭并标记为不完整.
    pub fn finish(self) -> ParseOutput {
        let incomplete = self.failure.is_some();
        ParseOutput {
            node: self.tree.finish(incomplete),
            log: self.log,
            warnings: self.warnings,
            failure: self.failure,
        }
    }
}
