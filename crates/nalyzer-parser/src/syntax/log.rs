//! 字段日志.
//!
//! 每次具名读取产生一条 [`FieldEntry`], 按读取顺序追加, 追加后不再修改.
//! 日志与语法树并行, 供显示层逐条渲染.

use std::slice;

use super::value::{Descriptor, FieldValue};

/// 字段日志条目
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldEntry {
    /// 语法元素名称 (数组元素带下标, 如 `sub_layer_level_idc[2]`)
    pub name: String,
    /// 描述符
    pub descriptor: Descriptor,
    /// 在 RBSP 中的起始位偏移
    pub bit_offset: usize,
    /// 占用位数
    pub bit_len: usize,
    /// 原始位串 (不超过 64 位时记录)
    pub raw: Option<u64>,
    /// 解码值
    pub value: FieldValue,
    /// 语义说明
    pub meaning: Option<String>,
    /// 嵌套深度 (根节点下的字段为 0)
    pub depth: usize,
}

impl FieldEntry {
    /// 以二进制字符串形式返回原始位串
    pub fn raw_bits(&self) -> Option<String> {
        let raw = self.raw?;
        if self.bit_len == 0 {
            return Some(String::new());
        }
        Some(format!("{:0width$b}", raw, width = self.bit_len))
    }
}

/// 字段日志
///
/// 有限序列, 可通过 [`FieldLog::iter`] 反复遍历.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldLog {
    entries: Vec<FieldEntry>,
}

impl FieldLog {
    /// 创建空日志
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, entry: FieldEntry) -> usize {
        self.entries.push(entry);
        self.entries.len() - 1
    }

    /// 条目数
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 按读取顺序遍历
    pub fn iter(&self) -> slice::Iter<'_, FieldEntry> {
        self.entries.iter()
    }

    /// 按下标获取
    pub fn get(&self, index: usize) -> Option<&FieldEntry> {
        self.entries.get(index)
    }

    /// 查找第一个同名条目
    pub fn find(&self, name: &str) -> Option<&FieldEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// 最后一个条目
    pub fn last(&self) -> Option<&FieldEntry> {
        self.entries.last()
    }

    /// 已记录的总位数
    pub fn total_bits(&self) -> usize {
        self.entries.iter().map(|e| e.bit_len).sum()
    }
}

impl<'a> IntoIterator for &'a FieldLog {
    type Item = &'a FieldEntry;
    type IntoIter = slice::Iter<'a, FieldEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
