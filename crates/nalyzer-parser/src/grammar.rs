//! 各标准语法实现的公共接口.
//!
//! 每个标准提供: NAL 头部解析、按 nal_unit_type 查找 RBSP 解析函数的分发表、
//! 以及解析成功后写回上下文的方式. 分发器只在边界处按标准选择一次实现.

use std::fmt;

use nalyzer_core::NalResult;

use crate::context::VideoProperties;
use crate::standard::{NalHeader, Standard};
use crate::syntax::SyntaxReader;

/// RBSP 解析函数
///
/// 字段写入当前节点 (由分发器以 RBSP 名称打开). 需要被后续 NAL 引用的结构
/// 返回 `Some(update)`, 由分发器在解析完整成功后提交.
pub type ParseFn<C, U> = fn(&mut SyntaxReader<'_>, &C) -> NalResult<Option<U>>;

/// 分发表条目
pub struct Entry<C, U> {
    /// RBSP 语法结构名称, 如 `seq_parameter_set_rbsp`
    pub name: &'static str,
    pub parse: ParseFn<C, U>,
}

impl<C, U> Clone for Entry<C, U> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C, U> Copy for Entry<C, U> {}

impl<C, U> fmt::Debug for Entry<C, U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry").field("name", &self.name).finish()
    }
}

/// 单个编码标准的语法实现
pub trait Grammar {
    const STANDARD: Standard;

    /// 该标准的解析上下文
    type Context: Default + fmt::Debug + Send + Sync;
    /// 解析成功后写回上下文的内容
    type Update;

    /// 解析 NAL 头部 (字段写入当前节点)
    fn parse_header(r: &mut SyntaxReader<'_>) -> NalResult<NalHeader>;

    /// 按 nal_unit_type 查找 RBSP 解析函数, 不支持的类型返回 `None`
    fn entry(nal_unit_type: u8) -> Option<Entry<Self::Context, Self::Update>>;

    /// 提交上下文更新
    fn commit(ctx: &mut Self::Context, update: Self::Update);

    /// 从上下文派生视频属性
    fn video_properties(ctx: &Self::Context) -> Option<VideoProperties>;
}
