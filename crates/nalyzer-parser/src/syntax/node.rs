//! 语法树.
//!
//! [`SyntaxNode`] 表示一次解析出的语法结构 (如一个参数集 RBSP 或一个
//! profile_tier_level), 按读取顺序保存字段与子结构.
//! [`TreeBuilder`] 以 begin/end 栈的方式构造嵌套结构.

use super::value::FieldValue;

/// 语法树中的字段
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub value: FieldValue,
    /// 对应 [`FieldLog`](super::FieldLog) 中的条目下标
    pub log_index: usize,
}

/// 节点内容: 字段或子结构, 保持读取顺序
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeItem {
    Field(Field),
    Child(SyntaxNode),
}

/// 语法结构节点
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxNode {
    name: String,
    items: Vec<NodeItem>,
    incomplete: bool,
}

impl SyntaxNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            items: Vec::new(),
            incomplete: false,
        }
    }

    /// 结构名称
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 按读取顺序的全部内容
    pub fn items(&self) -> &[NodeItem] {
        &self.items
    }

    /// 本节点直接包含的字段
    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.items.iter().filter_map(|item| match item {
            NodeItem::Field(f) => Some(f),
            NodeItem::Child(_) => None,
        })
    }

    /// 直接子结构
    pub fn children(&self) -> impl Iterator<Item = &SyntaxNode> {
        self.items.iter().filter_map(|item| match item {
            NodeItem::Child(c) => Some(c),
            NodeItem::Field(_) => None,
        })
    }

    /// 按名称查找字段值
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields().find(|f| f.name == name).map(|f| &f.value)
    }

    /// 按名称查找无符号字段值
    pub fn field_u64(&self, name: &str) -> Option<u64> {
        self.field(name).and_then(FieldValue::as_u64)
    }

    /// 按名称查找标志
    pub fn flag(&self, name: &str) -> Option<bool> {
        self.field(name).and_then(FieldValue::as_bool)
    }

    /// 按名称查找第一个子结构
    pub fn child(&self, name: &str) -> Option<&SyntaxNode> {
        self.children().find(|c| c.name == name)
    }

    /// 解析是否在本结构内部中断
    pub fn is_incomplete(&self) -> bool {
        self.incomplete
    }

    /// 整棵子树的字段总数
    pub fn field_count(&self) -> usize {
        self.items
            .iter()
            .map(|item| match item {
                NodeItem::Field(_) => 1,
                NodeItem::Child(c) => c.field_count(),
            })
            .sum()
    }

    /// 先序遍历整棵子树, 回调参数为 (深度, 节点)
    pub fn walk<'s>(&'s self, visit: &mut impl FnMut(usize, &'s SyntaxNode)) {
        self.walk_at(0, visit);
    }

    fn walk_at<'s>(&'s self, depth: usize, visit: &mut impl FnMut(usize, &'s SyntaxNode)) {
        visit(depth, self);
        for child in self.children() {
            child.walk_at(depth + 1, visit);
        }
    }
}

/// 语法树构造器
///
/// `begin` 压入新节点作为当前节点的子节点, `end` 弹回父节点.
/// 没有匹配 `begin` 的 `end` 属于调用约定错误, 直接 panic.
#[derive(Debug)]
pub struct TreeBuilder {
    root: SyntaxNode,
    open: Vec<SyntaxNode>,
}

impl TreeBuilder {
    pub fn new(root_name: impl Into<String>) -> Self {
        Self {
            root: SyntaxNode::new(root_name),
            open: Vec::new(),
        }
    }

    fn current(&mut self) -> &mut SyntaxNode {
        match self.open.last_mut() {
            Some(node) => node,
            None => &mut self.root,
        }
    }

    /// 开始子结构
    pub fn begin(&mut self, name: impl Into<String>) {
        self.open.push(SyntaxNode::new(name));
    }

    /// 结束当前子结构
    pub fn end(&mut self) {
        let Some(node) = self.open.pop() else {
            panic!("TreeBuilder::end 没有匹配的 begin (根节点 {})", self.root.name);
        };
        self.current().items.push(NodeItem::Child(node));
    }

    /// 当前嵌套深度 (根节点为 0)
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    /// 向当前节点追加字段
    pub fn push_field(&mut self, field: Field) {
        self.current().items.push(NodeItem::Field(field));
    }

    /// 完成构造
    ///
    /// `incomplete` 为 true 时关闭所有未结束的结构, 并将中断路径上的节点标记为不完整.
    /// 为 false 时要求 begin/end 已配平.
    pub fn finish(mut self, incomplete: bool) -> SyntaxNode {
        assert!(
            incomplete || self.open.is_empty(),
            "TreeBuilder::finish: 结构 {:?} 未结束",
            self.open.iter().map(|n| n.name.as_str()).collect::<Vec<_>>()
        );
        while let Some(mut node) = self.open.pop() {
            node.incomplete = true;
            self.current().items.push(NodeItem::Child(node));
        }
        self.root.incomplete = incomplete;
        self.root
    }
}
