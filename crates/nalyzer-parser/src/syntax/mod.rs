//! 语法元素模型: 取值、字段日志、语法树与带日志的读取器.

pub mod log;
pub mod node;
pub mod reader;
pub mod value;

pub use self::log::{FieldEntry, FieldLog};
pub use node::{Field, NodeItem, SyntaxNode, TreeBuilder};
pub use reader::{Meaning, Opts, ParseFailure, ParseOutput, SyntaxReader};
pub use value::{Descriptor, FieldValue};
