//! HTML解析和处理模块
//!
//! - `dom`: 基础DOM操作与字符集归一
//! - `document`: 保留块与文档类型的往返封装
//! - `serializer`: 序列化功能

pub mod document;
pub mod dom;
pub mod serializer;

// 重新导出主要的公共 API
pub use document::{edit_document, PreparedDocument, PreservedBlocks};
pub use dom::{
    decode_markup, find_element_by_id, find_nodes, get_child_node_by_name, get_node_attr,
    get_node_name, get_parent_node, html_to_dom, set_node_attr,
};
pub use serializer::{serialize_document, serialize_element};
