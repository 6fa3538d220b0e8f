//! # 解析器模块
//!
//! - `html` - HTML文档解析、DOM操作、序列化
//! - `link_rewriter` - 站内链接本地化与修复

pub mod html;
pub mod link_rewriter;

// Re-export commonly used items for convenience
pub use html::{decode_markup, html_to_dom, serialize_document, PreparedDocument};
pub use link_rewriter::{localize_links, repair_links, LinkContext};
