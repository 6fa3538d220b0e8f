use html5ever::serialize::{serialize, SerializeOpts, TraversalScope};
use markup5ever_rcdom::{Handle, RcDom, SerializableHandle};

use crate::translation::error::{TranslationError, TranslationResult};

fn serialize_handle(handle: &Handle, traversal_scope: TraversalScope) -> TranslationResult<String> {
    let mut buf: Vec<u8> = Vec::new();
    let serializable: SerializableHandle = handle.clone().into();
    let opts = SerializeOpts {
        traversal_scope,
        ..Default::default()
    };

    serialize(&mut buf, &serializable, opts)
        .map_err(|e| TranslationError::Parse(format!("无法序列化DOM: {}", e)))?;

    String::from_utf8(buf).map_err(|e| TranslationError::Parse(format!("序列化结果不是UTF-8: {}", e)))
}

/// 序列化整个文档
pub fn serialize_document(dom: &RcDom) -> TranslationResult<String> {
    serialize_handle(&dom.document, TraversalScope::ChildrenOnly(None))
}

/// 序列化单个元素（含元素自身）
pub fn serialize_element(node: &Handle) -> TranslationResult<String> {
    serialize_handle(node, TraversalScope::IncludeNode)
}
