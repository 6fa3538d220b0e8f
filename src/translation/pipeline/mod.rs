//! 翻译管道模块
//!
//! 分段、过滤、批次调用与合并

pub mod batch;
pub mod classify;
pub mod filters;
pub mod merge;
pub mod segmenter;

// 重新导出主要类型
pub use batch::{build_instruction, build_payload, parse_translation_map, BatchRequest, BatchTranslator};
pub use classify::{classify, ClassifyRules, ElementClass, ElementInfo};
pub use filters::SegmentFilter;
pub use merge::{cleanup_duplicate_words, merge, TranslationMap};
pub use segmenter::{Plan, Segment, SegmentKind, Segmenter};
