//! 翻译模块统一错误处理
//!
//! 所有错误都在本地恢复：编排器只记录日志并降级为输出原始页面，
//! 从不把错误暴露给访问者。

use std::fmt;

use thiserror::Error;

/// 翻译错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TranslationError {
    /// 传输错误（连接失败、超时等）
    #[error("传输错误: {0}")]
    Transport(String),

    /// 服务端返回非成功状态或无法解析的响应体
    #[error("翻译服务响应错误: {0}")]
    ProviderResponse(String),

    /// 页面标记无法安全地分段或合并
    #[error("解析错误: {0}")]
    Parse(String),

    /// 剩余执行时间不足
    #[error("执行预算不足: 剩余 {remaining_ms}ms")]
    BudgetExceeded { remaining_ms: u64 },

    /// 等待其他请求完成翻译超时
    #[error("等待锁超时: {0}")]
    LockTimeout(String),

    /// 缓存或锁存储错误
    #[error("存储错误: {0}")]
    Storage(String),

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(String),

    /// 序列化错误
    #[error("序列化错误: {0}")]
    Serialization(String),
}

impl TranslationError {
    /// 检查错误是否可重试
    pub fn is_retryable(&self) -> bool {
        match self {
            TranslationError::Transport(_) => true,
            TranslationError::ProviderResponse(_) => true,
            TranslationError::LockTimeout(_) => true,
            TranslationError::Storage(_) => true,
            TranslationError::Parse(_) => false,
            TranslationError::BudgetExceeded { .. } => false,
            TranslationError::Config(_) => false,
            TranslationError::Serialization(_) => false,
        }
    }

    /// 获取错误的严重程度
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            TranslationError::Transport(_) => ErrorSeverity::Warning,
            TranslationError::ProviderResponse(_) => ErrorSeverity::Warning,
            TranslationError::Parse(_) => ErrorSeverity::Error,
            TranslationError::BudgetExceeded { .. } => ErrorSeverity::Warning,
            TranslationError::LockTimeout(_) => ErrorSeverity::Info,
            TranslationError::Storage(_) => ErrorSeverity::Warning,
            TranslationError::Config(_) => ErrorSeverity::Critical,
            TranslationError::Serialization(_) => ErrorSeverity::Error,
        }
    }

    /// 获取错误类别
    pub fn category(&self) -> ErrorCategory {
        match self {
            TranslationError::Transport(_) => ErrorCategory::Network,
            TranslationError::ProviderResponse(_) => ErrorCategory::Service,
            TranslationError::Parse(_) => ErrorCategory::Parsing,
            TranslationError::BudgetExceeded { .. } => ErrorCategory::Timeout,
            TranslationError::LockTimeout(_) => ErrorCategory::Concurrency,
            TranslationError::Storage(_) => ErrorCategory::Storage,
            TranslationError::Config(_) => ErrorCategory::Configuration,
            TranslationError::Serialization(_) => ErrorCategory::Serialization,
        }
    }

    /// 创建带上下文的错误
    pub fn with_context<T: fmt::Display>(self, context: T) -> Self {
        let wrap = |msg: String| format!("{} (上下文: {})", msg, context);

        match self {
            TranslationError::Transport(msg) => TranslationError::Transport(wrap(msg)),
            TranslationError::ProviderResponse(msg) => {
                TranslationError::ProviderResponse(wrap(msg))
            }
            TranslationError::Parse(msg) => TranslationError::Parse(wrap(msg)),
            TranslationError::LockTimeout(msg) => TranslationError::LockTimeout(wrap(msg)),
            TranslationError::Storage(msg) => TranslationError::Storage(wrap(msg)),
            TranslationError::Config(msg) => TranslationError::Config(wrap(msg)),
            TranslationError::Serialization(msg) => TranslationError::Serialization(wrap(msg)),
            budget @ TranslationError::BudgetExceeded { .. } => budget,
        }
    }
}

/// 错误严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Configuration,
    Network,
    Service,
    Parsing,
    Timeout,
    Concurrency,
    Storage,
    Serialization,
}

impl From<std::io::Error> for TranslationError {
    fn from(error: std::io::Error) -> Self {
        TranslationError::Storage(format!("IO错误: {}", error))
    }
}

impl From<serde_json::Error> for TranslationError {
    fn from(error: serde_json::Error) -> Self {
        TranslationError::Serialization(format!("JSON序列化错误: {}", error))
    }
}

impl From<toml::de::Error> for TranslationError {
    fn from(error: toml::de::Error) -> Self {
        TranslationError::Config(format!("TOML解析错误: {}", error))
    }
}

impl From<reqwest::Error> for TranslationError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            TranslationError::Transport(format!("请求超时: {}", error))
        } else if error.is_decode() {
            TranslationError::ProviderResponse(format!("响应解码失败: {}", error))
        } else {
            TranslationError::Transport(error.to_string())
        }
    }
}

/// 错误结果类型别名
pub type TranslationResult<T> = Result<T, TranslationError>;

/// 错误处理助手函数
pub mod helpers {
    use super::*;

    /// 按严重程度记录错误，不中断调用方
    pub fn log_error(error: &TranslationError) {
        match error.severity() {
            ErrorSeverity::Info => tracing::info!("翻译信息: {}", error),
            ErrorSeverity::Warning => tracing::warn!("翻译警告: {}", error),
            ErrorSeverity::Error => tracing::error!("翻译错误: {}", error),
            ErrorSeverity::Critical => tracing::error!("翻译严重错误: {}", error),
        }
    }

    /// 创建存储错误
    pub fn storage_error<T: fmt::Display>(msg: T) -> TranslationError {
        TranslationError::Storage(msg.to_string())
    }

    /// 创建配置错误
    pub fn config_error<T: fmt::Display>(msg: T) -> TranslationError {
        TranslationError::Config(msg.to_string())
    }

    /// 创建解析错误
    pub fn parse_error<T: fmt::Display>(msg: T) -> TranslationError {
        TranslationError::Parse(msg.to_string())
    }
}
