//! Compile errors / 编译错误
//!
//! Malformed syntax is never an error; these only cover term/label
//! combinations that have no SQL translation.

use thiserror::Error;

use super::label::Label;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// Regex under an equality-only label / 仅支持精确匹配的标签不能使用正则
    #[error("regular expressions cannot be used with `{label}:`, it only supports exact values")]
    RegexUnsupported { label: Label },

    #[error("unknown card kind `{0}`, expected one of: new, learn, review, relearn, cram")]
    UnknownKind(String),

    /// Recognized label without a SQL translation / 已识别但尚不支持的标签
    #[error("searching by `{0}:` is not supported yet")]
    UnsupportedLabel(Label),
}
