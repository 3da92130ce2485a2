//! Search query compiler - query text to SQL predicate / 搜索查询编译器
//!
//! Pipeline: tokenizer -> builder -> normalizer -> code generator. Each call
//! owns its trees, nothing is shared between calls, so one [`Compiler`] can be
//! used from any number of threads.

use super::builder;
use super::codegen::{self, CompileResult};
use super::error::CompileError;
use super::normalize;
use super::syntax::SyntaxNode;
use super::tokenizer;
use crate::config::ParserConfig;

#[derive(Debug, Clone, Default)]
pub struct Compiler {
    config: ParserConfig,
}

impl Compiler {
    pub fn new(config: ParserConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Concrete syntax tree only (primitive operation) / 仅解析语法树
    pub fn parse(&self, input: &str) -> SyntaxNode {
        tokenizer::parse_query(input, &self.config)
    }

    /// Compile a query into a predicate / 编译查询为 SQL 谓词
    pub fn compile(&self, input: &str) -> Result<CompileResult, CompileError> {
        let tree = self.parse(input);
        tracing::trace!("Search syntax tree: {}", tree.sexpr());

        let mut root = builder::build(&tree);
        normalize::normalize(&mut root);
        let result = codegen::generate(&root)?;

        match &result.sql {
            Some(sql) => tracing::debug!(
                "Compiled search {:?} -> {} ({} params)",
                input,
                sql.sql(),
                sql.param_count()
            ),
            None => tracing::debug!("Search {:?} has no terms, no filtering", input),
        }
        Ok(result)
    }
}

/// Compile with the default parser settings / 使用默认配置编译
pub fn compile(input: &str) -> Result<CompileResult, CompileError> {
    Compiler::default().compile(input)
}
