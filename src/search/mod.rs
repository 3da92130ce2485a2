//! Search module - compiles card search queries into SQL predicates / 搜索模块
//!
//! Architecture principles / 架构原则：
//! - Only exposes primitive operations: parse, compile
//! - The storage layer owns the card-listing query, joins and pagination
//! - Call direction: storage → search (unidirectional) / 调用方向
//!
//! Pipeline / 流程：
//! - `tokenizer`: raw text → concrete syntax tree (never fails)
//! - `builder`: syntax tree → term tree, resolving negation, labels, wildcards
//! - `normalize`: pushes NOT down to the leaves (De Morgan)
//! - `codegen`: term tree → parameterized predicate + join flags + highlights

pub mod ast;
pub mod builder;
pub mod codegen;
pub mod engine;
pub mod error;
pub mod label;
pub mod normalize;
pub mod regexp;
pub mod sql;
pub mod syntax;
pub mod tokenizer;

pub use codegen::{CompileResult, JoinFlags};
pub use engine::{compile, Compiler};
pub use error::CompileError;
pub use label::Label;
pub use sql::{BooleanExpr, Fragment, SqlValue};
