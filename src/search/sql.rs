//! Parameterized SQL boolean expression / 参数化 SQL 布尔表达式
//!
//! A [`BooleanExpr`] is an ordered list of trusted literal fragments and bound
//! parameters. Literals are fixed SQL syntax owned by this crate; user text
//! only ever travels as a parameter.

use serde::ser::{Serialize, SerializeStruct, Serializer};
use sqlx::{QueryBuilder, Sqlite};
use std::fmt;

/// Bound parameter value / 绑定参数值
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(untagged)]
pub enum SqlValue {
    Text(String),
    Integer(i64),
    Null,
}

impl fmt::Display for SqlValue {
    /// SQL literal form, for logs and debugging only
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Text(text) => write!(f, "'{}'", text.replace('\'', "''")),
            SqlValue::Integer(value) => write!(f, "{}", value),
            SqlValue::Null => f.write_str("NULL"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    /// Trusted literal SQL / 可信的 SQL 字面量
    Sql(&'static str),
    /// User-supplied value / 用户提供的值
    Param(SqlValue),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BooleanExpr {
    fragments: Vec<Fragment>,
}

impl BooleanExpr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_sql(&mut self, sql: &'static str) -> &mut Self {
        self.fragments.push(Fragment::Sql(sql));
        self
    }

    pub fn push_param(&mut self, value: SqlValue) -> &mut Self {
        self.fragments.push(Fragment::Param(value));
        self
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// SQL text with `?` placeholders / 带占位符的 SQL
    pub fn sql(&self) -> String {
        self.fragments
            .iter()
            .map(|fragment| match fragment {
                Fragment::Sql(sql) => *sql,
                Fragment::Param(_) => "?",
            })
            .collect()
    }

    /// Parameters in placeholder order / 按占位符顺序排列的参数
    pub fn params(&self) -> Vec<&SqlValue> {
        self.fragments
            .iter()
            .filter_map(|fragment| match fragment {
                Fragment::Param(value) => Some(value),
                Fragment::Sql(_) => None,
            })
            .collect()
    }

    pub fn param_count(&self) -> usize {
        self.params().len()
    }

    /// SQL with parameters inlined as literals. Never execute this.
    pub fn to_debug_sql(&self) -> String {
        let mut out = String::new();
        for fragment in &self.fragments {
            match fragment {
                Fragment::Sql(sql) => out.push_str(sql),
                Fragment::Param(value) => out.push_str(&value.to_string()),
            }
        }
        out
    }

    /// Append to a query under construction, binding every parameter / 追加到查询构建器
    pub fn push_to<'args>(&self, builder: &mut QueryBuilder<'args, Sqlite>) {
        for fragment in &self.fragments {
            match fragment {
                Fragment::Sql(sql) => {
                    builder.push(sql);
                }
                Fragment::Param(SqlValue::Text(text)) => {
                    builder.push_bind(text.clone());
                }
                Fragment::Param(SqlValue::Integer(value)) => {
                    builder.push_bind(*value);
                }
                Fragment::Param(SqlValue::Null) => {
                    builder.push_bind(Option::<i64>::None);
                }
            }
        }
    }
}

impl Serialize for BooleanExpr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("BooleanExpr", 2)?;
        state.serialize_field("sql", &self.sql())?;
        state.serialize_field("params", &self.params())?;
        state.end()
    }
}
