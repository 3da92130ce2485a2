//! SQL code generator - normalized term tree to a WHERE-clause predicate / SQL 生成
//!
//! The predicate assumes the card-listing query exposes these names:
//! - full-text tables `noteFtsFv(rowid, value)`, `templateNameFts(rowid, name)`,
//!   `cardSettingNameFts(rowid, name)`, `cardFtsTag(rowid, tags)`, `noteFtsTag(rowid, tags)`
//! - columns `note.templateId`, `card.cardSettingId`, `latestReview.kind`
//! - the scalar function `regexp_with_flags(pattern, flags, text)`
//!
//! [`JoinFlags`] tells the caller which of the joined tables are referenced.

use serde::Serialize;
use std::collections::VecDeque;

use super::ast::{Expr, Group, Term, TermKind};
use super::error::CompileError;
use super::label::Label;
use super::sql::{BooleanExpr, SqlValue};

/// Tables the predicate references / 谓词引用到的表
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinFlags {
    pub fts: bool,
    pub tags: bool,
    pub template_fts: bool,
    pub setting_fts: bool,
    pub latest_review: bool,
}

/// Output of one compilation / 编译结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileResult {
    /// `None` means "no filtering", not a false predicate
    pub sql: Option<BooleanExpr>,
    pub joins: JoinFlags,
    /// Free-text, non-negated values for result highlighting / 用于高亮的正向关键词
    pub positive_strings: Vec<String>,
}

/// Generate the predicate for a normalized tree / 生成 SQL 谓词
pub fn generate(root: &Group) -> Result<CompileResult, CompileError> {
    let positive_strings = positive_strings(root);
    if root.body.is_none() {
        return Ok(CompileResult {
            positive_strings,
            ..CompileResult::default()
        });
    }

    let mut writer = SqlWriter::default();
    writer.group(root)?;
    Ok(CompileResult {
        sql: Some(writer.out),
        joins: writer.joins,
        positive_strings,
    })
}

const NOTE_FTS_IN: &str = "IN (SELECT rowid FROM noteFtsFv WHERE noteFtsFv.value MATCH ";
const CARD_TAG_IN: &str = "IN (SELECT rowid FROM cardFtsTag WHERE cardFtsTag.tags MATCH ";
const NOTE_TAG_IN: &str = "IN (SELECT rowid FROM noteFtsTag WHERE noteFtsTag.tags MATCH ";
const TEMPLATE_NAME_IN: &str = "IN (SELECT rowid FROM templateNameFts WHERE templateNameFts.name MATCH ";
const SETTING_NAME_IN: &str =
    "IN (SELECT rowid FROM cardSettingNameFts WHERE cardSettingNameFts.name MATCH ";

#[derive(Debug, Default)]
struct SqlWriter {
    out: BooleanExpr,
    joins: JoinFlags,
}

impl SqlWriter {
    fn group(&mut self, group: &Group) -> Result<(), CompileError> {
        let Some(body) = &group.body else {
            return Ok(());
        };
        // 子节点本身是分组时，由它自己加括号
        let parens = !group.is_root && !matches!(body, Expr::Group(_));
        if parens {
            self.out.push_sql("(");
        }
        self.expr(body)?;
        if parens {
            self.out.push_sql(")");
        }
        Ok(())
    }

    fn expr(&mut self, expr: &Expr) -> Result<(), CompileError> {
        match expr {
            Expr::Term(term) => self.term(term),
            Expr::Group(group) => self.group(group),
            Expr::And(children) => {
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        self.out.push_sql(" AND ");
                    }
                    // OR binds looser than AND
                    if matches!(child, Expr::Or(_)) {
                        self.out.push_sql("(");
                        self.expr(child)?;
                        self.out.push_sql(")");
                    } else {
                        self.expr(child)?;
                    }
                }
                Ok(())
            }
            Expr::Or(children) => {
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        self.out.push_sql(" OR ");
                    }
                    self.expr(child)?;
                }
                Ok(())
            }
        }
    }

    fn term(&mut self, term: &Term) -> Result<(), CompileError> {
        match term.label {
            None => {
                self.joins.fts = true;
                self.match_or_regex(term, "noteFtsFv.rowid ", NOTE_FTS_IN, ", noteFtsFv.value)");
                Ok(())
            }
            Some(label) => self.labelled(label, term),
        }
    }

    fn labelled(&mut self, label: Label, term: &Term) -> Result<(), CompileError> {
        match label {
            Label::Tag => {
                self.joins.tags = true;
                self.tag(term);
            }
            Label::Template => {
                self.joins.template_fts = true;
                self.match_or_regex(
                    term,
                    "note.templateId ",
                    TEMPLATE_NAME_IN,
                    ", templateNameFts.name)",
                );
            }
            Label::Setting => {
                self.joins.setting_fts = true;
                self.match_or_regex(
                    term,
                    "card.cardSettingId ",
                    SETTING_NAME_IN,
                    ", cardSettingNameFts.name)",
                );
            }
            Label::TemplateId => self.equality(label, term, "note.templateId")?,
            Label::SettingId => self.equality(label, term, "card.cardSettingId")?,
            Label::Kind => {
                let Some(value) = term.text() else {
                    return Err(CompileError::RegexUnsupported { label });
                };
                let kind = review_kind(value)?;
                self.joins.latest_review = true;
                self.out.push_sql("latestReview.kind IS ");
                if term.negate {
                    self.out.push_sql("NOT ");
                }
                self.out.push_param(kind);
            }
            unsupported => return Err(CompileError::UnsupportedLabel(unsupported)),
        }
        Ok(())
    }

    /// `column [NOT ]IN (... MATCH ?)` for strings, `[NOT ]regexp_with_flags(?, ?, col)` for regexes
    fn match_or_regex(
        &mut self,
        term: &Term,
        column: &'static str,
        fts_in: &'static str,
        regex_target: &'static str,
    ) {
        match &term.kind {
            TermKind::SimpleString { value, wildcard } | TermKind::QuotedString { value, wildcard } => {
                self.out.push_sql(column);
                if term.negate {
                    self.out.push_sql("NOT ");
                }
                self.out
                    .push_sql(fts_in)
                    .push_param(SqlValue::Text(match_pattern(value, *wildcard)))
                    .push_sql(")");
            }
            TermKind::Regex { pattern, flags } => self.regex(term.negate, pattern, flags, regex_target),
        }
    }

    fn regex(&mut self, negate: bool, pattern: &str, flags: &str, target: &'static str) {
        if negate {
            self.out.push_sql("NOT ");
        }
        self.out
            .push_sql("regexp_with_flags(")
            .push_param(SqlValue::Text(pattern.to_string()))
            .push_sql(", ")
            .push_param(SqlValue::Text(flags.to_string()))
            .push_sql(target);
    }

    /// Tags live on the card or on the note: OR of both when positive,
    /// AND of both negations when negative
    fn tag(&mut self, term: &Term) {
        let joiner = if term.negate { " AND " } else { " OR " };
        self.out.push_sql("(");
        match &term.kind {
            TermKind::SimpleString { value, wildcard } | TermKind::QuotedString { value, wildcard } => {
                let pattern = match_pattern(value, *wildcard);
                for (i, (column, fts_in)) in [("cardFtsTag.rowid ", CARD_TAG_IN), ("noteFtsTag.rowid ", NOTE_TAG_IN)]
                    .into_iter()
                    .enumerate()
                {
                    if i > 0 {
                        self.out.push_sql(joiner);
                    }
                    self.out.push_sql(column);
                    if term.negate {
                        self.out.push_sql("NOT ");
                    }
                    self.out
                        .push_sql(fts_in)
                        .push_param(SqlValue::Text(pattern.clone()))
                        .push_sql(")");
                }
            }
            TermKind::Regex { pattern, flags } => {
                self.regex(term.negate, pattern, flags, ", cardFtsTag.tags)");
                self.out.push_sql(joiner);
                self.regex(term.negate, pattern, flags, ", noteFtsTag.tags)");
            }
        }
        self.out.push_sql(")");
    }

    /// `column = ?` / `column != ?`
    fn equality(&mut self, label: Label, term: &Term, column: &'static str) -> Result<(), CompileError> {
        let Some(value) = term.text() else {
            return Err(CompileError::RegexUnsupported { label });
        };
        self.out
            .push_sql(column)
            .push_sql(if term.negate { " != " } else { " = " })
            .push_param(SqlValue::Text(value.to_string()));
        Ok(())
    }
}

/// FTS MATCH string: double-quoted, embedded quotes doubled, optional prefix marker
pub fn match_pattern(value: &str, wildcard: bool) -> String {
    let mut pattern = format!("\"{}\"", value.replace('"', "\"\""));
    if wildcard {
        pattern.push('*');
    }
    pattern
}

/// `kind:` value to the stored review kind; new cards have no review yet
fn review_kind(value: &str) -> Result<SqlValue, CompileError> {
    match value.to_lowercase().as_str() {
        "new" => Ok(SqlValue::Null),
        "learn" => Ok(SqlValue::Integer(0)),
        "review" => Ok(SqlValue::Integer(1)),
        "relearn" => Ok(SqlValue::Integer(2)),
        "cram" => Ok(SqlValue::Integer(3)),
        _ => Err(CompileError::UnknownKind(value.to_string())),
    }
}

/// Breadth-first over groups: every un-negated, unlabelled string value
fn positive_strings(root: &Group) -> Vec<String> {
    let mut found = Vec::new();
    let mut queue: VecDeque<&Group> = VecDeque::from([root]);
    while let Some(group) = queue.pop_front() {
        if let Some(body) = &group.body {
            collect_level(body, &mut found, &mut queue);
        }
    }
    found
}

fn collect_level<'a>(expr: &'a Expr, found: &mut Vec<String>, queue: &mut VecDeque<&'a Group>) {
    match expr {
        Expr::Term(term) => {
            if !term.negate && term.label.is_none() {
                if let Some(value) = term.text() {
                    found.push(value.to_string());
                }
            }
        }
        Expr::Group(group) => queue.push_back(group),
        Expr::And(children) | Expr::Or(children) => {
            for child in children {
                collect_level(child, found, queue);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root(body: Expr) -> Group {
        Group::root(Some(body))
    }

    fn leaf(term: Term) -> Expr {
        Expr::Term(term)
    }

    #[test]
    fn test_empty_tree() {
        let result = generate(&Group::root(None)).unwrap();
        assert_eq!(result.sql, None);
        assert_eq!(result.joins, JoinFlags::default());
        assert!(result.positive_strings.is_empty());
    }

    #[test]
    fn test_free_text() {
        let result = generate(&root(leaf(Term::simple("foo")))).unwrap();
        let sql = result.sql.unwrap();
        assert_eq!(
            sql.sql(),
            "noteFtsFv.rowid IN (SELECT rowid FROM noteFtsFv WHERE noteFtsFv.value MATCH ?)"
        );
        assert_eq!(sql.params(), vec![&SqlValue::Text("\"foo\"".into())]);
        assert!(result.joins.fts);
        assert_eq!(result.positive_strings, vec!["foo"]);
    }

    #[test]
    fn test_negated_free_text() {
        let result = generate(&root(leaf(Term::quoted("a b").negated()))).unwrap();
        assert_eq!(
            result.sql.unwrap().sql(),
            "noteFtsFv.rowid NOT IN (SELECT rowid FROM noteFtsFv WHERE noteFtsFv.value MATCH ?)"
        );
        assert!(result.positive_strings.is_empty());
    }

    #[test]
    fn test_free_regex() {
        let result = generate(&root(leaf(Term::regex("^a", "i").negated()))).unwrap();
        let sql = result.sql.unwrap();
        assert_eq!(sql.sql(), "NOT regexp_with_flags(?, ?, noteFtsFv.value)");
        assert_eq!(
            sql.params(),
            vec![&SqlValue::Text("^a".into()), &SqlValue::Text("i".into())]
        );
        assert!(result.joins.fts);
    }

    #[test]
    fn test_match_pattern() {
        assert_eq!(match_pattern(r#"say "hi""#, false), r#""say ""hi""""#);
        assert_eq!(match_pattern("pre", true), "\"pre\"*");
    }

    #[test]
    fn test_tag_positive_and_negative() {
        let positive = generate(&root(leaf(Term::simple("x").labelled(Label::Tag)))).unwrap();
        assert_eq!(
            positive.sql.as_ref().unwrap().sql(),
            "(cardFtsTag.rowid IN (SELECT rowid FROM cardFtsTag WHERE cardFtsTag.tags MATCH ?) \
             OR noteFtsTag.rowid IN (SELECT rowid FROM noteFtsTag WHERE noteFtsTag.tags MATCH ?))"
        );
        assert_eq!(positive.sql.unwrap().param_count(), 2);
        assert!(positive.joins.tags);
        assert!(!positive.joins.fts);
        assert!(positive.positive_strings.is_empty());

        let negative =
            generate(&root(leaf(Term::simple("x").labelled(Label::Tag).negated()))).unwrap();
        assert_eq!(
            negative.sql.unwrap().sql(),
            "(cardFtsTag.rowid NOT IN (SELECT rowid FROM cardFtsTag WHERE cardFtsTag.tags MATCH ?) \
             AND noteFtsTag.rowid NOT IN (SELECT rowid FROM noteFtsTag WHERE noteFtsTag.tags MATCH ?))"
        );
    }

    #[test]
    fn test_tag_regex() {
        let result = generate(&root(leaf(Term::regex("a+", "").labelled(Label::Tag)))).unwrap();
        let sql = result.sql.unwrap();
        assert_eq!(
            sql.sql(),
            "(regexp_with_flags(?, ?, cardFtsTag.tags) OR regexp_with_flags(?, ?, noteFtsTag.tags))"
        );
        assert_eq!(sql.param_count(), 4);
    }

    #[test]
    fn test_template_and_setting() {
        let template = generate(&root(leaf(Term::simple("Basic").labelled(Label::Template)))).unwrap();
        assert_eq!(
            template.sql.unwrap().sql(),
            "note.templateId IN (SELECT rowid FROM templateNameFts WHERE templateNameFts.name MATCH ?)"
        );
        assert!(template.joins.template_fts);

        let setting = generate(&root(leaf(
            Term::regex("^def", "i").labelled(Label::Setting).negated(),
        )))
        .unwrap();
        assert_eq!(
            setting.sql.unwrap().sql(),
            "NOT regexp_with_flags(?, ?, cardSettingNameFts.name)"
        );
        assert!(setting.joins.setting_fts);
    }

    #[test]
    fn test_equality_labels() {
        let result = generate(&root(Expr::Or(vec![
            leaf(Term::simple("t1").labelled(Label::TemplateId)),
            leaf(Term::simple("s1").labelled(Label::SettingId).negated()),
        ])))
        .unwrap();
        let sql = result.sql.unwrap();
        assert_eq!(sql.sql(), "note.templateId = ? OR card.cardSettingId != ?");
        assert_eq!(sql.param_count(), 2);
        assert_eq!(result.joins, JoinFlags::default());
    }

    #[test]
    fn test_regex_rejected_on_exact_labels() {
        for label in [Label::TemplateId, Label::SettingId, Label::Kind] {
            assert_eq!(
                generate(&root(leaf(Term::regex("x", "").labelled(label)))),
                Err(CompileError::RegexUnsupported { label })
            );
        }
    }

    #[test]
    fn test_kind_values() {
        let result = generate(&root(Expr::And(vec![
            leaf(Term::simple("new").labelled(Label::Kind)),
            leaf(Term::simple("Cram").labelled(Label::Kind).negated()),
        ])))
        .unwrap();
        let sql = result.sql.unwrap();
        assert_eq!(
            sql.to_debug_sql(),
            "latestReview.kind IS NULL AND latestReview.kind IS NOT 3"
        );
        assert!(result.joins.latest_review);

        assert_eq!(
            generate(&root(leaf(Term::simple("old").labelled(Label::Kind)))),
            Err(CompileError::UnknownKind("old".into()))
        );
    }

    #[test]
    fn test_unsupported_label() {
        assert_eq!(
            generate(&root(leaf(Term::simple("1").labelled(Label::Due)))),
            Err(CompileError::UnsupportedLabel(Label::Due))
        );
    }

    #[test]
    fn test_parenthesization() {
        let a = || leaf(Term::simple("a"));
        let group = |body| Expr::Group(Box::new(Group::nested(false, None, Some(body))));
        let tree = root(Expr::And(vec![
            a(),
            Expr::Or(vec![a(), a()]),
            group(group(a())),
        ]));
        let sql = generate(&tree).unwrap().sql.unwrap().sql();
        let p = "noteFtsFv.rowid IN (SELECT rowid FROM noteFtsFv WHERE noteFtsFv.value MATCH ?)";
        assert_eq!(sql, format!("{p} AND ({p} OR {p}) AND ({p})"));
    }

    #[test]
    fn test_positive_strings_breadth_first() {
        let nested = Expr::Group(Box::new(Group::nested(
            false,
            None,
            Some(Expr::And(vec![leaf(Term::simple("deep")), leaf(Term::simple("no").negated())])),
        )));
        let tree = root(Expr::And(vec![
            nested,
            leaf(Term::quoted("top")),
            leaf(Term::simple("t").labelled(Label::Tag)),
        ]));
        assert_eq!(generate(&tree).unwrap().positive_strings, vec!["top", "deep"]);
    }
}
