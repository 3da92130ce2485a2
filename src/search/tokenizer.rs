//! Query tokenizer - tolerant reader producing the concrete syntax tree / 查询分词器
//!
//! Never fails: anything it cannot make sense of (stray `)`, unterminated
//! quotes or regexes, a lone `*`) becomes an `Error` node and reading resumes
//! right after it.
//!
//! Supported syntax / 支持的语法：
//! - `foo`, `"exact phrase"`, `'single'`, `"""raw "text" here"""`
//! - `foo*`, `"phrase"*` (prefix wildcard)
//! - `/pattern/flags`
//! - `-term`, `- term`, `a OR b`, `(a b)`
//! - `tag:a,b`, `-tag:a`, `tag:-(a b)`, `kind:(-new,review -relearn)`

use super::label::Label;
use super::syntax::{SyntaxKind, SyntaxNode};
use crate::config::ParserConfig;

/// Where an item is being read / 当前读取的上下文
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Context {
    Free,
    /// Inside `label:( ... )`, where `,` joins alternatives
    LabelBody,
}

/// Parse a raw query into a `Program` node / 将原始查询解析为语法树
pub fn parse_query(input: &str, config: &ParserConfig) -> SyntaxNode {
    let mut chars: Vec<char> = input.chars().collect();
    if chars.len() > config.max_input_chars {
        tracing::warn!(
            "Search query truncated from {} to {} characters",
            chars.len(),
            config.max_input_chars
        );
        chars.truncate(config.max_input_chars);
    }

    let mut reader = Reader {
        chars,
        pos: 0,
        case_insensitive_labels: config.case_insensitive_labels,
    };
    reader.program()
}

struct Reader {
    chars: Vec<char>,
    pos: usize,
    case_insensitive_labels: bool,
}

impl Reader {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().map_or(false, char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn text(&self, start: usize, end: usize) -> String {
        self.chars[start..end].iter().collect()
    }

    /// Consume `len` characters as a token
    fn take(&mut self, kind: SyntaxKind, len: usize) -> SyntaxNode {
        let start = self.pos;
        self.pos += len;
        SyntaxNode::token(kind, self.text(start, self.pos))
    }

    fn program(&mut self) -> SyntaxNode {
        let mut children = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                None => break,
                // 多余的右括号
                Some(')') => children.push(self.take(SyntaxKind::Error, 1)),
                Some(_) => self.item(&mut children, Context::Free),
            }
        }
        SyntaxNode::branch(SyntaxKind::Program, children)
    }

    /// Read one item, pushing one or more nodes onto `out`
    fn item(&mut self, out: &mut Vec<SyntaxNode>, ctx: Context) {
        let Some(c) = self.peek() else { return };

        if c == '(' {
            let group = self.group(ctx);
            out.push(group);
            return;
        }

        if self.at_or_keyword() {
            out.push(self.take(SyntaxKind::Or, 2));
            return;
        }

        // 标签括号内孤立的逗号
        if ctx == Context::LabelBody && c == ',' {
            out.push(self.take(SyntaxKind::Error, 1));
            return;
        }

        if c == '-' {
            // `-tag:foo` keeps the negation inside the label construct
            if let Some((label, len)) = self.label_ahead(1) {
                let not = self.take(SyntaxKind::Not, 1);
                let node = self.label(vec![not], label, len);
                out.push(node);
                return;
            }
            // `-a,b` and `- a,b` both negate only `a`
            if ctx == Context::LabelBody && self.value_after_nots() {
                self.value_list(out, true);
                return;
            }
            out.push(self.take(SyntaxKind::Not, 1));
            return;
        }

        if let Some((label, len)) = self.label_ahead(0) {
            let node = self.label(Vec::new(), label, len);
            out.push(node);
            return;
        }

        match ctx {
            Context::Free => self.atom(out, false),
            Context::LabelBody => self.value_list(out, true),
        }
    }

    /// `OR` as a standalone word
    fn at_or_keyword(&self) -> bool {
        self.or_keyword_at(0)
    }

    fn or_keyword_at(&self, offset: usize) -> bool {
        self.peek_at(offset) == Some('O')
            && self.peek_at(offset + 1) == Some('R')
            && self
                .peek_at(offset + 2)
                .map_or(true, |c| c.is_whitespace() || c == '(' || c == ')')
    }

    /// Offset of the first character after a run of `-` and whitespace
    fn past_nots(&self) -> usize {
        let mut offset = 0;
        while self.peek_at(offset).map_or(false, |c| c == '-' || c.is_whitespace()) {
            offset += 1;
        }
        offset
    }

    /// Whether the `-` run at the cursor is followed by a plain value
    fn value_after_nots(&self) -> bool {
        let offset = self.past_nots();
        match self.peek_at(offset) {
            None | Some('(') | Some(')') | Some(',') => false,
            Some(_) => self.label_ahead(offset).is_none() && !self.or_keyword_at(offset),
        }
    }

    /// `-` tokens, each optionally followed by whitespace
    fn nots(&mut self, out: &mut Vec<SyntaxNode>) {
        while self.peek() == Some('-') {
            out.push(self.take(SyntaxKind::Not, 1));
            self.skip_whitespace();
        }
    }

    /// Detect `name:` at `pos + offset`, returning the label and the name length
    fn label_ahead(&self, offset: usize) -> Option<(Label, usize)> {
        let start = self.pos + offset;
        let mut end = start;
        while self.chars.get(end).map_or(false, |c| c.is_ascii_alphabetic()) {
            end += 1;
        }
        if end == start || self.chars.get(end) != Some(&':') {
            return None;
        }
        let name = self.text(start, end);
        Label::parse(&name, self.case_insensitive_labels).map(|label| (label, end - start))
    }

    fn group(&mut self, ctx: Context) -> SyntaxNode {
        let mut children = vec![self.take(SyntaxKind::OpenParen, 1)];
        self.scope_body(&mut children, ctx);
        SyntaxNode::branch(SyntaxKind::Group, children)
    }

    /// Items up to and including the closing paren; an unterminated scope ends at EOF
    fn scope_body(&mut self, children: &mut Vec<SyntaxNode>, ctx: Context) {
        loop {
            self.skip_whitespace();
            match self.peek() {
                None => break,
                Some(')') => {
                    children.push(self.take(SyntaxKind::CloseParen, 1));
                    break;
                }
                Some(_) => self.item(children, ctx),
            }
        }
    }

    fn label(&mut self, mut children: Vec<SyntaxNode>, label: Label, len: usize) -> SyntaxNode {
        children.push(self.take(SyntaxKind::LabelName(label), len));
        children.push(self.take(SyntaxKind::Colon, 1));

        // `tag:(a b)`, or `tag:-(a b)` negating the whole body
        let opens_body = match self.peek() {
            Some('(') => true,
            Some('-') => self.peek_at(self.past_nots()) == Some('('),
            _ => false,
        };
        match self.peek() {
            Some(_) if opens_body => {
                self.nots(&mut children);
                children.push(self.take(SyntaxKind::OpenParen, 1));
                self.scope_body(&mut children, Context::LabelBody);
            }
            Some(c) if !c.is_whitespace() && c != ')' => self.value_list(&mut children, false),
            // `tag:` with nothing after it
            _ => {}
        }
        SyntaxNode::branch(SyntaxKind::Label, children)
    }

    /// `Not* atom (',' Not* atom)*`
    fn value_list(&mut self, out: &mut Vec<SyntaxNode>, wrap: bool) {
        let mut nodes = Vec::new();
        let mut commas = 0;
        loop {
            let start = self.pos;
            let before = nodes.len();
            self.nots(&mut nodes);
            // `- OR` and `- tag:x` leave a dangling negation
            let spaced = self.pos - start > nodes.len() - before;
            if (spaced && (self.at_or_keyword() || self.label_ahead(0).is_some()))
                || !self.at_atom_start(true)
            {
                break;
            }
            self.atom(&mut nodes, true);
            if self.peek() == Some(',') {
                nodes.push(self.take(SyntaxKind::Or, 1));
                commas += 1;
            } else {
                break;
            }
        }

        if wrap && commas > 0 {
            out.push(SyntaxNode::branch(SyntaxKind::Alternatives, nodes));
        } else {
            out.extend(nodes);
        }
    }

    fn at_atom_start(&self, in_list: bool) -> bool {
        match self.peek() {
            None => false,
            Some(c) => !c.is_whitespace() && c != '(' && c != ')' && !(in_list && c == ','),
        }
    }

    /// A string (with optional wildcard), a regex, or an error fragment
    fn atom(&mut self, out: &mut Vec<SyntaxNode>, in_list: bool) {
        let Some(c) = self.peek() else { return };
        let node = match c {
            '"' | '\'' => self.quoted(c),
            '/' => self.regex(),
            '*' => self.take(SyntaxKind::Error, 1),
            _ => self.simple(in_list),
        };

        let is_string = node.kind.is_string();
        out.push(node);
        if is_string && self.peek() == Some('*') {
            out.push(self.take(SyntaxKind::Wildcard, 1));
        }
    }

    fn simple(&mut self, in_list: bool) -> SyntaxNode {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_whitespace() || c == '(' || c == ')' || c == '*' || (in_list && c == ',') {
                break;
            }
            self.pos += 1;
        }
        if self.pos == start {
            // 不应发生：调用方已检查起始字符
            return self.take(SyntaxKind::Error, 1);
        }
        SyntaxNode::token(SyntaxKind::SimpleString, self.text(start, self.pos))
    }

    fn quoted(&mut self, delimiter: char) -> SyntaxNode {
        let mut run = 0;
        while self.peek_at(run) == Some(delimiter) {
            run += 1;
        }

        match run {
            // `""` is an empty string
            2 => self.take(SyntaxKind::QuotedString, 2),
            1 => {
                let mut end = self.pos + 1;
                while let Some(&c) = self.chars.get(end) {
                    if c == '\\' {
                        end += 2;
                        continue;
                    }
                    if c == delimiter {
                        return self.take(SyntaxKind::QuotedString, end + 1 - self.pos);
                    }
                    end += 1;
                }
                self.take(SyntaxKind::Error, 1)
            }
            fence => {
                let body_start = self.pos + fence;
                match self.find_fence(body_start, delimiter, fence) {
                    Some(close) => self.take(SyntaxKind::RawQuoted, close + fence - self.pos),
                    // ``: opening and closing fence with nothing between
                    None if fence >= 6 && fence % 2 == 0 => self.take(SyntaxKind::RawQuoted, fence),
                    None => self.take(SyntaxKind::Error, fence),
                }
            }
        }
    }

    /// First index at or after `from` where `len` delimiters follow each other
    fn find_fence(&self, from: usize, delimiter: char, len: usize) -> Option<usize> {
        (from..self.chars.len()).find(|&i| {
            i + len <= self.chars.len() && self.chars[i..i + len].iter().all(|&c| c == delimiter)
        })
    }

    fn regex(&mut self) -> SyntaxNode {
        let mut end = self.pos + 1;
        while let Some(&c) = self.chars.get(end) {
            if c == '\\' {
                end += 2;
                continue;
            }
            if c == '/' {
                let mut flags_end = end + 1;
                while self.chars.get(flags_end).map_or(false, |c| c.is_ascii_alphabetic()) {
                    flags_end += 1;
                }
                return self.take(SyntaxKind::Regex, flags_end - self.pos);
            }
            end += 1;
        }
        self.take(SyntaxKind::Error, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(input: &str) -> String {
        parse_query(input, &ParserConfig::default()).sexpr()
    }

    fn tokens(input: &str) -> Vec<String> {
        parse_query(input, &ParserConfig::default())
            .children
            .iter()
            .map(|c| c.text.clone())
            .collect()
    }

    #[test]
    fn test_simple_terms() {
        assert_eq!(tree("foo bar"), "Program(SimpleString,SimpleString)");
        assert_eq!(tokens("foo  bar"), vec!["foo", "bar"]);
        assert_eq!(tree(""), "Program()");
        assert_eq!(tree("   "), "Program()");
    }

    #[test]
    fn test_negation_forms() {
        assert_eq!(tree("-a"), "Program(Not,SimpleString)");
        assert_eq!(tree("- a"), "Program(Not,SimpleString)");
        assert_eq!(tree("a-b"), "Program(SimpleString)");
    }

    #[test]
    fn test_or_keyword() {
        assert_eq!(tree("a OR b"), "Program(SimpleString,Or,SimpleString)");
        assert_eq!(tree("ORACLE"), "Program(SimpleString)");
        assert_eq!(tree("a or b"), "Program(SimpleString,SimpleString,SimpleString)");
    }

    #[test]
    fn test_groups() {
        assert_eq!(
            tree("-(a b)"),
            "Program(Not,Group(OpenParen,SimpleString,SimpleString,CloseParen))"
        );
        // Unterminated group closes at end of input
        assert_eq!(tree("(a"), "Program(Group(OpenParen,SimpleString))");
        assert_eq!(tree(") a"), "Program(Error,SimpleString)");
    }

    #[test]
    fn test_quotes() {
        assert_eq!(tokens(r#""exact phrase" 'x y'"#), vec![r#""exact phrase""#, "'x y'"]);
        assert_eq!(tokens(r#""a \" b""#), vec![r#""a \" b""#]);
        assert_eq!(tree(r#""""#), "Program(QuotedString)");
        assert_eq!(tree(r#"""" a "b" """"#), "Program(RawQuoted)");
        assert_eq!(tokens(r#"''''it's''''"#), vec!["''''it's''''"]);
    }

    #[test]
    fn test_unterminated_quote_is_error() {
        assert_eq!(tree(r#"" foo"#), "Program(Error,SimpleString)");
        assert_eq!(tree(r#") " foo"#), "Program(Error,Error,SimpleString)");
        assert_eq!(tree(r#"""" foo"#), "Program(Error,SimpleString)");
    }

    #[test]
    fn test_wildcard() {
        assert_eq!(tree("foo*"), "Program(SimpleString,Wildcard)");
        assert_eq!(tree(r#""foo bar"*"#), "Program(QuotedString,Wildcard)");
        assert_eq!(tree("foo *"), "Program(SimpleString,Error)");
    }

    #[test]
    fn test_regex() {
        assert_eq!(tokens(r"/a\/b/gi x"), vec![r"/a\/b/gi", "x"]);
        assert_eq!(tree("/abc"), "Program(Error,SimpleString)");
    }

    #[test]
    fn test_labels() {
        assert_eq!(
            tree("tag:foo"),
            "Program(Label(LabelName[tag],Colon,SimpleString))"
        );
        assert_eq!(
            tree("-templateId:foo,bar"),
            "Program(Label(Not,LabelName[templateId],Colon,SimpleString,Or,SimpleString))"
        );
        assert_eq!(
            tree("kind:-new,review -relearn"),
            "Program(Label(LabelName[kind],Colon,Not,SimpleString,Or,SimpleString),Not,SimpleString)"
        );
        assert_eq!(tree("tag:"), "Program(Label(LabelName[tag],Colon))");
        assert_eq!(tree("unknown:foo"), "Program(SimpleString)");
    }

    #[test]
    fn test_label_body_alternatives() {
        assert_eq!(
            tree("kind:(-new,review -relearn)"),
            "Program(Label(LabelName[kind],Colon,OpenParen,Alternatives(Not,SimpleString,Or,SimpleString),Not,SimpleString,CloseParen))"
        );
        assert_eq!(
            tree("tag:(a b)"),
            "Program(Label(LabelName[tag],Colon,OpenParen,SimpleString,SimpleString,CloseParen))"
        );
        assert_eq!(
            tree("tag:(,a)"),
            "Program(Label(LabelName[tag],Colon,OpenParen,Error,SimpleString,CloseParen))"
        );
    }

    #[test]
    fn test_spaced_negation_in_labels() {
        assert_eq!(tree("tag:(- a,b)"), tree("tag:(-a,b)"));
        assert_eq!(tree("kind:(- new,review)"), tree("kind:(-new,review)"));
        assert_eq!(
            tree("kind:- new"),
            "Program(Label(LabelName[kind],Colon,Not,SimpleString))"
        );
        assert_eq!(
            tree("tag:a,- b"),
            "Program(Label(LabelName[tag],Colon,SimpleString,Or,Not,SimpleString))"
        );
        // `- OR` does not swallow the keyword
        assert_eq!(
            tree("tag:- OR b"),
            "Program(Label(LabelName[tag],Colon,Not),Or,SimpleString)"
        );
    }

    #[test]
    fn test_negated_label_body() {
        assert_eq!(
            tree("tag:-(a b)"),
            "Program(Label(LabelName[tag],Colon,Not,OpenParen,SimpleString,SimpleString,CloseParen))"
        );
        assert_eq!(tree("tag:- (a b)"), tree("tag:-(a b)"));
    }

    #[test]
    fn test_empty_raw_literal() {
        assert_eq!(tree(&"\"".repeat(6)), "Program(RawQuoted)");
        assert_eq!(tokens(&"'".repeat(8)), vec!["''''''''"]);
        // Odd runs cannot close themselves
        assert_eq!(tree(&"\"".repeat(7)), "Program(Error)");
    }

    #[test]
    fn test_label_case_sensitivity() {
        let strict = ParserConfig {
            case_insensitive_labels: false,
            ..ParserConfig::default()
        };
        assert_eq!(parse_query("TAG:x", &strict).sexpr(), "Program(SimpleString)");
        assert_eq!(tree("TAG:x"), "Program(Label(LabelName[tag],Colon,SimpleString))");
    }

    #[test]
    fn test_truncation() {
        let config = ParserConfig {
            max_input_chars: 3,
            ..ParserConfig::default()
        };
        assert_eq!(parse_query("abcdef", &config).children[0].text, "abc");
    }
}
