//! Search label registry / 搜索标签注册表
//!
//! A label is a facet prefix such as `tag:` or `kind:` that routes a term to a
//! dedicated predicate instead of free-text search.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Recognized search facets / 可识别的搜索标签
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Label {
    Tag,
    Template,
    TemplateId,
    Setting,
    SettingId,
    Field,
    CardId,
    NoteId,
    State,
    Kind,
    Due,
    NoteCreated,
    NoteEdited,
    CardCreated,
    CardEdited,
    Created,
    Edited,
    Reps,
    Lapses,
    TagCount,
    CardTagCount,
    NoteTagCount,
    Reviewed,
    FirstReviewed,
}

/// Lowercased name -> label, for case-insensitive lookup / 小写名称索引
static BY_LOWER_NAME: Lazy<HashMap<String, Label>> = Lazy::new(|| {
    Label::ALL
        .iter()
        .map(|label| (label.as_str().to_lowercase(), *label))
        .collect()
});

impl Label {
    pub const ALL: [Label; 24] = [
        Label::Tag,
        Label::Template,
        Label::TemplateId,
        Label::Setting,
        Label::SettingId,
        Label::Field,
        Label::CardId,
        Label::NoteId,
        Label::State,
        Label::Kind,
        Label::Due,
        Label::NoteCreated,
        Label::NoteEdited,
        Label::CardCreated,
        Label::CardEdited,
        Label::Created,
        Label::Edited,
        Label::Reps,
        Label::Lapses,
        Label::TagCount,
        Label::CardTagCount,
        Label::NoteTagCount,
        Label::Reviewed,
        Label::FirstReviewed,
    ];

    /// Name as typed in a query / 查询中的名称
    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Tag => "tag",
            Label::Template => "template",
            Label::TemplateId => "templateId",
            Label::Setting => "setting",
            Label::SettingId => "settingId",
            Label::Field => "field",
            Label::CardId => "cardId",
            Label::NoteId => "noteId",
            Label::State => "state",
            Label::Kind => "kind",
            Label::Due => "due",
            Label::NoteCreated => "noteCreated",
            Label::NoteEdited => "noteEdited",
            Label::CardCreated => "cardCreated",
            Label::CardEdited => "cardEdited",
            Label::Created => "created",
            Label::Edited => "edited",
            Label::Reps => "reps",
            Label::Lapses => "lapses",
            Label::TagCount => "tagCount",
            Label::CardTagCount => "cardTagCount",
            Label::NoteTagCount => "noteTagCount",
            Label::Reviewed => "reviewed",
            Label::FirstReviewed => "firstReviewed",
        }
    }

    /// Look up a label by name / 按名称查找标签
    pub fn parse(name: &str, case_insensitive: bool) -> Option<Label> {
        if case_insensitive {
            BY_LOWER_NAME.get(&name.to_lowercase()).copied()
        } else {
            Label::ALL.iter().copied().find(|label| label.as_str() == name)
        }
    }

    /// Whether the SQL generator knows how to translate this label
    pub fn has_codegen(&self) -> bool {
        matches!(
            self,
            Label::Tag
                | Label::Template
                | Label::TemplateId
                | Label::Setting
                | Label::SettingId
                | Label::Kind
        )
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_exact() {
        assert_eq!(Label::parse("templateId", false), Some(Label::TemplateId));
        assert_eq!(Label::parse("templateid", false), None);
        assert_eq!(Label::parse("nope", false), None);
    }

    #[test]
    fn test_parse_case_insensitive() {
        assert_eq!(Label::parse("TAG", true), Some(Label::Tag));
        assert_eq!(Label::parse("firstreviewed", true), Some(Label::FirstReviewed));
    }

    #[test]
    fn test_names_are_unique() {
        assert_eq!(BY_LOWER_NAME.len(), Label::ALL.len());
        for label in Label::ALL {
            assert_eq!(Label::parse(label.as_str(), false), Some(label));
        }
    }

    #[test]
    fn test_codegen_labels() {
        let implemented: Vec<_> = Label::ALL.iter().filter(|l| l.has_codegen()).collect();
        assert_eq!(implemented.len(), 6);
        assert!(!Label::Due.has_codegen());
    }
}
