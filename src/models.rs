use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

// 笔记模板的固定字段，按创建顺序排列
pub const MODEL_FIELDS: [&str; 11] = [
    "term",
    "definition",
    "sentenceFront",
    "sentenceBack",
    "phraseFront",
    "phraseBack",
    "image",
    "BrEPhonetic",
    "AmEPhonetic",
    "BrEPron",
    "AmEPron",
];

// 基础选项
pub const BASIC_OPTION: [&str; 6] = [
    "definition",
    "sentence",
    "phrase",
    "image",
    "BrEPhonetic",
    "AmEPhonetic",
];

// 额外选项（发音）
pub const EXTRA_OPTION: [&str; 2] = ["BrEPron", "AmEPron"];

pub const DEFAULT_DECK_ID: i64 = 1;

// 牌组
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, sqlx::FromRow)]
pub struct Deck {
    pub id: i64,
    pub name: String,
}

// 卡片类型（正面 / 背面）
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CardTemplate {
    pub name: String,
    pub qfmt: String,
    pub afmt: String,
}

// 笔记模板
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    pub id: i64, // 尚未保存时为 0
    pub name: String,
    pub fields: Vec<String>,
    pub templates: Vec<CardTemplate>,
    pub css: String,
    pub deck_id: i64,
}

impl Model {
    pub fn new(name: &str) -> Self {
        Model {
            id: 0,
            name: name.to_string(),
            fields: Vec::new(),
            templates: Vec::new(),
            css: String::new(),
            deck_id: DEFAULT_DECK_ID,
        }
    }

    pub fn add_field(&mut self, name: &str) {
        if !self.fields.iter().any(|f| f == name) {
            self.fields.push(name.to_string());
        }
    }

    /// 字段集合是否与 [`MODEL_FIELDS`] 完全一致（不考虑顺序）
    pub fn has_expected_fields(&self) -> bool {
        let current: HashSet<&str> = self.fields.iter().map(String::as_str).collect();
        let expected: HashSet<&str> = MODEL_FIELDS.iter().copied().collect();
        current == expected
    }

    pub fn template(&self, name: &str) -> Option<&CardTemplate> {
        self.templates.iter().find(|t| t.name == name)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct NoteField {
    pub name: String,
    pub value: String,
}

// 笔记
#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    pub id: i64, // 插入集合后才分配
    pub model_id: i64,
    pub model_name: String,
    pub deck_id: i64,
    pub fields: Vec<NoteField>,
}

impl Note {
    /// 按模板创建空笔记，牌组取自模板的 deck_id
    pub fn new(model: &Model) -> Self {
        Note {
            id: 0,
            model_id: model.id,
            model_name: model.name.clone(),
            deck_id: model.deck_id,
            fields: model
                .fields
                .iter()
                .map(|name| NoteField {
                    name: name.clone(),
                    value: String::new(),
                })
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.value.as_str())
    }

    pub fn set(&mut self, name: &str, value: impl Into<String>) -> Result<()> {
        let field = self
            .fields
            .iter_mut()
            .find(|f| f.name == name)
            .ok_or_else(|| anyhow::anyhow!("模版 {} 中不存在字段 {}", self.model_name, name))?;
        field.value = value.into();
        Ok(())
    }
}

// 单词查询结果
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct QueryResult {
    #[serde(default)]
    pub term: String,
    #[serde(default)]
    pub definition: Vec<String>,
    #[serde(default)]
    pub phrase: Vec<(String, String)>,
    #[serde(default)]
    pub sentence: Vec<(String, String)>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(rename = "BrEPhonetic", default)]
    pub bre_phonetic: Option<String>,
    #[serde(rename = "AmEPhonetic", default)]
    pub ame_phonetic: Option<String>,
    #[serde(rename = "BrEPron", default)]
    pub bre_pron: Option<String>,
    #[serde(rename = "AmEPron", default)]
    pub ame_pron: Option<String>,
}

// 查询结果中某个字段的取值
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LookupValue<'a> {
    Text(&'a str),
    Lines(&'a [String]),
    Pairs(&'a [(String, String)]),
}

impl LookupValue<'_> {
    fn is_empty(&self) -> bool {
        match self {
            LookupValue::Text(text) => text.is_empty(),
            LookupValue::Lines(lines) => lines.is_empty(),
            LookupValue::Pairs(pairs) => pairs.is_empty(),
        }
    }
}

impl QueryResult {
    pub fn is_empty(&self) -> bool {
        self.term.trim().is_empty()
    }

    /// 按选项名取值，空值与未知字段都返回 None
    pub fn get(&self, name: &str) -> Option<LookupValue<'_>> {
        let value = match name {
            "term" => LookupValue::Text(&self.term),
            "definition" => LookupValue::Lines(&self.definition),
            "phrase" => LookupValue::Pairs(&self.phrase),
            "sentence" => LookupValue::Pairs(&self.sentence),
            "image" => LookupValue::Text(self.image.as_deref()?),
            "BrEPhonetic" => LookupValue::Text(self.bre_phonetic.as_deref()?),
            "AmEPhonetic" => LookupValue::Text(self.ame_phonetic.as_deref()?),
            "BrEPron" => LookupValue::Text(self.bre_pron.as_deref()?),
            "AmEPron" => LookupValue::Text(self.ame_pron.as_deref()?),
            _ => return None,
        };
        if value.is_empty() { None } else { Some(value) }
    }
}
