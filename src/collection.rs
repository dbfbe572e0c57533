//! 宿主牌组集合的能力接口。
//!
//! 笔记管理只通过这个 trait 读写牌组、模版和笔记，具体存储由实现决定。

use anyhow::Result;

use crate::models::{Deck, Model, Note};

/// 笔记查找条件：牌组（含子牌组）以及可选的 term 字段值，均不区分大小写
#[derive(Debug, Clone, PartialEq)]
pub struct NoteQuery {
    pub deck: String,
    pub term: Option<String>,
}

impl NoteQuery {
    pub fn deck(deck: &str) -> Self {
        NoteQuery {
            deck: deck.to_string(),
            term: None,
        }
    }

    pub fn term(deck: &str, term: &str) -> Self {
        NoteQuery {
            deck: deck.to_string(),
            term: Some(term.to_string()),
        }
    }

    pub fn deck_key(&self) -> String {
        deck_key(&self.deck)
    }

    // 子牌组名以 `deck::` 开头
    pub fn child_prefix(&self) -> String {
        format!("{}::", self.deck_key())
    }
}

/// 牌组名的比较键，创建与查找都按它判定同名（含非 ASCII 字符的大小写）
pub fn deck_key(name: &str) -> String {
    name.to_lowercase()
}

#[allow(async_fn_in_trait)]
pub trait Collection {
    async fn all_decks(&self) -> Result<Vec<Deck>>;

    /// 按名字取牌组 id，不存在时创建
    async fn deck_id(&self, name: &str) -> Result<i64>;

    async fn get_deck(&self, id: i64) -> Result<Option<Deck>>;

    async fn save_deck(&self, deck: &Deck) -> Result<()>;

    async fn model_by_name(&self, name: &str) -> Result<Option<Model>>;

    /// 保存新模版并回填 id
    async fn add_model(&self, model: &mut Model) -> Result<()>;

    async fn update_model(&self, model: &Model) -> Result<()>;

    /// 删除模版及其全部笔记
    async fn remove_model(&self, model: &Model) -> Result<()>;

    async fn find_notes(&self, query: &NoteQuery) -> Result<Vec<i64>>;

    async fn get_note(&self, id: i64) -> Result<Option<Note>>;

    /// 插入笔记并回填 id
    async fn add_note(&self, note: &mut Note) -> Result<()>;

    // 刷新宿主侧缓存
    async fn reset(&self) -> Result<()> {
        Ok(())
    }
}
