use anyhow::Result;
use log::{debug, info, warn};

use crate::collection::{Collection, NoteQuery};
use crate::config::FieldOptions;
use crate::models::*;
use crate::templates;

/// 本工具创建的模版名前缀（不区分大小写）
pub const NAMESPACE: &str = "dict2anki";

/// 在牌组集合中查找 / 创建牌组与模版，并把查询结果写成笔记
pub struct NoteManager<C: Collection> {
    collection: C,
}

impl<C: Collection> NoteManager<C> {
    pub fn new(collection: C) -> Self {
        NoteManager { collection }
    }

    pub fn collection(&self) -> &C {
        &self.collection
    }

    pub async fn deck_list(&self) -> Result<Vec<String>> {
        let decks = self.collection.all_decks().await?;
        Ok(decks.into_iter().map(|deck| deck.name).collect())
    }

    /// 牌组中由本工具模版创建、且 term 不为空的单词
    pub async fn words_by_deck(&self, deck_name: &str) -> Result<Vec<String>> {
        let note_ids = self.collection.find_notes(&NoteQuery::deck(deck_name)).await?;
        let mut words = Vec::new();
        for id in note_ids {
            let Some(note) = self.collection.get_note(id).await? else {
                continue;
            };
            if !note.model_name.to_lowercase().starts_with(NAMESPACE) {
                continue;
            }
            if let Some(term) = note.get("term").filter(|term| !term.is_empty()) {
                words.push(term.to_string());
            }
        }
        Ok(words)
    }

    // 每个单词取第一条匹配的笔记，找不到的直接跳过
    pub async fn notes<S: AsRef<str>>(&self, words: &[S], deck_name: &str) -> Result<Vec<i64>> {
        let mut notes = Vec::new();
        for word in words {
            let found = self
                .collection
                .find_notes(&NoteQuery::term(deck_name, word.as_ref()))
                .await?;
            if let Some(&id) = found.first() {
                notes.push(id);
            }
        }
        Ok(notes)
    }

    pub async fn get_or_create_deck(&self, deck_name: &str) -> Result<Deck> {
        let deck_id = self.collection.deck_id(deck_name).await?;
        let deck = self
            .collection
            .get_deck(deck_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("牌组 {} (ID {}) 创建后无法读取", deck_name, deck_id))?;
        self.collection.save_deck(&deck).await?;
        self.collection.reset().await?;
        Ok(deck)
    }

    /// 字段集合与 [`MODEL_FIELDS`] 不一致的旧模版会被删除重建，旧笔记不做迁移
    pub async fn get_or_create_model(&self, model_name: &str) -> Result<Model> {
        if let Some(model) = self.collection.model_by_name(model_name).await? {
            if model.has_expected_fields() {
                return Ok(model);
            }
            warn!("模版 {} 字段异常，自动删除重建", model_name);
            self.collection.remove_model(&model).await?;
        }

        info!("创建新模版: {}", model_name);
        let mut model = Model::new(model_name);
        self.collection.add_model(&mut model).await?;
        for field in MODEL_FIELDS {
            model.add_field(field);
        }
        self.collection.update_model(&model).await?;
        Ok(model)
    }

    pub async fn get_or_create_model_card_template(&self, model: &mut Model, template_name: &str) -> Result<()> {
        if model.template(template_name).is_some() {
            return Ok(());
        }

        info!("添加卡片类型: {}", template_name);
        model.templates.push(templates::card_template(template_name));
        model.css = templates::CARD_CSS.to_string();
        self.collection.update_model(model).await
    }

    /// 空结果只记录警告，返回 None
    pub async fn add_note_to_deck(
        &self,
        deck: &Deck,
        model: &mut Model,
        options: &FieldOptions,
        result: Option<&QueryResult>,
    ) -> Result<Option<Note>> {
        let result = match result {
            Some(result) if !result.is_empty() => result,
            _ => {
                warn!("查询结果 {:?} 异常，忽略", result);
                return Ok(None);
            }
        };
        model.deck_id = deck.id;

        let mut note = Note::new(model);
        note.set("term", &result.term)?;

        for name in BASIC_OPTION.into_iter().chain(EXTRA_OPTION) {
            let value = result.get(name);
            debug!("字段:{} -- 结果:{:?}", name, value);
            let Some(value) = value else {
                continue;
            };

            match (name, value) {
                // 短语例句
                ("phrase" | "sentence", LookupValue::Pairs(pairs)) => {
                    if options.is_enabled(name) {
                        note.set(&format!("{}Front", name), templates::front_list(pairs))?;
                        note.set(&format!("{}Back", name), templates::back_list(pairs))?;
                    }
                }
                // 图片不受选项控制
                ("image", LookupValue::Text(url)) => {
                    note.set(name, templates::image_src(url))?;
                }
                ("definition", LookupValue::Lines(lines)) => {
                    if options.is_enabled(name) {
                        note.set(name, templates::definition_html(lines))?;
                    }
                }
                // 发音，音频由下载器放进媒体文件夹
                _ if EXTRA_OPTION.contains(&name) => {
                    if options.is_enabled(name) {
                        note.set(name, templates::sound_tag(name, &result.term))?;
                    }
                }
                (_, LookupValue::Text(text)) => {
                    if options.is_enabled(name) {
                        note.set(name, text)?;
                    }
                }
                _ => {}
            }
        }

        self.collection.add_note(&mut note).await?;
        self.collection.reset().await?;
        info!("添加笔记 {}", result.term);
        Ok(Some(note))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::SqliteCollection;

    async fn manager() -> NoteManager<SqliteCollection> {
        NoteManager::new(SqliteCollection::in_memory().await.unwrap())
    }

    fn hello() -> QueryResult {
        QueryResult {
            term: "hello".to_string(),
            definition: vec!["int. 喂".to_string(), "n. 招呼".to_string()],
            phrase: vec![("hello".to_string(), "你好".to_string())],
            sentence: vec![
                ("Hello, world.".to_string(), "你好，世界。".to_string()),
                (" Say hello. ".to_string(), " 打个招呼。 ".to_string()),
            ],
            image: Some("https://img.example/hello.png".to_string()),
            bre_phonetic: Some("həˈləʊ".to_string()),
            ame_phonetic: Some("həˈloʊ".to_string()),
            bre_pron: Some("https://audio.example/uk/hello".to_string()),
            ame_pron: Some("https://audio.example/us/hello".to_string()),
        }
    }

    async fn prepared(manager: &NoteManager<SqliteCollection>) -> (Deck, Model) {
        let deck = manager.get_or_create_deck("英语单词").await.unwrap();
        let mut model = manager.get_or_create_model("Dict2Anki").await.unwrap();
        manager
            .get_or_create_model_card_template(&mut model, "Dict2Anki")
            .await
            .unwrap();
        (deck, model)
    }

    async fn stored(manager: &NoteManager<SqliteCollection>, note: &Note) -> Note {
        manager.collection().get_note(note.id).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_deck_is_created_once() {
        let manager = manager().await;
        let first = manager.get_or_create_deck("英语单词").await.unwrap();
        let second = manager.get_or_create_deck("英语单词").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(
            manager.deck_list().await.unwrap(),
            vec!["Default".to_string(), "英语单词".to_string()]
        );
    }

    #[tokio::test]
    async fn test_get_or_create_model_is_idempotent() {
        let manager = manager().await;
        let first = manager.get_or_create_model("Dict2Anki").await.unwrap();
        let second = manager.get_or_create_model("Dict2Anki").await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.fields, MODEL_FIELDS.map(String::from).to_vec());
    }

    #[tokio::test]
    async fn test_model_with_drifted_fields_is_rebuilt() {
        let manager = manager().await;
        let mut drifted = Model::new("Dict2Anki");
        drifted.add_field("term");
        drifted.add_field("oldField");
        manager.collection().add_model(&mut drifted).await.unwrap();

        let mut old_note = Note::new(&drifted);
        old_note.set("term", "legacy").unwrap();
        manager.collection().add_note(&mut old_note).await.unwrap();

        let rebuilt = manager.get_or_create_model("Dict2Anki").await.unwrap();
        assert_ne!(rebuilt.id, drifted.id);
        assert!(rebuilt.has_expected_fields());

        let loaded = manager.collection().model_by_name("Dict2Anki").await.unwrap().unwrap();
        assert_eq!(loaded.id, rebuilt.id);
        assert!(loaded.has_expected_fields());
        // 旧笔记随模版一起删除
        assert!(manager.collection().get_note(old_note.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_card_template_added_once() {
        let manager = manager().await;
        let (_, mut model) = prepared(&manager).await;
        assert_eq!(model.templates.len(), 1);
        assert_eq!(model.css, templates::CARD_CSS);

        model.css = "changed".to_string();
        manager
            .get_or_create_model_card_template(&mut model, "Dict2Anki")
            .await
            .unwrap();
        assert_eq!(model.templates.len(), 1);
        assert_eq!(model.css, "changed");

        let loaded = manager.collection().model_by_name("Dict2Anki").await.unwrap().unwrap();
        assert_eq!(loaded.templates, vec![templates::card_template("Dict2Anki")]);
        assert_eq!(loaded.css, templates::CARD_CSS);
    }

    #[tokio::test]
    async fn test_empty_result_inserts_nothing() {
        let manager = manager().await;
        let (deck, mut model) = prepared(&manager).await;
        let options = FieldOptions::default();

        let none = manager.add_note_to_deck(&deck, &mut model, &options, None).await.unwrap();
        let blank = QueryResult::default();
        let empty = manager
            .add_note_to_deck(&deck, &mut model, &options, Some(&blank))
            .await
            .unwrap();

        assert!(none.is_none());
        assert!(empty.is_none());
        let in_deck = manager.collection().find_notes(&NoteQuery::deck("英语单词")).await.unwrap();
        assert!(in_deck.is_empty());
    }

    #[tokio::test]
    async fn test_phrase_rendering() {
        let manager = manager().await;
        let (deck, mut model) = prepared(&manager).await;
        let result = QueryResult {
            term: "hello".to_string(),
            phrase: vec![("hello".to_string(), "你好".to_string())],
            ..Default::default()
        };

        let note = manager
            .add_note_to_deck(&deck, &mut model, &FieldOptions::default(), Some(&result))
            .await
            .unwrap()
            .unwrap();
        let note = stored(&manager, &note).await;

        assert!(note.get("phraseFront").unwrap().contains("<li>hello</li>"));
        assert!(
            note.get("phraseBack")
                .unwrap()
                .contains(r#"<li>hello<br/><span class="answer">你好</span></li>"#)
        );
        assert_eq!(note.get("sentenceFront"), Some(""));
    }

    #[tokio::test]
    async fn test_all_fields_filled_when_enabled() {
        let manager = manager().await;
        let (deck, mut model) = prepared(&manager).await;

        let note = manager
            .add_note_to_deck(&deck, &mut model, &FieldOptions::default(), Some(&hello()))
            .await
            .unwrap()
            .unwrap();
        let note = stored(&manager, &note).await;

        assert_eq!(note.deck_id, deck.id);
        assert_eq!(model.deck_id, deck.id);
        assert_eq!(note.get("term"), Some("hello"));
        assert_eq!(note.get("definition"), Some("int. 喂<br/>n. 招呼"));
        assert_eq!(
            note.get("sentenceFront"),
            Some("<li>Hello, world.</li>\n<li>Say hello.</li>")
        );
        assert_eq!(
            note.get("sentenceBack"),
            Some(
                "<li>Hello, world.<br/><span class=\"answer\">你好，世界。</span></li>\n\
                 <li>Say hello.<br/><span class=\"answer\">打个招呼。</span></li>"
            )
        );
        assert_eq!(note.get("image"), Some(r#"src="https://img.example/hello.png""#));
        assert_eq!(note.get("BrEPhonetic"), Some("həˈləʊ"));
        assert_eq!(note.get("AmEPhonetic"), Some("həˈloʊ"));
        assert_eq!(note.get("BrEPron"), Some("[sound:BrEPron_hello.mp3]"));
        assert_eq!(note.get("AmEPron"), Some("[sound:AmEPron_hello.mp3]"));
    }

    #[tokio::test]
    async fn test_disabled_options_leave_fields_empty_except_image() {
        let manager = manager().await;
        let (deck, mut model) = prepared(&manager).await;
        let options = FieldOptions {
            definition: false,
            sentence: false,
            phrase: false,
            image: false,
            bre_phonetic: false,
            ame_phonetic: false,
            bre_pron: false,
            ame_pron: false,
        };

        let note = manager
            .add_note_to_deck(&deck, &mut model, &options, Some(&hello()))
            .await
            .unwrap()
            .unwrap();
        let note = stored(&manager, &note).await;

        assert_eq!(note.get("term"), Some("hello"));
        assert_eq!(note.get("image"), Some(r#"src="https://img.example/hello.png""#));
        for field in MODEL_FIELDS.iter().filter(|f| !["term", "image"].contains(f)) {
            assert_eq!(note.get(field), Some(""), "{} should be empty", field);
        }
    }

    #[tokio::test]
    async fn test_words_by_deck_filters_by_namespace() {
        let manager = manager().await;
        let (deck, mut model) = prepared(&manager).await;
        let options = FieldOptions::default();
        for term in ["apple", "banana"] {
            let result = QueryResult {
                term: term.to_string(),
                ..Default::default()
            };
            manager
                .add_note_to_deck(&deck, &mut model, &options, Some(&result))
                .await
                .unwrap();
        }

        // 其他模版的笔记
        let mut basic = Model::new("Basic");
        basic.add_field("term");
        basic.deck_id = deck.id;
        manager.collection().add_model(&mut basic).await.unwrap();
        let mut foreign = Note::new(&basic);
        foreign.set("term", "cherry").unwrap();
        manager.collection().add_note(&mut foreign).await.unwrap();

        // 大写前缀同样算本工具的模版，空 term 不计
        let mut upper = Model::new("DICT2ANKI-extra");
        upper.add_field("term");
        upper.deck_id = deck.id;
        manager.collection().add_model(&mut upper).await.unwrap();
        let mut shouting = Note::new(&upper);
        shouting.set("term", "durian").unwrap();
        manager.collection().add_note(&mut shouting).await.unwrap();
        manager.collection().add_note(&mut Note::new(&upper)).await.unwrap();

        let words = manager.words_by_deck("英语单词").await.unwrap();
        assert_eq!(words, vec!["apple", "banana", "durian"]);
        assert!(manager.words_by_deck("Default").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_notes_skips_missing_words() {
        let manager = manager().await;
        let (deck, mut model) = prepared(&manager).await;
        let added = manager
            .add_note_to_deck(&deck, &mut model, &FieldOptions::default(), Some(&hello()))
            .await
            .unwrap()
            .unwrap();

        assert!(manager.notes(&["missing"], "英语单词").await.unwrap().is_empty());
        assert_eq!(
            manager.notes(&["Hello", "missing"], "英语单词").await.unwrap(),
            vec![added.id]
        );
        assert!(manager.notes(&["hello"], "Default").await.unwrap().is_empty());
    }
}
