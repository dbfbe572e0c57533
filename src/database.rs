use anyhow::Result;
use log::info;
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;

use crate::collection::{Collection, NoteQuery, deck_key};
use crate::models::*;

#[derive(sqlx::FromRow)]
struct ModelRow {
    id: i64,
    name: String,
    fields: String,
    templates: String,
    css: String,
    deck_id: i64,
}

impl TryFrom<ModelRow> for Model {
    type Error = anyhow::Error;

    fn try_from(row: ModelRow) -> Result<Self> {
        Ok(Model {
            id: row.id,
            fields: serde_json::from_str(&row.fields)
                .map_err(|e| anyhow::anyhow!("模版 {} 的字段数据损坏: {}", row.name, e))?,
            templates: serde_json::from_str(&row.templates)
                .map_err(|e| anyhow::anyhow!("模版 {} 的卡片类型数据损坏: {}", row.name, e))?,
            name: row.name,
            css: row.css,
            deck_id: row.deck_id,
        })
    }
}

#[derive(sqlx::FromRow)]
struct NoteRow {
    id: i64,
    model_id: i64,
    model_name: String,
    deck_id: i64,
    fields: String,
}

impl NoteRow {
    fn into_note(self) -> Result<Note> {
        let fields: Vec<NoteField> = serde_json::from_str(&self.fields)
            .map_err(|e| anyhow::anyhow!("笔记 {} 的字段数据损坏: {}", self.id, e))?;
        Ok(Note {
            id: self.id,
            model_id: self.model_id,
            model_name: self.model_name,
            deck_id: self.deck_id,
            fields,
        })
    }
}

const NOTE_COLUMNS: &str = r#"
    SELECT notes.id, notes.model_id, models.name AS model_name,
           notes.deck_id, notes.fields
    FROM notes
    JOIN models ON models.id = notes.model_id
    JOIN decks ON decks.id = notes.deck_id
"#;

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// 基于 SQLite 的牌组集合
pub struct SqliteCollection {
    pool: SqlitePool,
}

impl SqliteCollection {
    pub async fn open(db_file: &str) -> Result<Self> {
        // 创建数据库文件路径
        let db_path = std::env::current_dir()?.join(db_file);
        let db_url = format!("sqlite:{}", db_path.display());

        info!("连接牌组数据库: {}", db_path.display());

        // 如果数据库文件不存在，先创建一个空文件
        if !db_path.exists() {
            std::fs::File::create(&db_path)?;
            info!("创建新数据库文件: {}", db_path.display());
        }

        let pool = SqlitePool::connect(&db_url).await?;
        Self::from_pool(pool).await
    }

    /// 内存数据库，连接关闭即丢失
    pub async fn in_memory() -> Result<Self> {
        // 内存库只存在于单个连接中
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Self::from_pool(pool).await
    }

    async fn from_pool(pool: SqlitePool) -> Result<Self> {
        let collection = SqliteCollection { pool };
        collection.initialize_tables().await?;
        Ok(collection)
    }

    async fn initialize_tables(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS decks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                name_key TEXT NOT NULL UNIQUE,
                updated_at INTEGER NOT NULL
            )
            "#
        ).execute(&self.pool).await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS models (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                fields TEXT NOT NULL,
                templates TEXT NOT NULL,
                css TEXT NOT NULL DEFAULT '',
                deck_id INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#
        ).execute(&self.pool).await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS notes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                model_id INTEGER NOT NULL,
                deck_id INTEGER NOT NULL,
                fields TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#
        ).execute(&self.pool).await?;

        // 默认牌组始终存在
        sqlx::query("INSERT OR IGNORE INTO decks (id, name, name_key, updated_at) VALUES (?, 'Default', ?, ?)")
            .bind(DEFAULT_DECK_ID)
            .bind(deck_key("Default"))
            .bind(now_millis())
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

impl Collection for SqliteCollection {
    async fn all_decks(&self) -> Result<Vec<Deck>> {
        let decks = sqlx::query_as::<_, Deck>("SELECT id, name FROM decks ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(decks)
    }

    async fn deck_id(&self, name: &str) -> Result<i64> {
        let existing: Option<(i64,)> = sqlx::query_as("SELECT id FROM decks WHERE name_key = ?")
            .bind(deck_key(name))
            .fetch_optional(&self.pool)
            .await?;

        if let Some((id,)) = existing {
            return Ok(id);
        }

        let result = sqlx::query("INSERT INTO decks (name, name_key, updated_at) VALUES (?, ?, ?)")
            .bind(name)
            .bind(deck_key(name))
            .bind(now_millis())
            .execute(&self.pool)
            .await?;
        info!("创建牌组: {}", name);
        Ok(result.last_insert_rowid())
    }

    async fn get_deck(&self, id: i64) -> Result<Option<Deck>> {
        let deck = sqlx::query_as::<_, Deck>("SELECT id, name FROM decks WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(deck)
    }

    async fn save_deck(&self, deck: &Deck) -> Result<()> {
        let result = sqlx::query("UPDATE decks SET name = ?, name_key = ?, updated_at = ? WHERE id = ?")
            .bind(&deck.name)
            .bind(deck_key(&deck.name))
            .bind(now_millis())
            .bind(deck.id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            anyhow::bail!("牌组 ID {} 不存在", deck.id);
        }
        Ok(())
    }

    async fn model_by_name(&self, name: &str) -> Result<Option<Model>> {
        let row = sqlx::query_as::<_, ModelRow>(
            "SELECT id, name, fields, templates, css, deck_id FROM models WHERE name = ? ORDER BY id LIMIT 1"
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Model::try_from).transpose()
    }

    async fn add_model(&self, model: &mut Model) -> Result<()> {
        let result = sqlx::query(
            "INSERT INTO models (name, fields, templates, css, deck_id, updated_at) VALUES (?, ?, ?, ?, ?, ?)"
        )
        .bind(&model.name)
        .bind(serde_json::to_string(&model.fields)?)
        .bind(serde_json::to_string(&model.templates)?)
        .bind(&model.css)
        .bind(model.deck_id)
        .bind(now_millis())
        .execute(&self.pool)
        .await?;

        model.id = result.last_insert_rowid();
        Ok(())
    }

    async fn update_model(&self, model: &Model) -> Result<()> {
        let result = sqlx::query(
            "UPDATE models SET name = ?, fields = ?, templates = ?, css = ?, deck_id = ?, updated_at = ? WHERE id = ?"
        )
        .bind(&model.name)
        .bind(serde_json::to_string(&model.fields)?)
        .bind(serde_json::to_string(&model.templates)?)
        .bind(&model.css)
        .bind(model.deck_id)
        .bind(now_millis())
        .bind(model.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            anyhow::bail!("模版 {} (ID {}) 不存在", model.name, model.id);
        }
        Ok(())
    }

    async fn remove_model(&self, model: &Model) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let removed_notes = sqlx::query("DELETE FROM notes WHERE model_id = ?")
            .bind(model.id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM models WHERE id = ?")
            .bind(model.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        info!(
            "删除模版 {}，连带删除 {} 条笔记",
            model.name,
            removed_notes.rows_affected()
        );
        Ok(())
    }

    async fn find_notes(&self, query: &NoteQuery) -> Result<Vec<i64>> {
        // 牌组本身或其子牌组
        let sql = format!(
            "{} WHERE decks.name_key = ? OR substr(decks.name_key, 1, length(?)) = ? ORDER BY notes.id",
            NOTE_COLUMNS
        );
        let child_prefix = query.child_prefix();
        let rows = sqlx::query_as::<_, NoteRow>(&sql)
            .bind(query.deck_key())
            .bind(&child_prefix)
            .bind(&child_prefix)
            .fetch_all(&self.pool)
            .await?;

        let Some(wanted) = query.term.as_deref().map(str::to_lowercase) else {
            return Ok(rows.into_iter().map(|row| row.id).collect());
        };

        let mut ids = Vec::new();
        for row in rows {
            let note = row.into_note()?;
            if note.get("term").unwrap_or_default().to_lowercase() == wanted {
                ids.push(note.id);
            }
        }
        Ok(ids)
    }

    async fn get_note(&self, id: i64) -> Result<Option<Note>> {
        let sql = format!("{} WHERE notes.id = ?", NOTE_COLUMNS);
        let row = sqlx::query_as::<_, NoteRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(NoteRow::into_note).transpose()
    }

    async fn add_note(&self, note: &mut Note) -> Result<()> {
        let model_exists: Option<(i64,)> = sqlx::query_as("SELECT id FROM models WHERE id = ?")
            .bind(note.model_id)
            .fetch_optional(&self.pool)
            .await?;
        if model_exists.is_none() {
            anyhow::bail!("笔记所属模版 {} (ID {}) 不存在", note.model_name, note.model_id);
        }
        if self.get_deck(note.deck_id).await?.is_none() {
            anyhow::bail!("笔记所属牌组 ID {} 不存在", note.deck_id);
        }

        let result = sqlx::query(
            "INSERT INTO notes (model_id, deck_id, fields, updated_at) VALUES (?, ?, ?, ?)"
        )
        .bind(note.model_id)
        .bind(note.deck_id)
        .bind(serde_json::to_string(&note.fields)?)
        .bind(now_millis())
        .execute(&self.pool)
        .await?;

        note.id = result.last_insert_rowid();
        Ok(())
    }
}
