use anyhow::Result;
use std::collections::HashSet;

use dict2anki::{Config, NoteManager, PronunciationDownloader, QueryResult, SqliteCollection};

fn print_usage() {
    println!("用法: dict2anki [import|decks|words]");
    println!("   import  导入 config.toml 中 results_file 的查询结果（默认）");
    println!("   decks   列出所有牌组");
    println!("   words   列出目标牌组中已有的单词");
}

// 读取查询结果文件，失败的查询记为 null
fn load_results(path: &str) -> Result<Vec<Option<QueryResult>>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("无法读取查询结果文件 {}: {}", path, e))?;
    let results: Vec<Option<QueryResult>> = serde_json::from_str(&content)
        .map_err(|e| anyhow::anyhow!("解析查询结果失败: {}", e))?;
    Ok(results)
}

async fn import(manager: &NoteManager<SqliteCollection>, config: &Config) -> Result<()> {
    let results = load_results(&config.input.results_file)?;
    println!("📖 读取到 {} 条查询结果", results.len());

    let deck = manager.get_or_create_deck(&config.note.deck_name).await?;
    let mut model = manager.get_or_create_model(&config.note.model_name).await?;
    manager
        .get_or_create_model_card_template(&mut model, &config.note.template_name)
        .await?;

    // 牌组中已有的单词不再重复添加
    let existing: HashSet<String> = manager
        .words_by_deck(&deck.name)
        .await?
        .into_iter()
        .map(|word| word.to_lowercase())
        .collect();

    let mut skipped = 0;
    let mut to_add = Vec::new();
    for result in results {
        match result {
            Some(result) if existing.contains(&result.term.to_lowercase()) => {
                println!("  ⏭️  已存在，跳过: {}", result.term);
                skipped += 1;
            }
            other => to_add.push(other),
        }
    }

    let with_audio: Vec<QueryResult> = to_add.iter().flatten().cloned().collect();
    let downloader = PronunciationDownloader::new(config)?;
    let downloaded = downloader.download_all(&with_audio, &config.fields).await?;
    if downloaded > 0 {
        println!("🔊 已下载 {} 个发音文件", downloaded);
    }

    let mut added = 0;
    let mut ignored = 0;
    for result in &to_add {
        match manager
            .add_note_to_deck(&deck, &mut model, &config.fields, result.as_ref())
            .await?
        {
            Some(note) => {
                println!("  ➕ 新增笔记: {}", note.get("term").unwrap_or_default());
                added += 1;
            }
            None => ignored += 1,
        }
    }

    println!("\n🎉 完成！牌组「{}」", deck.name);
    println!("   ➕ 新增 {} 条", added);
    println!("   ⏭️  跳过已存在 {} 条", skipped);
    if ignored > 0 {
        println!("   ⚠️  忽略无效结果 {} 条", ignored);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("📚 Dict2Anki 笔记导入工具");

    let command = std::env::args().nth(1).unwrap_or_else(|| "import".to_string());
    if !matches!(command.as_str(), "import" | "decks" | "words") {
        println!("⚠️  未知命令: {}", command);
        print_usage();
        return Ok(());
    }

    let config = Config::load()?;
    let collection = SqliteCollection::open(&config.collection.db_file).await?;
    let manager = NoteManager::new(collection);

    match command.as_str() {
        "decks" => {
            for name in manager.deck_list().await? {
                println!("  🗂️  {}", name);
            }
        }
        "words" => {
            let words = manager.words_by_deck(&config.note.deck_name).await?;
            println!("📝 牌组「{}」中有 {} 个单词", config.note.deck_name, words.len());
            for word in words {
                println!("   {}", word);
            }
        }
        _ => import(&manager, &config).await?,
    }

    Ok(())
}
