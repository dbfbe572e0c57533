use anyhow::Result;
use serde::Deserialize;

// 配置文件结构
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub collection: CollectionConfig,
    pub note: NoteConfig,
    #[serde(default)]
    pub fields: FieldOptions,
    pub audio: AudioConfig,
    pub input: InputConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CollectionConfig {
    pub db_file: String,
    pub media_dir: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NoteConfig {
    pub deck_name: String,
    pub model_name: String,
    pub template_name: String,
}

/// 用户勾选的可选字段，缺省全部启用
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct FieldOptions {
    pub definition: bool,
    pub sentence: bool,
    pub phrase: bool,
    pub image: bool,
    #[serde(rename = "BrEPhonetic")]
    pub bre_phonetic: bool,
    #[serde(rename = "AmEPhonetic")]
    pub ame_phonetic: bool,
    #[serde(rename = "BrEPron")]
    pub bre_pron: bool,
    #[serde(rename = "AmEPron")]
    pub ame_pron: bool,
}

impl Default for FieldOptions {
    fn default() -> Self {
        FieldOptions {
            definition: true,
            sentence: true,
            phrase: true,
            image: true,
            bre_phonetic: true,
            ame_phonetic: true,
            bre_pron: true,
            ame_pron: true,
        }
    }
}

impl FieldOptions {
    pub fn is_enabled(&self, name: &str) -> bool {
        match name {
            "definition" => self.definition,
            "sentence" => self.sentence,
            "phrase" => self.phrase,
            "image" => self.image,
            "BrEPhonetic" => self.bre_phonetic,
            "AmEPhonetic" => self.ame_phonetic,
            "BrEPron" => self.bre_pron,
            "AmEPron" => self.ame_pron,
            _ => false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AudioConfig {
    pub concurrent_requests: usize,
    pub request_delay_ms: u64,
    pub max_retries: u32,
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    pub results_file: String,
}

impl Config {
    pub fn load() -> Result<Config> {
        Self::load_from("config.toml")
    }

    pub fn load_from(path: &str) -> Result<Config> {
        let config_content = std::fs::read_to_string(path)
            .map_err(|_| anyhow::anyhow!("配置文件 {} 不存在或无法读取", path))?;
        Self::parse(&config_content)
    }

    pub fn parse(content: &str) -> Result<Config> {
        let config: Config = toml::from_str(content)
            .map_err(|e| anyhow::anyhow!("配置文件解析失败: {}", e))?;
        Ok(config)
    }
}
