use anyhow::Result;
use futures::stream::{self, StreamExt};
use log::{info, warn};
use reqwest::{Client, ClientBuilder};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::sleep;

use crate::config::{AudioConfig, Config, FieldOptions};
use crate::models::{EXTRA_OPTION, LookupValue, QueryResult};
use crate::templates::media_file_name;

/// 一条待下载的发音
#[derive(Debug, Clone, PartialEq)]
pub struct AudioTask {
    pub field: &'static str,
    pub term: String,
    pub url: String,
    pub path: PathBuf,
}

/// 把查询结果中的发音下载到媒体文件夹，文件名与笔记中的 [sound:...] 一致
pub struct PronunciationDownloader {
    client: Client,
    config: AudioConfig,
    media_dir: PathBuf,
}

impl PronunciationDownloader {
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_media_dir(config.audio.clone(), &config.collection.media_dir)
    }

    pub fn with_media_dir(config: AudioConfig, media_dir: impl AsRef<Path>) -> Result<Self> {
        let client = ClientBuilder::new()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()?;

        Ok(Self::with_client(client, config, media_dir))
    }

    // 使用调用方配置好的 HTTP 客户端（代理、证书等）
    pub fn with_client(client: Client, config: AudioConfig, media_dir: impl AsRef<Path>) -> Self {
        PronunciationDownloader {
            client,
            config,
            media_dir: media_dir.as_ref().to_path_buf(),
        }
    }

    pub fn media_path(&self, field: &str, term: &str) -> PathBuf {
        self.media_dir.join(media_file_name(field, term))
    }

    /// 需要下载的发音：字段已启用、有地址、本地还没有文件
    pub fn pending(&self, results: &[QueryResult], options: &FieldOptions) -> Vec<AudioTask> {
        let mut tasks = Vec::new();
        for result in results.iter().filter(|r| !r.is_empty()) {
            for field in EXTRA_OPTION {
                if !options.is_enabled(field) {
                    continue;
                }
                let Some(LookupValue::Text(url)) = result.get(field) else {
                    continue;
                };
                let path = self.media_path(field, &result.term);
                if path.exists() {
                    continue;
                }
                tasks.push(AudioTask {
                    field,
                    term: result.term.clone(),
                    url: url.to_string(),
                    path,
                });
            }
        }
        tasks
    }

    /// 并发下载全部发音，返回成功数量；单个失败只记录不中断
    pub async fn download_all(&self, results: &[QueryResult], options: &FieldOptions) -> Result<usize> {
        let tasks = self.pending(results, options);
        if tasks.is_empty() {
            return Ok(0);
        }

        tokio::fs::create_dir_all(&self.media_dir)
            .await
            .map_err(|e| anyhow::anyhow!("无法创建媒体目录 {}: {}", self.media_dir.display(), e))?;

        info!("开始下载 {} 个发音文件", tasks.len());

        let outcomes: Vec<bool> = stream::iter(tasks)
            .map(|task| async move {
                match self.download(&task).await {
                    Ok(()) => true,
                    Err(e) => {
                        warn!("发音下载失败 {} ({}): {}", task.term, task.field, e);
                        false
                    }
                }
            })
            .buffer_unordered(self.config.concurrent_requests.max(1))
            .collect()
            .await;

        Ok(outcomes.into_iter().filter(|ok| *ok).count())
    }

    async fn download(&self, task: &AudioTask) -> Result<()> {
        let audio_data = self.fetch_with_retry(&task.url).await?;
        if audio_data.is_empty() {
            anyhow::bail!("未收到音频数据");
        }

        tokio::fs::write(&task.path, &audio_data)
            .await
            .map_err(|e| anyhow::anyhow!("无法写入音频文件 {}: {}", task.path.display(), e))?;

        info!("已保存发音: {}", task.path.display());
        Ok(())
    }

    // 带重试机制的下载
    async fn fetch_with_retry(&self, url: &str) -> Result<Vec<u8>> {
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let delay = Duration::from_millis(self.config.request_delay_ms * (attempt as u64 + 1));
                warn!("重试 {}/{} 次，等待 {:?}: {}", attempt, self.config.max_retries, delay, url);
                sleep(delay).await;
            }

            match self.client.get(url).send().await {
                Ok(response) if response.status().is_success() => match response.bytes().await {
                    Ok(bytes) => return Ok(bytes.to_vec()),
                    Err(e) => last_error = Some(anyhow::anyhow!("读取音频数据失败: {}", e)),
                },
                Ok(response) => {
                    last_error = Some(anyhow::anyhow!("下载失败 (状态码: {})", response.status()));
                }
                Err(e) => {
                    last_error = Some(anyhow::anyhow!("网络请求失败: {}", e));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("所有重试都失败了")))
    }
}
