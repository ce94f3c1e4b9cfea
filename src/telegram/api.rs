use anyhow::{Context, Result};
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::types::{ApiResponse, TgFile, TgMessage, Update};

pub struct TelegramBot {
    client: Client,
    base_url: String,
    file_url: String,
    allowed_users: Vec<i64>,
}

impl TelegramBot {
    pub fn new(token: &str, allowed_users: Vec<i64>) -> Result<Self> {
        // Long polls hold the connection open for up to the poll timeout
        let client = Client::builder()
            .timeout(Duration::from_secs(90))
            .build()
            .context("building HTTP client")?;
        Ok(Self {
            client,
            base_url: format!("https://api.telegram.org/bot{token}/"),
            file_url: format!("https://api.telegram.org/file/bot{token}/"),
            allowed_users,
        })
    }

    pub async fn get_updates(&self, offset: i64, timeout: u32) -> Result<Vec<Update>> {
        let resp: ApiResponse<Vec<Update>> = self
            .client
            .get(format!("{}getUpdates", self.base_url))
            .query(&[
                ("offset", offset.to_string()),
                ("timeout", timeout.to_string()),
                ("allowed_updates", "[\"message\"]".to_string()),
            ])
            .send()
            .await
            .context("polling Telegram updates")?
            .json()
            .await
            .context("parsing Telegram updates")?;

        if !resp.ok {
            anyhow::bail!(
                "Telegram API error: {}",
                resp.description.unwrap_or_default()
            );
        }

        Ok(resp.result.unwrap_or_default())
    }

    /// Send plain text (no parse mode, tool output is not valid markdown)
    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<TgMessage> {
        let resp: ApiResponse<TgMessage> = self
            .client
            .post(format!("{}sendMessage", self.base_url))
            .json(&serde_json::json!({
                "chat_id": chat_id,
                "text": text,
            }))
            .send()
            .await
            .context("sending Telegram message")?
            .json()
            .await
            .context("parsing sendMessage response")?;

        if !resp.ok {
            anyhow::bail!(
                "sendMessage failed: {}",
                resp.description.unwrap_or_default()
            );
        }

        resp.result.context("no message in response")
    }

    pub async fn send_typing(&self, chat_id: i64) -> Result<()> {
        let _resp: ApiResponse<bool> = self
            .client
            .post(format!("{}sendChatAction", self.base_url))
            .json(&serde_json::json!({
                "chat_id": chat_id,
                "action": "typing",
            }))
            .send()
            .await
            .context("sending typing action")?
            .json()
            .await
            .context("parsing sendChatAction response")?;

        Ok(())
    }

    /// Download a file (e.g. a voice note) into `dir`
    pub async fn download(&self, file_id: &str, dir: &Path) -> Result<PathBuf> {
        let resp: ApiResponse<TgFile> = self
            .client
            .get(format!("{}getFile", self.base_url))
            .query(&[("file_id", file_id)])
            .send()
            .await
            .context("requesting Telegram file")?
            .json()
            .await
            .context("parsing getFile response")?;

        if !resp.ok {
            anyhow::bail!("getFile failed: {}", resp.description.unwrap_or_default());
        }
        let file = resp.result.context("no file in response")?;
        let remote = file.file_path.context("file has no download path")?;

        let bytes = self
            .client
            .get(format!("{}{}", self.file_url, remote))
            .send()
            .await
            .context("downloading Telegram file")?
            .error_for_status()?
            .bytes()
            .await?;

        let name = Path::new(&remote)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| format!("{}.oga", file.file_id));
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(name);
        tokio::fs::write(&path, &bytes).await?;
        Ok(path)
    }

    pub fn is_allowed(&self, user_id: i64) -> bool {
        self.allowed_users.is_empty() || self.allowed_users.contains(&user_id)
    }
}
