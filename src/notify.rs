use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::EnvSource;
use crate::error::ConfigError;

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

#[derive(Debug, Clone)]
pub struct TelegramTarget {
    pub api_base: String,
    pub bot_token: String,
    pub chat_id: String,
}

impl TelegramTarget {
    /// Token and chat id are required; a missing one is fatal before any
    /// network call is made.
    pub fn from_env(env: &dyn EnvSource) -> Result<Self, ConfigError> {
        let bot_token =
            env.non_empty("TELEGRAM_BOT_TOKEN").ok_or(ConfigError::MissingNotifierCredentials)?;
        let chat_id =
            env.non_empty("TELEGRAM_CHAT_ID").ok_or(ConfigError::MissingNotifierCredentials)?;
        let api_base = env
            .non_empty("TELEGRAM_API_BASE")
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        Ok(Self { api_base, bot_token, chat_id })
    }

    pub fn send_message_url(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base.trim_end_matches('/'), self.bot_token)
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct SendMessage<'a> {
    pub chat_id: &'a str,
    pub text: &'a str,
}

#[derive(Deserialize, Debug)]
struct Ack {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// How one delivery attempt ended. Never escalated to a process failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// the API answered with `ok: false` (or something unparsable)
    Rejected(String),
    /// no response at all
    NetworkError(String),
}

/// Read the `ok` flag from a raw API response body.
pub fn interpret_response(body: &str) -> Delivery {
    match serde_json::from_str::<Ack>(body) {
        Ok(ack) if ack.ok => Delivery::Delivered,
        Ok(ack) => Delivery::Rejected(ack.description.unwrap_or_else(|| "ok=false".to_string())),
        Err(e) => Delivery::Rejected(format!("unparsable response: {}", e)),
    }
}

/// POST `text` to the chat once. The raw response is logged; failures are
/// logged and returned, never retried.
pub fn send_text(target: &TelegramTarget, text: &str) -> Delivery {
    let agent: ureq::Agent = ureq::Agent::config_builder()
        .http_status_as_error(false)
        .build()
        .into();
    let payload = SendMessage { chat_id: &target.chat_id, text };

    let body = match agent.post(&target.send_message_url()).send_json(&payload) {
        Ok(mut resp) => match resp.body_mut().read_to_string() {
            Ok(body) => body,
            Err(e) => {
                tracing::error!("Telegram response could not be read: {}", e);
                return Delivery::NetworkError(e.to_string());
            }
        },
        Err(e) => {
            tracing::error!("Error sending request to Telegram: {}", e);
            return Delivery::NetworkError(e.to_string());
        }
    };

    tracing::info!("Telegram response: {}", body);
    let delivery = interpret_response(&body);
    if let Delivery::Rejected(reason) = &delivery {
        tracing::error!("Telegram message was not delivered: {}", reason);
    }
    delivery
}

/// Send the whole cumulative log file.
pub fn notify_from_log(target: &TelegramTarget, log_path: &Path) -> Result<Delivery> {
    let text = std::fs::read_to_string(log_path)
        .with_context(|| format!("cannot read {}", log_path.display()))?;
    Ok(send_text(target, &text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn missing_credentials_fatal() {
        let env: BTreeMap<String, String> =
            [("TELEGRAM_BOT_TOKEN".to_string(), "t".to_string())].into_iter().collect();
        assert!(matches!(
            TelegramTarget::from_env(&env),
            Err(ConfigError::MissingNotifierCredentials)
        ));
    }

    #[test]
    fn url_and_payload() {
        let target = TelegramTarget {
            api_base: "https://api.telegram.org/".into(),
            bot_token: "123:abc".into(),
            chat_id: "-100".into(),
        };
        assert_eq!(target.send_message_url(), "https://api.telegram.org/bot123:abc/sendMessage");
        let json = serde_json::to_value(SendMessage { chat_id: "-100", text: "hi\nthere" }).unwrap();
        assert_eq!(json, serde_json::json!({"chat_id": "-100", "text": "hi\nthere"}));
    }

    #[test]
    fn response_interpretation() {
        assert_eq!(interpret_response(r#"{"ok":true,"result":{}}"#), Delivery::Delivered);
        assert_eq!(
            interpret_response(r#"{"ok":false,"description":"Bad Request: chat not found"}"#),
            Delivery::Rejected("Bad Request: chat not found".into())
        );
        assert!(matches!(interpret_response("<html>"), Delivery::Rejected(_)));
    }

    #[test]
    fn unreachable_endpoint_is_logged_not_raised() {
        let target = TelegramTarget {
            api_base: "http://127.0.0.1:9".into(),
            bot_token: "t".into(),
            chat_id: "c".into(),
        };
        assert!(matches!(send_text(&target, "x"), Delivery::NetworkError(_)));
    }
}
