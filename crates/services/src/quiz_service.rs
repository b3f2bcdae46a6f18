use async_trait::async_trait;
use lingua_core::model::{QuestionDraft, QuizQuestion, TenseDefinition};
use rand::seq::SliceRandom;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::QuizConfig;
use crate::error::QuizError;

const JSON_SYSTEM_PROMPT: &str = "You are a helpful assistant that outputs JSON.";

/// Produces one multiple-choice question for a tense.
#[async_trait]
pub trait QuestionGenerator: Send + Sync {
    /// # Errors
    ///
    /// Returns `QuizError` when the generator is unavailable or its output
    /// is not a valid question.
    async fn generate(&self, tense: &TenseDefinition) -> Result<QuizQuestion, QuizError>;
}

/// Chat-completion backed question generator and tense explainer.
#[derive(Clone)]
pub struct QuizService {
    client: Client,
    config: Option<QuizConfig>,
}

impl QuizService {
    #[must_use]
    pub fn new(config: Option<QuizConfig>) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.config.is_some()
    }

    /// Markdown explanation of a tense: usage, sentence patterns, signal
    /// words and two examples.
    ///
    /// # Errors
    ///
    /// Returns `QuizError` when the service is disabled, the request fails,
    /// or the response is empty.
    pub async fn explain(&self, tense: &TenseDefinition) -> Result<String, QuizError> {
        let prompt = format!(
            "請用繁體中文詳細解釋英語時態：「{name}」。\n\
             內容必須包含：\n\
             1. 核心定義（什麼時候使用這個時態）。\n\
             2. 句型公式（肯定句、否定句、疑問句）。\n\
             3. 常見的時間副詞關鍵字（例如: already, since, yet...）。\n\
             4. 2個實用的例句與翻譯。\n\
             請使用 Markdown 格式輸出，讓層級清晰易讀。",
            name = tense.english_name
        );
        self.complete(vec![ChatMessage::user(prompt)], None).await
    }

    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        response_format: Option<ResponseFormat>,
    ) -> Result<String, QuizError> {
        let config = self.config.as_ref().ok_or(QuizError::Disabled)?;

        let url = format!("{}/chat/completions", config.base_url.trim_end_matches('/'));
        let payload = ChatRequest {
            model: config.model.clone(),
            messages,
            response_format,
        };

        let response = self
            .client
            .post(url)
            .bearer_auth(&config.api_key)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            warn!(status = %response.status(), model = %config.model, "chat completion failed");
            return Err(QuizError::HttpStatus(response.status()));
        }

        let body: ChatResponse = response.json().await?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or(QuizError::EmptyResponse)?;

        Ok(content)
    }
}

#[async_trait]
impl QuestionGenerator for QuizService {
    async fn generate(&self, tense: &TenseDefinition) -> Result<QuizQuestion, QuizError> {
        let messages = vec![
            ChatMessage::system(JSON_SYSTEM_PROMPT),
            ChatMessage::user(question_prompt(tense.english_name)),
        ];
        let content = self
            .complete(messages, Some(ResponseFormat::json_object()))
            .await?;

        let mut question = parse_question(&content, tense)?;
        question.options.shuffle(&mut rand::rng());
        debug!(tense_id = %tense.id, question_id = %question.id, "quiz question generated");
        Ok(question)
    }
}

fn question_prompt(tense_name: &str) -> String {
    format!(
        "你是一位專業的英語語法老師。請為「{tense_name}」這個時態設計一道高品質的單選練習題。\n\n\
         任務要求：\n\
         1. 句子內容：設計一個具有真實生活情境（如職場、旅行、社交）的英文句子。\n\
         2. 空白標記：將動詞部分挖空，使用 \"_____\" 表示。\n\
         3. 選項設計：\n\
            - 提供 4 個選項。\n\
            - 1 個正確答案（必須嚴格符合 {tense_name} 的語法規則）。\n\
            - 3 個具有干擾性的錯誤選項。干擾項應包括：該動詞的其他時態形式、常見的拼寫錯誤或主詞動詞不一致的情況。\n\
         4. 翻譯：提供該正確句子的精準繁體中文翻譯。\n\
         5. 難度：適中，適合中級英語學習者。\n\n\
         請嚴格依照 JSON 格式回傳，格式如下：\n\
         {{\n\
           \"sentence\": \"包含空白處的英文句子\",\n\
           \"correctAnswer\": \"正確的動詞形式\",\n\
           \"options\": [\"選項1\", \"選項2\", \"選項3\", \"選項4\"],\n\
           \"translation\": \"句子的繁體中文翻譯\"\n\
         }}"
    )
}

/// Decode a model reply into a validated question.
///
/// Replies wrapped in a Markdown code fence are accepted.
pub(crate) fn parse_question(content: &str, tense: &TenseDefinition) -> Result<QuizQuestion, QuizError> {
    let trimmed = content.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed);
    let draft: QuestionDraft = serde_json::from_str(body.trim())?;
    Ok(draft.validate(tense.id.clone())?)
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

impl ChatMessage {
    fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: content.into(),
        }
    }

    fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

impl ResponseFormat {
    fn json_object() -> Self {
        Self {
            kind: "json_object",
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use lingua_core::TenseCatalog;
    use lingua_core::model::TenseId;

    fn tense() -> &'static TenseDefinition {
        TenseCatalog::builtin()
            .get(&TenseId::new("pres_perf"))
            .unwrap()
    }

    const REPLY: &str = r#"{"sentence":"She _____ three countries this year.",
        "correctAnswer":"has visited",
        "options":["has visited","visited","have visited","has visit"],
        "translation":"她今年已經去過三個國家。"}"#;

    #[test]
    fn parses_plain_json_reply() {
        let question = parse_question(REPLY, tense()).unwrap();
        assert_eq!(question.tense_id.as_str(), "pres_perf");
        assert!(question.is_correct("has visited"));
    }

    #[test]
    fn parses_fenced_reply() {
        let fenced = format!("```json\n{REPLY}\n```");
        assert!(parse_question(&fenced, tense()).is_ok());
    }

    #[test]
    fn reports_malformed_reply() {
        assert!(matches!(
            parse_question("not json", tense()),
            Err(QuizError::Malformed(_))
        ));
        let no_blank = REPLY.replace("_____", "has visited");
        assert!(matches!(
            parse_question(&no_blank, tense()),
            Err(QuizError::InvalidQuestion(_))
        ));
    }

    #[tokio::test]
    async fn disabled_service_refuses_requests() {
        let service = QuizService::new(None);
        assert!(!service.enabled());
        assert!(matches!(
            service.generate(tense()).await,
            Err(QuizError::Disabled)
        ));
        assert!(matches!(
            service.explain(tense()).await,
            Err(QuizError::Disabled)
        ));
    }

    #[test]
    fn request_serializes_json_mode() {
        let payload = ChatRequest {
            model: "m".into(),
            messages: vec![ChatMessage::system(JSON_SYSTEM_PROMPT)],
            response_format: Some(ResponseFormat::json_object()),
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["response_format"]["type"], "json_object");
        assert_eq!(json["messages"][0]["role"], "system");
    }
}
