//! [`BackendClient`] — HTTP implementation of every collaborator.
//!
//! All five contracts are served by one interview backend:
//!
//! | Endpoint         | Body                                         | Response                                  |
//! |------------------|----------------------------------------------|-------------------------------------------|
//! | `POST /chat`     | `{message, history, role, question_count}`   | `{ai_message, audio_data, is_finished}`   |
//! | `POST /stt`      | multipart `file`                             | `{text}`                                  |
//! | `POST /hint`     | `{question, resume_text, role}`              | `{hint}`                                  |
//! | `POST /evaluate` | `{history}`                                  | `{score, feedback, summary}`              |
//! | `POST /simulate` | `{history, resume_text}`                     | `{answer}`                                |
//!
//! `audio_data` is base64-encoded MP3.  All connection details come from
//! [`BackendConfig`]; nothing is hardcoded.

use async_trait::async_trait;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::audio::AudioPayload;
use crate::config::BackendConfig;
use crate::conversation::ConversationMessage;

use super::collaborators::{
    CandidateSimulator, Evaluation, Evaluator, HintRequest, HintService, ServiceError,
    SimulationRequest, Transcriber, Utterance, UtteranceGenerator, UtteranceRequest,
};

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ChatResponse {
    ai_message: String,
    #[serde(default)]
    audio_data: String,
    #[serde(default)]
    is_finished: bool,
}

impl ChatResponse {
    fn into_utterance(self) -> Result<Utterance, ServiceError> {
        let audio = base64::engine::general_purpose::STANDARD
            .decode(self.audio_data.trim())
            .map_err(|e| ServiceError::Parse(format!("audio_data is not base64: {e}")))?;

        Ok(Utterance {
            text: self.ai_message,
            audio: AudioPayload::mp3(audio),
            is_final: self.is_finished,
        })
    }
}

#[derive(Debug, Deserialize)]
struct TranscriptResponse {
    text: String,
}

#[derive(Debug, Deserialize)]
struct HintResponse {
    hint: String,
}

#[derive(Debug, Deserialize)]
struct SimulationResponse {
    answer: String,
}

#[derive(Debug, Serialize)]
struct HistoryBody<'a> {
    history: &'a [ConversationMessage],
}

// ---------------------------------------------------------------------------
// BackendClient
// ---------------------------------------------------------------------------

/// Talks to the interview backend over HTTP.
///
/// Cheap to clone (`reqwest::Client` is reference-counted), so one instance
/// can be shared as every collaborator the session needs.
#[derive(Debug, Clone)]
pub struct BackendClient {
    client: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    /// Build a client from application config.
    ///
    /// The HTTP client is pre-configured with the per-request timeout from
    /// `config.timeout_secs`; a default client is used if the builder fails.
    pub fn from_config(config: &BackendConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn read<R: DeserializeOwned>(response: reqwest::Response) -> Result<R, ServiceError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Status {
                status: status.as_u16(),
                body,
            });
        }
        response
            .json::<R>()
            .await
            .map_err(|e| ServiceError::Parse(e.to_string()))
    }

    async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R, ServiceError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self.client.post(self.url(path)).json(body).send().await?;
        Self::read(response).await
    }
}

#[async_trait]
impl UtteranceGenerator for BackendClient {
    async fn next_utterance(&self, request: UtteranceRequest) -> Result<Utterance, ServiceError> {
        let body = serde_json::json!({
            "message":        "",
            "history":        request.history,
            "role":           request.role,
            "question_count": request.question_count,
        });

        let response: ChatResponse = self.post_json("chat", &body).await?;
        response.into_utterance()
    }
}

#[async_trait]
impl Transcriber for BackendClient {
    async fn transcribe(&self, audio: AudioPayload) -> Result<String, ServiceError> {
        let file_name = audio.file_name();
        let mime_type = audio.mime_type();

        let part = reqwest::multipart::Part::bytes(audio.into_bytes())
            .file_name(file_name)
            .mime_str(mime_type)?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(self.url("stt"))
            .multipart(form)
            .send()
            .await?;

        let transcript: TranscriptResponse = Self::read(response).await?;
        Ok(transcript.text.trim().to_string())
    }
}

#[async_trait]
impl HintService for BackendClient {
    async fn hint(&self, request: HintRequest) -> Result<String, ServiceError> {
        let body = serde_json::json!({
            "question":    request.question,
            "resume_text": request.resume_text,
            "role":        request.role,
        });

        let response: HintResponse = self.post_json("hint", &body).await?;
        Ok(response.hint)
    }
}

#[async_trait]
impl Evaluator for BackendClient {
    async fn evaluate(&self, history: Vec<ConversationMessage>) -> Result<Evaluation, ServiceError> {
        self.post_json("evaluate", &HistoryBody { history: &history })
            .await
    }
}

#[async_trait]
impl CandidateSimulator for BackendClient {
    async fn simulate(&self, request: SimulationRequest) -> Result<String, ServiceError> {
        let body = serde_json::json!({
            "history":     request.history,
            "resume_text": request.resume_text,
        });

        let response: SimulationResponse = self.post_json("simulate", &body).await?;
        Ok(response.answer.trim().to_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn make_config(base_url: &str) -> BackendConfig {
        BackendConfig {
            base_url: base_url.into(),
            timeout_secs: 5,
        }
    }

    #[test]
    fn url_joins_without_double_slash() {
        let client = BackendClient::from_config(&make_config("http://localhost:8000/"));
        assert_eq!(client.url("chat"), "http://localhost:8000/chat");
        assert_eq!(client.url("/stt"), "http://localhost:8000/stt");
    }

    /// One client must be usable as every collaborator trait object.
    #[test]
    fn client_is_every_collaborator() {
        let client = BackendClient::from_config(&make_config("http://localhost:8000"));
        let _: Arc<dyn UtteranceGenerator> = Arc::new(client.clone());
        let _: Arc<dyn Transcriber> = Arc::new(client.clone());
        let _: Arc<dyn HintService> = Arc::new(client.clone());
        let _: Arc<dyn Evaluator> = Arc::new(client.clone());
        let _: Arc<dyn CandidateSimulator> = Arc::new(client);
    }

    #[test]
    fn chat_response_decodes_audio_and_final_flag() {
        let json = r#"{"ai_message":"That concludes the interview.","audio_data":"SUQz","is_finished":true}"#;
        let response: ChatResponse = serde_json::from_str(json).unwrap();

        let utterance = response.into_utterance().unwrap();

        assert_eq!(utterance.text, "That concludes the interview.");
        assert_eq!(utterance.audio.bytes(), b"ID3");
        assert_eq!(utterance.audio.mime_type(), "audio/mpeg");
        assert!(utterance.is_final);
    }

    #[test]
    fn chat_response_without_flag_is_not_final() {
        let json = r#"{"ai_message":"Tell me about your last project.","audio_data":""}"#;
        let response: ChatResponse = serde_json::from_str(json).unwrap();

        let utterance = response.into_utterance().unwrap();

        assert!(!utterance.is_final);
        assert!(utterance.audio.is_empty());
    }

    #[test]
    fn chat_response_with_bad_audio_is_a_parse_error() {
        let json = r#"{"ai_message":"Hi","audio_data":"***","is_finished":false}"#;
        let response: ChatResponse = serde_json::from_str(json).unwrap();

        assert!(matches!(
            response.into_utterance(),
            Err(ServiceError::Parse(_))
        ));
    }

    #[test]
    fn evaluation_parses_backend_shape() {
        let json = r#"{"score":82,"feedback":"Clear answers.","summary":"Solid backend fundamentals."}"#;
        let evaluation: Evaluation = serde_json::from_str(json).unwrap();
        assert_eq!(evaluation.score, 82);
        assert_eq!(evaluation.summary, "Solid backend fundamentals.");
    }

    #[tokio::test]
    async fn unreachable_backend_is_a_request_error() {
        // Port 9 (discard) on localhost is not expected to run an HTTP server.
        let client = BackendClient::from_config(&make_config("http://127.0.0.1:9"));
        let result = client
            .hint(HintRequest {
                question: "Why Rust?".into(),
                resume_text: String::new(),
                role: "Backend developer".into(),
            })
            .await;

        assert!(matches!(
            result,
            Err(ServiceError::Request(_)) | Err(ServiceError::Timeout)
        ));
    }
}
