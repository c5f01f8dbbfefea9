// src/session/http_api.rs

use async_trait::async_trait;

use crate::{
    error::ApiError,
    models::attempt::{AnswerRecord, Attempt, SubmitAttemptRequest},
    session::ports::ExamApi,
};

/// [`ExamApi`] over the attempt service's HTTP routes.
#[derive(Debug, Clone)]
pub struct HttpExamApi {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpExamApi {
    /// `base_url` without trailing slash, e.g. "http://127.0.0.1:3000".
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn attempts_url(&self, exam_id: i64) -> String {
        format!("{}/api/exams/{}/attempts", self.base_url, exam_id)
    }
}

/// Turns a non-success response into `ApiError::Rejected` with the server's
/// `{ "error": ... }` message when there is one.
async fn check(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response
        .json::<serde_json::Value>()
        .await
        .ok()
        .and_then(|body| body["error"].as_str().map(str::to_string))
        .unwrap_or_else(|| status.to_string());
    Err(ApiError::Rejected {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl ExamApi for HttpExamApi {
    async fn start_attempt(&self, exam_id: i64) -> Result<Attempt, ApiError> {
        let response = self
            .client
            .post(self.attempts_url(exam_id))
            .bearer_auth(&self.token)
            .send()
            .await?;
        let attempt = check(response).await?.json::<Attempt>().await?;
        Ok(attempt)
    }

    async fn submit_attempt(&self, exam_id: i64, answers: Vec<AnswerRecord>) -> Result<(), ApiError> {
        let response = self
            .client
            .post(format!("{}/submit", self.attempts_url(exam_id)))
            .bearer_auth(&self.token)
            .json(&SubmitAttemptRequest { answers })
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls_ignore_trailing_slash() {
        let api = HttpExamApi::new("http://localhost:3000/", "token");
        assert_eq!(api.attempts_url(12), "http://localhost:3000/api/exams/12/attempts");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_network_error() {
        let api = HttpExamApi::new("http://127.0.0.1:9", "token");
        let err = api.start_attempt(1).await.unwrap_err();
        assert!(matches!(err, ApiError::Network(_)));
    }
}
