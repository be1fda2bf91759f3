use async_trait::async_trait;
use serde::Serialize;

use super::Mailer;
use crate::errors::CollectorError;

pub const POSTMARK_URL: &str = "https://api.postmarkapp.com/email";

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct PostmarkMessage<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text_body: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    html_body: Option<&'a str>,
    message_stream: &'a str,
}

/// Transactional mail through the Postmark HTTP API.
pub struct PostmarkMailer {
    client: reqwest::Client,
    token: String,
    from: String,
    to: String,
    message_stream: String,
    url: String,
}

impl PostmarkMailer {
    pub fn new(
        client: reqwest::Client,
        token: &str,
        from: &str,
        to: &str,
        message_stream: &str,
    ) -> Self {
        Self {
            client,
            token: token.to_string(),
            from: from.to_string(),
            to: to.to_string(),
            message_stream: message_stream.to_string(),
            url: POSTMARK_URL.to_string(),
        }
    }

    pub fn with_url(mut self, url: &str) -> Self {
        self.url = url.to_string();
        self
    }
}

#[async_trait]
impl Mailer for PostmarkMailer {
    async fn send(
        &self,
        subject: &str,
        text: &str,
        html: Option<&str>,
    ) -> Result<(), CollectorError> {
        let message = PostmarkMessage {
            from: &self.from,
            to: &self.to,
            subject,
            text_body: text,
            html_body: html,
            message_stream: &self.message_stream,
        };

        let response = self
            .client
            .post(&self.url)
            .header("Accept", "application/json")
            .header("X-Postmark-Server-Token", &self.token)
            .json(&message)
            .send()
            .await
            .map_err(|e| CollectorError::Notification(format!("Postmark request failed: {}", e)))?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            return Err(CollectorError::Notification(format!(
                "Postmark error {}: {}",
                status.as_u16(),
                snippet
            )));
        }

        tracing::info!("Sent '{}' to {}", subject, self.to);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};

    async fn spawn_mock(captured: Arc<Mutex<Vec<Value>>>) -> String {
        let app = Router::new().route(
            "/email",
            post(move |headers: HeaderMap, Json(body): Json<Value>| {
                let captured = captured.clone();
                async move {
                    let token = headers
                        .get("x-postmark-server-token")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("");
                    if token != "server-token" {
                        return Err((StatusCode::UNAUTHORIZED, "bad token".to_string()));
                    }
                    captured.lock().unwrap().push(body);
                    Ok(Json(json!({"ErrorCode": 0, "Message": "OK"})))
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });
        format!("http://{}/email", addr)
    }

    fn mailer(token: &str, url: &str) -> PostmarkMailer {
        PostmarkMailer::new(
            reqwest::Client::new(),
            token,
            "alerts@example.com",
            "me@example.com",
            "outbound",
        )
        .with_url(url)
    }

    #[tokio::test]
    async fn test_send_posts_message_fields() {
        let captured = Arc::new(Mutex::new(Vec::new()));
        let url = spawn_mock(captured.clone()).await;

        mailer("server-token", &url)
            .send("Hello", "plain body", None)
            .await
            .expect("send");

        let bodies = captured.lock().unwrap();
        assert_eq!(bodies.len(), 1);
        assert_eq!(bodies[0]["From"], "alerts@example.com");
        assert_eq!(bodies[0]["To"], "me@example.com");
        assert_eq!(bodies[0]["Subject"], "Hello");
        assert_eq!(bodies[0]["TextBody"], "plain body");
        assert_eq!(bodies[0]["MessageStream"], "outbound");
        assert!(bodies[0].get("HtmlBody").is_none());
    }

    #[tokio::test]
    async fn test_rejected_send_is_notification_error() {
        let url = spawn_mock(Arc::new(Mutex::new(Vec::new()))).await;
        let err = mailer("wrong", &url)
            .send("Hello", "body", Some("<p>body</p>"))
            .await
            .unwrap_err();
        match err {
            CollectorError::Notification(msg) => assert!(msg.contains("401")),
            other => panic!("Expected Notification, got: {:?}", other),
        }
    }
}
