use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use super::{ActionApi, ApiError};
use crate::world::direction::Direction;

const MOVE_MONSTER: &str = "crossover.dm.moveMonster";
const PERFORM_ABILITY: &str = "crossover.dm.performMonsterAbility";
const PERFORM_ATTACK: &str = "crossover.dm.performMonsterAttack";
const RESPAWN_MONSTERS: &str = "crossover.dm.respawnMonsters";

/// Game backend reached over its JSON-over-HTTP procedure endpoints.
pub struct HttpActionApi {
    host: String,
    token: String,
    http_client: reqwest::Client,
}

impl HttpActionApi {
    pub fn new(host: &str, token: String, timeout: Duration) -> Result<Self, ApiError> {
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(HttpActionApi {
            host: host.trim_end_matches('/').to_string(),
            token,
            http_client,
        })
    }

    fn url(&self, procedure: &str) -> String {
        format!("{}/trpc/{}", self.host, procedure)
    }

    async fn post(&self, procedure: &str, body: serde_json::Value) -> Result<(), ApiError> {
        let url = self.url(procedure);
        debug!(url = %url, body = %body, "POST");

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ApiError::Status {
                endpoint: procedure.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ActionApi for HttpActionApi {
    async fn move_monster(&self, monster: &str, path: &[Direction]) -> Result<(), ApiError> {
        self.post(MOVE_MONSTER, json!({ "entity": monster, "path": path }))
            .await
    }

    async fn perform_ability(
        &self,
        monster: &str,
        target: &str,
        ability: &str,
    ) -> Result<(), ApiError> {
        self.post(
            PERFORM_ABILITY,
            json!({ "entity": monster, "target": target, "ability": ability }),
        )
        .await
    }

    async fn perform_attack(&self, monster: &str, target: &str) -> Result<(), ApiError> {
        self.post(PERFORM_ATTACK, json!({ "entity": monster, "target": target }))
            .await
    }

    async fn respawn_monsters(&self) -> Result<(), ApiError> {
        self.post(RESPAWN_MONSTERS, json!({})).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Accept one request, reply with `status`, and return the raw request.
    async fn one_shot_server(status: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = stream.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                raw.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&raw);
                if let Some(end) = text.find("\r\n\r\n") {
                    let length = text[..end]
                        .lines()
                        .find_map(|l| {
                            l.to_ascii_lowercase()
                                .strip_prefix("content-length:")
                                .map(|v| v.trim().parse::<usize>().unwrap())
                        })
                        .unwrap_or(0);
                    if raw.len() >= end + 4 + length {
                        break;
                    }
                }
            }
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Length: 4\r\nConnection: close\r\n\r\nnope",
                status
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            String::from_utf8_lossy(&raw).to_string()
        });
        (format!("http://{}", addr), handle)
    }

    #[tokio::test]
    async fn move_posts_path_with_bearer_token() {
        let (host, server) = one_shot_server("200 OK").await;
        let api = HttpActionApi::new(&host, "secret".into(), Duration::from_secs(5)).unwrap();
        api.move_monster("monster_1", &[Direction::N, Direction::Se])
            .await
            .unwrap();

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /trpc/crossover.dm.moveMonster "));
        assert!(request.to_ascii_lowercase().contains("authorization: bearer secret"));
        let body = &request[request.find("\r\n\r\n").unwrap() + 4..];
        let body: serde_json::Value = serde_json::from_str(body).unwrap();
        assert_eq!(body["entity"], "monster_1");
        assert_eq!(body["path"], json!(["n", "se"]));
    }

    #[tokio::test]
    async fn non_success_status_is_error() {
        let (host, server) = one_shot_server("500 Internal Server Error").await;
        let api = HttpActionApi::new(&host, "secret".into(), Duration::from_secs(5)).unwrap();
        let err = api.perform_attack("monster_1", "p1").await.unwrap_err();
        server.await.unwrap();

        match err {
            ApiError::Status {
                endpoint, status, ..
            } => {
                assert_eq!(endpoint, PERFORM_ATTACK);
                assert_eq!(status, 500);
            }
            other => panic!("expected status error, got {}", other),
        }
    }

    #[tokio::test]
    async fn unreachable_host_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let api = HttpActionApi::new(
            &format!("http://{}", addr),
            "secret".into(),
            Duration::from_secs(2),
        )
        .unwrap();
        assert!(matches!(
            api.respawn_monsters().await,
            Err(ApiError::Transport(_))
        ));
    }

    #[test]
    fn trailing_slash_trimmed() {
        let api = HttpActionApi::new("http://game/", String::new(), Duration::from_secs(1)).unwrap();
        assert_eq!(api.url(RESPAWN_MONSTERS), "http://game/trpc/crossover.dm.respawnMonsters");
    }
}
