use anyhow::{bail, Context};
use reqwest::Response;
use serde::de::DeserializeOwned;
use serde::Serialize;

use tagwatch::dto::error::ErrorDto;

pub struct SimpleRest {
    client: reqwest::Client,
    base_url: String,
}

impl SimpleRest {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: String::from(base_url.trim_end_matches('/')),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub async fn get<Res>(&self, path: &str) -> anyhow::Result<Res>
        where Res: DeserializeOwned,
    {
        let res = self.client.get(self.url(path)).send().await
            .context("Error sending request")?;
        Self::parse(res).await
    }

    pub async fn post<Req, Res>(&self, path: &str, body: Option<Req>) -> anyhow::Result<Res>
        where
            Req: Serialize,
            Res: DeserializeOwned,
    {
        let res = self.send_post(path, body).await?;
        Self::parse(res).await
    }

    pub async fn post_no_content<Req>(&self, path: &str, body: Option<Req>) -> anyhow::Result<()>
        where Req: Serialize,
    {
        let res = self.send_post(path, body).await?;
        if !res.status().is_success() {
            bail!("Service invocation error - {}", Self::extract_error_message(res).await)
        }
        Ok(())
    }

    async fn send_post<Req: Serialize>(&self, path: &str, body: Option<Req>) -> anyhow::Result<Response> {
        let req = self.client.post(self.url(path));
        let req = match body {
            Some(body) => req.json(&body),
            None => req,
        };
        req.send().await.context("Error sending request")
    }

    async fn parse<Res: DeserializeOwned>(res: Response) -> anyhow::Result<Res> {
        if !res.status().is_success() {
            bail!("Service invocation error - {}", Self::extract_error_message(res).await)
        }
        let body = res.bytes().await.context("Error reading response body")?;
        let parsed_res = serde_json::from_slice(&body[..])?;
        Ok(parsed_res)
    }

    async fn extract_error_message(res: Response) -> String {
        let status = res.status();
        match res.bytes().await {
            Ok(body) => match serde_json::from_slice::<ErrorDto>(&body[..]) {
                Ok(err) => format!("{} - {}", err.code, err.message),
                Err(_) => format!("{status} - {}", String::from_utf8_lossy(&body[..])),
            },
            Err(err) => format!("{status} - error reading body: {err}"),
        }
    }
}
