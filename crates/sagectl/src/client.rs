//! HTTP client for saged
//!
//! Progress routes need the caller's verified id. In production a proxy sets
//! it; sagectl talks to a local daemon and sets the header itself.

use std::time::Duration;

use anyhow::Result;
use reqwest::{Client, RequestBuilder, Response};
use sage_common::{
    ErrorBody, HealthResponse, LeaderboardEntry, LedgerView, PathUpdate, ProgressUpdate,
    PuzzleAttempt, PuzzleSubmission, SubmissionResult, Timeframe, TopicProgress, TopicSummary,
};
use serde::de::DeserializeOwned;

use crate::errors::ClientError;

const USER_HEADER: &str = "x-verified-user";
const TIMEOUT: Duration = Duration::from_secs(10);

pub struct SageClient {
    base: String,
    user: Option<String>,
    http: Client,
}

impl SageClient {
    pub fn new(base: &str, user: Option<String>) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("sagectl/", env!("CARGO_PKG_VERSION")))
            .timeout(TIMEOUT)
            .build()?;
        Ok(Self {
            base: base.trim_end_matches('/').to_string(),
            user: user.filter(|u| !u.trim().is_empty()),
            http,
        })
    }

    pub fn has_user(&self) -> bool {
        self.user.is_some()
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    fn authed(&self, req: RequestBuilder) -> Result<RequestBuilder, ClientError> {
        let user = self.user.as_deref().ok_or(ClientError::MissingUser)?;
        Ok(req.header(USER_HEADER, user))
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T> {
        let resp = req.send().await.map_err(|source| ClientError::Unreachable {
            url: self.base.clone(),
            source,
        })?;
        Ok(decode(resp).await?)
    }

    pub async fn health(&self) -> Result<HealthResponse> {
        self.send(self.http.get(self.url("/v1/health"))).await
    }

    pub async fn topics(
        &self,
        category: Option<&str>,
        difficulty: Option<&str>,
    ) -> Result<Vec<TopicSummary>> {
        let mut query = Vec::new();
        if let Some(c) = category {
            query.push(("category", c));
        }
        if let Some(d) = difficulty {
            query.push(("difficulty", d));
        }
        self.send(self.http.get(self.url("/v1/topics")).query(&query))
            .await
    }

    pub async fn topic_progress(&self, topic: &str) -> Result<TopicProgress> {
        let req = self.http.get(self.url(&format!("/v1/progress/{}", topic)));
        self.send(self.authed(req)?).await
    }

    pub async fn user_progress(&self) -> Result<LedgerView> {
        let req = self.http.get(self.url("/v1/progress"));
        self.send(self.authed(req)?).await
    }

    pub async fn update_path(
        &self,
        topic: &str,
        path: &str,
        update: &PathUpdate,
    ) -> Result<ProgressUpdate> {
        let url = self.url(&format!("/v1/progress/{}/paths/{}", topic, path));
        let req = self.http.post(url).json(update);
        self.send(self.authed(req)?).await
    }

    pub async fn submit(
        &self,
        topic: &str,
        path: &str,
        submission: &PuzzleSubmission,
    ) -> Result<SubmissionResult> {
        let url = self.url(&format!("/v1/progress/{}/paths/{}/attempts", topic, path));
        let req = self.http.post(url).json(submission);
        self.send(self.authed(req)?).await
    }

    pub async fn leaderboard(
        &self,
        limit: Option<usize>,
        timeframe: Timeframe,
    ) -> Result<Vec<LeaderboardEntry>> {
        let mut query = vec![("timeframe", timeframe.to_string())];
        if let Some(limit) = limit {
            query.push(("limit", limit.to_string()));
        }
        self.send(self.http.get(self.url("/v1/leaderboard")).query(&query))
            .await
    }

    pub async fn history(&self) -> Result<Vec<PuzzleAttempt>> {
        let req = self.http.get(self.url("/v1/attempts"));
        self.send(self.authed(req)?).await
    }
}

async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, ClientError> {
    let status = resp.status();
    let bytes = resp
        .bytes()
        .await
        .map_err(|e| ClientError::InvalidResponse(e.to_string()))?;

    if !status.is_success() {
        let message = serde_json::from_slice::<ErrorBody>(&bytes)
            .map(|b| b.error)
            .unwrap_or_else(|_| String::from_utf8_lossy(&bytes).trim().to_string());
        return Err(ClientError::Api { status, message });
    }

    serde_json::from_slice(&bytes).map_err(|e| ClientError::InvalidResponse(e.to_string()))
}
