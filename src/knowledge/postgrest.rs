// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Supabase `knowledge_embeddings` table over the PostgREST API

use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use super::{KnowledgeEntry, KnowledgeError, KnowledgeMatch, KnowledgeStore, SearchOptions, SourceType};
use crate::config::KnowledgeStoreConfig;

const TABLE: &str = "knowledge_embeddings";
const SEARCH_RPC: &str = "search_knowledge_embeddings";

pub struct PostgrestKnowledgeStore {
    base_url: String,
    service_key: String,
    client: reqwest::Client,
}

impl PostgrestKnowledgeStore {
    pub fn new(config: &KnowledgeStoreConfig) -> Result<Self, KnowledgeError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            service_key: config.service_key.clone(),
            client,
        })
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, TABLE)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }

    fn rpc_url(&self, function: &str) -> String {
        format!("{}/rest/v1/rpc/{}", self.base_url, function)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, KnowledgeError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(KnowledgeError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl KnowledgeStore for PostgrestKnowledgeStore {
    async fn upsert(&self, entry: &KnowledgeEntry, embedding: &[f32]) -> Result<(), KnowledgeError> {
        let row = json!({
            "source_type": entry.source_type,
            "source_id": entry.source_id,
            "content": entry.content,
            "metadata": entry.metadata,
            "embedding": embedding,
            "updated_at": chrono::Utc::now().to_rfc3339(),
        });

        debug!(
            source_type = %entry.source_type,
            source_id = %entry.source_id,
            dimensions = embedding.len(),
            "upserting knowledge embedding"
        );

        let response = self
            .authorized(self.client.post(self.table_url()))
            .query(&[("on_conflict", "source_type,source_id")])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&row)
            .send()
            .await?;

        Self::check(response).await?;
        Ok(())
    }

    async fn delete(&self, source_type: SourceType, source_id: &str) -> Result<(), KnowledgeError> {
        let response = self
            .authorized(self.client.delete(self.table_url()))
            .query(&[
                ("source_type", format!("eq.{}", source_type)),
                ("source_id", format!("eq.{}", source_id)),
            ])
            .send()
            .await?;

        Self::check(response).await?;
        Ok(())
    }

    async fn search(
        &self,
        query_embedding: &[f32],
        options: &SearchOptions,
    ) -> Result<Vec<KnowledgeMatch>, KnowledgeError> {
        let params = json!({
            "query_embedding": query_embedding,
            "match_threshold": options.threshold,
            "match_count": options.limit,
            "filter_source_types": options.source_types,
        });

        let response = self
            .authorized(self.client.post(self.rpc_url(SEARCH_RPC)))
            .json(&params)
            .send()
            .await?;

        let matches: Option<Vec<KnowledgeMatch>> = Self::check(response).await?.json().await?;
        let matches = matches.unwrap_or_default();
        debug!(results = matches.len(), "knowledge search complete");
        Ok(matches)
    }
}
