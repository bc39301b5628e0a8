// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Client for the remote derived-chart computation.
//!
//! The endpoint is a callable function: the request wraps its arguments in
//! `data`, the response wraps the chart in `result`. The chart payload is
//! opaque to this client.

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::{BirthProfile, DerivedChart};
use chrono::Utc;
use serde::Deserialize;

#[derive(Clone)]
pub struct ChartClient {
    http: reqwest::Client,
    endpoint_url: String,
}

impl ChartClient {
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint_url: config.chart_function_url.clone(),
        }
    }

    /// Compute the derived chart for a birth profile.
    pub async fn compute(&self, user_id: &str, birth: &BirthProfile) -> Result<DerivedChart> {
        let body = serde_json::json!({
            "data": {
                "userId": user_id,
                "name": birth.name,
                "year": birth.year,
                "month": birth.month,
                "day": birth.day,
                "hour": birth.hour,
                "minute": birth.minute,
                "isLunar": birth.lunar,
                "gender": birth.gender,
            }
        });

        let response = self
            .http
            .post(&self.endpoint_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::NetworkError(format!("Chart request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::NetworkError(format!(
                "Chart computation failed: HTTP {}: {}",
                status, body
            )));
        }

        let parsed: CallableResponse = response
            .json()
            .await
            .map_err(|e| AppError::NetworkError(format!("JSON parse error: {}", e)))?;

        let payload = parsed.result.ok_or_else(|| {
            AppError::NetworkError("No result in chart response".to_string())
        })?;

        tracing::info!(user_id, "Derived chart computed");
        Ok(DerivedChart {
            payload,
            computed_at: Utc::now(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct CallableResponse {
    result: Option<serde_json::Value>,
}
