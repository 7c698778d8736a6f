//! API client for the KIS condition search endpoint.
//!
//! This module provides the `KisClient` struct, which makes sure the
//! session holds a valid token before every call and turns the
//! endpoint's `rt_cd`/`output2` envelope into a [`ScreenResult`].

use reqwest::header::{self, HeaderMap, HeaderValue};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::auth::SessionManager;
use crate::config::{ClientConfig, Environment};
use crate::models::ScreenResult;

use super::ApiError;

const SCREEN_RESULT_PATH: &str = "/uapi/domestic-stock/v1/quotations/psearch-result";

/// Query parameter carrying the HTS login id
const PARAM_USER_ID: &str = "user_id";
/// Query parameter carrying the saved condition's sequence key
const PARAM_SEQ: &str = "seq";

/// Individual (as opposed to corporate) customer
const CUSTOMER_TYPE: &str = "P";

/// `rt_cd` value for a successful business call
const RT_CD_SUCCESS: &str = "0";

#[derive(Debug, Deserialize)]
struct ScreenResponse {
    rt_cd: String,
    #[serde(default)]
    msg1: Option<String>,
    #[serde(default)]
    output2: Option<Vec<ScreenItem>>,
}

#[derive(Debug, Deserialize)]
struct ScreenItem {
    code: String,
}

/// Check if response is successful, returning an error with body if not.
pub(crate) async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    if response.status().is_success() {
        Ok(response)
    } else {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(ApiError::from_status(status, &body))
    }
}

/// Client for KIS condition searches.
pub struct KisClient {
    session: SessionManager,
}

impl KisClient {
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        Ok(Self {
            session: SessionManager::new(config)?,
        })
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut SessionManager {
        &mut self.session
    }

    pub fn environment(&self) -> Environment {
        self.session.environment()
    }

    /// Fetch the stock codes matching a condition saved in HTS/MTS.
    ///
    /// Only a failed token renewal is returned as an error. Transport
    /// failures, HTTP errors, non-success `rt_cd` values and malformed
    /// bodies are logged and produce an empty result.
    pub async fn fetch_screen(&mut self, condition: &str) -> Result<ScreenResult, ApiError> {
        match self.try_fetch_screen(condition).await {
            Ok(result) => Ok(result),
            Err(e) if e.is_renewal() => Err(e),
            Err(e) => {
                warn!(condition = condition, error = %e, "Condition search failed");
                Ok(ScreenResult::empty())
            }
        }
    }

    /// Like [`fetch_screen`](Self::fetch_screen) but returns every failure
    /// so callers can tell "no matches" from "call failed".
    pub async fn try_fetch_screen(&mut self, condition: &str) -> Result<ScreenResult, ApiError> {
        self.session.ensure_valid().await?;

        let config = self.session.config();
        let url = format!("{}{}", config.base_url(), SCREEN_RESULT_PATH);
        let headers = self.screen_headers()?;

        debug!(condition = condition, tr_id = config.screen_tr_id(), "Calling condition search");

        let response = self
            .session
            .http()
            .get(&url)
            .headers(headers)
            .query(&[
                (PARAM_USER_ID, config.hts_user_id.as_str()),
                (PARAM_SEQ, condition),
            ])
            .send()
            .await?;
        let response = check_response(response).await?;

        let text = response.text().await?;
        let codes = parse_screen_response(&text)?;

        info!(condition = condition, count = codes.len(), "Condition search succeeded");
        Ok(codes)
    }

    fn screen_headers(&self) -> Result<HeaderMap, ApiError> {
        let config = self.session.config();
        let token = self
            .session
            .token()
            .ok_or_else(|| ApiError::renewal(ApiError::Unauthorized))?;

        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json; charset=utf-8"),
        );
        headers.insert(header::AUTHORIZATION, header_value(&format!("Bearer {}", token))?);
        headers.insert("appkey", header_value(&config.app_key)?);
        headers.insert("appsecret", header_value(&config.app_secret)?);
        headers.insert("tr_id", header_value(config.screen_tr_id())?);
        headers.insert("custtype", HeaderValue::from_static(CUSTOMER_TYPE));
        Ok(headers)
    }
}

fn header_value(value: &str) -> Result<HeaderValue, ApiError> {
    HeaderValue::from_str(value)
        .map_err(|e| ApiError::Config(format!("value is not a valid HTTP header: {}", e)))
}

fn parse_screen_response(text: &str) -> Result<ScreenResult, ApiError> {
    let parsed: ScreenResponse = serde_json::from_str(text)
        .map_err(|e| ApiError::InvalidResponse(format!("condition search response: {}", e)))?;

    if parsed.rt_cd != RT_CD_SUCCESS {
        return Err(ApiError::BusinessStatus {
            code: parsed.rt_cd,
            message: parsed.msg1.unwrap_or_default(),
        });
    }

    Ok(parsed
        .output2
        .unwrap_or_default()
        .into_iter()
        .map(|item| item.code)
        .collect::<Vec<_>>()
        .into())
}
