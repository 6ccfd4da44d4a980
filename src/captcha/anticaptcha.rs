//! Anti-Captcha client for hCaptcha challenges.

use crate::captcha::{CaptchaSolver, Challenge};
use crate::core::error::{AppError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const API_BASE_URL: &str = "https://api.anti-captcha.com";
const TASK_TYPE: &str = "HCaptchaTaskProxyless";
const FIRST_POLL_DELAY: Duration = Duration::from_secs(5);
const POLL_INTERVAL: Duration = Duration::from_secs(3);
const MAX_POLLS: u32 = 100;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateTaskRequest<'a> {
    client_key: &'a str,
    task: HCaptchaTask<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HCaptchaTask<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    #[serde(rename = "websiteURL")]
    website_url: &'a str,
    website_key: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TaskResultRequest<'a> {
    client_key: &'a str,
    task_id: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiResponse {
    #[serde(default)]
    error_id: i64,
    error_code: Option<String>,
    error_description: Option<String>,
    task_id: Option<u64>,
    status: Option<String>,
    solution: Option<Solution>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Solution {
    g_recaptcha_response: Option<String>,
}

#[derive(Debug, PartialEq, Eq)]
enum TaskStatus {
    Processing,
    Ready(String),
}

fn check_error(response: &ApiResponse) -> Result<()> {
    if response.error_id == 0 {
        return Ok(());
    }
    Err(AppError::CaptchaSolve(format!(
        "Anti-Captcha error {}: {}",
        response.error_code.as_deref().unwrap_or("UNKNOWN"),
        response.error_description.as_deref().unwrap_or("no description"),
    )))
}

fn parse_created_task(response: &ApiResponse) -> Result<u64> {
    check_error(response)?;
    response
        .task_id
        .ok_or_else(|| AppError::CaptchaSolve("createTask returned no taskId".to_string()))
}

fn parse_task_result(response: &ApiResponse) -> Result<TaskStatus> {
    check_error(response)?;
    match response.status.as_deref() {
        Some("ready") => {
            let token = response
                .solution
                .as_ref()
                .and_then(|s| s.g_recaptcha_response.clone())
                .unwrap_or_default();
            if token.is_empty() {
                Err(AppError::CaptchaSolve(
                    "task is ready but carries no token".to_string(),
                ))
            } else {
                Ok(TaskStatus::Ready(token))
            }
        }
        _ => Ok(TaskStatus::Processing),
    }
}

pub struct AntiCaptchaClient {
    api_key: String,
    client: Client,
}

impl AntiCaptchaClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::Initialization(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self {
            api_key: api_key.into(),
            client,
        })
    }

    async fn call<T: Serialize + ?Sized>(&self, method: &str, body: &T) -> Result<ApiResponse> {
        let response = self
            .client
            .post(format!("{}/{}", API_BASE_URL, method))
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::CaptchaSolve(format!(
                "{} returned HTTP {}: {}",
                method, status, text
            )));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl CaptchaSolver for AntiCaptchaClient {
    async fn solve(&self, challenge: &Challenge) -> Result<String> {
        tracing::info!(
            target: "captcha",
            "Submitting the job to Anti-Captcha and waiting for the result..."
        );
        let created = self
            .call(
                "createTask",
                &CreateTaskRequest {
                    client_key: &self.api_key,
                    task: HCaptchaTask {
                        kind: TASK_TYPE,
                        website_url: &challenge.website_url,
                        website_key: &challenge.site_key,
                    },
                },
            )
            .await?;
        let task_id = parse_created_task(&created)?;
        tracing::debug!(target: "captcha", "Anti-Captcha task {} created", task_id);

        tokio::time::sleep(FIRST_POLL_DELAY).await;
        for poll in 1..=MAX_POLLS {
            let result = self
                .call(
                    "getTaskResult",
                    &TaskResultRequest {
                        client_key: &self.api_key,
                        task_id,
                    },
                )
                .await?;
            match parse_task_result(&result)? {
                TaskStatus::Ready(token) => return Ok(token),
                TaskStatus::Processing => {
                    tracing::debug!(
                        target: "captcha",
                        "Task {} still processing (poll {})",
                        task_id,
                        poll
                    );
                    tokio::time::sleep(POLL_INTERVAL).await;
                }
            }
        }

        Err(AppError::CaptchaSolve(format!(
            "task {} not solved after {} polls",
            task_id, MAX_POLLS
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(value: serde_json::Value) -> ApiResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_create_task_body_shape() {
        let body = serde_json::to_value(CreateTaskRequest {
            client_key: "key",
            task: HCaptchaTask {
                kind: TASK_TYPE,
                website_url: "https://visa.example.org/",
                website_key: "site-key",
            },
        })
        .unwrap();
        assert_eq!(
            body,
            json!({
                "clientKey": "key",
                "task": {
                    "type": "HCaptchaTaskProxyless",
                    "websiteURL": "https://visa.example.org/",
                    "websiteKey": "site-key"
                }
            })
        );
    }

    #[test]
    fn test_created_task_id() {
        assert_eq!(
            parse_created_task(&response(json!({"errorId": 0, "taskId": 7654321}))).unwrap(),
            7654321
        );
        let err = parse_created_task(&response(json!({
            "errorId": 1,
            "errorCode": "ERROR_KEY_DOES_NOT_EXIST",
            "errorDescription": "Account authorization key not found in the system"
        })))
        .unwrap_err();
        assert!(err.to_string().contains("ERROR_KEY_DOES_NOT_EXIST"));
    }

    #[test]
    fn test_task_result_states() {
        assert_eq!(
            parse_task_result(&response(json!({"errorId": 0, "status": "processing"}))).unwrap(),
            TaskStatus::Processing
        );
        assert_eq!(
            parse_task_result(&response(json!({
                "errorId": 0,
                "status": "ready",
                "solution": {"gRecaptchaResponse": "P0_eyJ0eXAi"}
            })))
            .unwrap(),
            TaskStatus::Ready("P0_eyJ0eXAi".to_string())
        );
    }

    #[test]
    fn test_ready_without_token_fails() {
        let err = parse_task_result(&response(json!({
            "errorId": 0,
            "status": "ready",
            "solution": {"gRecaptchaResponse": ""}
        })))
        .unwrap_err();
        assert!(matches!(err, AppError::CaptchaSolve(_)));
    }
}
