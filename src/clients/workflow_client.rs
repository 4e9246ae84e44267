//! 工作流 API 客户端
//!
//! 封装场景存储代理（`/s3/*`）与工作流任务（`/workflows/*`）的 HTTP 调用

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::api::{
    BBoxExportRequest, DirectoryListing, DownloadLink, JobCreated, JobRequest, ObjectContent,
    PresignedUrl, SceneList, Statistics,
};

/// 工作流服务能力
///
/// 编排层只依赖这个 trait，测试中用内存实现替换
#[async_trait]
pub trait WorkflowApi: Send + Sync {
    /// 列出所有场景前缀
    async fn list_scenes(&self) -> AppResult<SceneList>;

    /// 列出某个前缀下一层的对象与子目录
    async fn list_directory(&self, prefix: &str) -> AppResult<DirectoryListing>;

    /// 通过读取代理获取对象内容
    async fn read_object(&self, key: &str) -> AppResult<ObjectContent>;

    /// 获取对象的预签名地址
    async fn presign(&self, key: &str) -> AppResult<String>;

    /// 提交任务，返回远程分配的任务ID
    async fn create_job(&self, request: &JobRequest) -> AppResult<String>;

    /// 任务存在性检查，未就绪时返回 404
    async fn check_job(&self, job_id: &str) -> AppResult<()>;

    /// 获取统计信息
    async fn fetch_statistics(&self, statistics_url: &str) -> AppResult<Statistics>;

    /// 获取整幅结果的下载地址
    async fn download_url(&self, job_id: &str) -> AppResult<String>;

    /// 按范围导出结果，返回二进制内容
    async fn export_bbox(&self, job_id: &str, request: &BBoxExportRequest) -> AppResult<Vec<u8>>;
}

/// 基于 reqwest 的工作流客户端
pub struct WorkflowClient {
    http: Client,
    base_url: String,
}

impl WorkflowClient {
    /// 创建新的工作流客户端
    pub fn new(config: &Config) -> Self {
        Self {
            http: Client::new(),
            base_url: config.workflow_api_base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        url: &str,
        query: &[(&str, &str)],
    ) -> AppResult<T> {
        debug!("GET {} {:?}", url, query);
        let response = self
            .http
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| AppError::api_request_failed(endpoint, e))?;
        let response = ensure_success(endpoint, response).await?;
        Ok(response.json::<T>().await?)
    }
}

/// 非 2xx 响应转换为 `BadStatus`，尽量带上服务端的 `message` / `detail`
async fn ensure_success(endpoint: &str, response: Response) -> AppResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<JsonValue>(&body).ok().and_then(|v| {
        ["message", "detail"]
            .iter()
            .find_map(|k| v.get(*k).and_then(|m| m.as_str()).map(str::to_string))
    });

    Err(AppError::bad_status(endpoint, status.as_u16(), message))
}

#[async_trait]
impl WorkflowApi for WorkflowClient {
    async fn list_scenes(&self) -> AppResult<SceneList> {
        self.get_json("/s3/root", &self.url("/s3/root"), &[]).await
    }

    async fn list_directory(&self, prefix: &str) -> AppResult<DirectoryListing> {
        self.get_json("/s3/list", &self.url("/s3/list"), &[("prefix", prefix)])
            .await
    }

    async fn read_object(&self, key: &str) -> AppResult<ObjectContent> {
        self.get_json("/s3/read", &self.url("/s3/read"), &[("key", key)])
            .await
    }

    async fn presign(&self, key: &str) -> AppResult<String> {
        let presigned: PresignedUrl = self
            .get_json("/s3/presign", &self.url("/s3/presign"), &[("key", key)])
            .await?;
        presigned
            .url
            .filter(|u| !u.is_empty())
            .ok_or_else(|| AppError::missing_field("/s3/presign", "url"))
    }

    async fn create_job(&self, request: &JobRequest) -> AppResult<String> {
        let endpoint = "/workflows";
        debug!("提交任务: {}", serde_json::to_string(request)?);
        let response = self
            .http
            .post(self.url(endpoint))
            .json(request)
            .send()
            .await
            .map_err(|e| AppError::api_request_failed(endpoint, e))?;
        let created: JobCreated = ensure_success(endpoint, response).await?.json().await?;
        created
            .job_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| AppError::missing_field(endpoint, "job_id"))
    }

    async fn check_job(&self, job_id: &str) -> AppResult<()> {
        let endpoint = format!("/workflows/{}", job_id);
        let response = self
            .http
            .get(self.url(&endpoint))
            .send()
            .await
            .map_err(|e| AppError::api_request_failed(endpoint.clone(), e))?;
        ensure_success(&endpoint, response).await?;
        Ok(())
    }

    async fn fetch_statistics(&self, statistics_url: &str) -> AppResult<Statistics> {
        self.get_json("statistics", statistics_url, &[]).await
    }

    async fn download_url(&self, job_id: &str) -> AppResult<String> {
        let endpoint = format!("/workflows/{}/download", job_id);
        let link: DownloadLink = self.get_json(&endpoint, &self.url(&endpoint), &[]).await?;
        link.download_url
            .filter(|u| !u.is_empty())
            .ok_or_else(|| AppError::missing_field(endpoint, "download_url"))
    }

    async fn export_bbox(&self, job_id: &str, request: &BBoxExportRequest) -> AppResult<Vec<u8>> {
        let endpoint = format!("/workflows/{}/download/bbox", job_id);
        let response = self
            .http
            .post(self.url(&endpoint))
            .json(request)
            .send()
            .await
            .map_err(|e| AppError::api_request_failed(endpoint.clone(), e))?;
        let bytes = ensure_success(&endpoint, response).await?.bytes().await?;
        Ok(bytes.to_vec())
    }
}
