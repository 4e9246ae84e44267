//! 场景目录 - 业务能力层
//!
//! 职责：
//! - 列出远程场景前缀
//! - 递归枚举一个场景下的所有对象（每一层的子目录并发获取）
//! - 定位并解析清单，对每个文件分类

use std::sync::Arc;

use chrono::Local;
use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use tracing::{debug, info, warn};

use crate::clients::WorkflowApi;
use crate::error::{AppResult, ValidationError};
use crate::models::api::RemoteObject;
use crate::models::loaders::{decode_manifest, is_manifest_key, Manifest};
use crate::models::{FileEntry, Notice, Scene};
use crate::services::file_classifier::{classify, extract_metadata};

/// 场景加载结果
#[derive(Debug, Clone)]
pub struct SceneLoad {
    pub scene: Scene,
    /// 非致命提示（例如清单读取失败）
    pub notices: Vec<Notice>,
}

/// 场景前缀列表
#[derive(Debug, Clone, Default)]
pub struct ScenePrefixes {
    pub prefixes: Vec<String>,
    pub notices: Vec<Notice>,
}

pub struct SceneCatalog {
    api: Arc<dyn WorkflowApi>,
}

impl SceneCatalog {
    pub fn new(api: Arc<dyn WorkflowApi>) -> Self {
        Self { api }
    }

    /// 列出所有场景前缀
    ///
    /// 响应中没有 `prefixes` 数组时返回空列表并附带警告
    pub async fn list_scenes(&self) -> AppResult<ScenePrefixes> {
        let listing = self.api.list_scenes().await?;
        match listing.prefixes {
            Some(prefixes) => {
                info!("✓ 找到 {} 个场景", prefixes.len());
                Ok(ScenePrefixes {
                    prefixes,
                    notices: Vec::new(),
                })
            }
            None => {
                warn!("⚠️ 场景列表格式异常：缺少 prefixes 数组");
                Ok(ScenePrefixes {
                    prefixes: Vec::new(),
                    notices: vec![Notice::warning("场景列表格式异常，未找到任何场景")],
                })
            }
        }
    }

    /// 加载一个场景
    ///
    /// # 参数
    /// - `prefix`: 场景前缀（例如 `scene_a/`）
    ///
    /// # 返回
    /// 完整的场景与非致命提示；清单读取失败不会导致加载失败
    pub async fn select_scene(&self, prefix: &str) -> AppResult<SceneLoad> {
        if prefix.trim().is_empty() {
            return Err(ValidationError::EmptyScenePrefix.into());
        }

        info!("📂 加载场景: {}", prefix);
        let objects = list_recursive(self.api.as_ref(), prefix.to_string()).await;
        info!("✓ 共找到 {} 个文件", objects.len());

        let mut notices = Vec::new();
        let raw_manifest = match objects.iter().find(|o| is_manifest_key(&o.key)) {
            Some(manifest_object) => match self.load_manifest(&manifest_object.key).await {
                Ok(raw) => raw,
                Err(e) => {
                    warn!("⚠️ 清单读取失败 ({}): {}", manifest_object.key, e);
                    notices.push(Notice::warning("场景文件已加载，但元数据文件加载失败"));
                    None
                }
            },
            None => None,
        };
        let manifest = raw_manifest.as_ref().map(Manifest::from_value);
        if let Some(m) = &manifest {
            debug!("清单共声明 {} 个文件", m.declaration_count());
        }

        let files = objects
            .into_iter()
            .map(|object| {
                let name = object
                    .key
                    .rsplit('/')
                    .next()
                    .unwrap_or(object.key.as_str())
                    .to_string();
                FileEntry {
                    id: object.key.clone(),
                    category: classify(&name, manifest.as_ref()),
                    metadata: extract_metadata(&name, manifest.as_ref()),
                    key: object.key,
                    name,
                    size: object.size_bytes,
                }
            })
            .collect::<Vec<_>>();

        let scene_name = prefix.strip_suffix('/').unwrap_or(prefix).to_string();
        let scene = Scene {
            id: scene_name.clone(),
            name: scene_name,
            files,
            manifest: raw_manifest,
            created_at: Local::now(),
        };

        Ok(SceneLoad { scene, notices })
    }

    async fn load_manifest(&self, key: &str) -> AppResult<Option<serde_json::Value>> {
        debug!("读取清单: {}", key);
        let content = self.api.read_object(key).await?;
        match content.data {
            Some(data) => decode_manifest(key, data),
            None => {
                warn!("清单读取代理的响应中没有 data 字段");
                Ok(None)
            }
        }
    }
}

/// 递归列出前缀下的全部对象
///
/// 同一层的子目录并发获取；某一层失败时记录日志并跳过，不影响其余部分
fn list_recursive<'a>(api: &'a dyn WorkflowApi, prefix: String) -> BoxFuture<'a, Vec<RemoteObject>> {
    async move {
        let listing = match api.list_directory(&prefix).await {
            Ok(listing) => listing,
            Err(e) => {
                warn!("⚠️ 列出目录失败 ({}): {}", prefix, e);
                return Vec::new();
            }
        };

        let Some(contents) = listing.contents else {
            return Vec::new();
        };

        let mut objects = contents.objects;
        let children = join_all(
            contents
                .folders
                .into_iter()
                .map(|folder| list_recursive(api, folder)),
        )
        .await;
        for child in children {
            objects.extend(child);
        }
        objects
    }
    .boxed()
}
