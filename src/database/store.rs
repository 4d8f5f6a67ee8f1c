use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use rand::RngCore;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::models::Document;
use crate::error::AppError;

/// JSON 文档存储。
///
/// 读操作直接读文件；写操作通过 [`RecordStore::update`] 串行化：
/// 持锁完成 load → 修改 → save，避免并发请求互相覆盖。
#[derive(Debug)]
pub struct RecordStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl RecordStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 读取文档。文件不存在或内容损坏时返回空文档，其他 I/O 错误向上返回。
    pub async fn load(&self) -> Result<Document, AppError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "data file missing, using empty document");
                return Ok(Document::default());
            }
            Err(e) => {
                return Err(AppError::StoreIo(format!(
                    "read {}: {}",
                    self.path.display(),
                    e
                )));
            }
        };

        match serde_json::from_slice::<Document>(&bytes) {
            Ok(doc) => Ok(doc),
            Err(e) => {
                tracing::error!(
                    path = %self.path.display(),
                    error = %e,
                    "data file is corrupt, falling back to empty document"
                );
                Ok(Document::default())
            }
        }
    }

    /// 整体覆盖写入：先写同目录临时文件再 rename，读者只会看到旧文档或新文档。
    pub async fn save(&self, doc: &Document) -> Result<(), AppError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_vec_pretty(doc)
            .map_err(|e| AppError::Internal(format!("serialize document: {}", e)))?;

        let tmp = self.temp_path();
        let written = async {
            let mut file = tokio::fs::File::create(&tmp).await?;
            file.write_all(&json).await?;
            file.sync_all().await?;
            drop(file);
            tokio::fs::rename(&tmp, &self.path).await
        }
        .await;

        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(AppError::StoreIo(format!(
                "write {}: {}",
                self.path.display(),
                e
            )));
        }
        Ok(())
    }

    /// 串行化的读-改-写。闭包返回错误时不写盘。
    pub async fn update<T, F>(&self, mutate: F) -> Result<T, AppError>
    where
        F: FnOnce(&mut Document) -> Result<T, AppError>,
    {
        let _guard = self.write_lock.lock().await;
        let mut doc = self.load().await?;
        let out = mutate(&mut doc)?;
        self.save(&doc).await?;
        Ok(out)
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "db.json".into());
        let suffix = rand::thread_rng().next_u64();
        self.path
            .with_file_name(format!(".{}.{:016x}.tmp", name, suffix))
    }
}
