use async_trait::async_trait;
use jiff::Timestamp;
use snip_core::{
    DeletionCandidate, ReadRepository, Repository, Result, ShortUrl, Stats, StorageError,
};
use std::collections::{HashMap, HashSet};
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncSeekExt, AsyncWriteExt, BufReader, Lines};
use tokio::sync::RwLock;
use tracing::{debug, trace};

/// Append-only file implementation of the repository contract.
///
/// Records are stored as newline-delimited JSON. There is no index: every
/// lookup scans the file from the start through a fresh read handle.
///
/// The lock owns the append handle. Readers take it shared so they never
/// observe a half-written batch, writers take it exclusively for the whole
/// check-then-write sequence.
#[derive(Debug)]
pub struct FileRepository {
    path: PathBuf,
    file: RwLock<File>,
}

impl FileRepository {
    /// Opens the storage file at `path`, creating it if needed.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(&path)
            .await?;

        // a crash mid-append can leave a partial last line without its newline
        if !ends_with_newline(&path).await? {
            file.write_all(b"\n").await?;
            file.flush().await?;
        }

        debug!(path = %path.display(), "opened file storage");
        Ok(Self {
            path,
            file: RwLock::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn reader(&self) -> Result<RecordReader> {
        let file = File::open(&self.path).await?;
        Ok(RecordReader::new(file))
    }

    /// Scans for `id`. The caller must hold the lock.
    async fn find(&self, id: &str) -> Result<Option<ShortUrl>> {
        let mut reader = self.reader().await?;
        while let Some(url) = reader.next_record().await? {
            if url.id == id {
                return Ok(Some(url));
            }
        }
        Ok(None)
    }

    /// Reads every record keyed by id, keeping file order. The caller must
    /// hold the lock.
    async fn read_all(&self) -> Result<(Vec<ShortUrl>, HashMap<String, usize>)> {
        let mut reader = self.reader().await?;
        let mut urls: Vec<ShortUrl> = Vec::new();
        let mut index = HashMap::new();

        while let Some(url) = reader.next_record().await? {
            match index.get(&url.id) {
                Some(&position) => urls[position] = url,
                None => {
                    index.insert(url.id.clone(), urls.len());
                    urls.push(url);
                }
            }
        }
        Ok((urls, index))
    }
}

async fn ends_with_newline(path: &Path) -> Result<bool> {
    let mut file = File::open(path).await?;
    if file.metadata().await?.len() == 0 {
        return Ok(true);
    }

    file.seek(SeekFrom::End(-1)).await?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last).await?;
    Ok(last[0] == b'\n')
}

async fn append(file: &mut File, urls: &[ShortUrl]) -> Result<()> {
    let mut buf = Vec::new();
    for url in urls {
        serde_json::to_writer(&mut buf, url)
            .map_err(|e| StorageError::InvalidData(e.to_string()))?;
        buf.push(b'\n');
    }

    file.write_all(&buf).await?;
    file.flush().await?;
    Ok(())
}

/// Streams records out of a storage file, one JSON object per line.
struct RecordReader {
    lines: Lines<BufReader<File>>,
    line: usize,
}

impl RecordReader {
    fn new(file: File) -> Self {
        Self {
            lines: BufReader::new(file).lines(),
            line: 0,
        }
    }

    async fn next_record(&mut self) -> Result<Option<ShortUrl>> {
        while let Some(line) = self.lines.next_line().await? {
            self.line += 1;
            if line.trim().is_empty() {
                continue;
            }

            let url = serde_json::from_str(&line).map_err(|e| StorageError::Corrupted {
                line: self.line,
                reason: e.to_string(),
            })?;
            return Ok(Some(url));
        }
        Ok(None)
    }
}

#[async_trait]
impl ReadRepository for FileRepository {
    async fn get_by_id(&self, id: &str) -> Result<ShortUrl> {
        let _guard = self.file.read().await;
        self.find(id)
            .await?
            .ok_or_else(|| StorageError::NotFound(id.to_string()))
    }

    async fn get_users_urls(&self, user_id: &str) -> Result<Vec<ShortUrl>> {
        let _guard = self.file.read().await;
        let mut reader = self.reader().await?;

        let mut urls = Vec::new();
        while let Some(url) = reader.next_record().await? {
            if url.created_by == user_id {
                urls.push(url);
            }
        }
        Ok(urls)
    }

    async fn get_users_and_urls_count(&self) -> Result<Stats> {
        let _guard = self.file.read().await;
        let mut reader = self.reader().await?;

        let mut ids = HashSet::new();
        let mut users = HashSet::new();
        while let Some(url) = reader.next_record().await? {
            users.insert(url.created_by);
            ids.insert(url.id);
        }
        Ok(Stats {
            urls: ids.len(),
            users: users.len(),
        })
    }

    async fn check(&self) -> Result<()> {
        tokio::fs::metadata(&self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl Repository for FileRepository {
    async fn save(&self, url: ShortUrl) -> Result<()> {
        let mut file = self.file.write().await;
        if self.find(&url.id).await?.is_some() {
            return Err(StorageError::not_unique(url));
        }

        trace!(id = %url.id, "appending short url");
        append(&mut file, std::slice::from_ref(&url)).await
    }

    async fn save_batch(&self, batch: Vec<ShortUrl>) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut file = self.file.write().await;

        let mut ids = HashSet::with_capacity(batch.len());
        if let Some(duplicate) = batch.iter().find(|url| !ids.insert(url.id.as_str())) {
            return Err(StorageError::not_unique(duplicate.clone()));
        }

        let mut reader = self.reader().await?;
        while let Some(stored) = reader.next_record().await? {
            if !ids.contains(stored.id.as_str()) {
                continue;
            }
            if let Some(conflict) = batch.iter().find(|url| url.id == stored.id) {
                return Err(StorageError::not_unique(conflict.clone()));
            }
        }

        trace!(count = batch.len(), "appending short url batch");
        append(&mut file, &batch).await
    }

    async fn delete_urls(&self, urls: &[DeletionCandidate]) -> Result<()> {
        if urls.is_empty() {
            return Ok(());
        }

        let mut file = self.file.write().await;
        let (mut stored, index) = self.read_all().await?;

        let now = Timestamp::now();
        let mut deleted = 0;
        for candidate in urls {
            if let Some(&position) = index.get(&candidate.id) {
                if stored[position].delete_if_owned(candidate, now) {
                    deleted += 1;
                }
            }
        }

        if deleted == 0 {
            return Ok(());
        }

        debug!(deleted, total = stored.len(), "rewriting file storage");
        file.set_len(0).await?;
        append(&mut file, &stored).await
    }

    async fn close(&self) -> Result<()> {
        let mut file = self.file.write().await;
        file.flush().await?;
        file.sync_all().await?;
        Ok(())
    }
}
