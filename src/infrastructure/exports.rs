//! In-memory store for asynchronous export jobs.
//!
//! A job is created when an export is requested, completed or failed by the
//! background task that renders it, and removed on the first successful
//! download or when its TTL runs out.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;

/// A rendered export, ready to be sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFile {
    pub file_name: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
enum JobStatus {
    Processing,
    Completed(ExportFile),
    Failed(String),
}

#[derive(Debug, Clone)]
struct ExportJob {
    owner_id: String,
    status: JobStatus,
}

/// Outcome of a download attempt
#[derive(Debug, PartialEq, Eq)]
pub enum Download {
    NotFound,
    Forbidden,
    Processing,
    Failed(String),
    Ready(ExportFile),
}

#[derive(Clone)]
pub struct ExportJobs {
    jobs: Arc<DashMap<String, ExportJob>>,
    ttl: Duration,
}

impl ExportJobs {
    pub fn new(ttl: Duration) -> Self {
        Self {
            jobs: Arc::new(DashMap::new()),
            ttl,
        }
    }

    /// Register a new job for `owner_id` and return its id.
    pub fn start(&self, owner_id: &str) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        self.jobs.insert(
            id.clone(),
            ExportJob {
                owner_id: owner_id.to_string(),
                status: JobStatus::Processing,
            },
        );
        id
    }

    pub fn complete(&self, id: &str, file: ExportFile) {
        self.finish(id, JobStatus::Completed(file));
    }

    pub fn fail(&self, id: &str, error: impl Into<String>) {
        self.finish(id, JobStatus::Failed(error.into()));
    }

    fn finish(&self, id: &str, status: JobStatus) {
        match self.jobs.get_mut(id) {
            Some(mut job) => job.status = status,
            None => return,
        }
        self.expire_after_ttl(id.to_string());
    }

    fn expire_after_ttl(&self, id: String) {
        let jobs = Arc::clone(&self.jobs);
        let ttl = self.ttl;
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            if jobs.remove(&id).is_some() {
                tracing::debug!(export_id = %id, "export job expired");
            }
        });
    }

    /// Fetch the job for `requester`. A completed job is handed over and
    /// forgotten.
    pub fn take(&self, id: &str, requester: &str) -> Download {
        match self.jobs.get(id) {
            None => return Download::NotFound,
            Some(job) if job.owner_id != requester => return Download::Forbidden,
            Some(job) => match &job.status {
                JobStatus::Processing => return Download::Processing,
                JobStatus::Failed(error) => return Download::Failed(error.clone()),
                JobStatus::Completed(_) => {}
            },
        }

        match self.jobs.remove(id) {
            Some((
                _,
                ExportJob {
                    status: JobStatus::Completed(file),
                    ..
                },
            )) => Download::Ready(file),
            _ => Download::NotFound,
        }
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file() -> ExportFile {
        ExportFile {
            file_name: "export.json".to_string(),
            content_type: "application/json",
            bytes: b"[]".to_vec(),
        }
    }

    #[tokio::test]
    async fn completed_job_is_downloaded_once() {
        let jobs = ExportJobs::new(Duration::from_secs(60));
        let id = jobs.start("alice");
        assert_eq!(jobs.take(&id, "alice"), Download::Processing);
        assert_eq!(jobs.take(&id, "bob"), Download::Forbidden);

        jobs.complete(&id, file());
        assert_eq!(jobs.take(&id, "bob"), Download::Forbidden);
        assert_eq!(jobs.take(&id, "alice"), Download::Ready(file()));
        assert_eq!(jobs.take(&id, "alice"), Download::NotFound);
    }

    #[tokio::test]
    async fn failed_job_reports_error() {
        let jobs = ExportJobs::new(Duration::from_secs(60));
        let id = jobs.start("alice");
        jobs.fail(&id, "database unavailable");
        assert_eq!(
            jobs.take(&id, "alice"),
            Download::Failed("database unavailable".to_string())
        );
    }

    #[tokio::test]
    async fn finished_jobs_expire() {
        let jobs = ExportJobs::new(Duration::from_millis(20));
        let id = jobs.start("alice");
        jobs.complete(&id, file());
        assert_eq!(jobs.len(), 1);

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(jobs.is_empty());
        assert_eq!(jobs.take(&id, "alice"), Download::NotFound);
    }
}
