use crate::domain::model::ServiceReport;
use crate::utils::error::Result;
use crate::utils::progress::ProgressTracker;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// Source of client addresses for services that expect a caller IP in the
/// request payload.
pub trait IpSource: Send + Sync + std::fmt::Debug {
    fn next_ip(&self) -> String;
}

/// One screening service. Implementations own their endpoint or dataset
/// plus tuning, and report one table for the documents given. Lookup
/// failures for single documents are reported in-band as marker rows,
/// never as errors.
#[async_trait]
pub trait Screener: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &str;

    /// Result columns, without the document key column.
    fn columns(&self) -> Vec<String>;

    async fn run(&self, documents: &[String], progress: &ProgressTracker)
        -> Result<ServiceReport>;
}
