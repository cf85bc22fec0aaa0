use crate::domain::model::FetchOutcome;
use crate::utils::error::Result;
use async_trait::async_trait;

/// Output boundary: where the final report gets written.
pub trait Storage: Send + Sync {
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// The one capability a source must provide: "fetch page N". Pagination
/// size, item shapes and endpoint quirks all live behind this boundary.
///
/// Implementations never return `Err`; every transport-level fault maps to a
/// non-success [`FetchOutcome`] variant so the driver can apply its retry
/// policy uniformly.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch_page(&self, page: u32) -> FetchOutcome;
}
