use std::sync::Arc;

use aws_sdk_s3::Client as S3Client;

use crate::config::Config;
use crate::jobs::repository::JobRepository;
use crate::roles::resolver::ResolverRegistry;
use crate::roles::store::ProfileStore;
use crate::session::SessionProvider;
use crate::tasks::tracker::TaskTracker;

/// Shared application state injected into all route handlers via Axum extractors.
/// Collaborators are trait objects so handlers run unchanged against in-memory fakes.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub s3: S3Client,
    pub sessions: SessionProvider,
    pub profiles: Arc<dyn ProfileStore>,
    pub resolvers: ResolverRegistry,
    pub tasks: TaskTracker,
    pub jobs: Arc<dyn JobRepository>,
}
