use std::sync::Arc;

use tracing::debug;

use np_core::{Constraint, Error, Stability, select_version};

use crate::traits::ReleaseClient;

/// Picks the release to install for a name and a constraint.
#[derive(Clone)]
pub struct VersionResolver {
    client: Arc<dyn ReleaseClient>,
}

impl VersionResolver {
    pub fn new(client: Arc<dyn ReleaseClient>) -> Self {
        Self { client }
    }

    /// Highest published version of `name` that satisfies `constraint` and is
    /// at least `minimum_stability`. The constraint is validated before the
    /// registry is contacted.
    pub async fn resolve(
        &self,
        name: &str,
        constraint: &str,
        minimum_stability: Stability,
    ) -> Result<String, Error> {
        self.try_resolve(name, constraint, minimum_stability)
            .await
            .map_err(|e| e.context("resolve", name))
    }

    async fn try_resolve(
        &self,
        name: &str,
        constraint: &str,
        minimum_stability: Stability,
    ) -> Result<String, Error> {
        let parsed = Constraint::parse(constraint)?;
        let releases = self.client.list_releases(name).await?;

        let version = select_version(&releases, &parsed, minimum_stability).ok_or_else(|| {
            Error::NoMatchingVersion {
                name: name.to_string(),
                constraint: parsed.as_str().to_string(),
                minimum_stability,
            }
        })?;

        debug!(
            package = name,
            constraint = parsed.as_str(),
            %minimum_stability,
            candidates = releases.len(),
            version = %version,
            "resolved"
        );
        Ok(version)
    }
}
