//! Static site and serverless artifact publishing.
//!
//! Runs each configured operation in a fixed order and stops at the first
//! failure: storage sync, function code update, service redeploy, CDN
//! invalidation.

use super::target::ArtifactTarget;
use crate::cloud::{ArtifactPublisher, ControlPlane};
use crate::error::{Error, Result};

pub const STORAGE_SYNC: &str = "storage_sync";
pub const FUNCTION_UPDATE: &str = "function_update";
pub const SERVICE_REDEPLOY: &str = "service_redeploy";
pub const CDN_INVALIDATION: &str = "cdn_invalidation";

fn annotate(operation: &'static str) -> impl FnOnce(Error) -> Error {
    move |err| {
        err.with_detail("operation", operation)
            .with_message_prefix(operation)
    }
}

pub(crate) fn deploy(
    target: &ArtifactTarget,
    publisher: &dyn ArtifactPublisher,
    control_plane: &dyn ControlPlane,
) -> Result<String> {
    let mut completed = Vec::new();

    if let Some(bucket) = &target.bucket {
        log_status!("deploy:artifact", "Syncing {} to s3://{}", target.source_dir, bucket);
        publisher
            .sync_bucket(&target.source_dir, bucket)
            .map_err(annotate(STORAGE_SYNC))?;
        completed.push(STORAGE_SYNC.to_string());
    }

    if let Some(function) = &target.lambda_function {
        log_status!(
            "deploy:artifact",
            "Updating function {} from {}",
            function,
            target.function_archive
        );
        publisher
            .update_function_code(function, &target.function_archive)
            .map_err(annotate(FUNCTION_UPDATE))?;
        completed.push(FUNCTION_UPDATE.to_string());
    }

    if let Some(service) = &target.ecs_service {
        log_status!(
            "deploy:artifact",
            "Triggering redeploy of {} in {}",
            service,
            target.cluster
        );
        let deployment_id = control_plane
            .update_service(&target.cluster, service)
            .map_err(annotate(SERVICE_REDEPLOY))?;
        completed.push(format!("{} ({})", SERVICE_REDEPLOY, deployment_id));
    }

    if let Some(distribution) = &target.cloud_front_distribution {
        log_status!("deploy:artifact", "Invalidating distribution {}", distribution);
        let invalidation_id = publisher
            .invalidate_distribution(distribution)
            .map_err(annotate(CDN_INVALIDATION))?;
        completed.push(format!("{} ({})", CDN_INVALIDATION, invalidation_id));
    }

    Ok(format!("Artifact deployment completed: {}", completed.join(", ")))
}
