//! Rolling update of a container service followed by stabilization polling.

use super::poller::{PollStatus, StabilizationPoller};
use super::target::ContainerTarget;
use crate::cloud::{ControlPlane, RolloutState};
use crate::error::{Error, Result};

pub(crate) fn deploy(
    target: &ContainerTarget,
    control_plane: &dyn ControlPlane,
    poller: &StabilizationPoller<'_>,
) -> Result<String> {
    if target.cluster.is_empty() {
        return Err(Error::config_missing_key("cluster", None));
    }
    if target.service.is_empty() {
        return Err(Error::config_missing_key("service", None));
    }

    log_status!(
        "deploy:ecs",
        "Forcing new deployment of {} in {}",
        target.service,
        target.cluster
    );
    let deployment_id = control_plane.update_service(&target.cluster, &target.service)?;
    log_status!("deploy:ecs", "Started deployment {}", deployment_id);

    let state = poller.poll(|attempt| {
        let rollout = control_plane.describe_service(&target.cluster, &target.service)?;
        log_status!("deploy:ecs", "Rollout state {} (check {})", rollout, attempt);
        Ok(rollout == RolloutState::Completed)
    })?;

    match state.status {
        PollStatus::Completed => Ok(format!(
            "Service {} in cluster {} stabilized (deployment {})",
            target.service, target.cluster, deployment_id
        )),
        _ => Err(Error::stabilization_timeout(
            &target.cluster,
            &target.service,
            state.attempt,
            state.interval_ms,
        )
        .with_detail("deploymentId", deployment_id)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deploy::poller::{PollSettings, Sleeper};
    use crate::error::ErrorCode;
    use std::sync::Mutex;
    use std::time::Duration;

    struct NoSleep;

    impl Sleeper for NoSleep {
        fn sleep(&self, _duration: Duration) {}
    }

    struct ScriptedControlPlane {
        states: Mutex<Vec<Result<RolloutState>>>,
        updates: Mutex<u32>,
        describes: Mutex<u32>,
    }

    impl ScriptedControlPlane {
        fn new(states: Vec<Result<RolloutState>>) -> Self {
            Self {
                states: Mutex::new(states),
                updates: Mutex::new(0),
                describes: Mutex::new(0),
            }
        }
    }

    impl ControlPlane for ScriptedControlPlane {
        fn update_service(&self, _cluster: &str, _service: &str) -> Result<String> {
            *self.updates.lock().unwrap() += 1;
            Ok("ecs-svc/1".to_string())
        }

        fn describe_service(&self, _cluster: &str, _service: &str) -> Result<RolloutState> {
            *self.describes.lock().unwrap() += 1;
            let mut states = self.states.lock().unwrap();
            if states.is_empty() {
                Ok(RolloutState::InProgress)
            } else {
                states.remove(0)
            }
        }
    }

    fn target() -> ContainerTarget {
        ContainerTarget {
            cluster: "c1".to_string(),
            service: "s1".to_string(),
        }
    }

    #[test]
    fn stabilizes_and_reports_deployment_id() {
        let control = ScriptedControlPlane::new(vec![
            Ok(RolloutState::InProgress),
            Ok(RolloutState::Completed),
        ]);
        let poller = StabilizationPoller::new(PollSettings::default(), &NoSleep);

        let message = deploy(&target(), &control, &poller).unwrap();

        assert!(message.contains("ecs-svc/1"));
        assert_eq!(*control.updates.lock().unwrap(), 1);
        assert_eq!(*control.describes.lock().unwrap(), 2);
    }

    #[test]
    fn timeout_is_reported_with_attempts() {
        let control = ScriptedControlPlane::new(Vec::new());
        let poller = StabilizationPoller::new(PollSettings::default(), &NoSleep);

        let err = deploy(&target(), &control, &poller).unwrap_err();

        assert_eq!(err.code, ErrorCode::DeployStabilizationTimeout);
        assert_eq!(err.details["attempts"], 10);
        assert_eq!(err.details["deploymentId"], "ecs-svc/1");
        assert_eq!(*control.updates.lock().unwrap(), 1);
    }

    #[test]
    fn describe_failure_propagates() {
        let control = ScriptedControlPlane::new(vec![Err(Error::provider_request_failed(
            "ecs describe-services",
            "AccessDenied",
        ))]);
        let poller = StabilizationPoller::new(PollSettings::default(), &NoSleep);

        let err = deploy(&target(), &control, &poller).unwrap_err();

        assert_eq!(err.code, ErrorCode::ProviderRequestFailed);
        assert_eq!(*control.describes.lock().unwrap(), 1);
    }

    #[test]
    fn empty_service_is_missing_key() {
        let control = ScriptedControlPlane::new(Vec::new());
        let poller = StabilizationPoller::new(PollSettings::default(), &NoSleep);
        let target = ContainerTarget {
            cluster: "c1".to_string(),
            service: String::new(),
        };

        let err = deploy(&target, &control, &poller).unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigMissingKey);
        assert_eq!(*control.updates.lock().unwrap(), 0);
    }
}
