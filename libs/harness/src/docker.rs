//! Docker-backed container runtime.
//!
//! Built on `testcontainers`, which negotiates the API version with the
//! daemon found through the usual `DOCKER_HOST` environment. One
//! `DockerRuntime` is created per run and passed to every component.
//!
//! Containers still owned by the runtime when it is dropped are removed by
//! `ContainerAsync`'s own drop, which covers the panic path.

use std::collections::HashMap;

use async_trait::async_trait;
use testcontainers::{
    core::{ExecCommand, Mount},
    runners::AsyncRunner,
    ContainerAsync, ContainerRequest, GenericImage, ImageExt,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::runtime::{ContainerRuntime, ContainerSpec, RawExec, RuntimeError};

/// Container runtime talking to a local Docker daemon.
#[derive(Default)]
pub struct DockerRuntime {
    containers: Mutex<HashMap<String, ContainerAsync<GenericImage>>>,
}

impl DockerRuntime {
    pub fn new() -> Self {
        Self::default()
    }
}

fn build_request(spec: &ContainerSpec) -> ContainerRequest<GenericImage> {
    let mut request: ContainerRequest<GenericImage> =
        GenericImage::new(spec.image.clone(), spec.tag.clone()).into();

    for (key, value) in &spec.env {
        request = request.with_env_var(key.clone(), value.clone());
    }
    for mount in &spec.mounts {
        request = request.with_mount(Mount::bind_mount(
            mount.host_path.to_string_lossy().into_owned(),
            mount.container_path.clone(),
        ));
    }

    request
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn launch(&self, spec: &ContainerSpec) -> Result<String, RuntimeError> {
        let container = build_request(spec)
            .start()
            .await
            .map_err(|e| RuntimeError::new("container start", e))?;

        let id = container.id().to_string();
        info!(container_id = %id, image = %spec.image, tag = %spec.tag, "Container started");

        self.containers.lock().await.insert(id.clone(), container);
        Ok(id)
    }

    async fn exec(&self, container_id: &str, argv: &[String]) -> Result<RawExec, RuntimeError> {
        let containers = self.containers.lock().await;
        let container = containers.get(container_id).ok_or_else(|| {
            RuntimeError::new("exec create", format!("no such container: {container_id}"))
        })?;

        let mut result = container
            .exec(ExecCommand::new(argv.iter().cloned()))
            .await
            .map_err(|e| RuntimeError::new("exec attach", e))?;

        // Drain both streams to EOF before asking for the exit status.
        let mut output = result
            .stdout_to_vec()
            .await
            .map_err(|e| RuntimeError::new("exec read stdout", e))?;
        let stderr = result
            .stderr_to_vec()
            .await
            .map_err(|e| RuntimeError::new("exec read stderr", e))?;
        output.extend_from_slice(&stderr);

        let exit_code = result
            .exit_code()
            .await
            .map_err(|e| RuntimeError::new("exec inspect", e))?;

        debug!(container_id, ?exit_code, bytes = output.len(), "Exec finished");
        Ok(RawExec { output, exit_code })
    }

    async fn remove(&self, container_id: &str) -> Result<(), RuntimeError> {
        let container = self.containers.lock().await.remove(container_id);
        let Some(container) = container else {
            debug!(container_id, "Container already removed");
            return Ok(());
        };

        info!(container_id, "Removing container");
        if let Err(e) = container.rm().await {
            warn!(container_id, error = %e, "Container removal failed");
            return Err(RuntimeError::new("container remove", e));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_remove_unknown_container_is_ok() {
        let runtime = DockerRuntime::new();
        runtime.remove("does-not-exist").await.unwrap();
    }
}
