use bollard::models::CreateImageInfo;
use bollard::query_parameters::CreateImageOptions;
use bollard::Docker;
use futures_util::StreamExt;

use super::container::classify;
use crate::runtime::RuntimeError;

/// Parse an image reference into (name, tag).
/// "postgres:16" -> ("postgres", "16")
/// "python" -> ("python", "latest")
/// "localhost:5000/app" -> ("localhost:5000/app", "latest")
pub fn parse_image_ref(image: &str) -> (&str, &str) {
    match image.rsplit_once(':') {
        Some((name, tag)) if !name.is_empty() && !tag.is_empty() && !tag.contains('/') => {
            (name, tag)
        }
        _ => (image, "latest"),
    }
}

/// Check if an image exists locally.
pub async fn check_image_exists(docker: &Docker, image: &str) -> bool {
    docker.inspect_image(image).await.is_ok()
}

/// Pull `image` unless it is already present locally.
pub async fn ensure_image(docker: &Docker, image: &str) -> Result<(), RuntimeError> {
    if check_image_exists(docker, image).await {
        tracing::debug!(image = %image, "image already present locally");
        return Ok(());
    }

    let (name, tag) = parse_image_ref(image);
    tracing::info!(image = %image, "pulling image");

    let options = CreateImageOptions {
        from_image: Some(name.to_string()),
        tag: Some(tag.to_string()),
        ..Default::default()
    };

    let mut stream = docker.create_image(Some(options), None, None);
    while let Some(result) = stream.next().await {
        let info: CreateImageInfo = result.map_err(|e| classify(e, image))?;
        if let Some(err) = &info.error_detail {
            return Err(RuntimeError::Api(format!(
                "image pull failed for {}: {}",
                image,
                err.message.as_deref().unwrap_or("unknown error")
            )));
        }
    }

    tracing::debug!(image = %image, "image pulled successfully");
    Ok(())
}
