//! Amazon ECR control plane
//!
//! Repository existence/creation, tag digest lookups via `BatchGetImage`,
//! and the `GetAuthorizationToken` exchange that yields registry credentials.

use crate::error::{MirrorError, Result};
use crate::image::manifest::SUPPORTED_MEDIA_TYPES;
use crate::logging::Logger;
use crate::registry::catalog::{
    AuthorizationToken, AuthorizationTokenSource, DestinationCatalog, RepositoryStatus,
};
use async_trait::async_trait;
use aws_sdk_ecr::error::DisplayErrorContext;
use aws_sdk_ecr::types::{ImageIdentifier, ImageScanningConfiguration};
use aws_sdk_ecr::Client;

#[derive(Debug, Clone)]
pub struct EcrRegistry {
    client: Client,
    output: Logger,
}

impl EcrRegistry {
    pub fn new(config: &aws_config::SdkConfig, output: Logger) -> Self {
        Self::from_client(Client::new(config), output)
    }

    pub fn from_client(client: Client, output: Logger) -> Self {
        Self { client, output }
    }
}

#[async_trait]
impl DestinationCatalog for EcrRegistry {
    async fn ensure_repository(&self, name: &str) -> Result<RepositoryStatus> {
        let described = self
            .client
            .describe_repositories()
            .repository_names(name)
            .send()
            .await;

        let err = match described {
            Ok(_) => return Ok(RepositoryStatus::Existing),
            Err(err) => err,
        };

        let not_found = err
            .as_service_error()
            .is_some_and(|e| e.is_repository_not_found_exception());
        if !not_found {
            return Err(MirrorError::Destination(format!(
                "describe ECR repo {}: {}",
                name,
                DisplayErrorContext(&err)
            )));
        }

        let scanning = ImageScanningConfiguration::builder()
            .scan_on_push(true)
            .build();

        match self
            .client
            .create_repository()
            .repository_name(name)
            .image_scanning_configuration(scanning)
            .send()
            .await
        {
            Ok(_) => {
                self.output.success(&format!("Created ECR repo: {}", name));
                Ok(RepositoryStatus::Created)
            }
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_repository_already_exists_exception()) =>
            {
                self.output
                    .verbose(&format!("ECR repo {} appeared concurrently", name));
                Ok(RepositoryStatus::Existing)
            }
            Err(err) => Err(MirrorError::Destination(format!(
                "create ECR repo {}: {}",
                name,
                DisplayErrorContext(&err)
            ))),
        }
    }

    async fn tag_digest(&self, name: &str, tag: &str) -> Result<Option<String>> {
        let image_id = ImageIdentifier::builder().image_tag(tag).build();
        let accepted = SUPPORTED_MEDIA_TYPES
            .iter()
            .map(|media_type| media_type.to_string())
            .collect();

        let output = self
            .client
            .batch_get_image()
            .repository_name(name)
            .image_ids(image_id)
            .set_accepted_media_types(Some(accepted))
            .send()
            .await
            .map_err(|err| {
                MirrorError::destination_lookup(
                    format!("{}:{}", name, tag),
                    DisplayErrorContext(&err),
                )
            })?;

        Ok(output
            .images()
            .iter()
            .filter_map(|image| image.image_id())
            .find_map(|id| id.image_digest())
            .map(str::to_string))
    }
}

#[async_trait]
impl AuthorizationTokenSource for EcrRegistry {
    async fn authorization_token(&self) -> Result<AuthorizationToken> {
        let output = self
            .client
            .get_authorization_token()
            .send()
            .await
            .map_err(|err| {
                MirrorError::Auth(format!(
                    "ecr:GetAuthorizationToken: {}",
                    DisplayErrorContext(&err)
                ))
            })?;

        let data = output.authorization_data().first().ok_or_else(|| {
            MirrorError::Configuration("no ECR authorization data".to_string())
        })?;

        let token = data.authorization_token().ok_or_else(|| {
            MirrorError::Configuration("ECR authorization data carried no token".to_string())
        })?;

        Ok(AuthorizationToken {
            token: token.to_string(),
            proxy_endpoint: data.proxy_endpoint().map(str::to_string),
        })
    }
}
