use super::BlobService;
use crate::{Error, Result};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::{config::Region, types::ObjectCannedAcl, Client as S3Client};

pub struct S3BlobClient {
    client: S3Client,
    bucket: String,
    base_url: String,
}

impl S3BlobClient {
    pub async fn new(
        access_key_id: String,
        secret_access_key: String,
        endpoint: String,
        region: String,
        bucket: String,
        base_url: String,
    ) -> Result<Self> {
        let credentials = aws_sdk_s3::config::Credentials::new(
            access_key_id,
            secret_access_key,
            None,
            None,
            "roi-gallery",
        );

        let config = aws_config::defaults(BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(Region::new(region))
            .endpoint_url(endpoint)
            .load()
            .await;

        let client = S3Client::new(&config);

        Ok(Self {
            client,
            bucket,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn get_public_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key)
    }
}

#[async_trait]
impl BlobService for S3BlobClient {
    async fn put(&self, path: &str, data: &[u8], content_type: &str) -> Result<String> {
        let body = ByteStream::from(data.to_vec());

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(path)
            .body(body)
            .content_type(content_type)
            .acl(ObjectCannedAcl::PublicRead)
            .send()
            .await
            .map_err(|e| Error::Storage(format!("Failed to upload {}: {}", path, e)))?;

        Ok(self.get_public_url(path))
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await
            .map_err(|e| Error::Storage(format!("Failed to delete {}: {}", path, e)))?;

        Ok(())
    }
}
