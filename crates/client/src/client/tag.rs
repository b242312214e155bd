use super::Client;
use crate::mapper;
use crate::models::Tag;
use crate::retry::{OperationClass, RetryStrategy};
use crate::wire;
use ovirt_common::{Error, Result, TagId};

impl Client {
    /// Create a tag.
    ///
    /// # Errors
    /// Returns a bad-argument error if `name` is empty or already taken.
    pub async fn create_tag(
        &self,
        name: &str,
        description: &str,
        retries: &[RetryStrategy],
    ) -> Result<Tag> {
        if name.is_empty() {
            return Err(Error::bad_argument("tag name must not be empty"));
        }
        let request = wire::Tag {
            name: Some(name.to_string()),
            description: Some(description.to_string()),
            ..Default::default()
        };

        tracing::info!(name, "Creating tag");
        let created = self
            .retry(
                &format!("creating tag {name}"),
                OperationClass::Write,
                retries,
                move |_| {
                    let request = request.clone();
                    async move { self.api.create_tag(request).await }
                },
            )
            .await?;
        mapper::tag_from_wire(created)
    }

    /// # Errors
    /// Returns not-found if the tag does not exist.
    pub async fn get_tag(&self, id: &TagId, retries: &[RetryStrategy]) -> Result<Tag> {
        tracing::debug!(tag_id = %id, "Fetching tag");
        let tag = self
            .retry(
                &format!("getting tag {id}"),
                OperationClass::Read,
                retries,
                move |_| async move { self.api.get_tag(id).await },
            )
            .await?;
        mapper::tag_from_wire(tag)
    }

    /// List all tags.
    pub async fn list_tags(&self, retries: &[RetryStrategy]) -> Result<Vec<Tag>> {
        tracing::debug!("Listing tags");
        let tags = self
            .retry("listing tags", OperationClass::Read, retries, move |_| async move {
                self.api.list_tags().await
            })
            .await?;
        tags.into_iter().map(mapper::tag_from_wire).collect()
    }

    /// Remove a tag. VMs carrying it lose the reference.
    ///
    /// # Errors
    /// Returns not-found if the tag did not exist on the first attempt.
    pub async fn remove_tag(&self, id: &TagId, retries: &[RetryStrategy]) -> Result<()> {
        tracing::info!(tag_id = %id, "Removing tag");
        self.remove_with_retry(&format!("removing tag {id}"), retries, move || async move {
            self.api.remove_tag(id).await
        })
        .await
    }
}
