//! # Authoring Service
//!
//! The authoring domain's operations on work items: CRUD, the content
//! edit that re-opens a rejected post as a draft, published-post search,
//! and the status overwrite exposed to other domains through
//! [`WorkItemClient`](super::work_item_client::WorkItemClient).

use crate::constants::operations;
use crate::database::{Transition, WorkItemStore};
use crate::error::{WorkflowError, WorkflowResult};
use crate::logging::log_workflow_operation;
use crate::models::{ContentEdit, NewWorkItem, SearchCriteria, WorkItem, WorkItemId};
use crate::state_machine::{WorkItemEvent, WorkItemStatus};
use std::sync::Arc;
use tracing::{debug, info, instrument};

#[derive(Clone)]
pub struct AuthoringService {
    store: Arc<dyn WorkItemStore>,
}

impl std::fmt::Debug for AuthoringService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthoringService").finish_non_exhaustive()
    }
}

fn require_non_blank(field: &str, value: &str) -> WorkflowResult<()> {
    if value.trim().is_empty() {
        return Err(WorkflowError::validation(format!("{field} must not be blank")));
    }
    Ok(())
}

impl AuthoringService {
    pub fn new(store: Arc<dyn WorkItemStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn WorkItemStore> {
        &self.store
    }

    /// Create a post in DRAFT
    #[instrument(skip(self, new), fields(author = %new.author))]
    pub async fn create_post(&self, new: NewWorkItem) -> WorkflowResult<WorkItem> {
        require_non_blank("title", &new.title)?;
        require_non_blank("author", &new.author)?;

        let item = self.store.create(new).await?;
        info!(work_item_id = %item.id, status = %item.status, "Created work item");
        log_workflow_operation(
            operations::CREATE_POST,
            Some(item.id),
            item.status.as_str(),
            None,
        );
        Ok(item)
    }

    /// Edit content while DRAFT or REJECTED; a rejected post becomes a draft again
    #[instrument(skip(self, edit))]
    pub async fn update_post(&self, id: WorkItemId, edit: ContentEdit) -> WorkflowResult<WorkItem> {
        if let Some(title) = &edit.title {
            require_non_blank("title", title)?;
        }
        if let Some(author) = &edit.author {
            require_non_blank("author", author)?;
        }

        let transition = Transition::for_event(&WorkItemEvent::Edit)
            .with_mutator(|item| item.apply_edit(&edit));
        let item = self
            .store
            .conditional_transition(id, transition)
            .await
            .map_err(|e| WorkflowError::from_transition(id, WorkItemStatus::Draft, e))?;

        info!(work_item_id = %id, status = %item.status, "Updated work item");
        log_workflow_operation(operations::UPDATE_POST, Some(id), item.status.as_str(), None);
        Ok(item)
    }

    #[instrument(skip(self))]
    pub async fn delete_post(&self, id: WorkItemId) -> WorkflowResult<bool> {
        let deleted = self.store.delete(id).await?;
        log_workflow_operation(
            operations::DELETE_POST,
            Some(id),
            if deleted { "deleted" } else { "absent" },
            None,
        );
        Ok(deleted)
    }

    pub async fn get_post(&self, id: WorkItemId) -> WorkflowResult<WorkItem> {
        Ok(self.store.get(id).await?)
    }

    /// Every post including drafts, oldest first
    pub async fn list_posts(&self) -> WorkflowResult<Vec<WorkItem>> {
        debug!("Fetching all work items");
        Ok(self.store.list().await?)
    }

    pub async fn posts_by_status(&self, status: WorkItemStatus) -> WorkflowResult<Vec<WorkItem>> {
        Ok(self.store.list_by_status(status).await?)
    }

    pub async fn published_posts(&self) -> WorkflowResult<Vec<WorkItem>> {
        self.posts_by_status(WorkItemStatus::Published).await
    }

    /// Published posts matching every provided criterion
    pub async fn search_published(&self, criteria: &SearchCriteria) -> WorkflowResult<Vec<WorkItem>> {
        let published = self.published_posts().await?;
        Ok(published
            .into_iter()
            .filter(|item| criteria.matches(item))
            .collect())
    }

    /// Overwrite the status regardless of the current one
    #[instrument(skip(self))]
    pub async fn set_status(&self, id: WorkItemId, status: WorkItemStatus) -> WorkflowResult<WorkItem> {
        let item = self
            .store
            .conditional_transition(id, Transition::overwrite(status))
            .await?;
        info!(work_item_id = %id, status = %status, "Work item status overwritten");
        log_workflow_operation(operations::SET_STATUS, Some(id), status.as_str(), None);
        Ok(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::InMemoryWorkItemStore;
    use chrono::Utc;

    fn service() -> AuthoringService {
        AuthoringService::new(Arc::new(InMemoryWorkItemStore::new()))
    }

    fn new_post(title: &str, author: &str) -> NewWorkItem {
        NewWorkItem {
            title: title.to_string(),
            content: "Some body text".to_string(),
            author: author.to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_post_validates_required_fields() {
        let service = service();
        assert!(matches!(
            service.create_post(new_post("  ", "gabriel")).await,
            Err(WorkflowError::Validation(_))
        ));
        assert!(matches!(
            service.create_post(new_post("Title", "")).await,
            Err(WorkflowError::Validation(_))
        ));
        let item = service.create_post(new_post("Title", "gabriel")).await.unwrap();
        assert_eq!(item.status, WorkItemStatus::Draft);
    }

    #[tokio::test]
    async fn test_editing_rejected_post_reopens_draft() {
        let service = service();
        let item = service.create_post(new_post("Title", "gabriel")).await.unwrap();
        service.set_status(item.id, WorkItemStatus::Rejected).await.unwrap();

        let edited = service
            .update_post(
                item.id,
                ContentEdit {
                    content: Some("Reworked".to_string()),
                    ..ContentEdit::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(edited.status, WorkItemStatus::Draft);
        assert_eq!(edited.content, "Reworked");
        assert_eq!(edited.title, "Title");
    }

    #[tokio::test]
    async fn test_published_and_requested_posts_are_not_editable() {
        let service = service();
        for status in [WorkItemStatus::Published, WorkItemStatus::Requested] {
            let item = service.create_post(new_post("Title", "gabriel")).await.unwrap();
            service.set_status(item.id, status).await.unwrap();

            let err = service
                .update_post(item.id, ContentEdit::default())
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                WorkflowError::InvalidTransition { from, to: WorkItemStatus::Draft, .. } if from == status
            ));
        }
    }

    #[tokio::test]
    async fn test_update_missing_post_is_not_found() {
        let service = service();
        let err = service
            .update_post(uuid::Uuid::new_v4(), ContentEdit::default())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_search_only_returns_matching_published_posts() {
        let service = service();
        let rust = service.create_post(new_post("Rust tips", "Gabriel")).await.unwrap();
        let java = service.create_post(new_post("Java tips", "Rita")).await.unwrap();
        service.create_post(new_post("Rust draft", "Gabriel")).await.unwrap();
        service.set_status(rust.id, WorkItemStatus::Published).await.unwrap();
        service.set_status(java.id, WorkItemStatus::Published).await.unwrap();

        let by_text = service
            .search_published(&SearchCriteria {
                text: Some("RUST".to_string()),
                ..SearchCriteria::default()
            })
            .await
            .unwrap();
        assert_eq!(by_text.iter().map(|i| i.id).collect::<Vec<_>>(), vec![rust.id]);

        let today = Utc::now().date_naive();
        let by_author_and_date = service
            .search_published(&SearchCriteria {
                author: Some("rit".to_string()),
                from: Some(today),
                to: Some(today),
                ..SearchCriteria::default()
            })
            .await
            .unwrap();
        assert_eq!(
            by_author_and_date.iter().map(|i| i.id).collect::<Vec<_>>(),
            vec![java.id]
        );
    }

    #[tokio::test]
    async fn test_delete_post() {
        let service = service();
        let item = service.create_post(new_post("Title", "gabriel")).await.unwrap();
        assert!(service.delete_post(item.id).await.unwrap());
        assert!(!service.delete_post(item.id).await.unwrap());
        assert!(matches!(
            service.get_post(item.id).await,
            Err(WorkflowError::NotFound { .. })
        ));
    }
}
