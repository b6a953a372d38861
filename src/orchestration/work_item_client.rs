//! Synchronous internal calls the review domain makes into the authoring
//! domain. Deployments that split the domains across processes provide
//! their own implementation; [`LocalWorkItemClient`] calls the in-process
//! [`AuthoringService`].

use super::authoring_service::AuthoringService;
use crate::error::WorkflowResult;
use crate::models::{WorkItem, WorkItemId};
use crate::state_machine::WorkItemStatus;
use async_trait::async_trait;

#[async_trait]
pub trait WorkItemClient: Send + Sync {
    async fn get_work_item(&self, id: WorkItemId) -> WorkflowResult<WorkItem>;

    async fn set_status(&self, id: WorkItemId, status: WorkItemStatus) -> WorkflowResult<WorkItem>;

    async fn list_by_status(&self, status: WorkItemStatus) -> WorkflowResult<Vec<WorkItem>>;
}

#[derive(Debug, Clone)]
pub struct LocalWorkItemClient {
    authoring: AuthoringService,
}

impl LocalWorkItemClient {
    pub fn new(authoring: AuthoringService) -> Self {
        Self { authoring }
    }
}

#[async_trait]
impl WorkItemClient for LocalWorkItemClient {
    async fn get_work_item(&self, id: WorkItemId) -> WorkflowResult<WorkItem> {
        self.authoring.get_post(id).await
    }

    async fn set_status(&self, id: WorkItemId, status: WorkItemStatus) -> WorkflowResult<WorkItem> {
        self.authoring.set_status(id, status).await
    }

    async fn list_by_status(&self, status: WorkItemStatus) -> WorkflowResult<Vec<WorkItem>> {
        self.authoring.posts_by_status(status).await
    }
}
