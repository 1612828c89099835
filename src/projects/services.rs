use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

use super::models::{
    Application, ApplicationStatus, ApplyRequest, CreateProjectRequest, Project, ProjectStatus,
};
use super::validators::{ApplyValidator, CreateProjectValidator};
use crate::common::{PortalError, PortalResult, Validator};
use crate::notifications::{NewNotification, NotificationDispatcher, NotificationKind, SenderInfo};
use crate::session::models::{Role, User};
use crate::store::{fields, to_fields, Document, DocumentStore, DocumentStoreExt, Query, WriteBatch};

fn sender_of(user: &User) -> SenderInfo {
    SenderInfo {
        id: user.id.clone(),
        name: Some(user.display_name.clone()),
        avatar_url: user.avatar_url.clone(),
    }
}

fn project_link(project_id: &str) -> String {
    format!("/projects/{}", project_id)
}

/// Decode documents, skipping (and logging) any that do not fit the model
fn decode_docs<T: serde::de::DeserializeOwned>(docs: &[Document], kind: &str) -> Vec<T> {
    docs.iter()
        .filter_map(|doc| match doc.decode::<T>() {
            Ok(item) => Some(item),
            Err(e) => {
                warn!(id = %doc.id, kind = %kind, error = %e, "Skipping malformed document");
                None
            }
        })
        .collect()
}

// ============================================================================
// Projects
// ============================================================================

#[derive(Clone)]
pub struct ProjectService {
    store: Arc<dyn DocumentStore>,
    dispatcher: NotificationDispatcher,
}

impl ProjectService {
    pub fn new(store: Arc<dyn DocumentStore>, dispatcher: NotificationDispatcher) -> Self {
        Self { store, dispatcher }
    }

    pub async fn create_project(
        &self,
        owner: &User,
        request: CreateProjectRequest,
    ) -> PortalResult<Project> {
        if owner.role == Role::Freelancer {
            return Err(PortalError::PermissionDenied(
                "freelancers cannot create projects".to_string(),
            ));
        }
        CreateProjectValidator.validate(&request).into_result()?;

        let mut project = Project {
            id: String::new(),
            title: request.title.trim().to_string(),
            description: request.description.trim().to_string(),
            owner_id: owner.id.clone(),
            freelancer_id: None,
            status: ProjectStatus::Requested,
            budget: request.budget,
            tags: request.tags.iter().map(|t| t.trim().to_string()).collect(),
            created_at: Utc::now(),
            start_date: request.start_date,
            due_date: request.due_date,
        };

        project.id = self.store.add("projects", to_fields(&project)?).await?;

        info!(
            project_id = %project.id,
            owner_id = %owner.id,
            "Project created"
        );
        Ok(project)
    }

    pub async fn get_project(&self, project_id: &str) -> PortalResult<Project> {
        self.store
            .get_as::<Project>("projects", project_id)
            .await?
            .ok_or_else(|| PortalError::NotFound(format!("projects/{}", project_id)))
    }

    /// Projects visible to `viewer`, newest first
    ///
    /// Clients see their own projects, freelancers the open ones plus those
    /// assigned to them, admins everything.
    pub async fn list_projects(&self, viewer: &User) -> PortalResult<Vec<Project>> {
        let docs = match viewer.role {
            Role::Admin => self.store.query(&Query::new("projects")).await?,
            Role::Client => {
                self.store
                    .query(&Query::new("projects").where_eq("owner_id", viewer.id.as_str()))
                    .await?
            }
            Role::Freelancer => {
                let mut docs = self.store.query(&Query::new("projects")).await?;
                docs.retain(|doc| {
                    let assigned = doc
                        .get("freelancer_id")
                        .and_then(|v| v.as_str())
                        .map(|id| id == viewer.id)
                        .unwrap_or(false);
                    let open = doc
                        .get("status")
                        .and_then(|v| v.as_str())
                        .map(|s| ProjectStatus::parse(s).is_open())
                        .unwrap_or(true);
                    assigned || open
                });
                docs
            }
        };

        let mut projects: Vec<Project> = decode_docs(&docs, "project");
        projects.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(projects)
    }

    /// Move a project along its lifecycle; owner or admin only
    pub async fn update_status(
        &self,
        project_id: &str,
        actor: &User,
        status: ProjectStatus,
    ) -> PortalResult<Project> {
        let mut project = self.get_project(project_id).await?;

        if project.owner_id != actor.id && !actor.is_admin() {
            return Err(PortalError::PermissionDenied(format!(
                "projects/{}",
                project_id
            )));
        }
        if !project.status.can_transition_to(status) {
            return Err(PortalError::Conflict(format!(
                "cannot move project from {} to {}",
                project.status, status
            )));
        }

        self.store
            .update("projects", project_id, fields(json!({"status": status.as_str()})))
            .await?;

        info!(
            project_id = %project_id,
            from = %project.status,
            to = %status,
            "Project status updated"
        );
        project.status = status;

        if let Some(freelancer_id) = &project.freelancer_id {
            self.dispatcher
                .notify(
                    NewNotification::new(
                        freelancer_id.as_str(),
                        NotificationKind::Project,
                        "Project updated",
                        format!("{} is now {}", project.title, status),
                    )
                    .link(project_link(project_id))
                    .sender(sender_of(actor)),
                )
                .await;
        }

        Ok(project)
    }
}

// ============================================================================
// Applications
// ============================================================================

#[derive(Clone)]
pub struct ApplicationService {
    store: Arc<dyn DocumentStore>,
    projects: ProjectService,
    dispatcher: NotificationDispatcher,
}

impl ApplicationService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        projects: ProjectService,
        dispatcher: NotificationDispatcher,
    ) -> Self {
        Self {
            store,
            projects,
            dispatcher,
        }
    }

    /// Submit a proposal
    ///
    /// The duplicate check is a read before the insert, not a transaction:
    /// two concurrent applications can both pass it.
    pub async fn apply(&self, freelancer: &User, request: ApplyRequest) -> PortalResult<Application> {
        ApplyValidator.validate(&request).into_result()?;

        let project = self.projects.get_project(&request.project_id).await?;
        if project.owner_id == freelancer.id {
            return Err(PortalError::Conflict(
                "You cannot apply to your own project".to_string(),
            ));
        }
        if !project.status.is_open() {
            return Err(PortalError::Conflict(
                "This project is no longer accepting applications".to_string(),
            ));
        }

        let existing = self
            .store
            .query(
                &Query::new("applications")
                    .where_eq("project_id", project.id.as_str())
                    .where_eq("freelancer_id", freelancer.id.as_str())
                    .limit(1),
            )
            .await?;
        if !existing.is_empty() {
            warn!(
                project_id = %project.id,
                freelancer_id = %freelancer.id,
                "Duplicate application rejected"
            );
            return Err(PortalError::Conflict(
                "You have already applied to this project".to_string(),
            ));
        }

        let mut application = Application {
            id: String::new(),
            project_id: project.id.clone(),
            freelancer_id: freelancer.id.clone(),
            freelancer_name: Some(freelancer.display_name.clone()),
            bid: request.bid,
            message: request.message.trim().to_string(),
            status: ApplicationStatus::Applied,
            created_at: Utc::now(),
        };
        application.id = self
            .store
            .add("applications", to_fields(&application)?)
            .await?;

        info!(
            application_id = %application.id,
            project_id = %project.id,
            freelancer_id = %freelancer.id,
            "Application submitted"
        );

        self.dispatcher
            .notify(
                NewNotification::new(
                    project.owner_id.as_str(),
                    NotificationKind::Application,
                    "New application",
                    format!("{} applied to {}", freelancer.display_name, project.title),
                )
                .link(project_link(&project.id))
                .sender(sender_of(freelancer)),
            )
            .await;

        Ok(application)
    }

    pub async fn get_application(&self, application_id: &str) -> PortalResult<Application> {
        self.store
            .get_as::<Application>("applications", application_id)
            .await?
            .ok_or_else(|| PortalError::NotFound(format!("applications/{}", application_id)))
    }

    /// Hire one applicant
    ///
    /// One atomic batch accepts the chosen application, rejects every other
    /// pending application on the project and marks the project hired.
    /// Notifications go out after the batch commits.
    pub async fn hire(&self, owner: &User, application_id: &str) -> PortalResult<Application> {
        let mut application = self.get_application(application_id).await?;
        let project = self.projects.get_project(&application.project_id).await?;

        if project.owner_id != owner.id && !owner.is_admin() {
            return Err(PortalError::PermissionDenied(format!(
                "projects/{}",
                project.id
            )));
        }
        if application.status != ApplicationStatus::Applied {
            return Err(PortalError::Conflict(format!(
                "application {} is no longer pending",
                application_id
            )));
        }
        if !project.status.can_transition_to(ProjectStatus::Hired) {
            return Err(PortalError::Conflict(format!(
                "cannot hire on a project that is {}",
                project.status
            )));
        }

        let pending = self
            .store
            .query(
                &Query::new("applications")
                    .where_eq("project_id", project.id.as_str())
                    .where_eq("status", "applied"),
            )
            .await?;
        let rejected: Vec<Application> = decode_docs::<Application>(&pending, "application")
            .into_iter()
            .filter(|a| a.id != application.id)
            .collect();

        let mut batch = WriteBatch::new();
        batch.update(
            "applications",
            &application.id,
            fields(json!({"status": "accepted"})),
        );
        for other in &rejected {
            batch.update("applications", &other.id, fields(json!({"status": "rejected"})));
        }
        batch.update(
            "projects",
            &project.id,
            fields(json!({
                "status": ProjectStatus::Hired.as_str(),
                "freelancer_id": application.freelancer_id,
            })),
        );
        self.store.commit(batch).await?;

        info!(
            project_id = %project.id,
            application_id = %application.id,
            freelancer_id = %application.freelancer_id,
            rejected_count = rejected.len(),
            "Freelancer hired"
        );

        let sender = sender_of(owner);
        let mut notifications = vec![NewNotification::new(
            application.freelancer_id.as_str(),
            NotificationKind::Success,
            "You're hired!",
            format!("You were hired for {}", project.title),
        )
        .link(project_link(&project.id))
        .sender(sender.clone())];
        notifications.extend(rejected.iter().map(|other| {
            NewNotification::new(
                other.freelancer_id.as_str(),
                NotificationKind::Alert,
                "Application update",
                format!("{} was filled by another freelancer", project.title),
            )
            .link(project_link(&project.id))
            .sender(sender.clone())
        }));
        self.dispatcher.notify_many(notifications).await;

        application.status = ApplicationStatus::Accepted;
        Ok(application)
    }

    /// Applications for a project, newest first
    pub async fn list_applications(&self, project_id: &str) -> PortalResult<Vec<Application>> {
        let docs = self
            .store
            .query(&Query::new("applications").where_eq("project_id", project_id))
            .await?;
        Ok(newest_first(decode_docs(&docs, "application")))
    }

    /// A freelancer's own applications, newest first
    pub async fn list_for_freelancer(&self, freelancer_id: &str) -> PortalResult<Vec<Application>> {
        let docs = self
            .store
            .query(&Query::new("applications").where_eq("freelancer_id", freelancer_id))
            .await?;
        Ok(newest_first(decode_docs(&docs, "application")))
    }
}

fn newest_first(mut applications: Vec<Application>) -> Vec<Application> {
    applications.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
    applications
}
