//! Tests for projects module
//!
//! These tests verify:
//! - lenient status parsing and lifecycle transitions
//! - project creation, validation and role-based listing
//! - the duplicate-application pre-check
//! - hiring as a single batch with follow-up notifications

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::common::{PortalError, Validator};
    use crate::notifications::NotificationDispatcher;
    use crate::session::models::{Role, User};
    use crate::store::{fields, DocumentStore, MemoryStore, Query};
    use serde_json::json;
    use std::sync::Arc;

    fn user(id: &str, name: &str, role: Role) -> User {
        User {
            id: id.to_string(),
            display_name: name.to_string(),
            role,
            ..Default::default()
        }
    }

    fn services() -> (Arc<MemoryStore>, ProjectService, ApplicationService) {
        let store = Arc::new(MemoryStore::new());
        let dispatcher = NotificationDispatcher::new(store.clone());
        let projects = ProjectService::new(store.clone(), dispatcher.clone());
        let applications = ApplicationService::new(store.clone(), projects.clone(), dispatcher);
        (store, projects, applications)
    }

    fn website_request() -> CreateProjectRequest {
        CreateProjectRequest {
            title: "Company website".to_string(),
            description: "Five pages and a contact form".to_string(),
            budget: 2500.0,
            tags: vec!["web".to_string()],
            ..Default::default()
        }
    }

    fn proposal(project_id: &str, bid: f64) -> ApplyRequest {
        ApplyRequest {
            project_id: project_id.to_string(),
            bid,
            message: "I can start Monday".to_string(),
        }
    }

    async fn notifications_for(store: &MemoryStore, user_id: &str) -> Vec<crate::notifications::Notification> {
        store
            .query(&Query::new("notifications").where_eq("user_id", user_id))
            .await
            .unwrap()
            .iter()
            .map(|doc| doc.decode().unwrap())
            .collect()
    }

    // ============================================================================
    // Status
    // ============================================================================

    #[test]
    fn test_status_parsing_is_lenient() {
        assert_eq!(ProjectStatus::parse("In Progress"), ProjectStatus::InProgress);
        assert_eq!(ProjectStatus::parse("in_progress"), ProjectStatus::InProgress);
        assert_eq!(ProjectStatus::parse("HIRED"), ProjectStatus::Hired);
        assert_eq!(ProjectStatus::parse("archived"), ProjectStatus::Requested);

        let project: Project = serde_json::from_value(json!({
            "id": "P_1",
            "title": "Logo",
            "status": "in-progress",
            "budget": "$300",
            "tags": "design, branding",
            "created_at": {"seconds": 1714564800, "nanoseconds": 0}
        }))
        .unwrap();
        assert_eq!(project.status, ProjectStatus::InProgress);
        assert_eq!(project.budget, 300.0);
        assert_eq!(project.tags, vec!["design", "branding"]);

        let missing: Project = serde_json::from_value(json!({"id": "P_2"})).unwrap();
        assert_eq!(missing.status, ProjectStatus::Requested);

        assert_eq!(
            serde_json::to_value(ProjectStatus::InProgress).unwrap(),
            json!("In Progress")
        );
    }

    #[test]
    fn test_status_transitions() {
        use ProjectStatus::*;

        assert!(Requested.can_transition_to(Hired));
        assert!(Hired.can_transition_to(InProgress));
        assert!(InProgress.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(InProgress));
        assert!(!InProgress.can_transition_to(Requested));
        assert!(Requested.is_open());
        assert!(!Hired.is_open());
    }

    #[test]
    fn test_create_project_validator() {
        let validator = validators::CreateProjectValidator;
        assert!(validator.validate(&website_request()).is_valid);

        let bad = CreateProjectRequest {
            title: String::new(),
            budget: -5.0,
            ..website_request()
        };
        let result = validator.validate(&bad);
        assert!(!result.is_valid);
        assert_eq!(result.errors.len(), 2);
    }

    // ============================================================================
    // Projects
    // ============================================================================

    #[tokio::test]
    async fn test_create_project() {
        let (store, projects, _) = services();
        let client = user("U_CLIENT", "Cleo", Role::Client);

        let project = projects.create_project(&client, website_request()).await.unwrap();
        assert!(project.id.starts_with("P_"));
        assert_eq!(project.status, ProjectStatus::Requested);

        let stored = store.get("projects", &project.id).await.unwrap().unwrap();
        assert_eq!(stored.get("status"), Some(&json!("Requested")));
        assert_eq!(stored.get("owner_id"), Some(&json!("U_CLIENT")));

        let freelancer = user("U_FREE", "Finn", Role::Freelancer);
        let err = projects
            .create_project(&freelancer, website_request())
            .await
            .unwrap_err();
        assert!(err.is_permission_denied());
    }

    #[tokio::test]
    async fn test_list_projects_by_role_newest_first() {
        let (store, projects, _) = services();
        let rows = [
            ("P_OLD", "U_CLIENT", "Requested", "2024-01-01T00:00:00Z", None),
            ("P_NEW", "U_CLIENT", "Requested", "2024-03-01T00:00:00Z", None),
            ("P_MID", "U_OTHER", "Hired", "2024-02-01T00:00:00Z", Some("U_FREE")),
            ("P_DONE", "U_OTHER", "Completed", "2024-02-15T00:00:00Z", Some("U_ELSE")),
        ];
        for (id, owner, status, created_at, freelancer) in rows {
            store
                .set(
                    "projects",
                    id,
                    fields(json!({
                        "title": id,
                        "owner_id": owner,
                        "status": status,
                        "created_at": created_at,
                        "freelancer_id": freelancer,
                    })),
                    false,
                )
                .await
                .unwrap();
        }

        let ids = |list: Vec<Project>| list.into_iter().map(|p| p.id).collect::<Vec<_>>();

        let client = user("U_CLIENT", "Cleo", Role::Client);
        assert_eq!(ids(projects.list_projects(&client).await.unwrap()), vec!["P_NEW", "P_OLD"]);

        let freelancer = user("U_FREE", "Finn", Role::Freelancer);
        assert_eq!(
            ids(projects.list_projects(&freelancer).await.unwrap()),
            vec!["P_NEW", "P_MID", "P_OLD"]
        );

        let admin = user("U_ADMIN", "Ada", Role::Admin);
        assert_eq!(projects.list_projects(&admin).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_update_status_checks_owner_and_transition() {
        let (store, projects, applications) = services();
        let client = user("U_CLIENT", "Cleo", Role::Client);
        let freelancer = user("U_FREE", "Finn", Role::Freelancer);
        let project = projects.create_project(&client, website_request()).await.unwrap();

        let err = projects
            .update_status(&project.id, &freelancer, ProjectStatus::Completed)
            .await
            .unwrap_err();
        assert!(err.is_permission_denied());

        let application = applications
            .apply(&freelancer, proposal(&project.id, 2000.0))
            .await
            .unwrap();
        applications.hire(&client, &application.id).await.unwrap();

        let updated = projects
            .update_status(&project.id, &client, ProjectStatus::InProgress)
            .await
            .unwrap();
        assert_eq!(updated.status, ProjectStatus::InProgress);

        let err = projects
            .update_status(&project.id, &client, ProjectStatus::Requested)
            .await
            .unwrap_err();
        assert!(matches!(err, PortalError::Conflict(_)));

        let inbox = notifications_for(&store, "U_FREE").await;
        assert!(inbox
            .iter()
            .any(|n| n.body == "Company website is now In Progress"));
    }

    // ============================================================================
    // Applications
    // ============================================================================

    #[tokio::test]
    async fn test_second_application_is_rejected() {
        let (store, projects, applications) = services();
        let client = user("U_CLIENT", "Cleo", Role::Client);
        let freelancer = user("U_FREE", "Finn", Role::Freelancer);
        let project = projects.create_project(&client, website_request()).await.unwrap();

        let first = applications
            .apply(&freelancer, proposal(&project.id, 2000.0))
            .await
            .unwrap();
        assert_eq!(first.status, ApplicationStatus::Applied);

        let err = applications
            .apply(&freelancer, proposal(&project.id, 1800.0))
            .await
            .unwrap_err();
        match err {
            PortalError::Conflict(message) => {
                assert_eq!(message, "You have already applied to this project")
            }
            other => panic!("expected conflict, got {:?}", other),
        }

        assert_eq!(applications.list_applications(&project.id).await.unwrap().len(), 1);

        let inbox = notifications_for(&store, "U_CLIENT").await;
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].kind, crate::notifications::NotificationKind::Application);
        assert_eq!(inbox[0].sender.as_ref().map(|s| s.id.as_str()), Some("U_FREE"));
    }

    #[tokio::test]
    async fn test_apply_validation_and_closed_projects() {
        let (_store, projects, applications) = services();
        let client = user("U_CLIENT", "Cleo", Role::Client);
        let freelancer = user("U_FREE", "Finn", Role::Freelancer);
        let project = projects.create_project(&client, website_request()).await.unwrap();

        let err = applications
            .apply(&freelancer, proposal(&project.id, 0.0))
            .await
            .unwrap_err();
        assert!(matches!(err, PortalError::Validation(_)));

        let err = applications
            .apply(&freelancer, proposal("P_MISSING", 100.0))
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        let err = applications
            .apply(&client, proposal(&project.id, 100.0))
            .await
            .unwrap_err();
        assert!(matches!(err, PortalError::Conflict(_)));

        projects
            .update_status(&project.id, &client, ProjectStatus::Assigned)
            .await
            .unwrap();
        let err = applications
            .apply(&freelancer, proposal(&project.id, 100.0))
            .await
            .unwrap_err();
        assert!(matches!(err, PortalError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_hire_accepts_one_and_rejects_the_rest() {
        let (store, projects, applications) = services();
        let client = user("U_CLIENT", "Cleo", Role::Client);
        let finn = user("U_FINN", "Finn", Role::Freelancer);
        let gus = user("U_GUS", "Gus", Role::Freelancer);
        let hal = user("U_HAL", "Hal", Role::Freelancer);

        let project = projects.create_project(&client, website_request()).await.unwrap();
        let other = projects.create_project(&client, website_request()).await.unwrap();

        let chosen = applications.apply(&finn, proposal(&project.id, 2000.0)).await.unwrap();
        let loser_a = applications.apply(&gus, proposal(&project.id, 2100.0)).await.unwrap();
        let loser_b = applications.apply(&hal, proposal(&project.id, 2200.0)).await.unwrap();
        let elsewhere = applications.apply(&gus, proposal(&other.id, 900.0)).await.unwrap();

        // Only the owner may hire
        let err = applications.hire(&gus, &chosen.id).await.unwrap_err();
        assert!(err.is_permission_denied());

        let hired = applications.hire(&client, &chosen.id).await.unwrap();
        assert_eq!(hired.status, ApplicationStatus::Accepted);

        let status_of = |id: String| {
            let applications = applications.clone();
            async move { applications.get_application(&id).await.unwrap().status }
        };
        assert_eq!(status_of(chosen.id.clone()).await, ApplicationStatus::Accepted);
        assert_eq!(status_of(loser_a.id.clone()).await, ApplicationStatus::Rejected);
        assert_eq!(status_of(loser_b.id.clone()).await, ApplicationStatus::Rejected);
        assert_eq!(status_of(elsewhere.id.clone()).await, ApplicationStatus::Applied);

        let project = projects.get_project(&project.id).await.unwrap();
        assert_eq!(project.status, ProjectStatus::Hired);
        assert_eq!(project.freelancer_id.as_deref(), Some("U_FINN"));

        let finn_inbox = notifications_for(&store, "U_FINN").await;
        assert!(finn_inbox
            .iter()
            .any(|n| n.kind == crate::notifications::NotificationKind::Success));
        let hal_inbox = notifications_for(&store, "U_HAL").await;
        assert!(hal_inbox
            .iter()
            .any(|n| n.kind == crate::notifications::NotificationKind::Alert));

        // Hiring again is refused
        let err = applications.hire(&client, &loser_a.id).await.unwrap_err();
        assert!(matches!(err, PortalError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_hire_is_one_snapshot_for_watchers() {
        let (store, projects, applications) = services();
        let client = user("U_CLIENT", "Cleo", Role::Client);
        let project = projects.create_project(&client, website_request()).await.unwrap();
        let first = applications
            .apply(&user("U_A", "A", Role::Freelancer), proposal(&project.id, 10.0))
            .await
            .unwrap();
        applications
            .apply(&user("U_B", "B", Role::Freelancer), proposal(&project.id, 20.0))
            .await
            .unwrap();

        let mut sub = store
            .watch(Query::new("applications").where_eq("project_id", project.id.as_str()))
            .await
            .unwrap();
        sub.next().await.unwrap();

        applications.hire(&client, &first.id).await.unwrap();

        let snapshot = sub.next().await.unwrap();
        assert_eq!(snapshot.changes.len(), 2);
        assert!(sub.try_next().is_none());
    }
}
