// tests/auth_flow_test.rs
// Accounts and queue access: registration, login, refresh, queue filtering

mod common;

use lumen_backend::auth::TeamRole;
use lumen_backend::auth::models::GrantType;
use lumen_backend::auth::ResourceKind;

#[tokio::test]
async fn register_login_refresh_round_trip() {
    let fabric = common::fabric().await;

    let registered = fabric
        .users
        .register("alice", "correct-horse-battery", Some("alice@example.com"), None)
        .await
        .unwrap();
    assert_eq!(registered.user.username, "alice");

    // The access token authenticates; the refresh token does not
    let me = fabric.users.authenticate(&registered.access_token).await.unwrap();
    assert_eq!(me.id, registered.user.id);
    assert!(fabric.users.authenticate(&registered.refresh_token).await.is_err());

    // Refresh issues a fresh working pair
    let refreshed = fabric.users.refresh(&registered.refresh_token).await.unwrap();
    let me_again = fabric.users.authenticate(&refreshed.access_token).await.unwrap();
    assert_eq!(me_again.id, registered.user.id);

    // Login with the right and wrong password
    assert!(fabric.users.login("alice", "correct-horse-battery", None).await.is_ok());
    assert!(fabric.users.login("alice", "wrong", None).await.is_err());
}

#[tokio::test]
async fn duplicate_usernames_conflict() {
    let fabric = common::fabric().await;

    fabric.users.register("bob", "password123", None, None).await.unwrap();
    let second = fabric.users.register("bob", "password456", None, None).await;
    assert!(second.is_err());
}

#[tokio::test]
async fn short_passwords_are_rejected() {
    let fabric = common::fabric().await;
    assert!(fabric.users.register("carol", "short", None, None).await.is_err());
}

#[tokio::test]
async fn login_attempts_are_audited() {
    let fabric = common::fabric().await;
    fabric.users.register("dave", "password123", None, None).await.unwrap();

    let before = fabric.audit.count().await.unwrap();
    let _ = fabric.users.login("dave", "nope", Some("10.0.0.1")).await;
    fabric.users.login("dave", "password123", Some("10.0.0.1")).await.unwrap();
    let after = fabric.audit.count().await.unwrap();

    assert!(after >= before + 2);
    let failures = fabric.audit.by_action("login_failed", 10).await.unwrap();
    assert!(!failures.is_empty());
}

#[tokio::test]
async fn queue_listing_is_filtered_by_access() {
    let fabric = common::fabric().await;
    let team = fabric.teams.create_team("Clinic", "owner", None).await.unwrap();
    fabric.teams.add_member(&team.team_id, "nurse-user", TeamRole::Member).await.unwrap();
    fabric.teams.update_job_role(&team.team_id, "nurse-user", "nurse").await.unwrap();

    let triage = fabric
        .queues
        .create_queue(&team.team_id, "Triage", "patient", None, "owner")
        .await
        .unwrap();
    let pharmacy = fabric
        .queues
        .create_queue(&team.team_id, "Pharmacy", "medication", None, "owner")
        .await
        .unwrap();
    assert!(triage.queue_id.starts_with("PATIENT-"));

    // Default view access: members see both
    let visible = fabric
        .queues
        .accessible_queues(&fabric.teams, &fabric.permissions, &team.team_id, "nurse-user", "view")
        .await
        .unwrap();
    assert_eq!(visible.len(), 2);

    // Restrict the pharmacy queue to doctors; the nurse loses it
    fabric
        .permissions
        .add_grant(
            ResourceKind::Queue,
            &pharmacy.queue_id,
            &team.team_id,
            "view",
            GrantType::JobRole,
            "doctor",
            "owner",
        )
        .await
        .unwrap();

    let visible = fabric
        .queues
        .accessible_queues(&fabric.teams, &fabric.permissions, &team.team_id, "nurse-user", "view")
        .await
        .unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].queue_id, triage.queue_id);

    // Manage access defaults to admins
    let manageable = fabric
        .queues
        .accessible_queues(&fabric.teams, &fabric.permissions, &team.team_id, "nurse-user", "manage")
        .await
        .unwrap();
    assert!(manageable.is_empty());
}

#[tokio::test]
async fn deactivated_queues_disappear_from_listings() {
    let fabric = common::fabric().await;
    let team = fabric.teams.create_team("Closing", "owner", None).await.unwrap();

    let queue = fabric
        .queues
        .create_queue(&team.team_id, "Old Queue", "counseling", None, "owner")
        .await
        .unwrap();
    assert_eq!(fabric.queues.list_queues(&team.team_id).await.unwrap().len(), 1);

    fabric
        .queues
        .deactivate_queue(&team.team_id, &queue.queue_id, "owner")
        .await
        .unwrap();
    assert!(fabric.queues.list_queues(&team.team_id).await.unwrap().is_empty());
}
