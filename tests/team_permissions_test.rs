// tests/team_permissions_test.rs
// Permission cascade, super-admin caps, Founder Rights, audit emission

mod common;

use lumen_backend::auth::models::GrantType;
use lumen_backend::auth::{ResourceKind, TeamRole};

#[tokio::test]
async fn creator_becomes_super_admin() {
    let fabric = common::fabric().await;

    let team = fabric
        .teams
        .create_team("Medical Mission", "founder-user", None)
        .await
        .unwrap();
    assert!(team.team_id.starts_with("MEDICALMISSION-"));

    let member = fabric
        .teams
        .get_member(&team.team_id, "founder-user")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(member.role, TeamRole::SuperAdmin);
}

#[tokio::test]
async fn default_matrix_governs_ungranted_resources() {
    let fabric = common::fabric().await;
    let team = fabric.teams.create_team("Defaults", "owner", None).await.unwrap();
    fabric
        .teams
        .add_member(&team.team_id, "member-user", TeamRole::Member)
        .await
        .unwrap();

    let view = fabric
        .permissions
        .check(&fabric.teams, ResourceKind::Workflow, "wf-1", &team.team_id, "member-user", "view")
        .await
        .unwrap();
    assert!(view.allowed);

    let edit = fabric
        .permissions
        .check(&fabric.teams, ResourceKind::Workflow, "wf-1", &team.team_id, "member-user", "edit")
        .await
        .unwrap();
    assert!(!edit.allowed);
    assert_eq!(edit.reason, "Default: only admins and above can edit");
}

#[tokio::test]
async fn explicit_grants_preempt_defaults() {
    let fabric = common::fabric().await;
    let team = fabric.teams.create_team("Grants", "owner", None).await.unwrap();
    fabric
        .teams
        .add_member(&team.team_id, "admin-user", TeamRole::Admin)
        .await
        .unwrap();
    fabric
        .teams
        .add_member(&team.team_id, "member-user", TeamRole::Member)
        .await
        .unwrap();

    // Grant edit to a specific non-admin user
    fabric
        .permissions
        .add_grant(
            ResourceKind::Workflow,
            "wf-1",
            &team.team_id,
            "edit",
            GrantType::User,
            "member-user",
            "owner",
        )
        .await
        .unwrap();

    let member_edit = fabric
        .permissions
        .check(&fabric.teams, ResourceKind::Workflow, "wf-1", &team.team_id, "member-user", "edit")
        .await
        .unwrap();
    assert!(member_edit.allowed);
    assert_eq!(member_edit.reason, "Explicit user grant");

    // Once explicit grants exist for this (resource, permission), an admin
    // who matches none of them is denied; the default matrix no longer applies
    let admin_edit = fabric
        .permissions
        .check(&fabric.teams, ResourceKind::Workflow, "wf-1", &team.team_id, "admin-user", "edit")
        .await
        .unwrap();
    assert!(!admin_edit.allowed);
    assert_eq!(admin_edit.reason, "No matching permission grant found");
}

#[tokio::test]
async fn job_role_grants_sit_between_user_and_role() {
    let fabric = common::fabric().await;
    let team = fabric.teams.create_team("Jobs", "owner", None).await.unwrap();
    fabric
        .teams
        .add_member(&team.team_id, "doctor-user", TeamRole::Member)
        .await
        .unwrap();
    fabric
        .teams
        .update_job_role(&team.team_id, "doctor-user", "doctor")
        .await
        .unwrap();

    fabric
        .permissions
        .add_grant(
            ResourceKind::Queue,
            "q-1",
            &team.team_id,
            "manage",
            GrantType::JobRole,
            "doctor",
            "owner",
        )
        .await
        .unwrap();

    let decision = fabric
        .permissions
        .check(&fabric.teams, ResourceKind::Queue, "q-1", &team.team_id, "doctor-user", "manage")
        .await
        .unwrap();
    assert!(decision.allowed);
    assert_eq!(decision.reason, "Job role grant (doctor)");
}

#[tokio::test]
async fn founder_rights_override_everything() {
    let fabric = common::fabric().await;
    let team = fabric.teams.create_team("Override", "owner", None).await.unwrap();

    // Not even a team member, but holds Founder Rights
    fabric
        .teams
        .grant_founder_rights("the-founder", None, Some("bootstrap"))
        .await
        .unwrap();

    let decision = fabric
        .permissions
        .check(&fabric.teams, ResourceKind::Vault, "item-1", &team.team_id, "the-founder", "admin")
        .await
        .unwrap();
    assert!(decision.allowed);
    assert_eq!(decision.reason, "Founder Rights override");
}

#[tokio::test]
async fn super_admin_cap_blocks_without_founder_rights() {
    let fabric = common::fabric().await;
    let team = fabric.teams.create_team("Capped", "owner", None).await.unwrap();

    // Team of 4: one super admin (the creator) is already the cap
    for user in ["alice", "bob", "carol"] {
        fabric
            .teams
            .add_member(&team.team_id, user, TeamRole::Member)
            .await
            .unwrap();
    }

    let (ok, message) = fabric
        .roles
        .update_member_role(&fabric.teams, &team.team_id, "alice", TeamRole::SuperAdmin, "owner", false)
        .await
        .unwrap();
    assert!(!ok);
    assert!(message.contains("maximum Super Admins (1/1 for team size 4)"));

    // The same attempt with Founder Rights succeeds
    let (ok, _) = fabric
        .roles
        .update_member_role(&fabric.teams, &team.team_id, "alice", TeamRole::SuperAdmin, "owner", true)
        .await
        .unwrap();
    assert!(ok);

    let member = fabric.teams.get_member(&team.team_id, "alice").await.unwrap().unwrap();
    assert_eq!(member.role, TeamRole::SuperAdmin);
}

#[tokio::test]
async fn larger_teams_allow_more_super_admins() {
    let fabric = common::fabric().await;
    let team = fabric.teams.create_team("Bigger", "owner", None).await.unwrap();

    // Grow the team to 6 members; the cap rises to 2
    for user in ["u1", "u2", "u3", "u4", "u5"] {
        fabric
            .teams
            .add_member(&team.team_id, user, TeamRole::Member)
            .await
            .unwrap();
    }

    let (ok, _) = fabric
        .roles
        .update_member_role(&fabric.teams, &team.team_id, "u1", TeamRole::SuperAdmin, "owner", false)
        .await
        .unwrap();
    assert!(ok);

    let (ok, message) = fabric
        .roles
        .update_member_role(&fabric.teams, &team.team_id, "u2", TeamRole::SuperAdmin, "owner", false)
        .await
        .unwrap();
    assert!(!ok);
    assert!(message.contains("2/2"));
}

#[tokio::test]
async fn every_check_emits_an_audit_entry() {
    let fabric = common::fabric().await;
    let team = fabric.teams.create_team("Audited", "owner", None).await.unwrap();
    fabric
        .teams
        .add_member(&team.team_id, "member-user", TeamRole::Member)
        .await
        .unwrap();

    let before = fabric.audit.count().await.unwrap();

    // One allowed, one denied: both must audit
    fabric
        .permissions
        .check(&fabric.teams, ResourceKind::Queue, "q-1", &team.team_id, "member-user", "view")
        .await
        .unwrap();
    fabric
        .permissions
        .check(&fabric.teams, ResourceKind::Queue, "q-1", &team.team_id, "member-user", "manage")
        .await
        .unwrap();

    let after = fabric.audit.count().await.unwrap();
    assert_eq!(after, before + 2);

    // Audit is append-only: row count never decreases across operations
    assert!(after >= before);
}

#[tokio::test]
async fn duplicate_grants_conflict() {
    let fabric = common::fabric().await;
    let team = fabric.teams.create_team("Dup", "owner", None).await.unwrap();

    fabric
        .permissions
        .add_grant(
            ResourceKind::Workflow,
            "wf-1",
            &team.team_id,
            "view",
            GrantType::Role,
            "member",
            "owner",
        )
        .await
        .unwrap();

    let second = fabric
        .permissions
        .add_grant(
            ResourceKind::Workflow,
            "wf-1",
            &team.team_id,
            "view",
            GrantType::Role,
            "member",
            "owner",
        )
        .await;
    assert!(second.is_err());
}

#[tokio::test]
async fn invalid_permission_type_is_rejected() {
    let fabric = common::fabric().await;
    let team = fabric.teams.create_team("Types", "owner", None).await.unwrap();

    let result = fabric
        .permissions
        .add_grant(
            ResourceKind::Vault,
            "item-1",
            &team.team_id,
            "edit", // vault permissions are read/write/admin
            GrantType::Role,
            "member",
            "owner",
        )
        .await;
    assert!(result.is_err());
}
