// tests/vault_test.rs
// Encrypted vault: round trips, permission gating, soft delete

mod common;

use lumen_backend::auth::{ResourceKind, TeamRole};
use lumen_backend::auth::models::GrantType;
use serde_json::json;

#[tokio::test]
async fn vault_content_round_trips_encrypted() {
    let fabric = common::fabric().await;
    let team = fabric.teams.create_team("Vault", "owner", None).await.unwrap();

    let item_id = fabric
        .vault
        .create_item(
            &team.team_id,
            "Patient Record #123",
            "patient_record",
            "Sensitive medical data",
            "owner",
            Some("text/plain"),
            Some(&json!({ "ward": "north" })),
        )
        .await
        .unwrap();

    let item = fabric.vault.get_item(&team.team_id, &item_id).await.unwrap().unwrap();
    assert_eq!(item.name, "Patient Record #123");
    assert_eq!(item.size, "Sensitive medical data".len() as i64);
    assert!(!item.is_deleted);
    assert_eq!(item.metadata.unwrap()["ward"], "north");

    let content = fabric
        .vault
        .read_content(&team.team_id, &item_id, "owner")
        .await
        .unwrap();
    assert_eq!(content, "Sensitive medical data");
}

#[tokio::test]
async fn ciphertext_is_not_plaintext_in_the_store() {
    let fabric = common::fabric().await;
    let team = fabric.teams.create_team("Opaque", "owner", None).await.unwrap();

    let item_id = fabric
        .vault
        .create_item(&team.team_id, "Note", "note", "the secret phrase", "owner", None, None)
        .await
        .unwrap();

    let raw: (String,) =
        sqlx::query_as("SELECT ciphertext FROM vault_items WHERE item_id = ?")
            .bind(&item_id)
            .fetch_one(fabric.teams.pool())
            .await
            .unwrap();
    assert!(!raw.0.contains("secret phrase"));
}

#[tokio::test]
async fn update_reencrypts_and_tracks_the_editor() {
    let fabric = common::fabric().await;
    let team = fabric.teams.create_team("Edits", "owner", None).await.unwrap();

    let item_id = fabric
        .vault
        .create_item(&team.team_id, "Doc", "note", "version one", "owner", None, None)
        .await
        .unwrap();

    fabric
        .vault
        .update_item(&team.team_id, &item_id, "version two", "editor")
        .await
        .unwrap();

    let content = fabric
        .vault
        .read_content(&team.team_id, &item_id, "owner")
        .await
        .unwrap();
    assert_eq!(content, "version two");

    let item = fabric.vault.get_item(&team.team_id, &item_id).await.unwrap().unwrap();
    assert_eq!(item.updated_by.as_deref(), Some("editor"));
}

#[tokio::test]
async fn soft_delete_hides_without_destroying() {
    let fabric = common::fabric().await;
    let team = fabric.teams.create_team("Gone", "owner", None).await.unwrap();

    let item_id = fabric
        .vault
        .create_item(&team.team_id, "Doomed", "note", "contents", "owner", None, None)
        .await
        .unwrap();

    fabric.vault.delete_item(&team.team_id, &item_id, "owner").await.unwrap();

    // Invisible through the API
    assert!(fabric.vault.get_item(&team.team_id, &item_id).await.unwrap().is_none());
    assert!(fabric.vault.read_content(&team.team_id, &item_id, "owner").await.is_err());
    assert!(fabric.vault.list_items(&team.team_id).await.unwrap().is_empty());

    // But the row survives for the audit trail; undeletion is not a thing
    let deleted: (i64,) =
        sqlx::query_as("SELECT is_deleted FROM vault_items WHERE item_id = ?")
            .bind(&item_id)
            .fetch_one(fabric.teams.pool())
            .await
            .unwrap();
    assert_eq!(deleted.0, 1);

    let second_delete = fabric.vault.delete_item(&team.team_id, &item_id, "owner").await;
    assert!(second_delete.is_err());
}

#[tokio::test]
async fn vault_reads_follow_the_cascade() {
    let fabric = common::fabric().await;
    let team = fabric.teams.create_team("Gated", "owner", None).await.unwrap();
    fabric.teams.add_member(&team.team_id, "guest-user", TeamRole::Guest).await.unwrap();
    fabric.teams.add_member(&team.team_id, "member-user", TeamRole::Member).await.unwrap();

    let item_id = fabric
        .vault
        .create_item(&team.team_id, "Shared", "note", "team knowledge", "owner", None, None)
        .await
        .unwrap();

    // Default matrix: members read, guests don't
    let member = fabric
        .permissions
        .check(&fabric.teams, ResourceKind::Vault, &item_id, &team.team_id, "member-user", "read")
        .await
        .unwrap();
    assert!(member.allowed);

    let guest = fabric
        .permissions
        .check(&fabric.teams, ResourceKind::Vault, &item_id, &team.team_id, "guest-user", "read")
        .await
        .unwrap();
    assert!(!guest.allowed);

    // An explicit job-role grant opens the item to that job role only
    fabric.teams.update_job_role(&team.team_id, "guest-user", "doctor").await.unwrap();
    fabric
        .permissions
        .add_grant(
            ResourceKind::Vault,
            &item_id,
            &team.team_id,
            "read",
            GrantType::JobRole,
            "doctor",
            "owner",
        )
        .await
        .unwrap();

    let doctor = fabric
        .permissions
        .check(&fabric.teams, ResourceKind::Vault, &item_id, &team.team_id, "guest-user", "read")
        .await
        .unwrap();
    assert!(doctor.allowed);
    assert_eq!(doctor.reason, "Job role grant (doctor)");

    // The member now misses the explicit grant list and is denied
    let member_after = fabric
        .permissions
        .check(&fabric.teams, ResourceKind::Vault, &item_id, &team.team_id, "member-user", "read")
        .await
        .unwrap();
    assert!(!member_after.allowed);
}
