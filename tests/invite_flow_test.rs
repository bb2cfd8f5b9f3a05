// tests/invite_flow_test.rs
// Invite lifecycle: format, single active code, redemption races,
// brute-force lockout

mod common;

use lumen_backend::auth::TeamRole;

#[tokio::test]
async fn generated_codes_have_the_documented_format() {
    let fabric = common::fabric().await;
    let team = fabric.teams.create_team("Format", "owner", None).await.unwrap();

    let invite = fabric.invites.regenerate(&team.team_id, "owner").await.unwrap();

    let groups: Vec<&str> = invite.code.split('-').collect();
    assert_eq!(groups.len(), 3);
    for group in groups {
        assert_eq!(group.len(), 5);
    }
    assert!(!invite.used);
}

#[tokio::test]
async fn regeneration_supersedes_the_previous_code() {
    let fabric = common::fabric().await;
    let team = fabric.teams.create_team("Single", "owner", None).await.unwrap();

    let first = fabric.invites.regenerate(&team.team_id, "owner").await.unwrap();
    let second = fabric.invites.regenerate(&team.team_id, "owner").await.unwrap();
    assert_ne!(first.code, second.code);

    // Only the newest code is active
    let active = fabric.invites.active_code(&team.team_id).await.unwrap().unwrap();
    assert_eq!(active.code, second.code);

    // The superseded code no longer validates
    let validated = fabric.invites.validate(&first.code, "10.0.0.1").await.unwrap();
    assert!(validated.is_none());
}

#[tokio::test]
async fn redemption_joins_as_guest_and_consumes_the_code() {
    let fabric = common::fabric().await;
    let team = fabric.teams.create_team("Join", "owner", None).await.unwrap();
    let invite = fabric.invites.regenerate(&team.team_id, "owner").await.unwrap();

    let team_id = fabric
        .invites
        .redeem(&fabric.teams, &invite.code, "newcomer", "10.0.0.1")
        .await
        .unwrap();
    assert_eq!(team_id, team.team_id);

    let member = fabric.teams.get_member(&team.team_id, "newcomer").await.unwrap().unwrap();
    assert_eq!(member.role, TeamRole::Guest);

    // Second redemption of the same code fails: exactly one winner
    let second = fabric
        .invites
        .redeem(&fabric.teams, &invite.code, "latecomer", "10.0.0.2")
        .await;
    assert!(second.is_err());
    assert!(fabric.teams.get_member(&team.team_id, "latecomer").await.unwrap().is_none());
}

#[tokio::test]
async fn used_and_unknown_codes_are_indistinguishable() {
    let fabric = common::fabric().await;
    let team = fabric.teams.create_team("Opaque", "owner", None).await.unwrap();
    let invite = fabric.invites.regenerate(&team.team_id, "owner").await.unwrap();

    fabric
        .invites
        .redeem(&fabric.teams, &invite.code, "winner", "10.0.0.1")
        .await
        .unwrap();

    let used = fabric.invites.validate(&invite.code, "10.0.0.3").await.unwrap();
    let unknown = fabric.invites.validate("AAAAA-BBBBB-CCCCC", "10.0.0.3").await.unwrap();
    assert_eq!(used, unknown);
    assert!(used.is_none());
}

#[tokio::test]
async fn five_failures_lock_the_code_for_that_ip() {
    let fabric = common::fabric().await;
    let team = fabric.teams.create_team("Locked", "owner", None).await.unwrap();
    let invite = fabric.invites.regenerate(&team.team_id, "owner").await.unwrap();

    // Five failed lookups of one code string from one ip
    for _ in 0..5 {
        let validated = fabric
            .invites
            .validate("AAAAA-BBBBB-CCCCC", "10.9.9.9")
            .await
            .unwrap();
        assert!(validated.is_none());
    }
    assert!(
        fabric
            .invites
            .is_locked_out("AAAAA-BBBBB-CCCCC", "10.9.9.9")
            .await
            .unwrap()
    );

    // Lockout is per (code, ip): the real code from a different ip still
    // validates
    let other_ip = fabric.invites.validate(&invite.code, "10.7.7.7").await.unwrap();
    assert_eq!(other_ip, Some(team.team_id.clone()));
}

#[tokio::test]
async fn lockout_rejects_even_the_correct_code() {
    let fabric = common::fabric().await;
    let team = fabric.teams.create_team("Sixth", "owner", None).await.unwrap();
    let invite = fabric.invites.regenerate(&team.team_id, "owner").await.unwrap();

    // Consume the code, then fail five lookups of it from one ip; the
    // lockout tracks the (code, ip) pair regardless of code state
    fabric
        .invites
        .redeem(&fabric.teams, &invite.code, "winner", "10.1.1.1")
        .await
        .unwrap();

    for _ in 0..5 {
        let validated = fabric.invites.validate(&invite.code, "10.2.2.2").await.unwrap();
        assert!(validated.is_none());
    }

    assert!(fabric.invites.is_locked_out(&invite.code, "10.2.2.2").await.unwrap());

    // Sixth attempt from the locked ip is rejected before the code table
    // is consulted
    let result = fabric
        .invites
        .redeem(&fabric.teams, &invite.code, "someone", "10.2.2.2")
        .await;
    assert!(result.is_err());
}
