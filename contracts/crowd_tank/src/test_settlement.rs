use crate::invariants::*;
use crate::test::{setup, setup_with_rate, HOUR};
use crate::{Error, Identity, Outcome, ProjectStatus};

#[test]
fn test_successful_settlement_pays_owner_minus_commission() {
    let h = setup();
    let id = h.ledger.create_project(h.owner.clone(), 1_000, HOUR).unwrap();
    let alice = Identity::from("alice");
    let bob = Identity::from("bob");

    h.ledger.fund_project(id, &alice, 600).unwrap();
    h.ledger.fund_project(id, &bob, 500).unwrap();
    assert_eq!(h.ledger.project(id).unwrap().raised, 1_100);

    h.clock.advance(HOUR);
    let settlement = h.ledger.settle_project(id).unwrap();

    assert_eq!(settlement.outcome, Outcome::Successful);
    assert_eq!(settlement.commission, 55);
    assert_eq!(settlement.payout, 1_045);
    assert!(settlement.refunds.is_empty());
    assert_eq!(h.book.balance_of(&h.owner), 1_045);
    assert_eq!(h.book.balance_of(&alice), 0);
    assert_eq!(h.ledger.commission_pool(), 55);
    assert_eq!(h.ledger.custody(), 55);
    assert_eq!(h.ledger.successful_projects(), 1);
    assert_eq!(h.ledger.failed_projects(), 0);

    let project = h.ledger.project(id).unwrap();
    assert_eq!(project.status, ProjectStatus::Settled);
    assert_eq!(project.outcome, Some(Outcome::Successful));
    assert_settlement_conserves(&project, &settlement, 500);
    assert_all_ledger_invariants(&h.ledger);
}

#[test]
fn test_failed_settlement_refunds_contributors() {
    let h = setup();
    let id = h.ledger.create_project(h.owner.clone(), 1_000, HOUR).unwrap();
    let alice = Identity::from("alice");

    h.ledger.fund_project(id, &alice, 300).unwrap();
    h.clock.advance(HOUR + 1);

    let settlement = h.ledger.settle_project(id).unwrap();
    assert_eq!(settlement.outcome, Outcome::Failed);
    assert_eq!(settlement.refunds, vec![(alice.clone(), 300)]);
    assert_eq!(settlement.payout, 0);
    assert_eq!(settlement.commission, 0);

    assert_eq!(h.book.balance_of(&alice), 300);
    assert_eq!(h.book.balance_of(&h.owner), 0);
    assert_eq!(h.ledger.commission_pool(), 0);
    assert_eq!(h.ledger.custody(), 0);
    assert_eq!(h.ledger.failed_projects(), 1);

    // Raised stays on record for audit.
    let project = h.ledger.project(id).unwrap();
    assert_eq!(project.raised, 300);
    assert_eq!(project.outcome, Some(Outcome::Failed));
    assert_settlement_conserves(&project, &settlement, 500);
    assert_all_ledger_invariants(&h.ledger);
}

#[test]
fn test_failed_settlement_refunds_each_contributor_exactly() {
    let h = setup();
    let id = h.ledger.create_project(h.owner.clone(), 10_000, HOUR).unwrap();
    let contributors: Vec<Identity> = (0..5).map(|i| Identity::new(format!("c{i}"))).collect();

    for (i, who) in contributors.iter().enumerate() {
        h.ledger.fund_project(id, who, (i as u128 + 1) * 100).unwrap();
        h.ledger.fund_project(id, who, 7).unwrap();
    }
    h.clock.advance(HOUR);
    let settlement = h.ledger.settle_project(id).unwrap();

    for (i, who) in contributors.iter().enumerate() {
        assert_eq!(h.book.balance_of(who), (i as u128 + 1) * 100 + 7);
    }
    assert_eq!(settlement.total_refunded(), 1_535);
    assert_eq!(h.book.total(), 1_535);
}

#[test]
fn test_goal_met_exactly_is_successful() {
    let h = setup();
    let id = h.ledger.create_project(h.owner.clone(), 1_000, HOUR).unwrap();
    h.ledger.fund_project(id, &Identity::from("alice"), 1_000).unwrap();
    h.clock.advance(HOUR);

    let settlement = h.ledger.settle_project(id).unwrap();
    assert_eq!(settlement.outcome, Outcome::Successful);
    assert_eq!(settlement.commission, 50);
    assert_eq!(settlement.payout, 950);
}

#[test]
fn test_commission_rounds_down_in_owner_favour() {
    let h = setup_with_rate(333);
    let id = h.ledger.create_project(h.owner.clone(), 1, HOUR).unwrap();
    h.ledger.fund_project(id, &Identity::from("alice"), 1_001).unwrap();
    h.clock.advance(HOUR);

    let settlement = h.ledger.settle_project(id).unwrap();
    // 1001 * 333 / 10000 = 33.3333 -> 33
    assert_eq!(settlement.commission, 33);
    assert_eq!(settlement.payout, 968);
    assert_eq!(settlement.payout + settlement.commission, 1_001);
}

#[test]
fn test_zero_and_full_commission_rates() {
    let free = setup_with_rate(0);
    let id = free.ledger.create_project(free.owner.clone(), 10, HOUR).unwrap();
    free.ledger.fund_project(id, &Identity::from("alice"), 10).unwrap();
    free.clock.advance(HOUR);
    let settlement = free.ledger.settle_project(id).unwrap();
    assert_eq!((settlement.payout, settlement.commission), (10, 0));
    assert_eq!(free.book.balance_of(&free.owner), 10);

    let greedy = setup_with_rate(10_000);
    let id = greedy.ledger.create_project(greedy.owner.clone(), 10, HOUR).unwrap();
    greedy.ledger.fund_project(id, &Identity::from("alice"), 10).unwrap();
    greedy.clock.advance(HOUR);
    let settlement = greedy.ledger.settle_project(id).unwrap();
    assert_eq!((settlement.payout, settlement.commission), (0, 10));
    assert_eq!(greedy.book.balance_of(&greedy.owner), 0);
    assert_eq!(greedy.ledger.commission_pool(), 10);
    assert_all_ledger_invariants(&greedy.ledger);
}

#[test]
fn test_settle_before_deadline_fails() {
    let h = setup();
    let id = h.ledger.create_project(h.owner.clone(), 1_000, HOUR).unwrap();
    h.ledger.fund_project(id, &Identity::from("alice"), 2_000).unwrap();
    h.clock.advance(HOUR - 10);

    assert_eq!(
        h.ledger.settle_project(id),
        Err(Error::NotYetExpired {
            project_id: id,
            remaining: 10
        })
    );
    assert_eq!(h.book.total(), 0);
    assert_eq!(h.ledger.project(id).unwrap().status, ProjectStatus::Active);
}

#[test]
fn test_second_settlement_moves_nothing() {
    let h = setup();
    let id = h.ledger.create_project(h.owner.clone(), 1_000, HOUR).unwrap();
    h.ledger.fund_project(id, &Identity::from("alice"), 1_100).unwrap();
    h.clock.advance(HOUR);
    h.ledger.settle_project(id).unwrap();

    let balances = h.book.snapshot();
    let pool = h.ledger.commission_pool();
    let events = h.ledger.events().len();

    assert_eq!(h.ledger.settle_project(id), Err(Error::AlreadySettled(id)));
    assert_eq!(h.book.snapshot(), balances);
    assert_eq!(h.ledger.commission_pool(), pool);
    assert_eq!(h.ledger.events().len(), events);
    assert_eq!(h.ledger.successful_projects(), 1);
}

#[test]
fn test_settled_project_rejects_funding_and_extension() {
    let h = setup();
    let id = h.ledger.create_project(h.owner.clone(), 1_000, HOUR).unwrap();
    h.clock.advance(HOUR);
    h.ledger.settle_project(id).unwrap();

    assert_eq!(
        h.ledger.fund_project(id, &Identity::from("alice"), 1),
        Err(Error::ProjectClosed(id))
    );
    assert_eq!(
        h.ledger.enhance_deadline(id, &h.owner, HOUR),
        Err(Error::ProjectClosed(id))
    );
}

#[test]
fn test_empty_failed_project_settles_without_refunds() {
    let h = setup();
    let id = h.ledger.create_project(h.owner.clone(), 1_000, HOUR).unwrap();
    h.clock.advance(HOUR);

    let settlement = h.ledger.settle_project(id).unwrap();
    assert_eq!(settlement.outcome, Outcome::Failed);
    assert!(settlement.refunds.is_empty());
    assert_eq!(h.ledger.failed_projects(), 1);
}

#[test]
fn test_settlement_of_maximal_raise_succeeds() {
    let h = setup();
    let whale = Identity::from("whale");
    let id = h.ledger.create_project(h.owner.clone(), 1, HOUR).unwrap();
    h.ledger.fund_project(id, &whale, u128::MAX).unwrap();
    h.clock.advance(HOUR);
    let before = h.ledger.project(id).unwrap();

    let settlement = h.ledger.settle_project(id).unwrap();
    assert_eq!(settlement.outcome, Outcome::Successful);
    assert_eq!(settlement.payout + settlement.commission, u128::MAX);
    assert_settlement_conserves(&before, &settlement, h.ledger.config().commission_rate_bps());
    assert_eq!(h.book.balance_of(&h.owner), settlement.payout);
    assert_eq!(h.ledger.commission_pool(), settlement.commission);
    assert_eq!(h.ledger.custody(), settlement.commission);
    assert_all_ledger_invariants(&h.ledger);
}

#[test]
fn test_outcome_counts_match_settled_projects() {
    let h = setup();
    let alice = Identity::from("alice");
    for i in 0..6u64 {
        let id = h.ledger.create_project(h.owner.clone(), 100, HOUR).unwrap();
        if i % 3 == 0 {
            h.ledger.fund_project(id, &alice, 100).unwrap();
        }
    }
    h.clock.advance(HOUR);

    for id in 0..6u64 {
        h.ledger.settle_project(id).unwrap();
        assert_eq!(
            h.ledger.successful_projects() + h.ledger.failed_projects(),
            id + 1
        );
        assert_all_ledger_invariants(&h.ledger);
    }
    assert_eq!(h.ledger.successful_projects(), 2);
    assert_eq!(h.ledger.failed_projects(), 4);
    assert_eq!(h.ledger.settled_projects(), 6);
}

#[test]
fn test_withdraw_commission() {
    let h = setup();
    let id = h.ledger.create_project(h.owner.clone(), 1_000, HOUR).unwrap();
    h.ledger.fund_project(id, &Identity::from("alice"), 1_100).unwrap();
    h.clock.advance(HOUR);
    h.ledger.settle_project(id).unwrap();

    assert_eq!(h.ledger.withdraw_commission(&h.operator).unwrap(), 55);
    assert_eq!(h.book.balance_of(&h.operator), 55);
    assert_eq!(h.ledger.commission_pool(), 0);
    assert_eq!(h.ledger.custody(), 0);
    assert_all_ledger_invariants(&h.ledger);

    // A drained pool withdraws nothing, without error.
    assert_eq!(h.ledger.withdraw_commission(&h.operator).unwrap(), 0);
    assert_eq!(h.book.balance_of(&h.operator), 55);
}

#[test]
fn test_withdraw_commission_with_empty_pool() {
    let h = setup();
    assert_eq!(h.ledger.withdraw_commission(&h.operator).unwrap(), 0);
    assert_eq!(h.book.total(), 0);
}

#[test]
fn test_withdraw_commission_by_non_operator_fails() {
    let h = setup();
    let id = h.ledger.create_project(h.owner.clone(), 1_000, HOUR).unwrap();
    h.ledger.fund_project(id, &Identity::from("alice"), 1_100).unwrap();
    h.clock.advance(HOUR);
    h.ledger.settle_project(id).unwrap();

    let err = h.ledger.withdraw_commission(&h.owner).unwrap_err();
    assert!(matches!(err, Error::Unauthorized { .. }));
    assert_eq!(
        err.to_string(),
        "owner is not authorized to withdraw commission"
    );
    assert_eq!(h.ledger.commission_pool(), 55);
    assert_eq!(h.book.balance_of(&h.owner), 1_045);
}

#[test]
fn test_commission_accumulates_across_projects() {
    let h = setup();
    let alice = Identity::from("alice");
    let a = h.ledger.create_project(h.owner.clone(), 100, HOUR).unwrap();
    let b = h.ledger.create_project(Identity::from("other"), 100, 2 * HOUR).unwrap();
    h.ledger.fund_project(a, &alice, 200).unwrap();
    h.ledger.fund_project(b, &alice, 400).unwrap();

    h.clock.advance(HOUR);
    h.ledger.settle_project(a).unwrap();
    assert_eq!(h.ledger.commission_pool(), 10);
    assert_eq!(h.ledger.custody(), 410);
    assert_all_ledger_invariants(&h.ledger);

    h.clock.advance(HOUR);
    h.ledger.settle_project(b).unwrap();
    assert_eq!(h.ledger.commission_pool(), 30);
    assert_eq!(h.ledger.withdraw_commission(&h.operator).unwrap(), 30);
    assert_eq!(h.book.total(), 600);
}
