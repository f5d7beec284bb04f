//! Behaviour every `MarketStore` backend must share.

use super::MarketStore;
use chrono::{Duration, TimeZone, Utc};
use exchange_core::{Citizen, Event, EventKind, MarketError, User, Vote, VoteType};

use crate::error::Error;

pub(crate) fn exercise(store: &dyn MarketStore) {
    let now = Utc.with_ymd_and_hms(2026, 4, 2, 10, 0, 0).unwrap();
    let today = now.date_naive();

    // Registration and alias uniqueness.
    let alice = User::new("ua".into(), "Unit-0001".into(), now);
    let alice_c = Citizen::new("ca".into(), "ua".into(), "Unit-0001".into(), now);
    store.insert_registration(&alice, &alice_c).unwrap();

    let dup = User::new("ux".into(), "UNIT-0001".into(), now);
    let dup_c = Citizen::new("cx".into(), "ux".into(), "UNIT-0001".into(), now);
    assert!(matches!(
        store.insert_registration(&dup, &dup_c),
        Err(Error::Market(MarketError::InvalidInput(_)))
    ));
    assert!(store.get_citizen("cx").unwrap().is_none());

    let bob = User::new("ub".into(), "Asset-0002".into(), now);
    let mut bob_c = Citizen::new("cb".into(), "ub".into(), "Asset-0002".into(), now);
    bob_c.index_value = 250.0;
    store.insert_registration(&bob, &bob_c).unwrap();

    assert_eq!(store.list_citizens().unwrap().len(), 2);
    let top = store.top_citizens(1).unwrap();
    assert_eq!(top[0].id, "cb");

    // Row updates: applied, declined, missing.
    let updated = store
        .update_citizen("ca", &mut |c| {
            c.index_value = 101.5;
            true
        })
        .unwrap()
        .unwrap();
    assert_eq!(updated.index_value, 101.5);

    let declined = store
        .update_citizen("ca", &mut |c| {
            c.index_value = 0.0;
            false
        })
        .unwrap()
        .unwrap();
    assert_eq!(declined.index_value, 101.5);
    assert_eq!(store.get_citizen("ca").unwrap().unwrap().index_value, 101.5);
    assert!(store.update_citizen("nobody", &mut |_| true).unwrap().is_none());

    let user = store
        .update_user("ua", &mut |u| {
            u.daily_quota_remaining -= 1;
            true
        })
        .unwrap()
        .unwrap();
    assert_eq!(user.daily_quota_remaining, 19);

    // Midnight snapshot copies the live Index.
    assert_eq!(store.snapshot_midnight(now).unwrap(), 2);
    let a = store.get_citizen("ca").unwrap().unwrap();
    assert_eq!(a.index_value_at_midnight_utc, 101.5);

    // Votes are counted per actor, target, type and day.
    for (i, vote_type) in [VoteType::Affirm, VoteType::Affirm, VoteType::Doubt]
        .into_iter()
        .enumerate()
    {
        let vote = Vote::new(
            format!("v{i}"),
            "ub".into(),
            "ca".into(),
            vote_type,
            0.75,
            now + Duration::seconds(i as i64),
        );
        assert!(store.record_vote(&vote, 2).unwrap());
    }
    let yesterday = Vote::new(
        "vy".into(),
        "ub".into(),
        "ca".into(),
        VoteType::Affirm,
        0.6,
        now - Duration::days(1),
    );
    assert!(store.record_vote(&yesterday, 2).unwrap());

    // A third same-type vote on the same day is not stored.
    let third = Vote::new(
        "v3".into(),
        "ub".into(),
        "ca".into(),
        VoteType::Affirm,
        0.5,
        now + Duration::seconds(10),
    );
    assert!(!store.record_vote(&third, 2).unwrap());

    assert_eq!(store.count_votes("ub", "ca", VoteType::Affirm, today).unwrap(), 2);
    assert_eq!(store.count_votes("ub", "ca", VoteType::Doubt, today).unwrap(), 1);
    assert_eq!(store.count_votes("ua", "cb", VoteType::Affirm, today).unwrap(), 0);

    let history = store.votes_by_actor("ub", 2).unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].id, "v2");

    // Removing a vote frees its slot.
    store.remove_vote(&history[0]).unwrap();
    assert_eq!(store.count_votes("ub", "ca", VoteType::Doubt, today).unwrap(), 0);
    store.remove_vote(&history[0]).unwrap();

    // Events come back newest first.
    for i in 0..5 {
        let mut event = Event::new(
            format!("e{i}"),
            EventKind::Vote,
            format!("event {i}"),
            now + Duration::seconds(i),
        );
        if i % 2 == 0 {
            event = event.with_target("ca");
        }
        store.append_event(&event).unwrap();
    }
    let recent = store.recent_events(3).unwrap();
    let ids: Vec<_> = recent.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, ["e4", "e3", "e2"]);

    let for_a = store.events_for_citizen("ca", 10).unwrap();
    let ids: Vec<_> = for_a.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, ["e4", "e2", "e0"]);
    assert!(store.recent_events(0).unwrap().is_empty());

    // System state singleton.
    assert!(!store.system_state().unwrap().is_halted(now));
    store.init_system_state().unwrap();
    let state = store
        .update_system_state(&mut |s| s.halt_for(now, Duration::minutes(2)))
        .unwrap();
    assert!(state.is_halted(now + Duration::seconds(30)));
    assert_eq!(store.system_state().unwrap(), state);
}
