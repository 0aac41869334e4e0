//! End-to-end walks of the reselection policy, driven the way the router
//! drives it: a load decision before each retry, an attempt notification
//! after each host selection, and a retry verdict after each failure.

mod support;

use retry_policy::{PriorityLoad, ReselectConfig, ReselectRetryPriority, RetryPriority};
use support::{
    init_tracing, mk_host, mk_labeled_host, mk_priority_set, mk_unhealthy_host, mapper_for,
};

#[test]
fn failover_reselects_move_load_down_the_primary_range() {
    init_tracing();
    let set = mk_priority_set(vec![
        vec![
            mk_host("chf1.svc", "10.0.0.1:80", "chf-pool"),
            mk_host("chf2.svc", "10.0.0.2:80", "chf-pool"),
        ],
        vec![
            mk_host("chf3.svc", "10.0.1.1:80", "chf-pool"),
            mk_host("chf4.svc", "10.0.1.2:80", "chf-pool"),
        ],
        vec![
            mk_host("chf5.svc", "10.0.2.1:80", "chf-pool"),
            mk_host("chf6.svc", "10.0.2.2:80", "chf-pool"),
        ],
    ]);
    let mapper = mapper_for(&set);
    let original = PriorityLoad::from_healthy(vec![100, 0, 0]);
    let mut policy = ReselectRetryPriority::new(ReselectConfig {
        failover_reselects: 2,
        ..Default::default()
    });

    let load = policy.determine_priority_load(&set, &original, &mapper, &[]);
    assert_eq!(load.healthy, vec![100, 0, 0]);
    assert_eq!(load.total(), 100);

    policy.on_host_attempted(&set.host_sets()[0].hosts[0]);
    assert!(policy.should_retry());

    // The first retry stays on level 0: one of its hosts is untried.
    let load = policy.determine_priority_load(&set, &original, &mapper, &[]);
    assert_eq!(load.healthy, vec![100, 0, 0]);
    policy.on_host_attempted(&set.host_sets()[0].hosts[1]);
    assert_eq!(policy.failover_reselects(), 1);
    assert!(policy.should_retry());

    // Level 0 is spent; the second retry reselects to level 1.
    let load = policy.determine_priority_load(&set, &original, &mapper, &[]);
    assert_eq!(load.healthy, vec![0, 100, 0]);
    assert_eq!(load.total(), 100);
    assert!(policy.should_retry());

    // The last failover reselect is consumed by the attempt itself, so no
    // further retry is allowed even though level 1 has an untried host.
    policy.on_host_attempted(&set.host_sets()[1].hosts[0]);
    assert_eq!(policy.failover_reselects(), 0);
    assert!(!policy.should_retry());
}

#[test]
fn zero_failover_budget_jumps_straight_to_the_last_resort_range() {
    init_tracing();
    let set = mk_priority_set(vec![
        vec![
            mk_host("chf1.svc", "10.0.0.1:80", "chf-pool"),
            mk_host("chf2.svc", "10.0.0.2:80", "chf-pool"),
        ],
        vec![
            mk_host("chf3.svc", "10.0.1.1:80", "chf-pool"),
            mk_host("chf4.svc", "10.0.1.2:80", "chf-pool"),
        ],
        vec![
            mk_host("chf5.svc", "10.0.2.1:80", "chf-pool"),
            mk_host("chf6.svc", "10.0.2.2:80", "chf-pool"),
        ],
        vec![
            mk_host("lr1.svc", "10.0.9.1:80", "chf-lr-pool"),
            mk_host("lr2.svc", "10.0.9.2:80", "chf-lr-pool"),
        ],
    ]);
    let mapper = mapper_for(&set);
    let original = PriorityLoad::from_healthy(vec![100, 0, 0, 0]);
    let mut policy = ReselectRetryPriority::new(ReselectConfig {
        last_resort_reselects: 1,
        ..Default::default()
    });

    let load = policy.determine_priority_load(&set, &original, &mapper, &[]);
    assert_eq!(load.healthy, vec![100, 0, 0, 0]);
    policy.on_host_attempted(&set.host_sets()[0].hosts[0]);
    assert!(policy.should_retry());

    // No failover budget: the retry jumps over the remaining primary
    // levels into the last-resort pool.
    let load = policy.determine_priority_load(&set, &original, &mapper, &[]);
    assert_eq!(load.healthy, vec![0, 0, 0, 100]);
    assert_eq!(load.total(), 100);
    assert_eq!(policy.failover_reselects(), 0);
    assert_eq!(policy.last_resort_reselects(), 1);

    policy.on_host_attempted(&set.host_sets()[3].hosts[0]);
    assert_eq!(policy.last_resort_reselects(), 0);
    assert!(!policy.should_retry());

    // The jump is one-way: the load never points back at the primaries.
    let load = policy.determine_priority_load(&set, &original, &mapper, &[]);
    assert_eq!(load.healthy, vec![0, 0, 0, 100]);
}

#[test]
fn temporary_blocking_advances_once_healthy_hosts_are_spent() {
    init_tracing();
    let set = mk_priority_set(vec![
        vec![
            mk_host("chf1.svc", "10.0.0.1:80", "chf-pool"),
            mk_host("chf2.svc", "10.0.0.2:80", "chf-pool"),
            mk_unhealthy_host("chf3.svc", "10.0.0.3:80", "chf-pool"),
        ],
        vec![
            mk_host("chf4.svc", "10.0.1.1:80", "chf-pool"),
            mk_host("chf5.svc", "10.0.1.2:80", "chf-pool"),
        ],
    ]);
    let mapper = mapper_for(&set);
    let original = PriorityLoad::from_healthy(vec![100, 0]);
    let mut policy = ReselectRetryPriority::new(ReselectConfig {
        failover_reselects: 3,
        support_temporary_blocking: true,
        ..Default::default()
    });

    // Level 0 is only 2/3 healthy, so some load spills to level 1.
    let load = policy.determine_priority_load(&set, &original, &mapper, &[]);
    assert_eq!(load.healthy, vec![93, 7]);
    assert_eq!(load.total(), 100);

    policy.on_host_attempted(&set.host_sets()[0].hosts[0]);
    assert!(policy.should_retry());
    let load = policy.determine_priority_load(&set, &original, &mapper, &[]);
    assert_eq!(load.healthy, vec![93, 7]);

    // Two attempts exhaust the level: the unhealthy host never held a slot.
    policy.on_host_attempted(&set.host_sets()[0].hosts[1]);
    assert!(policy.should_retry());
    let load = policy.determine_priority_load(&set, &original, &mapper, &[]);
    assert_eq!(load.healthy, vec![0, 100]);
}

#[test]
fn loop_prevention_discounts_via_listed_hosts() {
    init_tracing();
    let set = mk_priority_set(vec![
        vec![
            mk_host("scp1.example", "10.0.0.1:80", "chf-pool"),
            mk_host("chf2.svc", "10.0.0.2:80", "chf-pool"),
            mk_host("chf3.svc", "10.0.0.3:80", "chf-pool"),
        ],
        vec![mk_host("chf4.svc", "10.0.1.1:80", "chf-pool")],
    ]);
    let mapper = mapper_for(&set);
    let original = PriorityLoad::from_healthy(vec![100, 0]);
    let via = vec!["scp1.example".to_string()];
    let mut policy = ReselectRetryPriority::new(ReselectConfig {
        failover_reselects: 2,
        support_loop_prevention: true,
        ..Default::default()
    });

    let load = policy.determine_priority_load(&set, &original, &mapper, &via);
    assert_eq!(load.healthy, vec![100, 0]);

    policy.on_host_attempted(&set.host_sets()[0].hosts[1]);
    assert!(policy.should_retry());
    let load = policy.determine_priority_load(&set, &original, &mapper, &via);
    assert_eq!(load.healthy, vec![100, 0]);

    // Two attempts exhaust the level: the via-listed host never counted.
    policy.on_host_attempted(&set.host_sets()[0].hosts[2]);
    assert!(policy.should_retry());
    let load = policy.determine_priority_load(&set, &original, &mapper, &via);
    assert_eq!(load.healthy, vec![0, 100]);
}

#[test]
fn loop_prevention_is_dropped_for_requests_without_via_entries() {
    init_tracing();
    let set = mk_priority_set(vec![
        vec![
            mk_host("scp1.example", "10.0.0.1:80", "chf-pool"),
            mk_host("chf2.svc", "10.0.0.2:80", "chf-pool"),
            mk_host("chf3.svc", "10.0.0.3:80", "chf-pool"),
        ],
        vec![mk_host("chf4.svc", "10.0.1.1:80", "chf-pool")],
    ]);
    let mapper = mapper_for(&set);
    let original = PriorityLoad::from_healthy(vec![100, 0]);
    let mut policy = ReselectRetryPriority::new(ReselectConfig {
        failover_reselects: 2,
        support_loop_prevention: true,
        ..Default::default()
    });

    // The first decision sees no via entries, so the feature is dropped
    // for the rest of the request and all three hosts count.
    let load = policy.determine_priority_load(&set, &original, &mapper, &[]);
    assert_eq!(load.healthy, vec![100, 0]);
    policy.on_host_attempted(&set.host_sets()[0].hosts[1]);
    assert!(policy.should_retry());

    // A via list appearing on a later call does not revive it.
    let via = vec!["chf3.svc".to_string()];
    let load = policy.determine_priority_load(&set, &original, &mapper, &via);
    assert_eq!(load.healthy, vec![100, 0]);
    policy.on_host_attempted(&set.host_sets()[0].hosts[2]);
    assert!(policy.should_retry());

    // After two attempts a third host still holds the level open.
    let load = policy.determine_priority_load(&set, &original, &mapper, &via);
    assert_eq!(load.healthy, vec![100, 0]);
}

#[test]
fn preferred_host_retries_precede_any_reselection() {
    init_tracing();
    let set = mk_priority_set(vec![
        vec![
            mk_host("chf1.svc", "10.0.0.1:80", "chf-pool"),
            mk_host("chf2.svc", "10.0.0.2:80", "chf-pool"),
        ],
        vec![mk_host("chf3.svc", "10.0.1.1:80", "chf-pool")],
    ]);
    let mapper = mapper_for(&set);
    let original = PriorityLoad::from_healthy(vec![100, 0]);
    let mut policy = ReselectRetryPriority::new(ReselectConfig {
        preferred_host_retries: 2,
        failover_reselects: 1,
        ..Default::default()
    });

    // The initial attempt is free; it does not consume the budget.
    policy.on_host_attempted(&set.host_sets()[0].hosts[0]);
    assert_eq!(policy.preferred_host_retries(), 2);
    assert!(policy.should_retry());

    let load = policy.determine_priority_load(&set, &original, &mapper, &[]);
    assert_eq!(load.healthy, vec![100, 0]);

    policy.on_host_attempted(&set.host_sets()[0].hosts[0]);
    assert_eq!(policy.preferred_host_retries(), 1);
    assert!(policy.should_retry());

    let load = policy.determine_priority_load(&set, &original, &mapper, &[]);
    assert_eq!(load.healthy, vec![100, 0]);

    policy.on_host_attempted(&set.host_sets()[0].hosts[0]);
    assert_eq!(policy.preferred_host_retries(), 0);
    assert!(policy.should_retry());

    // With the preferred budget spent, the walk switches to reselection.
    let load = policy.determine_priority_load(&set, &original, &mapper, &[]);
    assert_eq!(load.healthy, vec![100, 0]);
    policy.on_host_attempted(&set.host_sets()[0].hosts[1]);
    assert_eq!(policy.failover_reselects(), 0);
    assert!(!policy.should_retry());
}

#[test]
fn dual_stack_preferred_entries_debit_their_level_once() {
    init_tracing();
    // One logical server enumerated twice, labeled alike.
    let v4 = mk_labeled_host("chf1.svc", "10.0.0.1:80", "chf1");
    let v6 = mk_labeled_host("chf1.svc", "[2001:db8::1]:80", "chf1");
    let set = mk_priority_set(vec![
        vec![v4.clone(), v6.clone()],
        vec![
            mk_host("chf2.svc", "10.0.1.1:80", "chf-pool"),
            mk_host("chf3.svc", "10.0.1.2:80", "chf-pool"),
        ],
    ]);
    let mapper = mapper_for(&set);
    let original = PriorityLoad::from_healthy(vec![100, 0]);
    let mut policy = ReselectRetryPriority::new(ReselectConfig {
        preferred_host_retries: 1,
        failover_reselects: 2,
        ..Default::default()
    });

    policy.on_host_attempted(&v4);
    assert!(policy.should_retry());

    // The first decision debits the attempted entry against level 0, so
    // one eligible host remains there.
    let load = policy.determine_priority_load(&set, &original, &mapper, &[]);
    let first = load.healthy.clone();
    assert_eq!(first, vec![100, 0]);

    // The preferred retry arrives through the other address family.
    policy.on_host_attempted(&v6);
    assert_eq!(policy.preferred_host_retries(), 0);
    assert!(policy.should_retry());

    // Nothing moved: the cached distribution stands.
    let load = policy.determine_priority_load(&set, &original, &mapper, &[]);
    assert_eq!(load.healthy, first);

    policy.on_host_attempted(&v4);
    assert!(policy.should_retry());
    let load = policy.determine_priority_load(&set, &original, &mapper, &[]);
    assert_eq!(load.healthy, vec![0, 100]);
    assert_eq!(policy.failover_reselects(), 1);
}

#[test]
fn walks_empty_levels_and_hands_over_to_the_last_resort_range() {
    init_tracing();
    let set = mk_priority_set(vec![
        vec![mk_host("chf1.svc", "10.0.0.1:80", "chf-pool")],
        vec![],
        vec![mk_host("chf2.svc", "10.0.2.1:80", "chf-pool")],
        vec![mk_host("lr1.svc", "10.0.9.1:80", "chf-lr-pool")],
    ]);
    let mapper = mapper_for(&set);
    let original = PriorityLoad::from_healthy(vec![100, 0, 0, 0]);
    let mut policy = ReselectRetryPriority::new(ReselectConfig {
        failover_reselects: 2,
        last_resort_reselects: 1,
        ..Default::default()
    });

    let load = policy.determine_priority_load(&set, &original, &mapper, &[]);
    assert_eq!(load.healthy, vec![100, 0, 0, 0]);
    policy.on_host_attempted(&set.host_sets()[0].hosts[0]);
    assert!(policy.should_retry());

    // The empty level is skipped outright.
    let load = policy.determine_priority_load(&set, &original, &mapper, &[]);
    assert_eq!(load.healthy, vec![0, 0, 100, 0]);
    assert_eq!(policy.last_resort_reselects(), 1);

    // Attempting the last primary host burns the leftover failover budget:
    // there is nowhere in the primary range left to spend it.
    policy.on_host_attempted(&set.host_sets()[2].hosts[0]);
    assert_eq!(policy.failover_reselects(), 0);
    assert!(policy.should_retry());

    let load = policy.determine_priority_load(&set, &original, &mapper, &[]);
    assert_eq!(load.healthy, vec![0, 0, 0, 100]);

    policy.on_host_attempted(&set.host_sets()[3].hosts[0]);
    assert_eq!(policy.last_resort_reselects(), 0);
    assert!(!policy.should_retry());
}

#[test]
fn all_unavailable_levels_fall_back_to_the_original_load() {
    init_tracing();
    let set = mk_priority_set(vec![
        vec![mk_unhealthy_host("chf1.svc", "10.0.0.1:80", "chf-pool")],
        vec![mk_unhealthy_host("chf2.svc", "10.0.1.1:80", "chf-pool")],
    ]);
    let mapper = mapper_for(&set);
    let original = PriorityLoad::from_healthy(vec![100, 0]);
    let mut policy = ReselectRetryPriority::new(ReselectConfig {
        failover_reselects: 1,
        support_temporary_blocking: true,
        ..Default::default()
    });

    // No level has any availability: the caller's own vector comes back,
    // keeping whatever handling the balancer applies in that state.
    let load = policy.determine_priority_load(&set, &original, &mapper, &[]);
    assert!(std::ptr::eq(load, &original));

    policy.on_host_attempted(&set.host_sets()[0].hosts[0]);
    assert!(!policy.should_retry());
}

#[test]
fn an_all_zero_original_load_is_returned_untouched() {
    init_tracing();
    let set = mk_priority_set(vec![vec![mk_host("chf1.svc", "10.0.0.1:80", "chf-pool")]]);
    let mapper = mapper_for(&set);
    let original = PriorityLoad::from_healthy(vec![0]);
    let mut policy = ReselectRetryPriority::new(ReselectConfig {
        failover_reselects: 1,
        ..Default::default()
    });

    let load = policy.determine_priority_load(&set, &original, &mapper, &[]);
    assert!(std::ptr::eq(load, &original));
}

#[test]
fn an_empty_level_zero_declines_the_decision() {
    init_tracing();
    let set = mk_priority_set(vec![
        vec![],
        vec![mk_host("chf1.svc", "10.0.1.1:80", "chf-pool")],
    ]);
    let mapper = mapper_for(&set);
    let original = PriorityLoad::from_healthy(vec![0, 100]);
    let mut policy = ReselectRetryPriority::new(ReselectConfig {
        failover_reselects: 1,
        ..Default::default()
    });

    let load = policy.determine_priority_load(&set, &original, &mapper, &[]);
    assert!(std::ptr::eq(load, &original));
}

#[test]
fn an_unconfigured_policy_never_permits_a_retry() {
    init_tracing();
    let set = mk_priority_set(vec![vec![
        mk_host("chf1.svc", "10.0.0.1:80", "chf-pool"),
        mk_host("chf2.svc", "10.0.0.2:80", "chf-pool"),
    ]]);
    let mapper = mapper_for(&set);
    let original = PriorityLoad::from_healthy(vec![100]);
    let mut policy = ReselectRetryPriority::new(ReselectConfig::default());

    assert!(!policy.should_retry());

    let load = policy.determine_priority_load(&set, &original, &mapper, &[]);
    assert_eq!(load.healthy, vec![100]);
    policy.on_host_attempted(&set.host_sets()[0].hosts[0]);
    assert!(!policy.should_retry());

    // Budgets saturate: further attempts cannot push them below zero.
    policy.on_host_attempted(&set.host_sets()[0].hosts[1]);
    policy.on_host_attempted(&set.host_sets()[0].hosts[0]);
    assert_eq!(policy.preferred_host_retries(), 0);
    assert_eq!(policy.failover_reselects(), 0);
    assert_eq!(policy.last_resort_reselects(), 0);
    assert!(!policy.should_retry());
}
