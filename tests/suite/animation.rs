//! Animation replay timing and ordering against virtual time

use std::time::Duration;

use petriflow_engine::{AnimationScheduler, AnimationSettings};
use petriflow_types::{AnimationSpeed, AnimationStepKind, Marking, PlaceId};
use tokio::time::Instant;

use crate::common::event;

fn seeded() -> Marking {
    [(PlaceId::new("p_ready"), 2), (PlaceId::new("p_deployed"), 0)]
        .into_iter()
        .collect()
}

#[tokio::test(start_paused = true)]
async fn removals_land_before_additions_at_the_configured_offsets() {
    let (mut scheduler, mut commands) = AnimationScheduler::new(AnimationSettings::default());
    scheduler.load(seeded());
    scheduler.start();
    let started = Instant::now();

    let trace = vec![event(1, &[("p_ready", 1)], &[("p_deployed", 1)])];
    assert_eq!(scheduler.observe(&trace), 2);

    let removal = commands.recv().await.unwrap();
    assert_eq!(removal.kind, AnimationStepKind::Removal);
    assert_eq!(started.elapsed(), Duration::ZERO);

    let addition = commands.recv().await.unwrap();
    assert_eq!(addition.kind, AnimationStepKind::Addition);
    // Removal pacing (300ms) plus the removal window (500ms).
    assert_eq!(started.elapsed(), Duration::from_millis(800));

    let marking = scheduler.animated_marking();
    assert_eq!(marking.tokens(&PlaceId::new("p_ready")), 1);
    assert_eq!(marking.tokens(&PlaceId::new("p_deployed")), 1);
}

#[tokio::test(start_paused = true)]
async fn events_replay_in_trace_order_at_double_speed() {
    let (mut scheduler, mut commands) = AnimationScheduler::new(AnimationSettings::default());
    scheduler.load(seeded());
    scheduler.set_speed(AnimationSpeed::new(2.0).unwrap());
    scheduler.start();
    let started = Instant::now();

    let trace = vec![
        event(1, &[("p_ready", 1)], &[("p_deployed", 1)]),
        event(2, &[("p_ready", 1)], &[("p_deployed", 1)]),
    ];
    scheduler.observe(&trace);

    let mut sequences = Vec::new();
    let mut kinds = Vec::new();
    for _ in 0..4 {
        let command = commands.recv().await.unwrap();
        sequences.push(command.sequence);
        kinds.push(command.kind);
    }
    assert!(sequences.windows(2).all(|pair| pair[0] < pair[1]));
    assert_eq!(
        kinds,
        vec![
            AnimationStepKind::Removal,
            AnimationStepKind::Addition,
            AnimationStepKind::Removal,
            AnimationStepKind::Addition,
        ]
    );
    // Each event takes 150 + 250 + 150ms at 2x; the last addition lands at
    // 550 (first event) + 150 + 250.
    assert_eq!(started.elapsed(), Duration::from_millis(950));
    assert_eq!(scheduler.cursor(), 2);
    assert_eq!(
        scheduler.animated_marking().tokens(&PlaceId::new("p_deployed")),
        2
    );
}

#[tokio::test(start_paused = true)]
async fn a_stopped_scheduler_queues_nothing() {
    let (mut scheduler, mut commands) = AnimationScheduler::new(AnimationSettings::default());
    let trace = vec![event(1, &[("p_ready", 1)], &[("p_deployed", 1)])];

    assert_eq!(scheduler.observe(&trace), 0);
    assert_eq!(scheduler.cursor(), 0);

    scheduler.start();
    assert_eq!(scheduler.observe(&trace), 2);
    assert!(commands.recv().await.is_some());
}
