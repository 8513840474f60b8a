//! Run-loop scenarios: ordering, bounds, resumability, failures.

use crate::entity::{Entity, EntityId, HandlerTable, Payload};
use crate::error::{SimError, SimResult};
use crate::event::{EventName, Sequence};
use crate::model::{Context, Model, ModelState, RunLimits, StopReason};
use crate::time::VirtualTime;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// ── Test entity types ─────────────────────────────────────────────────

/// Records `(time, tag)` for every "mark" it receives.
#[derive(Debug, Default)]
struct Recorder {
    marks: Vec<(f64, String)>,
}

impl Recorder {
    fn mark(&mut self, ctx: &mut Context<'_>, payload: &Payload) -> SimResult<()> {
        let tag = match payload {
            Payload::Empty => String::new(),
            other => other.as_text()?.to_string(),
        };
        self.marks.push((ctx.now().as_f64(), tag));
        Ok(())
    }

    /// Marks now, then re-marks itself `payload` time units later.
    fn echo(&mut self, ctx: &mut Context<'_>, payload: &Payload) -> SimResult<()> {
        self.marks.push((ctx.now().as_f64(), "echo".into()));
        ctx.schedule_self(payload.as_float()?, "mark", "echoed")?;
        Ok(())
    }

    /// Sends "late" to itself for now, behind anything already queued.
    fn defer(&mut self, ctx: &mut Context<'_>, _payload: &Payload) -> SimResult<()> {
        let me = ctx.me();
        ctx.send(me, "mark", "late")?;
        Ok(())
    }

    fn spawn_child(&mut self, ctx: &mut Context<'_>, _payload: &Payload) -> SimResult<()> {
        let child = ctx.spawn::<Recorder>(Payload::Empty)?;
        ctx.schedule_after(1.0, child, "mark", "born")?;
        Ok(())
    }

    fn rewind(&mut self, ctx: &mut Context<'_>, _payload: &Payload) -> SimResult<()> {
        let me = ctx.me();
        let past = ctx.now().plus(-1.0);
        ctx.schedule(past, me, "mark", Payload::Empty)?;
        Ok(())
    }

    /// Cancels the event whose raw sequence is the payload.
    fn revoke(&mut self, ctx: &mut Context<'_>, payload: &Payload) -> SimResult<()> {
        let target = Sequence::new(payload.as_int()? as u64);
        let revoked = ctx.cancel(target);
        let tag = format!("revoked={} pending={}", revoked, ctx.pending_count());
        self.marks.push((ctx.now().as_f64(), tag));
        Ok(())
    }

    /// Creates an entity by type name and marks it half a unit later.
    fn adopt(&mut self, ctx: &mut Context<'_>, payload: &Payload) -> SimResult<()> {
        let child = ctx.add(payload.as_text()?, Payload::Empty)?;
        ctx.schedule_after(0.5, child, "mark", "adopted")?;
        Ok(())
    }

    fn times(&self) -> Vec<f64> {
        self.marks.iter().map(|(t, _)| *t).collect()
    }

    fn tags(&self) -> Vec<&str> {
        self.marks.iter().map(|(_, tag)| tag.as_str()).collect()
    }
}

impl Entity for Recorder {
    const TYPE_NAME: &'static str = "recorder";

    fn create(_id: EntityId, _args: &Payload) -> SimResult<Self> {
        Ok(Recorder::default())
    }

    fn bind(table: &mut HandlerTable<Self>) -> SimResult<()> {
        table
            .on("mark", Self::mark)?
            .on("echo", Self::echo)?
            .on("defer", Self::defer)?
            .on("spawn_child", Self::spawn_child)?
            .on("rewind", Self::rewind)?
            .on("revoke", Self::revoke)?
            .on("adopt", Self::adopt)?;
        Ok(())
    }
}

/// Single server that reschedules its own arrivals every 1.0 and
/// serves for a fixed time taken from its constructor args.
#[derive(Debug)]
struct Server {
    service: f64,
    busy: bool,
    arrivals: u32,
    served: u32,
    rejected: u32,
}

impl Server {
    fn arrival(&mut self, ctx: &mut Context<'_>, _payload: &Payload) -> SimResult<()> {
        self.arrivals += 1;
        ctx.schedule_self(1.0, "arrival", Payload::Empty)?;
        if self.busy {
            self.rejected += 1;
        } else {
            self.busy = true;
            ctx.schedule_self(self.service, "finish", Payload::Empty)?;
        }
        Ok(())
    }

    fn finish(&mut self, _ctx: &mut Context<'_>, _payload: &Payload) -> SimResult<()> {
        self.busy = false;
        self.served += 1;
        Ok(())
    }
}

impl Entity for Server {
    const TYPE_NAME: &'static str = "server";

    fn create(_id: EntityId, args: &Payload) -> SimResult<Self> {
        Ok(Server {
            service: args.as_float()?,
            busy: false,
            arrivals: 0,
            served: 0,
            rejected: 0,
        })
    }

    fn bind(table: &mut HandlerTable<Self>) -> SimResult<()> {
        table.on("arrival", Self::arrival)?;
        table.on("finish", Self::finish)?;
        Ok(())
    }
}

fn recorder_model() -> (Model, EntityId) {
    init_logging();
    let mut model = Model::new();
    model.register_type::<Recorder>().unwrap();
    let rec = model.add("recorder", Payload::Empty).unwrap();
    (model, rec)
}

fn server_model(service: f64) -> (Model, EntityId) {
    init_logging();
    let mut model = Model::new();
    model.register_type::<Server>().unwrap();
    let server = model.add("server", service).unwrap();
    model.send(server, "arrival", Payload::Empty).unwrap();
    (model, server)
}

// ── Ordering ──────────────────────────────────────────────────────────

#[test]
fn test_dispatch_times_are_sorted_rearrangement() {
    let (mut model, rec) = recorder_model();
    let times = [5.0, 1.0, 3.0, 1.0, 2.5, 0.0, 4.75];
    for t in times {
        model.schedule(t, rec, "mark", Payload::Empty).unwrap();
    }

    let report = model.run(RunLimits::unbounded()).unwrap();
    assert_eq!(report.processed, times.len() as u64);
    assert_eq!(report.stop, StopReason::Exhausted);

    let observed = model.entity::<Recorder>(rec).unwrap().times();
    let mut expected = times.to_vec();
    expected.sort_by(f64::total_cmp);
    assert_eq!(observed, expected);
    assert_eq!(model.time(), VirtualTime::new(5.0));
}

#[test]
fn test_equal_times_dispatch_in_scheduling_order() {
    let (mut model, rec) = recorder_model();
    model.schedule(2.0, rec, "mark", "A").unwrap();
    model.schedule(1.0, rec, "mark", "first").unwrap();
    model.schedule(2.0, rec, "mark", "B").unwrap();
    model.schedule(2.0, rec, "mark", "C").unwrap();

    model.run(RunLimits::unbounded()).unwrap();
    assert_eq!(
        model.entity::<Recorder>(rec).unwrap().tags(),
        vec!["first", "A", "B", "C"]
    );
}

#[test]
fn test_send_from_handler_runs_after_queued_same_time_events() {
    let (mut model, rec) = recorder_model();
    model.schedule(1.0, rec, "defer", Payload::Empty).unwrap();
    model.schedule(1.0, rec, "mark", "queued").unwrap();

    model.run(RunLimits::unbounded()).unwrap();
    let recorder = model.entity::<Recorder>(rec).unwrap();
    assert_eq!(recorder.tags(), vec!["queued", "late"]);
    assert_eq!(recorder.times(), vec![1.0, 1.0]);
}

#[test]
fn test_handler_schedules_followup() {
    let (mut model, rec) = recorder_model();
    model.schedule(1.0, rec, "echo", 0.25).unwrap();

    model.run(RunLimits::unbounded()).unwrap();
    let recorder = model.entity::<Recorder>(rec).unwrap();
    assert_eq!(recorder.tags(), vec!["echo", "echoed"]);
    assert_eq!(recorder.times(), vec![1.0, 1.25]);
}

// ── Scheduling errors ─────────────────────────────────────────────────

#[test]
fn test_scheduling_into_the_past_is_rejected() {
    let (mut model, rec) = recorder_model();
    model.schedule(5.0, rec, "mark", "now").unwrap();
    model.schedule(7.0, rec, "mark", "later").unwrap();
    model.schedule(6.0, rec, "mark", "sooner").unwrap();
    model.run(RunLimits::events(1)).unwrap();
    assert_eq!(model.time(), VirtualTime::new(5.0));

    let err = model.schedule(4.999, rec, "mark", "past").unwrap_err();
    assert_eq!(
        err,
        SimError::InvalidTime {
            requested: VirtualTime::new(4.999),
            current: VirtualTime::new(5.0),
        }
    );

    // Prior contents are untouched and keep their order.
    assert_eq!(model.pending(), 2);
    model.run(RunLimits::unbounded()).unwrap();
    assert_eq!(
        model.entity::<Recorder>(rec).unwrap().tags(),
        vec!["now", "sooner", "later"]
    );
}

#[test]
fn test_scheduling_at_current_time_is_allowed() {
    let (mut model, rec) = recorder_model();
    model.schedule(3.0, rec, "mark", Payload::Empty).unwrap();
    model.run(RunLimits::unbounded()).unwrap();
    assert!(model.schedule(3.0, rec, "mark", Payload::Empty).is_ok());
    assert!(model.send(rec, "mark", Payload::Empty).is_ok());
    assert_eq!(model.pending(), 2);
}

#[test]
fn test_nan_time_is_rejected() {
    let (mut model, rec) = recorder_model();
    let err = model.schedule(f64::NAN, rec, "mark", Payload::Empty).unwrap_err();
    assert!(matches!(err, SimError::InvalidTime { .. }));
    assert_eq!(model.pending(), 0);
}

#[test]
fn test_negative_zero_counts_as_now() {
    let (mut model, rec) = recorder_model();
    assert!(model.schedule(-0.0, rec, "mark", Payload::Empty).is_ok());
    let report = model.run(RunLimits::until(0.0)).unwrap();
    assert_eq!(report.processed, 1);
}

#[test]
fn test_nan_time_bound_is_rejected() {
    let (mut model, rec) = recorder_model();
    model.schedule(5.0, rec, "mark", Payload::Empty).unwrap();
    let err = model.run(RunLimits::until(f64::NAN)).unwrap_err();
    assert!(matches!(err, SimError::Config(_)));
    assert_eq!(model.pending(), 1);
    assert_eq!(model.events_processed(), 0);
}

#[test]
fn test_negative_delay_is_rejected() {
    let (mut model, rec) = recorder_model();
    let err = model
        .schedule_after(-0.5, rec, "mark", Payload::Empty)
        .unwrap_err();
    assert!(matches!(err, SimError::InvalidTime { .. }));
}

#[test]
fn test_handler_scheduling_into_the_past_aborts_run() {
    let (mut model, rec) = recorder_model();
    model.schedule(2.0, rec, "rewind", Payload::Empty).unwrap();
    let err = model.run(RunLimits::unbounded()).unwrap_err();
    assert_eq!(
        err,
        SimError::InvalidTime {
            requested: VirtualTime::new(1.0),
            current: VirtualTime::new(2.0),
        }
    );
    assert!(model.is_finished());
}

#[test]
fn test_scheduling_for_unknown_entity_is_rejected() {
    let (mut model, _rec) = recorder_model();
    let ghost = EntityId::new(99);
    let err = model.send(ghost, "mark", Payload::Empty).unwrap_err();
    assert_eq!(err, SimError::UnknownEntity(ghost));
    assert_eq!(model.pending(), 0);
}

// ── Bounds and resumability ───────────────────────────────────────────

#[test]
fn test_time_bound_leaves_later_events_queued() {
    let (mut model, rec) = recorder_model();
    for t in [1.0, 2.0, 3.0, 3.5, 8.0] {
        model.schedule(t, rec, "mark", Payload::Empty).unwrap();
    }

    let report = model.run(RunLimits::until(3.0)).unwrap();
    assert_eq!(report.processed, 3);
    assert_eq!(report.stop, StopReason::TimeLimit);
    assert_eq!(report.now, VirtualTime::new(3.0));
    assert_eq!(model.peek_time(), Some(VirtualTime::new(3.5)));
    assert_eq!(model.state(), ModelState::Idle);
    assert!(model
        .entity::<Recorder>(rec)
        .unwrap()
        .times()
        .iter()
        .all(|t| *t <= 3.0));

    let report = model.run(RunLimits::until(100.0)).unwrap();
    assert_eq!(report.processed, 2);
    assert_eq!(report.stop, StopReason::Exhausted);
    assert_eq!(
        model.entity::<Recorder>(rec).unwrap().times(),
        vec![1.0, 2.0, 3.0, 3.5, 8.0]
    );
}

#[test]
fn test_event_bound_counts_per_call() {
    let (mut model, rec) = recorder_model();
    for t in 0..10 {
        model.schedule(t as f64, rec, "mark", Payload::Empty).unwrap();
    }

    let first = model.run(RunLimits::events(4)).unwrap();
    assert_eq!(first.processed, 4);
    assert_eq!(first.stop, StopReason::EventLimit);

    let second = model.run(RunLimits::events(4)).unwrap();
    assert_eq!(second.processed, 4);
    assert_eq!(model.events_processed(), 8);
    assert_eq!(model.pending(), 2);
}

#[test]
fn test_combined_bounds_stop_at_whichever_first() {
    let (mut model, rec) = recorder_model();
    for t in 0..10 {
        model.schedule(t as f64, rec, "mark", Payload::Empty).unwrap();
    }
    let report = model
        .run(RunLimits::until(2.0).with_max_events(100))
        .unwrap();
    assert_eq!((report.processed, report.stop), (3, StopReason::TimeLimit));

    let report = model.run(RunLimits::until(50.0).with_max_events(2)).unwrap();
    assert_eq!((report.processed, report.stop), (2, StopReason::EventLimit));
}

#[test]
fn test_zero_event_bound_dispatches_nothing() {
    let (mut model, rec) = recorder_model();
    model.send(rec, "mark", Payload::Empty).unwrap();
    let report = model.run(RunLimits::events(0)).unwrap();
    assert_eq!(report.processed, 0);
    assert_eq!(model.pending(), 1);
}

#[test]
fn test_second_unbounded_run_is_noop() {
    let (mut model, rec) = recorder_model();
    model.schedule(1.0, rec, "mark", Payload::Empty).unwrap();
    model.schedule(2.0, rec, "mark", Payload::Empty).unwrap();

    let first = model.run(RunLimits::unbounded()).unwrap();
    assert_eq!(first.processed, 2);

    let second = model.run(RunLimits::unbounded()).unwrap();
    assert_eq!(second.processed, 0);
    assert_eq!(second.stop, StopReason::Exhausted);
    assert_eq!(second.now, VirtualTime::new(2.0));
    assert_eq!(model.events_processed(), 2);
}

#[test]
fn test_state_transitions() {
    let (mut model, rec) = recorder_model();
    assert_eq!(model.state(), ModelState::Idle);

    model.run(RunLimits::unbounded()).unwrap();
    assert_eq!(model.state(), ModelState::Exhausted);

    model.send(rec, "mark", Payload::Empty).unwrap();
    assert_eq!(model.state(), ModelState::Idle);

    model.run(RunLimits::unbounded()).unwrap();
    assert_eq!(model.state(), ModelState::Exhausted);
}

#[test]
fn test_step_dispatches_one_event() {
    let (mut model, rec) = recorder_model();
    model.schedule(5.0, rec, "mark", "a").unwrap();
    model.schedule(15.0, rec, "mark", "b").unwrap();

    let first = model.step().unwrap().unwrap();
    assert_eq!(first.time, VirtualTime::new(5.0));
    assert_eq!(model.time(), VirtualTime::new(5.0));

    let second = model.step().unwrap().unwrap();
    assert_eq!(second.name, EventName::from("mark"));
    assert_eq!(model.time(), VirtualTime::new(15.0));

    assert!(model.step().unwrap().is_none());
    assert_eq!(model.state(), ModelState::Exhausted);
}

// ── Unknown handlers ──────────────────────────────────────────────────

#[test]
fn test_unknown_event_aborts_run_and_names_type_and_event() {
    let (mut model, rec) = recorder_model();
    model.schedule(1.0, rec, "mark", "before").unwrap();
    model.schedule(2.0, rec, "explode", Payload::Empty).unwrap();
    model.schedule(3.0, rec, "mark", "after").unwrap();

    let err = model.run(RunLimits::unbounded()).unwrap_err();
    assert_eq!(
        err,
        SimError::UnknownEvent {
            entity_type: "recorder",
            event: EventName::from("explode"),
        }
    );

    // The loop did not continue past the failure.
    assert_eq!(model.entity::<Recorder>(rec).unwrap().tags(), vec!["before"]);
    assert_eq!(model.time(), VirtualTime::new(2.0));
    assert_eq!(model.pending(), 1);

    // The model stays usable; the failing event was consumed.
    let report = model.run(RunLimits::unbounded()).unwrap();
    assert_eq!(report.processed, 1);
    assert_eq!(
        model.entity::<Recorder>(rec).unwrap().tags(),
        vec!["before", "after"]
    );
}

// ── Cancellation ──────────────────────────────────────────────────────

#[test]
fn test_cancelled_event_never_dispatches() {
    let (mut model, rec) = recorder_model();
    model.schedule(1.0, rec, "mark", "kept").unwrap();
    let doomed = model.schedule(2.0, rec, "mark", "doomed").unwrap();
    model.schedule(3.0, rec, "mark", "kept too").unwrap();

    assert!(model.cancel(doomed));
    assert!(!model.cancel(doomed));

    let report = model.run(RunLimits::events(2)).unwrap();
    assert_eq!(report.processed, 2);
    assert_eq!(
        model.entity::<Recorder>(rec).unwrap().tags(),
        vec!["kept", "kept too"]
    );
    assert!(model.is_finished());
}

#[test]
fn test_cancelled_head_is_skipped_by_time_bound() {
    let (mut model, rec) = recorder_model();
    let early = model.schedule(1.0, rec, "mark", Payload::Empty).unwrap();
    model.schedule(9.0, rec, "mark", Payload::Empty).unwrap();
    model.cancel(early);

    assert_eq!(model.peek_time(), Some(VirtualTime::new(9.0)));
    let report = model.run(RunLimits::until(5.0)).unwrap();
    assert_eq!(report.processed, 0);
    assert_eq!(report.now, VirtualTime::ZERO);
}

#[test]
fn test_handler_cancels_later_event() {
    let (mut model, rec) = recorder_model();
    let timeout = model.schedule(5.0, rec, "mark", "timeout").unwrap();
    model
        .schedule(1.0, rec, "revoke", Payload::Int(timeout.raw() as i64))
        .unwrap();
    model.schedule(6.0, rec, "mark", "after").unwrap();

    let report = model.run(RunLimits::events(2)).unwrap();
    assert_eq!(report.processed, 2);
    assert_eq!(report.now, VirtualTime::new(6.0));
    assert!(model.is_finished());
    assert_eq!(
        model.entity::<Recorder>(rec).unwrap().tags(),
        vec!["revoked=true pending=1", "after"]
    );
}

#[test]
fn test_handler_cancels_next_event_at_same_time() {
    let (mut model, rec) = recorder_model();
    let revoke = model.schedule(1.0, rec, "revoke", Payload::Int(1)).unwrap();
    let victim = model.schedule(1.0, rec, "mark", "victim").unwrap();
    let survivor = model.schedule(1.0, rec, "mark", "survivor").unwrap();
    assert_eq!(revoke, Sequence::new(0));
    assert_eq!(victim, Sequence::new(1));
    model
        .schedule(2.0, rec, "revoke", Payload::Int(survivor.raw() as i64))
        .unwrap();

    let report = model.run(RunLimits::unbounded()).unwrap();
    assert_eq!(report.processed, 3);
    assert_eq!(
        model.entity::<Recorder>(rec).unwrap().tags(),
        vec!["revoked=true pending=2", "survivor", "revoked=false pending=0"]
    );
}

// ── Entity creation during a run ──────────────────────────────────────

#[test]
fn test_handler_can_spawn_entities() {
    let (mut model, rec) = recorder_model();
    model.schedule(2.0, rec, "spawn_child", Payload::Empty).unwrap();
    model.run(RunLimits::unbounded()).unwrap();

    let child = EntityId::new(1);
    assert_eq!(model.resolve(child), Ok("recorder"));
    let recorder = model.entity::<Recorder>(child).unwrap();
    assert_eq!(recorder.marks, vec![(3.0, "born".to_string())]);
}

#[test]
fn test_handler_can_add_entities_by_type_name() {
    let (mut model, rec) = recorder_model();
    model.schedule(1.0, rec, "adopt", "recorder").unwrap();
    model.run(RunLimits::unbounded()).unwrap();

    let child = EntityId::new(1);
    assert_eq!(model.resolve(child), Ok("recorder"));
    let recorder = model.entity::<Recorder>(child).unwrap();
    assert_eq!(recorder.marks, vec![(1.5, "adopted".to_string())]);
}

#[test]
fn test_handler_add_of_unknown_type_aborts_run() {
    let (mut model, rec) = recorder_model();
    model.schedule(1.0, rec, "adopt", "ghost").unwrap();
    let err = model.run(RunLimits::unbounded()).unwrap_err();
    assert_eq!(err, SimError::TypeNotFound("ghost".into()));
    assert_eq!(model.registry().len(), 1);
    assert_eq!(model.time(), VirtualTime::new(1.0));
}

// ── End-to-end single-server scenario ────────────────────────────────

#[test]
fn test_server_scenario_ten_arrivals() {
    let (mut model, server) = server_model(0.5);
    model.run(RunLimits::until(9.5)).unwrap();

    let s = model.entity::<Server>(server).unwrap();
    assert_eq!(s.arrivals, 10);
    assert_eq!(s.served, 10);
    assert_eq!(s.rejected, 0);
    assert!(!s.busy);
}

#[test]
fn test_server_scenario_bound_is_inclusive() {
    let (mut model, server) = server_model(0.5);
    let report = model.run(RunLimits::until(10.0)).unwrap();
    assert_eq!(report.stop, StopReason::TimeLimit);

    // Arrivals at t = 0..=10; the finish at 10.5 is still queued.
    let s = model.entity::<Server>(server).unwrap();
    assert_eq!((s.arrivals, s.served, s.rejected), (11, 10, 0));
    assert!(s.busy);
    assert_eq!(model.peek_time(), Some(VirtualTime::new(10.5)));

    model.run(RunLimits::until(10.5)).unwrap();
    let s = model.entity::<Server>(server).unwrap();
    assert_eq!((s.arrivals, s.served, s.rejected), (11, 11, 0));
}

#[test]
fn test_server_scenario_with_rejections() {
    let (mut model, server) = server_model(1.5);
    model.run(RunLimits::until(10.0)).unwrap();

    // Accepted at even times, rejected at odd times; finishes at
    // 1.5, 3.5, 5.5, 7.5, 9.5 fall inside the bound.
    let s = model.entity::<Server>(server).unwrap();
    assert_eq!((s.arrivals, s.served, s.rejected), (11, 5, 5));
    assert!(s.busy);
}

#[test]
fn test_server_scenario_simultaneous_finish_and_arrival() {
    // With service == inter-arrival, each finish coincides with the next
    // arrival. The arrival was scheduled first, so it runs first and
    // finds the server busy.
    let (mut model, server) = server_model(1.0);
    model.run(RunLimits::until(10.0)).unwrap();

    let s = model.entity::<Server>(server).unwrap();
    assert_eq!((s.arrivals, s.served, s.rejected), (11, 5, 5));
}

#[test]
fn test_identical_runs_have_identical_traces() {
    fn run_once() -> (u64, usize) {
        let (mut model, _server) = server_model(0.75);
        model.enable_trace();
        model.run(RunLimits::until(25.0)).unwrap();
        let trace = model.trace().unwrap();
        (trace.fingerprint(), trace.len())
    }

    let (a, len_a) = run_once();
    let (b, len_b) = run_once();
    assert_eq!(len_a, len_b);
    assert_eq!(a, b, "simulation is not deterministic");
}

#[test]
fn test_trace_records_dispatch_order() {
    let (mut model, server) = server_model(0.5);
    model.enable_trace();
    model.run(RunLimits::until(1.0)).unwrap();

    let trace = model.trace().unwrap();
    let names: Vec<&str> = trace.records().iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["arrival", "finish", "arrival"]);
    assert!(trace.records().iter().all(|r| r.target == server));
    assert!(trace.records().iter().all(|r| r.entity_type == "server"));
}
