//! tempus-queue: single-server queue simulated on the Tempus kernel.
//!
//! Usage:
//!   tempus-queue                 # built-in defaults
//!   tempus-queue queue.json      # read a QueueConfig
//!
//! Set `RUST_LOG=debug` (or `trace`) to watch the kernel work.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufWriter, Write};

use anyhow::{bail, Context as _, Result};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64Mcg;
use serde::{Deserialize, Serialize};

use tempus::{
    Context, Entity, EntityId, HandlerTable, Model, Payload, RunLimits, SimError, SimResult,
    VirtualTime,
};

// ── Config ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct QueueConfig {
    seed: u64,
    /// Mean arrivals per time unit.
    arrival_rate: f64,
    /// Mean service completions per time unit.
    service_rate: f64,
    limits: RunLimits,
    /// Write the dispatch trace here as JSON lines.
    trace_path: Option<String>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        QueueConfig {
            seed: 42,
            arrival_rate: 0.9,
            service_rate: 1.0,
            limits: RunLimits::until(1_000.0),
            trace_path: None,
        }
    }
}

impl QueueConfig {
    fn load(path: &str) -> Result<Self> {
        let text = std::fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
        let config: QueueConfig =
            serde_json::from_str(&text).with_context(|| format!("parsing {path}"))?;
        if config.arrival_rate <= 0.0 || config.service_rate <= 0.0 {
            bail!("rates must be positive");
        }
        Ok(config)
    }
}

// ── Variate source ────────────────────────────────────────────────────

/// Exponential sampler on its own seeded stream, so the source and the
/// server never perturb each other's draws.
struct Exponential {
    rng: Pcg64Mcg,
    rate: f64,
}

impl Exponential {
    fn new(master_seed: u64, stream: u64, rate: f64) -> Self {
        let seed = master_seed ^ stream.wrapping_mul(0x9e37_79b9_7f4a_7c15);
        Exponential {
            rng: Pcg64Mcg::seed_from_u64(seed),
            rate,
        }
    }

    fn sample(&mut self) -> f64 {
        let u: f64 = self.rng.gen();
        -(1.0 - u).ln() / self.rate
    }
}

// ── Entities ──────────────────────────────────────────────────────────

/// Generates customers and hands them to the server.
struct Source {
    server: EntityId,
    inter_arrival: Exponential,
    generated: i64,
}

impl Source {
    fn generate(&mut self, ctx: &mut Context<'_>, _payload: &Payload) -> SimResult<()> {
        self.generated += 1;
        ctx.send(self.server, "arrival", self.generated)?;
        let delay = self.inter_arrival.sample();
        ctx.schedule_self(delay, "generate", Payload::Empty)?;
        Ok(())
    }
}

impl Entity for Source {
    const TYPE_NAME: &'static str = "source";

    /// Args: `[server, rate, seed]`.
    fn create(_id: EntityId, args: &Payload) -> SimResult<Self> {
        let [server, rate, seed] = args.as_list()? else {
            return Err(SimError::Handler("source expects [server, rate, seed]".into()));
        };
        Ok(Source {
            server: server.as_entity()?,
            inter_arrival: Exponential::new(seed.as_int()? as u64, 1, rate.as_float()?),
            generated: 0,
        })
    }

    fn bind(table: &mut HandlerTable<Self>) -> SimResult<()> {
        table.on("generate", Self::generate)?;
        Ok(())
    }
}

/// FIFO single server with exponential service times.
struct Server {
    service: Exponential,
    waiting: VecDeque<VirtualTime>,
    busy: bool,
    served: u64,
    total_wait: f64,
    max_queue: usize,
}

impl Server {
    fn new(service: Exponential) -> Self {
        Server {
            service,
            waiting: VecDeque::new(),
            busy: false,
            served: 0,
            total_wait: 0.0,
            max_queue: 0,
        }
    }

    fn arrival(&mut self, ctx: &mut Context<'_>, _payload: &Payload) -> SimResult<()> {
        if self.busy {
            self.waiting.push_back(ctx.now());
            self.max_queue = self.max_queue.max(self.waiting.len());
        } else {
            self.busy = true;
            self.start_service(ctx)?;
        }
        Ok(())
    }

    fn departure(&mut self, ctx: &mut Context<'_>, _payload: &Payload) -> SimResult<()> {
        self.served += 1;
        match self.waiting.pop_front() {
            Some(arrived) => {
                self.total_wait += ctx.now().duration_since(arrived).unwrap_or(0.0);
                self.start_service(ctx)
            }
            None => {
                self.busy = false;
                Ok(())
            }
        }
    }

    fn start_service(&mut self, ctx: &mut Context<'_>) -> SimResult<()> {
        let delay = self.service.sample();
        ctx.schedule_self(delay, "departure", Payload::Empty)?;
        Ok(())
    }
}

impl Entity for Server {
    const TYPE_NAME: &'static str = "server";

    /// Args: `[rate, seed]`.
    fn create(_id: EntityId, args: &Payload) -> SimResult<Self> {
        let [rate, seed] = args.as_list()? else {
            return Err(SimError::Handler("server expects [rate, seed]".into()));
        };
        Ok(Server::new(Exponential::new(
            seed.as_int()? as u64,
            2,
            rate.as_float()?,
        )))
    }

    fn bind(table: &mut HandlerTable<Self>) -> SimResult<()> {
        table
            .on("arrival", Self::arrival)?
            .on("departure", Self::departure)?;
        Ok(())
    }
}

// ── Main ──────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    env_logger::init();

    let config = match std::env::args().nth(1) {
        Some(path) => QueueConfig::load(&path)?,
        None => QueueConfig::default(),
    };

    println!("tempus-queue");
    println!("  seed:          {}", config.seed);
    println!("  arrival rate:  {}", config.arrival_rate);
    println!("  service rate:  {}", config.service_rate);
    println!("  limits:        {:?}", config.limits);
    println!();

    let mut model = Model::new();
    model.register_type::<Server>()?;
    model.register_type::<Source>()?;
    if config.trace_path.is_some() {
        model.enable_trace();
    }

    let seed = config.seed as i64;
    let server = model.spawn::<Server>(vec![
        Payload::Float(config.service_rate),
        Payload::Int(seed),
    ])?;
    let source = model.add(
        "source",
        vec![
            Payload::Entity(server),
            Payload::Float(config.arrival_rate),
            Payload::Int(seed),
        ],
    )?;
    model.send(source, "generate", Payload::Empty)?;

    let report = model.run(config.limits)?;

    let generated = model.entity::<Source>(source)?.generated;
    let s = model.entity::<Server>(server)?;
    let mean_wait = if s.served > 0 {
        s.total_wait / s.served as f64
    } else {
        0.0
    };

    println!("  stopped:       {:?} at {}", report.stop, report.now);
    println!("  events:        {}", report.processed);
    println!("  arrivals:      {}", generated);
    println!("  served:        {}", s.served);
    println!("  in queue:      {}", s.waiting.len());
    println!("  max queue:     {}", s.max_queue);
    println!("  mean wait:     {:.4}", mean_wait);

    if let (Some(path), Some(trace)) = (config.trace_path.as_deref(), model.trace()) {
        let file = File::create(path).with_context(|| format!("creating {path}"))?;
        let mut out = BufWriter::new(file);
        trace.write_json_lines(&mut out)?;
        out.flush()?;
        println!("  trace:         {} records -> {}", trace.len(), path);
    }

    Ok(())
}
