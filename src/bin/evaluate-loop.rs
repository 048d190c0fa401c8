use frontend::*;
use frontend::sim::*;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::env;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

const BRANCH_PC: usize = 0x8000_1040;
const BODY_PC: usize   = 0x8000_1000;

fn usage(prog: &str) {
    println!("usage: {} <trip count> <instances> [jitter] [confidence threshold]", prog);
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        usage(&args[0]);
        return;
    }
    let (trip, instances) = match (args[1].parse::<u32>(), args[2].parse::<usize>()) {
        (Ok(t), Ok(n)) => (t, n),
        _ => { usage(&args[0]); return; },
    };
    let jitter = args.get(3).and_then(|s| s.parse::<f64>().ok()).unwrap_or(0.0);
    let threshold = args.get(4).and_then(|s| s.parse::<u8>().ok()).unwrap_or(1);
    if !(0.0..=1.0).contains(&jitter) {
        println!("jitter must be within [0, 1]");
        return;
    }

    let cfg = LoopPredictorConfig::default();
    println!("[*] Loop predictor configuration:");
    println!("      {} sets, {} ways, max confidence {}",
        cfg.num_sets, cfg.num_ways, cfg.max_confidence
    );
    println!("      Tag bits: {}", cfg.tag_bits());
    let storage_bits = cfg.storage_bits();
    println!("      Storage bits: {}b, {:.2}KiB",
        storage_bits, storage_bits as f64 / 1024.0 / 8.0
    );
    let lp = match cfg.build() {
        Ok(lp) => lp,
        Err(e) => { println!("invalid configuration: {}", e); return; },
    };

    let mut rng = StdRng::seed_from_u64(0);
    let workload = LoopWorkload::new(BRANCH_PC, BODY_PC)
        .jittered(trip, instances, jitter, &mut rng);
    let mut fe = LoopFrontend::new(lp, 64, threshold);

    let start = Instant::now();
    fe.run(&workload);
    let done = start.elapsed();
    println!("[*] ... simulated in {:.3?}", done);
    println!();

    println!("[*] Global statistics:");
    println!("      Global hit rate: {}/{} ({:.2}% correct) ({} misses)",
        fe.stats.global_hits, fe.stats.global_brns,
        fe.stats.hit_rate() * 100.0, fe.stats.global_miss()
    );
    if let Some(data) = fe.stats.get(BRANCH_PC) {
        println!("      Taken {} times, current hit streak {}",
            data.times_taken(), data.hit_streak()
        );
    }
    println!();

    let s = fe.lp.stats();
    println!("[*] Loop predictor statistics:");
    println!("      {} queries, {:.2}% hit main storage", s.queries, s.hit_rate() * 100.0);
    println!("      {} predicted exits ({} doubled)", s.predicted_exits, s.double_exits);
    println!("      {} commits, {} exits, {} promotions, {} recoveries",
        s.commits, s.exits, s.promotions, s.recoveries
    );
    if let Some(e) = fe.lp.main_entry(BRANCH_PC) {
        println!("      Entry {:016x}: trip {}, spec {}, conf {}/{}",
            BRANCH_PC, e.trip_cnt, e.spec_cnt, e.conf.value(), e.conf.max()
        );
    }
    println!();

    let f = fe.ftq.stats();
    println!("[*] FTQ statistics:");
    println!("      {} enqueued, {} supplied, {} finished, {} squashes",
        f.enqueues, f.supplies, f.finished, f.squashes
    );
}
